use serde::{Deserialize, Serialize};

use crate::V2;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PosBox {
	pub xmin: f32,
	pub xmax: f32,
	pub ymin: f32,
	pub ymax: f32,
}

impl Default for PosBox {
	fn default() -> Self {
		Self {
			xmin: -1e4,
			xmax: 1e4,
			ymin: -1e4,
			ymax: 1e4,
		}
	}
}

impl PosBox {
	pub fn new(xmin: f32, xmax: f32, ymin: f32, ymax: f32) -> Self {
		Self {
			xmin,
			xmax,
			ymin,
			ymax,
		}
	}

	// keeps a particle of radius r fully inside
	pub fn apply(&self, pos: &mut V2, r: f32) -> bool {
		let xmin = self.xmin + r;
		let xmax = self.xmax - r;
		let ymin = self.ymin + r;
		let ymax = self.ymax - r;
		let mut flag = false;
		if pos[0] < xmin {
			pos[0] = xmin;
			flag = true;
		} else if pos[0] > xmax {
			pos[0] = xmax;
			flag = true;
		};
		if pos[1] < ymin {
			pos[1] = ymin;
			flag = true;
		} else if pos[1] > ymax {
			pos[1] = ymax;
			flag = true;
		};
		flag
	}
}
