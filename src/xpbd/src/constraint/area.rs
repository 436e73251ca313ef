use crate::constraint::{Correction, Projection};
use crate::particle::Particle;
use crate::V2;

// twice the signed area, positive for ccw
fn area_p(p1: V2, p2: V2, p3: V2) -> f32 {
	p1[0] * p2[1] + p2[0] * p3[1] + p3[0] * p1[1]
		- p3[0] * p2[1]
		- p1[0] * p3[1]
		- p2[0] * p1[1]
}

pub fn signed_area(p1: V2, p2: V2, p3: V2) -> f32 {
	0.5 * area_p(p1, p2, p3)
}

/// Keeps the signed area of a triangle at its rest value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AreaConstraint {
	pub ps: [usize; 3],
}

impl AreaConstraint {
	pub fn new(p0: usize, p1: usize, p2: usize) -> Self {
		Self { ps: [p0, p1, p2] }
	}
}

impl Projection for AreaConstraint {
	fn particles(&self) -> Vec<usize> {
		self.ps.to_vec()
	}

	fn measure(&self, ps: &[Particle]) -> f32 {
		signed_area(ps[self.ps[0]].pos, ps[self.ps[1]].pos, ps[self.ps[2]].pos)
	}

	fn project(
		&self,
		ps: &[Particle],
		s0: f32,
		compliance_t: f32,
		lambda: f32,
	) -> Option<Correction> {
		let [i0, i1, i2] = self.ps;
		if self.ps.iter().any(|&i| !ps[i].active) {
			return None;
		}
		let imass0 = ps[i0].w();
		let imass1 = ps[i1].w();
		let imass2 = ps[i2].w();
		if imass0 + imass1 + imass2 == 0.0 {
			return None;
		}

		let pos0 = ps[i0].pos;
		let pos1 = ps[i1].pos;
		let pos2 = ps[i2].pos;
		let ds = signed_area(pos0, pos1, pos2) - s0;

		let grad0 = 0.5 * V2::new(pos1[1] - pos2[1], pos2[0] - pos1[0]);
		let grad1 = 0.5 * V2::new(pos2[1] - pos0[1], pos0[0] - pos2[0]);
		let grad2 = 0.5 * V2::new(pos0[1] - pos1[1], pos1[0] - pos0[0]);

		let beta = imass0 * grad0.magnitude_squared()
			+ imass1 * grad1.magnitude_squared()
			+ imass2 * grad2.magnitude_squared();
		// collapsed triangle
		if beta + compliance_t <= f32::EPSILON {
			return None;
		}
		let dlambda =
			(-ds - compliance_t * lambda) / (beta + compliance_t);
		Some(
			Correction::new(dlambda)
				.with(i0, dlambda * imass0 * grad0)
				.with(i1, dlambda * imass1 * grad1)
				.with(i2, dlambda * imass2 * grad2),
		)
	}
}
