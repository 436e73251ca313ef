//! Persisted rope layout, as stored by level files.
//!
//! Nodes are listed head to tail. Consecutive nodes are linked; pins tie a
//! node to something outside the chain.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
	pub pos: [f32; 2],
	pub imass: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PinTarget {
	Point([f32; 2]),
	// another node of the same record
	Node(usize),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PinRecord {
	pub node: usize,
	pub target: PinTarget,
	pub rest_length: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RopeRecord {
	pub nodes: Vec<NodeRecord>,
	pub pins: Vec<PinRecord>,
	pub compliance: f32,
	pub radius: f32,
}

impl RopeRecord {
	pub fn is_well_formed(&self) -> bool {
		let n = self.nodes.len();
		n >= 2
			&& self.nodes.iter().all(|x| x.imass >= 0.0)
			&& self.pins.iter().all(|pin| {
				pin.node < n
					&& match pin.target {
						PinTarget::Point(_) => true,
						PinTarget::Node(other) => other < n && other != pin.node,
					}
			})
	}
}
