// pr_model: Physical model for rendering

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrParticle {
	pub id: usize,
	pub pos: [f32; 2],
	pub radius: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrConstraint {
	pub id: usize,
	pub particles: Vec<usize>,
	// fixed end of an anchor, if any
	pub point: Option<[f32; 2]>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrObstacle {
	pub pos: [f32; 2],
	pub rotation: f32,
	pub shape: u32,
	pub params: [f32; 4],
	pub appearance: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PrModel {
	pub particles: Vec<PrParticle>,
	pub constraints: Vec<PrConstraint>,
	pub obstacles: Vec<PrObstacle>,
}
