use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateInfo {
	pub frame: u64,
	pub dropped_frames: u64,
	pub particle_len: usize,
	// visible, auxiliary
	pub constraint_len: Vec<usize>,
	pub color_len: usize,
	pub obstacle_len: usize,
}
