use serde::{Deserialize, Serialize};

use crate::posbox::PosBox;
use crate::V2;

/// Per-frame stepping parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimParams {
	pub dt: f32,
	pub substeps: usize,
	// constraint rounds per substep
	pub solve_rounds: usize,
	pub gravity: V2,
	// fraction of velocity removed per substep
	pub damping: f32,
	// clamps per-substep displacement to max_speed * h
	pub max_speed: f32,
	pub world_bounds: PosBox,
	pub collision_iterations: usize,
	pub paused: bool,
}

impl Default for SimParams {
	fn default() -> Self {
		Self {
			dt: 1. / 60.,
			substeps: 8,
			solve_rounds: 2,
			gravity: V2::new(0., -9.8),
			damping: 1e-3,
			max_speed: f32::INFINITY,
			world_bounds: PosBox::default(),
			collision_iterations: 1,
			paused: false,
		}
	}
}

impl SimParams {
	pub fn with_dt(mut self, dt: f32) -> Self {
		self.dt = dt;
		self
	}

	pub fn with_substeps(mut self, substeps: usize) -> Self {
		self.substeps = substeps;
		self
	}

	pub fn with_solve_rounds(mut self, rounds: usize) -> Self {
		self.solve_rounds = rounds;
		self
	}

	pub fn with_gravity(mut self, gravity: V2) -> Self {
		self.gravity = gravity;
		self
	}

	pub fn with_damping(mut self, damping: f32) -> Self {
		self.damping = damping.clamp(0., 1.);
		self
	}

	pub fn with_max_speed(mut self, max_speed: f32) -> Self {
		self.max_speed = max_speed;
		self
	}

	pub fn with_world_bounds(mut self, bounds: PosBox) -> Self {
		self.world_bounds = bounds;
		self
	}

	pub fn with_collision_iterations(mut self, n: usize) -> Self {
		self.collision_iterations = n;
		self
	}

	pub fn with_paused(mut self, paused: bool) -> Self {
		self.paused = paused;
		self
	}

	pub fn substep_dt(&self) -> f32 {
		self.dt / self.substeps.max(1) as f32
	}
}
