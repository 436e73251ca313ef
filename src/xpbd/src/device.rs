//! Device-side mirror of the stores and the per-frame substep schedule.

use rayon::prelude::*;

use crate::collision::{apply_bounds, collide_obstacles, collide_particles};
use crate::constraint::Constraint;
use crate::constraint_group::ConstraintGroup;
use crate::obstacle::Obstacle;
use crate::params::SimParams;
use crate::particle::Particle;

#[derive(Clone, Default)]
pub struct DeviceState {
	pub particles: Vec<Particle>,
	pub constraints: Vec<Constraint>,
	pub lambdas: Vec<f32>,
	pub group: ConstraintGroup,
	pub obstacles: Vec<Obstacle>,
}

impl DeviceState {
	pub fn upload_constraints(&mut self, constraints: &[Constraint], active_colors: usize) {
		self.constraints.clear();
		self.constraints.extend_from_slice(constraints);
		self.lambdas.resize(constraints.len(), 0.);
		self.group = ConstraintGroup::build(constraints, active_colors);
	}

	fn integrate(&mut self, dt: f32, params: &SimParams) {
		let max_dp = params.max_speed * dt;
		self.particles.par_iter_mut().for_each(|p| {
			p.update(dt, params.gravity, params.damping, max_dp)
		});
	}

	fn solve(&mut self, dt: f32, rounds: usize) {
		self.lambdas.iter_mut().for_each(|l| *l = 0.);
		for _ in 0..rounds {
			self.group.solve_constraints(
				&self.constraints,
				&mut self.lambdas,
				&mut self.particles,
				dt,
			);
		}
	}

	fn collide(&mut self, params: &SimParams) {
		for _ in 0..params.collision_iterations {
			collide_particles(&mut self.particles);
		}
		collide_obstacles(&mut self.particles, &self.obstacles);
		apply_bounds(&mut self.particles, &params.world_bounds);
	}

	/// One frame: integrate, solve rounds, collisions; once per substep.
	pub fn run(&mut self, params: &SimParams) {
		let dt = params.substep_dt();
		if dt == 0. {
			return;
		}
		for _ in 0..params.substeps {
			self.integrate(dt, params);
			self.solve(dt, params.solve_rounds);
			self.collide(params);
		}
	}
}
