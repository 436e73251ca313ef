use rayon::prelude::*;

use crate::coloring::SATURATED_COLOR;
use crate::constraint::{Constraint, Correction};
use crate::particle::Particle;

/// Constraint indices bucketed by color, rebuilt on upload.
#[derive(Clone, Debug, Default)]
pub struct ConstraintGroup {
	colors: Vec<Vec<usize>>,
	aux: Vec<usize>,
}

impl ConstraintGroup {
	pub fn build(constraints: &[Constraint], active_colors: usize) -> Self {
		let mut colors = vec![Vec::new(); active_colors];
		let mut aux = Vec::new();
		for (idx, c) in constraints.iter().enumerate() {
			if !c.active {
				continue;
			}
			match c.color {
				Some(color) if (color as usize) < active_colors => {
					colors[color as usize].push(idx)
				}
				_ => aux.push(idx),
			}
		}
		Self { colors, aux }
	}

	pub fn len(&self) -> Vec<usize> {
		vec![
			self.colors.iter().map(|x| x.len()).sum(),
			self.aux.len(),
		]
	}

	pub fn color_len(&self) -> usize {
		self.colors.len()
	}

	/// One round: every color in ascending order, then the auxiliary pass.
	pub fn solve_constraints(
		&self,
		constraints: &[Constraint],
		lambdas: &mut [f32],
		ps: &mut [Particle],
		dt: f32,
	) {
		for (color, batch) in self.colors.iter().enumerate() {
			if color as u32 == SATURATED_COLOR {
				solve_serial(batch, constraints, lambdas, ps, dt);
			} else {
				solve_parallel(batch, constraints, lambdas, ps, dt);
			}
		}
		solve_serial(&self.aux, constraints, lambdas, ps, dt);
	}
}

// members of one color share no particle, so corrections computed against
// the same snapshot can be applied in any order
fn solve_parallel(
	batch: &[usize],
	constraints: &[Constraint],
	lambdas: &mut [f32],
	ps: &mut [Particle],
	dt: f32,
) {
	let snapshot: &[Particle] = ps;
	let lambdas_ro: &[f32] = lambdas;
	let corrections: Vec<(usize, Correction)> = batch
		.par_iter()
		.filter_map(|&idx| {
			constraints[idx]
				.project(snapshot, dt, lambdas_ro[idx])
				.map(|corr| (idx, corr))
		})
		.collect();
	for (idx, corr) in corrections.iter() {
		lambdas[*idx] += corr.dlambda;
		corr.apply(ps);
	}
}

fn solve_serial(
	batch: &[usize],
	constraints: &[Constraint],
	lambdas: &mut [f32],
	ps: &mut [Particle],
	dt: f32,
) {
	for &idx in batch.iter() {
		if let Some(corr) = constraints[idx].project(ps, dt, lambdas[idx]) {
			lambdas[idx] += corr.dlambda;
			corr.apply(ps);
		}
	}
}
