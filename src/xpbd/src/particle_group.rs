use fnv::FnvHashMap;

use crate::particle::Particle;
use crate::{C2, V2};

/// Uniform cell grid over the colliding particles of one substep.
pub struct ParticleGroup {
	csize: f32,
	data: FnvHashMap<C2, Vec<usize>>,
}

impl ParticleGroup {
	pub fn build(ps: &[Particle]) -> Self {
		let rmax = ps
			.iter()
			.filter(|p| p.active)
			.map(|p| p.radius)
			.fold(0f32, f32::max);
		let mut result = Self {
			csize: (2. * rmax).max(1e-3),
			data: FnvHashMap::default(),
		};
		for (idx, p) in ps.iter().enumerate() {
			if p.active && p.radius > 0. {
				let cpos = result.get_cpos(p.pos);
				result.data.entry(cpos).or_insert_with(Vec::new).push(idx);
			}
		}
		result
	}

	fn get_cpos(&self, p: V2) -> C2 {
		C2::new(
			(p[0] / self.csize).floor() as i32,
			(p[1] / self.csize).floor() as i32,
		)
	}

	/// Overlapping pairs (i < j), sorted.
	pub fn collision_pairs(&self, ps: &[Particle]) -> Vec<(usize, usize)> {
		let mut pairs = Vec::new();
		for (cpos, ids) in self.data.iter() {
			for dx in -1..=1 {
				for dy in -1..=1 {
					let Some(others) = self.data.get(&(cpos + C2::new(dx, dy)))
					else {
						continue;
					};
					for &i in ids.iter() {
						for &j in others.iter() {
							if i >= j {
								continue;
							}
							let r = ps[i].radius + ps[j].radius;
							if (ps[i].pos - ps[j].pos).magnitude_squared() < r * r {
								pairs.push((i, j));
							}
						}
					}
				}
			}
		}
		pairs.sort_unstable();
		pairs
	}
}
