use rayon::prelude::*;

use crate::obstacle::{Obstacle, COLLIDE};
use crate::particle::Particle;
use crate::particle_group::ParticleGroup;
use crate::posbox::PosBox;

pub fn collide_particles(ps: &mut [Particle]) {
	let pairs = ParticleGroup::build(ps).collision_pairs(ps);
	for (i, j) in pairs {
		let w1 = ps[i].w();
		let w2 = ps[j].w();
		let w = w1 + w2;
		if w == 0. {
			continue;
		}
		let dp = ps[i].pos - ps[j].pos;
		let l = dp.magnitude();
		let depth = ps[i].radius + ps[j].radius - l;
		if !l.is_normal() || depth <= 0. {
			continue;
		}
		let n = dp / l;
		ps[i].pos += n * depth * w1 / w;
		ps[j].pos -= n * depth * w2 / w;
	}
}

// push out along the gradient, then remove tangential slip
pub fn collide_obstacle(p: &mut Particle, obstacle: &Obstacle) -> bool {
	let depth = p.radius - obstacle.sdf(p.pos);
	if depth <= 0. {
		return false;
	}
	let n = obstacle.gradient(p.pos);
	p.pos += n * depth;
	let mu = 0.5 * (p.friction + obstacle.friction);
	let dp = p.pos - p.ppos;
	let tangent = dp - n * dp.dot(&n);
	let lt = tangent.magnitude();
	if lt > 0. {
		p.pos -= tangent * (mu * depth / lt).min(1.);
	}
	true
}

pub fn collide_obstacles(ps: &mut [Particle], obstacles: &[Obstacle]) {
	if obstacles.is_empty() {
		return;
	}
	ps.par_iter_mut()
		.filter(|p| p.w() > 0.)
		.for_each(|p| {
			for obstacle in obstacles.iter().filter(|o| o.flags & COLLIDE != 0) {
				collide_obstacle(p, obstacle);
			}
		});
}

pub fn apply_bounds(ps: &mut [Particle], bounds: &PosBox) {
	ps.par_iter_mut()
		.filter(|p| p.w() > 0.)
		.for_each(|p| {
			let r = p.radius;
			bounds.apply(&mut p.pos, r);
		});
}
