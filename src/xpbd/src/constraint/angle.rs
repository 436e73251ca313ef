use std::f32::consts::PI;

use crate::constraint::{Correction, Projection};
use crate::particle::Particle;
use crate::V2;

fn perp(v: V2) -> V2 {
	V2::new(-v[1], v[0])
}

fn wrap(a: f32) -> f32 {
	let mut a = a % (2. * PI);
	if a > PI {
		a -= 2. * PI;
	} else if a < -PI {
		a += 2. * PI;
	}
	a
}

/// Signed angle at vertex `ps[1]`, measured from `ps[0]` to `ps[2]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AngleConstraint {
	pub ps: [usize; 3],
}

impl AngleConstraint {
	pub fn new(a: usize, vertex: usize, c: usize) -> Self {
		Self { ps: [a, vertex, c] }
	}
}

pub fn angle_at(a: V2, b: V2, c: V2) -> f32 {
	let u = a - b;
	let w = c - b;
	(u[0] * w[1] - u[1] * w[0]).atan2(u.dot(&w))
}

impl Projection for AngleConstraint {
	fn particles(&self) -> Vec<usize> {
		self.ps.to_vec()
	}

	fn measure(&self, ps: &[Particle]) -> f32 {
		angle_at(ps[self.ps[0]].pos, ps[self.ps[1]].pos, ps[self.ps[2]].pos)
	}

	fn project(
		&self,
		ps: &[Particle],
		theta0: f32,
		compliance_t: f32,
		lambda: f32,
	) -> Option<Correction> {
		let [ia, ib, ic] = self.ps;
		if self.ps.iter().any(|&i| !ps[i].active) {
			return None;
		}
		let (wa, wb, wc) = (ps[ia].w(), ps[ib].w(), ps[ic].w());
		if wa + wb + wc == 0. {
			return None;
		}
		let u = ps[ia].pos - ps[ib].pos;
		let w = ps[ic].pos - ps[ib].pos;
		let lu = u.magnitude_squared();
		let lw = w.magnitude_squared();
		if lu < f32::EPSILON || lw < f32::EPSILON {
			return None;
		}
		let c = wrap(self.measure(ps) - theta0);
		let ga = -perp(u) / lu;
		let gc = perp(w) / lw;
		let gb = -(ga + gc);
		let beta = wa * ga.magnitude_squared()
			+ wb * gb.magnitude_squared()
			+ wc * gc.magnitude_squared();
		let dlambda = (-c - compliance_t * lambda) / (beta + compliance_t);
		Some(
			Correction::new(dlambda)
				.with(ia, dlambda * wa * ga)
				.with(ib, dlambda * wb * gb)
				.with(ic, dlambda * wc * gc),
		)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_angle_at() {
		let a = V2::new(1., 0.);
		let b = V2::new(0., 0.);
		let c = V2::new(0., 1.);
		assert!((angle_at(a, b, c) - PI / 2.).abs() < 1e-6);
		assert!((angle_at(c, b, a) + PI / 2.).abs() < 1e-6);
		assert!((wrap(1.5 * PI) + 0.5 * PI).abs() < 1e-5);
	}

	#[test]
	fn test_straightens() {
		let mut ps: Vec<Particle> = [(-1., 0.), (0., 0.), (1., 1.)]
			.iter()
			.map(|&(x, y)| {
				let mut p = Particle {
					active: true,
					imass: 1.,
					..Default::default()
				};
				p.reset_pos(V2::new(x, y));
				p
			})
			.collect();
		let c = AngleConstraint::new(0, 1, 2);
		for _ in 0..50 {
			if let Some(corr) = c.project(&ps, PI, 0., 0.) {
				corr.apply(&mut ps);
			}
		}
		assert!(wrap(c.measure(&ps) - PI).abs() < 1e-2);
	}
}
