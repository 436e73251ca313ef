use crate::constraint::{Correction, Projection};
use crate::particle::Particle;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DistanceConstraintType {
	Normal,
	Repulsive, // collision
	Attractive, // one-sided, rope slack
}
type DCTy = DistanceConstraintType;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DistanceConstraint {
	pub ps: [usize; 2],
	pub ty: DCTy,
}

impl DistanceConstraint {
	pub fn new(p1: usize, p2: usize) -> Self {
		Self {
			ps: [p1, p2],
			ty: DCTy::Normal,
		}
	}

	pub fn repulsive_only(mut self) -> Self {
		self.ty = DCTy::Repulsive;
		self
	}

	pub fn attractive_only(mut self) -> Self {
		self.ty = DCTy::Attractive;
		self
	}

	pub fn with_ty(mut self, ty: DCTy) -> Self {
		self.ty = ty;
		self
	}
}

impl Projection for DistanceConstraint {
	fn particles(&self) -> Vec<usize> {
		self.ps.to_vec()
	}

	fn measure(&self, ps: &[Particle]) -> f32 {
		(ps[self.ps[0]].pos - ps[self.ps[1]].pos).magnitude()
	}

	fn project(
		&self,
		ps: &[Particle],
		l0: f32,
		compliance_t: f32,
		lambda: f32,
	) -> Option<Correction> {
		let p1 = &ps[self.ps[0]];
		let p2 = &ps[self.ps[1]];
		if !p1.active || !p2.active {
			return None;
		}
		let imass1 = p1.w();
		let imass2 = p2.w();
		let imass = imass1 + imass2;
		if imass == 0.0 {
			return None;
		}
		let dp = p1.pos - p2.pos;
		let l = dp.magnitude();
		if !l.is_normal() {
			return None;
		}
		let dl = l - l0;
		if self.ty == DCTy::Repulsive && dl >= 0.
			|| self.ty == DCTy::Attractive && dl <= 0.
		{
			return None;
		}
		let dlambda = (-dl - compliance_t * lambda) / (imass + compliance_t);
		let correct = dlambda * dp / l;
		Some(
			Correction::new(dlambda)
				.with(self.ps[0], correct * imass1)
				.with(self.ps[1], -correct * imass2),
		)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::V2;

	fn pair(x1: f32, x2: f32, w1: f32, w2: f32) -> Vec<Particle> {
		[(x1, w1), (x2, w2)]
			.iter()
			.map(|&(x, w)| {
				let mut p = Particle {
					active: true,
					imass: w,
					..Default::default()
				};
				p.reset_pos(V2::new(x, 0.));
				p
			})
			.collect()
	}

	#[test]
	fn test_rigid_projection() {
		let mut ps = pair(0., 1., 1., 1.);
		let c = DistanceConstraint::new(0, 1);
		let corr = c.project(&ps, 0.5, 0., 0.).unwrap();
		corr.apply(&mut ps);
		assert!((ps[0].pos[0] - 0.25).abs() < 1e-6);
		assert!((ps[1].pos[0] - 0.75).abs() < 1e-6);
	}

	#[test]
	fn test_static_end() {
		let mut ps = pair(0., 1., 0., 1.);
		let c = DistanceConstraint::new(0, 1);
		c.project(&ps, 0.5, 0., 0.).unwrap().apply(&mut ps);
		assert_eq!(ps[0].pos, V2::zeros());
		assert!((ps[1].pos[0] - 0.5).abs() < 1e-6);
	}

	#[test]
	fn test_attractive_slack() {
		let ps = pair(0., 0.3, 1., 1.);
		let c = DistanceConstraint::new(0, 1).attractive_only();
		assert!(c.project(&ps, 0.5, 0., 0.).is_none());
		let ps = pair(0., 0.8, 1., 1.);
		assert!(c.project(&ps, 0.5, 0., 0.).is_some());
	}

	#[test]
	fn test_coincident_skipped() {
		let ps = pair(1., 1., 1., 1.);
		let c = DistanceConstraint::new(0, 1);
		assert!(c.project(&ps, 0.5, 0., 0.).is_none());
	}
}
