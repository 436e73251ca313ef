use crate::constraint::{Correction, Projection, Target};
use crate::particle::Particle;
use crate::V2;

/// Ties a particle to a fixed point or to another particle (plus offset).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnchorConstraint {
	pub p: usize,
	pub target: Target,
	pub offset: V2,
}

impl AnchorConstraint {
	pub fn new(p: usize, target: Target) -> Self {
		Self {
			p,
			target,
			offset: V2::zeros(),
		}
	}

	pub fn with_offset(mut self, offset: V2) -> Self {
		self.offset = offset;
		self
	}

	pub fn target_pos(&self, ps: &[Particle]) -> V2 {
		match self.target {
			Target::Fixed(pos) => pos + self.offset,
			Target::Particle(idx) => ps[idx].pos + self.offset,
		}
	}
}

impl Projection for AnchorConstraint {
	fn particles(&self) -> Vec<usize> {
		match self.target {
			Target::Fixed(_) => vec![self.p],
			Target::Particle(idx) => vec![self.p, idx],
		}
	}

	fn measure(&self, ps: &[Particle]) -> f32 {
		(ps[self.p].pos - self.target_pos(ps)).magnitude()
	}

	fn project(
		&self,
		ps: &[Particle],
		rest: f32,
		compliance_t: f32,
		lambda: f32,
	) -> Option<Correction> {
		if !ps[self.p].active {
			return None;
		}
		if let Target::Particle(idx) = self.target {
			if !ps[idx].active {
				return None;
			}
		}
		let imass1 = ps[self.p].w();
		let imass2 = match self.target {
			Target::Fixed(_) => 0.,
			Target::Particle(idx) => ps[idx].w(),
		};
		let imass = imass1 + imass2;
		if imass == 0.0 {
			return None;
		}
		let dp = ps[self.p].pos - self.target_pos(ps);
		let l = dp.magnitude();
		let dl = l - rest;
		// pinned exactly on the point
		if !l.is_normal() {
			return None;
		}
		let dlambda = (-dl - compliance_t * lambda) / (imass + compliance_t);
		let correct = dlambda * dp / l;
		let result = Correction::new(dlambda).with(self.p, correct * imass1);
		Some(match self.target {
			Target::Fixed(_) => result,
			Target::Particle(idx) => result.with(idx, -correct * imass2),
		})
	}
}
