pub mod anchor;
pub mod angle;
pub mod area;
pub mod constraint_template;
pub mod distance;

use crate::particle::Particle;
use crate::V2;
use protocol::pr_model::PrConstraint;

pub use anchor::AnchorConstraint;
pub use angle::AngleConstraint;
pub use area::AreaConstraint;
pub use distance::{DistanceConstraint, DistanceConstraintType};

/// The far end of an anchor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Target {
	Particle(usize),
	Fixed(V2),
}

/// Position change produced by projecting one constraint.
#[derive(Clone, Copy, Debug)]
pub struct Correction {
	pub dlambda: f32,
	len: usize,
	deltas: [(usize, V2); 3],
}

impl Correction {
	pub fn new(dlambda: f32) -> Self {
		Self {
			dlambda,
			len: 0,
			deltas: [(0, V2::zeros()); 3],
		}
	}

	pub fn with(mut self, idx: usize, dp: V2) -> Self {
		self.deltas[self.len] = (idx, dp);
		self.len += 1;
		self
	}

	pub fn deltas(&self) -> &[(usize, V2)] {
		&self.deltas[..self.len]
	}

	pub fn apply(&self, ps: &mut [Particle]) {
		for (idx, dp) in self.deltas() {
			let p = &mut ps[*idx];
			if p.w() > 0. {
				p.pos += dp;
			}
		}
	}
}

pub trait Projection {
	// compliance_t: compliance / dt^2
	fn project(
		&self,
		ps: &[Particle],
		rest: f32,
		compliance_t: f32,
		lambda: f32,
	) -> Option<Correction>;

	fn particles(&self) -> Vec<usize>;

	// current value of the constrained quantity
	fn measure(&self, ps: &[Particle]) -> f32;
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ConstraintKind {
	None,
	Distance(DistanceConstraint),
	Angle(AngleConstraint),
	Area(AreaConstraint),
	Anchor(AnchorConstraint),
}

impl ConstraintKind {
	fn as_projection(&self) -> Option<&dyn Projection> {
		match self {
			Self::None => None,
			Self::Distance(c) => Some(c as &dyn Projection),
			Self::Angle(c) => Some(c as &dyn Projection),
			Self::Area(c) => Some(c as &dyn Projection),
			Self::Anchor(c) => Some(c as &dyn Projection),
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Constraint {
	pub kind: ConstraintKind,
	pub rest: f32,
	pub compliance: f32,
	pub color: Option<u32>,
	// auxiliary constraints are solved but never rendered
	pub visible: bool,
	pub active: bool,
}

impl Default for Constraint {
	fn default() -> Self {
		Self {
			kind: ConstraintKind::None,
			rest: 0.,
			compliance: 0.,
			color: None,
			visible: true,
			active: false,
		}
	}
}

impl Constraint {
	pub fn particles(&self) -> Vec<usize> {
		self.kind
			.as_projection()
			.map(|c| c.particles())
			.unwrap_or_default()
	}

	pub fn project(
		&self,
		ps: &[Particle],
		dt: f32,
		lambda: f32,
	) -> Option<Correction> {
		let c = self.kind.as_projection()?;
		let compliance_t = self.compliance / (dt * dt);
		c.project(ps, self.rest, compliance_t, lambda)
	}

	pub fn measure(&self, ps: &[Particle]) -> Option<f32> {
		Some(self.kind.as_projection()?.measure(ps))
	}

	pub fn render(&self, id: usize) -> Option<PrConstraint> {
		if !self.active || !self.visible {
			return None;
		}
		let point = match self.kind {
			ConstraintKind::None => return None,
			ConstraintKind::Anchor(AnchorConstraint {
				target: Target::Fixed(p),
				..
			}) => Some([p[0], p[1]]),
			_ => None,
		};
		Some(PrConstraint {
			id,
			particles: self.particles(),
			point,
		})
	}
}

pub struct ConstraintStore {
	constraints: Vec<Constraint>,
	free_list: Vec<usize>,
	capacity: usize,
}

impl ConstraintStore {
	pub fn new(capacity: usize) -> Self {
		Self {
			constraints: Vec::new(),
			free_list: Vec::new(),
			capacity,
		}
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}

	pub fn allocate(&mut self) -> Option<usize> {
		let fresh = Constraint {
			active: true,
			..Default::default()
		};
		if let Some(idx) = self.free_list.pop() {
			self.constraints[idx] = fresh;
			return Some(idx);
		}
		if self.constraints.len() >= self.capacity {
			return None;
		}
		self.constraints.push(fresh);
		Some(self.constraints.len() - 1)
	}

	// returns the released constraint so the caller can give back its color
	pub fn release(&mut self, idx: usize) -> Option<Constraint> {
		let c = self.constraints.get_mut(idx).filter(|c| c.active)?;
		let old = std::mem::take(c);
		self.free_list.push(idx);
		Some(old)
	}

	pub fn get(&self, idx: usize) -> Option<&Constraint> {
		self.constraints.get(idx).filter(|c| c.active)
	}

	pub fn get_mut(&mut self, idx: usize) -> Option<&mut Constraint> {
		self.constraints.get_mut(idx).filter(|c| c.active)
	}

	pub fn as_slice(&self) -> &[Constraint] {
		&self.constraints
	}

	pub fn len(&self) -> usize {
		self.constraints.len()
	}

	pub fn is_empty(&self) -> bool {
		self.constraints.is_empty()
	}

	pub fn live_len(&self) -> usize {
		self.constraints.len() - self.free_list.len()
	}

	pub fn iter_live(&self) -> impl Iterator<Item = (usize, &Constraint)> {
		self.constraints.iter().enumerate().filter(|(_, c)| c.active)
	}
}
