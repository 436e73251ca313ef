use crate::constraint::constraint_template::{
	ConstraintTemplate, DistanceConstraintTemplate, PinConstraintTemplate,
	TargetTemplate,
};
use crate::constraint::DistanceConstraintType;
use crate::V2;
use protocol::rope_record::{PinTarget, RopeRecord};

pub const ROPE_RADIUS: f32 = 0.05;
pub const ROPE_FRICTION: f32 = 0.3;
pub const PIN_COMPLIANCE: f32 = 1e-9;

#[derive(Clone, Debug, PartialEq)]
pub struct ParticleTemplate {
	pub imass: f32,
	pub pos: V2,
	pub radius: f32,
	pub friction: f32,
}

/// Particles and constraints with model-local indices, instantiated by
/// `PWorld::add_model`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PhysicalModel {
	pub particles: Vec<ParticleTemplate>,
	pub constraints: Vec<ConstraintTemplate>,
}

impl PhysicalModel {
	/// `n` evenly spaced particles from `start` to `end`, linked in order.
	pub fn new_chain(
		start: V2,
		end: V2,
		n: usize,
		imass: f32,
		compliance: f32,
	) -> Self {
		let mut result = Self::default();
		for idx in 0..n {
			let t = if n > 1 { idx as f32 / (n - 1) as f32 } else { 0. };
			result.particles.push(ParticleTemplate {
				imass,
				pos: start + (end - start) * t,
				radius: ROPE_RADIUS,
				friction: ROPE_FRICTION,
			});
		}
		for idx in 1..n {
			result.constraints.push(ConstraintTemplate::Distance(
				DistanceConstraintTemplate {
					ps: [idx - 1, idx],
					l0: None,
					compliance,
					ty: DistanceConstraintType::Normal,
				},
			));
		}
		result
	}

	/// Link rest lengths snap to the stored node spacing.
	pub fn from_record(record: &RopeRecord) -> Self {
		let n = record.nodes.len();
		let mut result = Self::default();
		for node in record.nodes.iter() {
			result.particles.push(ParticleTemplate {
				imass: node.imass,
				pos: V2::new(node.pos[0], node.pos[1]),
				radius: record.radius,
				friction: ROPE_FRICTION,
			});
		}
		for idx in 1..n {
			result.constraints.push(ConstraintTemplate::Distance(
				DistanceConstraintTemplate {
					ps: [idx - 1, idx],
					l0: None,
					compliance: record.compliance,
					ty: DistanceConstraintType::Normal,
				},
			));
		}
		for pin in record.pins.iter() {
			let target = match pin.target {
				PinTarget::Point(p) => TargetTemplate::Point(V2::new(p[0], p[1])),
				PinTarget::Node(other) => TargetTemplate::Local(other),
			};
			result.constraints.push(ConstraintTemplate::Pin(PinConstraintTemplate {
				p: pin.node,
				target,
				l0: pin.rest_length,
				compliance: PIN_COMPLIANCE,
			}));
		}
		result
	}

	pub fn links(&self) -> usize {
		self.constraints
			.iter()
			.filter(|c| matches!(c, ConstraintTemplate::Distance(_)))
			.count()
	}
}
