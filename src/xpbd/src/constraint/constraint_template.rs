use crate::V2;

use super::distance::DistanceConstraintType;

// indices are local to the model being instantiated
#[derive(Clone, Debug, PartialEq)]
pub struct DistanceConstraintTemplate {
	pub ps: [usize; 2],
	// None: snap to the spacing at creation
	pub l0: Option<f32>,
	pub compliance: f32,
	pub ty: DistanceConstraintType,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TargetTemplate {
	Point(V2),
	Local(usize),
}

#[derive(Clone, Debug, PartialEq)]
pub struct PinConstraintTemplate {
	pub p: usize,
	pub target: TargetTemplate,
	pub l0: f32,
	pub compliance: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ConstraintTemplate {
	Distance(DistanceConstraintTemplate),
	Pin(PinConstraintTemplate),
}
