mod collision;
pub mod coloring;
pub mod constraint;
mod constraint_group;
pub mod controller_message;
mod device;
pub mod error;
pub mod obstacle;
pub mod params;
pub mod particle;
mod particle_group;
pub mod physical_model;
pub mod posbox;
pub mod pworld;
pub mod query;
mod readback;
pub mod rope;

pub type V2 = nalgebra::Vector2<f32>;
pub type C2 = nalgebra::Vector2<i32>;

pub use error::EngineError;
pub use params::SimParams;
pub use pworld::{PWorld, StepOutcome};
