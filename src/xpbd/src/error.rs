use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Store {
	Particle,
	Constraint,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
	/// Capacity of a store reached, nothing was created.
	StoreExhausted(Store),
	/// A constraint refers to a particle that is not live.
	InvalidTopology { constraint: usize, particle: usize },
	InvalidIndex(usize),
	UnknownRope(usize),
	/// Reel or build request on a rope with too few particles.
	RopeTooShort { rope: usize, len: usize },
	Decode(String),
}

impl fmt::Display for EngineError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::StoreExhausted(store) => {
				write!(f, "{:?} store exhausted", store)
			}
			Self::InvalidTopology {
				constraint,
				particle,
			} => write!(
				f,
				"constraint {} references dead particle {}",
				constraint, particle
			),
			Self::InvalidIndex(idx) => write!(f, "invalid index {}", idx),
			Self::UnknownRope(id) => write!(f, "unknown rope {}", id),
			Self::RopeTooShort { rope, len } => {
				write!(f, "rope {} too short ({} particles)", rope, len)
			}
			Self::Decode(e) => write!(f, "decode failed: {}", e),
		}
	}
}

impl std::error::Error for EngineError {}

impl From<bincode::Error> for EngineError {
	fn from(e: bincode::Error) -> Self {
		Self::Decode(e.to_string())
	}
}
