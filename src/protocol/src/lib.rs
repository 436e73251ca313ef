pub mod pr_model;
pub mod rope_record;
pub mod user_event;

use pr_model::PrModel;
use rope_record::RopeRecord;
use user_event::UpdateInfo;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Message {
	WorldUpdate(PrModel, UpdateInfo),
	Rope(RopeRecord),
	Nop,
}

impl Message {
	pub fn to_bytes(&self) -> bincode::Result<Vec<u8>> {
		bincode::serialize(&self)
	}

	pub fn from_bytes(bytes: &[u8]) -> bincode::Result<Self> {
		bincode::deserialize(bytes)
	}
}
