//! Asynchronous return of device results and reconciliation with host writes
//! made while the step was in flight.

use std::sync::mpsc::{self, Receiver, TryRecvError};

use fnv::FnvHashMap;
use tracing::{debug, error};

use crate::device::DeviceState;
use crate::params::SimParams;
use crate::particle::{Particle, ParticleStore};

pub enum Poll {
	Idle,
	Pending,
	Ready(Box<DeviceState>),
	// worker went away without answering
	Lost,
}

#[derive(Default)]
pub struct Readback {
	pending: Option<(u64, Receiver<Box<DeviceState>>)>,
	dirty: FnvHashMap<usize, Particle>,
}

impl Readback {
	pub fn in_flight(&self) -> bool {
		self.pending.is_some()
	}

	pub fn dirty_len(&self) -> usize {
		self.dirty.len()
	}

	/// Runs the frame on the rayon pool, the result comes back through `poll`.
	pub fn dispatch(&mut self, frame: u64, mut device: Box<DeviceState>, params: SimParams) {
		let (tx, rx) = mpsc::channel();
		rayon::spawn(move || {
			device.run(&params);
			// receiver gone means the world was dropped
			let _ = tx.send(device);
		});
		self.pending = Some((frame, rx));
	}

	// latest write wins
	pub fn record(&mut self, idx: usize, value: Particle) {
		if self.in_flight() {
			self.dirty.insert(idx, value);
		}
	}

	pub fn poll(&mut self, block: bool) -> Poll {
		let Some((frame, rx)) = self.pending.as_ref() else {
			return Poll::Idle;
		};
		let frame = *frame;
		let result = if block {
			rx.recv().map_err(|_| TryRecvError::Disconnected)
		} else {
			rx.try_recv()
		};
		match result {
			Ok(device) => {
				debug!(frame, "readback resolved");
				self.pending = None;
				Poll::Ready(device)
			}
			Err(TryRecvError::Empty) => Poll::Pending,
			Err(TryRecvError::Disconnected) => {
				error!(frame, "device worker lost, frame discarded");
				self.pending = None;
				self.dirty.clear();
				Poll::Lost
			}
		}
	}

	/// Device result first, then every host write recorded during flight.
	pub fn reconcile(&mut self, host: &mut ParticleStore, device: &[Particle]) {
		for (idx, value) in device.iter().enumerate() {
			if let Some(slot) = host.slot_mut(idx) {
				*slot = *value;
			}
		}
		for (idx, value) in self.dirty.drain() {
			if let Some(slot) = host.slot_mut(idx) {
				*slot = value;
			}
		}
	}
}
