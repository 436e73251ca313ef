use crate::V2;
use protocol::pr_model::PrParticle;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Particle {
	pub pos: V2,
	pub ppos: V2,
	// target of the external driver while free
	pub drive: V2,
	pub free: bool,
	pub active: bool,
	pub friction: f32,
	pub imass: f32,
	pub radius: f32,
}

impl Default for Particle {
	fn default() -> Self {
		Self {
			pos: V2::zeros(),
			ppos: V2::zeros(),
			drive: V2::zeros(),
			free: false,
			active: false,
			friction: 0.,
			imass: 0.,
			radius: 0.,
		}
	}
}

impl Particle {
	/// Inverse mass as seen by the solver, dragged particles do not yield.
	/// A free particle with zero inverse mass is still static: integration
	/// never snaps it to its driver, only host writes move it.
	pub fn w(&self) -> f32 {
		if self.free || !self.active {
			0.
		} else {
			self.imass
		}
	}

	pub fn movable(&self) -> bool {
		self.active && self.imass > 0.
	}

	pub fn reset_pos(&mut self, p: V2) {
		self.pos = p;
		self.ppos = p;
	}

	pub fn update(&mut self, t: f32, accel: V2, damping: f32, max_dp: f32) {
		if !self.movable() {
			return;
		}
		if self.free {
			self.ppos = self.pos;
			self.pos = self.drive;
			return;
		}
		let ppos = self.pos;
		let mut dp = (self.pos - self.ppos) * (1. - damping) + accel * t * t;
		if dp.magnitude() > max_dp {
			dp = dp.normalize() * max_dp;
		}
		self.pos += dp;
		self.ppos = ppos;
	}

	pub fn render(&self, id: usize) -> PrParticle {
		PrParticle {
			id,
			pos: [self.pos[0], self.pos[1]],
			radius: self.radius,
		}
	}
}

/// Dense particle arena with a LIFO free list.
pub struct ParticleStore {
	particles: Vec<Particle>,
	free_list: Vec<usize>,
	capacity: usize,
}

impl ParticleStore {
	pub fn new(capacity: usize) -> Self {
		Self {
			particles: Vec::new(),
			free_list: Vec::new(),
			capacity,
		}
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}

	pub fn allocate(&mut self) -> Option<usize> {
		let fresh = Particle {
			active: true,
			..Default::default()
		};
		if let Some(idx) = self.free_list.pop() {
			self.particles[idx] = fresh;
			return Some(idx);
		}
		if self.particles.len() >= self.capacity {
			return None;
		}
		self.particles.push(fresh);
		Some(self.particles.len() - 1)
	}

	pub fn release(&mut self, idx: usize) -> bool {
		match self.particles.get_mut(idx) {
			Some(p) if p.active => {
				*p = Particle::default();
				self.free_list.push(idx);
				true
			}
			_ => false,
		}
	}

	pub fn set(
		&mut self,
		idx: usize,
		pos: V2,
		imass: f32,
		friction: f32,
		radius: f32,
	) -> bool {
		let Some(p) = self.get_mut(idx) else {
			return false;
		};
		p.reset_pos(pos);
		p.drive = pos;
		p.imass = imass.max(0.);
		p.friction = friction.max(0.);
		p.radius = radius.max(0.);
		true
	}

	pub fn is_live(&self, idx: usize) -> bool {
		self.particles.get(idx).map_or(false, |p| p.active)
	}

	pub fn get(&self, idx: usize) -> Option<&Particle> {
		self.particles.get(idx).filter(|p| p.active)
	}

	pub fn get_mut(&mut self, idx: usize) -> Option<&mut Particle> {
		self.particles.get_mut(idx).filter(|p| p.active)
	}

	// raw slot, live or not
	pub(crate) fn slot_mut(&mut self, idx: usize) -> Option<&mut Particle> {
		self.particles.get_mut(idx)
	}

	pub fn as_slice(&self) -> &[Particle] {
		&self.particles
	}

	// dense range, including released slots
	pub fn len(&self) -> usize {
		self.particles.len()
	}

	pub fn is_empty(&self) -> bool {
		self.particles.is_empty()
	}

	pub fn live_len(&self) -> usize {
		self.particles.len() - self.free_list.len()
	}

	pub fn iter_live(&self) -> impl Iterator<Item = (usize, &Particle)> {
		self.particles.iter().enumerate().filter(|(_, p)| p.active)
	}
}
