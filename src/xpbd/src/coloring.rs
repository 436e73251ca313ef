//! Incremental graph coloring of the constraint graph.
//!
//! Each particle carries a bitmask of the colors used by constraints touching
//! it. A new constraint takes the smallest color free on all of its particles,
//! so constraints of one color never share a particle and can be projected in
//! parallel. Once every color is taken the last one is handed out anyway; that
//! color is projected sequentially.

use fnv::FnvHashMap;
use tracing::warn;

pub const MAX_COLORS: usize = 32;
pub const SATURATED_COLOR: u32 = MAX_COLORS as u32 - 1;

#[derive(Clone, Debug)]
pub struct GraphColorer {
	masks: Vec<u32>,
	// membership count of the saturated color per particle
	saturated: FnvHashMap<usize, u32>,
	usage: [u32; MAX_COLORS],
	ceiling: usize,
}

impl Default for GraphColorer {
	fn default() -> Self {
		Self {
			masks: Vec::new(),
			saturated: FnvHashMap::default(),
			usage: [0; MAX_COLORS],
			ceiling: 0,
		}
	}
}

impl GraphColorer {
	fn mask(&self, p: usize) -> u32 {
		self.masks.get(p).copied().unwrap_or(0)
	}

	fn mask_mut(&mut self, p: usize) -> &mut u32 {
		if p >= self.masks.len() {
			self.masks.resize(p + 1, 0);
		}
		&mut self.masks[p]
	}

	pub fn color_set(&self, p: usize) -> u32 {
		self.mask(p)
	}

	pub fn has_color(&self, p: usize, color: u32) -> bool {
		self.mask(p) & (1 << color) != 0
	}

	/// Number of colors in use, all colors below it may be non-empty.
	pub fn active_colors(&self) -> usize {
		self.ceiling
	}

	pub fn usage(&self, color: u32) -> u32 {
		self.usage[color as usize]
	}

	pub fn free_color(&self, ps: &[usize]) -> u32 {
		let occupied = ps.iter().fold(0u32, |acc, &p| acc | self.mask(p));
		if occupied == u32::MAX {
			return SATURATED_COLOR;
		}
		// the saturated color is shareable, never report it as free
		(!occupied).trailing_zeros().min(SATURATED_COLOR)
	}

	pub fn assign_color(&mut self, a: usize, b: usize) -> u32 {
		self.assign(&[a, b])
	}

	pub fn assign(&mut self, ps: &[usize]) -> u32 {
		let color = self.free_color(ps);
		if color == SATURATED_COLOR {
			if ps.iter().any(|&p| self.has_color(p, color)) {
				warn!(?ps, "color saturated, falling back to serial color");
			}
			for &p in ps.iter() {
				*self.saturated.entry(p).or_insert(0) += 1;
			}
		}
		for &p in ps.iter() {
			*self.mask_mut(p) |= 1 << color;
		}
		self.usage[color as usize] += 1;
		self.ceiling = self.ceiling.max(color as usize + 1);
		color
	}

	pub fn release(&mut self, color: u32, ps: &[usize]) {
		let c = color as usize;
		if c >= MAX_COLORS || self.usage[c] == 0 {
			warn!(color, "release of unused color");
			return;
		}
		for &p in ps.iter() {
			if color == SATURATED_COLOR {
				match self.saturated.get_mut(&p) {
					Some(n) if *n > 1 => {
						*n -= 1;
						continue;
					}
					_ => {
						self.saturated.remove(&p);
					}
				}
			}
			if let Some(m) = self.masks.get_mut(p) {
				*m &= !(1 << color);
			}
		}
		self.usage[c] -= 1;
		while self.ceiling > 0 && self.usage[self.ceiling - 1] == 0 {
			self.ceiling -= 1;
		}
	}

	pub fn clear_particle(&mut self, p: usize) {
		if let Some(m) = self.masks.get_mut(p) {
			*m = 0;
		}
		self.saturated.remove(&p);
	}
}
