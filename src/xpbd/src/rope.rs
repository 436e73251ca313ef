//! Ropes: particle chains that reel in and out, grow while being built and
//! anchor their ends to points or other particles.
//!
//! A rope only holds indices. Every change goes through the allocate/set
//! primitives of `PWorld`, so colors stay consistent with the stores.

use tracing::{debug, info, warn};

use crate::constraint::Target;
use crate::error::{EngineError, Store};
use crate::physical_model::{PhysicalModel, ROPE_FRICTION};
use crate::pworld::PWorld;
use crate::V2;
use protocol::rope_record::{NodeRecord, PinRecord, PinTarget, RopeRecord};
use protocol::Message;

pub type RopeId = usize;

pub const DEFAULT_MAX_SEGMENTS: usize = 256;
pub const ANCHOR_COMPLIANCE: f32 = 1e-9;
// building ropes split the tail link beyond this ratio
const EXTEND_RATIO: f32 = 1.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RopeEnd {
	Head,
	Tail,
}

/// Invisible coupling of one rope particle to a point or another particle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RopeAnchor {
	pub particle: usize,
	pub target: Target,
	pub offset: V2,
	pub rest: f32,
	pub constraint: usize,
}

#[derive(Clone, Debug)]
pub struct Rope {
	// head first
	pub particles: Vec<usize>,
	// links[i] joins particles[i] and particles[i + 1]
	pub links: Vec<usize>,
	pub segment_length: f32,
	pub compliance: f32,
	pub imass: f32,
	pub radius: f32,
	pub anchors: Vec<RopeAnchor>,
	pub building: bool,
	pub max_segments: usize,
}

impl Rope {
	pub fn end_particle(&self, end: RopeEnd) -> usize {
		match end {
			RopeEnd::Head => self.particles[0],
			RopeEnd::Tail => self.particles[self.particles.len() - 1],
		}
	}

	pub fn anchor(&self, end: RopeEnd) -> Option<&RopeAnchor> {
		let p = self.end_particle(end);
		self.anchors.iter().find(|a| a.particle == p)
	}

	/// Links plus one segment per anchored end.
	pub fn segment_count(&self) -> usize {
		let anchored = [RopeEnd::Head, RopeEnd::Tail]
			.iter()
			.filter(|&&end| self.anchor(end).is_some())
			.count();
		self.links.len() + anchored
	}
}

impl PWorld {
	fn rope_ref(&self, id: RopeId) -> Result<&Rope, EngineError> {
		self.ropes
			.get(id)
			.and_then(|r| r.as_ref())
			.ok_or(EngineError::UnknownRope(id))
	}

	fn rope_mut(&mut self, id: RopeId) -> Result<&mut Rope, EngineError> {
		self.ropes
			.get_mut(id)
			.and_then(|r| r.as_mut())
			.ok_or(EngineError::UnknownRope(id))
	}

	fn insert_rope(&mut self, rope: Rope) -> RopeId {
		match self.ropes.iter().position(|r| r.is_none()) {
			Some(id) => {
				self.ropes[id] = Some(rope);
				id
			}
			None => {
				self.ropes.push(Some(rope));
				self.ropes.len() - 1
			}
		}
	}

	pub fn rope(&self, id: RopeId) -> Option<&Rope> {
		self.ropes.get(id).and_then(|r| r.as_ref())
	}

	pub fn rope_ids(&self) -> impl Iterator<Item = RopeId> + '_ {
		self.ropes
			.iter()
			.enumerate()
			.filter_map(|(id, r)| r.as_ref().map(|_| id))
	}

	/// Straight rope of `segments` links from `start` to `end`.
	pub fn spawn_rope(
		&mut self,
		start: V2,
		end: V2,
		segments: usize,
		imass: f32,
		compliance: f32,
	) -> Result<RopeId, EngineError> {
		if segments == 0 {
			return Err(EngineError::RopeTooShort {
				rope: self.ropes.len(),
				len: 1,
			});
		}
		let model = PhysicalModel::new_chain(start, end, segments + 1, imass, compliance);
		let radius = model.particles[0].radius;
		let handle = self.add_model(&model, V2::zeros())?;
		let rope = Rope {
			particles: handle.particles,
			links: handle.constraints,
			segment_length: (end - start).magnitude() / segments as f32,
			compliance,
			imass: imass.max(0.),
			radius,
			anchors: Vec::new(),
			building: false,
			max_segments: DEFAULT_MAX_SEGMENTS,
		};
		let id = self.insert_rope(rope);
		info!(rope = id, segments, "rope spawned");
		Ok(id)
	}

	pub fn remove_rope(&mut self, id: RopeId) -> Result<(), EngineError> {
		self.rope_ref(id)?;
		let Some(rope) = self.ropes[id].take() else {
			return Err(EngineError::UnknownRope(id));
		};
		for anchor in rope.anchors.iter() {
			self.release_constraint(anchor.constraint);
		}
		for &c in rope.links.iter() {
			self.release_constraint(c);
		}
		for &p in rope.particles.iter() {
			self.release_particle(p);
		}
		debug!(rope = id, "rope removed");
		Ok(())
	}

	pub fn set_rope_building(&mut self, id: RopeId, building: bool) -> Result<(), EngineError> {
		self.rope_mut(id)?.building = building;
		Ok(())
	}

	pub fn set_rope_max_segments(&mut self, id: RopeId, max_segments: usize) -> Result<(), EngineError> {
		self.rope_mut(id)?.max_segments = max_segments;
		Ok(())
	}

	/// Splits the final link at its midpoint. Returns the new particle.
	pub fn reel_out(&mut self, id: RopeId) -> Result<usize, EngineError> {
		let rope = self.rope_ref(id)?;
		let n = rope.particles.len();
		if n < 2 || rope.links.is_empty() {
			return Err(EngineError::RopeTooShort { rope: id, len: n });
		}
		let pa = rope.particles[n - 2];
		let pb = rope.particles[n - 1];
		let last_link = rope.links[rope.links.len() - 1];
		let (seg, compliance, imass, radius) =
			(rope.segment_length, rope.compliance, rope.imass, rope.radius);
		let (a, b) = match (self.particle(pa), self.particle(pb)) {
			(Some(a), Some(b)) => (*a, *b),
			(None, _) => {
				return Err(EngineError::InvalidTopology {
					constraint: last_link,
					particle: pa,
				})
			}
			(_, None) => {
				return Err(EngineError::InvalidTopology {
					constraint: last_link,
					particle: pb,
				})
			}
		};

		let m = self
			.allocate_particle()
			.ok_or(EngineError::StoreExhausted(Store::Particle))?;
		let Some(c2) = self.allocate_constraint() else {
			self.release_particle(m);
			return Err(EngineError::StoreExhausted(Store::Constraint));
		};
		self.set_particle(m, (a.pos + b.pos) * 0.5, imass, ROPE_FRICTION, radius);
		self.set_particle_velocity_from(m, (a.ppos + b.ppos) * 0.5);
		self.set_distance_constraint(last_link, pa, m, seg, compliance)?;
		self.set_distance_constraint(c2, m, pb, seg, compliance)?;

		let rope = self.rope_mut(id)?;
		rope.particles.insert(n - 1, m);
		rope.links.push(c2);
		Ok(m)
	}

	/// Removes the second-to-last particle and joins its neighbours.
	pub fn reel_in(&mut self, id: RopeId) -> Result<(), EngineError> {
		let rope = self.rope_ref(id)?;
		let n = rope.particles.len();
		if n < 3 {
			return Err(EngineError::RopeTooShort { rope: id, len: n });
		}
		let prev = rope.particles[n - 3];
		let victim = rope.particles[n - 2];
		let last = rope.particles[n - 1];
		let prev_link = rope.links[n - 3];
		let last_link = rope.links[n - 2];
		let (seg, compliance) = (rope.segment_length, rope.compliance);
		let victim_anchors: Vec<usize> = rope
			.anchors
			.iter()
			.filter(|a| a.particle == victim)
			.map(|a| a.constraint)
			.collect();

		self.release_constraint(last_link);
		for &c in victim_anchors.iter() {
			self.release_constraint(c);
		}
		self.release_particle(victim);
		self.set_distance_constraint(prev_link, prev, last, seg, compliance)?;

		let rope = self.rope_mut(id)?;
		rope.particles.remove(n - 2);
		rope.links.pop();
		rope.anchors.retain(|a| a.particle != victim);
		Ok(())
	}

	/// Couples an end through an invisible stiff constraint, replacing any
	/// anchor it already had. Returns the constraint index.
	pub fn anchor_rope(
		&mut self,
		id: RopeId,
		end: RopeEnd,
		target: Target,
		offset: V2,
		rest: f32,
	) -> Result<usize, EngineError> {
		let p = self.rope_ref(id)?.end_particle(end);
		self.detach_rope(id, end)?;
		let c = self
			.allocate_constraint()
			.ok_or(EngineError::StoreExhausted(Store::Constraint))?;
		if let Err(e) =
			self.set_anchor_constraint(c, p, target, offset, rest, ANCHOR_COMPLIANCE, false)
		{
			self.release_constraint(c);
			return Err(e);
		}
		self.rope_mut(id)?.anchors.push(RopeAnchor {
			particle: p,
			target,
			offset,
			rest,
			constraint: c,
		});
		Ok(c)
	}

	/// Returns false when the end was not anchored.
	pub fn detach_rope(&mut self, id: RopeId, end: RopeEnd) -> Result<bool, EngineError> {
		let rope = self.rope_mut(id)?;
		let p = rope.end_particle(end);
		let Some(pos) = rope.anchors.iter().position(|a| a.particle == p) else {
			return Ok(false);
		};
		let anchor = rope.anchors.remove(pos);
		self.release_constraint(anchor.constraint);
		Ok(true)
	}

	/// Grows building ropes toward their driven tail.
	pub(crate) fn tick_ropes(&mut self) {
		let ids: Vec<RopeId> = self
			.ropes
			.iter()
			.enumerate()
			.filter_map(|(id, r)| r.as_ref().filter(|r| r.building).map(|_| id))
			.collect();
		for id in ids {
			while self.rope_needs_extension(id) {
				if let Err(e) = self.reel_out(id) {
					warn!(rope = id, error = %e, "rope extension stopped");
					break;
				}
			}
		}
	}

	fn rope_needs_extension(&self, id: RopeId) -> bool {
		let Ok(rope) = self.rope_ref(id) else {
			return false;
		};
		let n = rope.particles.len();
		if n < 2 || rope.segment_count() >= rope.max_segments || rope.segment_length <= 0. {
			return false;
		}
		match (self.particle(rope.particles[n - 2]), self.particle(rope.particles[n - 1])) {
			(Some(a), Some(b)) => {
				(b.pos - a.pos).magnitude() > EXTEND_RATIO * rope.segment_length
			}
			_ => false,
		}
	}

	/// Rebuilds a persisted rope. Link rest lengths snap to the node spacing.
	pub fn load_rope(&mut self, record: &RopeRecord) -> Result<RopeId, EngineError> {
		if !record.is_well_formed() {
			return Err(EngineError::Decode("malformed rope record".to_string()));
		}
		let model = PhysicalModel::from_record(record);
		let links = model.links();
		let handle = self.add_model(&model, V2::zeros())?;
		let length: f32 = record
			.nodes
			.windows(2)
			.map(|w| (V2::from(w[1].pos) - V2::from(w[0].pos)).magnitude())
			.sum();
		let anchors = record
			.pins
			.iter()
			.zip(handle.constraints[links..].iter())
			.map(|(pin, &constraint)| RopeAnchor {
				particle: handle.particles[pin.node],
				target: match pin.target {
					PinTarget::Point(p) => Target::Fixed(V2::new(p[0], p[1])),
					PinTarget::Node(other) => Target::Particle(handle.particles[other]),
				},
				offset: V2::zeros(),
				rest: pin.rest_length,
				constraint,
			})
			.collect();
		let rope = Rope {
			particles: handle.particles,
			links: handle.constraints[..links].to_vec(),
			segment_length: length / links as f32,
			compliance: record.compliance,
			imass: record.nodes[record.nodes.len() - 1].imass,
			radius: record.radius,
			anchors,
			building: false,
			max_segments: DEFAULT_MAX_SEGMENTS,
		};
		let id = self.insert_rope(rope);
		info!(rope = id, nodes = record.nodes.len(), pins = record.pins.len(), "rope loaded");
		Ok(id)
	}

	pub fn load_rope_bytes(&mut self, bytes: &[u8]) -> Result<RopeId, EngineError> {
		match Message::from_bytes(bytes)? {
			Message::Rope(record) => self.load_rope(&record),
			_ => Err(EngineError::Decode("not a rope message".to_string())),
		}
	}

	/// Current layout of a rope. Anchors to particles outside the rope are
	/// stored as points at the target's current position.
	pub fn rope_record(&self, id: RopeId) -> Result<RopeRecord, EngineError> {
		let rope = self.rope_ref(id)?;
		let mut nodes = Vec::with_capacity(rope.particles.len());
		for &idx in rope.particles.iter() {
			let p = self
				.particle(idx)
				.ok_or(EngineError::InvalidIndex(idx))?;
			nodes.push(NodeRecord {
				pos: [p.pos[0], p.pos[1]],
				imass: p.imass,
			});
		}
		let mut pins = Vec::with_capacity(rope.anchors.len());
		for anchor in rope.anchors.iter() {
			let Some(node) = rope.particles.iter().position(|&p| p == anchor.particle) else {
				continue;
			};
			let internal = match anchor.target {
				Target::Particle(other) => rope.particles.iter().position(|&p| p == other),
				Target::Fixed(_) => None,
			};
			let target = match (internal, anchor.target) {
				(Some(other), _) => PinTarget::Node(other),
				(None, Target::Fixed(pos)) => {
					let pos = pos + anchor.offset;
					PinTarget::Point([pos[0], pos[1]])
				}
				(None, Target::Particle(other)) => {
					let Some(p) = self.particle(other) else {
						continue;
					};
					let pos = p.pos + anchor.offset;
					PinTarget::Point([pos[0], pos[1]])
				}
			};
			pins.push(PinRecord {
				node,
				target,
				rest_length: anchor.rest,
			});
		}
		Ok(RopeRecord {
			nodes,
			pins,
			compliance: rope.compliance,
			radius: rope.radius,
		})
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::constraint::ConstraintKind;

	fn rope3(world: &mut PWorld) -> RopeId {
		world
			.spawn_rope(V2::zeros(), V2::new(2., 0.), 2, 1., 0.)
			.unwrap()
	}

	#[test]
	fn test_spawn() {
		let mut world = PWorld::default();
		let id = rope3(&mut world);
		let rope = world.rope(id).unwrap();
		assert_eq!(rope.particles.len(), 3);
		assert_eq!(rope.links.len(), 2);
		assert_eq!(rope.segment_count(), 2);
		assert_eq!(rope.segment_length, 1.);
		assert!(world.spawn_rope(V2::zeros(), V2::zeros(), 0, 1., 0.).is_err());
	}

	#[test]
	fn test_reel_out_anchored() {
		let mut world = PWorld::default();
		let id = rope3(&mut world);
		world
			.anchor_rope(id, RopeEnd::Head, Target::Fixed(V2::new(-1., 0.)), V2::zeros(), 1.)
			.unwrap();
		assert_eq!(world.rope(id).unwrap().segment_count(), 3);

		let m = world.reel_out(id).unwrap();
		let rope = world.rope(id).unwrap();
		assert_eq!(rope.particles.len(), 4);
		assert_eq!(rope.segment_count(), 4);
		assert_eq!(rope.particles[2], m);
		assert_eq!(world.particle(m).unwrap().pos, V2::new(1.5, 0.));
		// both halves colored apart from their neighbours
		let colors: Vec<u32> = rope
			.links
			.iter()
			.map(|&c| world.constraint(c).unwrap().color.unwrap())
			.collect();
		for w in colors.windows(2) {
			assert_ne!(w[0], w[1]);
		}
	}

	#[test]
	fn test_reel_round_trip() {
		let mut world = PWorld::default();
		let id = rope3(&mut world);
		let particles = world.rope(id).unwrap().particles.clone();
		let links = world.rope(id).unwrap().links.clone();
		let kinds: Vec<ConstraintKind> =
			links.iter().map(|&c| world.constraint(c).unwrap().kind).collect();

		world.reel_out(id).unwrap();
		world.reel_in(id).unwrap();

		let rope = world.rope(id).unwrap();
		assert_eq!(rope.particles, particles);
		assert_eq!(rope.links, links);
		for (&c, kind) in links.iter().zip(kinds.iter()) {
			assert_eq!(world.constraint(c).unwrap().kind, *kind);
		}
		assert_eq!(world.particle_len(), 3);
		assert_eq!(world.constraint_len(), 2);
	}

	#[test]
	fn test_reel_in_too_short() {
		let mut world = PWorld::default();
		let id = world
			.spawn_rope(V2::zeros(), V2::new(1., 0.), 1, 1., 0.)
			.unwrap();
		assert_eq!(
			world.reel_in(id),
			Err(EngineError::RopeTooShort { rope: id, len: 2 })
		);
		assert_eq!(world.reel_in(id + 1), Err(EngineError::UnknownRope(id + 1)));
	}

	#[test]
	fn test_reel_in_keeps_tail_anchor() {
		let mut world = PWorld::default();
		let id = rope3(&mut world);
		let mid = world.rope(id).unwrap().particles[1];
		world.anchor_rope(id, RopeEnd::Tail, Target::Fixed(V2::new(3., 0.)), V2::zeros(), 1.)
			.unwrap();
		world.reel_in(id).unwrap();
		let rope = world.rope(id).unwrap();
		assert_eq!(rope.particles.len(), 2);
		assert_eq!(rope.segment_count(), 2);
		assert!(world.particle(mid).is_none());
	}

	#[test]
	fn test_anchor_and_detach() {
		let mut world = PWorld::default();
		let id = rope3(&mut world);
		let c = world
			.anchor_rope(id, RopeEnd::Tail, Target::Fixed(V2::new(2., 1.)), V2::zeros(), 1.)
			.unwrap();
		let constraint = world.constraint(c).unwrap();
		assert!(!constraint.visible);
		assert_eq!(constraint.color, None);
		// re-anchoring replaces
		let c2 = world
			.anchor_rope(id, RopeEnd::Tail, Target::Fixed(V2::new(2., 2.)), V2::zeros(), 2.)
			.unwrap();
		assert_eq!(c2, c);
		assert_eq!(world.rope(id).unwrap().anchors.len(), 1);
		assert_eq!(world.detach_rope(id, RopeEnd::Tail), Ok(true));
		assert_eq!(world.detach_rope(id, RopeEnd::Tail), Ok(false));
		assert!(world.constraint(c).is_none());
	}

	#[test]
	fn test_building_extends() {
		let mut world = PWorld::default();
		let id = world
			.spawn_rope(V2::zeros(), V2::new(1., 0.), 1, 1., 0.)
			.unwrap();
		world.set_rope_building(id, true).unwrap();
		let tail = world.rope(id).unwrap().end_particle(RopeEnd::Tail);
		world.set_particle(tail, V2::new(4., 0.), 1., 0., 0.);
		world.tick_ropes();
		let rope = world.rope(id).unwrap();
		assert_eq!(rope.particles.len(), 4);
		assert_eq!(rope.links.len(), 3);
		let n = rope.particles.len();
		let a = world.particle(rope.particles[n - 2]).unwrap().pos;
		assert_eq!(a, V2::new(3., 0.));

		world.set_rope_max_segments(id, 4).unwrap();
		world.set_particle(tail, V2::new(40., 0.), 1., 0., 0.);
		world.tick_ropes();
		assert_eq!(world.rope(id).unwrap().links.len(), 4);
	}

	#[test]
	fn test_building_cap_counts_anchors() {
		let mut world = PWorld::default();
		let id = world
			.spawn_rope(V2::zeros(), V2::new(1., 0.), 1, 1., 0.)
			.unwrap();
		world
			.anchor_rope(id, RopeEnd::Head, Target::Fixed(V2::new(-1., 0.)), V2::zeros(), 1.)
			.unwrap();
		world.set_rope_building(id, true).unwrap();
		world.set_rope_max_segments(id, 4).unwrap();
		let tail = world.rope(id).unwrap().end_particle(RopeEnd::Tail);
		world.set_particle(tail, V2::new(40., 0.), 1., 0., 0.);
		world.tick_ropes();
		let rope = world.rope(id).unwrap();
		assert_eq!(rope.segment_count(), 4);
		assert_eq!(rope.links.len(), 3);
	}

	#[test]
	fn test_not_building_stays() {
		let mut world = PWorld::default();
		let id = world
			.spawn_rope(V2::zeros(), V2::new(1., 0.), 1, 1., 0.)
			.unwrap();
		let tail = world.rope(id).unwrap().end_particle(RopeEnd::Tail);
		world.set_particle(tail, V2::new(4., 0.), 1., 0., 0.);
		world.tick_ropes();
		assert_eq!(world.rope(id).unwrap().particles.len(), 2);
	}

	#[test]
	fn test_record_reload() {
		let mut world = PWorld::default();
		let id = rope3(&mut world);
		world
			.anchor_rope(id, RopeEnd::Head, Target::Fixed(V2::new(0., 1.)), V2::zeros(), 1.)
			.unwrap();
		let record = world.rope_record(id).unwrap();
		assert_eq!(record.nodes.len(), 3);
		assert_eq!(
			record.pins,
			vec![PinRecord {
				node: 0,
				target: PinTarget::Point([0., 1.]),
				rest_length: 1.,
			}]
		);

		world.remove_rope(id).unwrap();
		assert_eq!(world.particle_len(), 0);
		assert_eq!(world.constraint_len(), 0);
		assert!(world.rope(id).is_none());

		let bytes = Message::Rope(record.clone()).to_bytes().unwrap();
		let id = world.load_rope_bytes(&bytes).unwrap();
		let rope = world.rope(id).unwrap();
		assert_eq!(rope.particles.len(), 3);
		assert_eq!(rope.links.len(), 2);
		assert_eq!(rope.segment_count(), 3);
		assert_eq!(rope.segment_length, 1.);
		assert_eq!(world.rope_record(id).unwrap(), record);
	}

	#[test]
	fn test_load_rejects() {
		let mut world = PWorld::default();
		let nop = Message::Nop.to_bytes().unwrap();
		assert!(matches!(world.load_rope_bytes(&nop), Err(EngineError::Decode(_))));
		assert!(matches!(world.load_rope_bytes(&[1, 2]), Err(EngineError::Decode(_))));
		let record = RopeRecord {
			nodes: vec![NodeRecord { pos: [0., 0.], imass: 1. }],
			pins: vec![],
			compliance: 0.,
			radius: 0.1,
		};
		assert!(world.load_rope(&record).is_err());
		assert_eq!(world.particle_len(), 0);
	}
}
