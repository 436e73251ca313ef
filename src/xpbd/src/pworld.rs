use std::sync::mpsc::{Receiver, Sender};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::coloring::GraphColorer;
use crate::constraint::constraint_template::{ConstraintTemplate, TargetTemplate};
use crate::constraint::{
	AnchorConstraint, AngleConstraint, AreaConstraint, Constraint,
	ConstraintKind, ConstraintStore, DistanceConstraint, Target,
};
use crate::controller_message::ControllerMessage;
use crate::device::DeviceState;
use crate::error::{EngineError, Store};
use crate::obstacle::{self, Obstacle, ObstacleStore, ObstacleSync, RayHit};
use crate::params::SimParams;
use crate::particle::{Particle, ParticleStore};
use crate::physical_model::PhysicalModel;
use crate::query::{self, AnchorHit, CallerId, QueryQueue, QueryRequest, QueryResponse, Ticket};
use crate::readback::{Poll, Readback};
use crate::rope::Rope;
use crate::V2;
use protocol::pr_model::PrModel;
use protocol::user_event::UpdateInfo;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
	Dispatched(u64),
	// previous readback unresolved, frame dropped
	Skipped,
	Paused,
}

/// Instantiated model, indices into the stores in template order.
#[derive(Clone, Debug, Default)]
pub struct ModelHandle {
	pub particles: Vec<usize>,
	pub constraints: Vec<usize>,
}

pub struct PWorld {
	pub params: SimParams,
	frame: u64,
	dropped_frames: u64,

	// -1: always play
	// 0: pause
	// n: play n frames
	forward_frames: i32,

	particles: ParticleStore,
	constraints: ConstraintStore,
	colorer: GraphColorer,
	obstacles: ObstacleStore,
	pub(crate) ropes: Vec<Option<Rope>>,

	// None while the frame runs on the pool
	device: Option<Box<DeviceState>>,
	constraints_dirty: bool,
	readback: Readback,
	queries: QueryQueue,
	query_results: Vec<QueryResponse>,
}

impl Default for PWorld {
	fn default() -> Self {
		Self::with_capacity(1 << 16, 1 << 17)
	}
}

impl PWorld {
	pub fn with_capacity(particles: usize, constraints: usize) -> Self {
		Self {
			params: SimParams::default(),
			frame: 0,
			dropped_frames: 0,
			forward_frames: -1,
			particles: ParticleStore::new(particles),
			constraints: ConstraintStore::new(constraints),
			colorer: GraphColorer::default(),
			obstacles: ObstacleStore::default(),
			ropes: Vec::new(),
			device: Some(Box::default()),
			constraints_dirty: true,
			readback: Readback::default(),
			queries: QueryQueue::default(),
			query_results: Vec::new(),
		}
	}

	pub fn with_params(mut self, params: SimParams) -> Self {
		self.params = params;
		self
	}

	pub fn with_paused(mut self) -> Self {
		self.forward_frames = 0;
		self
	}

	fn touch(&mut self, idx: usize) {
		if let Some(p) = self.particles.as_slice().get(idx) {
			self.readback.record(idx, *p);
		}
	}

	// particles

	pub fn allocate_particle(&mut self) -> Option<usize> {
		let idx = self.particles.allocate();
		match idx {
			Some(idx) => self.touch(idx),
			None => warn!(
				capacity = self.particles.capacity(),
				"particle store exhausted"
			),
		}
		idx
	}

	pub fn release_particle(&mut self, idx: usize) -> bool {
		if !self.particles.release(idx) {
			return false;
		}
		self.colorer.clear_particle(idx);
		self.touch(idx);
		true
	}

	pub fn set_particle(
		&mut self,
		idx: usize,
		pos: V2,
		imass: f32,
		friction: f32,
		radius: f32,
	) -> bool {
		let result = self.particles.set(idx, pos, imass, friction, radius);
		if result {
			self.touch(idx);
		}
		result
	}

	pub fn set_particle_free(&mut self, idx: usize, free: bool) -> bool {
		let Some(p) = self.particles.get_mut(idx) else {
			return false;
		};
		if free && !p.free {
			p.drive = p.pos;
		}
		p.free = free;
		self.touch(idx);
		true
	}

	/// Moves the driver of a free particle; the host copy follows at once.
	pub fn drive_particle(&mut self, idx: usize, pos: V2) -> bool {
		let Some(p) = self.particles.get_mut(idx) else {
			return false;
		};
		p.drive = pos;
		if p.free {
			p.pos = pos;
		}
		self.touch(idx);
		true
	}

	pub(crate) fn set_particle_velocity_from(&mut self, idx: usize, ppos: V2) {
		if let Some(p) = self.particles.get_mut(idx) {
			p.ppos = ppos;
			self.touch(idx);
		}
	}

	pub fn particle(&self, idx: usize) -> Option<&Particle> {
		self.particles.get(idx)
	}

	pub fn particle_len(&self) -> usize {
		self.particles.live_len()
	}

	// constraints

	pub fn allocate_constraint(&mut self) -> Option<usize> {
		let idx = self.constraints.allocate();
		if idx.is_none() {
			warn!(
				capacity = self.constraints.capacity(),
				"constraint store exhausted"
			);
		}
		idx
	}

	pub fn release_constraint(&mut self, idx: usize) -> bool {
		let Some(old) = self.constraints.release(idx) else {
			return false;
		};
		if let Some(color) = old.color {
			self.colorer.release(color, &old.particles());
		}
		self.constraints_dirty = true;
		true
	}

	/// Gives back the color of a live constraint, it moves to the serial pass.
	pub fn release_color(&mut self, idx: usize) -> bool {
		let Some(c) = self.constraints.get_mut(idx) else {
			return false;
		};
		let Some(color) = c.color.take() else {
			return false;
		};
		let ps = c.particles();
		self.colorer.release(color, &ps);
		self.constraints_dirty = true;
		true
	}

	pub fn assign_color(&mut self, a: usize, b: usize) -> u32 {
		self.colorer.assign_color(a, b)
	}

	pub fn colorer(&self) -> &GraphColorer {
		&self.colorer
	}

	pub fn constraint(&self, idx: usize) -> Option<&Constraint> {
		self.constraints.get(idx)
	}

	pub fn constraint_len(&self) -> usize {
		self.constraints.live_len()
	}

	/// Current value of the constrained quantity (length, angle, area).
	pub fn measure(&self, idx: usize) -> Option<f32> {
		self.constraints.get(idx)?.measure(self.particles.as_slice())
	}

	fn check_topology(
		&self,
		idx: usize,
		kind: &ConstraintKind,
	) -> Result<Vec<usize>, EngineError> {
		if self.constraints.get(idx).is_none() {
			return Err(EngineError::InvalidIndex(idx));
		}
		let ps = match kind {
			ConstraintKind::None => Vec::new(),
			ConstraintKind::Distance(c) => c.ps.to_vec(),
			ConstraintKind::Angle(c) => c.ps.to_vec(),
			ConstraintKind::Area(c) => c.ps.to_vec(),
			ConstraintKind::Anchor(c) => match c.target {
				Target::Fixed(_) => vec![c.p],
				Target::Particle(other) => vec![c.p, other],
			},
		};
		if let Some(&dead) = ps.iter().find(|&&p| !self.particles.is_live(p)) {
			return Err(EngineError::InvalidTopology {
				constraint: idx,
				particle: dead,
			});
		}
		Ok(ps)
	}

	/// Rewrites a constraint and recolors it; invisible ones go to the
	/// auxiliary pass uncolored.
	pub fn set_constraint(
		&mut self,
		idx: usize,
		kind: ConstraintKind,
		rest: f32,
		compliance: f32,
		visible: bool,
	) -> Result<(), EngineError> {
		let ps = self.check_topology(idx, &kind)?;
		self.release_color(idx);
		let color = if visible && !ps.is_empty() {
			Some(self.colorer.assign(&ps))
		} else {
			None
		};
		if let Some(c) = self.constraints.get_mut(idx) {
			c.kind = kind;
			c.rest = rest;
			c.compliance = compliance.max(0.);
			c.visible = visible;
			c.color = color;
		}
		self.constraints_dirty = true;
		Ok(())
	}

	pub fn set_distance_constraint(
		&mut self,
		idx: usize,
		a: usize,
		b: usize,
		rest: f32,
		compliance: f32,
	) -> Result<(), EngineError> {
		let kind = ConstraintKind::Distance(DistanceConstraint::new(a, b));
		self.set_constraint(idx, kind, rest, compliance, true)
	}

	// only pulls when stretched beyond rest
	pub fn set_inequality_constraint(
		&mut self,
		idx: usize,
		a: usize,
		b: usize,
		rest: f32,
		compliance: f32,
	) -> Result<(), EngineError> {
		let kind = ConstraintKind::Distance(
			DistanceConstraint::new(a, b).attractive_only(),
		);
		self.set_constraint(idx, kind, rest, compliance, true)
	}

	pub fn set_angle_constraint(
		&mut self,
		idx: usize,
		a: usize,
		vertex: usize,
		c: usize,
		rest: f32,
		compliance: f32,
	) -> Result<(), EngineError> {
		let kind = ConstraintKind::Angle(AngleConstraint::new(a, vertex, c));
		self.set_constraint(idx, kind, rest, compliance, true)
	}

	pub fn set_area_constraint(
		&mut self,
		idx: usize,
		a: usize,
		b: usize,
		c: usize,
		rest: f32,
		compliance: f32,
	) -> Result<(), EngineError> {
		let kind = ConstraintKind::Area(AreaConstraint::new(a, b, c));
		self.set_constraint(idx, kind, rest, compliance, true)
	}

	#[allow(clippy::too_many_arguments)]
	pub fn set_anchor_constraint(
		&mut self,
		idx: usize,
		p: usize,
		target: Target,
		offset: V2,
		rest: f32,
		compliance: f32,
		visible: bool,
	) -> Result<(), EngineError> {
		let kind = ConstraintKind::Anchor(
			AnchorConstraint::new(p, target).with_offset(offset),
		);
		self.set_constraint(idx, kind, rest, compliance, visible)
	}

	/// Allocates and sets a constraint whose rest value is the current one.
	pub fn add_constraint(
		&mut self,
		kind: ConstraintKind,
		compliance: f32,
		visible: bool,
	) -> Result<usize, EngineError> {
		let idx = self
			.allocate_constraint()
			.ok_or(EngineError::StoreExhausted(Store::Constraint))?;
		let probe = Constraint {
			kind,
			active: true,
			..Default::default()
		};
		if let Err(e) = self.check_topology(idx, &kind) {
			self.release_constraint(idx);
			return Err(e);
		}
		let rest = probe.measure(self.particles.as_slice()).unwrap_or(0.);
		self.set_constraint(idx, kind, rest, compliance, visible)?;
		Ok(idx)
	}

	pub fn link_particles(
		&mut self,
		a: usize,
		b: usize,
		compliance: f32,
	) -> Result<usize, EngineError> {
		let kind = ConstraintKind::Distance(DistanceConstraint::new(a, b));
		self.add_constraint(kind, compliance, true)
	}

	// obstacles

	pub fn set_obstacle(
		&mut self,
		idx: usize,
		obstacle: Obstacle,
	) -> Result<(), EngineError> {
		if self.obstacles.set(idx, obstacle) {
			Ok(())
		} else {
			Err(EngineError::InvalidIndex(idx))
		}
	}

	pub fn remove_obstacle(&mut self, idx: usize) -> Option<Obstacle> {
		self.obstacles.remove(idx)
	}

	pub fn obstacle(&self, idx: usize) -> Option<&Obstacle> {
		self.obstacles.get(idx)
	}

	pub fn obstacle_count(&self) -> usize {
		self.obstacles.len()
	}

	// models

	/// Instantiates a model through the allocate/set primitives; nothing is
	/// left behind when a store runs out midway.
	pub fn add_model(
		&mut self,
		physical_model: &PhysicalModel,
		offset: V2,
	) -> Result<ModelHandle, EngineError> {
		debug!(
			particles = physical_model.particles.len(),
			constraints = physical_model.constraints.len(),
			"add model"
		);
		let mut handle = ModelHandle::default();
		let result = self.add_model_into(physical_model, offset, &mut handle);
		if result.is_err() {
			for &c in handle.constraints.iter() {
				self.release_constraint(c);
			}
			for &p in handle.particles.iter() {
				self.release_particle(p);
			}
		}
		result.map(|_| handle)
	}

	fn add_model_into(
		&mut self,
		physical_model: &PhysicalModel,
		offset: V2,
		handle: &mut ModelHandle,
	) -> Result<(), EngineError> {
		for p in physical_model.particles.iter() {
			let idx = self
				.allocate_particle()
				.ok_or(EngineError::StoreExhausted(Store::Particle))?;
			handle.particles.push(idx);
			self.set_particle(idx, p.pos + offset, p.imass, p.friction, p.radius);
		}
		let id_map = &handle.particles;
		for c in physical_model.constraints.iter() {
			let local = match c {
				ConstraintTemplate::Distance(ct) => ct.ps.to_vec(),
				ConstraintTemplate::Pin(ct) => match ct.target {
					TargetTemplate::Point(_) => vec![ct.p],
					TargetTemplate::Local(other) => vec![ct.p, other],
				},
			};
			if let Some(&bad) = local.iter().find(|&&i| i >= id_map.len()) {
				return Err(EngineError::InvalidIndex(bad));
			}
		}
		for c in physical_model.constraints.iter() {
			let idx = self
				.allocate_constraint()
				.ok_or(EngineError::StoreExhausted(Store::Constraint))?;
			handle.constraints.push(idx);
			let id_map = &handle.particles;
			match c {
				ConstraintTemplate::Distance(ct) => {
					let p1 = id_map[ct.ps[0]];
					let p2 = id_map[ct.ps[1]];
					let kind = ConstraintKind::Distance(
						DistanceConstraint::new(p1, p2).with_ty(ct.ty),
					);
					let l0 = match ct.l0 {
						Some(l0) => l0,
						None => {
							let ps = self.particles.as_slice();
							(ps[p1].pos - ps[p2].pos).magnitude()
						}
					};
					self.set_constraint(idx, kind, l0, ct.compliance, true)?;
				}
				ConstraintTemplate::Pin(ct) => {
					let p = id_map[ct.p];
					let target = match ct.target {
						TargetTemplate::Point(pos) => Target::Fixed(pos + offset),
						TargetTemplate::Local(other) => Target::Particle(id_map[other]),
					};
					self.set_anchor_constraint(
						idx,
						p,
						target,
						V2::zeros(),
						ct.l0,
						ct.compliance,
						false,
					)?;
				}
			}
		}
		Ok(())
	}

	// stepping

	fn upload(&mut self, device: &mut DeviceState) {
		device.particles.clear();
		device.particles.extend_from_slice(self.particles.as_slice());
		if self.constraints_dirty {
			device.upload_constraints(
				self.constraints.as_slice(),
				self.colorer.active_colors(),
			);
			debug!(
				constraints = ?device.group.len(),
				colors = device.group.color_len(),
				"constraints uploaded"
			);
			self.constraints_dirty = false;
		}
		if let ObstacleSync::Partial(n) = self.obstacles.sync(&mut device.obstacles) {
			debug!(n, "obstacle partial upload");
		}
	}

	/// Advances one frame. Returns at once; results land on a later `poll`.
	pub fn step(&mut self, params: &SimParams) -> StepOutcome {
		self.poll();
		if self.readback.in_flight() {
			self.dropped_frames += 1;
			debug!(frame = self.frame, "readback busy, frame dropped");
			return StepOutcome::Skipped;
		}
		if params.paused {
			return StepOutcome::Paused;
		}
		self.tick_ropes();
		let mut device = self.device.take().unwrap_or_default();
		self.upload(&mut device);
		self.frame += 1;
		self.readback.dispatch(self.frame, device, params.clone());
		StepOutcome::Dispatched(self.frame)
	}

	fn on_poll(&mut self, poll: Poll) -> bool {
		match poll {
			Poll::Pending => return false,
			Poll::Idle => {}
			Poll::Ready(device) => {
				debug!(dirty = self.readback.dirty_len(), "reconcile");
				self.readback
					.reconcile(&mut self.particles, &device.particles);
				self.device = Some(device);
			}
			Poll::Lost => {
				self.device = Some(Box::default());
				self.constraints_dirty = true;
				self.obstacles.invalidate();
			}
		}
		self.answer_queries();
		true
	}

	/// Non-blocking. True when no frame is in flight anymore.
	pub fn poll(&mut self) -> bool {
		let poll = self.readback.poll(false);
		self.on_poll(poll)
	}

	/// Blocks until the in-flight frame, if any, is merged.
	pub fn finish(&mut self) {
		let poll = self.readback.poll(true);
		self.on_poll(poll);
	}

	pub fn frame(&self) -> u64 {
		self.frame
	}

	pub fn dropped_frames(&self) -> u64 {
		self.dropped_frames
	}

	pub fn in_flight(&self) -> bool {
		self.readback.in_flight()
	}

	// queries

	pub fn find_anchor(&self, pos: V2, ignore: &[usize]) -> Option<AnchorHit> {
		query::find_anchor(
			self.particles.as_slice(),
			self.obstacles.as_slice(),
			pos,
			ignore,
		)
	}

	pub fn raycast(
		&self,
		origin: V2,
		dir: V2,
		max_dist: f32,
		mask: u32,
	) -> Option<RayHit> {
		obstacle::raycast(self.obstacles.as_slice(), origin, dir, max_dist, mask)
	}

	/// Answered after the next readback resolves; replaces the caller's
	/// previous request.
	pub fn submit_query(&mut self, caller: CallerId, request: QueryRequest) -> Ticket {
		self.queries.submit(caller, request)
	}

	pub fn cancel_query(&mut self, caller: CallerId) -> bool {
		self.queries.cancel(caller)
	}

	fn answer_queries(&mut self) {
		if self.queries.is_empty() {
			return;
		}
		let answers = self
			.queries
			.resolve(self.particles.as_slice(), self.obstacles.as_slice());
		self.query_results.extend(answers);
	}

	pub fn drain_query_results(&mut self) -> Vec<QueryResponse> {
		std::mem::take(&mut self.query_results)
	}

	// snapshots

	pub fn pr_model(&self) -> PrModel {
		PrModel {
			particles: self
				.particles
				.iter_live()
				.map(|(id, p)| p.render(id))
				.collect(),
			constraints: self
				.constraints
				.iter_live()
				.filter_map(|(id, c)| c.render(id))
				.collect(),
			obstacles: self.obstacles.as_slice().iter().map(|o| o.render()).collect(),
		}
	}

	pub fn update_info(&self) -> UpdateInfo {
		let visible = self
			.constraints
			.iter_live()
			.filter(|(_, c)| c.visible)
			.count();
		UpdateInfo {
			frame: self.frame,
			dropped_frames: self.dropped_frames,
			particle_len: self.particles.live_len(),
			constraint_len: vec![visible, self.constraints.live_len() - visible],
			color_len: self.colorer.active_colors(),
			obstacle_len: self.obstacles.len(),
		}
	}

	// play mode

	/// Returns false on `Quit`.
	pub fn apply_message(&mut self, msg: ControllerMessage) -> bool {
		match msg {
			ControllerMessage::TogglePause => {
				if self.forward_frames == 0 {
					self.forward_frames = -1;
				} else {
					self.forward_frames = 0;
				}
			}
			ControllerMessage::FrameForward => {
				if self.forward_frames == 0 {
					self.forward_frames += 1;
				}
			}
			ControllerMessage::DragParticle(idx, pos) => {
				self.set_particle_free(idx, true);
				self.drive_particle(idx, V2::new(pos[0], pos[1]));
			}
			ControllerMessage::ReleaseParticle(idx) => {
				self.set_particle_free(idx, false);
			}
			ControllerMessage::Quit => return false,
		}
		true
	}

	/// Steps with the world's own params, honoring pause and frame-forward.
	pub fn run(&mut self) -> StepOutcome {
		if self.forward_frames == 0 {
			self.poll();
			return StepOutcome::Paused;
		}
		let params = self.params.clone();
		let outcome = self.step(&params);
		if matches!(outcome, StepOutcome::Dispatched(_)) && self.forward_frames > 0 {
			self.forward_frames -= 1;
		}
		outcome
	}

	pub fn run_thread(
		&mut self,
		tx: Sender<(PrModel, UpdateInfo)>,
		rx: Receiver<ControllerMessage>,
	) {
		info!(dt = self.params.dt, "frame loop started");
		let frame_time = Duration::try_from_secs_f32(self.params.dt).unwrap_or_default();
		let mut last_sent = None;
		loop {
			let start_time = Instant::now();
			while let Ok(msg) = rx.try_recv() {
				if !self.apply_message(msg) {
					self.finish();
					info!(frame = self.frame, "frame loop stopped");
					return;
				}
			}
			self.run();
			if self.poll() && last_sent != Some(self.frame) {
				last_sent = Some(self.frame);
				if tx.send((self.pr_model(), self.update_info())).is_err() {
					self.finish();
					return;
				}
			}
			let passed = start_time.elapsed();
			if passed < frame_time {
				std::thread::sleep(frame_time - passed);
			}
		}
	}
}
