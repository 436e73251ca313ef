//! Attach-point and ray queries, with per-caller coalescing.
//!
//! Editor tools fire a query per pointer move. Only the latest request of a
//! caller is kept; it is answered once particle positions are resolved.

use fnv::FnvHashMap;

use crate::obstacle::{self, Obstacle, RayHit, ANCHORABLE};
use crate::particle::Particle;
use crate::V2;

// obstacle surfaces closer than this snap
pub const SURFACE_SNAP: f32 = 0.25;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AnchorKind {
	Static { obstacle: usize },
	Particle { index: usize, radius: f32 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnchorHit {
	pub pos: V2,
	pub kind: AnchorKind,
}

/// Nearest particle containing `pos`, else nearest anchorable obstacle surface.
pub fn find_anchor(
	ps: &[Particle],
	obstacles: &[Obstacle],
	pos: V2,
	ignore: &[usize],
) -> Option<AnchorHit> {
	let particle = ps
		.iter()
		.enumerate()
		.filter(|(idx, p)| p.active && !ignore.contains(idx))
		.map(|(idx, p)| (idx, p, (p.pos - pos).magnitude()))
		.filter(|(_, p, d)| *d <= p.radius)
		.min_by(|x, y| x.2.total_cmp(&y.2));
	if let Some((index, p, _)) = particle {
		return Some(AnchorHit {
			pos: p.pos,
			kind: AnchorKind::Particle {
				index,
				radius: p.radius,
			},
		});
	}
	obstacles
		.iter()
		.enumerate()
		.filter(|(_, o)| o.flags & ANCHORABLE != 0)
		.map(|(idx, o)| (idx, o, o.sdf(pos)))
		.filter(|(_, _, d)| d.abs() <= SURFACE_SNAP)
		.min_by(|x, y| x.2.abs().total_cmp(&y.2.abs()))
		.map(|(idx, o, _)| AnchorHit {
			pos: o.project(pos),
			kind: AnchorKind::Static { obstacle: idx },
		})
}

pub type CallerId = u32;
pub type Ticket = u64;

#[derive(Clone, Debug, PartialEq)]
pub enum QueryRequest {
	Anchor {
		pos: V2,
		ignore: Vec<usize>,
	},
	Ray {
		origin: V2,
		dir: V2,
		max_dist: f32,
		mask: u32,
	},
}

#[derive(Clone, Debug, PartialEq)]
pub enum QueryResult {
	Anchor(Option<AnchorHit>),
	Ray(Option<RayHit>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct QueryResponse {
	pub caller: CallerId,
	pub ticket: Ticket,
	pub result: QueryResult,
}

impl QueryRequest {
	pub fn run(&self, ps: &[Particle], obstacles: &[Obstacle]) -> QueryResult {
		match self {
			Self::Anchor { pos, ignore } => {
				QueryResult::Anchor(find_anchor(ps, obstacles, *pos, ignore))
			}
			Self::Ray {
				origin,
				dir,
				max_dist,
				mask,
			} => QueryResult::Ray(obstacle::raycast(
				obstacles, *origin, *dir, *max_dist, *mask,
			)),
		}
	}
}

#[derive(Default)]
pub struct QueryQueue {
	next_ticket: Ticket,
	pending: FnvHashMap<CallerId, (Ticket, QueryRequest)>,
}

impl QueryQueue {
	// a newer request of the same caller supersedes the old one
	pub fn submit(&mut self, caller: CallerId, request: QueryRequest) -> Ticket {
		self.next_ticket += 1;
		self.pending.insert(caller, (self.next_ticket, request));
		self.next_ticket
	}

	pub fn cancel(&mut self, caller: CallerId) -> bool {
		self.pending.remove(&caller).is_some()
	}

	pub fn len(&self) -> usize {
		self.pending.len()
	}

	pub fn is_empty(&self) -> bool {
		self.pending.is_empty()
	}

	pub fn resolve(
		&mut self,
		ps: &[Particle],
		obstacles: &[Obstacle],
	) -> Vec<QueryResponse> {
		let mut requests: Vec<_> = self.pending.drain().collect();
		requests.sort_unstable_by_key(|(_, (ticket, _))| *ticket);
		requests
			.into_iter()
			.map(|(caller, (ticket, request))| QueryResponse {
				caller,
				ticket,
				result: request.run(ps, obstacles),
			})
			.collect()
	}
}
