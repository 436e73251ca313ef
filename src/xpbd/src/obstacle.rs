//! Static obstacles described by closed-form signed distance functions.

use nalgebra::Rotation2;
use tracing::debug;

use crate::V2;
use protocol::pr_model::PrObstacle;

pub const COLLIDE: u32 = 1;
pub const ANCHORABLE: u32 = 1 << 1;
pub const RAYCAST: u32 = 1 << 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShapeType {
	Circle = 0,
	Box = 1,
	RoundedBox = 2,
	Capsule = 3,
	Vesica = 4,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Obstacle {
	pub pos: V2,
	pub rotation: f32,
	pub shape: ShapeType,
	// circle: r; box: hw, hh; rounded box: hw, hh, r;
	// capsule: half length, r; vesica: r, d
	pub params: [f32; 4],
	pub friction: f32,
	pub appearance: u32,
	pub flags: u32,
}

impl Default for Obstacle {
	fn default() -> Self {
		Self {
			pos: V2::zeros(),
			rotation: 0.,
			shape: ShapeType::Circle,
			params: [1., 0., 0., 0.],
			friction: 0.5,
			appearance: 0,
			flags: COLLIDE | ANCHORABLE | RAYCAST,
		}
	}
}

fn sd_box(p: V2, b: V2) -> f32 {
	let d = p.abs() - b;
	d.sup(&V2::zeros()).magnitude() + d[0].max(d[1]).min(0.)
}

fn sd_vesica(p: V2, r: f32, d: f32) -> f32 {
	let p = p.abs();
	let b = (r * r - d * d).max(0.).sqrt();
	if (p[1] - b) * d > p[0] * b {
		(p - V2::new(0., b)).magnitude()
	} else {
		(p - V2::new(-d, 0.)).magnitude() - r
	}
}

impl Obstacle {
	pub fn circle(pos: V2, r: f32) -> Self {
		Self {
			pos,
			shape: ShapeType::Circle,
			params: [r, 0., 0., 0.],
			..Default::default()
		}
	}

	pub fn cuboid(pos: V2, hw: f32, hh: f32) -> Self {
		Self {
			pos,
			shape: ShapeType::Box,
			params: [hw, hh, 0., 0.],
			..Default::default()
		}
	}

	pub fn rounded_box(pos: V2, hw: f32, hh: f32, r: f32) -> Self {
		Self {
			pos,
			shape: ShapeType::RoundedBox,
			params: [hw, hh, r, 0.],
			..Default::default()
		}
	}

	// horizontal before rotation
	pub fn capsule(pos: V2, half_length: f32, r: f32) -> Self {
		Self {
			pos,
			shape: ShapeType::Capsule,
			params: [half_length, r, 0., 0.],
			..Default::default()
		}
	}

	pub fn vesica(pos: V2, r: f32, d: f32) -> Self {
		Self {
			pos,
			shape: ShapeType::Vesica,
			params: [r, d, 0., 0.],
			..Default::default()
		}
	}

	pub fn with_rotation(mut self, rotation: f32) -> Self {
		self.rotation = rotation;
		self
	}

	pub fn with_friction(mut self, friction: f32) -> Self {
		self.friction = friction;
		self
	}

	pub fn with_flags(mut self, flags: u32) -> Self {
		self.flags = flags;
		self
	}

	fn to_local(&self, p: V2) -> V2 {
		Rotation2::new(-self.rotation) * (p - self.pos)
	}

	fn sdf_local(&self, p: V2) -> f32 {
		let [a, b, c, _] = self.params;
		match self.shape {
			ShapeType::Circle => p.magnitude() - a,
			ShapeType::Box => sd_box(p, V2::new(a, b)),
			ShapeType::RoundedBox => {
				let r = c.min(a).min(b).max(0.);
				sd_box(p, V2::new(a - r, b - r)) - r
			}
			ShapeType::Capsule => {
				let mut q = p;
				q[0] -= q[0].clamp(-a, a);
				q.magnitude() - b
			}
			ShapeType::Vesica => sd_vesica(p, a, b),
		}
	}

	pub fn sdf(&self, p: V2) -> f32 {
		self.sdf_local(self.to_local(p))
	}

	/// Unit outward normal, central differences of the closed form.
	pub fn gradient(&self, p: V2) -> V2 {
		let q = self.to_local(p);
		let e = 1e-3;
		let g = V2::new(
			self.sdf_local(q + V2::new(e, 0.)) - self.sdf_local(q - V2::new(e, 0.)),
			self.sdf_local(q + V2::new(0., e)) - self.sdf_local(q - V2::new(0., e)),
		);
		let g = Rotation2::new(self.rotation) * g;
		let l = g.magnitude();
		if l.is_normal() {
			g / l
		} else {
			V2::new(0., 1.)
		}
	}

	/// Closest surface point.
	pub fn project(&self, p: V2) -> V2 {
		p - self.gradient(p) * self.sdf(p)
	}

	pub fn render(&self) -> PrObstacle {
		PrObstacle {
			pos: [self.pos[0], self.pos[1]],
			rotation: self.rotation,
			shape: self.shape as u32,
			params: self.params,
			appearance: self.appearance,
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
	pub distance: f32,
	pub normal: V2,
	pub obstacle: usize,
}

const MARCH_STEPS: usize = 128;
const MARCH_EPS: f32 = 1e-4;

/// Sphere tracing against the union of the obstacles matching `mask`.
pub fn raycast(
	obstacles: &[Obstacle],
	origin: V2,
	dir: V2,
	max_dist: f32,
	mask: u32,
) -> Option<RayHit> {
	let l = dir.magnitude();
	if !l.is_normal() || max_dist <= 0. {
		return None;
	}
	let dir = dir / l;
	let scene = |p: V2| {
		obstacles
			.iter()
			.enumerate()
			.filter(|(_, o)| o.flags & mask != 0)
			.map(|(i, o)| (i, o.sdf(p)))
			.min_by(|x, y| x.1.total_cmp(&y.1))
	};
	// started inside something
	if let Some((i, d)) = scene(origin) {
		if d <= 0. {
			return Some(RayHit {
				distance: 0.,
				normal: obstacles[i].gradient(origin),
				obstacle: i,
			});
		}
	}
	let mut t = 0.;
	for _ in 0..MARCH_STEPS {
		let p = origin + dir * t;
		let (i, d) = scene(p)?;
		if d < MARCH_EPS {
			return Some(RayHit {
				distance: t,
				normal: obstacles[i].gradient(p),
				obstacle: i,
			});
		}
		t += d;
		if t > max_dist {
			return None;
		}
	}
	None
}

/// Host copy of the obstacle table plus what the device mirror is missing.
#[derive(Default)]
pub struct ObstacleStore {
	obstacles: Vec<Obstacle>,
	dirty: Vec<usize>,
	uploaded_len: Option<usize>,
}

pub enum ObstacleSync {
	Full,
	Partial(usize),
	Clean,
}

impl ObstacleStore {
	// index == len appends
	pub fn set(&mut self, idx: usize, obstacle: Obstacle) -> bool {
		if idx < self.obstacles.len() {
			self.obstacles[idx] = obstacle;
			self.dirty.push(idx);
			true
		} else if idx == self.obstacles.len() {
			self.obstacles.push(obstacle);
			true
		} else {
			false
		}
	}

	pub fn remove(&mut self, idx: usize) -> Option<Obstacle> {
		if idx >= self.obstacles.len() {
			return None;
		}
		// later indices shift, the mirror has to be rebuilt
		self.uploaded_len = None;
		Some(self.obstacles.remove(idx))
	}

	pub fn get(&self, idx: usize) -> Option<&Obstacle> {
		self.obstacles.get(idx)
	}

	pub fn len(&self) -> usize {
		self.obstacles.len()
	}

	pub fn is_empty(&self) -> bool {
		self.obstacles.is_empty()
	}

	pub fn as_slice(&self) -> &[Obstacle] {
		&self.obstacles
	}

	pub fn invalidate(&mut self) {
		self.uploaded_len = None;
	}

	/// Brings a device mirror up to date, fully when the count changed.
	pub fn sync(&mut self, mirror: &mut Vec<Obstacle>) -> ObstacleSync {
		let result = if self.uploaded_len != Some(self.obstacles.len())
			|| mirror.len() != self.obstacles.len()
		{
			mirror.clone_from(&self.obstacles);
			debug!(len = self.obstacles.len(), "obstacle full upload");
			ObstacleSync::Full
		} else if self.dirty.is_empty() {
			ObstacleSync::Clean
		} else {
			self.dirty.sort_unstable();
			self.dirty.dedup();
			for &idx in self.dirty.iter() {
				mirror[idx] = self.obstacles[idx];
			}
			ObstacleSync::Partial(self.dirty.len())
		};
		self.uploaded_len = Some(self.obstacles.len());
		self.dirty.clear();
		result
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use std::f32::consts::FRAC_PI_2;

	fn close(a: f32, b: f32) -> bool {
		(a - b).abs() < 1e-3
	}

	#[test]
	fn test_shapes() {
		let c = Obstacle::circle(V2::new(1., 0.), 1.);
		assert!(close(c.sdf(V2::new(3., 0.)), 1.));
		assert!(close(c.sdf(V2::new(1., 0.)), -1.));

		let b = Obstacle::cuboid(V2::zeros(), 2., 1.);
		assert!(close(b.sdf(V2::new(0., 3.)), 2.));
		assert!(close(b.sdf(V2::new(3., 2.)), 2f32.sqrt()));
		assert!(close(b.sdf(V2::new(0., 0.5)), -0.5));
		// rotated a quarter turn, now tall
		let b = b.with_rotation(FRAC_PI_2);
		assert!(close(b.sdf(V2::new(0., 3.)), 1.));

		let r = Obstacle {
			shape: ShapeType::RoundedBox,
			params: [1., 1., 0.5, 0.],
			..Default::default()
		};
		assert!(close(r.sdf(V2::new(2., 0.)), 1.));
		let corner = 0.5 + 0.5 * 2f32.sqrt();
		assert!(close(r.sdf(V2::new(2., 2.)), 2f32.sqrt() * 2. - corner));

		let cap = Obstacle {
			shape: ShapeType::Capsule,
			params: [2., 0.5, 0., 0.],
			..Default::default()
		};
		assert!(close(cap.sdf(V2::new(1., 1.)), 0.5));
		assert!(close(cap.sdf(V2::new(3., 0.)), 0.5));

		let v = Obstacle {
			shape: ShapeType::Vesica,
			params: [2., 1., 0., 0.],
			..Default::default()
		};
		// lens spans x in [-1, 1]
		assert!(close(v.sdf(V2::new(1., 0.)), 0.));
		assert!(v.sdf(V2::zeros()) < 0.);
		assert!(close(v.sdf(V2::new(0., 3f32.sqrt() + 1.)), 1.));
	}

	#[test]
	fn test_gradient_points_out() {
		let b = Obstacle::cuboid(V2::zeros(), 1., 1.).with_rotation(0.3);
		let p = V2::new(0.2, 0.9);
		let n = b.gradient(p);
		assert!(close(n.magnitude(), 1.));
		assert!(b.sdf(p + n * 0.05) > b.sdf(p));
		let s = b.project(V2::new(0., 3.));
		assert!(b.sdf(s).abs() < 1e-2);
	}

	#[test]
	fn test_raycast() {
		let obs = vec![
			Obstacle::cuboid(V2::new(5., 0.), 1., 1.),
			Obstacle::circle(V2::new(0., 5.), 1.).with_flags(COLLIDE),
		];
		let hit =
			raycast(&obs, V2::zeros(), V2::new(1., 0.), 10., RAYCAST).unwrap();
		assert!(close(hit.distance, 4.));
		assert!(close(hit.normal[0], -1.));
		assert_eq!(hit.obstacle, 0);
		assert!(raycast(&obs, V2::zeros(), V2::new(1., 0.), 3., RAYCAST)
			.is_none());
		// circle is excluded by mask
		assert!(raycast(&obs, V2::zeros(), V2::new(0., 1.), 10., RAYCAST)
			.is_none());
		assert!(raycast(&obs, V2::zeros(), V2::new(0., 1.), 10., COLLIDE)
			.is_some());
	}

	#[test]
	fn test_sync() {
		let mut store = ObstacleStore::default();
		let mut mirror = Vec::new();
		store.set(0, Obstacle::circle(V2::zeros(), 1.));
		assert!(!store.set(5, Obstacle::default()));
		assert!(matches!(store.sync(&mut mirror), ObstacleSync::Full));
		assert!(matches!(store.sync(&mut mirror), ObstacleSync::Clean));
		store.set(0, Obstacle::circle(V2::new(1., 1.), 2.));
		assert!(matches!(store.sync(&mut mirror), ObstacleSync::Partial(1)));
		assert_eq!(mirror[0].pos, V2::new(1., 1.));
		store.set(1, Obstacle::default());
		assert!(matches!(store.sync(&mut mirror), ObstacleSync::Full));
		assert_eq!(mirror.len(), 2);

		// same count after remove then append
		store.remove(0);
		store.set(1, Obstacle::circle(V2::new(9., 9.), 1.));
		assert!(matches!(store.sync(&mut mirror), ObstacleSync::Full));
		assert_eq!(mirror, store.as_slice());
	}
}
