use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use xpbd2d::coloring::{GraphColorer, SATURATED_COLOR};
use xpbd2d::constraint::Target;
use xpbd2d::obstacle::Obstacle;
use xpbd2d::rope::RopeEnd;
use xpbd2d::{PWorld, SimParams, StepOutcome, V2};

fn still() -> SimParams {
	SimParams::default()
		.with_gravity(V2::zeros())
		.with_damping(0.)
}

fn spawn(world: &mut PWorld, pos: V2, imass: f32) -> usize {
	let idx = world.allocate_particle().unwrap();
	world.set_particle(idx, pos, imass, 0., 0.);
	idx
}

fn run_frames(world: &mut PWorld, params: &SimParams, frames: usize) {
	for _ in 0..frames {
		assert!(matches!(world.step(params), StepOutcome::Dispatched(_)));
		world.finish();
	}
}

#[test]
fn assigned_color_is_fresh() {
	let mut rng = StdRng::seed_from_u64(42);
	let mut gc = GraphColorer::default();
	for _ in 0..150 {
		let a = rng.gen_range(0..80);
		let b = rng.gen_range(0..80);
		if a == b {
			continue;
		}
		let before = gc.color_set(a) | gc.color_set(b);
		let color = gc.assign_color(a, b);
		assert_eq!(before & (1 << color), 0);
		assert!(gc.has_color(a, color));
		assert!(gc.has_color(b, color));
	}
}

#[test]
fn static_particles_never_move() {
	let mut world = PWorld::default();
	let mut rng = StdRng::seed_from_u64(3);
	let mut statics = Vec::new();
	let mut all = Vec::new();
	for i in 0..40 {
		let pos = V2::new(rng.gen_range(-2.0..2.0), rng.gen_range(-2.0..2.0));
		let imass = if i % 3 == 0 { 0. } else { 1. };
		let idx = world.allocate_particle().unwrap();
		world.set_particle(idx, pos, imass, 0.5, 0.2);
		if imass == 0. {
			statics.push((idx, pos));
		}
		all.push(idx);
	}
	for w in all.windows(2) {
		world.link_particles(w[0], w[1], 1e-4).unwrap();
	}
	for w in all.windows(3).step_by(4) {
		let c = world.allocate_constraint().unwrap();
		world.set_area_constraint(c, w[0], w[1], w[2], 0., 0.).unwrap();
	}
	world
		.set_obstacle(0, Obstacle::circle(V2::zeros(), 1.))
		.unwrap();
	run_frames(&mut world, &SimParams::default(), 20);
	for (idx, pos) in statics {
		assert_eq!(world.particle(idx).unwrap().pos, pos);
	}
}

#[test]
fn single_constraint_converges() {
	let mut prev = f32::INFINITY;
	for rounds in 1..=8 {
		let mut world = PWorld::default();
		let a = spawn(&mut world, V2::new(0., 0.), 1.);
		let b = spawn(&mut world, V2::new(1.7, 0.3), 1.);
		let c = world.allocate_constraint().unwrap();
		world.set_distance_constraint(c, a, b, 1., 0.).unwrap();
		let params = still().with_substeps(1).with_solve_rounds(rounds);
		run_frames(&mut world, &params, 1);
		let err = (world.measure(c).unwrap() - 1.).abs();
		assert!(err <= prev + 1e-6);
		prev = err;
	}
	assert!(prev < 1e-3);
}

#[test]
fn saturated_hub_links_converge() {
	let mut world = PWorld::default();
	let hub = spawn(&mut world, V2::zeros(), 0.);
	let links: Vec<usize> = (0..40)
		.map(|i| {
			let t = i as f32 / 40. * std::f32::consts::TAU;
			let p = spawn(&mut world, V2::new(t.cos(), t.sin()) * 2., 1.);
			let c = world.allocate_constraint().unwrap();
			world.set_distance_constraint(c, hub, p, 1., 0.).unwrap();
			c
		})
		.collect();
	let saturated = links
		.iter()
		.filter(|&&c| world.constraint(c).unwrap().color == Some(SATURATED_COLOR))
		.count();
	assert_eq!(saturated, 40 - SATURATED_COLOR as usize);

	run_frames(&mut world, &still(), 1);
	for &c in links.iter() {
		assert!((world.measure(c).unwrap() - 1.).abs() < 1e-3);
	}
	assert_eq!(world.particle(hub).unwrap().pos, V2::zeros());
}

#[test]
fn two_particle_scenario() {
	let mut world = PWorld::default();
	let a = spawn(&mut world, V2::new(0., 0.), 1.);
	let b = spawn(&mut world, V2::new(1., 0.), 1.);
	let c = world.allocate_constraint().unwrap();
	world.set_distance_constraint(c, a, b, 0.5, 0.).unwrap();
	let params = still().with_substeps(4).with_solve_rounds(4);
	run_frames(&mut world, &params, 1);
	let pa = world.particle(a).unwrap().pos;
	let pb = world.particle(b).unwrap().pos;
	assert!(((pb - pa).magnitude() - 0.5).abs() < 1e-3);
	assert!((pa + (pb - V2::new(1., 0.))).magnitude() < 1e-4);
}

#[test]
fn rope_reel_round_trip() {
	let mut world = PWorld::default();
	let id = world
		.spawn_rope(V2::new(0., 5.), V2::new(0., 0.), 5, 1., 1e-6)
		.unwrap();
	world
		.anchor_rope(id, RopeEnd::Head, Target::Fixed(V2::new(0., 6.)), V2::zeros(), 1.)
		.unwrap();
	run_frames(&mut world, &SimParams::default(), 3);
	let particles = world.rope(id).unwrap().particles.clone();
	let links = world.rope(id).unwrap().links.clone();
	let counts = (world.particle_len(), world.constraint_len());

	for _ in 0..3 {
		world.reel_out(id).unwrap();
		run_frames(&mut world, &SimParams::default(), 1);
	}
	assert_eq!(world.rope(id).unwrap().particles.len(), particles.len() + 3);
	for _ in 0..3 {
		world.reel_in(id).unwrap();
	}

	let rope = world.rope(id).unwrap();
	assert_eq!(rope.particles, particles);
	assert_eq!(rope.links, links);
	assert_eq!((world.particle_len(), world.constraint_len()), counts);
	for (i, &c) in links.iter().enumerate() {
		let constraint = world.constraint(c).unwrap();
		assert_eq!(constraint.particles(), vec![particles[i], particles[i + 1]]);
	}
}

#[test]
fn anchored_rope_reel_out_scenario() {
	let mut world = PWorld::default();
	let id = world
		.spawn_rope(V2::new(0., 0.), V2::new(2., -2.), 2, 1., 0.)
		.unwrap();
	world
		.anchor_rope(id, RopeEnd::Head, Target::Fixed(V2::new(0., 1.)), V2::zeros(), 1.)
		.unwrap();
	assert_eq!(world.rope(id).unwrap().segment_count(), 3);

	let m = world.reel_out(id).unwrap();
	let rope = world.rope(id).unwrap();
	assert_eq!(rope.segment_count(), 4);
	assert_eq!(rope.particles.len(), 4);
	assert_eq!(world.particle(m).unwrap().pos, V2::new(1.5, -1.5));
}

#[test]
fn reallocated_particle_is_zeroed() {
	let mut world = PWorld::default();
	let a = world.allocate_particle().unwrap();
	world.set_particle(a, V2::new(3., 4.), 2., 0.7, 0.3);
	world.set_particle_free(a, true);
	run_frames(&mut world, &SimParams::default(), 1);
	assert!(world.release_particle(a));
	let b = world.allocate_particle().unwrap();
	assert_eq!(a, b);
	let p = world.particle(b).unwrap();
	assert_eq!(p.pos, V2::zeros());
	assert_eq!(p.ppos, V2::zeros());
	assert_eq!(p.drive, V2::zeros());
	assert_eq!(p.imass, 0.);
	assert_eq!(p.radius, 0.);
	assert_eq!(p.friction, 0.);
	assert!(!p.free);
	assert_eq!(world.colorer().color_set(b), 0);
}

#[test]
fn dirty_write_wins_over_readback() {
	let mut world = PWorld::default();
	let a = spawn(&mut world, V2::new(0., 0.), 1.);
	let other = spawn(&mut world, V2::new(2., 0.), 1.);
	assert!(matches!(
		world.step(&SimParams::default()),
		StepOutcome::Dispatched(_)
	));
	assert!(world.in_flight());
	world.set_particle(a, V2::new(-3., 1.), 1., 0., 0.);
	world.finish();
	assert_eq!(world.particle(a).unwrap().pos, V2::new(-3., 1.));
	assert!(world.particle(other).unwrap().pos[1] < 0.);
}

#[test]
fn allocation_until_exhausted() {
	let mut world = PWorld::with_capacity(64, 16);
	let mut ids = Vec::new();
	while let Some(idx) = world.allocate_particle() {
		world.set_particle(idx, V2::new(idx as f32, 1.), 1., 0., 0.1);
		ids.push(idx);
	}
	assert_eq!(ids.len(), 64);
	assert_eq!(world.allocate_particle(), None);
	for &idx in ids.iter() {
		let p = world.particle(idx).unwrap();
		assert_eq!(p.pos, V2::new(idx as f32, 1.));
		assert_eq!(p.imass, 1.);
	}
}

#[test]
fn query_answered_after_readback() {
	let mut world = PWorld::default();
	let a = world.allocate_particle().unwrap();
	world.set_particle(a, V2::new(0., 0.), 1., 0., 0.5);
	world.step(&still());
	world.submit_query(
		1,
		xpbd2d::query::QueryRequest::Ray {
			origin: V2::new(0., 5.),
			dir: V2::new(0., -1.),
			max_dist: 10.,
			mask: xpbd2d::obstacle::RAYCAST,
		},
	);
	let ticket = world.submit_query(
		1,
		xpbd2d::query::QueryRequest::Anchor {
			pos: V2::new(0.1, 0.1),
			ignore: vec![],
		},
	);
	world.submit_query(
		2,
		xpbd2d::query::QueryRequest::Anchor {
			pos: V2::zeros(),
			ignore: vec![],
		},
	);
	assert!(world.cancel_query(2));
	world.finish();
	let answers = world.drain_query_results();
	assert_eq!(answers.len(), 1);
	assert_eq!(answers[0].ticket, ticket);
	assert!(matches!(
		answers[0].result,
		xpbd2d::query::QueryResult::Anchor(Some(_))
	));
}
