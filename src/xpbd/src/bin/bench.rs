use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{error, info};

use xpbd2d::obstacle::Obstacle;
use xpbd2d::rope::RopeEnd;
use xpbd2d::constraint::Target;
use xpbd2d::{EngineError, PWorld, SimParams, V2};

fn init_scene(pworld: &mut PWorld) -> Result<(), EngineError> {
	let mut rng = StdRng::seed_from_u64(0);
	pworld.set_obstacle(0, Obstacle::cuboid(V2::new(0., -6.), 20., 1.))?;
	pworld.set_obstacle(1, Obstacle::circle(V2::new(-4., -2.), 1.5))?;
	pworld.set_obstacle(2, Obstacle::cuboid(V2::new(4., -2.), 2., 0.3).with_rotation(0.4))?;
	for _ in 0..2000 {
		let Some(idx) = pworld.allocate_particle() else {
			break;
		};
		let pos = V2::new(rng.gen_range(-10.0..10.0), rng.gen_range(0.0..10.0));
		pworld.set_particle(idx, pos, 1., 0.5, 0.1);
	}
	for i in 0..16 {
		let x = -8. + i as f32;
		let id = pworld.spawn_rope(V2::new(x, 12.), V2::new(x + 0.5, 8.), 32, 1., 1e-6)?;
		pworld.anchor_rope(id, RopeEnd::Head, Target::Fixed(V2::new(x, 12.)), V2::zeros(), 0.)?;
	}
	Ok(())
}

fn main() {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
		)
		.init();

	let mut pworld = PWorld::default();
	if let Err(e) = init_scene(&mut pworld) {
		error!(error = %e, "scene setup failed");
		std::process::exit(1);
	}
	let params = SimParams::default();
	let rframes = 100;
	let start = Instant::now();
	for _ in 0..rframes {
		pworld.step(&params);
		pworld.finish();
	}
	// simulated time against wall time
	let time = rframes as f32 * params.dt;
	let duration = start.elapsed().as_secs_f32();
	info!(
		frames = rframes,
		particles = pworld.particle_len(),
		colors = pworld.colorer().active_colors(),
		"{:.3}%",
		duration / time * 100.
	);
}
