//! # engine_app: headless demo
//!
//! Spawns a handful of moving, rendered entities, attaches the in-memory
//! renderer and physics backends and runs the frame loop.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use engine_app::{
    AudioGate, HeadlessPhysics, HeadlessRenderer, Rendered, Solid, TickConfig, World,
    attach_physics, attach_renderer,
};
use engine_math::{Transform, Vec3, Vec4};
use engine_state::channels;
use engine_state::messages::Diagnostic;
use parking_lot::Mutex;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "engine_app", about = "Run the engine core headless")]
struct Args {
    /// Target frames per second
    #[arg(short, long, default_value_t = 60.0)]
    refresh_rate: f64,

    /// Stop after this many frames (0 = run until interrupted)
    #[arg(short, long, default_value_t = 180)]
    max_frames: u64,

    /// Number of entities to spawn
    #[arg(short, long, default_value_t = 8)]
    entities: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("engine_app=info".parse()?))
        .init();

    let args = Args::parse();
    info!(
        refresh_rate = args.refresh_rate,
        max_frames = args.max_frames,
        entities = args.entities,
        "engine starting"
    );

    let world = World::new(TickConfig {
        refresh_rate: args.refresh_rate,
        max_frames: args.max_frames,
    });

    let renderer = Arc::new(Mutex::new(HeadlessRenderer::new()));
    let physics = Arc::new(Mutex::new(HeadlessPhysics::new()));
    let mut render_bridge = attach_renderer(&world, Arc::clone(&renderer));
    let mut physics_bridge = attach_physics(&world, Arc::clone(&physics));

    let audio = AudioGate::new(world.state());
    let mut diagnostics = world
        .state()
        .bus()
        .subscribe_event::<Diagnostic, _>(channels::DIAGNOSTIC, |diagnostic| {
            warn!(
                frame = diagnostic.frame,
                phase = diagnostic.phase.as_deref(),
                message = %diagnostic.message,
                "diagnostic"
            );
        });

    for i in 0..args.entities {
        let offset = i as f32;
        let entity = world.spawn();
        entity.insert(Transform::from_position(Vec3::new(offset, 0.0, 0.0)))?;
        entity.insert(Rendered::mesh("cube").with_color(Vec4::new(1.0, offset / 8.0, 0.2, 1.0)))?;
        entity.insert(Solid::moving(1.0, Vec3::new(0.0, 0.5 + offset * 0.1, 0.0)))?;
    }

    let frames = world.run().await;

    let render = renderer.lock();
    let sim = physics.lock();
    info!(
        frames,
        rendered = render.frames_rendered(),
        drawn = render.len(),
        bodies = sim.len(),
        simulated_s = sim.elapsed(),
        audio_ready = audio.is_ready(),
        "engine stopped"
    );
    drop((render, sim));

    render_bridge.detach();
    physics_bridge.detach();
    diagnostics.unsubscribe();
    Ok(())
}
