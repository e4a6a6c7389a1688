//! Headless simulation runner.
//!
//! Spawns the demo scene, runs the built-in systems for a number of frames
//! and prints a summary with the BLAKE3 state hash.
//!
//! ```text
//! eon-sim [--config sim.json] [--frames N] [--snapshot out.json]
//! ```
//!
//! `RUST_LOG` controls log output (default `info`).

use anyhow::{bail, Context};

use eon_engine::prelude::*;
use eon_engine::scene::{ASTEROID_GROUP, PLAYER_TAG};

const DEFAULT_FRAMES: u64 = 600;

#[derive(Debug, Default)]
struct Args {
    config: Option<String>,
    frames: Option<u64>,
    snapshot: Option<String>,
}

fn parse_args() -> Result<Args, anyhow::Error> {
    let mut args = Args::default();
    let mut raw = std::env::args().skip(1);
    while let Some(flag) = raw.next() {
        let mut value = || raw.next().with_context(|| format!("{flag} expects a value"));
        match flag.as_str() {
            "--config" => args.config = Some(value()?),
            "--frames" => {
                let frames = value()?;
                args.frames = Some(
                    frames
                        .parse()
                        .with_context(|| format!("invalid frame count {frames:?}"))?,
                );
            }
            "--snapshot" => args.snapshot = Some(value()?),
            "-h" | "--help" => {
                println!("usage: eon-sim [--config sim.json] [--frames N] [--snapshot out.json]");
                std::process::exit(0);
            }
            other => bail!("unknown argument {other:?}"),
        }
    }
    Ok(args)
}

fn load_config(path: Option<&str>) -> Result<SimConfig, anyhow::Error> {
    let Some(path) = path else {
        return Ok(SimConfig::default());
    };
    let text =
        std::fs::read_to_string(path).with_context(|| format!("failed to read config {path}"))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse config {path}"))
}

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = parse_args()?;
    let config = load_config(args.config.as_deref())?;
    let frames = args
        .frames
        .or(config.frame.max_frames)
        .unwrap_or(DEFAULT_FRAMES);

    let mut frame_loop = FrameLoop::new(
        Registry::with_config(config.registry.clone()),
        config.frame.clone(),
    );
    install_default_systems(&mut frame_loop);
    let player = spawn_scene(frame_loop.registry_mut(), &config.scene);

    tracing::info!(frames, fixed_dt = frame_loop.fixed_dt(), "simulation starting");
    frame_loop.run_frames(frames);

    let registry = frame_loop.registry();
    let codecs = default_codecs();
    let snapshot = RegistrySnapshot::capture(registry, &codecs)?;

    println!("frames:       {}", frame_loop.frame_count());
    println!("sim time:     {:.3}s", frame_loop.sim_time());
    println!("entities:     {}", registry.entity_count());
    println!(
        "player:       {}",
        if registry.entity_by_tag(PLAYER_TAG) == Some(player) {
            "alive"
        } else {
            "destroyed"
        }
    );
    println!(
        "asteroids:    {}",
        registry
            .try_entities_by_group(ASTEROID_GROUP)
            .map_or(0, |members| members.len())
    );
    println!("projectiles:  {}", registry.pool_len::<Projectile>());
    println!(
        "shots fired:  {}",
        registry.get_system::<ProjectileEmitSystem>().total_emitted
    );
    println!(
        "collisions:   {}",
        registry.get_system::<CollisionSystem>().total_collisions
    );
    println!("state hash:   {}", snapshot.hash);

    if let Some(path) = &args.snapshot {
        let json = serde_json::to_string_pretty(&snapshot).context("failed to encode snapshot")?;
        std::fs::write(path, json).with_context(|| format!("failed to write snapshot {path}"))?;
        tracing::info!(path = %path, "snapshot written");
    }

    Ok(())
}
