//! Seeded demo scene and the simulation config that describes it.
//!
//! The scene is a player ship in the middle of a square arena, asteroids
//! scattered around it, a ring of friendly projectiles flying outwards and
//! turrets near the arena edge firing at the middle.
//! Layout comes from a PCG generator seeded with [`SceneConfig::seed`], so the
//! same config always builds the same registry.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};

use eon_ecs::config::RegistryConfig;
use eon_ecs::entity::Entity;
use eon_ecs::registry::Registry;

use crate::components::{
    BoxCollider, Health, Projectile, ProjectileEmitter, Rigidbody, Transform, Vec2,
};
use crate::frame::FrameConfig;

pub const PLAYER_TAG: &str = "player";
pub const ASTEROID_GROUP: &str = "asteroids";
pub const PROJECTILE_GROUP: &str = "projectiles";
pub const TURRET_GROUP: &str = "turrets";

const PLAYER_SIZE: f64 = 32.0;
const ASTEROID_SIZE: f64 = 16.0;
const PROJECTILE_SIZE: f64 = 4.0;
const PROJECTILE_SPEED: f64 = 200.0;

/// What to spawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub seed: u64,
    pub asteroid_count: usize,
    pub projectile_count: usize,
    /// Side length of the square arena.
    pub arena_size: f64,
    /// Projectile lifetime in seconds.
    pub projectile_duration: f64,
    pub turret_count: usize,
    /// Seconds between turret shots.
    pub turret_fire_interval: f64,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            asteroid_count: 24,
            projectile_count: 8,
            arena_size: 800.0,
            projectile_duration: 2.0,
            turret_count: 2,
            turret_fire_interval: 1.0,
        }
    }
}

/// Everything `eon-sim` reads from its config file. Missing fields default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub frame: FrameConfig,
    pub registry: RegistryConfig,
    pub scene: SceneConfig,
}

/// Populate `registry` with the demo scene and return the player entity.
///
/// Entities join their systems at the next flush.
///
/// # Panics
///
/// Panics if `config.arena_size` is not positive.
pub fn spawn_scene(registry: &mut Registry, config: &SceneConfig) -> Entity {
    let mut rng = Pcg64::seed_from_u64(config.seed);
    let center = Vec2::new(config.arena_size / 2.0, config.arena_size / 2.0);

    let player = registry.create_entity();
    registry
        .entity_mut(player)
        .add_component(Transform::at(center))
        .add_component(Rigidbody::default())
        .add_component(BoxCollider::new(PLAYER_SIZE, PLAYER_SIZE))
        .add_component(Health::default())
        .tag(PLAYER_TAG);

    // Keep asteroids out of the player's immediate surroundings when the
    // arena is big enough for that.
    let keep_out = if config.arena_size > PLAYER_SIZE * 8.0 {
        PLAYER_SIZE * 3.0
    } else {
        0.0
    };
    for _ in 0..config.asteroid_count {
        let position = loop {
            let candidate = Vec2::new(
                rng.gen_range(0.0..config.arena_size),
                rng.gen_range(0.0..config.arena_size),
            );
            if (candidate.x - center.x).abs() > keep_out
                || (candidate.y - center.y).abs() > keep_out
            {
                break candidate;
            }
        };
        let velocity = Vec2::new(rng.gen_range(-40.0..40.0), rng.gen_range(-40.0..40.0));
        let asteroid = registry.create_entity();
        registry
            .entity_mut(asteroid)
            .add_component(Transform::at(position))
            .add_component(Rigidbody { velocity })
            .add_component(BoxCollider::new(ASTEROID_SIZE, ASTEROID_SIZE))
            .add_component(Health::default())
            .group(ASTEROID_GROUP);
    }

    let muzzle = PLAYER_SIZE;
    for i in 0..config.projectile_count {
        let angle = std::f64::consts::TAU * i as f64 / config.projectile_count as f64;
        let direction = Vec2::new(angle.cos(), angle.sin());
        let projectile = registry.create_entity();
        registry
            .entity_mut(projectile)
            .add_component(Transform::at(
                center + Vec2::new(PLAYER_SIZE / 2.0, PLAYER_SIZE / 2.0) + direction * muzzle,
            ))
            .add_component(Rigidbody {
                velocity: direction * PROJECTILE_SPEED,
            })
            .add_component(BoxCollider::new(PROJECTILE_SIZE, PROJECTILE_SIZE))
            .add_component(Projectile {
                is_friendly: true,
                hit_percent_damage: 10,
                duration: config.projectile_duration,
                start_time: 0.0,
            })
            .group(PROJECTILE_GROUP);
    }

    // Turrets have no collider, so their own shots cannot hit them.
    let radius = (config.arena_size / 2.0 - ASTEROID_SIZE).max(0.0);
    for i in 0..config.turret_count {
        let angle = std::f64::consts::FRAC_PI_4
            + std::f64::consts::TAU * i as f64 / config.turret_count as f64;
        let outward = Vec2::new(angle.cos(), angle.sin());
        let turret = registry.create_entity();
        registry
            .entity_mut(turret)
            .add_component(Transform::at(center + outward * radius))
            .add_component(ProjectileEmitter {
                projectile_velocity: outward * -PROJECTILE_SPEED,
                repeat_frequency: config.turret_fire_interval,
                projectile_duration: config.projectile_duration,
                hit_percent_damage: 10,
                is_friendly: false,
                last_emission_time: 0.0,
            })
            .group(TURRET_GROUP);
    }

    tracing::info!(
        seed = config.seed,
        asteroids = config.asteroid_count,
        projectiles = config.projectile_count,
        turrets = config.turret_count,
        "scene spawned"
    );
    player
}
