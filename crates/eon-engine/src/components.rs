//! Gameplay components used by the built-in systems.
//!
//! All components are plain data with serde derives so they can go through
//! [`RegistrySnapshot`](crate::snapshot::RegistrySnapshot).

use std::ops::{Add, AddAssign, Mul};

use serde::{Deserialize, Serialize};

use crate::snapshot::ComponentCodecs;

/// 2D vector in world units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };
    pub const ONE: Vec2 = Vec2 { x: 1.0, y: 1.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Self) -> Self::Output {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Mul<f64> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f64) -> Self::Output {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

/// Placement of an entity in the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec2,
    #[serde(default = "unit_scale")]
    pub scale: Vec2,
    /// Degrees.
    #[serde(default)]
    pub rotation: f64,
}

fn unit_scale() -> Vec2 {
    Vec2::ONE
}

impl Transform {
    /// Unscaled, unrotated transform at `position`.
    pub fn at(position: Vec2) -> Self {
        Self {
            position,
            scale: Vec2::ONE,
            rotation: 0.0,
        }
    }
}

/// Linear motion, in world units per second.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Rigidbody {
    pub velocity: Vec2,
}

/// Axis-aligned collision box anchored at the transform position plus `offset`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxCollider {
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub offset: Vec2,
}

impl BoxCollider {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            offset: Vec2::ZERO,
        }
    }

    /// `(min, max)` corners of the box for an entity at `transform`.
    /// Scale stretches the box.
    pub fn bounds(&self, transform: &Transform) -> (Vec2, Vec2) {
        let min = transform.position + self.offset;
        let size = Vec2::new(
            self.width * transform.scale.x,
            self.height * transform.scale.y,
        );
        (min, min + size)
    }

    /// Whether two boxes overlap. Touching edges do not count.
    pub fn overlaps(
        &self,
        transform: &Transform,
        other: &BoxCollider,
        other_transform: &Transform,
    ) -> bool {
        let (a_min, a_max) = self.bounds(transform);
        let (b_min, b_max) = other.bounds(other_transform);
        a_min.x < b_max.x && a_max.x > b_min.x && a_min.y < b_max.y && a_max.y > b_min.y
    }
}

/// A short-lived projectile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    /// Fired by the player's side.
    pub is_friendly: bool,
    /// Damage dealt on hit, as a percentage of full health.
    pub hit_percent_damage: i32,
    /// Lifetime in seconds.
    pub duration: f64,
    /// Simulation time at which the projectile was spawned.
    pub start_time: f64,
}

impl Projectile {
    /// Whether the projectile has outlived its duration at `now`.
    pub fn expired(&self, now: f64) -> bool {
        now - self.start_time > self.duration
    }
}

/// Fires a projectile every `repeat_frequency` seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectileEmitter {
    /// Velocity given to each projectile.
    pub projectile_velocity: Vec2,
    /// Seconds between shots.
    pub repeat_frequency: f64,
    /// Lifetime of each projectile in seconds.
    pub projectile_duration: f64,
    pub hit_percent_damage: i32,
    pub is_friendly: bool,
    /// Simulation time of the last shot.
    pub last_emission_time: f64,
}

impl ProjectileEmitter {
    /// Whether more than `repeat_frequency` seconds have passed since the last shot.
    pub fn ready(&self, now: f64) -> bool {
        now - self.last_emission_time > self.repeat_frequency
    }

    /// The projectile this emitter fires at `now`.
    pub fn projectile(&self, now: f64) -> Projectile {
        Projectile {
            is_friendly: self.is_friendly,
            hit_percent_damage: self.hit_percent_damage,
            duration: self.projectile_duration,
            start_time: now,
        }
    }
}

impl Default for ProjectileEmitter {
    fn default() -> Self {
        Self {
            projectile_velocity: Vec2::ZERO,
            repeat_frequency: 0.0,
            projectile_duration: 10.0,
            hit_percent_damage: 10,
            is_friendly: false,
            last_emission_time: 0.0,
        }
    }
}

/// Remaining health as a percentage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub health_percentage: i32,
}

impl Default for Health {
    fn default() -> Self {
        Self {
            health_percentage: 100,
        }
    }
}

/// Codecs for every component in this module, named in snake case.
pub fn default_codecs() -> ComponentCodecs {
    let mut codecs = ComponentCodecs::new();
    codecs.register::<Transform>("transform");
    codecs.register::<Rigidbody>("rigidbody");
    codecs.register::<BoxCollider>("box_collider");
    codecs.register::<Projectile>("projectile");
    codecs.register::<ProjectileEmitter>("projectile_emitter");
    codecs.register::<Health>("health");
    codecs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boxes_overlap_only_when_interiors_meet() {
        let collider = BoxCollider::new(10.0, 10.0);
        let a = Transform::at(Vec2::new(0.0, 0.0));
        let b = Transform::at(Vec2::new(5.0, 5.0));
        let c = Transform::at(Vec2::new(10.0, 0.0));
        assert!(collider.overlaps(&a, &collider, &b));
        assert!(!collider.overlaps(&a, &collider, &c));
    }

    #[test]
    fn offset_and_scale_move_the_box() {
        let collider = BoxCollider {
            width: 4.0,
            height: 2.0,
            offset: Vec2::new(1.0, 1.0),
        };
        let transform = Transform {
            position: Vec2::new(10.0, 10.0),
            scale: Vec2::new(2.0, 3.0),
            rotation: 0.0,
        };
        assert_eq!(
            collider.bounds(&transform),
            (Vec2::new(11.0, 11.0), Vec2::new(19.0, 17.0))
        );
    }

    #[test]
    fn projectile_expiry() {
        let projectile = Projectile {
            is_friendly: true,
            hit_percent_damage: 10,
            duration: 2.0,
            start_time: 1.0,
        };
        assert!(!projectile.expired(3.0));
        assert!(projectile.expired(3.5));
    }

    #[test]
    fn emitter_waits_out_its_frequency() {
        let emitter = ProjectileEmitter {
            repeat_frequency: 1.0,
            last_emission_time: 2.0,
            ..ProjectileEmitter::default()
        };
        assert!(!emitter.ready(3.0));
        assert!(emitter.ready(3.25));

        let shot = emitter.projectile(3.25);
        assert_eq!(shot.start_time, 3.25);
        assert_eq!(shot.duration, 10.0);
        assert_eq!(shot.hit_percent_damage, 10);
    }

    #[test]
    fn transform_defaults_when_deserialized() {
        let t: Transform = serde_json::from_str(r#"{"position":{"x":1.0,"y":2.0}}"#).unwrap();
        assert_eq!(t, Transform::at(Vec2::new(1.0, 2.0)));
    }
}
