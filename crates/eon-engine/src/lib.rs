//! Eon Engine -- gameplay layer on top of [`eon_ecs`].
//!
//! Provides the pieces a game built on the ECS core needs around it: the
//! stock [`components`], a typed [`event_bus`] for cross-system
//! notifications, the built-in [`systems`], a fixed-timestep [`frame`] loop,
//! and registry [`snapshot`]s.
//!
//! # Quick Start
//!
//! ```
//! use eon_engine::prelude::*;
//!
//! let mut frame_loop = FrameLoop::new(Registry::new(), FrameConfig::default());
//! install_default_systems(&mut frame_loop);
//!
//! let ship = frame_loop.registry_mut().create_entity();
//! frame_loop
//!     .registry_mut()
//!     .entity_mut(ship)
//!     .add_component(Transform::at(Vec2::ZERO))
//!     .add_component(Rigidbody { velocity: Vec2::new(60.0, 0.0) });
//!
//! frame_loop.run_frames(60);
//! let x = frame_loop.registry().get_component::<Transform>(ship).position.x;
//! assert!((x - 60.0).abs() < 1e-9);
//! ```

#![deny(unsafe_code)]

pub mod components;
pub mod event_bus;
pub mod frame;
pub mod scene;
pub mod snapshot;
pub mod systems;

/// Re-export the ECS crate for convenience.
pub use eon_ecs;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    pub use eon_ecs::prelude::*;

    pub use crate::components::{
        default_codecs, BoxCollider, Health, Projectile, ProjectileEmitter, Rigidbody, Transform,
        Vec2,
    };
    pub use crate::event_bus::EventBus;
    pub use crate::frame::{FrameConfig, FrameContext, FrameDiagnostics, FrameLoop, SystemFn};
    pub use crate::scene::{spawn_scene, SceneConfig, SimConfig};
    pub use crate::snapshot::{ComponentCodecs, EntitySnapshot, RegistrySnapshot, SnapshotError};
    pub use crate::systems::{
        install_default_systems, CollisionEvent, CollisionSystem, DamageSystem, MovementSystem,
        ProjectileEmitSystem, ProjectileLifecycleSystem,
    };
}
