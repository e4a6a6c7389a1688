//! Built-in gameplay systems.
//!
//! Each system is an ECS [`System`](eon_ecs::system::System) holding its own
//! state plus a `run` function the [`FrameLoop`] calls once per frame.

pub mod collision;
pub mod damage;
pub mod movement;
pub mod projectile_emit;
pub mod projectile_lifecycle;

pub use collision::{CollisionEvent, CollisionSystem};
pub use damage::DamageSystem;
pub use movement::MovementSystem;
pub use projectile_emit::ProjectileEmitSystem;
pub use projectile_lifecycle::ProjectileLifecycleSystem;

use crate::frame::FrameLoop;

/// Register the built-in systems and their frame functions, in the order
/// movement, collision, projectile emission, projectile lifecycle. Damage is
/// event-driven.
pub fn install_default_systems(frame_loop: &mut FrameLoop) {
    let registry = frame_loop.registry_mut();
    registry.add_system(MovementSystem);
    registry.add_system(CollisionSystem::default());
    registry.add_system(DamageSystem);
    registry.add_system(ProjectileEmitSystem::default());
    registry.add_system(ProjectileLifecycleSystem);

    DamageSystem::subscribe_to_events(frame_loop.event_bus_mut());

    frame_loop.add_system("movement", movement::run);
    frame_loop.add_system("collision", collision::run);
    frame_loop.add_system("projectile_emit", projectile_emit::run);
    frame_loop.add_system("projectile_lifecycle", projectile_lifecycle::run);
}
