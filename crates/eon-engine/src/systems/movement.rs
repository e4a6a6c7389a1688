//! Integrates rigidbody velocity into transform position.

use eon_ecs::prelude::*;

use crate::components::{Rigidbody, Transform};
use crate::frame::FrameContext;

/// Moves every entity with a [`Transform`] and a [`Rigidbody`].
#[derive(Debug, Default)]
pub struct MovementSystem;

impl System for MovementSystem {
    fn require(&self, requirements: &mut Requirements<'_>) {
        requirements.require::<Transform>().require::<Rigidbody>();
    }
}

impl MovementSystem {
    /// Advance every member by `velocity * dt`.
    pub fn update(&mut self, registry: &mut Registry, dt: f64) {
        for entity in registry.system_entities::<Self>().to_vec() {
            let velocity = registry.get_component::<Rigidbody>(entity).velocity;
            let transform = registry.get_component_mut::<Transform>(entity);
            transform.position += velocity * dt;
            tracing::trace!(
                entity = %entity,
                x = transform.position.x,
                y = transform.position.y,
                "entity moved"
            );
        }
    }
}

/// Frame-loop entry point.
pub fn run(ctx: &mut FrameContext<'_>) {
    let dt = ctx.dt;
    ctx.registry
        .with_system::<MovementSystem, _>(|system, registry| system.update(registry, dt));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Vec2;

    #[test]
    fn members_move_by_velocity_times_dt() {
        let mut registry = Registry::new();
        registry.add_system(MovementSystem);
        let e = registry.create_entity();
        registry
            .entity_mut(e)
            .add_component(Transform::at(Vec2::new(1.0, 1.0)))
            .add_component(Rigidbody {
                velocity: Vec2::new(10.0, -4.0),
            });
        let parked = registry.create_entity();
        registry.add_component(parked, Transform::at(Vec2::ZERO));
        registry.update();

        registry.with_system::<MovementSystem, _>(|system, registry| system.update(registry, 0.5));

        assert_eq!(
            registry.get_component::<Transform>(e).position,
            Vec2::new(6.0, -1.0)
        );
        assert_eq!(registry.get_component::<Transform>(parked).position, Vec2::ZERO);
    }
}
