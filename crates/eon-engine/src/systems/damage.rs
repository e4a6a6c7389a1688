//! Resolves collisions: both parties of a [`CollisionEvent`] are destroyed.

use eon_ecs::prelude::*;

use crate::components::BoxCollider;
use crate::event_bus::EventBus;
use crate::systems::collision::CollisionEvent;

#[derive(Debug, Default)]
pub struct DamageSystem;

impl System for DamageSystem {
    fn require(&self, requirements: &mut Requirements<'_>) {
        requirements.require::<BoxCollider>();
    }
}

impl DamageSystem {
    /// Subscribe the collision handler on `events`.
    pub fn subscribe_to_events(events: &mut EventBus) {
        events.subscribe::<CollisionEvent>(Self::on_collision);
    }

    fn on_collision(event: &CollisionEvent, registry: &mut Registry) {
        tracing::debug!(a = %event.a, b = %event.b, "collision damage: killing both entities");
        registry.kill_entity(event.a);
        registry.kill_entity(event.b);
    }
}
