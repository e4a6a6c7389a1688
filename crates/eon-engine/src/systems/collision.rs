//! Pairwise AABB overlap detection.

use eon_ecs::prelude::*;

use crate::components::{BoxCollider, Transform};
use crate::event_bus::EventBus;
use crate::frame::FrameContext;

/// Two colliders overlapped this frame. `a` joined the collision system
/// before `b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionEvent {
    pub a: Entity,
    pub b: Entity,
}

/// Emits a [`CollisionEvent`] for every overlapping pair of members.
#[derive(Debug, Default)]
pub struct CollisionSystem {
    /// Collisions reported since creation.
    pub total_collisions: u64,
}

impl System for CollisionSystem {
    fn require(&self, requirements: &mut Requirements<'_>) {
        requirements.require::<Transform>().require::<BoxCollider>();
    }
}

impl CollisionSystem {
    /// Test every pair once and emit one event per overlap.
    ///
    /// Entities already queued for a kill are skipped, so a projectile that
    /// hit something earlier in the frame does not hit again.
    pub fn update(&mut self, registry: &mut Registry, events: &mut EventBus) -> usize {
        let members = registry.system_entities::<Self>().to_vec();
        let mut reported = 0;
        for (i, &a) in members.iter().enumerate() {
            for &b in &members[i + 1..] {
                if registry.is_pending_kill(a) || registry.is_pending_kill(b) {
                    continue;
                }
                let overlapping = {
                    let a_box = registry.get_component::<BoxCollider>(a);
                    let b_box = registry.get_component::<BoxCollider>(b);
                    a_box.overlaps(
                        registry.get_component::<Transform>(a),
                        b_box,
                        registry.get_component::<Transform>(b),
                    )
                };
                if overlapping {
                    tracing::debug!(a = %a, b = %b, "collision");
                    events.emit(CollisionEvent { a, b }, registry);
                    reported += 1;
                }
            }
        }
        self.total_collisions += reported as u64;
        reported
    }
}

pub fn run(ctx: &mut FrameContext<'_>) {
    let events = &mut *ctx.events;
    ctx.registry
        .with_system::<CollisionSystem, _>(|system, registry| {
            system.update(registry, events);
        });
}
