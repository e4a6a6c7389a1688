//! Expires projectiles once they outlive their duration.

use eon_ecs::prelude::*;

use crate::components::Projectile;
use crate::frame::FrameContext;

#[derive(Debug, Default)]
pub struct ProjectileLifecycleSystem;

impl System for ProjectileLifecycleSystem {
    fn require(&self, requirements: &mut Requirements<'_>) {
        requirements.require::<Projectile>();
    }
}

impl ProjectileLifecycleSystem {
    /// Queue a kill for every projectile expired at `now`. Returns how many.
    pub fn update(&mut self, registry: &mut Registry, now: f64) -> usize {
        let expired: Vec<Entity> = registry
            .system_entities::<Self>()
            .iter()
            .copied()
            .filter(|&e| registry.get_component::<Projectile>(e).expired(now))
            .collect();
        for &entity in &expired {
            registry.kill_entity(entity);
        }
        if !expired.is_empty() {
            tracing::debug!(count = expired.len(), now, "projectiles expired");
        }
        expired.len()
    }
}

pub fn run(ctx: &mut FrameContext<'_>) {
    let now = ctx.sim_time;
    ctx.registry
        .with_system::<ProjectileLifecycleSystem, _>(|system, registry| {
            system.update(registry, now);
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn projectile(start_time: f64) -> Projectile {
        Projectile {
            is_friendly: false,
            hit_percent_damage: 10,
            duration: 1.0,
            start_time,
        }
    }

    #[test]
    fn only_expired_projectiles_die_at_next_flush() {
        let mut registry = Registry::new();
        registry.add_system(ProjectileLifecycleSystem);
        let old = registry.create_entity();
        registry.add_component(old, projectile(0.0));
        let young = registry.create_entity();
        registry.add_component(young, projectile(2.0));
        registry.update();

        let killed = registry.with_system::<ProjectileLifecycleSystem, _>(|system, registry| {
            system.update(registry, 2.5)
        });
        assert_eq!(killed, 1);
        assert!(registry.is_active(old));

        registry.update();
        assert!(!registry.is_active(old));
        assert_eq!(registry.system_entities::<ProjectileLifecycleSystem>(), &[young]);
    }
}
