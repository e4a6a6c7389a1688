//! Spawns projectiles from emitters on a fixed repeat.

use eon_ecs::prelude::*;

use crate::components::{BoxCollider, Projectile, ProjectileEmitter, Rigidbody, Transform, Vec2};
use crate::frame::FrameContext;

/// Side length of every emitted projectile's collider.
pub const PROJECTILE_SIZE: f64 = 4.0;

/// Fires projectiles from every entity with a [`ProjectileEmitter`] and a
/// [`Transform`].
#[derive(Debug, Default)]
pub struct ProjectileEmitSystem {
    /// Projectiles spawned since the system was added.
    pub total_emitted: u64,
}

impl System for ProjectileEmitSystem {
    fn require(&self, requirements: &mut Requirements<'_>) {
        requirements
            .require::<ProjectileEmitter>()
            .require::<Transform>();
    }
}

impl ProjectileEmitSystem {
    /// Spawn one projectile per emitter that is ready at `now`. Returns how
    /// many were spawned; they join systems at the next flush.
    pub fn update(&mut self, registry: &mut Registry, now: f64) -> usize {
        let mut emitted = 0;
        for emitter in registry.system_entities::<Self>().to_vec() {
            let settings = registry.get_component::<ProjectileEmitter>(emitter);
            if !settings.ready(now) {
                continue;
            }
            let velocity = settings.projectile_velocity;
            let projectile = settings.projectile(now);
            let position = muzzle(registry, emitter);

            let shot = registry.create_entity();
            registry
                .entity_mut(shot)
                .add_component(Transform::at(position))
                .add_component(Rigidbody { velocity })
                .add_component(BoxCollider::new(PROJECTILE_SIZE, PROJECTILE_SIZE))
                .add_component(projectile);
            registry
                .get_component_mut::<ProjectileEmitter>(emitter)
                .last_emission_time = now;

            tracing::trace!(emitter = %emitter, projectile = %shot, now, "projectile emitted");
            emitted += 1;
        }
        self.total_emitted += emitted as u64;
        emitted
    }
}

/// Where an emitter's shots start: the centre of its collider, or its
/// position when it has none.
fn muzzle(registry: &Registry, emitter: Entity) -> Vec2 {
    let transform = registry.get_component::<Transform>(emitter);
    if !registry.has_component::<BoxCollider>(emitter) {
        return transform.position;
    }
    let (min, max) = registry
        .get_component::<BoxCollider>(emitter)
        .bounds(transform);
    (min + max) * 0.5
}

/// Frame-loop entry point.
pub fn run(ctx: &mut FrameContext<'_>) {
    let now = ctx.sim_time;
    ctx.registry
        .with_system::<ProjectileEmitSystem, _>(|system, registry| {
            system.update(registry, now);
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turret(registry: &mut Registry, x: f64) -> Entity {
        let e = registry.create_entity();
        registry
            .entity_mut(e)
            .add_component(Transform::at(Vec2::new(x, 0.0)))
            .add_component(ProjectileEmitter {
                projectile_velocity: Vec2::new(0.0, 50.0),
                repeat_frequency: 1.0,
                projectile_duration: 3.0,
                hit_percent_damage: 25,
                is_friendly: true,
                last_emission_time: 0.0,
            });
        e
    }

    fn emit(registry: &mut Registry, now: f64) -> usize {
        registry.with_system::<ProjectileEmitSystem, _>(|system, registry| {
            system.update(registry, now)
        })
    }

    #[test]
    fn emits_once_per_repeat_interval() {
        let mut registry = Registry::new();
        registry.add_system(ProjectileEmitSystem::default());
        let gun = turret(&mut registry, 10.0);
        registry.update();

        assert_eq!(emit(&mut registry, 1.0), 0);
        assert_eq!(emit(&mut registry, 1.5), 1);
        assert_eq!(emit(&mut registry, 2.0), 0);
        assert_eq!(emit(&mut registry, 2.75), 1);
        assert_eq!(
            registry.get_component::<ProjectileEmitter>(gun).last_emission_time,
            2.75
        );
        assert_eq!(registry.get_system::<ProjectileEmitSystem>().total_emitted, 2);
    }

    #[test]
    fn shot_copies_the_emitter_settings() {
        let mut registry = Registry::new();
        registry.add_system(ProjectileEmitSystem::default());
        turret(&mut registry, 10.0);
        registry.update();

        emit(&mut registry, 1.5);
        let shot = *registry
            .entities()
            .iter()
            .find(|&&e| registry.has_component::<Projectile>(e))
            .unwrap();
        assert!(registry.is_pending_add(shot));
        assert_eq!(
            registry.get_component::<Projectile>(shot),
            &Projectile {
                is_friendly: true,
                hit_percent_damage: 25,
                duration: 3.0,
                start_time: 1.5,
            }
        );
        assert_eq!(
            registry.get_component::<Transform>(shot).position,
            Vec2::new(10.0, 0.0)
        );
        assert_eq!(
            registry.get_component::<Rigidbody>(shot).velocity,
            Vec2::new(0.0, 50.0)
        );
    }

    #[test]
    fn shots_leave_from_the_collider_centre() {
        let mut registry = Registry::new();
        registry.add_system(ProjectileEmitSystem::default());
        let gun = turret(&mut registry, 10.0);
        registry.add_component(gun, BoxCollider::new(8.0, 6.0));
        registry.update();

        emit(&mut registry, 1.5);
        assert_eq!(registry.pool_len::<Projectile>(), 1);
        let position = registry
            .entities()
            .iter()
            .copied()
            .filter(|&e| registry.has_component::<Projectile>(e))
            .map(|e| registry.get_component::<Transform>(e).position)
            .next();
        assert_eq!(position, Some(Vec2::new(14.0, 3.0)));
    }

    #[test]
    fn emitters_without_a_transform_stay_silent() {
        let mut registry = Registry::new();
        registry.add_system(ProjectileEmitSystem::default());
        let e = registry.create_entity();
        registry.add_component(e, ProjectileEmitter::default());
        registry.update();

        assert_eq!(emit(&mut registry, 5.0), 0);
        assert_eq!(registry.entity_count(), 1);
    }
}
