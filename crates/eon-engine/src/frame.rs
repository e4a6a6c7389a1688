//! Fixed-timestep frame loop.
//!
//! Each [`FrameLoop::frame`]:
//!
//! 1. Flushes the registry ([`Registry::update`]): entities created or killed
//!    during the previous frame join or leave their systems.
//! 2. Runs every frame function in registration order, timing each one.
//! 3. Advances the frame counter.
//!
//! Simulation time is `frame_count * fixed_dt`, never an accumulated sum.
//!
//! ```
//! use eon_engine::prelude::*;
//!
//! let mut frame_loop = FrameLoop::new(Registry::new(), FrameConfig::default());
//! frame_loop.add_system("noop", |_ctx| {});
//! frame_loop.run_frames(10);
//! assert_eq!(frame_loop.frame_count(), 10);
//! ```

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use eon_ecs::registry::Registry;

use crate::event_bus::EventBus;

// ---------------------------------------------------------------------------
// FrameConfig
// ---------------------------------------------------------------------------

/// Configuration for the frame loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Seconds per frame. Must be positive and finite.
    pub fixed_dt: f64,
    /// Upper bound for [`FrameLoop::run`]. `None` means unbounded.
    pub max_frames: Option<u64>,
}

impl Default for FrameConfig {
    /// 60 Hz, unbounded.
    fn default() -> Self {
        Self {
            fixed_dt: 1.0 / 60.0,
            max_frames: None,
        }
    }
}

// ---------------------------------------------------------------------------
// FrameDiagnostics
// ---------------------------------------------------------------------------

/// Timing of the last frame.
#[derive(Debug, Clone, Default)]
pub struct FrameDiagnostics {
    /// Wall-clock time of each frame function, in execution order.
    pub system_times: Vec<(String, Duration)>,
    /// Time spent in the registry flush.
    pub flush_time: Duration,
    /// Whole frame.
    pub total_time: Duration,
    /// Active entities after the frame.
    pub entity_count: usize,
}

// ---------------------------------------------------------------------------
// FrameContext / SystemFn
// ---------------------------------------------------------------------------

/// What a frame function gets to work with.
pub struct FrameContext<'a> {
    pub registry: &'a mut Registry,
    pub events: &'a mut EventBus,
    /// Seconds per frame.
    pub dt: f64,
    /// Simulation time at the start of this frame.
    pub sim_time: f64,
    /// Index of this frame, starting at 0.
    pub frame: u64,
}

/// A per-frame function, usually forwarding to one ECS system through
/// [`Registry::with_system`].
pub type SystemFn = fn(&mut FrameContext<'_>);

struct FrameSystem {
    name: String,
    func: SystemFn,
}

// ---------------------------------------------------------------------------
// FrameLoop
// ---------------------------------------------------------------------------

/// Owns a [`Registry`] and an [`EventBus`] and drives them frame by frame.
pub struct FrameLoop {
    registry: Registry,
    event_bus: EventBus,
    systems: Vec<FrameSystem>,
    frame_counter: u64,
    config: FrameConfig,
    last_diagnostics: FrameDiagnostics,
}

impl FrameLoop {
    /// # Panics
    ///
    /// Panics if `config.fixed_dt` is not positive and finite.
    pub fn new(registry: Registry, config: FrameConfig) -> Self {
        assert!(
            config.fixed_dt > 0.0 && config.fixed_dt.is_finite(),
            "fixed_dt must be positive and finite, got {}",
            config.fixed_dt
        );
        Self {
            registry,
            event_bus: EventBus::new(),
            systems: Vec::new(),
            frame_counter: 0,
            config,
            last_diagnostics: FrameDiagnostics::default(),
        }
    }

    /// Append a frame function. Functions run in registration order.
    ///
    /// # Panics
    ///
    /// Panics if a function with the same name is already registered.
    pub fn add_system(&mut self, name: &str, func: SystemFn) {
        assert!(
            !self.systems.iter().any(|s| s.name == name),
            "duplicate system name: {name:?}"
        );
        self.systems.push(FrameSystem {
            name: name.to_owned(),
            func,
        });
    }

    /// Run one frame.
    pub fn frame(&mut self) {
        let frame_start = Instant::now();

        let flush_start = Instant::now();
        self.registry.update();
        let flush_time = flush_start.elapsed();

        let mut ctx = FrameContext {
            registry: &mut self.registry,
            events: &mut self.event_bus,
            dt: self.config.fixed_dt,
            sim_time: self.frame_counter as f64 * self.config.fixed_dt,
            frame: self.frame_counter,
        };
        let mut system_times = Vec::with_capacity(self.systems.len());
        for system in &self.systems {
            let start = Instant::now();
            (system.func)(&mut ctx);
            system_times.push((system.name.clone(), start.elapsed()));
        }

        self.frame_counter += 1;
        self.last_diagnostics = FrameDiagnostics {
            system_times,
            flush_time,
            total_time: frame_start.elapsed(),
            entity_count: self.registry.entity_count(),
        };
        tracing::trace!(
            frame = self.frame_counter,
            entities = self.last_diagnostics.entity_count,
            "frame complete"
        );
    }

    /// Run `count` frames.
    pub fn run_frames(&mut self, count: u64) {
        for _ in 0..count {
            self.frame();
        }
    }

    /// Run until `max_frames` frames have executed in total. Returns how many
    /// frames this call ran.
    ///
    /// # Panics
    ///
    /// Panics if `max_frames` is `None`.
    pub fn run(&mut self) -> u64 {
        let max_frames = self
            .config
            .max_frames
            .unwrap_or_else(|| panic!("FrameLoop::run requires max_frames to be set"));
        let remaining = max_frames.saturating_sub(self.frame_counter);
        self.run_frames(remaining);
        remaining
    }

    // -- accessors ----------------------------------------------------------

    pub fn frame_count(&self) -> u64 {
        self.frame_counter
    }

    /// `frame_count * fixed_dt`.
    pub fn sim_time(&self) -> f64 {
        self.frame_counter as f64 * self.config.fixed_dt
    }

    pub fn fixed_dt(&self) -> f64 {
        self.config.fixed_dt
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Direct registry access for setup and tests.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn event_bus_mut(&mut self) -> &mut EventBus {
        &mut self.event_bus
    }

    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// Names of all frame functions, in execution order.
    pub fn system_names(&self) -> Vec<&str> {
        self.systems.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn last_diagnostics(&self) -> &FrameDiagnostics {
        &self.last_diagnostics
    }

    /// Give the registry back, dropping systems and subscriptions.
    pub fn into_registry(self) -> Registry {
        self.registry
    }
}

impl std::fmt::Debug for FrameLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameLoop")
            .field("frame_counter", &self.frame_counter)
            .field("config", &self.config)
            .field("systems", &self.system_names())
            .field("registry", &self.registry)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use eon_ecs::prelude::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Counter(u64);

    struct Counting;

    impl System for Counting {
        fn require(&self, requirements: &mut Requirements<'_>) {
            requirements.require::<Counter>();
        }
    }

    fn count_up(ctx: &mut FrameContext<'_>) {
        for e in ctx.registry.system_entities::<Counting>().to_vec() {
            ctx.registry.get_component_mut::<Counter>(e).0 += 1;
        }
    }

    fn spawn_one(ctx: &mut FrameContext<'_>) {
        if ctx.frame == 0 {
            let e = ctx.registry.create_entity();
            ctx.registry.add_component(e, Counter(0));
        }
    }

    #[test]
    fn new_loop_starts_at_zero() {
        let frame_loop = FrameLoop::new(Registry::new(), FrameConfig::default());
        assert_eq!(frame_loop.frame_count(), 0);
        assert_eq!(frame_loop.sim_time(), 0.0);
        assert_eq!(frame_loop.system_count(), 0);
    }

    #[test]
    #[should_panic(expected = "fixed_dt must be positive")]
    fn zero_dt_panics() {
        FrameLoop::new(
            Registry::new(),
            FrameConfig {
                fixed_dt: 0.0,
                ..FrameConfig::default()
            },
        );
    }

    #[test]
    #[should_panic(expected = "fixed_dt must be positive")]
    fn nan_dt_panics() {
        FrameLoop::new(
            Registry::new(),
            FrameConfig {
                fixed_dt: f64::NAN,
                ..FrameConfig::default()
            },
        );
    }

    #[test]
    #[should_panic(expected = "duplicate system name")]
    fn duplicate_name_panics() {
        let mut frame_loop = FrameLoop::new(Registry::new(), FrameConfig::default());
        frame_loop.add_system("count", count_up);
        frame_loop.add_system("count", count_up);
    }

    #[test]
    fn entities_created_in_a_frame_join_systems_next_frame() {
        let mut registry = Registry::new();
        registry.add_system(Counting);
        let mut frame_loop = FrameLoop::new(registry, FrameConfig::default());
        frame_loop.add_system("spawn", spawn_one);
        frame_loop.add_system("count", count_up);

        frame_loop.frame();
        let e = *frame_loop.registry().entities().iter().next().unwrap();
        assert_eq!(frame_loop.registry().get_component::<Counter>(e), &Counter(0));

        frame_loop.run_frames(3);
        assert_eq!(frame_loop.registry().get_component::<Counter>(e), &Counter(3));
        assert_eq!(frame_loop.system_names(), vec!["spawn", "count"]);
        assert_eq!(frame_loop.last_diagnostics().system_times.len(), 2);
        assert_eq!(frame_loop.last_diagnostics().entity_count, 1);
    }

    #[test]
    fn sim_time_is_frames_times_dt() {
        let mut frame_loop = FrameLoop::new(
            Registry::new(),
            FrameConfig {
                fixed_dt: 0.01,
                max_frames: Some(7),
            },
        );
        assert_eq!(frame_loop.run(), 7);
        assert_eq!(frame_loop.run(), 0);
        assert_eq!(frame_loop.frame_count(), 7);
        assert!((frame_loop.sim_time() - 0.07).abs() < 1e-12);
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: FrameConfig = serde_json::from_str(r#"{"max_frames":120}"#).unwrap();
        assert_eq!(config.max_frames, Some(120));
        assert_eq!(config.fixed_dt, FrameConfig::default().fixed_dt);
    }
}
