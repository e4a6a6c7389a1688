//! Registry configuration.

use serde::{Deserialize, Serialize};

/// What [`Registry::add_system`](crate::registry::Registry::add_system) does
/// when a system of the same type is already registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DuplicateSystemPolicy {
    /// Keep the existing system and report
    /// [`EcsError::DuplicateSystem`](crate::EcsError::DuplicateSystem).
    #[default]
    Reject,
    /// Drop the existing system (and its membership) and install the new one.
    Replace,
}

/// When system membership is recomputed for an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MembershipPolicy {
    /// Only when the entity's creation or kill is flushed. Components added
    /// or removed later, and systems added later, never change membership.
    LifecycleOnly,
    /// Also at the first flush after the entity's signature changed, and for
    /// every active entity at the first flush after a system was added.
    #[default]
    ResyncOnFlush,
}

/// Configuration for a [`Registry`](crate::registry::Registry).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Values each new component pool reserves room for up front.
    pub initial_pool_capacity: usize,
    /// Behavior on a second `add_system` of the same type.
    pub duplicate_system: DuplicateSystemPolicy,
    /// When membership is recomputed.
    pub membership: MembershipPolicy,
}

impl Default for RegistryConfig {
    /// 100-slot pools, reject duplicate systems, resync membership on flush.
    fn default() -> Self {
        Self {
            initial_pool_capacity: 100,
            duplicate_system: DuplicateSystemPolicy::default(),
            membership: MembershipPolicy::default(),
        }
    }
}
