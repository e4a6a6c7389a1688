//! Registry snapshot and restore with BLAKE3 hashing.
//!
//! A [`RegistrySnapshot`] records every settled entity (active and not
//! queued for a kill) with its tag, its group and the JSON form of each
//! component type listed in a [`ComponentCodecs`] table. Component types
//! missing from the table are not captured.
//!
//! Everything goes through the public [`Registry`] API. Restoring clears the
//! target registry and recreates the entities, so IDs are handed out by the
//! registry's allocator again; [`RegistrySnapshot::restore`] returns the
//! old-to-new ID mapping. The hash covers entity contents only, so it does
//! not change across a restore.
//!
//! ```
//! use eon_engine::prelude::*;
//!
//! let mut codecs = ComponentCodecs::new();
//! codecs.register::<Health>("health");
//!
//! let mut registry = Registry::new();
//! let e = registry.create_entity();
//! registry.add_component(e, Health { health_percentage: 40 });
//! registry.tag_entity(e, "player");
//! registry.update();
//!
//! let snapshot = RegistrySnapshot::capture(&registry, &codecs).unwrap();
//! assert_eq!(snapshot.hash.len(), 64);
//!
//! let mut restored = Registry::new();
//! snapshot.restore(&mut restored, &codecs).unwrap();
//! let player = restored.entity_by_tag("player").unwrap();
//! assert_eq!(restored.get_component::<Health>(player).health_percentage, 40);
//! ```

use std::any::Any;
use std::collections::{BTreeMap, HashMap};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use eon_ecs::entity::Entity;
use eon_ecs::registry::Registry;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors produced while capturing or restoring a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// A component value could not be turned into JSON.
    #[error("failed to serialize component '{component}' of entity {entity}: {source}")]
    Serialize {
        component: String,
        entity: Entity,
        #[source]
        source: serde_json::Error,
    },

    /// A JSON value could not be turned back into its component type.
    #[error("failed to deserialize component '{component}' of entity {entity}: {source}")]
    Deserialize {
        component: String,
        entity: Entity,
        #[source]
        source: serde_json::Error,
    },

    /// The snapshot names a component the codec table does not know.
    #[error("unknown component '{name}' (registered: {registered})")]
    UnknownComponent { name: String, registered: String },

    /// The recorded hash does not match the snapshot contents.
    #[error("snapshot hash mismatch: recorded {recorded} but recomputed {computed}")]
    HashMismatch { recorded: String, computed: String },
}

// ---------------------------------------------------------------------------
// ComponentCodecs
// ---------------------------------------------------------------------------

type EncodeFn =
    Box<dyn Fn(&Registry, Entity) -> Option<Result<serde_json::Value, serde_json::Error>>>;
type DecodeFn = Box<dyn Fn(&serde_json::Value) -> Result<Box<dyn Any>, serde_json::Error>>;
type AttachFn = Box<dyn Fn(&mut Registry, Entity, Box<dyn Any>)>;

struct Codec {
    encode: EncodeFn,
    /// JSON -> boxed component, without touching any registry.
    decode: DecodeFn,
    /// Attach a value produced by `decode` of the same codec.
    attach: AttachFn,
}

/// Name-keyed table of component types that snapshots carry.
#[derive(Default)]
pub struct ComponentCodecs {
    codecs: BTreeMap<String, Codec>,
}

impl ComponentCodecs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Carry component type `T` under `name`.
    ///
    /// # Panics
    ///
    /// Panics if `name` is already taken.
    pub fn register<T>(&mut self, name: &str)
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        assert!(
            !self.codecs.contains_key(name),
            "component codec name already registered: {name:?}"
        );
        let codec = Codec {
            encode: Box::new(|registry: &Registry, entity: Entity| {
                registry
                    .has_component::<T>(entity)
                    .then(|| serde_json::to_value(registry.get_component::<T>(entity)))
            }),
            decode: Box::new(|value: &serde_json::Value| {
                let component = serde_json::from_value::<T>(value.clone())?;
                Ok(Box::new(component) as Box<dyn Any>)
            }),
            attach: Box::new(|registry: &mut Registry, entity: Entity, value: Box<dyn Any>| {
                if let Ok(component) = value.downcast::<T>() {
                    registry.add_component(entity, *component);
                }
            }),
        };
        self.codecs.insert(name.to_owned(), codec);
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.codecs.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }
}

impl std::fmt::Debug for ComponentCodecs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.codecs.keys()).finish()
    }
}

// ---------------------------------------------------------------------------
// Snapshot types
// ---------------------------------------------------------------------------

/// One captured entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// ID at capture time.
    pub entity: Entity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Component name -> JSON value. `BTreeMap` keeps serialization stable.
    pub components: BTreeMap<String, serde_json::Value>,
}

/// Captured registry contents plus a BLAKE3 hex digest of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    /// Ordered by capture-time ID.
    pub entities: Vec<EntitySnapshot>,
    /// 64 lowercase hex chars.
    pub hash: String,
}

/// The parts of an [`EntitySnapshot`] that are hashed.
#[derive(Serialize)]
struct HashedEntity<'a> {
    tag: &'a Option<String>,
    group: &'a Option<String>,
    components: &'a BTreeMap<String, serde_json::Value>,
}

/// BLAKE3 over the entity contents, leaving out entity IDs and the order
/// entities were listed in. Restoring hands out fresh IDs, so a restored
/// registry hashes the same as the one it was captured from.
fn compute_hash(entities: &[EntitySnapshot]) -> String {
    let mut encoded: Vec<Vec<u8>> = entities
        .iter()
        .map(|e| {
            serde_json::to_vec(&HashedEntity {
                tag: &e.tag,
                group: &e.group,
                components: &e.components,
            })
            .expect("snapshot entities are always JSON-serializable")
        })
        .collect();
    encoded.sort_unstable();

    let mut hasher = blake3::Hasher::new();
    for bytes in &encoded {
        hasher.update(&(bytes.len() as u64).to_le_bytes());
        hasher.update(bytes);
    }
    hasher.finalize().to_hex().to_string()
}

impl RegistrySnapshot {
    /// Capture every settled entity of `registry`.
    pub fn capture(registry: &Registry, codecs: &ComponentCodecs) -> Result<Self, SnapshotError> {
        let mut entities = Vec::with_capacity(registry.entity_count());
        for &entity in registry.entities() {
            if registry.is_pending_kill(entity) {
                continue;
            }
            let mut components = BTreeMap::new();
            for (name, codec) in &codecs.codecs {
                if let Some(value) = (codec.encode)(registry, entity) {
                    let value = value.map_err(|source| SnapshotError::Serialize {
                        component: name.clone(),
                        entity,
                        source,
                    })?;
                    components.insert(name.clone(), value);
                }
            }
            entities.push(EntitySnapshot {
                entity,
                tag: registry.entity_tag(entity).map(str::to_owned),
                group: registry.entity_group(entity).map(str::to_owned),
                components,
            });
        }

        let hash = compute_hash(&entities);
        tracing::debug!(entities = entities.len(), %hash, "registry snapshot captured");
        Ok(Self { entities, hash })
    }

    /// BLAKE3 digest of `registry` as [`capture`](Self::capture) would record it.
    pub fn state_hash(
        registry: &Registry,
        codecs: &ComponentCodecs,
    ) -> Result<String, SnapshotError> {
        Ok(Self::capture(registry, codecs)?.hash)
    }

    /// Whether the recorded hash matches the contents.
    pub fn verify(&self) -> Result<(), SnapshotError> {
        let computed = compute_hash(&self.entities);
        if computed == self.hash {
            Ok(())
        } else {
            Err(SnapshotError::HashMismatch {
                recorded: self.hash.clone(),
                computed,
            })
        }
    }

    /// Replace the contents of `registry` with this snapshot and flush.
    ///
    /// The hash is checked and every component is decoded before `registry`
    /// is touched, so a failed restore leaves it as it was. Returns
    /// capture-time ID -> new ID.
    pub fn restore(
        &self,
        registry: &mut Registry,
        codecs: &ComponentCodecs,
    ) -> Result<HashMap<Entity, Entity>, SnapshotError> {
        self.verify()?;

        let mut decoded = Vec::with_capacity(self.entities.len());
        for snapshot in &self.entities {
            let mut components = Vec::with_capacity(snapshot.components.len());
            for (name, value) in &snapshot.components {
                let codec =
                    codecs
                        .codecs
                        .get(name)
                        .ok_or_else(|| SnapshotError::UnknownComponent {
                            name: name.clone(),
                            registered: codecs.names().collect::<Vec<_>>().join(", "),
                        })?;
                let component =
                    (codec.decode)(value).map_err(|source| SnapshotError::Deserialize {
                        component: name.clone(),
                        entity: snapshot.entity,
                        source,
                    })?;
                components.push((codec, component));
            }
            decoded.push(components);
        }

        registry.clear();

        let mut mapping = HashMap::with_capacity(self.entities.len());
        for (snapshot, components) in self.entities.iter().zip(decoded) {
            let entity = registry.create_entity();
            mapping.insert(snapshot.entity, entity);
            for (codec, component) in components {
                (codec.attach)(registry, entity, component);
            }
            if let Some(tag) = &snapshot.tag {
                registry.tag_entity(entity, tag);
            }
            if let Some(group) = &snapshot.group {
                registry.group_entity(entity, group);
            }
        }
        registry.update();

        tracing::debug!(entities = mapping.len(), hash = %self.hash, "registry snapshot restored");
        Ok(mapping)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Health, Transform, Vec2};

    fn codecs() -> ComponentCodecs {
        let mut codecs = ComponentCodecs::new();
        codecs.register::<Transform>("transform");
        codecs.register::<Health>("health");
        codecs
    }

    #[test]
    fn capture_skips_entities_pending_kill() {
        let mut registry = Registry::new();
        let keep = registry.create_entity();
        registry.add_component(keep, Health::default());
        let doomed = registry.create_entity();
        registry.update();
        registry.kill_entity(doomed);

        let snapshot = RegistrySnapshot::capture(&registry, &codecs()).unwrap();
        assert_eq!(snapshot.entities.len(), 1);
        assert_eq!(snapshot.entities[0].entity, keep);
        assert!(snapshot.entities[0].components.contains_key("health"));
    }

    #[test]
    fn same_contents_same_hash() {
        let build = || {
            let mut registry = Registry::new();
            let e = registry.create_entity();
            registry.add_component(e, Transform::at(Vec2::new(3.0, 4.0)));
            registry.group_entity(e, "props");
            registry.update();
            RegistrySnapshot::state_hash(&registry, &codecs()).unwrap()
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn tampered_snapshot_is_rejected_before_restore() {
        let mut registry = Registry::new();
        let e = registry.create_entity();
        registry.add_component(e, Health::default());
        let mut snapshot = RegistrySnapshot::capture(&registry, &codecs()).unwrap();
        snapshot.entities[0]
            .components
            .insert("health".to_owned(), serde_json::json!({"health_percentage": 1}));

        let mut target = Registry::new();
        let survivor = target.create_entity();
        let err = snapshot.restore(&mut target, &codecs()).unwrap_err();
        assert!(matches!(err, SnapshotError::HashMismatch { .. }));
        assert!(target.is_active(survivor));
    }

    #[test]
    fn unknown_component_is_rejected() {
        let mut registry = Registry::new();
        let e = registry.create_entity();
        registry.add_component(e, Health::default());
        let snapshot = RegistrySnapshot::capture(&registry, &codecs()).unwrap();

        let mut only_transform = ComponentCodecs::new();
        only_transform.register::<Transform>("transform");
        let err = snapshot
            .restore(&mut Registry::new(), &only_transform)
            .unwrap_err();
        assert!(err.to_string().contains("unknown component 'health'"));
    }

    #[test]
    fn restore_keeps_the_hash_when_ids_have_gaps() {
        let mut source = Registry::new();
        let ids: Vec<Entity> = (0..4).map(|_| source.create_entity()).collect();
        for (i, &e) in ids.iter().enumerate() {
            source.add_component(e, Transform::at(Vec2::new(i as f64, 0.0)));
        }
        source.tag_entity(ids[3], "last");
        source.update();
        source.kill_entity(ids[0]);
        source.kill_entity(ids[2]);
        source.update();
        let snapshot = RegistrySnapshot::capture(&source, &codecs()).unwrap();

        let mut fresh = Registry::new();
        snapshot.restore(&mut fresh, &codecs()).unwrap();
        assert_eq!(
            RegistrySnapshot::state_hash(&fresh, &codecs()).unwrap(),
            snapshot.hash
        );

        // Free list hands out 2 before 0, so IDs come back in another order.
        let mut reused = Registry::new();
        let old: Vec<Entity> = (0..3).map(|_| reused.create_entity()).collect();
        reused.update();
        reused.kill_entity(old[2]);
        reused.update();
        reused.kill_entity(old[0]);
        reused.update();
        let mapping = snapshot.restore(&mut reused, &codecs()).unwrap();
        assert_eq!(mapping[&ids[1]], old[2]);
        assert_eq!(
            RegistrySnapshot::state_hash(&reused, &codecs()).unwrap(),
            snapshot.hash
        );
    }

    #[test]
    fn failed_decode_leaves_the_target_untouched() {
        let mut registry = Registry::new();
        let e = registry.create_entity();
        registry.add_component(e, Health::default());
        registry.update();
        let snapshot = RegistrySnapshot::capture(&registry, &codecs()).unwrap();

        // "health" decoded as a Transform cannot parse.
        let mut mismatched = ComponentCodecs::new();
        mismatched.register::<Transform>("health");

        let mut target = Registry::new();
        let survivor = target.create_entity();
        target.add_component(survivor, Transform::at(Vec2::new(7.0, 8.0)));
        target.tag_entity(survivor, "keeper");
        target.update();

        let err = snapshot.restore(&mut target, &mismatched).unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::Deserialize { ref component, .. } if component == "health"
        ));
        assert_eq!(target.entity_count(), 1);
        assert!(target.is_active(survivor));
        assert!(!target.is_pending_add(survivor));
        assert_eq!(target.entity_by_tag("keeper"), Some(survivor));
        assert_eq!(
            target.get_component::<Transform>(survivor).position,
            Vec2::new(7.0, 8.0)
        );
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn duplicate_codec_name_panics() {
        let mut codecs = codecs();
        codecs.register::<Health>("health");
    }
}
