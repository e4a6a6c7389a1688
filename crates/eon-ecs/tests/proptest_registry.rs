//! Property tests for the registry.
//!
//! Random sequences of lifecycle and component operations are applied to a
//! registry alongside a simple model; after every flush the registry must
//! agree with the model and its own internal laws.

use std::collections::BTreeSet;

use eon_ecs::prelude::*;
use proptest::prelude::*;

#[derive(Debug, Clone, PartialEq)]
struct Pos(i32);

#[derive(Debug, Clone, PartialEq)]
struct Vel(i32);

struct Movers;

impl System for Movers {
    fn require(&self, requirements: &mut Requirements<'_>) {
        requirements.require::<Pos>().require::<Vel>();
    }
}

struct Placed;

impl System for Placed {
    fn require(&self, requirements: &mut Requirements<'_>) {
        requirements.require::<Pos>();
    }
}

#[derive(Debug, Clone)]
enum Op {
    Create,
    Kill(usize),
    AddPos(usize, i32),
    AddVel(usize, i32),
    RemovePos(usize),
    RemoveVel(usize),
    Flush,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Create),
        1 => (0..64usize).prop_map(Op::Kill),
        2 => (0..64usize, any::<i32>()).prop_map(|(i, v)| Op::AddPos(i, v)),
        2 => (0..64usize, any::<i32>()).prop_map(|(i, v)| Op::AddVel(i, v)),
        1 => (0..64usize).prop_map(Op::RemovePos),
        1 => (0..64usize).prop_map(Op::RemoveVel),
        1 => Just(Op::Flush),
    ]
}

/// Pick an active entity by index, if there is any.
fn pick(registry: &Registry, i: usize) -> Option<Entity> {
    let count = registry.entity_count();
    if count == 0 {
        return None;
    }
    registry.entities().iter().nth(i % count).copied()
}

fn check_matching_law(registry: &Registry) -> Result<(), TestCaseError> {
    for state in registry.systems() {
        let members: BTreeSet<Entity> = state.entities().iter().copied().collect();
        prop_assert_eq!(members.len(), state.entities().len(), "duplicate member");
        for &e in registry.entities() {
            let matches = registry.entity_signature(e).contains_all(state.signature());
            prop_assert_eq!(members.contains(&e), matches, "{} / {}", state.name(), e);
        }
        for e in &members {
            prop_assert!(registry.is_active(*e));
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn registry_agrees_with_model(ops in prop::collection::vec(op_strategy(), 1..120)) {
        let mut registry = Registry::new();
        registry.add_system(Movers);
        registry.add_system(Placed);

        let mut killed: BTreeSet<Entity> = BTreeSet::new();

        for op in ops {
            match op {
                Op::Create => {
                    let e = registry.create_entity();
                    prop_assert!(!registry.has_component::<Pos>(e));
                    prop_assert!(!registry.has_component::<Vel>(e));
                }
                Op::Kill(i) => {
                    if let Some(e) = pick(&registry, i) {
                        registry.kill_entity(e);
                        killed.insert(e);
                    }
                }
                Op::AddPos(i, v) => {
                    if let Some(e) = pick(&registry, i) {
                        registry.add_component(e, Pos(v));
                        prop_assert_eq!(registry.get_component::<Pos>(e), &Pos(v));
                    }
                }
                Op::AddVel(i, v) => {
                    if let Some(e) = pick(&registry, i) {
                        registry.add_component(e, Vel(v));
                    }
                }
                Op::RemovePos(i) => {
                    if let Some(e) = pick(&registry, i) {
                        let had = registry.has_component::<Pos>(e);
                        prop_assert_eq!(registry.remove_component::<Pos>(e).is_some(), had);
                    }
                }
                Op::RemoveVel(i) => {
                    if let Some(e) = pick(&registry, i) {
                        let had = registry.has_component::<Vel>(e);
                        prop_assert_eq!(registry.remove_component::<Vel>(e).is_some(), had);
                    }
                }
                Op::Flush => {
                    registry.update();
                    for e in std::mem::take(&mut killed) {
                        prop_assert!(!registry.is_active(e));
                    }
                    check_matching_law(&registry)?;
                }
            }

            // has/get agreement and pool sizes track signatures.
            let mut with_pos = 0;
            for &e in registry.entities() {
                let has = registry.has_component::<Pos>(e);
                prop_assert_eq!(has, registry.try_get_component::<Pos>(e).is_ok());
                with_pos += usize::from(has);
            }
            prop_assert_eq!(registry.pool_len::<Pos>(), with_pos);
        }

        registry.update();
        check_matching_law(&registry)?;
    }

    #[test]
    fn pool_stays_dense(
        inserts in prop::collection::btree_set(0..200u32, 1..60),
        removal_picks in prop::collection::vec(any::<prop::sample::Index>(), 0..60),
    ) {
        let mut pool = Pool::new();
        let mut live: Vec<Entity> = inserts.iter().map(|&id| Entity::from_id(id)).collect();
        for &e in &live {
            pool.set(e, e.id());
        }

        for pick in removal_picks {
            if live.is_empty() {
                break;
            }
            let e = live.remove(pick.index(live.len()));
            prop_assert_eq!(pool.remove(e), e.id());
        }

        prop_assert_eq!(pool.len(), live.len());
        for &e in &live {
            prop_assert_eq!(*pool.get(e), e.id());
        }
        let mut dense: Vec<Entity> = pool.entities().to_vec();
        dense.sort();
        live.sort();
        prop_assert_eq!(dense, live);
    }

    #[test]
    fn fresh_ids_only_when_no_id_is_free(
        rounds in prop::collection::vec((1..10usize, 0..10usize), 1..20),
    ) {
        let mut registry = Registry::new();
        let mut peak = 0;
        let mut highest: Option<u32> = None;
        for (creates, kills) in rounds {
            for _ in 0..creates {
                let e = registry.create_entity();
                highest = highest.max(Some(e.id()));
            }
            peak = peak.max(registry.entity_count());
            let victims: Vec<Entity> = registry.entities().iter().take(kills).copied().collect();
            for e in victims {
                registry.kill_entity(e);
            }
            registry.update();
        }
        // IDs never exceed the largest number of simultaneously active entities.
        prop_assert_eq!(highest.map(|id| id as usize + 1), Some(peak));
    }
}
