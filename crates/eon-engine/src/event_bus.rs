//! Typed publish/subscribe bus for cross-system notifications.
//!
//! Handlers are keyed by event type. Emitting an event calls every handler
//! subscribed to that type, in subscription order, with the event and a
//! mutable borrow of the [`Registry`]. Events usually carry [`Entity`]
//! values; handlers that kill entities only queue the kill, so emitting from
//! inside a system's member loop is safe.
//!
//! [`Entity`]: eon_ecs::entity::Entity

use std::any::{Any, TypeId};
use std::collections::HashMap;

use eon_ecs::registry::Registry;

/// Boxed event handler.
pub type Handler<E> = Box<dyn FnMut(&E, &mut Registry)>;

struct HandlerList<E> {
    handlers: Vec<Handler<E>>,
}

/// Event bus dispatching by event type.
#[derive(Default)]
pub struct EventBus {
    /// `TypeId::of::<E>()` -> `HandlerList<E>`.
    subscribers: HashMap<TypeId, Box<dyn Any>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `handler` for every future `E` emitted on this bus.
    pub fn subscribe<E: 'static>(&mut self, handler: impl FnMut(&E, &mut Registry) + 'static) {
        self.subscribers
            .entry(TypeId::of::<E>())
            .or_insert_with(|| {
                Box::new(HandlerList::<E> {
                    handlers: Vec::new(),
                })
            })
            .downcast_mut::<HandlerList<E>>()
            .expect("handler list type matches its event type id")
            .handlers
            .push(Box::new(handler));
        tracing::trace!(event = std::any::type_name::<E>(), "event handler subscribed");
    }

    /// Deliver `event` to every `E` handler. Returns how many handlers ran.
    pub fn emit<E: 'static>(&mut self, event: E, registry: &mut Registry) -> usize {
        let Some(list) = self
            .subscribers
            .get_mut(&TypeId::of::<E>())
            .and_then(|list| list.downcast_mut::<HandlerList<E>>())
        else {
            tracing::trace!(
                event = std::any::type_name::<E>(),
                "event emitted with no subscribers"
            );
            return 0;
        };
        for handler in &mut list.handlers {
            handler(&event, registry);
        }
        list.handlers.len()
    }

    /// Number of handlers subscribed to `E`.
    pub fn subscriber_count<E: 'static>(&self) -> usize {
        self.subscribers
            .get(&TypeId::of::<E>())
            .and_then(|list| list.downcast_ref::<HandlerList<E>>())
            .map_or(0, |list| list.handlers.len())
    }

    /// Drop every subscription.
    pub fn reset(&mut self) {
        self.subscribers.clear();
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("event_types", &self.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eon_ecs::entity::Entity;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Ping(u32);
    struct Pong;

    #[test]
    fn handlers_run_in_subscription_order() {
        let mut bus = EventBus::new();
        let mut registry = Registry::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        for label in ["first", "second"] {
            let log = Rc::clone(&log);
            bus.subscribe::<Ping>(move |ping, _| log.borrow_mut().push((label, ping.0)));
        }

        assert_eq!(bus.emit(Ping(7), &mut registry), 2);
        assert_eq!(*log.borrow(), vec![("first", 7), ("second", 7)]);
        assert_eq!(bus.emit(Pong, &mut registry), 0);
    }

    #[test]
    fn handlers_can_touch_the_registry() {
        let mut bus = EventBus::new();
        let mut registry = Registry::new();
        let e = registry.create_entity();
        registry.update();

        bus.subscribe::<Entity>(|target, registry| registry.kill_entity(*target));
        bus.emit(e, &mut registry);
        assert!(registry.is_pending_kill(e));
    }

    #[test]
    fn reset_drops_subscriptions() {
        let mut bus = EventBus::new();
        bus.subscribe::<Ping>(|_, _| {});
        assert_eq!(bus.subscriber_count::<Ping>(), 1);
        bus.reset();
        assert_eq!(bus.subscriber_count::<Ping>(), 0);
    }
}
