//! Synchronous fan-out of state snapshots to independent listeners.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use crate::theme::ThemeState;

type Listener = Rc<dyn Fn(&ThemeState)>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: HashMap<u64, Listener>,
}

/// Listener set shared between the store and outstanding [`Subscription`]s.
#[derive(Clone, Default)]
pub struct NotificationBus {
    registry: Rc<RefCell<Registry>>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ThemeState) + 'static,
    {
        let mut registry = self.registry.borrow_mut();
        registry.next_id += 1;
        let id = registry.next_id;
        registry.listeners.insert(id, Rc::new(listener));
        tracing::debug!(id, "theme listener subscribed");

        Subscription {
            id,
            registry: Rc::downgrade(&self.registry),
            detached: false,
        }
    }

    pub fn len(&self) -> usize {
        self.registry.borrow().listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `snapshot` to one subscription only, with the same panic isolation as [`notify`](Self::notify).
    pub fn deliver(&self, subscription: &Subscription, snapshot: &ThemeState) -> bool {
        let listener = self
            .registry
            .borrow()
            .listeners
            .get(&subscription.id)
            .map(Rc::clone);
        let Some(listener) = listener else {
            return false;
        };
        invoke(subscription.id, &listener, snapshot)
    }

    /// Deliver `snapshot` to every listener. A panicking listener is logged and
    /// skipped; the rest still run. Returns how many listeners completed.
    pub fn notify(&self, snapshot: &ThemeState) -> usize {
        // Listeners may subscribe or unsubscribe while being called.
        let listeners: Vec<(u64, Listener)> = self
            .registry
            .borrow()
            .listeners
            .iter()
            .map(|(id, listener)| (*id, Rc::clone(listener)))
            .collect();

        listeners
            .iter()
            .map(|(id, listener)| invoke(*id, listener, snapshot))
            .filter(|delivered| *delivered)
            .count()
    }
}

impl std::fmt::Debug for NotificationBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationBus")
            .field("listeners", &self.len())
            .finish()
    }
}

/// Handle returned by `subscribe`. Dropping it unsubscribes unless
/// [`Subscription::detach`] was called.
#[must_use = "dropping a Subscription unsubscribes the listener"]
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Weak<RefCell<Registry>>,
    detached: bool,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn unsubscribe(mut self) {
        self.remove();
    }

    /// Keep the listener registered for the lifetime of the bus.
    pub fn detach(mut self) {
        self.detached = true;
    }

    fn remove(&mut self) {
        if self.detached {
            return;
        }
        self.detached = true;
        if let Some(registry) = self.registry.upgrade() {
            if registry.borrow_mut().listeners.remove(&self.id).is_some() {
                tracing::debug!(id = self.id, "theme listener unsubscribed");
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.remove();
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("next_id", &self.next_id)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

fn invoke(id: u64, listener: &Listener, snapshot: &ThemeState) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(|| listener(snapshot))) {
        Ok(()) => true,
        Err(payload) => {
            tracing::error!(id, reason = panic_reason(&*payload), "theme listener panicked");
            false
        }
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn notify_reaches_every_listener_once() {
        let bus = NotificationBus::new();
        let first = Rc::new(Cell::new(0));
        let second = Rc::new(Cell::new(0));
        let _a = bus.subscribe({
            let first = Rc::clone(&first);
            move |_| first.set(first.get() + 1)
        });
        let _b = bus.subscribe({
            let second = Rc::clone(&second);
            move |_| second.set(second.get() + 1)
        });

        assert_eq!(bus.notify(&ThemeState::default()), 2);
        assert_eq!(first.get(), 1);
        assert_eq!(second.get(), 1);
    }

    #[test]
    fn panicking_listener_does_not_block_others() {
        let bus = NotificationBus::new();
        let reached = Rc::new(Cell::new(false));
        let _bad = bus.subscribe(|_| panic!("listener exploded"));
        let _good = bus.subscribe({
            let reached = Rc::clone(&reached);
            move |_| reached.set(true)
        });

        let delivered = bus.notify(&ThemeState::default());
        assert_eq!(delivered, 1);
        assert!(reached.get());
        assert_eq!(bus.len(), 2);
    }

    #[test]
    fn unsubscribe_and_drop_remove_listeners() {
        let bus = NotificationBus::new();
        let calls = Rc::new(Cell::new(0));
        let explicit = bus.subscribe({
            let calls = Rc::clone(&calls);
            move |_| calls.set(calls.get() + 1)
        });
        {
            let _scoped = bus.subscribe({
                let calls = Rc::clone(&calls);
                move |_| calls.set(calls.get() + 1)
            });
            assert_eq!(bus.len(), 2);
        }
        assert_eq!(bus.len(), 1);

        explicit.unsubscribe();
        assert!(bus.is_empty());
        bus.notify(&ThemeState::default());
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn deliver_targets_a_single_subscription() {
        let bus = NotificationBus::new();
        let first = Rc::new(Cell::new(0));
        let second = Rc::new(Cell::new(0));
        let target = bus.subscribe({
            let first = Rc::clone(&first);
            move |_| first.set(first.get() + 1)
        });
        let _other = bus.subscribe({
            let second = Rc::clone(&second);
            move |_| second.set(second.get() + 1)
        });

        assert!(bus.deliver(&target, &ThemeState::default()));
        assert_eq!((first.get(), second.get()), (1, 0));
    }

    #[test]
    fn detached_subscription_outlives_handle() {
        let bus = NotificationBus::new();
        bus.subscribe(|_| {}).detach();
        assert_eq!(bus.len(), 1);
    }

    #[test]
    fn listener_may_unsubscribe_itself_during_delivery() {
        let bus = NotificationBus::new();
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let subscription = bus.subscribe({
            let slot = Rc::clone(&slot);
            move |_| {
                if let Some(subscription) = slot.borrow_mut().take() {
                    subscription.unsubscribe();
                }
            }
        });
        *slot.borrow_mut() = Some(subscription);

        assert_eq!(bus.notify(&ThemeState::default()), 1);
        assert!(bus.is_empty());
    }

    #[test]
    fn subscription_outliving_bus_is_harmless() {
        let bus = NotificationBus::new();
        let subscription = bus.subscribe(|_| {});
        drop(bus);
        subscription.unsubscribe();
    }
}
