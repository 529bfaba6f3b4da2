//! Observer registry with explicit registration tokens.

use std::collections::BTreeMap;

/// Handle returned by [`Listeners::register`]. Pass it back to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerToken(u64);

/// Boxed listener callback.
pub type Listener<T> = Box<dyn FnMut(&T) + Send>;

/// Set of callbacks notified in registration order.
pub struct Listeners<T> {
    next: u64,
    entries: BTreeMap<ListenerToken, Listener<T>>,
}

impl<T> Default for Listeners<T> {
    fn default() -> Self {
        Self { next: 0, entries: BTreeMap::new() }
    }
}

impl<T> std::fmt::Debug for Listeners<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners").field("len", &self.entries.len()).finish()
    }
}

impl<T> Listeners<T> {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback.
    pub fn register(&mut self, listener: impl FnMut(&T) + Send + 'static) -> ListenerToken {
        let token = ListenerToken(self.next);
        self.next += 1;
        self.entries.insert(token, Box::new(listener));
        token
    }

    /// Remove a callback. Returns false if the token was already removed.
    pub fn unregister(&mut self, token: ListenerToken) -> bool {
        self.entries.remove(&token).is_some()
    }

    /// Call `token`'s listener only. Used to replay current state to a late
    /// subscriber.
    pub fn notify_one(&mut self, token: ListenerToken, value: &T) {
        if let Some(listener) = self.entries.get_mut(&token) {
            listener(value);
        }
    }

    /// Call every listener.
    pub fn notify(&mut self, value: &T) {
        for listener in self.entries.values_mut() {
            listener(value);
        }
    }

    /// Registered listeners.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// No listeners registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every listener.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn notify_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut listeners = Listeners::new();

        for tag in ["a", "b"] {
            let seen = Arc::clone(&seen);
            listeners.register(move |v: &u32| seen.lock().unwrap().push(format!("{tag}{v}")));
        }

        listeners.notify(&1);
        assert_eq!(*seen.lock().unwrap(), vec!["a1", "b1"]);
    }

    #[test]
    fn unregister_stops_delivery() {
        let count = Arc::new(Mutex::new(0));
        let mut listeners = Listeners::new();
        let token = {
            let count = Arc::clone(&count);
            listeners.register(move |_: &()| *count.lock().unwrap() += 1)
        };

        listeners.notify(&());
        assert!(listeners.unregister(token));
        assert!(!listeners.unregister(token));
        listeners.notify(&());

        assert_eq!(*count.lock().unwrap(), 1);
        assert!(listeners.is_empty());
    }

    #[test]
    fn notify_one_targets_single_listener() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut listeners = Listeners::new();
        let first = {
            let seen = Arc::clone(&seen);
            listeners.register(move |v: &u8| seen.lock().unwrap().push(*v))
        };
        listeners.register(|_: &u8| {});

        listeners.notify_one(first, &9);
        assert_eq!(*seen.lock().unwrap(), vec![9]);
        assert_eq!(listeners.len(), 2);
    }
}
