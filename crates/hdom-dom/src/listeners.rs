//! Event listener registry
//!
//! Maps a target and an event type to listeners in registration order.
//! The listener payload is left to the caller (a function handle in the
//! script host, a plain label in tests).

use std::collections::HashMap;

use crate::events::Target;

#[derive(Debug)]
pub struct ListenerTable<L> {
    listeners: HashMap<Target, HashMap<String, Vec<L>>>,
}

impl<L> Default for ListenerTable<L> {
    fn default() -> Self {
        Self {
            listeners: HashMap::new(),
        }
    }
}

impl<L: Clone + PartialEq> ListenerTable<L> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. Registering the same listener twice calls it twice.
    pub fn add(&mut self, target: Target, event_type: &str, listener: L) {
        self.listeners
            .entry(target)
            .or_default()
            .entry(event_type.to_string())
            .or_default()
            .push(listener);
    }

    /// Remove the first registration equal to `listener`
    pub fn remove(&mut self, target: Target, event_type: &str, listener: &L) -> Option<L> {
        let list = self.listeners.get_mut(&target)?.get_mut(event_type)?;
        let at = list.iter().position(|l| l == listener)?;
        Some(list.remove(at))
    }

    /// Snapshot of the listeners for a target and type
    pub fn listeners(&self, target: Target, event_type: &str) -> Vec<L> {
        self.listeners
            .get(&target)
            .and_then(|m| m.get(event_type))
            .cloned()
            .unwrap_or_default()
    }

    pub fn has_listeners(&self, target: Target, event_type: &str) -> bool {
        self.listeners
            .get(&target)
            .and_then(|m| m.get(event_type))
            .is_some_and(|l| !l.is_empty())
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }
}
