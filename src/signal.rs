//! Typed, synchronous event emitters.
//!
//! A [`Signal`] delivers a payload to its listeners in registration order.
//! Listeners get mutable access to the [`SceneTree`] so they can act on the
//! nodes they are told about, and may fail: the first error stops delivery
//! and is handed back to whoever emitted the signal.

use tracing::trace;

use crate::error::SceneError;
use crate::tree::SceneTree;

/// Handle returned by [`Signal::connect`], used to disconnect later.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<T> = Box<dyn FnMut(&mut SceneTree, &T) -> Result<(), SceneError>>;

/// A named event with any number of listeners.
pub struct Signal<T> {
    name: &'static str,
    next_id: u64,
    listeners: Vec<(ListenerId, Listener<T>)>,
}

impl<T> Signal<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            next_id: 0,
            listeners: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Register a listener. It runs after every listener registered before it.
    pub fn connect<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&mut SceneTree, &T) -> Result<(), SceneError> + 'static,
    {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if it was not connected.
    pub fn disconnect(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener, _)| *listener != id);
        self.listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Deliver `value` to every listener, stopping at the first error.
    pub fn emit(&mut self, tree: &mut SceneTree, value: &T) -> Result<(), SceneError> {
        trace!(signal = self.name, listeners = self.listeners.len(), "emit");
        for (_, listener) in &mut self.listeners {
            listener(tree, value)?;
        }
        Ok(())
    }
}

impl<T> std::fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("name", &self.name)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
