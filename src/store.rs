//! Reducer-driven state container.
//!
//! A [`Store`] owns one state value and replaces it by folding actions
//! through a pure reducer. Every change is broadcast as a full snapshot so
//! observers never see a half-applied update.

use std::sync::{PoisonError, RwLock};

use tokio::sync::broadcast;

/// Pure state transition function.
pub type Reducer<S, A> = fn(&S, A) -> S;

/// Thread-safe state container parameterized by its reducer.
pub struct Store<S, A> {
    state: RwLock<S>,
    reducer: Reducer<S, A>,
    /// Broadcast sender for state snapshots.
    sender: broadcast::Sender<S>,
}

impl<S, A> Store<S, A>
where
    S: Clone + PartialEq + Send + 'static,
{
    pub fn new(initial: S, reducer: Reducer<S, A>) -> Self {
        let (sender, _) = broadcast::channel(16);
        Self {
            state: RwLock::new(initial),
            reducer,
            sender,
        }
    }

    /// Snapshot of the current state.
    pub fn get(&self) -> S {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Read a projection of the state without cloning all of it.
    pub fn read<T>(&self, f: impl FnOnce(&S) -> T) -> T {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    /// Apply an action.
    ///
    /// Returns `true` when the state changed; subscribers are only notified
    /// in that case.
    pub fn dispatch(&self, action: A) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let next = (self.reducer)(&state, action);
        if next == *state {
            return false;
        }
        *state = next.clone();
        drop(state);

        // No receivers is fine.
        let _ = self.sender.send(next);
        true
    }

    /// Subscribe to state snapshots.
    pub fn subscribe(&self) -> broadcast::Receiver<S> {
        self.sender.subscribe()
    }
}
