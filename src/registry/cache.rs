//! Resource state cache
//!
//! A read-through cache in front of model loading: states are parsed from
//! model files on first use and served from memory afterwards. States are
//! immutable once registered, so the cache hands out clones.

use crate::hypermedia::ResourceState;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Shared cache of loaded resource states, keyed by registered state name.
#[derive(Debug, Default)]
pub struct StateCache {
    states: RwLock<HashMap<String, ResourceState>>,
}

impl StateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cached state by name.
    pub fn get(&self, name: &str) -> Option<ResourceState> {
        let states = self.states.read().unwrap_or_else(PoisonError::into_inner);
        let state = states.get(name).cloned();
        if state.is_some() {
            tracing::debug!("Cache hit for state {}", name);
        }
        state
    }

    pub fn contains(&self, name: &str) -> bool {
        self.states
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    pub fn insert(&self, name: impl Into<String>, state: ResourceState) {
        self.states
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), state);
    }

    /// Store every state loaded from one model file. Loading a file brings
    /// in all of its states at once, so later lookups for siblings hit.
    pub fn insert_all(&self, states: impl IntoIterator<Item = (String, ResourceState)>) {
        let mut guard = self.states.write().unwrap_or_else(PoisonError::into_inner);
        for (name, state) in states {
            guard.insert(name, state);
        }
    }

    /// Evict one state, returning it if it was cached.
    pub fn remove(&self, name: &str) -> Option<ResourceState> {
        self.states
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
    }

    pub fn len(&self) -> usize {
        self.states
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
