//! State registry
//!
//! The registry side of the crate: declarative TOML models that describe
//! resource-state machines, a method/path tree that routes requests to the
//! state bound there, and a cache that keeps built states warm across
//! lookups.

mod cache;
mod model;
mod path_tree;
mod provider;

pub use cache::StateCache;
pub use model::{
    ActionModel, ActionTypeModel, Binding, LoadedModel, LocatorModel, MachineInfo, MachineModel,
    StateKindModel, StateModel, TransitionModel,
};
pub use path_tree::PathTree;
pub use provider::ModelResourceStateProvider;

use crate::hypermedia::ResourceState;
use crate::Result;
use std::collections::{BTreeMap, BTreeSet};

/// Lookup seam between the registry and anything answering requests.
pub trait ResourceStateProvider {
    /// State registered under `machine.state`, if any.
    fn resource_state(&self, name: &str) -> Result<Option<ResourceState>>;

    /// State bound to `method` at `path`. Returns
    /// [`crate::Error::MethodNotAllowed`] when the path is registered but
    /// the method is not bound there.
    fn determine_state(&self, method: &str, path: &str) -> Result<Option<ResourceState>>;

    /// Registered state names grouped by bound path.
    fn states_by_path(&self) -> &BTreeMap<String, BTreeSet<String>>;
}
