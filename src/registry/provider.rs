//! Model-file backed state provider
//!
//! Resolves registered states by name and routes `method + path` requests
//! to the state bound there. Bindings come from the model files handed to
//! the provider; the states themselves live in a shared [`StateCache`] that
//! is refilled from disk when a machine has been unloaded.

use super::cache::StateCache;
use super::model::MachineModel;
use super::path_tree::PathTree;
use super::ResourceStateProvider;
use crate::hypermedia::ResourceState;
use crate::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

pub struct ModelResourceStateProvider {
    files: Vec<PathBuf>,
    cache: StateCache,
    /// Registered name (`machine.state`) to the file it came from.
    file_of_state: BTreeMap<String, usize>,
    path_tree: PathTree,
    states_by_path: BTreeMap<String, BTreeSet<String>>,
}

impl ModelResourceStateProvider {
    /// Load every model file, register its bindings and warm the cache.
    pub fn new(files: impl IntoIterator<Item = PathBuf>) -> Result<Self> {
        let mut provider = Self {
            files: files.into_iter().collect(),
            cache: StateCache::new(),
            file_of_state: BTreeMap::new(),
            path_tree: PathTree::new(),
            states_by_path: BTreeMap::new(),
        };
        let mut bound = BTreeSet::new();
        for index in 0..provider.files.len() {
            let loaded = MachineModel::load(&provider.files[index])?;
            for state in loaded.machine.registered_states() {
                let name = format!("{}.{}", loaded.name, state.name);
                if provider.file_of_state.insert(name.clone(), index).is_some() {
                    tracing::error!("Overwriting previously registered state {name}");
                }
                provider.cache.insert(name, state.clone());
            }
            for binding in &loaded.bindings {
                let name = format!("{}.{}", loaded.name, binding.state_name);
                for method in &binding.methods {
                    if !bound.insert((method.clone(), binding.path.clone())) {
                        tracing::error!(
                            "Overwriting binding for {method} {path}",
                            path = binding.path
                        );
                    }
                    provider.path_tree.put(&binding.path, method, &name);
                }
                provider
                    .states_by_path
                    .entry(binding.path.clone())
                    .or_default()
                    .insert(name);
            }
        }
        tracing::debug!(
            "Registered {} states from {} model files",
            provider.file_of_state.len(),
            provider.files.len()
        );
        Ok(provider)
    }

    /// Whether the named state is currently cached.
    pub fn is_loaded(&self, name: &str) -> bool {
        self.cache.contains(name)
    }

    /// Evict one state from the cache. The next lookup re-reads its file.
    pub fn unload(&self, name: &str) {
        self.cache.remove(name);
    }

    /// Re-read the named state's model file into the cache.
    fn reload_for(&self, name: &str) -> Result<()> {
        let Some(&index) = self.file_of_state.get(name) else {
            return Ok(());
        };
        let loaded = MachineModel::load(&self.files[index])?;
        self.cache.insert_all(
            loaded
                .machine
                .registered_states()
                .into_iter()
                .map(|state| (format!("{}.{}", loaded.name, state.name), state.clone())),
        );
        Ok(())
    }
}

impl ResourceStateProvider for ModelResourceStateProvider {
    fn resource_state(&self, name: &str) -> Result<Option<ResourceState>> {
        if let Some(state) = self.cache.get(name) {
            return Ok(Some(state));
        }
        if !self.file_of_state.contains_key(name) {
            tracing::error!("Unable to find resource state {name}");
            return Ok(None);
        }
        self.reload_for(name)?;
        Ok(self.cache.get(name))
    }

    fn determine_state(&self, method: &str, path: &str) -> Result<Option<ResourceState>> {
        let Some(bindings) = self.path_tree.get(path) else {
            tracing::debug!("No state bound to path {path}");
            return Ok(None);
        };
        match bindings.get(method) {
            Some(name) => {
                let name = name.clone();
                match self.resource_state(&name)? {
                    Some(state) => Ok(Some(state)),
                    None => Err(Error::registry(format!(
                        "State {name} is bound to {method} {path} but is no longer registered"
                    ))),
                }
            }
            None => Err(Error::MethodNotAllowed {
                allowed: bindings.keys().cloned().collect(),
            }),
        }
    }

    fn states_by_path(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.states_by_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOTES_MODEL: &str = r#"
[machine]
name = "notes"
entity = "NOTE"

[[states]]
name = "initial"
kind = "collection"
path = "/notes"
methods = ["GET"]

[[states.transitions]]
method = "GET"
target = "item"
for_each = true
uri_parameters = { noteId = "{noteId}" }

[[states]]
name = "item"
path = "/notes/{noteId}"
methods = ["GET", "PUT", "DELETE"]

[[states.transitions]]
method = "DELETE"
target = "deleted"

[[states]]
name = "deleted"
kind = "final"
parent = "item"
"#;

    fn write_model(dir: &std::path::Path) -> PathBuf {
        let file = dir.join("notes.toml");
        std::fs::write(&file, NOTES_MODEL).unwrap();
        file
    }

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("hyperstate-provider-{tag}"));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_resource_state_by_name() {
        let dir = temp_dir("by-name");
        let provider = ModelResourceStateProvider::new([write_model(&dir)]).unwrap();

        let state = provider.resource_state("notes.item").unwrap().unwrap();
        assert_eq!(state.id(), "NOTE.item");
        assert!(provider.resource_state("notes.nope").unwrap().is_none());
    }

    #[test]
    fn test_determine_state_matches_templates() {
        let dir = temp_dir("routing");
        let provider = ModelResourceStateProvider::new([write_model(&dir)]).unwrap();

        let listing = provider.determine_state("GET", "/notes").unwrap().unwrap();
        assert_eq!(listing.id(), "NOTE.initial");

        let item = provider.determine_state("PUT", "/notes/7").unwrap().unwrap();
        assert_eq!(item.id(), "NOTE.item");

        assert!(provider.determine_state("GET", "/unknown").unwrap().is_none());
    }

    #[test]
    fn test_unbound_method_reports_allowed() {
        let dir = temp_dir("allowed");
        let provider = ModelResourceStateProvider::new([write_model(&dir)]).unwrap();

        let err = provider.determine_state("POST", "/notes/7").unwrap_err();
        assert!(err.is_method_not_allowed());
        let Error::MethodNotAllowed { allowed } = err else {
            panic!("expected MethodNotAllowed");
        };
        assert_eq!(allowed, vec!["DELETE", "GET", "PUT"]);
    }

    #[test]
    fn test_unload_then_reload_from_file() {
        let dir = temp_dir("reload");
        let provider = ModelResourceStateProvider::new([write_model(&dir)]).unwrap();

        assert!(provider.is_loaded("notes.initial"));
        provider.unload("notes.initial");
        assert!(!provider.is_loaded("notes.initial"));

        let state = provider.resource_state("notes.initial").unwrap().unwrap();
        assert!(state.is_collection());
        assert!(provider.is_loaded("notes.initial"));
    }

    #[test]
    fn test_states_by_path_groups_bound_states() {
        let dir = temp_dir("paths");
        let provider = ModelResourceStateProvider::new([write_model(&dir)]).unwrap();

        let by_path = provider.states_by_path();
        assert!(by_path["/notes"].contains("notes.initial"));
        assert!(by_path["/notes/{noteId}"].contains("notes.item"));
    }
}
