//! Declarative machine models
//!
//! Resource-state graphs are described in TOML model files: one `[machine]`
//! table naming the graph plus one `[[states]]` entry per state, each
//! carrying its transitions and the methods the registry binds at its path.
//! [`MachineModel::build`] turns a parsed model into a live
//! [`ResourceStateMachine`] and the registry bindings for its states.

use crate::hypermedia::{
    Action, ActionKind, DynamicLocator, ResourceState, ResourceStateMachine, StateId, Transition,
};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};

/// A parsed model file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineModel {
    pub machine: MachineInfo,
    #[serde(default)]
    pub states: Vec<StateModel>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineInfo {
    pub name: String,
    /// Default entity for states that do not declare one.
    #[serde(default)]
    pub entity: Option<String>,
    /// Name of the initial state. Defaults to the first `[[states]]` entry.
    #[serde(default)]
    pub initial: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateModel {
    pub name: String,
    #[serde(default)]
    pub entity: Option<String>,
    #[serde(default)]
    pub kind: StateKindModel,
    /// Own path. Relative to `parent` when one is set; required for plain
    /// and collection states, absent for final and dynamic ones.
    #[serde(default)]
    pub path: Option<String>,
    /// Final states inherit this state's path; plain states with a
    /// relative path append to it.
    #[serde(default)]
    pub parent: Option<String>,
    /// Methods the registry binds at this state's path.
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default)]
    pub rels: Vec<String>,
    #[serde(default)]
    pub actions: Vec<ActionModel>,
    #[serde(default)]
    pub locator: Option<LocatorModel>,
    #[serde(default)]
    pub transitions: Vec<TransitionModel>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateKindModel {
    #[default]
    Plain,
    Collection,
    Final,
    Dynamic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionModel {
    pub name: String,
    #[serde(rename = "type", default)]
    pub action_type: ActionTypeModel,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionTypeModel {
    #[default]
    Entry,
    View,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocatorModel {
    pub name: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionModel {
    /// Absent for auto transitions.
    #[serde(default)]
    pub method: Option<String>,
    /// Name of the target state within this model.
    pub target: String,
    #[serde(default)]
    pub uri_parameters: BTreeMap<String, String>,
    #[serde(default)]
    pub target_field: Option<String>,
    #[serde(default)]
    pub for_each: bool,
    #[serde(default)]
    pub label: Option<String>,
}

/// One registry binding produced from a model: the methods a state answers
/// at its effective path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub state_name: String,
    pub state_id: StateId,
    pub path: String,
    pub methods: Vec<String>,
}

/// A fully built model: the machine plus its registry bindings.
#[derive(Debug)]
pub struct LoadedModel {
    pub name: String,
    pub machine: ResourceStateMachine,
    pub bindings: Vec<Binding>,
}

impl MachineModel {
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let contents = std::fs::read_to_string(&path)?;
        toml::from_str(&contents).map_err(|e| Error::model(&path, e.to_string()))
    }

    /// Parse and build in one step.
    pub fn load(path: impl Into<PathBuf>) -> Result<LoadedModel> {
        let path = path.into();
        let model = Self::from_file(&path)?;
        model.build(&path)
    }

    /// Build the machine and bindings this model describes. `origin` names
    /// the model source in errors.
    pub fn build(&self, origin: &Path) -> Result<LoadedModel> {
        let err = |message: String| Error::model(origin, message);

        if self.states.is_empty() {
            return Err(err(format!("machine {} declares no states", self.machine.name)));
        }
        let mut seen = BTreeSet::new();
        for state in &self.states {
            if !seen.insert(state.name.as_str()) {
                return Err(err(format!("duplicate state name {}", state.name)));
            }
        }

        // First pass: construct states. Parents must be built before their
        // dependents, so blocked entries go back on the queue until the
        // queue stops making progress.
        let mut built: BTreeMap<String, ResourceState> = BTreeMap::new();
        let mut pending: VecDeque<&StateModel> = self.states.iter().collect();
        let mut stalled = 0;
        while let Some(model) = pending.pop_front() {
            match self.build_state(model, &built, origin)? {
                Some(state) => {
                    built.insert(model.name.clone(), state);
                    stalled = 0;
                }
                None => {
                    pending.push_back(model);
                    stalled += 1;
                    if stalled > pending.len() {
                        let names: Vec<&str> = pending.iter().map(|m| m.name.as_str()).collect();
                        return Err(err(format!(
                            "unresolvable parent references among states: {}",
                            names.join(", ")
                        )));
                    }
                }
            }
        }

        // Second pass: attach transitions now that every target exists.
        for model in &self.states {
            for tm in &model.transitions {
                let Some(target) = built.get(&tm.target).cloned() else {
                    return Err(err(format!(
                        "transition from {} targets unknown state {}",
                        model.name, tm.target
                    )));
                };
                let mut transition = match &tm.method {
                    Some(method) => Transition::via(method, &target),
                    None => Transition::auto(&target),
                };
                if !tm.uri_parameters.is_empty() {
                    transition = transition.with_uri_parameters(tm.uri_parameters.clone());
                }
                if let Some(field) = &tm.target_field {
                    transition = transition.with_target_field(field);
                }
                if let Some(label) = &tm.label {
                    transition = transition.with_label(label);
                }
                if tm.for_each {
                    transition = transition.for_each_item();
                }
                if let Some(source) = built.get_mut(&model.name) {
                    source.add_transition(transition);
                }
            }
        }

        let initial_name = self
            .machine
            .initial
            .as_deref()
            .unwrap_or(&self.states[0].name);
        let Some(initial) = built.get(initial_name).cloned() else {
            return Err(err(format!("initial state {} is not defined", initial_name)));
        };

        let mut bindings = Vec::new();
        for model in &self.states {
            if model.methods.is_empty() {
                continue;
            }
            let Some(state) = built.get(&model.name) else {
                continue;
            };
            let Some(path) = state.effective_path() else {
                return Err(err(format!(
                    "state {} binds methods but has no addressable path",
                    model.name
                )));
            };
            bindings.push(Binding {
                state_name: model.name.clone(),
                state_id: state.id(),
                path: path.pattern().to_string(),
                methods: model.methods.clone(),
            });
        }

        let machine = ResourceStateMachine::new(initial, built.into_values())?;
        Ok(LoadedModel {
            name: self.machine.name.clone(),
            machine,
            bindings,
        })
    }

    /// Build one state, or `None` when its parent has not been built yet.
    fn build_state(
        &self,
        model: &StateModel,
        built: &BTreeMap<String, ResourceState>,
        origin: &Path,
    ) -> Result<Option<ResourceState>> {
        let err = |message: String| Error::model(origin, message);

        let parent = match &model.parent {
            Some(name) => match built.get(name) {
                Some(parent) => Some(parent),
                None => {
                    if !self.states.iter().any(|s| &s.name == name) {
                        return Err(err(format!(
                            "state {} names unknown parent {}",
                            model.name, name
                        )));
                    }
                    return Ok(None);
                }
            },
            None => None,
        };
        let entity = model
            .entity
            .clone()
            .or_else(|| self.machine.entity.clone())
            .unwrap_or_default();

        let state = match model.kind {
            StateKindModel::Plain => {
                let Some(path) = &model.path else {
                    return Err(err(format!("state {} needs a path", model.name)));
                };
                match parent {
                    Some(parent) => ResourceState::child(parent, &model.name, path)?,
                    None => ResourceState::new(entity, &model.name, path)?,
                }
            }
            StateKindModel::Collection => {
                let Some(path) = &model.path else {
                    return Err(err(format!("collection state {} needs a path", model.name)));
                };
                if parent.is_some() {
                    return Err(err(format!(
                        "collection state {} cannot declare a parent",
                        model.name
                    )));
                }
                ResourceState::collection(entity, &model.name, path)?
            }
            StateKindModel::Final => {
                if model.path.is_some() {
                    return Err(err(format!(
                        "final state {} inherits its parent's path and cannot declare one",
                        model.name
                    )));
                }
                let Some(parent) = parent else {
                    return Err(err(format!(
                        "final state {} needs a parent to inherit a path from",
                        model.name
                    )));
                };
                ResourceState::pseudo_final(parent, &model.name)
            }
            StateKindModel::Dynamic => {
                let Some(locator) = &model.locator else {
                    return Err(err(format!(
                        "dynamic state {} needs a locator",
                        model.name
                    )));
                };
                ResourceState::dynamic(
                    entity,
                    &model.name,
                    DynamicLocator::new(&locator.name, locator.args.clone()),
                )
            }
        };

        let actions = model
            .actions
            .iter()
            .map(|a| {
                let kind = match a.action_type {
                    ActionTypeModel::Entry => ActionKind::Entry,
                    ActionTypeModel::View => ActionKind::View,
                };
                let mut action = Action::new(&a.name, kind);
                for (key, value) in &a.properties {
                    action = action.with_property(key, value);
                }
                action
            })
            .collect();

        Ok(Some(
            state.with_actions(actions).with_rels(model.rels.clone()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    const NOTES_MODEL: &str = r#"
[machine]
name = "notes"
entity = "NOTE"
initial = "initial"

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
methods = ["GET", "PUT"]

[[states.transitions]]
method = "PUT"
target = "item"

[[states.transitions]]
method = "DELETE"
target = "deleted"

[[states]]
name = "deleted"
kind = "final"
parent = "item"
"#;

    fn build(model: &str) -> Result<LoadedModel> {
        let model: MachineModel = toml::from_str(model).unwrap();
        model.build(Path::new("test.toml"))
    }

    #[test]
    fn test_build_notes_model() {
        let loaded = build(NOTES_MODEL).unwrap();
        assert_eq!(loaded.name, "notes");
        assert_eq!(loaded.machine.initial().id(), "NOTE.initial");
        assert_eq!(loaded.machine.all_states().len(), 3);

        let deleted = loaded.machine.state("NOTE.deleted").unwrap();
        assert!(deleted.is_pseudo_final());
        assert_eq!(
            deleted.effective_path().unwrap().pattern(),
            "/notes/{noteId}"
        );
    }

    #[test]
    fn test_bindings_use_effective_paths() {
        let loaded = build(NOTES_MODEL).unwrap();
        assert_eq!(loaded.bindings.len(), 2);
        assert_eq!(loaded.bindings[0].state_name, "initial");
        assert_eq!(loaded.bindings[0].path, "/notes");
        assert_eq!(loaded.bindings[0].methods, vec!["GET"]);
        assert_eq!(loaded.bindings[1].path, "/notes/{noteId}");
        assert_eq!(loaded.bindings[1].methods, vec!["GET", "PUT"]);
    }

    #[test]
    fn test_parent_declared_after_child_still_builds() {
        let out_of_order = r#"
[machine]
name = "docs"

[[states]]
name = "published"
kind = "final"
parent = "draft"

[[states]]
name = "draft"
path = "/docs/{docId}"
"#;
        // The machine defaults to the first entry, which is pseudo-final;
        // construction still succeeds and both states resolve.
        let loaded = build(out_of_order).unwrap();
        assert!(loaded.machine.state(".published").unwrap().is_pseudo_final());
    }

    #[test]
    fn test_relative_child_path() {
        let model = r#"
[machine]
name = "entity"

[[states]]
name = "root"
path = "/entity"

[[states]]
name = "draft"
parent = "root"
path = "/draft"
"#;
        let loaded = build(model).unwrap();
        let draft = loaded.machine.state(".draft").unwrap();
        assert_eq!(draft.effective_path().unwrap().pattern(), "/entity/draft");
    }

    #[test]
    fn test_unknown_transition_target_fails() {
        let model = r#"
[machine]
name = "broken"

[[states]]
name = "initial"
path = "/things"

[[states.transitions]]
method = "GET"
target = "missing"
"#;
        let err = build(model).unwrap_err();
        assert!(err.to_string().contains("unknown state missing"));
    }

    #[test]
    fn test_parent_cycle_fails() {
        let model = r#"
[machine]
name = "cycle"

[[states]]
name = "a"
kind = "final"
parent = "b"

[[states]]
name = "b"
kind = "final"
parent = "a"
"#;
        let err = build(model).unwrap_err();
        assert!(err.to_string().contains("unresolvable parent references"));
    }

    #[test]
    fn test_final_state_with_path_fails() {
        let model = r#"
[machine]
name = "bad"

[[states]]
name = "root"
path = "/roots"

[[states]]
name = "gone"
kind = "final"
parent = "root"
path = "/gone"
"#;
        let err = build(model).unwrap_err();
        assert!(err.to_string().contains("cannot declare one"));
    }

    #[test]
    fn test_duplicate_state_names_fail() {
        let model = r#"
[machine]
name = "dup"

[[states]]
name = "a"
path = "/a"

[[states]]
name = "a"
path = "/a2"
"#;
        let err = build(model).unwrap_err();
        assert!(err.to_string().contains("duplicate state name"));
    }
}
