//! Resource state primitives
//!
//! A [`ResourceState`] is one REST-addressable application state, distinct
//! from the underlying data entity. States are assembled once at startup,
//! are immutable once a machine owns them, and live for the process
//! lifetime.

use crate::hypermedia::template::PathTemplate;
use crate::hypermedia::transition::Transition;
use crate::Result;
use std::collections::BTreeMap;
use std::fmt;

/// Stable state identity: the canonical `"entity.name"` pair.
///
/// An empty entity name yields `".name"`; application states with no data
/// entity keep that exact form in canonical transition ids.
pub type StateId = String;

/// Build the canonical identity string for an (entity, name) pair.
pub fn state_id(entity_name: &str, name: &str) -> StateId {
    format!("{}.{}", entity_name, name)
}

/// Side-effecting behavior bound to entering or viewing a state.
///
/// Opaque to the engine: actions are carried through the graph for the
/// command layer to execute, never interpreted here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub name: String,
    pub kind: ActionKind,
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActionKind {
    #[default]
    Entry,
    View,
}

impl Action {
    pub fn new(name: impl Into<String>, kind: ActionKind) -> Self {
        Self {
            name: name.into(),
            kind,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// Locator expressions of a dynamically-located resource: the target path is
/// computed by an external resource locator from these arguments rather than
/// from a static template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicLocator {
    pub resolver: String,
    pub args: Vec<String>,
}

impl DynamicLocator {
    pub fn new(resolver: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            resolver: resolver.into(),
            args,
        }
    }
}

/// State classification, a closed set of variants.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StateKind {
    /// A single-entity state with its own path.
    #[default]
    Plain,
    /// A state representing a repeating resource (a collection).
    Collection,
    /// A terminal outcome with no path of its own; inherits the effective
    /// path of the concrete ancestor supplied at construction.
    PseudoFinal,
    /// A state whose concrete location is computed by a resource locator.
    Dynamic(DynamicLocator),
}

/// One node of the resource-state graph.
#[derive(Debug, Clone)]
pub struct ResourceState {
    pub entity_name: String,
    pub name: String,
    kind: StateKind,
    path: Option<PathTemplate>,
    inherited_path: Option<PathTemplate>,
    actions: Vec<Action>,
    rels: Vec<String>,
    transitions: Vec<Transition>,
}

impl ResourceState {
    /// A plain state owning a concrete path.
    pub fn new(
        entity_name: impl Into<String>,
        name: impl Into<String>,
        path: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            entity_name: entity_name.into(),
            name: name.into(),
            kind: StateKind::Plain,
            path: Some(PathTemplate::new(path)?),
            inherited_path: None,
            actions: Vec::new(),
            rels: Vec::new(),
            transitions: Vec::new(),
        })
    }

    /// A collection state: one path addressing a repeating resource.
    pub fn collection(
        entity_name: impl Into<String>,
        name: impl Into<String>,
        path: impl Into<String>,
    ) -> Result<Self> {
        let mut state = Self::new(entity_name, name, path)?;
        state.kind = StateKind::Collection;
        Ok(state)
    }

    /// A pseudo-final state: no path of its own, inherits the effective path
    /// of `parent` as captured at this call.
    pub fn pseudo_final(parent: &ResourceState, name: impl Into<String>) -> Self {
        Self {
            entity_name: parent.entity_name.clone(),
            name: name.into(),
            kind: StateKind::PseudoFinal,
            path: None,
            inherited_path: parent.effective_path().cloned(),
            actions: Vec::new(),
            rels: Vec::new(),
            transitions: Vec::new(),
        }
    }

    /// A concrete substate of `parent`: same entity, path appended to the
    /// parent's effective path (`/entity` + `/draft` -> `/entity/draft`).
    pub fn child(
        parent: &ResourceState,
        name: impl Into<String>,
        relative_path: &str,
    ) -> Result<Self> {
        let path = match parent.effective_path() {
            Some(base) => base.join(relative_path)?,
            None => PathTemplate::new(relative_path)?,
        };
        Ok(Self {
            entity_name: parent.entity_name.clone(),
            name: name.into(),
            kind: StateKind::Plain,
            path: Some(path),
            inherited_path: None,
            actions: Vec::new(),
            rels: Vec::new(),
            transitions: Vec::new(),
        })
    }

    /// A dynamically-located state: no static template, target computed by a
    /// resource locator from the given argument expressions.
    pub fn dynamic(
        entity_name: impl Into<String>,
        name: impl Into<String>,
        locator: DynamicLocator,
    ) -> Self {
        Self {
            entity_name: entity_name.into(),
            name: name.into(),
            kind: StateKind::Dynamic(locator),
            path: None,
            inherited_path: None,
            actions: Vec::new(),
            rels: Vec::new(),
            transitions: Vec::new(),
        }
    }

    pub fn with_actions(mut self, actions: Vec<Action>) -> Self {
        self.actions = actions;
        self
    }

    /// Override the link relations advertised when this state is a target.
    pub fn with_rels(mut self, rels: Vec<String>) -> Self {
        self.rels = rels;
        self
    }

    /// Canonical identity, `"entity.name"`.
    pub fn id(&self) -> StateId {
        state_id(&self.entity_name, &self.name)
    }

    pub fn kind(&self) -> &StateKind {
        &self.kind
    }

    pub fn is_pseudo_final(&self) -> bool {
        self.kind == StateKind::PseudoFinal
    }

    pub fn is_collection(&self) -> bool {
        self.kind == StateKind::Collection
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self.kind, StateKind::Dynamic(_))
    }

    pub fn dynamic_locator(&self) -> Option<&DynamicLocator> {
        match &self.kind {
            StateKind::Dynamic(locator) => Some(locator),
            _ => None,
        }
    }

    /// The state's own path. `None` for pseudo-final and dynamic states.
    pub fn path(&self) -> Option<&PathTemplate> {
        self.path.as_ref()
    }

    /// The path this state answers at: its own, or the inherited one for
    /// pseudo-final states. Dynamic states have none until located.
    pub fn effective_path(&self) -> Option<&PathTemplate> {
        self.path.as_ref().or(self.inherited_path.as_ref())
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// The link relation string for links targeting this state. Defaults to
    /// the state name when no explicit rels were declared.
    pub fn rel(&self) -> String {
        if self.rels.is_empty() {
            self.name.clone()
        } else {
            self.rels.join(" ")
        }
    }

    /// Outbound transitions in declaration order.
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Attach an outbound transition, stamping this state as its source.
    pub fn add_transition(&mut self, transition: Transition) {
        self.transitions.push(transition.with_source(self.id()));
    }
}

// Identity is the (entity, name) pair: states constructed separately but
// naming the same node compare equal and hash together.
impl PartialEq for ResourceState {
    fn eq(&self, other: &Self) -> bool {
        self.entity_name == other.entity_name && self.name == other.name
    }
}

impl Eq for ResourceState {}

impl std::hash::Hash for ResourceState {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.entity_name.hash(state);
        self.name.hash(state);
    }
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}
