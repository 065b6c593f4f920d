//! Transitions between resource states
//!
//! Edges carry the HTTP command that triggers them plus the URI linkage
//! expressions used to fill the target path's parameters from entity
//! properties. Targets are referenced by identity so a graph can be wired
//! up in any declaration order and cycles cost nothing.

use crate::hypermedia::machine::ResourceStateMachine;
use crate::hypermedia::state::{ResourceState, StateId};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// The protocol command bound to a transition.
///
/// `method` is `None` for auto transitions: those are followed by the server
/// on completion of the source state and are never advertised as links, nor
/// do they contribute to the interaction set of any path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionCommand {
    pub method: Option<String>,
    pub uri_parameters: BTreeMap<String, String>,
}

impl TransitionCommand {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: Some(method.into()),
            uri_parameters: BTreeMap::new(),
        }
    }

    pub fn auto() -> Self {
        Self::default()
    }

    pub fn with_uri_parameters(mut self, parameters: BTreeMap<String, String>) -> Self {
        self.uri_parameters = parameters;
        self
    }
}

/// What a transition points at: a state in the same graph, or the initial
/// state of a nested machine whose states get folded into the owner's
/// closure.
#[derive(Clone)]
pub enum TargetRef {
    State(StateId),
    Machine(Arc<ResourceStateMachine>),
}

impl TargetRef {
    /// Identity of the effective target state: the referenced state, or the
    /// nested machine's initial state.
    pub fn target_id(&self) -> StateId {
        match self {
            TargetRef::State(id) => id.clone(),
            TargetRef::Machine(machine) => machine.initial().id(),
        }
    }
}

impl fmt::Debug for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TargetRef::State(id) => f.debug_tuple("State").field(id).finish(),
            TargetRef::Machine(machine) => f
                .debug_tuple("Machine")
                .field(&machine.initial().id())
                .finish(),
        }
    }
}

/// One edge of the resource-state graph.
///
/// The source identity is stamped when the transition is attached to a
/// state; until then `source` is empty and `id()` is not meaningful.
#[derive(Debug, Clone)]
pub struct Transition {
    source: StateId,
    target: TargetRef,
    command: TransitionCommand,
    label: Option<String>,
    target_field: Option<String>,
    for_each: bool,
}

impl Transition {
    /// A transition triggered by an HTTP method.
    pub fn via(method: impl Into<String>, target: &ResourceState) -> Self {
        Self {
            source: StateId::new(),
            target: TargetRef::State(target.id()),
            command: TransitionCommand::new(method),
            label: None,
            target_field: None,
            for_each: false,
        }
    }

    /// An auto transition: no method, followed server-side, invisible to
    /// clients.
    pub fn auto(target: &ResourceState) -> Self {
        Self {
            source: StateId::new(),
            target: TargetRef::State(target.id()),
            command: TransitionCommand::auto(),
            label: None,
            target_field: None,
            for_each: false,
        }
    }

    /// A transition into a nested machine, landing on its initial state.
    pub fn via_machine(method: impl Into<String>, machine: Arc<ResourceStateMachine>) -> Self {
        Self {
            source: StateId::new(),
            target: TargetRef::Machine(machine),
            command: TransitionCommand::new(method),
            label: None,
            target_field: None,
            for_each: false,
        }
    }

    /// URI linkage: map of target path parameter name to the entity property
    /// expression that fills it, e.g. `id -> "{noteId}"`.
    pub fn with_uri_parameters(mut self, parameters: BTreeMap<String, String>) -> Self {
        self.command.uri_parameters = parameters;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// The dotted entity field this link binds to, e.g. `"Items.Sku"`.
    /// Collection-valued linkage parameters are only supported when this is
    /// set.
    pub fn with_target_field(mut self, field: impl Into<String>) -> Self {
        self.target_field = Some(field.into());
        self
    }

    /// Mark this transition as applying to each item of a collection
    /// payload rather than to the resource as a whole.
    pub fn for_each_item(mut self) -> Self {
        self.for_each = true;
        self
    }

    pub(crate) fn with_source(mut self, source: StateId) -> Self {
        self.source = source;
        self
    }

    /// Canonical id, `"<source>><target>"` over canonical state identities.
    pub fn id(&self) -> String {
        format!("{}>{}", self.source, self.target.target_id())
    }

    pub fn source(&self) -> &StateId {
        &self.source
    }

    pub fn target(&self) -> &TargetRef {
        &self.target
    }

    pub fn target_id(&self) -> StateId {
        self.target.target_id()
    }

    pub fn command(&self) -> &TransitionCommand {
        &self.command
    }

    pub fn method(&self) -> Option<&str> {
        self.command.method.as_deref()
    }

    pub fn is_auto(&self) -> bool {
        self.command.method.is_none()
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn target_field(&self) -> Option<&str> {
        self.target_field.as_deref()
    }

    pub fn is_for_each(&self) -> bool {
        self.for_each
    }

    /// True when this transition loops back onto its own source.
    pub fn is_self_transition(&self) -> bool {
        !self.source.is_empty() && self.source == self.target.target_id()
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.method() {
            Some(method) => write!(f, "{} {}", method, self.id()),
            None => write!(f, "auto {}", self.id()),
        }
    }
}
