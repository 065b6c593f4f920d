//! Hypermedia module - Resource-state graphs and link production
//!
//! The core of the engine: declarative resource states wired by transitions
//! into a [`ResourceStateMachine`], plus the link-to-field resolution that
//! turns collection-valued entity properties into one link per occurrence.

pub mod graph;
pub mod link;
pub mod machine;
pub mod properties;
pub mod resolver;
pub mod state;
pub mod template;
pub mod transition;

// Re-export key types
pub use graph::{validate, Finding, GraphStats, MachineGraph, Severity, ValidationReport};
pub use link::{Link, LinkProperties};
pub use machine::{
    InjectedLinks, RequestContext, ResourceLocator, ResourcePayload, ResourceStateMachine,
};
pub use properties::{PathParams, PropertyBag};
pub use resolver::LinkFieldResolver;
pub use state::{Action, ActionKind, DynamicLocator, ResourceState, StateId, StateKind};
pub use template::PathTemplate;
pub use transition::{TargetRef, Transition, TransitionCommand};
