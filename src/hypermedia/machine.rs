//! The resource-state machine
//!
//! Owns the full graph of resource states reachable from an initial state,
//! answers path and interaction queries, and produces hypermedia links
//! against concrete request contexts and entity payloads.
//!
//! A machine is immutable once constructed: states are registered up front
//! by identity, targets are validated, and the path and interaction indices
//! are computed once. Queries never mutate.

use crate::hypermedia::link::{Link, LinkProperties};
use crate::hypermedia::properties::{PathParams, PropertyBag};
use crate::hypermedia::resolver::LinkFieldResolver;
use crate::hypermedia::state::{DynamicLocator, ResourceState, StateId};
use crate::hypermedia::template::PathTemplate;
use crate::hypermedia::transition::{TargetRef, Transition};
use crate::{Error, Result};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

/// Matches any braced expression token, dotted names included:
/// `{noteId}`, `{Items.Sku}`.
const EXPRESSION_PATTERN: &str = r"\{([A-Za-z0-9_.]+)\}";

fn expression_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(EXPRESSION_PATTERN).expect("valid expression pattern"))
}

/// Replace every `{X}` token with the value of `X`, leaving tokens without
/// a value verbatim.
fn substitute(expression: &str, values: &BTreeMap<String, String>) -> String {
    expression_regex()
        .replace_all(expression, |caps: &regex::Captures| {
            match values.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Per-request inputs for link production: the URI prefix hrefs carry and
/// the path parameters extracted from the matched request path.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    base_uri: String,
    path_params: PathParams,
}

impl RequestContext {
    pub fn new(base_uri: impl Into<String>) -> Self {
        let mut base_uri = base_uri.into();
        while base_uri.ends_with('/') {
            base_uri.pop();
        }
        Self {
            base_uri,
            path_params: PathParams::new(),
        }
    }

    pub fn with_path_params(mut self, params: PathParams) -> Self {
        self.path_params = params;
        self
    }

    pub fn with_path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.insert(name.into(), value.into());
        self
    }

    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    pub fn path_params(&self) -> &PathParams {
        &self.path_params
    }
}

/// The payload links get injected into: one entity's property bag, or one
/// bag per collection item.
#[derive(Debug, Clone)]
pub enum ResourcePayload {
    Entity(PropertyBag),
    Collection(Vec<PropertyBag>),
}

/// Links produced by [`ResourceStateMachine::inject_links`]: the resource's
/// own links, plus one link set per collection item for transitions marked
/// per-item.
#[derive(Debug, Clone, Default)]
pub struct InjectedLinks {
    pub links: Vec<Link>,
    pub item_links: Vec<Vec<Link>>,
}

/// Locates the concrete state behind a dynamically-located target.
///
/// Argument expressions have already been substituted against the link's
/// parameter set when this is called.
pub trait ResourceLocator: Send + Sync {
    fn locate(&self, locator: &DynamicLocator, resolved_args: &[String]) -> Option<ResourceState>;
}

/// The application's resource-state graph, rooted at an initial state.
pub struct ResourceStateMachine {
    initial: ResourceState,
    registered: BTreeMap<StateId, ResourceState>,
    reachable: BTreeSet<StateId>,
    interactions: BTreeMap<PathTemplate, BTreeSet<String>>,
    paths: BTreeMap<PathTemplate, BTreeSet<StateId>>,
    transitions: BTreeMap<String, Transition>,
    locator: Option<Arc<dyn ResourceLocator>>,
}

impl ResourceStateMachine {
    /// Build a machine from an initial state and every other state of the
    /// graph. States are keyed by identity; registering the same identity
    /// twice keeps the first registration. States of nested machines wired
    /// through [`Transition::via_machine`] are folded in.
    ///
    /// Fails when any transition targets an identity that was never
    /// registered.
    pub fn new(
        initial: ResourceState,
        states: impl IntoIterator<Item = ResourceState>,
    ) -> Result<Self> {
        let mut registered: BTreeMap<StateId, ResourceState> = BTreeMap::new();
        let mut queue: VecDeque<ResourceState> = VecDeque::new();
        queue.push_back(initial.clone());
        queue.extend(states);

        while let Some(state) = queue.pop_front() {
            if registered.contains_key(&state.id()) {
                debug!("state {} already registered, keeping first", state.id());
                continue;
            }
            for transition in state.transitions() {
                if let TargetRef::Machine(nested) = transition.target() {
                    queue.extend(nested.registered_states().into_iter().cloned());
                }
            }
            registered.insert(state.id(), state);
        }

        for state in registered.values() {
            for transition in state.transitions() {
                let target = transition.target_id();
                if !registered.contains_key(&target) {
                    return Err(Error::state_machine(format!(
                        "transition {} targets unregistered state {}",
                        transition.id(),
                        target
                    )));
                }
            }
        }

        let reachable = closure(&registered, &initial.id());
        for id in registered.keys() {
            if !reachable.contains(id) {
                debug!("state {} is not reachable from {}", id, initial.id());
            }
        }

        let mut interactions: BTreeMap<PathTemplate, BTreeSet<String>> = BTreeMap::new();
        let mut paths: BTreeMap<PathTemplate, BTreeSet<StateId>> = BTreeMap::new();
        let mut transitions: BTreeMap<String, Transition> = BTreeMap::new();

        for id in &reachable {
            let Some(state) = registered.get(id) else {
                continue;
            };
            if let Some(path) = state.effective_path() {
                paths.entry(path.clone()).or_default().insert(id.clone());
                // Every path with a concrete state answers GET, declared
                // or not. A final outcome alone does not make its
                // inherited path readable.
                if !state.is_pseudo_final() {
                    interactions
                        .entry(path.clone())
                        .or_default()
                        .insert("GET".to_string());
                }
            }
            for transition in state.transitions() {
                transitions.insert(transition.id(), transition.clone());
                let Some(method) = transition.method() else {
                    // Auto transitions are followed server-side and expose
                    // no interaction.
                    continue;
                };
                let target = registered.get(&transition.target_id());
                if let Some(path) = target.and_then(|t| t.effective_path()) {
                    interactions
                        .entry(path.clone())
                        .or_default()
                        .insert(method.to_string());
                }
            }
        }

        Ok(Self {
            initial,
            registered,
            reachable,
            interactions,
            paths,
            transitions,
            locator: None,
        })
    }

    /// Register the locator used to resolve dynamically-located targets.
    /// Without one, links to dynamic states are skipped.
    pub fn with_locator(mut self, locator: Arc<dyn ResourceLocator>) -> Self {
        self.locator = Some(locator);
        self
    }

    pub fn initial(&self) -> &ResourceState {
        &self.initial
    }

    /// Every state reachable from the initial state, in identity order.
    pub fn all_states(&self) -> Vec<&ResourceState> {
        self.reachable
            .iter()
            .filter_map(|id| self.registered.get(id))
            .collect()
    }

    /// Every registered state, reachable or not. Structural checks use
    /// this; navigation uses [`all_states`](Self::all_states).
    pub fn registered_states(&self) -> Vec<&ResourceState> {
        self.registered.values().collect()
    }

    pub fn state(&self, id: &str) -> Option<&ResourceState> {
        self.registered.get(id)
    }

    fn is_registered(&self, state: &ResourceState) -> bool {
        self.registered.contains_key(&state.id())
    }

    fn target_state(&self, transition: &Transition) -> Option<&ResourceState> {
        self.registered.get(&transition.target_id())
    }

    /// Methods answered per path, the implicit GET included.
    pub fn interactions_by_path(&self) -> &BTreeMap<PathTemplate, BTreeSet<String>> {
        &self.interactions
    }

    /// Methods answered at a state's effective path.
    ///
    /// # Panics
    ///
    /// Panics when `state` is not part of this machine: asking a machine
    /// about a foreign state is a wiring bug, not a runtime condition.
    pub fn interactions(&self, state: &ResourceState) -> BTreeSet<String> {
        assert!(
            self.is_registered(state),
            "state {} is not part of this machine",
            state.id()
        );
        state
            .effective_path()
            .and_then(|path| self.interactions.get(path))
            .cloned()
            .unwrap_or_default()
    }

    /// Reachable states grouped by effective path. Pseudo-final states
    /// appear under their inherited path.
    pub fn states_by_path(&self) -> &BTreeMap<PathTemplate, BTreeSet<StateId>> {
        &self.paths
    }

    /// States grouped by effective path, restricted to the subgraph
    /// reachable from `start`.
    pub fn states_by_path_from(
        &self,
        start: &ResourceState,
    ) -> BTreeMap<PathTemplate, BTreeSet<StateId>> {
        let mut map: BTreeMap<PathTemplate, BTreeSet<StateId>> = BTreeMap::new();
        for id in closure(&self.registered, &start.id()) {
            let Some(state) = self.registered.get(&id) else {
                continue;
            };
            if let Some(path) = state.effective_path() {
                map.entry(path.clone()).or_default().insert(id);
            }
        }
        map
    }

    /// States answering at a path pattern. `None` asks for the initial
    /// state's path.
    pub fn states_for_path(&self, path: Option<&str>) -> Vec<&ResourceState> {
        let pattern = match path {
            Some(p) => p.to_string(),
            None => match self.initial.effective_path() {
                Some(p) => p.pattern().to_string(),
                None => return Vec::new(),
            },
        };
        self.paths
            .iter()
            .filter(|(template, _)| template.pattern() == pattern)
            .flat_map(|(_, ids)| ids.iter())
            .filter_map(|id| self.registered.get(id))
            .collect()
    }

    /// Every transition of the reachable graph, keyed by canonical id.
    /// Transitions sharing source and target share an id; the last one
    /// registered wins.
    pub fn transitions_by_id(&self) -> &BTreeMap<String, Transition> {
        &self.transitions
    }

    /// The self link of a state bound against the request's path
    /// parameters: id `"X.y>X.y"`, rel `"self"`.
    pub fn self_link(&self, state: &ResourceState, ctx: &RequestContext) -> Option<Link> {
        let path = state.effective_path()?;
        let bound = path.bind(ctx.path_params());
        let id = state.id();
        Some(Link::new(
            format!("{}>{}", id, id),
            "self",
            format!("{}{}", ctx.base_uri(), bound),
            "GET",
        ))
    }

    /// All links one transition produces against a property bag: one per
    /// parameter set the field resolver computes.
    pub fn links_for_transition(
        &self,
        transition: &Transition,
        ctx: &RequestContext,
        properties: &PropertyBag,
    ) -> Vec<Link> {
        if transition.is_auto() {
            debug!("transition {} is automatic, no link", transition.id());
            return Vec::new();
        }
        let Some(target) = self.target_state(transition) else {
            warn!("transition {} has no resolvable target", transition.id());
            return Vec::new();
        };
        if target.is_pseudo_final() {
            debug!(
                "transition {} ends the resource lifecycle, no link",
                transition.id()
            );
            return Vec::new();
        }
        let resolver = LinkFieldResolver::new(transition, target, properties);
        if !resolver.is_supported() {
            return Vec::new();
        }
        resolver
            .resolve()
            .iter()
            .filter_map(|props| self.build_link(transition, target, props, ctx))
            .collect()
    }

    fn first_link(
        &self,
        transition: &Transition,
        ctx: &RequestContext,
        properties: &PropertyBag,
    ) -> Option<Link> {
        self.links_for_transition(transition, ctx, properties)
            .into_iter()
            .next()
    }

    /// The link of the outbound transition of `state` whose target is
    /// `target`: `None` when no such transition exists or it yields no
    /// link.
    pub fn link_to_target(
        &self,
        state: &ResourceState,
        target: &ResourceState,
        ctx: &RequestContext,
        properties: &PropertyBag,
    ) -> Option<Link> {
        let target_id = target.id();
        state
            .transitions()
            .iter()
            .find(|t| t.target_id() == target_id)
            .and_then(|t| self.first_link(t, ctx, properties))
    }

    /// The link of the first outbound transition of `state` using the
    /// given method.
    pub fn link_for_method(
        &self,
        method: &str,
        state: &ResourceState,
        ctx: &RequestContext,
        properties: &PropertyBag,
    ) -> Option<Link> {
        state
            .transitions()
            .iter()
            .find(|t| t.method() == Some(method))
            .and_then(|t| self.first_link(t, ctx, properties))
    }

    /// The link of the transition whose canonical id equals `relation`
    /// exactly. Custom link relations name transitions this way; an
    /// unknown relation is `None`, never an error.
    pub fn link_for_relation(
        &self,
        relation: &str,
        ctx: &RequestContext,
        properties: &PropertyBag,
    ) -> Option<Link> {
        self.transitions
            .get(relation)
            .and_then(|t| self.first_link(t, ctx, properties))
    }

    /// Produce the full link set for a resource representation: the self
    /// link, the links of each outbound transition, and per-item links
    /// for collection payloads with per-item transitions. Automatic
    /// transitions and transitions into final outcomes contribute none.
    /// A `custom_relation` canonical id pulls in that transition's link
    /// on top of the outbound set.
    ///
    /// A missing payload produces no links: there is nothing to attach
    /// them to.
    ///
    /// # Panics
    ///
    /// Panics when `state` is not part of this machine.
    pub fn inject_links(
        &self,
        ctx: &RequestContext,
        payload: Option<&ResourcePayload>,
        state: &ResourceState,
        custom_relation: Option<&str>,
    ) -> InjectedLinks {
        assert!(
            self.is_registered(state),
            "state {} is not part of this machine",
            state.id()
        );
        let Some(payload) = payload else {
            debug!("no payload for state {}, skipping link injection", state.id());
            return InjectedLinks::default();
        };

        let mut injected = InjectedLinks::default();
        let resource_bag = match payload {
            ResourcePayload::Entity(bag) => bag.clone().with_path_params(ctx.path_params()),
            ResourcePayload::Collection(_) => {
                PropertyBag::new().with_path_params(ctx.path_params())
            }
        };

        if let Some(link) = self.self_link(state, ctx) {
            injected.links.push(link);
        }
        for transition in state.transitions() {
            if transition.is_for_each() {
                continue;
            }
            injected
                .links
                .extend(self.links_for_transition(transition, ctx, &resource_bag));
        }
        if let Some(relation) = custom_relation
            && let Some(transition) = self.transitions.get(relation)
        {
            injected
                .links
                .extend(self.links_for_transition(transition, ctx, &resource_bag));
        }
        dedup_links(&mut injected.links);

        if let ResourcePayload::Collection(items) = payload {
            for item in items {
                let item_bag = item.clone().with_path_params(ctx.path_params());
                let mut links = Vec::new();
                for transition in state.transitions() {
                    if !transition.is_for_each() {
                        continue;
                    }
                    links.extend(self.links_for_transition(transition, ctx, &item_bag));
                }
                dedup_links(&mut links);
                injected.item_links.push(links);
            }
        }

        injected
    }

    /// Bind one link occurrence: locate dynamic targets, fill the target
    /// path from the request's path parameters, the parameter set and the
    /// transition's URI linkage, prefix the base URI.
    fn build_link(
        &self,
        transition: &Transition,
        target: &ResourceState,
        props: &LinkProperties,
        ctx: &RequestContext,
    ) -> Option<Link> {
        // Request path parameters seed the value set; entity-resolved
        // values win on conflict.
        let mut values = ctx.path_params().clone();
        values.extend(props.parameters().clone());

        let located;
        let target = if let Some(locator_spec) = target.dynamic_locator() {
            let Some(locator) = self.locator.as_ref() else {
                debug!(
                    "no resource locator registered, skipping link for {}",
                    transition.id()
                );
                return None;
            };
            let resolved_args: Vec<String> = locator_spec
                .args
                .iter()
                .map(|arg| substitute(arg, &values))
                .collect();
            located = locator.locate(locator_spec, &resolved_args)?;
            &located
        } else {
            target
        };

        let path = target.effective_path()?;
        let mut bindings = values.clone();
        for name in path.parameter_names() {
            if let Some(expression) = transition.command().uri_parameters.get(name) {
                bindings.insert(name.clone(), substitute(expression, &values));
            }
        }
        let bound = path.bind(&bindings);

        let rel = if transition.is_self_transition() {
            "self".to_string()
        } else {
            target.rel()
        };
        let method = transition.method().unwrap_or("GET");

        Some(Link::new(
            transition.id(),
            rel,
            format!("{}{}", ctx.base_uri(), bound),
            method,
        ))
    }
}

impl fmt::Debug for ResourceStateMachine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ResourceStateMachine")
            .field("initial", &self.initial.id())
            .field("registered", &self.registered.len())
            .field("reachable", &self.reachable.len())
            .finish()
    }
}

/// Identity-keyed breadth-first closure. The visited set makes cyclic
/// graphs terminate.
fn closure(states: &BTreeMap<StateId, ResourceState>, start: &StateId) -> BTreeSet<StateId> {
    let mut visited = BTreeSet::new();
    let mut queue = VecDeque::from([start.clone()]);
    while let Some(id) = queue.pop_front() {
        let Some(state) = states.get(&id) else {
            continue;
        };
        if !visited.insert(id) {
            continue;
        }
        for transition in state.transitions() {
            let target = transition.target_id();
            if !visited.contains(&target) {
                queue.push_back(target);
            }
        }
    }
    visited
}

/// Drop exact duplicate links, keeping first occurrences in order.
fn dedup_links(links: &mut Vec<Link>) {
    let mut seen = BTreeSet::new();
    links.retain(|link| {
        seen.insert((
            link.id.clone(),
            link.rel.clone(),
            link.href.clone(),
            link.method.clone(),
        ))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hypermedia::state::StateKind;
    use std::collections::BTreeMap;

    fn uri_params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    /// The canonical notes graph: a collection at /notes, items at
    /// /notes/{noteId}, a pseudo-final deleted outcome.
    fn notes_machine() -> ResourceStateMachine {
        let mut initial = ResourceState::collection("NOTE", "initial", "/notes").unwrap();
        let mut item = ResourceState::new("NOTE", "item", "/notes/{noteId}").unwrap();
        let deleted = ResourceState::pseudo_final(&item, "deleted");

        initial.add_transition(
            Transition::via("GET", &item)
                .with_uri_parameters(uri_params(&[("noteId", "{noteId}")]))
                .for_each_item(),
        );
        item.add_transition(Transition::via("PUT", &item));
        item.add_transition(Transition::via("DELETE", &deleted));

        ResourceStateMachine::new(initial, [item, deleted]).unwrap()
    }

    #[test]
    fn test_all_states_is_the_reachable_closure() {
        let machine = notes_machine();
        let ids: Vec<String> = machine.all_states().iter().map(|s| s.id()).collect();
        assert_eq!(ids, vec!["NOTE.deleted", "NOTE.initial", "NOTE.item"]);
    }

    #[test]
    fn test_cyclic_graph_terminates() {
        let mut a = ResourceState::new("X", "a", "/x/a").unwrap();
        let mut b = ResourceState::new("X", "b", "/x/b").unwrap();
        a.add_transition(Transition::via("GET", &b));
        b.add_transition(Transition::via("GET", &a));

        let machine = ResourceStateMachine::new(a, [b]).unwrap();
        assert_eq!(machine.all_states().len(), 2);
    }

    #[test]
    fn test_unregistered_target_is_an_error() {
        let mut initial = ResourceState::new("NOTE", "initial", "/notes").unwrap();
        let ghost = ResourceState::new("NOTE", "ghost", "/ghosts").unwrap();
        initial.add_transition(Transition::via("GET", &ghost));

        let err = ResourceStateMachine::new(initial, []).unwrap_err();
        assert!(err.to_string().contains("NOTE.ghost"));
    }

    #[test]
    fn test_interactions_by_path_unions_methods_per_target_path() {
        let machine = notes_machine();
        let interactions = machine.interactions_by_path();

        let notes = interactions
            .iter()
            .find(|(p, _)| p.pattern() == "/notes")
            .map(|(_, m)| m)
            .unwrap();
        assert_eq!(notes.iter().collect::<Vec<_>>(), vec!["GET"]);

        let item = interactions
            .iter()
            .find(|(p, _)| p.pattern() == "/notes/{noteId}")
            .map(|(_, m)| m)
            .unwrap();
        // DELETE targets the pseudo-final state, so it lands under the
        // inherited item path; GET is implicit.
        assert_eq!(
            item.iter().collect::<Vec<_>>(),
            vec!["DELETE", "GET", "PUT"]
        );
    }

    #[test]
    fn test_auto_transitions_expose_no_interaction() {
        let mut begin = ResourceState::new("", "begin", "/entity").unwrap();
        let exists = ResourceState::new("", "exists", "/entity/current").unwrap();
        begin.add_transition(Transition::auto(&exists));

        let machine = ResourceStateMachine::new(begin, [exists.clone()]).unwrap();
        let methods = machine.interactions(machine.state(".exists").unwrap());
        assert_eq!(methods.iter().collect::<Vec<_>>(), vec!["GET"]);
    }

    #[test]
    fn test_interactions_for_pseudo_final_use_inherited_path() {
        let machine = notes_machine();
        let deleted = machine.state("NOTE.deleted").unwrap();
        let methods = machine.interactions(deleted);
        assert_eq!(
            methods.iter().collect::<Vec<_>>(),
            vec!["DELETE", "GET", "PUT"]
        );
    }

    #[test]
    fn test_no_implicit_get_when_only_a_final_outcome_owns_the_path() {
        // The item state anchors the outcome's inherited path but is not
        // itself part of the machine, so nothing concrete answers there.
        let item = ResourceState::new("NOTE", "item", "/notes/{noteId}").unwrap();
        let gone = ResourceState::pseudo_final(&item, "gone");
        let mut initial = ResourceState::collection("NOTE", "initial", "/notes").unwrap();
        initial.add_transition(Transition::via("DELETE", &gone));

        let machine = ResourceStateMachine::new(initial, [gone.clone()]).unwrap();
        let methods = machine.interactions(&gone);
        assert_eq!(methods.iter().collect::<Vec<_>>(), vec!["DELETE"]);
    }

    #[test]
    #[should_panic(expected = "not part of this machine")]
    fn test_interactions_for_foreign_state_panics() {
        let machine = notes_machine();
        let foreign = ResourceState::new("OTHER", "initial", "/other").unwrap();
        machine.interactions(&foreign);
    }

    #[test]
    fn test_states_by_path_includes_pseudo_final_under_inherited_path() {
        let machine = notes_machine();
        let paths = machine.states_by_path();

        let item_states = paths
            .iter()
            .find(|(p, _)| p.pattern() == "/notes/{noteId}")
            .map(|(_, s)| s)
            .unwrap();
        assert!(item_states.contains("NOTE.item"));
        assert!(item_states.contains("NOTE.deleted"));
    }

    #[test]
    fn test_states_for_path_defaults_to_initial() {
        let machine = notes_machine();
        let states = machine.states_for_path(None);
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].id(), "NOTE.initial");

        let states = machine.states_for_path(Some("/notes/{noteId}"));
        assert_eq!(states.len(), 2);
    }

    #[test]
    fn test_transitions_by_id_uses_canonical_ids() {
        let machine = notes_machine();
        let ids: Vec<&String> = machine.transitions_by_id().keys().collect();
        assert_eq!(
            ids,
            vec![
                "NOTE.initial>NOTE.item",
                "NOTE.item>NOTE.deleted",
                "NOTE.item>NOTE.item"
            ]
        );
    }

    #[test]
    fn test_transitions_by_id_keeps_the_last_declaration() {
        // PUT and POST share the id NOTE.item>NOTE.item; the index serves
        // the later declaration.
        let mut item = ResourceState::new("NOTE", "item", "/notes/{noteId}").unwrap();
        let target = item.clone();
        item.add_transition(Transition::via("PUT", &target));
        item.add_transition(Transition::via("POST", &target));
        let machine = ResourceStateMachine::new(item, []).unwrap();

        let transition = machine
            .transitions_by_id()
            .get("NOTE.item>NOTE.item")
            .unwrap();
        assert_eq!(transition.method(), Some("POST"));
    }

    #[test]
    fn test_self_link_binds_path_params() {
        let machine = notes_machine();
        let item = machine.state("NOTE.item").unwrap();
        let ctx = RequestContext::new("/baseuri").with_path_param("noteId", "123");

        let link = machine.self_link(item, &ctx).unwrap();
        assert_eq!(link.id, "NOTE.item>NOTE.item");
        assert_eq!(link.rel, "self");
        assert_eq!(link.href, "/baseuri/notes/123");
        assert_eq!(link.method, "GET");
    }

    #[test]
    fn test_inject_links_always_includes_self() {
        // A state with no outbound transitions still carries its self link.
        let lone = ResourceState::new("NOTE", "only", "/notes/only").unwrap();
        let machine = ResourceStateMachine::new(lone, []).unwrap();
        let state = machine.state("NOTE.only").unwrap();
        let ctx = RequestContext::new("/baseuri");
        let payload = ResourcePayload::Entity(PropertyBag::new());

        let injected = machine.inject_links(&ctx, Some(&payload), state, None);
        assert_eq!(injected.links.len(), 1);
        assert_eq!(injected.links[0].id, "NOTE.only>NOTE.only");
        assert_eq!(injected.links[0].rel, "self");
    }

    #[test]
    fn test_link_for_method_on_self_transition_is_self() {
        let machine = notes_machine();
        let item = machine.state("NOTE.item").unwrap();
        let ctx = RequestContext::new("/baseuri");
        let mut bag = PropertyBag::new();
        bag.set("noteId", "9");

        let link = machine.link_for_method("PUT", item, &ctx, &bag).unwrap();
        assert_eq!(link.rel, "self");
        assert_eq!(link.href, "/baseuri/notes/9");
        assert_eq!(link.method, "PUT");
    }

    #[test]
    fn test_link_rel_defaults_to_target_state_name() {
        let mut item = ResourceState::new("NOTE", "item", "/notes/{noteId}").unwrap();
        let archived = ResourceState::new("NOTE", "archived", "/notes/{noteId}/archive").unwrap();
        item.add_transition(Transition::via("POST", &archived));
        let machine = ResourceStateMachine::new(item, [archived]).unwrap();

        let ctx = RequestContext::new("/baseuri");
        let item = machine.state("NOTE.item").unwrap();
        let mut bag = PropertyBag::new();
        bag.set("noteId", "9");

        let link = machine.link_for_method("POST", item, &ctx, &bag).unwrap();
        assert_eq!(link.rel, "archived");
        assert_eq!(link.id, "NOTE.item>NOTE.archived");
        assert_eq!(link.href, "/baseuri/notes/9/archive");
    }

    #[test]
    fn test_no_link_for_pseudo_final_target() {
        // A lifecycle-ending transition yields no link: after DELETE
        // there is nothing left to follow.
        let machine = notes_machine();
        let item = machine.state("NOTE.item").unwrap();
        let ctx = RequestContext::new("/baseuri");
        let mut bag = PropertyBag::new();
        bag.set("noteId", "9");

        assert!(machine.link_for_method("DELETE", item, &ctx, &bag).is_none());
    }

    #[test]
    fn test_link_for_relation_matches_canonical_id() {
        let machine = notes_machine();
        let ctx = RequestContext::new("/baseuri");
        let mut bag = PropertyBag::new();
        bag.set("noteId", "9");

        let link = machine
            .link_for_relation("NOTE.item>NOTE.item", &ctx, &bag)
            .unwrap();
        assert_eq!(link.method, "PUT");
        assert_eq!(link.href, "/baseuri/notes/9");

        assert!(machine
            .link_for_relation("NOTE.item>NOTE.missing", &ctx, &bag)
            .is_none());
    }

    #[test]
    fn test_links_bind_path_params_from_the_request_context() {
        // The path variable rides in the request context only; the bag
        // stays empty.
        let machine = notes_machine();
        let initial = machine.state("NOTE.initial").unwrap();
        let item = machine.state("NOTE.item").unwrap();
        let ctx = RequestContext::new("/baseuri").with_path_param("noteId", "123");
        let bag = PropertyBag::new();

        let link = machine.link_for_method("PUT", item, &ctx, &bag).unwrap();
        assert_eq!(link.href, "/baseuri/notes/123");

        let link = machine
            .link_for_relation("NOTE.item>NOTE.item", &ctx, &bag)
            .unwrap();
        assert_eq!(link.href, "/baseuri/notes/123");

        // The GET into the item carries the {noteId} linkage expression,
        // which resolves against the request parameters as well.
        let link = machine.link_to_target(initial, item, &ctx, &bag).unwrap();
        assert_eq!(link.href, "/baseuri/notes/123");

        // When both sides carry the variable, the entity value wins.
        let mut bag = PropertyBag::new();
        bag.set("noteId", "9");
        let link = machine.link_for_method("PUT", item, &ctx, &bag).unwrap();
        assert_eq!(link.href, "/baseuri/notes/9");
    }

    #[test]
    fn test_with_rels_overrides_link_relation() {
        let mut initial = ResourceState::collection("NOTE", "initial", "/notes").unwrap();
        let create = ResourceState::new("NOTE", "create", "/notes/new")
            .unwrap()
            .with_rels(vec!["new".to_string()]);
        initial.add_transition(Transition::via("POST", &create));
        let machine = ResourceStateMachine::new(initial, [create]).unwrap();

        let ctx = RequestContext::new("/baseuri");
        let initial = machine.state("NOTE.initial").unwrap();
        let link = machine
            .link_for_method("POST", initial, &ctx, &PropertyBag::new())
            .unwrap();
        assert_eq!(link.rel, "new");
        assert_eq!(link.href, "/baseuri/notes/new");
        assert_eq!(link.method, "POST");
    }

    #[test]
    fn test_unresolved_placeholder_stays_verbatim() {
        let machine = notes_machine();
        let initial = machine.state("NOTE.initial").unwrap();
        let ctx = RequestContext::new("/baseuri");

        let links =
            machine.links_for_transition(&initial.transitions()[0], &ctx, &PropertyBag::new());
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].href, "/baseuri/notes/{noteId}");
    }

    #[test]
    fn test_inject_links_for_entity() {
        let machine = notes_machine();
        let item = machine.state("NOTE.item").unwrap();
        let ctx = RequestContext::new("/baseuri").with_path_param("noteId", "123");

        let mut bag = PropertyBag::new();
        bag.set("Title", "shopping");
        let payload = ResourcePayload::Entity(bag);

        let injected = machine.inject_links(&ctx, Some(&payload), item, None);
        let summary: Vec<(String, String)> = injected
            .links
            .iter()
            .map(|l| (l.rel.clone(), l.href.clone()))
            .collect();

        // Two self links: the canonical GET plus the PUT self-transition.
        // The DELETE into the deleted outcome contributes none.
        assert_eq!(
            summary,
            vec![
                ("self".to_string(), "/baseuri/notes/123".to_string()),
                ("self".to_string(), "/baseuri/notes/123".to_string()),
            ]
        );
        assert!(injected.item_links.is_empty());
    }

    #[test]
    fn test_inject_links_with_custom_relation() {
        let machine = notes_machine();
        let item = machine.state("NOTE.item").unwrap();
        let ctx = RequestContext::new("/baseuri").with_path_param("noteId", "123");
        let payload = ResourcePayload::Entity(PropertyBag::new());

        let injected = machine.inject_links(
            &ctx,
            Some(&payload),
            item,
            Some("NOTE.initial>NOTE.item"),
        );

        // The named transition's link rides along after the outbound set.
        let last = injected.links.last().unwrap();
        assert_eq!(last.id, "NOTE.initial>NOTE.item");
        assert_eq!(last.rel, "item");
        assert_eq!(last.href, "/baseuri/notes/123");
    }

    #[test]
    fn test_inject_links_without_payload_produces_nothing() {
        let machine = notes_machine();
        let item = machine.state("NOTE.item").unwrap();
        let ctx = RequestContext::new("/baseuri");

        let injected = machine.inject_links(&ctx, None, item, None);
        assert!(injected.links.is_empty());
        assert!(injected.item_links.is_empty());
    }

    #[test]
    fn test_inject_links_for_collection_produces_item_links() {
        let machine = notes_machine();
        let initial = machine.state("NOTE.initial").unwrap();
        let ctx = RequestContext::new("/baseuri");

        let mut first = PropertyBag::new();
        first.set("noteId", "1");
        let mut second = PropertyBag::new();
        second.set("noteId", "2");
        let payload = ResourcePayload::Collection(vec![first, second]);

        let injected = machine.inject_links(&ctx, Some(&payload), initial, None);

        assert_eq!(injected.links.len(), 1);
        assert_eq!(injected.links[0].rel, "self");
        assert_eq!(injected.links[0].href, "/baseuri/notes");

        assert_eq!(injected.item_links.len(), 2);
        assert_eq!(injected.item_links[0][0].href, "/baseuri/notes/1");
        assert_eq!(injected.item_links[0][0].rel, "item");
        assert_eq!(injected.item_links[1][0].href, "/baseuri/notes/2");
    }

    #[test]
    fn test_nested_machine_states_fold_into_owner() {
        let mut task_acquired =
            ResourceState::new("task", "acquired", "/tasks/{taskId}/acquired").unwrap();
        let task_complete =
            ResourceState::new("task", "complete", "/tasks/{taskId}/complete").unwrap();
        task_acquired.add_transition(Transition::via("PUT", &task_complete));
        let task_machine =
            Arc::new(ResourceStateMachine::new(task_acquired, [task_complete]).unwrap());

        let mut available = ResourceState::new("process", "taskAvailable", "/processes/next").unwrap();
        available.add_transition(Transition::via_machine("PUT", Arc::clone(&task_machine)));
        let machine = ResourceStateMachine::new(available, []).unwrap();

        let ids: Vec<String> = machine.all_states().iter().map(|s| s.id()).collect();
        assert_eq!(
            ids,
            vec!["process.taskAvailable", "task.acquired", "task.complete"]
        );
        assert!(machine
            .transitions_by_id()
            .contains_key("process.taskAvailable>task.acquired"));
    }

    #[test]
    fn test_collection_linkage_produces_one_link_per_occurrence() {
        let mut order = ResourceState::new("ORDER", "item", "/orders/{orderId}").unwrap();
        let sku = ResourceState::new("SKU", "item", "/skus/{skuId}").unwrap();
        order.add_transition(
            Transition::via("GET", &sku)
                .with_uri_parameters(uri_params(&[("skuId", "{Items.Sku}")]))
                .with_target_field("Items.Sku"),
        );
        let machine = ResourceStateMachine::new(order, [sku]).unwrap();

        let mut bag = PropertyBag::new();
        bag.set("Items(0).Sku", "SK001");
        bag.set("Items(1).Sku", "SK002");

        let ctx = RequestContext::new("/baseuri");
        let order = machine.state("ORDER.item").unwrap();
        let links = machine.links_for_transition(&order.transitions()[0], &ctx, &bag);

        let hrefs: Vec<&str> = links.iter().map(|l| l.href.as_str()).collect();
        assert_eq!(hrefs, vec!["/baseuri/skus/SK001", "/baseuri/skus/SK002"]);
    }

    #[test]
    fn test_dynamic_target_resolves_through_locator() {
        struct FixedLocator;
        impl ResourceLocator for FixedLocator {
            fn locate(
                &self,
                _locator: &DynamicLocator,
                resolved_args: &[String],
            ) -> Option<ResourceState> {
                assert_eq!(resolved_args, ["R1"]);
                ResourceState::new("SKU", "located", "/skus/byref/R1").ok()
            }
        }

        let mut order = ResourceState::new("ORDER", "item", "/orders/{orderId}").unwrap();
        let dynamic = ResourceState::dynamic(
            "SKU",
            "located",
            DynamicLocator::new("skuLocator", vec!["{Ref}".to_string()]),
        );
        order.add_transition(Transition::via("GET", &dynamic));
        let machine = ResourceStateMachine::new(order, [dynamic])
            .unwrap()
            .with_locator(Arc::new(FixedLocator));

        let mut bag = PropertyBag::new();
        bag.set("Ref", "R1");

        let ctx = RequestContext::new("/baseuri");
        let order = machine.state("ORDER.item").unwrap();
        let target = machine.state("SKU.located").unwrap();
        let link = machine.link_to_target(order, target, &ctx, &bag).unwrap();
        assert_eq!(link.href, "/baseuri/skus/byref/R1");
        assert_eq!(link.rel, "located");
    }

    #[test]
    fn test_dynamic_target_without_locator_is_skipped() {
        let mut order = ResourceState::new("ORDER", "item", "/orders/{orderId}").unwrap();
        let dynamic = ResourceState::dynamic(
            "SKU",
            "located",
            DynamicLocator::new("skuLocator", vec!["{Ref}".to_string()]),
        );
        order.add_transition(Transition::via("GET", &dynamic));
        let machine = ResourceStateMachine::new(order, [dynamic]).unwrap();

        let ctx = RequestContext::new("/baseuri");
        let order = machine.state("ORDER.item").unwrap();
        let target = machine.state("SKU.located").unwrap();
        assert!(machine
            .link_to_target(order, target, &ctx, &PropertyBag::new())
            .is_none());
    }

    #[test]
    fn test_dynamic_state_kind_is_preserved_in_machine() {
        let mut order = ResourceState::new("ORDER", "item", "/orders/{orderId}").unwrap();
        let dynamic = ResourceState::dynamic(
            "SKU",
            "located",
            DynamicLocator::new("skuLocator", vec![]),
        );
        order.add_transition(Transition::via("GET", &dynamic));
        let machine = ResourceStateMachine::new(order, [dynamic]).unwrap();

        let state = machine.state("SKU.located").unwrap();
        assert!(matches!(state.kind(), StateKind::Dynamic(_)));
        // No path until located, so no path-index entry.
        assert!(machine
            .states_by_path()
            .values()
            .all(|ids| !ids.contains("SKU.located")));
    }
}
