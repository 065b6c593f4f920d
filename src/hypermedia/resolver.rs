//! Link-to-field resolution
//!
//! A transition whose URI linkage references collection-valued entity
//! properties (`{Items.Sku}`) produces one link per repetition, each bound
//! to one occurrence of the field. [`LinkFieldResolver`] computes the
//! parameter set for every occurrence of one transition against one
//! normalized property bag.
//!
//! Pairing rules:
//! - parameters sharing the target field's parent pair index-for-index with
//!   each target occurrence,
//! - parameters under a different parent get a synthetic index assigned by
//!   occurrence position,
//! - locator arguments of a dynamically-located target are folded in under
//!   the target field's parent.

use crate::hypermedia::link::LinkProperties;
use crate::hypermedia::properties::PropertyBag;
use crate::hypermedia::state::{ResourceState, StateKind};
use crate::hypermedia::transition::Transition;
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, error};

/// Matches a collection-valued linkage expression: a braced, dotted field
/// name such as `{Items.Sku}`. Plain placeholders (`{noteId}`) do not match.
const COLLECTION_PARAM_PATTERN: &str = r"\{([a-zA-Z0-9]+(?:\.[a-zA-Z0-9]+)+)\}";

fn collection_param_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(COLLECTION_PARAM_PATTERN).expect("valid collection pattern"))
}

/// Everything before the last dot, or `None` for an undotted name.
fn parent_of(value: &str) -> Option<&str> {
    value.rfind('.').map(|i| &value[..i])
}

/// Everything after the last dot, or `None` for an undotted name.
fn child_of(value: &str) -> Option<&str> {
    value.rfind('.').map(|i| &value[i + 1..])
}

/// Resolves the per-occurrence parameter sets of one transition.
///
/// Borrowed construction: the resolver scans the transition's URI linkage
/// (and the target's locator arguments when the target is dynamic) once,
/// then [`resolve`](Self::resolve) walks the property bag.
pub struct LinkFieldResolver<'a> {
    transition: &'a Transition,
    target: &'a ResourceState,
    properties: &'a PropertyBag,
    target_field: Option<&'a str>,
    collection_params: Vec<String>,
    has_dynamic_collection_arg: bool,
}

impl<'a> LinkFieldResolver<'a> {
    pub fn new(
        transition: &'a Transition,
        target: &'a ResourceState,
        properties: &'a PropertyBag,
    ) -> Self {
        Self {
            transition,
            target,
            properties,
            target_field: transition.target_field(),
            collection_params: Self::collection_params_of(transition, target),
            has_dynamic_collection_arg: Self::has_dynamic_collection_arg(target),
        }
    }

    /// Collection-valued expressions found in the transition's URI linkage
    /// values, then in the target's locator arguments for dynamic targets.
    pub(crate) fn collection_params_of(transition: &Transition, target: &ResourceState) -> Vec<String> {
        let mut params = Vec::new();
        for expression in transition.command().uri_parameters.values() {
            for caps in collection_param_regex().captures_iter(expression) {
                params.push(caps[1].to_string());
            }
        }
        if let StateKind::Dynamic(locator) = target.kind() {
            for arg in &locator.args {
                for caps in collection_param_regex().captures_iter(arg) {
                    params.push(caps[1].to_string());
                }
            }
        }
        params
    }

    pub(crate) fn has_dynamic_collection_arg(target: &ResourceState) -> bool {
        match target.kind() {
            StateKind::Dynamic(locator) => locator.args.iter().any(|arg| arg.contains('.')),
            _ => false,
        }
    }

    /// Whether this transition's linkage configuration can produce links.
    ///
    /// Collection parameters and collection-valued locator arguments both
    /// need a target field to bind occurrences to; without one the
    /// transition is skipped.
    pub fn is_supported(&self) -> bool {
        if self.target_field.is_none()
            && (!self.collection_params.is_empty() || self.has_dynamic_collection_arg)
        {
            error!(
                "cannot generate links for transition {}: collection parameters require a target field",
                self.transition
            );
            return false;
        }
        true
    }

    /// One [`LinkProperties`] per link occurrence this transition produces
    /// against the bag.
    pub fn resolve(&self) -> Vec<LinkProperties> {
        let mut list = Vec::new();

        // Last path segment of each collection parameter: Items.Sku -> Sku.
        let child_names: Vec<String> = self
            .collection_params
            .iter()
            .filter_map(|param| child_of(param).map(str::to_string))
            .collect();

        match self.target_field {
            Some(field) if field.contains('.') => {
                self.multivalue_target_properties(field, &child_names, &mut list)
            }
            _ => self.single_target_properties(&child_names, &mut list),
        }

        debug!(
            "resolved {} parameter set(s) for transition {}",
            list.len(),
            self.transition
        );
        list
    }

    /// The target field is itself collection-valued: one parameter set per
    /// occurrence of the target field in the bag.
    fn multivalue_target_properties(
        &self,
        field: &str,
        child_names: &[String],
        list: &mut Vec<LinkProperties>,
    ) {
        let mut targets = self.properties.matching_fields(field);
        if targets.is_empty() {
            // No occurrence in the bag: keep the unresolved field so one
            // link still gets produced.
            targets.push(field.to_string());
        }

        let target_parent = parent_of(field);
        let mut same_parent = false;
        let mut cross_parent_base = None;
        if let Some(first) = self.collection_params.first() {
            same_parent = parent_of(first) == target_parent;
            if !same_parent {
                cross_parent_base = self.occurrence_parent();
                if cross_parent_base.is_none() {
                    error!(
                        "cannot pair collection parameters with target field {} for transition {}",
                        field, self.transition
                    );
                    return;
                }
            }
        }

        for (position, target) in targets.iter().enumerate() {
            let dynamic_fields = self.dynamic_resolved_fields(target);
            let resolved_parent = if self.collection_params.is_empty() {
                None
            } else if same_parent {
                // Pair each parameter with the same occurrence index as the
                // target field: Items(1).Sku binds Items(1).Qty.
                parent_of(target).map(str::to_string)
            } else {
                // Different parent: synthetic index assigned by position.
                cross_parent_base
                    .as_deref()
                    .map(|base| format!("{}({})", base, position))
            };
            list.push(self.build_properties(
                Some(target),
                &dynamic_fields,
                child_names,
                resolved_parent.as_deref(),
            ));
        }
    }

    /// The target field is single-valued (or absent): cardinality is driven
    /// by the collection parameters alone.
    fn single_target_properties(&self, child_names: &[String], list: &mut Vec<LinkProperties>) {
        if self.collection_params.is_empty() {
            list.push(self.base_properties(self.target_field));
            return;
        }

        let occurrences = self.occurrence_count();

        if self.params_share_parent() {
            let Some(base) = self.occurrence_parent() else {
                error!(
                    "cannot resolve occurrence parent for transition {}",
                    self.transition
                );
                return;
            };
            for index in 0..=occurrences {
                let resolved_parent = format!("{}({})", base, index);
                list.push(self.build_properties(
                    self.target_field,
                    &[],
                    child_names,
                    Some(&resolved_parent),
                ));
            }
        } else {
            // Parameters under different parents are aligned by index: set
            // `i` pairs A(i).B with C(i).D.
            for index in 0..=occurrences {
                let aligned: Vec<String> = self
                    .collection_params
                    .iter()
                    .filter_map(|param| {
                        let parent = parent_of(param)?;
                        let child = child_of(param)?;
                        Some(format!("{}({}).{}", parent, index, child))
                    })
                    .collect();
                list.push(self.build_properties(self.target_field, &aligned, child_names, None));
            }
        }
    }

    /// Highest repetition index any collection parameter reaches in the bag.
    /// Zero when no occurrence is present, so one parameter set still gets
    /// built with empty values.
    fn occurrence_count(&self) -> usize {
        self.collection_params
            .iter()
            .filter_map(|param| self.properties.max_index(param))
            .max()
            .unwrap_or(0)
    }

    fn params_share_parent(&self) -> bool {
        let mut parents = self.collection_params.iter().filter_map(|p| parent_of(p));
        match parents.next() {
            None => true,
            Some(first) => parents.all(|parent| parent == first),
        }
    }

    /// The unindexed parent name occurrences are grouped under, taken from
    /// the first collection parameter's first occurrence in the bag
    /// (`Items(0).Sku` -> `Items`), or from the parameter itself when the
    /// bag holds no occurrence.
    fn occurrence_parent(&self) -> Option<String> {
        let first = self.collection_params.first()?;
        let fields = self.properties.matching_fields(first);
        match fields.first() {
            Some(occurrence) => {
                let parent = parent_of(occurrence)?;
                match parent.rfind('(') {
                    Some(i) => Some(parent[..i].to_string()),
                    None => Some(parent.to_string()),
                }
            }
            None => parent_of(first).map(str::to_string),
        }
    }

    /// Locator arguments of a dynamic target folded under the target field
    /// occurrence's parent: target `Items(1).Sku` and argument `{Items.Ref}`
    /// yield the key `Items(1).Ref`.
    fn dynamic_resolved_fields(&self, target_occurrence: &str) -> Vec<String> {
        if !self.has_dynamic_collection_arg {
            return Vec::new();
        }
        let Some(parent) = parent_of(target_occurrence) else {
            return Vec::new();
        };
        let StateKind::Dynamic(locator) = self.target.kind() else {
            return Vec::new();
        };
        locator
            .args
            .iter()
            .filter(|arg| arg.contains('.'))
            .filter_map(|arg| {
                child_of(arg).map(|child| format!("{}.{}", parent, child.replace('}', "")))
            })
            .collect()
    }

    /// A parameter set preloaded with every resolved entry of the bag.
    fn base_properties(&self, target_field: Option<&str>) -> LinkProperties {
        let mut props = LinkProperties::new();
        if let Some(field) = target_field {
            props.set_target_field(field);
        }
        for (key, value) in self.properties.resolved_entries() {
            props.insert(key, value);
        }
        props
    }

    /// Base parameters plus the per-occurrence entries for this set: the
    /// child parameter names under `resolved_parent`, and any folded locator
    /// fields, inserted under their index-stripped names.
    fn build_properties(
        &self,
        target_field: Option<&str>,
        dynamic_fields: &[String],
        child_names: &[String],
        resolved_parent: Option<&str>,
    ) -> LinkProperties {
        let mut keys: Vec<String> = Vec::new();
        if let Some(parent) = resolved_parent.filter(|p| !p.is_empty()) {
            for child in child_names {
                keys.push(format!("{}.{}", parent, child));
            }
        }
        keys.extend(dynamic_fields.iter().cloned());

        let mut props = self.base_properties(target_field);
        self.add_entries(&mut props, &keys);
        props
    }

    /// Insert each key's bag value under its index-stripped name, `""` when
    /// the bag has no value, then substitute `{X}` values through the
    /// freshly added entries: `Id -> "{Items.Sku}"` becomes the resolved
    /// `Items.Sku` value.
    fn add_entries(&self, props: &mut LinkProperties, keys: &[String]) {
        let mut unindexed = Vec::new();
        for key in keys {
            let stripped = PropertyBag::strip_indices(key);
            let value = self.properties.value(key).unwrap_or("").to_string();
            props.insert(stripped.clone(), value);
            unindexed.push(stripped);
        }

        let mut replacements = Vec::new();
        for (key, value) in props.parameters() {
            let candidate = value.replace(['{', '}'], "");
            if unindexed.contains(&candidate) {
                let resolved = props.get(&candidate).unwrap_or("");
                let replaced = value.replace(&format!("{{{}}}", candidate), resolved);
                replacements.push((key.clone(), replaced));
            }
        }
        for (key, value) in replacements {
            props.insert(key, value);
        }
    }
}
