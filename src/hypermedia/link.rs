//! Hypermedia links
//!
//! The output side of the engine: a [`Link`] is one advertised transition,
//! ready for serialization into a response body. [`LinkProperties`] is the
//! per-link parameter set the resolver computes before hrefs are bound.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// One hypermedia link advertised to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    /// Canonical transition id this link was produced from.
    pub id: String,
    /// Link relation, `"self"` for self-links, otherwise the target state's
    /// relation string.
    pub rel: String,
    /// Fully bound URI, base URI included. Placeholders that could not be
    /// filled remain verbatim.
    pub href: String,
    /// HTTP method the client uses to follow the link.
    pub method: String,
}

impl Link {
    pub fn new(
        id: impl Into<String>,
        rel: impl Into<String>,
        href: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            rel: rel.into(),
            href: href.into(),
            method: method.into(),
        }
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} rel={} [{}]", self.method, self.href, self.rel, self.id)
    }
}

/// The parameter set for one link occurrence, produced by the resolver
/// before the target path is bound.
///
/// Keys are path parameter names and spare entity property names with
/// collection indices stripped; values are resolved property values, with
/// `""` standing in for properties absent from the payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkProperties {
    target_field: Option<String>,
    parameters: BTreeMap<String, String>,
}

impl LinkProperties {
    pub fn new() -> Self {
        Self::default()
    }

    /// The fully qualified (indexed) entity field this occurrence binds to,
    /// e.g. `"Items(1).Sku"`. `None` for links with no collection linkage.
    pub fn target_field(&self) -> Option<&str> {
        self.target_field.as_deref()
    }

    pub fn set_target_field(&mut self, field: impl Into<String>) {
        self.target_field = Some(field.into());
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.parameters.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }

    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}
