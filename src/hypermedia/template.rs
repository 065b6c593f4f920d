//! URI path templates
//!
//! Templates are the addressing half of the state graph: every concrete
//! resource state owns one, and link resolution is ultimately the act of
//! binding parameter values into one of these.

use crate::error::{Error, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Matches a `{name}` placeholder inside a template pattern.
const PLACEHOLDER_PATTERN: &str = r"\{([A-Za-z0-9_]+)\}";

/// A URI path template with named placeholders, e.g. `/notes/{id}/reviewers`.
///
/// A purely numeric placeholder name (`{0}`) plays the positional role.
/// Templates compare, hash and order by their pattern string so they can be
/// used as index keys.
#[derive(Debug, Clone)]
pub struct PathTemplate {
    pattern: String,
    parameters: Vec<String>,
    matcher: Regex,
}

impl PathTemplate {
    /// Compile a template from its pattern string.
    pub fn new(pattern: impl Into<String>) -> Result<Self> {
        let pattern = pattern.into();
        let placeholder = Regex::new(PLACEHOLDER_PATTERN).expect("valid placeholder pattern");

        // Reject stray braces that are not part of a well-formed placeholder
        let stripped = placeholder.replace_all(&pattern, "");
        if stripped.contains('{') || stripped.contains('}') {
            return Err(Error::template(format!(
                "unbalanced braces in template '{}'",
                pattern
            )));
        }

        let mut parameters = Vec::new();
        let mut matcher = String::from("^");
        let mut last = 0;
        for caps in placeholder.captures_iter(&pattern) {
            let whole = caps.get(0).expect("capture 0 always present");
            matcher.push_str(&regex::escape(&pattern[last..whole.start()]));
            matcher.push_str("([^/]+)");
            parameters.push(caps[1].to_string());
            last = whole.end();
        }
        matcher.push_str(&regex::escape(&pattern[last..]));
        matcher.push('$');

        let matcher = Regex::new(&matcher)
            .map_err(|e| Error::template(format!("cannot compile '{}': {}", pattern, e)))?;

        Ok(Self {
            pattern,
            parameters,
            matcher,
        })
    }

    /// The raw pattern string, e.g. `/notes/{id}`.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Placeholder names in order of appearance.
    pub fn parameter_names(&self) -> &[String] {
        &self.parameters
    }

    /// Whether the template carries any placeholder at all.
    pub fn has_parameters(&self) -> bool {
        !self.parameters.is_empty()
    }

    /// Check whether a concrete request path matches this template.
    pub fn matches(&self, path: &str) -> bool {
        self.matcher.is_match(path)
    }

    /// Extract path-parameter bindings from a matching concrete path.
    ///
    /// Returns `None` when the path does not match the template.
    pub fn extract(&self, path: &str) -> Option<BTreeMap<String, String>> {
        let caps = self.matcher.captures(path)?;
        let mut bindings = BTreeMap::new();
        for (i, name) in self.parameters.iter().enumerate() {
            if let Some(m) = caps.get(i + 1) {
                bindings.insert(name.clone(), m.as_str().to_string());
            }
        }
        Some(bindings)
    }

    /// Substitute parameter values into the template.
    ///
    /// Placeholders with no binding stay in the output verbatim; callers that
    /// care can check the result with [`PathTemplate::has_unresolved`].
    pub fn bind(&self, params: &BTreeMap<String, String>) -> String {
        let mut out = self.pattern.clone();
        for name in &self.parameters {
            if let Some(value) = params.get(name) {
                out = out.replace(&format!("{{{}}}", name), value);
            }
        }
        out
    }

    /// Whether a bound path still contains placeholder syntax.
    pub fn has_unresolved(path: &str) -> bool {
        path.contains('{')
    }

    /// Append a relative pattern, producing a child template.
    ///
    /// `/entity` joined with `/draft` yields `/entity/draft`.
    pub fn join(&self, relative: &str) -> Result<Self> {
        let mut pattern = self.pattern.trim_end_matches('/').to_string();
        if !relative.starts_with('/') {
            pattern.push('/');
        }
        pattern.push_str(relative);
        Self::new(pattern)
    }
}

impl PartialEq for PathTemplate {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

impl Eq for PathTemplate {}

impl PartialOrd for PathTemplate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PathTemplate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.pattern.cmp(&other.pattern)
    }
}

impl std::hash::Hash for PathTemplate {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.pattern.hash(state);
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.pattern)
    }
}

impl FromStr for PathTemplate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}
