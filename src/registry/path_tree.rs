//! Request-path dispatch tree
//!
//! A segment trie from registered path patterns to the method-to-state
//! bindings at each path. Template segments (`{noteId}`) match any one
//! concrete segment; literal segments win over template ones when both
//! could match.

use std::collections::BTreeMap;

#[derive(Debug, Default)]
struct Node {
    children: BTreeMap<String, Node>,
    template: Option<Box<Node>>,
    /// Method to state name bound at this exact path.
    bindings: BTreeMap<String, String>,
}

fn is_template(segment: &str) -> bool {
    segment.starts_with('{') && segment.ends_with('}')
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Dispatch structure mapping request paths to the states answering them.
#[derive(Debug, Default)]
pub struct PathTree {
    root: Node,
}

impl PathTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `method` at `path` to a state name. Re-binding the same method
    /// and path replaces the previous state.
    pub fn put(&mut self, path: &str, method: impl Into<String>, state: impl Into<String>) {
        let mut node = &mut self.root;
        for segment in segments(path) {
            node = if is_template(segment) {
                node.template.get_or_insert_with(Box::default)
            } else {
                node.children.entry(segment.to_string()).or_default()
            };
        }
        node.bindings.insert(method.into(), state.into());
    }

    /// The method-to-state bindings at a request path, or `None` when no
    /// registered pattern matches.
    pub fn get(&self, path: &str) -> Option<&BTreeMap<String, String>> {
        let segments: Vec<&str> = segments(path).collect();
        let node = match_node(&self.root, &segments)?;
        if node.bindings.is_empty() {
            None
        } else {
            Some(&node.bindings)
        }
    }

    /// The state name bound to one method at a request path.
    pub fn state_for(&self, method: &str, path: &str) -> Option<&str> {
        self.get(path)
            .and_then(|bindings| bindings.get(method))
            .map(String::as_str)
    }
}

/// Literal-first descent with backtracking into the template branch, so a
/// partially matching literal prefix cannot shadow a template match.
fn match_node<'a>(node: &'a Node, segments: &[&str]) -> Option<&'a Node> {
    let Some((first, rest)) = segments.split_first() else {
        return Some(node);
    };
    if let Some(child) = node.children.get(*first)
        && let Some(found) = match_node(child, rest)
        && !found.bindings.is_empty()
    {
        return Some(found);
    }
    node.template
        .as_deref()
        .and_then(|child| match_node(child, rest))
}
