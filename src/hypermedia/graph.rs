//! Graph projection and structural validation
//!
//! Projects a [`ResourceStateMachine`] onto a petgraph structure for
//! topology queries, DOT export, and the structural checks a model author
//! runs before deploying a graph.

use crate::hypermedia::machine::ResourceStateMachine;
use crate::hypermedia::resolver::LinkFieldResolver;
use crate::hypermedia::state::{ResourceState, StateId, StateKind};
use crate::hypermedia::transition::Transition;
use petgraph::stable_graph::{NodeIndex, StableGraph};
use petgraph::Direction;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// A petgraph view of a machine's registered states and transitions.
pub struct MachineGraph {
    /// Nodes are resource states, edges the transitions between them.
    pub graph: StableGraph<ResourceState, Transition>,

    /// Canonical state identity to internal graph index. Keeps node lookup
    /// O(1) while the graph is being assembled and queried.
    pub state_index: HashMap<StateId, NodeIndex>,
}

impl MachineGraph {
    pub fn from_machine(machine: &ResourceStateMachine) -> Self {
        let mut graph = StableGraph::new();
        let mut state_index = HashMap::new();

        for state in machine.registered_states() {
            let idx = graph.add_node(state.clone());
            state_index.insert(state.id(), idx);
        }
        for state in machine.registered_states() {
            for transition in state.transitions() {
                if let (Some(&from), Some(&to)) = (
                    state_index.get(&state.id()),
                    state_index.get(&transition.target_id()),
                ) {
                    graph.add_edge(from, to, transition.clone());
                }
            }
        }

        Self { graph, state_index }
    }

    /// States with no inbound transitions.
    pub fn find_entry_states(&self) -> Vec<&ResourceState> {
        self.graph
            .node_indices()
            .filter(|&idx| self.graph.edges_directed(idx, Direction::Incoming).count() == 0)
            .filter_map(|idx| self.graph.node_weight(idx))
            .collect()
    }

    /// States with no outbound transitions.
    pub fn find_terminal_states(&self) -> Vec<&ResourceState> {
        self.graph
            .node_indices()
            .filter(|&idx| self.graph.edges_directed(idx, Direction::Outgoing).count() == 0)
            .filter_map(|idx| self.graph.node_weight(idx))
            .collect()
    }

    pub fn has_cycles(&self) -> bool {
        petgraph::algo::is_cyclic_directed(&self.graph)
    }

    pub fn stats(&self) -> GraphStats {
        let states = self
            .graph
            .node_indices()
            .filter_map(|idx| self.graph.node_weight(idx));
        let mut pseudo_final = 0;
        let mut collections = 0;
        let mut dynamic = 0;
        for state in states {
            match state.kind() {
                StateKind::PseudoFinal => pseudo_final += 1,
                StateKind::Collection => collections += 1,
                StateKind::Dynamic(_) => dynamic += 1,
                StateKind::Plain => {}
            }
        }
        GraphStats {
            total_states: self.graph.node_count(),
            total_transitions: self.graph.edge_count(),
            pseudo_final,
            collections,
            dynamic,
            has_cycles: self.has_cycles(),
        }
    }

    /// Export to DOT format for Graphviz.
    pub fn to_dot(&self, machine: &ResourceStateMachine) -> String {
        let initial = machine.initial().id();
        let mut dot = "digraph ResourceStateMachine {\n".to_string();
        dot.push_str("  rankdir=LR;\n");
        dot.push_str("  node [shape=box, style=filled];\n\n");

        let mut ids: Vec<&StateId> = self.state_index.keys().collect();
        ids.sort();
        for state_id in ids {
            let Some(&idx) = self.state_index.get(state_id) else {
                continue;
            };
            if let Some(state) = self.graph.node_weight(idx) {
                let color = if state.id() == initial {
                    "lightgreen"
                } else {
                    kind_color(state.kind())
                };
                let label = match state.effective_path() {
                    Some(path) => format!("{}\\n{}", state_id, path.pattern()),
                    None => state_id.to_string(),
                };
                dot.push_str(&format!(
                    "  \"{}\" [label=\"{}\", fillcolor=\"{}\"];\n",
                    sanitize(state_id),
                    label,
                    color
                ));
            }
        }

        dot.push('\n');

        let mut edges: Vec<String> = Vec::new();
        for edge_idx in self.graph.edge_indices() {
            if let Some((from_idx, to_idx)) = self.graph.edge_endpoints(edge_idx)
                && let (Some(from_state), Some(to_state), Some(transition)) = (
                    self.graph.node_weight(from_idx),
                    self.graph.node_weight(to_idx),
                    self.graph.edge_weight(edge_idx),
                )
            {
                let method = transition.method().unwrap_or("auto");
                let label = match transition.label() {
                    Some(text) => format!("{} ({})", method, text),
                    None => method.to_string(),
                };
                edges.push(format!(
                    "  \"{}\" -> \"{}\" [label=\"{}\"];\n",
                    sanitize(&from_state.id()),
                    sanitize(&to_state.id()),
                    label
                ));
            }
        }
        edges.sort();
        for edge in edges {
            dot.push_str(&edge);
        }

        dot.push_str("}\n");
        dot
    }
}

fn sanitize(id: &str) -> String {
    id.replace(['.', '>', ' ', '{', '}'], "_")
}

fn kind_color(kind: &StateKind) -> &'static str {
    match kind {
        StateKind::Plain => "lightyellow",
        StateKind::Collection => "lightblue",
        StateKind::PseudoFinal => "lightcoral",
        StateKind::Dynamic(_) => "plum",
    }
}

#[derive(Debug, Clone)]
pub struct GraphStats {
    pub total_states: usize,
    pub total_transitions: usize,
    pub pseudo_final: usize,
    pub collections: usize,
    pub dynamic: usize,
    pub has_cycles: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Finding {
    pub severity: Severity,
    pub message: String,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)
    }
}

/// Result of the structural checks over one machine.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub findings: Vec<Finding>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Warning)
            .count()
    }

    fn error(&mut self, message: String) {
        self.findings.push(Finding {
            severity: Severity::Error,
            message,
        });
    }

    fn warning(&mut self, message: String) {
        self.findings.push(Finding {
            severity: Severity::Warning,
            message,
        });
    }
}

/// Run the structural checks: unreachable states, dead ends that are not
/// declared outcomes, collection linkage without a target field, and
/// transitions whose canonical ids collide.
pub fn validate(machine: &ResourceStateMachine) -> ValidationReport {
    let mut report = ValidationReport::default();
    let graph = MachineGraph::from_machine(machine);

    let reachable: Vec<StateId> = machine.all_states().iter().map(|s| s.id()).collect();
    for state in machine.registered_states() {
        if !reachable.contains(&state.id()) {
            report.warning(format!(
                "state {} is not reachable from {}",
                state.id(),
                machine.initial().id()
            ));
        }
    }

    for state in graph.find_terminal_states() {
        if !state.is_pseudo_final() && state.id() != machine.initial().id() {
            report.warning(format!(
                "state {} has no outbound transitions and is not a final outcome",
                state.id()
            ));
        }
    }

    let mut id_counts: BTreeMap<String, usize> = BTreeMap::new();
    for state in machine.registered_states() {
        for transition in state.transitions() {
            *id_counts.entry(transition.id()).or_default() += 1;

            let Some(target) = machine.state(&transition.target_id()) else {
                continue;
            };
            let has_collection_linkage =
                !LinkFieldResolver::collection_params_of(transition, target).is_empty()
                    || LinkFieldResolver::has_dynamic_collection_arg(target);
            if has_collection_linkage && transition.target_field().is_none() {
                report.error(format!(
                    "transition {} uses collection parameters but declares no target field; \
                     links will be skipped at runtime",
                    transition.id()
                ));
            }
        }
    }
    for (id, count) in id_counts {
        if count > 1 {
            report.warning(format!(
                "{} transitions share the canonical id {}; only the last is addressable by id",
                count, id
            ));
        }
    }

    report
}
