//! Labeled multigraphs and graph I/O
//!
//! [`LabeledGraph`] is the query-side input of every solver: a directed
//! multigraph whose edges carry string labels. An empty label is the one
//! and only source of ε in the system — [`graph_to_eps_nfa`] maps it to
//! [`Label::Epsilon`] and performs **no** ε-closure; the solvers decide
//! what ε means to them.
//!
//! Also here: the CSV edge-list loader (`source,label,target` records),
//! a DOT writer, the labeled-two-cycles builder used throughout the test
//! suite, and a serializable [`GraphInfo`] summary.

#![forbid(unsafe_code)]
#![allow(missing_docs)]

use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::nfa::{Label, Nfa, Symbol};
use crate::Node;

/// Errors from the graph loader.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("failed to read graph: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed edge list: {0}")]
    Csv(#[from] csv::Error),
    #[error("record {record}: expected `source,label,target`, got {fields} fields")]
    BadShape { record: usize, fields: usize },
    #[error("record {record}: node id {value:?} is not an unsigned integer")]
    BadNode { record: usize, value: String },
}

/// Directed multigraph with labeled edges.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabeledGraph {
    nodes: BTreeSet<Node>,
    edges: Vec<(Node, Option<Symbol>, Node)>,
}

/// Shape summary of a graph.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GraphInfo {
    pub nodes: usize,
    pub edges: usize,
    pub labels: BTreeSet<String>,
}

impl LabeledGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node without edges.
    pub fn add_node(&mut self, node: Node) {
        self.nodes.insert(node);
    }

    /// Insert an edge; the empty label means ε.
    pub fn add_edge(&mut self, from: Node, label: &str, to: Node) {
        self.nodes.insert(from);
        self.nodes.insert(to);
        let label = if label.is_empty() { None } else { Some(Symbol::from(label)) };
        self.edges.push((from, label, to));
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = Node> + '_ {
        self.nodes.iter().copied()
    }

    #[inline]
    pub fn edges(&self) -> &[(Node, Option<Symbol>, Node)] {
        &self.edges
    }

    pub fn info(&self) -> GraphInfo {
        GraphInfo {
            nodes: self.nodes.len(),
            edges: self.edges.len(),
            labels: self
                .edges
                .iter()
                .filter_map(|(_, l, _)| l.as_ref().map(|s| s.as_str().to_owned()))
                .collect(),
        }
    }
}

/// Interpret a graph as an ε-NFA.
///
/// Absent `starts`/`finals` default to **every** node. No ε-closure is
/// performed; empty labels become real ε transitions.
pub fn graph_to_eps_nfa(
    graph: &LabeledGraph,
    starts: Option<&BTreeSet<Node>>,
    finals: Option<&BTreeSet<Node>>,
) -> Nfa<Node> {
    let mut nfa = Nfa::new();
    for (from, label, to) in graph.edges() {
        let label = match label {
            None => Label::Epsilon,
            Some(sym) => Label::Symbol(sym.clone()),
        };
        nfa.add_transition(*from, label, *to);
    }
    match starts {
        Some(set) => set.iter().for_each(|&n| nfa.add_start(n)),
        None => graph.nodes().for_each(|n| nfa.add_start(n)),
    }
    match finals {
        Some(set) => set.iter().for_each(|&n| nfa.add_final(n)),
        None => graph.nodes().for_each(|n| nfa.add_final(n)),
    }
    nfa
}

/// Two cycles sharing node 0: the first over nodes `0..=n` labeled
/// `labels.0`, the second over `0, n+1, ..., n+m` labeled `labels.1`.
pub fn build_two_cycles(n: usize, m: usize, labels: (&str, &str)) -> LabeledGraph {
    assert!(n >= 1 && m >= 1, "each cycle needs at least one non-shared node");
    let mut graph = LabeledGraph::new();
    for i in 0..n {
        graph.add_edge(i as Node, labels.0, (i + 1) as Node);
    }
    graph.add_edge(n as Node, labels.0, 0);
    graph.add_edge(0, labels.1, (n + 1) as Node);
    for i in n + 1..n + m {
        graph.add_edge(i as Node, labels.1, (i + 1) as Node);
    }
    graph.add_edge((n + m) as Node, labels.1, 0);
    graph
}

/// Load a graph from a headerless CSV edge list `source,label,target`.
/// An empty label field produces an ε edge.
pub fn load_graph_csv(path: impl AsRef<Path>) -> Result<LabeledGraph, GraphError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path.as_ref())?;
    let mut graph = LabeledGraph::new();
    for (record, row) in reader.records().enumerate() {
        let row = row?;
        if row.len() != 3 {
            return Err(GraphError::BadShape { record, fields: row.len() });
        }
        let parse = |value: &str| {
            value.trim().parse::<Node>().map_err(|_| GraphError::BadNode {
                record,
                value: value.to_owned(),
            })
        };
        let from = parse(&row[0])?;
        let to = parse(&row[2])?;
        graph.add_edge(from, row[1].trim(), to);
    }
    Ok(graph)
}

/// Write the graph in DOT format.
pub fn save_graph_dot(graph: &LabeledGraph, out: &mut impl Write) -> std::io::Result<()> {
    writeln!(out, "digraph {{")?;
    for node in graph.nodes() {
        writeln!(out, "    {node};")?;
    }
    for (from, label, to) in graph.edges() {
        match label {
            Some(sym) => writeln!(out, "    {from} -> {to} [label=\"{sym}\"];")?,
            None => writeln!(out, "    {from} -> {to};")?,
        }
    }
    writeln!(out, "}}")
}

// ============================================================================
// Tests
// ============================================================================
