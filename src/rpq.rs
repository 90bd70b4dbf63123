//! Regular path queries
//!
//! Two interchangeable solvers over the same inputs:
//!
//! - [`rpq_tensor`] — intersect the graph ε-NFA with the query's minimal
//!   DFA (Kronecker product), take the transitive closure, and read off
//!   the accepting pairs projected back onto the graph side.
//! - [`rpq_bfs`] — multi-source synchronous BFS on the direct sum
//!   `Q ⊕ G`, never materializing the `|V_Q|·|V_G|` product.
//!
//! ## BFS front encoding
//!
//! With `m` query states and `n` graph states, the front is a sparse
//! boolean matrix of `m` rows per BFS origin and `m + n` columns. Row `r`
//! means "the search is at query state `r mod m`": its query-side columns
//! carry the row identity (`front[r, r mod m] = 1`) and its graph-side
//! columns are the bitmask of graph states co-occupying that
//! configuration. Origins are stacked as one block per source
//! ([`RpqMode::FindReachableForEachStartNode`]) or merged into a single
//! union block ([`RpqMode::FindAllReachable`]).
//!
//! Each step multiplies the front by every shared direct-sum label
//! matrix; a nonzero landing in the query-side range names the
//! destination row, and the graph-side slice of its source row is OR-ed
//! into it. ε edges of the graph advance the graph side while the query
//! side holds still (identity block). The search stops when `nnz` of the
//! visited set stops growing; cells of the initial front are never
//! reported as results.

#![forbid(unsafe_code)]
#![allow(missing_docs)]

use std::collections::BTreeSet;

use tracing::debug;

use crate::automaton::{decode_product_index, MatrixAutomaton};
use crate::graph::{graph_to_eps_nfa, LabeledGraph};
use crate::matrix::{CsrMatrix, DokMatrix};
use crate::nfa::Label;
use crate::regex::{regex_to_min_dfa, RegexError};
use crate::Node;

/// What the multi-source BFS should report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RpqMode {
    /// One merged answer: every node reachable from any source.
    FindAllReachable,
    /// Origin-resolved answers: `(source, target)` pairs.
    FindReachableForEachStartNode,
}

/// Mode-shaped result of [`rpq_bfs`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BfsResult {
    Reachable(BTreeSet<Node>),
    Pairs(BTreeSet<(Node, Node)>),
}

/// Regular path query via Kronecker intersection and transitive closure.
///
/// Absent `starts`/`finals` default to every node. Returns all pairs
/// `(u, v)` such that some `u → v` path spells a word of the pattern.
pub fn rpq_tensor(
    graph: &LabeledGraph,
    pattern: &str,
    starts: Option<&BTreeSet<Node>>,
    finals: Option<&BTreeSet<Node>>,
) -> Result<BTreeSet<(Node, Node)>, RegexError> {
    let query = MatrixAutomaton::from_nfa(&regex_to_min_dfa(pattern)?.to_nfa());
    let graph_bundle = MatrixAutomaton::from_nfa(&graph_to_eps_nfa(graph, starts, finals));
    if graph_bundle.n_states() == 0 {
        return Ok(BTreeSet::new());
    }

    let product = graph_bundle.intersect(&query);
    let closure = product.transitive_closure();
    let start_indices = product.start_indices();
    let final_indices = product.final_indices();
    let m = query.n_states();

    let mut pairs = BTreeSet::new();
    for (i, j) in closure.iter() {
        if start_indices.contains(&i) && final_indices.contains(&j) {
            let (from, _) = decode_product_index(m, i);
            let (to, _) = decode_product_index(m, j);
            pairs.insert((*graph_bundle.state_at(from), *graph_bundle.state_at(to)));
        }
    }
    Ok(pairs)
}

/// Regular path query via multi-source synchronous BFS on `Q ⊕ G`.
pub fn rpq_bfs(
    graph: &LabeledGraph,
    pattern: &str,
    mode: RpqMode,
    starts: Option<&BTreeSet<Node>>,
    finals: Option<&BTreeSet<Node>>,
) -> Result<BfsResult, RegexError> {
    let query = MatrixAutomaton::from_nfa(&regex_to_min_dfa(pattern)?.to_nfa());
    let graph_bundle = MatrixAutomaton::from_nfa(&graph_to_eps_nfa(graph, starts, finals));

    let m = query.n_states();
    let n = graph_bundle.n_states();
    let sources: Vec<usize> = graph_bundle.start_indices().into_iter().collect();
    let per_source = matches!(mode, RpqMode::FindReachableForEachStartNode);
    let blocks = if per_source { sources.len() } else { 1 };
    if n == 0 || sources.is_empty() {
        return Ok(empty_result(mode));
    }

    // Direct-sum step matrices over shared labels, plus the ε block whose
    // query side is the identity: ε moves the graph and holds the query.
    let mut step_matrices: Vec<CsrMatrix> = Vec::new();
    for label in query.labels() {
        if let Some(graph_matrix) = graph_bundle.matrix(label) {
            let query_matrix = query.matrix(label).expect("label taken from the query bundle");
            step_matrices.push(query_matrix.to_csr().block_diag(&graph_matrix.to_csr()));
        }
    }
    if let Some(eps) = graph_bundle.matrix(&Label::Epsilon) {
        step_matrices.push(CsrMatrix::identity(m).block_diag(&eps.to_csr()));
    }

    let query_starts = query.start_indices();
    let mut init = DokMatrix::new(blocks * m, m + n);
    if per_source {
        for (block, &src) in sources.iter().enumerate() {
            for &q0 in &query_starts {
                init.set(block * m + q0, q0);
                init.set(block * m + q0, m + src);
            }
        }
    } else {
        for &q0 in &query_starts {
            init.set(q0, q0);
            for &src in &sources {
                init.set(q0, m + src);
            }
        }
    }

    let mut visited = init.clone();
    let mut front = init.clone();
    let mut rounds = 0usize;
    loop {
        rounds += 1;
        let front_csr = front.to_csr();
        let mut discovered = DokMatrix::new(blocks * m, m + n);
        for matrix in &step_matrices {
            let stepped = front_csr.multiply(matrix);
            for i in 0..stepped.rows() {
                let row = stepped.row(i);
                let split = row.partition_point(|&c| c < m);
                let (query_hits, graph_hits) = row.split_at(split);
                for &j in query_hits {
                    // The query moved to state j: land on the row of the
                    // same origin block and drag the graph slice along.
                    let dest = (i / m) * m + j;
                    discovered.set(dest, j);
                    for &c in graph_hits {
                        discovered.set(dest, c);
                    }
                }
            }
        }

        let mut next_front = DokMatrix::new(blocks * m, m + n);
        let mut grew = false;
        for (i, j) in discovered.iter() {
            if visited.set(i, j) {
                grew = true;
                if j >= m {
                    next_front.set(i, i % m);
                    next_front.set(i, j);
                }
            }
        }
        if !grew {
            break;
        }
        front = next_front;
    }
    debug!(rounds, visited = visited.nnz(), "synchronous BFS reached fixed point");

    let query_finals = query.final_indices();
    let graph_finals = graph_bundle.final_indices();
    let mut reachable = BTreeSet::new();
    let mut pairs = BTreeSet::new();
    for (i, j) in visited.iter() {
        if j < m || init.get(i, j) {
            continue;
        }
        let graph_state = j - m;
        if query_finals.contains(&(i % m)) && graph_finals.contains(&graph_state) {
            let target = *graph_bundle.state_at(graph_state);
            if per_source {
                pairs.insert((*graph_bundle.state_at(sources[i / m]), target));
            } else {
                reachable.insert(target);
            }
        }
    }
    Ok(if per_source { BfsResult::Pairs(pairs) } else { BfsResult::Reachable(reachable) })
}

fn empty_result(mode: RpqMode) -> BfsResult {
    match mode {
        RpqMode::FindAllReachable => BfsResult::Reachable(BTreeSet::new()),
        RpqMode::FindReachableForEachStartNode => BfsResult::Pairs(BTreeSet::new()),
    }
}

// ============================================================================
// Tests
// ============================================================================
