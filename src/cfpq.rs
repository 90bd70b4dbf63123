//! Context-free path queries
//!
//! Three interchangeable solvers over a graph and a grammar, selected by
//! [`CfpqAlgorithm`]; [`cfpq`] is the thin dispatcher. All three compute
//! the same relation `{(u, A, v)}` — "some `u → v` path derives from
//! `A`" — and the public result projects it onto the start nonterminal
//! filtered by the optional source/target sets.
//!
//! - **Hellings** — worklist fixed point over triples of the WCNF
//!   grammar. New facts from the inner scans collect into a delta that is
//!   merged after each scan, so the relation is never mutated while
//!   iterated.
//! - **Matrix** — one `|V| × |V|` boolean matrix per nonterminal,
//!   saturated with `M[A] ← M[A] + M[B]·M[C]` sweeps until no `nnz`
//!   moves.
//! - **Tensor** — intersect the grammar's recursive state machine with
//!   the graph, close, and write every accepting `(entry, exit)` pair
//!   back into the graph bundle under the entry's nonterminal; repeat to
//!   a fixed point. ε-derivations are seeded as graph self-loops for
//!   every nullable nonterminal.

#![forbid(unsafe_code)]
#![allow(missing_docs)]

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::debug;

use crate::automaton::{decode_product_index, MatrixAutomaton};
use crate::cfg::{Cfg, GrammarError, Terminal, Variable};
use crate::ecfg::Ecfg;
use crate::graph::{graph_to_eps_nfa, LabeledGraph};
use crate::matrix::DokMatrix;
use crate::nfa::{Label, Symbol};
use crate::rsm::ecfg_to_rsm;
use crate::Node;

/// CFPQ solver selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CfpqAlgorithm {
    Hellings,
    Matrix,
    Tensor,
}

/// Context-free path query.
///
/// Returns every pair `(u, v)` with a `u → v` path derivable from
/// `start_symbol`, restricted to the optional source/target sets (absent
/// sets default to every node). The grammar must contain `start_symbol`.
pub fn cfpq(
    algorithm: CfpqAlgorithm,
    graph: &LabeledGraph,
    cfg: &Cfg,
    starts: Option<&BTreeSet<Node>>,
    finals: Option<&BTreeSet<Node>>,
    start_symbol: &str,
) -> Result<BTreeSet<(Node, Node)>, GrammarError> {
    let start_symbol = Variable::from(start_symbol);
    if !cfg.contains_variable(&start_symbol) {
        return Err(GrammarError::InvalidStartSymbol(start_symbol));
    }
    let cfg = cfg.with_start(start_symbol.clone());
    if graph.node_count() == 0 {
        return Ok(BTreeSet::new());
    }

    let triples = match algorithm {
        CfpqAlgorithm::Hellings => hellings(&cfg, graph),
        CfpqAlgorithm::Matrix => matrix_solver(&cfg, graph),
        CfpqAlgorithm::Tensor => tensor_solver(&cfg, graph),
    };

    let start_filter: BTreeSet<Node> =
        starts.cloned().unwrap_or_else(|| graph.nodes().collect());
    let final_filter: BTreeSet<Node> =
        finals.cloned().unwrap_or_else(|| graph.nodes().collect());
    Ok(triples
        .into_iter()
        .filter(|(u, a, v)| {
            *a == start_symbol && start_filter.contains(u) && final_filter.contains(v)
        })
        .map(|(u, _, v)| (u, v))
        .collect())
}

// ============================================================================
// Hellings (worklist)
// ============================================================================

fn hellings(cfg: &Cfg, graph: &LabeledGraph) -> BTreeSet<(Node, Variable, Node)> {
    let wcnf = cfg.to_wcnf();
    let nullable = wcnf.nullable_heads();
    let term_prods = wcnf.term_prods();
    // (B, C) → heads X with X → B C.
    let mut heads_by_pair: BTreeMap<(Variable, Variable), Vec<Variable>> = BTreeMap::new();
    for (head, pairs) in wcnf.binary_prods() {
        for pair in pairs {
            heads_by_pair.entry(pair).or_default().push(head.clone());
        }
    }

    let mut relation: BTreeSet<(Node, Variable, Node)> = BTreeSet::new();
    for u in graph.nodes() {
        for a in &nullable {
            relation.insert((u, a.clone(), u));
        }
    }
    for (u, label, v) in graph.edges() {
        if let Some(sym) = label {
            let terminal = Terminal::new(sym.as_str());
            for (head, terminals) in &term_prods {
                if terminals.contains(&terminal) {
                    relation.insert((*u, head.clone(), *v));
                }
            }
        }
    }

    let mut worklist: VecDeque<(Node, Variable, Node)> = relation.iter().cloned().collect();
    while let Some((u, a, v)) = worklist.pop_front() {
        // Scan a snapshot of the relation; additions go to a delta merged
        // afterwards, never into the set being iterated.
        let mut delta: Vec<(Node, Variable, Node)> = Vec::new();
        for (w, b, x) in &relation {
            if *x == u {
                if let Some(heads) = heads_by_pair.get(&(b.clone(), a.clone())) {
                    for head in heads {
                        let fact = (*w, head.clone(), v);
                        if !relation.contains(&fact) {
                            delta.push(fact);
                        }
                    }
                }
            }
            if *w == v {
                if let Some(heads) = heads_by_pair.get(&(a.clone(), b.clone())) {
                    for head in heads {
                        let fact = (u, head.clone(), *x);
                        if !relation.contains(&fact) {
                            delta.push(fact);
                        }
                    }
                }
            }
        }
        for fact in delta {
            if relation.insert(fact.clone()) {
                worklist.push_back(fact);
            }
        }
    }
    debug!(facts = relation.len(), "worklist drained");
    relation
}

// ============================================================================
// Matrix (per-nonterminal fixed point)
// ============================================================================

fn matrix_solver(cfg: &Cfg, graph: &LabeledGraph) -> BTreeSet<(Node, Variable, Node)> {
    let wcnf = cfg.to_wcnf();
    let nodes: Vec<Node> = graph.nodes().collect();
    let index: BTreeMap<Node, usize> = nodes.iter().enumerate().map(|(i, n)| (*n, i)).collect();
    let n = nodes.len();

    let mut matrices: BTreeMap<Variable, DokMatrix> =
        wcnf.variables().iter().map(|v| (v.clone(), DokMatrix::new(n, n))).collect();
    for a in wcnf.nullable_heads() {
        let m = matrices.get_mut(&a).expect("nullable head is a grammar variable");
        for i in 0..n {
            m.set(i, i);
        }
    }
    let term_prods = wcnf.term_prods();
    for (u, label, v) in graph.edges() {
        if let Some(sym) = label {
            let terminal = Terminal::new(sym.as_str());
            for (head, terminals) in &term_prods {
                if terminals.contains(&terminal) {
                    matrices.get_mut(head).expect("head is a grammar variable").set(index[u], index[v]);
                }
            }
        }
    }

    let binary: Vec<(Variable, Variable, Variable)> = wcnf
        .binary_prods()
        .into_iter()
        .flat_map(|(head, pairs)| {
            pairs.into_iter().map(move |(b, c)| (head.clone(), b, c))
        })
        .collect();

    let mut sweeps = 0usize;
    loop {
        sweeps += 1;
        let before: usize = matrices.values().map(DokMatrix::nnz).sum();
        for (head, b, c) in &binary {
            let product = matrices[b].to_csr().multiply(&matrices[c].to_csr());
            matrices.get_mut(head).expect("head is a grammar variable").or_assign(&product.to_dok());
        }
        let after: usize = matrices.values().map(DokMatrix::nnz).sum();
        if before == after {
            break;
        }
    }
    debug!(sweeps, "matrix fixed point reached");

    matrices
        .into_iter()
        .flat_map(|(variable, m)| {
            let nodes = &nodes;
            m.iter()
                .map(move |(i, j)| (nodes[i], variable.clone(), nodes[j]))
                .collect::<Vec<_>>()
        })
        .collect()
}

// ============================================================================
// Tensor (RSM intersection)
// ============================================================================

fn tensor_solver(cfg: &Cfg, graph: &LabeledGraph) -> BTreeSet<(Node, Variable, Node)> {
    let rsm_bundle = ecfg_to_rsm(&Ecfg::from_cfg(cfg)).to_matrix_automaton();
    let mut graph_bundle = MatrixAutomaton::from_nfa(&graph_to_eps_nfa(graph, None, None));
    let n = graph_bundle.n_states();

    // ε-derivations enter the graph as self-loops under the nonterminal.
    for a in cfg.nullables() {
        let m = graph_bundle.matrix_mut(variable_label(&a));
        for i in 0..n {
            m.set(i, i);
        }
    }

    let rsm_starts = rsm_bundle.start_indices();
    let rsm_finals = rsm_bundle.final_indices();
    let mut rounds = 0usize;
    loop {
        rounds += 1;
        let product = rsm_bundle.intersect(&graph_bundle);
        let closure = product.transitive_closure();
        let mut grew = false;
        for (i, j) in closure.iter() {
            let (rsm_from, graph_from) = decode_product_index(n, i);
            let (rsm_to, graph_to) = decode_product_index(n, j);
            if rsm_starts.contains(&rsm_from) && rsm_finals.contains(&rsm_to) {
                let (variable, _) = rsm_bundle.state_at(rsm_from).clone();
                grew |= graph_bundle
                    .matrix_mut(variable_label(&variable))
                    .set(graph_from, graph_to);
            }
        }
        if !grew {
            break;
        }
    }
    debug!(rounds, "tensor fixed point reached");

    let mut triples = BTreeSet::new();
    for variable in cfg.variables() {
        if let Some(m) = graph_bundle.matrix(&variable_label(variable)) {
            for (i, j) in m.iter() {
                triples.insert((
                    *graph_bundle.state_at(i),
                    variable.clone(),
                    *graph_bundle.state_at(j),
                ));
            }
        }
    }
    triples
}

fn variable_label(variable: &Variable) -> Label {
    Label::Symbol(Symbol::from(variable.name()))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::build_two_cycles;
    use crate::rpq::rpq_tensor;

    const ALGORITHMS: [CfpqAlgorithm; 3] =
        [CfpqAlgorithm::Hellings, CfpqAlgorithm::Matrix, CfpqAlgorithm::Tensor];

    fn pair_set(pairs: &[(Node, Node)]) -> BTreeSet<(Node, Node)> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn balanced_brackets_on_two_cycles() {
        let graph = build_two_cycles(1, 1, ("a", "b"));
        let cfg = Cfg::from_text("S -> a b\nS -> a S b").unwrap();
        for algorithm in ALGORITHMS {
            let result = cfpq(algorithm, &graph, &cfg, None, None, "S").unwrap();
            assert_eq!(result, pair_set(&[(1, 2), (0, 0)]), "{algorithm:?}");
        }
    }

    #[test]
    fn nullable_grammar_on_two_cycles() {
        let graph = build_two_cycles(1, 1, ("a", "b"));
        let cfg = Cfg::from_text("S ->\nS -> a S b S\nS -> S S").unwrap();
        for algorithm in ALGORITHMS {
            let result = cfpq(algorithm, &graph, &cfg, None, None, "S").unwrap();
            assert_eq!(result, pair_set(&[(1, 1), (1, 2), (2, 2), (0, 0)]), "{algorithm:?}");
        }
    }

    #[test]
    fn right_linear_grammar_on_two_cycles() {
        let graph = build_two_cycles(1, 1, ("a", "b"));
        let cfg = Cfg::from_text("S -> b\nS -> b S").unwrap();
        for algorithm in ALGORITHMS {
            let result = cfpq(algorithm, &graph, &cfg, None, None, "S").unwrap();
            assert_eq!(result, pair_set(&[(0, 0), (0, 2), (2, 0), (2, 2)]), "{algorithm:?}");
        }
    }

    #[test]
    fn empty_graph_yields_empty_result() {
        let graph = LabeledGraph::new();
        let cfg = Cfg::from_text("S -> a b").unwrap();
        for algorithm in ALGORITHMS {
            assert!(cfpq(algorithm, &graph, &cfg, None, None, "S").unwrap().is_empty());
        }
    }

    #[test]
    fn empty_grammar_yields_empty_result() {
        let graph = build_two_cycles(1, 1, ("a", "b"));
        let cfg = Cfg::from_text("").unwrap();
        for algorithm in ALGORITHMS {
            assert!(cfpq(algorithm, &graph, &cfg, None, None, "S").unwrap().is_empty());
        }
    }

    #[test]
    fn missing_start_symbol_is_an_error() {
        let graph = build_two_cycles(1, 1, ("a", "b"));
        let cfg = Cfg::from_text("S -> a b").unwrap();
        let err = cfpq(CfpqAlgorithm::Hellings, &graph, &cfg, None, None, "Q").unwrap_err();
        assert!(matches!(err, GrammarError::InvalidStartSymbol(v) if v == Variable::from("Q")));
    }

    #[test]
    fn source_and_target_filters_restrict_the_result() {
        let graph = build_two_cycles(1, 1, ("a", "b"));
        let cfg = Cfg::from_text("S -> b\nS -> b S").unwrap();
        let starts = BTreeSet::from([0]);
        let finals = BTreeSet::from([2]);
        for algorithm in ALGORITHMS {
            let unfiltered = cfpq(algorithm, &graph, &cfg, None, None, "S").unwrap();
            let filtered =
                cfpq(algorithm, &graph, &cfg, Some(&starts), Some(&finals), "S").unwrap();
            let expected: BTreeSet<(Node, Node)> = unfiltered
                .into_iter()
                .filter(|(u, v)| starts.contains(u) && finals.contains(v))
                .collect();
            assert_eq!(filtered, expected, "{algorithm:?}");
        }
    }

    #[test]
    fn alternate_start_symbol_projects_a_different_nonterminal() {
        let graph = build_two_cycles(1, 1, ("a", "b"));
        let cfg = Cfg::from_text("S -> A\nA -> a").unwrap();
        for algorithm in ALGORITHMS {
            let via_a = cfpq(algorithm, &graph, &cfg, None, None, "A").unwrap();
            assert_eq!(via_a, pair_set(&[(0, 1), (1, 0)]), "{algorithm:?}");
        }
    }

    #[test]
    fn solvers_agree_pairwise_on_larger_cycles() {
        let graph = build_two_cycles(2, 3, ("a", "b"));
        let grammars = [
            "S -> a b\nS -> a S b",
            "S ->\nS -> a S b S\nS -> S S",
            "S -> a\nS -> S S",
        ];
        for text in grammars {
            let cfg = Cfg::from_text(text).unwrap();
            let hellings =
                cfpq(CfpqAlgorithm::Hellings, &graph, &cfg, None, None, "S").unwrap();
            let matrix = cfpq(CfpqAlgorithm::Matrix, &graph, &cfg, None, None, "S").unwrap();
            let tensor = cfpq(CfpqAlgorithm::Tensor, &graph, &cfg, None, None, "S").unwrap();
            assert_eq!(hellings, matrix, "grammar {text:?}");
            assert_eq!(matrix, tensor, "grammar {text:?}");
        }
    }

    #[test]
    fn regular_query_agrees_with_the_rpq_engine() {
        // "a b" as a right-linear grammar: S → a B, B → b.
        let graph = build_two_cycles(3, 2, ("a", "b"));
        let cfg = Cfg::from_text("S -> a B\nB -> b").unwrap();
        let via_rpq = rpq_tensor(&graph, "a b", None, None).unwrap();
        for algorithm in ALGORITHMS {
            let via_cfpq = cfpq(algorithm, &graph, &cfg, None, None, "S").unwrap();
            assert_eq!(via_cfpq, via_rpq, "{algorithm:?}");
        }
    }

    #[test]
    fn repeated_runs_are_deterministic() {
        let graph = build_two_cycles(2, 2, ("a", "b"));
        let cfg = Cfg::from_text("S -> a S b | a b").unwrap();
        let first = cfpq(CfpqAlgorithm::Tensor, &graph, &cfg, None, None, "S").unwrap();
        let second = cfpq(CfpqAlgorithm::Tensor, &graph, &cfg, None, None, "S").unwrap();
        assert_eq!(first, second);
    }
}
