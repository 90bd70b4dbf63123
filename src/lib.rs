//! Crate root: public surface, core aliases, and engine-wide invariants
//!
//! `pathlang` answers **reachability queries over labeled directed
//! multigraphs** where the accepting language of a path is constrained by
//! a regular expression (RPQ) or a context-free grammar (CFPQ). Given a
//! graph, a query, and optional source/target sets, the engine returns
//! every pair `(u, v)` such that some `u → v` path spells a word of the
//! query language.
//!
//! ## Invariants
//!
//! - **Boolean semiring.** All matrix arithmetic is `⟨{0,1}, OR, AND⟩`;
//!   overflow is impossible and `nnz` equality is the one fixed-point
//!   witness used everywhere.
//! - **Purity.** Every solver is a pure function of
//!   `(graph, query, starts, finals)`: no I/O inside solver bodies, no
//!   process-wide mutable state, byte-identical result sets on repeated
//!   invocation. We **forbid unsafe** throughout the crate.
//! - **Tagged product states.** Intersections keep `(left, right)` state
//!   pairs at index `idx_left · |right| + idx_right`;
//!   [`automaton::decode_product_index`] always divides by the width of
//!   the *right* operand.
//! - **ε discipline.** Empty edge labels are the only source of ε. The
//!   graph adapter stores ε as a real label and performs no closure; each
//!   solver decides what ε means to it.
//!
//! If an invariant is violated at runtime the failure mode is a precise
//! error (parsing) or a panic with a shape message (kernel misuse), never
//! silent corruption.

#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms)]

/// Sparse boolean-matrix kernel (DOK build form, CSR read form).
pub mod matrix;
/// ε-NFAs, transition labels, and the symbol alphabet.
pub mod nfa;
/// DFAs, subset construction, minimization.
pub mod dfa;
/// Regex AST, parser, Thompson construction, `regex_to_min_dfa`.
pub mod regex;
/// Automaton-as-matrices bundle: intersection, direct sum, closure.
pub mod automaton;
/// Labeled multigraphs, the graph→ε-NFA adapter, and graph I/O.
pub mod graph;
/// Context-free grammars and Weak Chomsky Normal Form.
pub mod cfg;
/// Extended grammars: one regex per nonterminal.
pub mod ecfg;
/// Recursive state machines (one DFA box per nonterminal).
pub mod rsm;
/// Regular path queries (tensor and multi-source BFS solvers).
pub mod rpq;
/// Context-free path queries (Hellings, matrix, tensor solvers).
pub mod cfpq;

// ============================================================================
// Canonical aliases and root-level re-exports
// ============================================================================

/// Graph node identity used across the crate.
pub type Node = u64;

pub use crate::automaton::{decode_product_index, MatrixAutomaton, SumState};
pub use crate::cfg::{Cfg, GrammarError, Variable};
pub use crate::cfpq::{cfpq, CfpqAlgorithm};
pub use crate::dfa::Dfa;
pub use crate::ecfg::Ecfg;
pub use crate::graph::{
    build_two_cycles, graph_to_eps_nfa, load_graph_csv, save_graph_dot, GraphError, GraphInfo,
    LabeledGraph,
};
pub use crate::matrix::{CsrMatrix, DokMatrix};
pub use crate::nfa::{Label, Nfa, Symbol};
pub use crate::regex::{regex_to_min_dfa, Regex, RegexError};
pub use crate::rpq::{rpq_bfs, rpq_tensor, BfsResult, RpqMode};
pub use crate::rsm::{ecfg_to_rsm, Rsm};
