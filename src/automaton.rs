//! Automaton-as-Matrices Bundle
//!
//! [`MatrixAutomaton`] stores a finite automaton as one sparse boolean
//! adjacency matrix per transition label, plus start/final state sets and
//! a dense `state ↔ index` map. Every solver in this crate consumes and
//! produces bundles; the matrix kernel does all the arithmetic.
//!
//! ## Invariants
//!
//! - `index` is injective onto `[0, n)` and `states` is its exact
//!   inverse; both are fixed at construction.
//! - Every start/final state is a key of `index`.
//! - An absent label key denotes the zero matrix.
//! - Product states are *tagged pairs* `(left, right)` living at index
//!   `idx_left · |right| + idx_right`; [`decode_product_index`] is the one
//!   place that arithmetic is undone. Decoding always divides by the width
//!   of the **right** operand.
//!
//! Bundles are immutable after construction with one sanctioned
//! exception: the CFPQ solvers grow per-nonterminal matrices through
//! [`MatrixAutomaton::matrix_mut`] until their fixed point is reached.

#![forbid(unsafe_code)]
#![allow(missing_docs)]

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::Hash;

use itertools::Itertools;

use crate::matrix::{self, CsrMatrix, DokMatrix};
use crate::nfa::{Label, Nfa};

/// A state of a direct sum: either from the left or the right operand.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SumState<S, T> {
    Left(S),
    Right(T),
}

/// Split a product index into `(left, right)` component indices.
///
/// `n_right` is the state count of the **right** intersection operand
/// (the graph side in the CFPQ tensor solver, the query side in RPQ).
#[inline]
pub fn decode_product_index(n_right: usize, i: usize) -> (usize, usize) {
    (i / n_right, i % n_right)
}

/// Boolean adjacency matrices of an automaton, one per label.
#[derive(Clone, Debug)]
pub struct MatrixAutomaton<S> {
    index: HashMap<S, usize>,
    states: Vec<S>,
    starts: HashSet<S>,
    finals: HashSet<S>,
    matrices: BTreeMap<Label, DokMatrix>,
}

impl<S: Clone + Eq + Hash + Ord> MatrixAutomaton<S> {
    fn from_parts(states: Vec<S>, starts: HashSet<S>, finals: HashSet<S>) -> Self {
        let index = states.iter().enumerate().map(|(i, s)| (s.clone(), i)).collect();
        Self { index, states, starts, finals, matrices: BTreeMap::new() }
    }

    /// Build from an ε-NFA: dense indices in state iteration order, one
    /// matrix per label (ε included when present).
    pub fn from_nfa(nfa: &Nfa<S>) -> Self {
        let states: Vec<S> = nfa.states().into_iter().collect();
        let mut bundle = Self::from_parts(
            states,
            nfa.starts().iter().cloned().collect(),
            nfa.finals().iter().cloned().collect(),
        );
        let n = bundle.states.len();
        for (from, label, to) in nfa.transitions() {
            let matrix = bundle
                .matrices
                .entry(label.clone())
                .or_insert_with(|| DokMatrix::new(n, n));
            matrix.set(bundle.index[from], bundle.index[to]);
        }
        bundle
    }

    /// Inverse of [`MatrixAutomaton::from_nfa`].
    pub fn to_nfa(&self) -> Nfa<S> {
        let mut nfa = Nfa::new();
        for (label, matrix) in &self.matrices {
            for (i, j) in matrix.iter() {
                nfa.add_transition(self.states[i].clone(), label.clone(), self.states[j].clone());
            }
        }
        for s in &self.starts {
            nfa.add_start(s.clone());
        }
        for s in &self.finals {
            nfa.add_final(s.clone());
        }
        nfa
    }

    #[inline]
    pub fn n_states(&self) -> usize {
        self.states.len()
    }

    #[inline]
    pub fn state_at(&self, i: usize) -> &S {
        &self.states[i]
    }

    #[inline]
    pub fn index_of(&self, state: &S) -> Option<usize> {
        self.index.get(state).copied()
    }

    pub fn starts(&self) -> &HashSet<S> {
        &self.starts
    }

    pub fn finals(&self) -> &HashSet<S> {
        &self.finals
    }

    /// Dense indices of the start states.
    pub fn start_indices(&self) -> BTreeSet<usize> {
        self.starts.iter().map(|s| self.index[s]).collect()
    }

    /// Dense indices of the final states.
    pub fn final_indices(&self) -> BTreeSet<usize> {
        self.finals.iter().map(|s| self.index[s]).collect()
    }

    pub fn labels(&self) -> impl Iterator<Item = &Label> {
        self.matrices.keys()
    }

    #[inline]
    pub fn matrix(&self, label: &Label) -> Option<&DokMatrix> {
        self.matrices.get(label)
    }

    /// Mutable access to a label's matrix, materializing the zero matrix
    /// on first touch. Solver-internal growth only.
    pub fn matrix_mut(&mut self, label: Label) -> &mut DokMatrix {
        let n = self.states.len();
        self.matrices.entry(label).or_insert_with(|| DokMatrix::new(n, n))
    }

    // ------------------------- Product constructions -------------------------

    /// Kronecker-product automaton over the shared labels.
    ///
    /// The product recognizes the intersection of the two languages; a
    /// label present on only one side yields no matrix at all.
    pub fn intersect<T: Clone + Eq + Hash + Ord>(
        &self,
        other: &MatrixAutomaton<T>,
    ) -> MatrixAutomaton<(S, T)> {
        let states: Vec<(S, T)> = self
            .states
            .iter()
            .cartesian_product(other.states.iter())
            .map(|(a, b)| (a.clone(), b.clone()))
            .collect();
        let starts = self
            .starts
            .iter()
            .cartesian_product(other.starts.iter())
            .map(|(a, b)| (a.clone(), b.clone()))
            .collect();
        let finals = self
            .finals
            .iter()
            .cartesian_product(other.finals.iter())
            .map(|(a, b)| (a.clone(), b.clone()))
            .collect();
        let mut product = MatrixAutomaton::from_parts(states, starts, finals);
        for (label, left) in &self.matrices {
            if let Some(right) = other.matrices.get(label) {
                let kron = left.to_csr().kronecker(&right.to_csr());
                product.matrices.insert(label.clone(), kron.to_dok());
            }
        }
        product
    }

    /// Block-diagonal combination over the shared labels; `other`'s
    /// indices are shifted by `self.n_states()`.
    pub fn direct_sum<T: Clone + Eq + Hash + Ord>(
        &self,
        other: &MatrixAutomaton<T>,
    ) -> MatrixAutomaton<SumState<S, T>> {
        let states: Vec<SumState<S, T>> = self
            .states
            .iter()
            .cloned()
            .map(SumState::Left)
            .chain(other.states.iter().cloned().map(SumState::Right))
            .collect();
        let starts = self
            .starts
            .iter()
            .cloned()
            .map(SumState::Left)
            .chain(other.starts.iter().cloned().map(SumState::Right))
            .collect();
        let finals = self
            .finals
            .iter()
            .cloned()
            .map(SumState::Left)
            .chain(other.finals.iter().cloned().map(SumState::Right))
            .collect();
        let mut sum = MatrixAutomaton::from_parts(states, starts, finals);
        for (label, left) in &self.matrices {
            if let Some(right) = other.matrices.get(label) {
                let diag = left.to_csr().block_diag(&right.to_csr());
                sum.matrices.insert(label.clone(), diag.to_dok());
            }
        }
        sum
    }

    /// Transitive closure of the union of all label matrices.
    pub fn transitive_closure(&self) -> CsrMatrix {
        let n = self.states.len();
        let summed = self
            .matrices
            .values()
            .map(DokMatrix::to_csr)
            .fold(CsrMatrix::zero(n, n), |acc, m| acc.add(&m));
        matrix::transitive_closure(&summed)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nfa::Symbol;

    fn sym(s: &str) -> Label {
        Label::Symbol(Symbol::from(s))
    }

    /// 0 -a-> 1, 1 -b-> 1, 1 -c-> 2, 2 -c-> 3, 3 -b-> 0
    fn ring_nfa() -> Nfa<u32> {
        let mut nfa = Nfa::new();
        nfa.add_transition(0u32, sym("a"), 1);
        nfa.add_transition(1, sym("b"), 1);
        nfa.add_transition(1, sym("c"), 2);
        nfa.add_transition(2, sym("c"), 3);
        nfa.add_transition(3, sym("b"), 0);
        nfa
    }

    #[test]
    fn adjacency_per_label() {
        let bundle = MatrixAutomaton::from_nfa(&ring_nfa());
        let cases = [("a", vec![(0, 1)]), ("b", vec![(1, 1), (3, 0)]), ("c", vec![(1, 2), (2, 3)])];
        for (label, edges) in cases {
            let m = bundle.matrix(&sym(label)).unwrap();
            assert_eq!(m.nnz(), edges.len(), "label {label}");
            for (i, j) in edges {
                assert!(m.get(i, j), "label {label} missing ({i}, {j})");
            }
        }
    }

    #[test]
    fn labels_match_nfa_symbols() {
        let nfa = ring_nfa();
        let bundle = MatrixAutomaton::from_nfa(&nfa);
        let labels: BTreeSet<Label> = bundle.labels().cloned().collect();
        let expected: BTreeSet<Label> =
            nfa.symbols().into_iter().map(Label::Symbol).collect();
        assert_eq!(labels, expected);
    }

    #[test]
    fn ring_closure_is_all_ones() {
        // Every state reaches every state through the b-back-edge ring.
        let bundle = MatrixAutomaton::from_nfa(&ring_nfa());
        let closure = bundle.transitive_closure();
        assert_eq!(closure.nnz(), 16);
    }

    #[test]
    fn nfa_roundtrip_preserves_structure() {
        let mut nfa = ring_nfa();
        nfa.add_start(0);
        nfa.add_final(2);
        let back = MatrixAutomaton::from_nfa(&nfa).to_nfa();
        assert_eq!(back.starts(), nfa.starts());
        assert_eq!(back.finals(), nfa.finals());
        let mut original: Vec<_> = nfa.transitions().to_vec();
        let mut converted: Vec<_> = back.transitions().to_vec();
        original.sort();
        converted.sort();
        assert_eq!(original, converted);
    }

    #[test]
    fn intersection_keeps_shared_labels_only() {
        let mut left_nfa = ring_nfa();
        for i in 0..4 {
            left_nfa.add_start(i);
        }
        for i in 0..3 {
            left_nfa.add_final(i);
        }
        let left = MatrixAutomaton::from_nfa(&left_nfa);

        let mut right_nfa = Nfa::new();
        right_nfa.add_transition(0u32, sym("a"), 1);
        right_nfa.add_transition(1, sym("d"), 2);
        right_nfa.add_transition(1, sym("b"), 1);
        right_nfa.add_transition(2, sym("d"), 3);
        right_nfa.add_start(0);
        right_nfa.add_final(1);
        right_nfa.add_final(3);
        let right = MatrixAutomaton::from_nfa(&right_nfa);

        let product = left.intersect(&right);
        assert_eq!(product.n_states(), 16);
        let labels: Vec<Label> = product.labels().cloned().collect();
        assert_eq!(labels, vec![sym("a"), sym("b")]);

        // (0,0) -a-> (1,1), then b self-loops on (1,1): the product accepts
        // exactly a b*.
        let a = product.matrix(&sym("a")).unwrap();
        assert_eq!(a.iter().collect::<Vec<_>>(), vec![(0 * 4, 1 * 4 + 1)]);
        let b = product.matrix(&sym("b")).unwrap();
        assert!(b.get(5, 5));
        assert!(b.get(13, 1));

        let closure = product.transitive_closure();
        let starts = product.start_indices();
        let finals = product.final_indices();
        let accepted: Vec<(usize, usize)> = closure
            .iter()
            .filter(|(i, j)| starts.contains(i) && finals.contains(j))
            .collect();
        assert_eq!(accepted, vec![(0, 5)]);
        assert_eq!(product.state_at(0), &(0, 0));
        assert_eq!(product.state_at(5), &(1, 1));
    }

    #[test]
    fn direct_sum_shifts_the_right_operand() {
        let mut left_nfa = Nfa::new();
        left_nfa.add_transition(0u32, sym("a"), 1);
        left_nfa.add_start(0);
        let mut right_nfa = Nfa::new();
        right_nfa.add_transition(10u32, sym("a"), 11);
        right_nfa.add_transition(10, sym("b"), 10);
        right_nfa.add_final(11);

        let left = MatrixAutomaton::from_nfa(&left_nfa);
        let right = MatrixAutomaton::from_nfa(&right_nfa);
        let sum = left.direct_sum(&right);

        assert_eq!(sum.n_states(), 4);
        // Shared label a: left block and shifted right block; b is not shared.
        let a = sum.matrix(&sym("a")).unwrap();
        assert_eq!(a.iter().collect::<Vec<_>>(), vec![(0, 1), (2, 3)]);
        assert!(sum.matrix(&sym("b")).is_none());
        assert_eq!(sum.start_indices().into_iter().collect::<Vec<_>>(), vec![0]);
        assert_eq!(sum.final_indices().into_iter().collect::<Vec<_>>(), vec![3]);
        assert_eq!(sum.state_at(2), &SumState::Right(10));
    }

    #[test]
    fn product_index_decodes_against_the_right_width() {
        assert_eq!(decode_product_index(3, 7), (2, 1));
        assert_eq!(decode_product_index(5, 4), (0, 4));
        assert_eq!(decode_product_index(1, 9), (9, 0));
    }
}
