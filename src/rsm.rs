//! Recursive state machines
//!
//! An [`Rsm`] holds one DFA "box" per nonterminal; a box's start and
//! final states are the machine's entry and exit for that nonterminal.
//! Box transitions are labeled by terminals *or* by nonterminal names —
//! recursion is a label, not an ε-call, which is exactly what the tensor
//! CFPQ solver needs when it intersects the machine with a graph.

#![forbid(unsafe_code)]
#![allow(missing_docs)]

use std::collections::BTreeMap;

use crate::automaton::MatrixAutomaton;
use crate::cfg::Variable;
use crate::dfa::Dfa;
use crate::ecfg::Ecfg;
use crate::nfa::{Label, Nfa};

/// State of an RSM: the owning box and the state inside it.
pub type BoxState = (Variable, u32);

/// Recursive state machine: one DFA box per nonterminal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rsm {
    start: Variable,
    boxes: BTreeMap<Variable, Dfa>,
}

impl Rsm {
    #[inline]
    pub fn start(&self) -> &Variable {
        &self.start
    }

    pub fn boxes(&self) -> &BTreeMap<Variable, Dfa> {
        &self.boxes
    }

    /// Minimize every box independently.
    pub fn minimize(&self) -> Rsm {
        Rsm {
            start: self.start.clone(),
            boxes: self.boxes.iter().map(|(v, d)| (v.clone(), d.minimize())).collect(),
        }
    }

    /// Bundle the disjoint union of all box states: entries are start
    /// states, exits are final states, labels carry both terminals and
    /// nonterminal names.
    pub fn to_matrix_automaton(&self) -> MatrixAutomaton<BoxState> {
        let mut nfa: Nfa<BoxState> = Nfa::new();
        for (variable, dfa) in &self.boxes {
            nfa.add_start((variable.clone(), dfa.start()));
            for &f in dfa.finals() {
                nfa.add_final((variable.clone(), f));
            }
            for state in 0..dfa.n_states() as u32 {
                for (sym, &to) in dfa.row(state) {
                    nfa.add_transition(
                        (variable.clone(), state),
                        Label::Symbol(sym.clone()),
                        (variable.clone(), to),
                    );
                }
            }
        }
        MatrixAutomaton::from_nfa(&nfa)
    }
}

/// Compile each production regex into a minimal DFA box.
pub fn ecfg_to_rsm(ecfg: &Ecfg) -> Rsm {
    Rsm {
        start: ecfg.start().clone(),
        boxes: ecfg
            .productions()
            .iter()
            .map(|(v, regex)| (v.clone(), regex.to_min_dfa()))
            .collect(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nfa::Symbol;

    #[test]
    fn one_box_per_production() {
        let ecfg = Ecfg::from_text("S -> (a | b*)\nT -> a S").unwrap();
        let rsm = ecfg_to_rsm(&ecfg);
        assert_eq!(rsm.boxes().len(), 2);
        assert!(rsm.boxes()[&Variable::from("S")].accepts(["b", "b"]));
        assert!(rsm.boxes()[&Variable::from("T")].accepts(["a", "S"]));
    }

    #[test]
    fn minimize_is_idempotent_on_compiled_boxes() {
        let ecfg = Ecfg::from_text("S -> (a | (b | c)) | (d* | e)").unwrap();
        let rsm = ecfg_to_rsm(&ecfg);
        assert_eq!(rsm.minimize(), rsm);
    }

    #[test]
    fn matrix_form_tags_states_with_their_box() {
        let ecfg = Ecfg::from_text("S -> a B\nB -> b").unwrap();
        let bundle = ecfg_to_rsm(&ecfg).to_matrix_automaton();
        // S box: 3 states (entry, after-a, exit); B box: 2 states.
        assert_eq!(bundle.n_states(), 5);
        assert_eq!(bundle.starts().len(), 2);
        let entry_tags: Vec<Variable> =
            bundle.starts().iter().map(|(v, _)| v.clone()).collect();
        assert!(entry_tags.contains(&Variable::from("S")));
        assert!(entry_tags.contains(&Variable::from("B")));
        // The nonterminal reference B is an ordinary label of the S box.
        assert!(bundle.matrix(&Label::Symbol(Symbol::from("B"))).is_some());
        assert!(bundle.matrix(&Label::Symbol(Symbol::from("a"))).is_some());
        assert!(bundle.matrix(&Label::Symbol(Symbol::from("b"))).is_some());
    }
}
