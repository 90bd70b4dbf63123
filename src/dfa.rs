//! Deterministic finite automata
//!
//! Dense `u32` states, one ordered transition row per state. Two
//! constructions live here:
//!
//! - [`determinize`] — ε-closure subset construction over a [`Nfa<u32>`];
//!   subsets are numbered in discovery order, so the result is
//!   deterministic for a given input.
//! - [`Dfa::minimize`] — trim (unreachable and dead states) followed by
//!   Moore partition refinement. Missing transitions are treated as moves
//!   into an implicit dead class, so partial automata minimize correctly.
//!
//! A DFA always has at least one state; the automaton of the empty
//! language is a single non-final state with no transitions.

#![forbid(unsafe_code)]
#![allow(missing_docs)]

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use crate::nfa::{Label, Nfa, Symbol};

/// Deterministic finite automaton over dense `u32` states.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dfa {
    start: u32,
    finals: BTreeSet<u32>,
    trans: Vec<BTreeMap<Symbol, u32>>,
}

impl Dfa {
    /// Assemble from explicit parts. `trans.len()` is the state count;
    /// every target and `start` must index into it.
    pub fn from_parts(start: u32, finals: BTreeSet<u32>, trans: Vec<BTreeMap<Symbol, u32>>) -> Self {
        assert!((start as usize) < trans.len(), "start state out of range");
        for row in &trans {
            for &t in row.values() {
                assert!((t as usize) < trans.len(), "transition target out of range");
            }
        }
        Self { start, finals, trans }
    }

    /// The single-state automaton of the empty language.
    pub fn empty() -> Self {
        Self { start: 0, finals: BTreeSet::new(), trans: vec![BTreeMap::new()] }
    }

    #[inline]
    pub fn n_states(&self) -> usize {
        self.trans.len()
    }

    #[inline]
    pub fn start(&self) -> u32 {
        self.start
    }

    #[inline]
    pub fn finals(&self) -> &BTreeSet<u32> {
        &self.finals
    }

    /// Ordered transition row of `state`.
    #[inline]
    pub fn row(&self, state: u32) -> &BTreeMap<Symbol, u32> {
        &self.trans[state as usize]
    }

    #[inline]
    pub fn next(&self, state: u32, symbol: &Symbol) -> Option<u32> {
        self.trans[state as usize].get(symbol).copied()
    }

    /// Symbols appearing on any transition.
    pub fn alphabet(&self) -> BTreeSet<Symbol> {
        self.trans.iter().flat_map(|row| row.keys().cloned()).collect()
    }

    /// Run the automaton over a word of symbols.
    pub fn accepts<'a>(&self, word: impl IntoIterator<Item = &'a str>) -> bool {
        let mut state = self.start;
        for sym in word {
            match self.next(state, &Symbol::from(sym)) {
                Some(next) => state = next,
                None => return false,
            }
        }
        self.finals.contains(&state)
    }

    /// View as an ε-free NFA (single start state).
    pub fn to_nfa(&self) -> Nfa<u32> {
        let mut nfa = Nfa::new();
        nfa.add_start(self.start);
        for f in &self.finals {
            nfa.add_final(*f);
        }
        for (state, row) in self.trans.iter().enumerate() {
            for (sym, &to) in row {
                nfa.add_transition(state as u32, Label::Symbol(sym.clone()), to);
            }
        }
        nfa
    }

    // ------------------------- Minimization -------------------------

    /// Language-preserving minimization: trim, then Moore refinement.
    pub fn minimize(&self) -> Dfa {
        let kept = self.trimmed_states();
        if !kept.contains(&self.start) {
            return Dfa::empty();
        }

        // Initial partition: final vs non-final among kept states.
        let mut class: HashMap<u32, usize> =
            kept.iter().map(|&s| (s, usize::from(self.finals.contains(&s)))).collect();
        let alphabet: Vec<Symbol> = self.alphabet().into_iter().collect();

        loop {
            let mut next_ids: HashMap<Vec<Option<usize>>, usize> = HashMap::new();
            let mut next_class: HashMap<u32, usize> = HashMap::new();
            for &s in &kept {
                // Signature: own class, then the class each symbol leads to
                // (None = the implicit dead class).
                let mut sig: Vec<Option<usize>> = Vec::with_capacity(alphabet.len() + 1);
                sig.push(Some(class[&s]));
                for sym in &alphabet {
                    sig.push(
                        self.next(s, sym).filter(|t| kept.contains(t)).map(|t| class[&t]),
                    );
                }
                let fresh = next_ids.len();
                let id = *next_ids.entry(sig).or_insert(fresh);
                next_class.insert(s, id);
            }
            let stable = next_ids.len() == class.values().collect::<BTreeSet<_>>().len();
            class = next_class;
            if stable {
                break;
            }
        }

        self.quotient(&kept, &class)
    }

    /// States both reachable from the start and able to reach a final.
    fn trimmed_states(&self) -> BTreeSet<u32> {
        let mut reachable = BTreeSet::new();
        let mut queue = VecDeque::from([self.start]);
        while let Some(s) = queue.pop_front() {
            if reachable.insert(s) {
                queue.extend(self.trans[s as usize].values());
            }
        }

        let mut reverse: HashMap<u32, Vec<u32>> = HashMap::new();
        for (state, row) in self.trans.iter().enumerate() {
            for &to in row.values() {
                reverse.entry(to).or_default().push(state as u32);
            }
        }
        let mut alive = BTreeSet::new();
        let mut queue: VecDeque<u32> = self.finals.iter().copied().collect();
        while let Some(s) = queue.pop_front() {
            if alive.insert(s) {
                if let Some(preds) = reverse.get(&s) {
                    queue.extend(preds.iter());
                }
            }
        }

        reachable.intersection(&alive).copied().collect()
    }

    /// Rebuild the quotient automaton, renumbering classes in BFS order
    /// from the start class so the output is canonical.
    fn quotient(&self, kept: &BTreeSet<u32>, class: &HashMap<u32, usize>) -> Dfa {
        // One representative per class.
        let mut repr: BTreeMap<usize, u32> = BTreeMap::new();
        for &s in kept {
            repr.entry(class[&s]).or_insert(s);
        }

        let mut renumber: HashMap<usize, u32> = HashMap::new();
        let mut order: Vec<usize> = Vec::new();
        let mut queue = VecDeque::from([class[&self.start]]);
        while let Some(c) = queue.pop_front() {
            if renumber.contains_key(&c) {
                continue;
            }
            renumber.insert(c, order.len() as u32);
            order.push(c);
            for (_, &to) in self.trans[repr[&c] as usize].iter() {
                if kept.contains(&to) {
                    queue.push_back(class[&to]);
                }
            }
        }

        let mut trans = vec![BTreeMap::new(); order.len()];
        let mut finals = BTreeSet::new();
        for (new_id, c) in order.iter().enumerate() {
            let rep = repr[c];
            if self.finals.contains(&rep) {
                finals.insert(new_id as u32);
            }
            for (sym, &to) in self.trans[rep as usize].iter() {
                if kept.contains(&to) {
                    trans[new_id].insert(sym.clone(), renumber[&class[&to]]);
                }
            }
        }
        Dfa { start: 0, finals, trans }
    }
}

// ============================================================================
// Subset construction
// ============================================================================

/// ε-closure subset construction. The NFA's states may be any `u32`
/// values; the output states are dense in discovery order.
pub fn determinize(nfa: &Nfa<u32>) -> Dfa {
    let mut eps: HashMap<u32, Vec<u32>> = HashMap::new();
    let mut moves: HashMap<u32, BTreeMap<Symbol, Vec<u32>>> = HashMap::new();
    for (from, label, to) in nfa.transitions() {
        match label {
            Label::Epsilon => eps.entry(*from).or_default().push(*to),
            Label::Symbol(sym) => {
                moves.entry(*from).or_default().entry(sym.clone()).or_default().push(*to)
            }
        }
    }

    let closure = |seed: BTreeSet<u32>| -> BTreeSet<u32> {
        let mut set = seed;
        let mut queue: VecDeque<u32> = set.iter().copied().collect();
        while let Some(s) = queue.pop_front() {
            if let Some(targets) = eps.get(&s) {
                for &t in targets {
                    if set.insert(t) {
                        queue.push_back(t);
                    }
                }
            }
        }
        set
    };

    let start_set = closure(nfa.starts().iter().copied().collect());
    let mut ids: HashMap<BTreeSet<u32>, u32> = HashMap::new();
    let mut subsets: Vec<BTreeSet<u32>> = Vec::new();
    let mut trans: Vec<BTreeMap<Symbol, u32>> = Vec::new();
    ids.insert(start_set.clone(), 0);
    subsets.push(start_set);
    trans.push(BTreeMap::new());

    let mut cursor = 0usize;
    while cursor < subsets.len() {
        let subset = subsets[cursor].clone();
        // Ordered symbol fan-out keeps subset numbering deterministic.
        let mut fanout: BTreeMap<Symbol, BTreeSet<u32>> = BTreeMap::new();
        for &s in &subset {
            if let Some(rows) = moves.get(&s) {
                for (sym, targets) in rows {
                    fanout.entry(sym.clone()).or_default().extend(targets.iter().copied());
                }
            }
        }
        for (sym, targets) in fanout {
            let target_set = closure(targets);
            let fresh = subsets.len() as u32;
            let id = *ids.entry(target_set.clone()).or_insert_with(|| {
                subsets.push(target_set);
                trans.push(BTreeMap::new());
                fresh
            });
            trans[cursor].insert(sym, id);
        }
        cursor += 1;
    }

    let finals = subsets
        .iter()
        .enumerate()
        .filter(|(_, subset)| subset.iter().any(|s| nfa.finals().contains(s)))
        .map(|(i, _)| i as u32)
        .collect();
    Dfa { start: 0, finals, trans }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(s: &str) -> Symbol {
        Symbol::from(s)
    }

    #[test]
    fn determinize_collapses_epsilon_moves() {
        // 0 -ε-> 1 -a-> 2, accepting 2: language {a}.
        let mut nfa = Nfa::new();
        nfa.add_start(0u32);
        nfa.add_final(2);
        nfa.add_transition(0, Label::Epsilon, 1);
        nfa.add_transition(1, Label::Symbol(sym("a")), 2);
        let dfa = determinize(&nfa);
        assert!(dfa.accepts(["a"]));
        assert!(!dfa.accepts([] as [&str; 0]));
        assert!(!dfa.accepts(["a", "a"]));
    }

    #[test]
    fn minimize_merges_equivalent_states() {
        // Two redundant accepting states for the same residual language.
        let trans = vec![
            BTreeMap::from([(sym("a"), 1), (sym("b"), 2)]),
            BTreeMap::new(),
            BTreeMap::new(),
        ];
        let dfa = Dfa::from_parts(0, BTreeSet::from([1, 2]), trans);
        let min = dfa.minimize();
        assert_eq!(min.n_states(), 2);
        assert!(min.accepts(["a"]) && min.accepts(["b"]));
        assert!(!min.accepts(["a", "a"]));
    }

    #[test]
    fn minimize_drops_dead_and_unreachable_states() {
        let trans = vec![
            BTreeMap::from([(sym("a"), 1), (sym("b"), 2)]),
            BTreeMap::new(),              // final
            BTreeMap::new(),              // dead trap
            BTreeMap::from([(sym("a"), 1)]), // unreachable
        ];
        let dfa = Dfa::from_parts(0, BTreeSet::from([1]), trans);
        let min = dfa.minimize();
        assert_eq!(min.n_states(), 2);
        assert!(min.accepts(["a"]));
        assert!(!min.accepts(["b"]));
    }

    #[test]
    fn empty_language_minimizes_to_single_dead_state() {
        let dfa = Dfa::from_parts(0, BTreeSet::new(), vec![BTreeMap::from([(sym("a"), 0)])]);
        let min = dfa.minimize();
        assert_eq!(min.n_states(), 1);
        assert!(min.finals().is_empty());
        assert!(min.alphabet().is_empty());
    }
}
