//! Context-free grammars and Weak Chomsky Normal Form
//!
//! Grammar model plus the normalization pipeline every CFPQ solver feeds
//! on: useless-symbol removal, unit-production elimination, single-terminal
//! extraction, and binary decomposition. ε-productions are **kept** — the
//! target is *weak* CNF, where bodies have length 0, 1 (a terminal), or 2
//! (two variables).
//!
//! Text format: one or more `Head -> body | body` lines, tokens separated
//! by whitespace, leading-uppercase (or quoted) tokens are variables,
//! anything else is a terminal, and `epsilon`/`$`/`ε`/an empty body denote
//! the empty word. Repeated heads accumulate alternatives.
//!
//! Fresh variables introduced by normalization use the `…#CNF#…` naming
//! scheme, which cannot collide with parsed variables (`#` never
//! tokenizes into a name).

#![forbid(unsafe_code)]
#![allow(missing_docs)]

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use crate::regex::RegexError;

// ============================================================================
// Alphabet
// ============================================================================

/// Grammar nonterminal.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Variable(String);

impl Variable {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Variable {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Grammar terminal.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Terminal(String);

impl Terminal {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Terminal {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// One element of a production body.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GrammarSymbol {
    Variable(Variable),
    Terminal(Terminal),
}

impl GrammarSymbol {
    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            GrammarSymbol::Variable(v) => Some(v),
            GrammarSymbol::Terminal(_) => None,
        }
    }

    pub fn as_terminal(&self) -> Option<&Terminal> {
        match self {
            GrammarSymbol::Variable(_) => None,
            GrammarSymbol::Terminal(t) => Some(t),
        }
    }
}

/// Production `head → body`; the empty body is ε.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Production {
    pub head: Variable,
    pub body: Vec<GrammarSymbol>,
}

/// Grammar errors (parsing, extended-grammar construction, dispatch).
#[derive(Debug, thiserror::Error)]
pub enum GrammarError {
    #[error("failed to read grammar: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: malformed production {text:?}")]
    MalformedProduction { line: usize, text: String },
    #[error("duplicate head {0} in extended grammar")]
    DuplicateHead(Variable),
    #[error("grammar has no start nonterminal {0}")]
    InvalidStartSymbol(Variable),
    #[error(transparent)]
    Regex(#[from] RegexError),
}

// ============================================================================
// Grammar
// ============================================================================

/// Context-free grammar over ordered production sets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cfg {
    start: Variable,
    variables: BTreeSet<Variable>,
    terminals: BTreeSet<Terminal>,
    productions: BTreeSet<Production>,
}

impl Cfg {
    pub fn new(start: Variable) -> Self {
        let variables = BTreeSet::from([start.clone()]);
        Self { start, variables, terminals: BTreeSet::new(), productions: BTreeSet::new() }
    }

    /// Parse grammar text with start symbol `S`.
    pub fn from_text(text: &str) -> Result<Self, GrammarError> {
        Self::from_text_with_start(text, Variable::from("S"))
    }

    /// Parse grammar text with an explicit start symbol.
    pub fn from_text_with_start(text: &str, start: Variable) -> Result<Self, GrammarError> {
        let mut cfg = Cfg::new(start);
        for (line_idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let malformed = || GrammarError::MalformedProduction {
                line: line_idx + 1,
                text: line.to_owned(),
            };
            let (head_text, bodies_text) = line.split_once("->").ok_or_else(&malformed)?;
            let head = match classify(head_text.trim()) {
                Some(GrammarSymbol::Variable(v)) => v,
                _ => return Err(malformed()),
            };
            for body_text in bodies_text.split('|') {
                let mut body = Vec::new();
                for token in body_text.split_whitespace() {
                    if matches!(token, "epsilon" | "$" | "ε") {
                        continue;
                    }
                    body.push(classify(token).ok_or_else(&malformed)?);
                }
                cfg.add_production(head.clone(), body);
            }
        }
        Ok(cfg)
    }

    /// Parse a grammar file with start symbol `S`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, GrammarError> {
        Self::from_text(&std::fs::read_to_string(path)?)
    }

    pub fn add_production(&mut self, head: Variable, body: Vec<GrammarSymbol>) {
        self.variables.insert(head.clone());
        for item in &body {
            match item {
                GrammarSymbol::Variable(v) => {
                    self.variables.insert(v.clone());
                }
                GrammarSymbol::Terminal(t) => {
                    self.terminals.insert(t.clone());
                }
            }
        }
        self.productions.insert(Production { head, body });
    }

    /// The same grammar rewritten to start from `start`.
    pub fn with_start(&self, start: Variable) -> Self {
        let mut cfg = self.clone();
        cfg.variables.insert(start.clone());
        cfg.start = start;
        cfg
    }

    #[inline]
    pub fn start(&self) -> &Variable {
        &self.start
    }

    pub fn variables(&self) -> &BTreeSet<Variable> {
        &self.variables
    }

    pub fn terminals(&self) -> &BTreeSet<Terminal> {
        &self.terminals
    }

    pub fn productions(&self) -> &BTreeSet<Production> {
        &self.productions
    }

    pub fn contains_variable(&self, variable: &Variable) -> bool {
        self.variables.contains(variable)
    }

    // ------------------------- Derived tables -------------------------

    /// Heads of explicit ε-productions. On a WCNF grammar this is the
    /// `nullable` table the worklist/matrix solvers seed from.
    pub fn nullable_heads(&self) -> BTreeSet<Variable> {
        self.productions
            .iter()
            .filter(|p| p.body.is_empty())
            .map(|p| p.head.clone())
            .collect()
    }

    /// Variables that derive the empty word (`A ⇒* ε`), the full
    /// fixpoint over arbitrary bodies.
    pub fn nullables(&self) -> BTreeSet<Variable> {
        let mut nullable = BTreeSet::new();
        loop {
            let before = nullable.len();
            for p in &self.productions {
                if p.body.iter().all(|s| s.as_variable().is_some_and(|v| nullable.contains(v))) {
                    nullable.insert(p.head.clone());
                }
            }
            if nullable.len() == before {
                return nullable;
            }
        }
    }

    /// `A → {t}` over single-terminal bodies.
    pub fn term_prods(&self) -> BTreeMap<Variable, BTreeSet<Terminal>> {
        let mut table: BTreeMap<Variable, BTreeSet<Terminal>> = BTreeMap::new();
        for p in &self.productions {
            if let [GrammarSymbol::Terminal(t)] = p.body.as_slice() {
                table.entry(p.head.clone()).or_default().insert(t.clone());
            }
        }
        table
    }

    /// `A → {(B, C)}` over two-variable bodies.
    pub fn binary_prods(&self) -> BTreeMap<Variable, BTreeSet<(Variable, Variable)>> {
        let mut table: BTreeMap<Variable, BTreeSet<(Variable, Variable)>> = BTreeMap::new();
        for p in &self.productions {
            if let [GrammarSymbol::Variable(b), GrammarSymbol::Variable(c)] = p.body.as_slice() {
                table.entry(p.head.clone()).or_default().insert((b.clone(), c.clone()));
            }
        }
        table
    }

    // ------------------------- Normalization -------------------------

    /// Weak Chomsky Normal Form: every body has length 0, 1 (a single
    /// terminal), or 2 (two variables); ε-productions survive.
    pub fn to_wcnf(&self) -> Cfg {
        let trimmed = self.remove_useless().eliminate_unit_productions().remove_useless();
        let mut wcnf = Cfg::new(trimmed.start.clone());
        let mut needed_terminals: BTreeSet<Terminal> = BTreeSet::new();
        let mut chain_counter = 0usize;
        for p in &trimmed.productions {
            if p.body.len() <= 1 {
                wcnf.add_production(p.head.clone(), p.body.clone());
                continue;
            }
            // Long bodies first lose their terminals to `t#CNF#` wrappers,
            // then split into a chain of `C#CNF#k` pairs.
            let mut body: Vec<Variable> = p
                .body
                .iter()
                .map(|item| match item {
                    GrammarSymbol::Variable(v) => v.clone(),
                    GrammarSymbol::Terminal(t) => {
                        needed_terminals.insert(t.clone());
                        terminal_wrapper(t)
                    }
                })
                .collect();
            let mut head = p.head.clone();
            while body.len() > 2 {
                chain_counter += 1;
                let link = Variable::new(format!("C#CNF#{chain_counter}"));
                let first = body.remove(0);
                wcnf.add_production(
                    head,
                    vec![GrammarSymbol::Variable(first), GrammarSymbol::Variable(link.clone())],
                );
                head = link;
            }
            wcnf.add_production(head, body.into_iter().map(GrammarSymbol::Variable).collect());
        }
        for t in needed_terminals {
            wcnf.add_production(terminal_wrapper(&t), vec![GrammarSymbol::Terminal(t)]);
        }
        wcnf
    }

    /// Drop non-generating and unreachable symbols with their productions.
    pub fn remove_useless(&self) -> Cfg {
        let mut generating: BTreeSet<Variable> = BTreeSet::new();
        loop {
            let before = generating.len();
            for p in &self.productions {
                if p.body.iter().all(|s| match s {
                    GrammarSymbol::Variable(v) => generating.contains(v),
                    GrammarSymbol::Terminal(_) => true,
                }) {
                    generating.insert(p.head.clone());
                }
            }
            if generating.len() == before {
                break;
            }
        }
        let generating_prods: Vec<&Production> = self
            .productions
            .iter()
            .filter(|p| {
                generating.contains(&p.head)
                    && p.body
                        .iter()
                        .all(|s| s.as_variable().map_or(true, |v| generating.contains(v)))
            })
            .collect();

        let mut reachable = BTreeSet::from([self.start.clone()]);
        loop {
            let before = reachable.len();
            for p in &generating_prods {
                if reachable.contains(&p.head) {
                    reachable
                        .extend(p.body.iter().filter_map(|s| s.as_variable().cloned()));
                }
            }
            if reachable.len() == before {
                break;
            }
        }

        let mut cfg = Cfg::new(self.start.clone());
        for p in generating_prods {
            if reachable.contains(&p.head) {
                cfg.add_production(p.head.clone(), p.body.clone());
            }
        }
        cfg
    }

    /// Replace unit productions `A → B` by the non-unit bodies of every
    /// unit-reachable `B`.
    pub fn eliminate_unit_productions(&self) -> Cfg {
        let mut unit_pairs: BTreeMap<Variable, BTreeSet<Variable>> = self
            .variables
            .iter()
            .map(|v| (v.clone(), BTreeSet::from([v.clone()])))
            .collect();
        loop {
            let mut grew = false;
            for p in &self.productions {
                if let [GrammarSymbol::Variable(target)] = p.body.as_slice() {
                    let extension = unit_pairs[target].clone();
                    let set = unit_pairs.get_mut(&p.head).expect("head is a known variable");
                    for v in extension {
                        grew |= set.insert(v);
                    }
                }
            }
            if !grew {
                break;
            }
        }

        let mut cfg = Cfg::new(self.start.clone());
        for (head, targets) in &unit_pairs {
            for target in targets {
                for p in &self.productions {
                    let is_unit = matches!(p.body.as_slice(), [GrammarSymbol::Variable(_)]);
                    if &p.head == target && !is_unit {
                        cfg.add_production(head.clone(), p.body.clone());
                    }
                }
            }
        }
        cfg
    }
}

fn terminal_wrapper(t: &Terminal) -> Variable {
    Variable::new(format!("{}#CNF#", t.name()))
}

fn classify(token: &str) -> Option<GrammarSymbol> {
    if token.is_empty() {
        return None;
    }
    if let Some(stripped) = token.strip_prefix('"') {
        let name = stripped.strip_suffix('"')?;
        return Some(GrammarSymbol::Variable(Variable::from(name)));
    }
    if token.chars().next().is_some_and(|c| c.is_uppercase()) {
        Some(GrammarSymbol::Variable(Variable::new(token)))
    } else {
        Some(GrammarSymbol::Terminal(Terminal::new(token)))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn var(s: &str) -> GrammarSymbol {
        GrammarSymbol::Variable(Variable::from(s))
    }

    fn term(s: &str) -> GrammarSymbol {
        GrammarSymbol::Terminal(Terminal::from(s))
    }

    fn prod(head: &str, body: Vec<GrammarSymbol>) -> Production {
        Production { head: Variable::from(head), body }
    }

    #[test]
    fn parses_alternatives_and_epsilon() {
        let cfg = Cfg::from_text("S -> epsilon\nS -> a S b S\nS -> S S").unwrap();
        let expected = BTreeSet::from([
            prod("S", vec![]),
            prod("S", vec![term("a"), var("S"), term("b"), var("S")]),
            prod("S", vec![var("S"), var("S")]),
        ]);
        assert_eq!(cfg.productions(), &expected);

        let piped = Cfg::from_text("S -> epsilon | a S b S | S S").unwrap();
        assert_eq!(piped.productions(), &expected);
    }

    #[test]
    fn duplicate_lines_collapse() {
        let cfg = Cfg::from_text("S -> a\nS -> a").unwrap();
        assert_eq!(cfg.productions().len(), 1);
    }

    #[test]
    fn rejects_lines_without_arrow_or_head() {
        assert!(matches!(
            Cfg::from_text("S a b"),
            Err(GrammarError::MalformedProduction { line: 1, .. })
        ));
        assert!(matches!(
            Cfg::from_text("s -> a"),
            Err(GrammarError::MalformedProduction { .. })
        ));
    }

    #[test]
    fn unit_productions_collapse_and_useless_symbols_vanish() {
        let cfg = Cfg::from_text("S -> T\nT -> t").unwrap();
        let wcnf = cfg.to_wcnf();
        assert_eq!(wcnf.productions(), &BTreeSet::from([prod("S", vec![term("t")])]));
    }

    #[test]
    fn start_disconnected_grammar_normalizes_to_nothing() {
        let cfg = Cfg::from_text("B -> a").unwrap();
        assert!(cfg.to_wcnf().productions().is_empty());
    }

    #[test]
    fn wcnf_of_nested_grammar_matches_reference_shape() {
        let cfg = Cfg::from_text("S ->\nS -> a S b S\nS -> S S").unwrap();
        let wcnf = cfg.to_wcnf();
        let expected = BTreeSet::from([
            prod("S", vec![]),
            prod("S", vec![var("a#CNF#"), var("C#CNF#1")]),
            prod("a#CNF#", vec![term("a")]),
            prod("b#CNF#", vec![term("b")]),
            prod("C#CNF#1", vec![var("S"), var("C#CNF#2")]),
            prod("C#CNF#2", vec![var("b#CNF#"), var("S")]),
            prod("S", vec![var("S"), var("S")]),
        ]);
        assert_eq!(wcnf.productions(), &expected);
    }

    #[test]
    fn wcnf_bodies_have_legal_shapes() {
        let cfg = Cfg::from_text("S -> a S b | b b a S | epsilon").unwrap();
        for p in cfg.to_wcnf().productions() {
            match p.body.as_slice() {
                [] => {}
                [GrammarSymbol::Terminal(_)] => {}
                [GrammarSymbol::Variable(_), GrammarSymbol::Variable(_)] => {}
                other => panic!("illegal WCNF body {other:?}"),
            }
        }
    }

    #[test]
    fn nullable_tables() {
        let cfg = Cfg::from_text("S -> A B\nA -> epsilon\nB -> epsilon | b").unwrap();
        // Explicit ε-heads only:
        assert_eq!(
            cfg.nullable_heads(),
            BTreeSet::from([Variable::from("A"), Variable::from("B")])
        );
        // Full fixpoint also reaches S through A B:
        assert_eq!(
            cfg.nullables(),
            BTreeSet::from([Variable::from("A"), Variable::from("B"), Variable::from("S")])
        );
    }

    #[test]
    fn term_and_binary_tables_read_off_wcnf() {
        let cfg = Cfg::from_text("S -> a b").unwrap().to_wcnf();
        let terms = cfg.term_prods();
        assert_eq!(terms[&Variable::from("a#CNF#")], BTreeSet::from([Terminal::from("a")]));
        let binaries = cfg.binary_prods();
        assert_eq!(
            binaries[&Variable::from("S")],
            BTreeSet::from([(Variable::from("a#CNF#"), Variable::from("b#CNF#"))])
        );
    }
}
