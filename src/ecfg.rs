//! Extended context-free grammars
//!
//! An [`Ecfg`] carries exactly one regular expression per nonterminal.
//! It is the bridge between a plain [`Cfg`] and the recursive state
//! machine of the tensor CFPQ solver: production bodies collapse into a
//! union regex, variables referenced in bodies become ordinary symbols of
//! that regex, and each regex later compiles into one RSM box.

#![forbid(unsafe_code)]
#![allow(missing_docs)]

use std::collections::{BTreeMap, BTreeSet};

use crate::cfg::{Cfg, GrammarError, GrammarSymbol, Variable};
use crate::regex::Regex;

/// Grammar with one regex production per nonterminal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ecfg {
    start: Variable,
    variables: BTreeSet<Variable>,
    productions: BTreeMap<Variable, Regex>,
}

impl Ecfg {
    /// Collapse a CFG: bodies of the same head union left-to-right, the
    /// empty body becomes the empty-word regex, body elements become
    /// symbols named after themselves.
    pub fn from_cfg(cfg: &Cfg) -> Self {
        let mut productions: BTreeMap<Variable, Regex> = BTreeMap::new();
        for p in cfg.productions() {
            let body = body_regex(&p.body);
            productions
                .entry(p.head.clone())
                .and_modify(|r| *r = Regex::union(r.clone(), body.clone()))
                .or_insert(body);
        }
        Self {
            start: cfg.start().clone(),
            variables: cfg.variables().clone(),
            productions,
        }
    }

    /// Parse one `Head -> regex` production per line; a repeated head is
    /// an error. The start symbol is `S`.
    pub fn from_text(text: &str) -> Result<Self, GrammarError> {
        Self::from_text_with_start(text, Variable::from("S"))
    }

    /// Parse with an explicit start symbol.
    pub fn from_text_with_start(text: &str, start: Variable) -> Result<Self, GrammarError> {
        let mut variables = BTreeSet::new();
        let mut productions = BTreeMap::new();
        for (line_idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let (head_text, body_text) = line.split_once("->").ok_or_else(|| {
                GrammarError::MalformedProduction { line: line_idx + 1, text: line.to_owned() }
            })?;
            let head = Variable::new(head_text.trim());
            if !variables.insert(head.clone()) {
                return Err(GrammarError::DuplicateHead(head));
            }
            productions.insert(head, Regex::parse(body_text)?);
        }
        Ok(Self { start, variables, productions })
    }

    #[inline]
    pub fn start(&self) -> &Variable {
        &self.start
    }

    pub fn variables(&self) -> &BTreeSet<Variable> {
        &self.variables
    }

    pub fn productions(&self) -> &BTreeMap<Variable, Regex> {
        &self.productions
    }
}

fn body_regex(body: &[GrammarSymbol]) -> Regex {
    let mut items = body.iter().map(|item| match item {
        GrammarSymbol::Variable(v) => Regex::symbol(v.name()),
        GrammarSymbol::Terminal(t) => Regex::symbol(t.name()),
    });
    match items.next() {
        None => Regex::Epsilon,
        Some(first) => items.fold(first, Regex::concat),
    }
}

// ============================================================================
// Tests
// ============================================================================
