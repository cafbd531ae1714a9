//! Rule store.
//!
//! A [`RuleStore`] owns everything one locale's rules need at evaluation time:
//!
//! ```text
//! RuleStore (locale "en")
//!   ├─ rules: VecDeque<RuleEntry>     newest first; the authoritative list
//!   ├─ trie: Trie                     index over (query, locale, domain, style)
//!   ├─ evaluator                      custom queries (CQF) + compiled path queries
//!   ├─ custom_strings (CSF)
//!   └─ context_functions (CTF)
//! ```
//!
//! Stores are populated once by initializer functions (plain `fn`s bundling a
//! rule set's `define_rule` calls) and are read-only during evaluation.
//!
//! ## Selecting a rule
//!
//! `lookup_rule` gets trie candidates, drops those whose static constraints do
//! not hold, and ranks the rest:
//!
//! 1. dynamic-constraint specificity relative to the active constraint;
//! 2. number of static constraints, more first;
//! 3. list order, newest surviving definition first.
//!
//! ## Responsibilities by module
//!
//! - `trie.rs`: the selection-key index.
//! - `evaluator.rs`: selectors and boolean constraints over nodes.
//! - `functions.rs`: typed name-keyed registries and built-in context
//!   functions.

#[path = "store/evaluator.rs"]
mod evaluator;
#[path = "store/functions.rs"]
mod functions;
#[path = "store/trie.rs"]
mod trie;
#[cfg(test)]
#[path = "store/tests.rs"]
mod tests;

use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::rc::Rc;

use tracing::{debug, error, trace, warn};

use crate::action::Action;
use crate::audio::SpeechSegment;
use crate::dom::{KindMask, NodeRef};
use crate::dynamic_cstr::{Comparator, DEFAULT_LOCALE, DynamicCstr, Parser, SEPARATOR};
use crate::error::{ConstraintParseError, LoadError, QueryError, RegistryError, RuleDefinitionError, RuleErrorKind};

pub use evaluator::PreconditionEvaluator;
pub use functions::{
    ContextFunction, ContextGenerator, ContextItem, CustomQuery, CustomString, FunctionKind, Registry,
    content_iterator, node_counter,
};
pub use trie::{RuleEntry, Trie};

/// Node kinds rules can be looked up for.
const LOOKUP_KINDS: KindMask = KindMask::ELEMENT.union(KindMask::TEXT);

/// Structural test a node must pass: the main query plus static constraints.
#[derive(Debug, Clone)]
pub struct Precondition {
    query: String,
    constraints: Vec<String>,
}

impl Precondition {
    pub fn new(query: impl Into<String>, constraints: Vec<String>) -> Self {
        Precondition { query: query.into(), constraints }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn constraints(&self) -> &[String] {
        &self.constraints
    }
}

/// Same query and the same set of constraints, in any order.
impl PartialEq for Precondition {
    fn eq(&self, other: &Self) -> bool {
        self.query == other.query
            && self.constraints.iter().collect::<BTreeSet<_>>() == other.constraints.iter().collect::<BTreeSet<_>>()
    }
}

impl Eq for Precondition {}

impl fmt::Display for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.query)?;
        for constraint in &self.constraints {
            write!(f, ", {}", constraint)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SpeechRule {
    name: String,
    dynamic_cstr: DynamicCstr,
    precondition: Precondition,
    action: Action,
}

impl SpeechRule {
    pub fn new(name: impl Into<String>, dynamic_cstr: DynamicCstr, precondition: Precondition, action: Action) -> Self {
        SpeechRule { name: name.into(), dynamic_cstr, precondition, action }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dynamic_cstr(&self) -> &DynamicCstr {
        &self.dynamic_cstr
    }

    pub fn precondition(&self) -> &Precondition {
        &self.precondition
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    /// Whether `other` would be selected under exactly the same conditions.
    pub fn same_selection_key(&self, other: &SpeechRule) -> bool {
        self.dynamic_cstr.equal(&other.dynamic_cstr) && self.precondition == other.precondition
    }
}

impl fmt::Display for SpeechRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} | {} | {} | {}", self.name, self.dynamic_cstr, self.action, self.precondition)
    }
}

/// Populates a store with one rule set's functions and rules.
pub type Initializer = fn(&mut RuleStore) -> Result<(), LoadError>;

/// A named group of initializers for one locale.
#[derive(Debug, Clone, Copy)]
pub struct RuleSet {
    pub name: &'static str,
    pub locale: &'static str,
    pub initializers: &'static [Initializer],
}

#[derive(Debug)]
pub struct RuleStore {
    locale: String,
    parser: Parser,
    evaluator: PreconditionEvaluator,
    custom_strings: Registry<CustomString>,
    context_functions: Registry<ContextFunction>,
    trie: Trie,
    rules: VecDeque<RuleEntry>,
    next_seq: u64,
}

impl RuleStore {
    /// An empty store with only the built-in context functions registered.
    pub fn empty(locale: impl Into<String>) -> Self {
        let builtins: [(&'static str, ContextFunction); 2] =
            [("CTFnodeCounter", Box::new(node_counter)), ("CTFcontentIterator", Box::new(content_iterator))];
        RuleStore {
            locale: locale.into(),
            parser: Parser::new(),
            evaluator: PreconditionEvaluator::new(),
            custom_strings: Registry::new(FunctionKind::String),
            context_functions: Registry::with_entries(FunctionKind::Context, builtins),
            trie: Trie::new(),
            rules: VecDeque::new(),
            next_seq: 0,
        }
    }

    /// A store populated by running every initializer once, in order.
    pub fn new(locale: impl Into<String>, initializers: &[Initializer]) -> Result<Self, LoadError> {
        let mut store = Self::empty(locale);
        for initialize in initializers {
            initialize(&mut store)?;
        }
        debug!(locale = %store.locale, rules = store.len(), "rule store initialized");
        Ok(store)
    }

    /// A store for `locale` built from the matching `sets`.
    ///
    /// Sets of [`DEFAULT_LOCALE`] are loaded as well (before the locale's own
    /// sets), each under its own locale, so lookups can fall back along the
    /// locale axis. `filter` restricts loading to the named sets; naming a set
    /// that exists in neither locale is an error.
    pub fn from_rule_sets(locale: &str, sets: &[RuleSet], filter: Option<&[String]>) -> Result<Self, LoadError> {
        let available: Vec<&RuleSet> = sets
            .iter()
            .filter(|set| set.locale == DEFAULT_LOCALE && locale != DEFAULT_LOCALE)
            .chain(sets.iter().filter(|set| set.locale == locale))
            .collect();
        if let Some(filter) = filter {
            if let Some(missing) = filter.iter().find(|name| !available.iter().any(|set| set.name == name.as_str())) {
                return Err(LoadError::UnknownRuleSet { name: missing.clone(), locale: locale.to_string() });
            }
        }
        if !sets.iter().any(|set| set.locale == locale) {
            warn!(locale, fallback = DEFAULT_LOCALE, "no rule sets for locale");
        }

        let mut store = Self::empty(locale);
        for set in available.iter().filter(|set| filter.is_none_or(|names| names.iter().any(|name| name == set.name))) {
            store.load_rule_set(set)?;
        }
        debug!(locale = %store.locale, rules = store.len(), "rule store initialized");
        Ok(store)
    }

    /// Runs `set`'s initializers with rule constraints prefixed by the set's
    /// own locale.
    fn load_rule_set(&mut self, set: &RuleSet) -> Result<(), LoadError> {
        let locale = std::mem::replace(&mut self.locale, set.locale.to_string());
        let result = set.initializers.iter().try_for_each(|initialize| initialize(self));
        self.locale = locale;
        trace!(set = set.name, locale = set.locale, "rule set loaded");
        result
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn trie(&self) -> &Trie {
        &self.trie
    }

    pub fn evaluator(&self) -> &PreconditionEvaluator {
        &self.evaluator
    }

    // --- Registries ---------------------------------------------------------

    pub fn add_custom_query<F>(&mut self, name: &str, function: F) -> Result<(), RegistryError>
    where
        F: for<'d> Fn(NodeRef<'d>) -> Vec<NodeRef<'d>> + 'static,
    {
        self.evaluator.custom_queries_mut().register(name, Box::new(function))
    }

    pub fn add_custom_string<F>(&mut self, name: &str, function: F) -> Result<(), RegistryError>
    where
        F: Fn(NodeRef<'_>) -> String + 'static,
    {
        self.custom_strings.register(name, Box::new(function))
    }

    pub fn add_context_function<F>(&mut self, name: &str, function: F) -> Result<(), RegistryError>
    where
        F: for<'a, 'd> Fn(&'a [NodeRef<'d>], &'a str) -> ContextGenerator + 'static,
    {
        self.context_functions.register(name, Box::new(function))
    }

    pub fn custom_string(&self, name: &str) -> Option<&CustomString> {
        self.custom_strings.get(name)
    }

    pub fn context_function(&self, name: &str) -> Option<&ContextFunction> {
        self.context_functions.get(name)
    }

    // --- Definition ---------------------------------------------------------

    /// Parses a rule's dynamic constraint spec, prefixed with the store locale.
    pub fn parse_cstr(&self, spec: &str) -> Result<DynamicCstr, ConstraintParseError> {
        if spec.is_empty() {
            return self.parser.parse(&self.locale);
        }
        self.parser.parse(&format!("{}{}{}", self.locale, SEPARATOR, spec))
    }

    /// Defines and stores a rule, replacing any rule with the same selection key.
    ///
    /// A malformed definition is logged and skipped (`Ok(None)`); every other
    /// failure propagates.
    pub fn define_rule(
        &mut self,
        name: &str,
        dynamic: &str,
        action: &str,
        query: &str,
        constraints: &[&str],
    ) -> Result<Option<Rc<SpeechRule>>, LoadError> {
        match self.build_rule(name, dynamic, action, query, constraints) {
            Ok(rule) => {
                let rule = self.add_rule(rule);
                self.remove_duplicates(&rule);
                Ok(Some(rule))
            }
            Err(LoadError::RuleDefinition(err)) => {
                error!(rule = name, "{}", err);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn build_rule(
        &self,
        name: &str,
        dynamic: &str,
        action: &str,
        query: &str,
        constraints: &[&str],
    ) -> Result<SpeechRule, LoadError> {
        let fail = |spec: &str, kind: RuleErrorKind| {
            LoadError::RuleDefinition(RuleDefinitionError { query: query.to_string(), spec: spec.to_string(), kind })
        };

        if name.trim().is_empty() {
            return Err(fail(name, RuleErrorKind::EmptyName));
        }
        if query.trim().is_empty() {
            return Err(fail(query, RuleErrorKind::EmptyQuery));
        }
        let dynamic_cstr = self.parse_cstr(dynamic).map_err(|e| fail(dynamic, e.into()))?;
        let parsed = Action::parse(action).map_err(|e| fail(action, e.into()))?;

        for function in parsed.custom_strings() {
            if !self.custom_strings.contains(function) {
                return Err(fail(
                    action,
                    RuleErrorKind::UnknownFunction { kind: FunctionKind::String, name: function.to_string() },
                ));
            }
        }
        for function in parsed.context_functions() {
            if !self.context_functions.contains(function) {
                return Err(fail(
                    action,
                    RuleErrorKind::UnknownFunction { kind: FunctionKind::Context, name: function.to_string() },
                ));
            }
        }

        let precondition = Precondition::new(query, constraints.iter().map(|c| c.to_string()).collect());
        Ok(SpeechRule::new(name, dynamic_cstr, precondition, parsed))
    }

    /// Indexes `rule` and puts it at the front of the rule list.
    pub fn add_rule(&mut self, rule: SpeechRule) -> Rc<SpeechRule> {
        let entry = RuleEntry { seq: self.next_seq, rule: Rc::new(rule) };
        self.next_seq += 1;
        self.trie.add_rule(entry.clone());
        let rule = Rc::clone(&entry.rule);
        self.rules.push_front(entry);
        rule
    }

    /// Removes every other rule with the same dynamic constraint and
    /// precondition as `rule`.
    pub fn remove_duplicates(&mut self, rule: &Rc<SpeechRule>) {
        let superseded: Vec<Rc<SpeechRule>> = self
            .rules
            .iter()
            .filter(|entry| !Rc::ptr_eq(&entry.rule, rule) && entry.rule.same_selection_key(rule))
            .map(|entry| Rc::clone(&entry.rule))
            .collect();
        for old in superseded {
            debug!(rule = old.name(), dynamic = %old.dynamic_cstr(), "replacing rule with identical selection key");
            self.delete_rule(&old);
        }
    }

    /// Removes `rule` (by identity) from the list and the trie.
    pub fn delete_rule(&mut self, rule: &Rc<SpeechRule>) -> bool {
        let before = self.rules.len();
        self.rules.retain(|entry| !Rc::ptr_eq(&entry.rule, rule));
        let removed = self.rules.len() != before;
        if removed {
            self.trie.remove_rule(rule);
        }
        removed
    }

    /// Rules in list order, newest first.
    pub fn speech_rules(&self) -> impl Iterator<Item = &Rc<SpeechRule>> {
        self.rules.iter().map(|entry| &entry.rule)
    }

    pub fn find_rule(&self, pred: impl Fn(&SpeechRule) -> bool) -> Option<Rc<SpeechRule>> {
        self.speech_rules().find(|rule| pred(rule)).cloned()
    }

    pub fn find_all_rules(&self, pred: impl Fn(&SpeechRule) -> bool) -> Vec<Rc<SpeechRule>> {
        self.speech_rules().filter(|rule| pred(rule)).cloned().collect()
    }

    /// Re-defines every rule called `name` under a new precondition, keeping
    /// its dynamic constraint and action.
    pub fn define_rules_alias(&mut self, name: &str, query: &str, constraints: &[&str]) -> Result<(), LoadError> {
        let originals = self.find_all_rules(|rule| rule.name() == name);
        if originals.is_empty() {
            return Err(LoadError::UnknownRule { name: name.to_string() });
        }
        for original in originals {
            self.define_alias(&original, query, constraints);
        }
        Ok(())
    }

    /// Like [`define_rules_alias`](Self::define_rules_alias) for the single
    /// rule called `name` under `dynamic`.
    pub fn define_unique_rule_alias(
        &mut self,
        name: &str,
        dynamic: &str,
        query: &str,
        constraints: &[&str],
    ) -> Result<(), LoadError> {
        let dynamic_cstr = self.parse_cstr(dynamic).map_err(|kind| {
            LoadError::RuleDefinition(RuleDefinitionError {
                query: query.to_string(),
                spec: dynamic.to_string(),
                kind: kind.into(),
            })
        })?;
        let original = self
            .find_rule(|rule| rule.name() == name && rule.dynamic_cstr().equal(&dynamic_cstr))
            .ok_or_else(|| LoadError::UnknownRule { name: name.to_string() })?;
        self.define_alias(&original, query, constraints);
        Ok(())
    }

    fn define_alias(&mut self, original: &SpeechRule, query: &str, constraints: &[&str]) {
        let precondition = Precondition::new(query, constraints.iter().map(|c| c.to_string()).collect());
        let alias = SpeechRule::new(
            original.name(),
            original.dynamic_cstr().clone(),
            precondition,
            original.action().clone(),
        );
        let alias = self.add_rule(alias);
        self.remove_duplicates(&alias);
    }

    // --- Lookup -------------------------------------------------------------

    /// The best rule for `node` under `dynamic`, if any.
    ///
    /// Only element and text nodes have rules; anything else yields `None`.
    pub fn lookup_rule(&self, node: NodeRef<'_>, dynamic: &DynamicCstr) -> Result<Option<Rc<SpeechRule>>, QueryError> {
        if !LOOKUP_KINDS.contains(node.kind().mask()) {
            return Ok(None);
        }

        let mut candidates = Vec::new();
        'candidates: for entry in self.trie.lookup_rules(node, dynamic, &self.evaluator)? {
            for constraint in entry.rule.precondition().constraints() {
                if !self.evaluator.apply_constraint(node, constraint)? {
                    continue 'candidates;
                }
            }
            candidates.push(entry);
        }

        let comparator = Comparator::new(dynamic);
        candidates.sort_by(|a, b| b.seq.cmp(&a.seq));
        candidates.sort_by(|a, b| {
            comparator.compare(a.rule.dynamic_cstr(), b.rule.dynamic_cstr()).then_with(|| {
                b.rule.precondition().constraints().len().cmp(&a.rule.precondition().constraints().len())
            })
        });

        if tracing::enabled!(tracing::Level::TRACE) {
            let ranking: Vec<String> =
                candidates.iter().map(|e| format!("{}@{}", e.rule.name(), e.rule.dynamic_cstr())).collect();
            trace!(node = ?node, ?ranking, "rule candidates");
        }
        Ok(candidates.first().map(|entry| Rc::clone(&entry.rule)))
    }

    /// Speech for a node no rule matched: its raw text content.
    pub fn evaluate_default(&self, node: NodeRef<'_>) -> Vec<SpeechSegment> {
        vec![SpeechSegment::text(node.text_content())]
    }

    /// Logs how `rule`'s precondition fares against `node`.
    pub fn debug_speech_rule(&self, rule: &SpeechRule, node: NodeRef<'_>) -> Result<(), QueryError> {
        let precondition = rule.precondition();
        let selected = self.evaluator.apply_query(node, precondition.query())?;
        debug!(rule = rule.name(), query = precondition.query(), result = ?selected, "query");
        for constraint in precondition.constraints() {
            let holds = self.evaluator.apply_constraint(node, constraint)?;
            debug!(rule = rule.name(), constraint = constraint.as_str(), holds, "constraint");
        }
        Ok(())
    }
}
