//! Trie index over rule selection keys.
//!
//! ```text
//! root
//!  ├─ "self::fraction"            (query level: structural test)
//!  │    └─ "en"                   (locale)
//!  │        ├─ "mathspeak"        (domain)
//!  │        │    ├─ "default"     (style)  → [rules]
//!  │        │    └─ "brief"                → [rules]
//!  │        └─ "default" ...
//!  └─ "self::*" ...
//! ```
//!
//! Plain `self::NAME` branches are filed under the element name, so a lookup
//! probes one name and runs the structural test only for the remaining
//! queries. It then walks the axis levels, following both the requested value
//! and the axis default at every level.

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::dom::NodeRef;
use crate::dynamic_cstr::{Axis, DynamicCstr};
use crate::error::QueryError;
use crate::query::Query;

use super::SpeechRule;
use super::evaluator::PreconditionEvaluator;

/// A stored rule with its insertion sequence number.
#[derive(Debug, Clone)]
pub struct RuleEntry {
    pub seq: u64,
    pub rule: Rc<SpeechRule>,
}

#[derive(Debug, Default)]
struct TrieNode {
    children: BTreeMap<String, TrieNode>,
    rules: Vec<RuleEntry>,
}

impl TrieNode {
    fn is_empty(&self) -> bool {
        self.children.is_empty() && self.rules.is_empty()
    }

    fn remove(&mut self, path: &[&str], rule: &Rc<SpeechRule>) -> bool {
        let Some((head, rest)) = path.split_first() else {
            let before = self.rules.len();
            self.rules.retain(|entry| !Rc::ptr_eq(&entry.rule, rule));
            return self.rules.len() != before;
        };
        let Some(child) = self.children.get_mut(*head) else {
            return false;
        };
        let removed = child.remove(rest, rule);
        if child.is_empty() {
            self.children.remove(*head);
        }
        removed
    }

    fn collect<'t>(&'t self, levels: &[(Axis, Vec<&str>)], out: &mut Vec<&'t RuleEntry>) {
        match levels.split_first() {
            None => out.extend(self.rules.iter()),
            Some(((_, values), rest)) => {
                for value in values {
                    if let Some(child) = self.children.get(*value) {
                        child.collect(rest, out);
                    }
                }
            }
        }
    }

    fn collect_all<'t>(&'t self, out: &mut Vec<&'t RuleEntry>) {
        out.extend(self.rules.iter());
        for child in self.children.values() {
            child.collect_all(out);
        }
    }
}

#[derive(Debug, Default)]
pub struct Trie {
    /// Plain `self::NAME` queries, keyed by element name and then query text.
    /// A lookup probes only the node's own name here.
    named: BTreeMap<String, BTreeMap<String, TrieNode>>,
    /// Every other query; its structural test runs on each lookup.
    general: BTreeMap<String, TrieNode>,
    len: usize,
}

/// Element name of a plain `self::NAME` query.
fn self_name(query: &str) -> Option<String> {
    Query::parse(query).ok().and_then(|q| q.self_name().map(str::to_string))
}

fn prune(branches: &mut BTreeMap<String, TrieNode>, query: &str, path: &[&str], rule: &Rc<SpeechRule>) -> bool {
    let Some(node) = branches.get_mut(query) else {
        return false;
    };
    let removed = node.remove(path, rule);
    if node.is_empty() {
        branches.remove(query);
    }
    removed
}

impl Trie {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of query branches whose structural test runs on every lookup.
    pub fn scanned_queries(&self) -> usize {
        self.general.len()
    }

    pub fn add_rule(&mut self, entry: RuleEntry) {
        let rule = Rc::clone(&entry.rule);
        let query = rule.precondition().query();
        let branches = match self_name(query) {
            Some(name) => self.named.entry(name).or_default(),
            None => &mut self.general,
        };

        let mut node = branches.entry(query.to_string()).or_default();
        for (_, value) in rule.dynamic_cstr().all_properties() {
            node = node.children.entry(value.to_string()).or_default();
        }
        node.rules.push(entry);
        self.len += 1;
    }

    /// Removes `rule` (by identity); empty branches are pruned.
    pub fn remove_rule(&mut self, rule: &Rc<SpeechRule>) -> bool {
        let query = rule.precondition().query();
        let path: Vec<&str> = rule.dynamic_cstr().all_properties().into_iter().map(|(_, value)| value).collect();
        let removed = match self_name(query) {
            Some(name) => {
                let Some(branches) = self.named.get_mut(&name) else {
                    return false;
                };
                let removed = prune(branches, query, &path, rule);
                if branches.is_empty() {
                    self.named.remove(&name);
                }
                removed
            }
            None => prune(&mut self.general, query, &path, rule),
        };
        if removed {
            self.len -= 1;
        }
        removed
    }

    /// Rules whose structural test matches `node` and whose axis values equal
    /// the requested value or the axis default, for every axis.
    pub fn lookup_rules<'t>(
        &'t self,
        node: NodeRef<'_>,
        dynamic: &DynamicCstr,
        evaluator: &PreconditionEvaluator,
    ) -> Result<Vec<&'t RuleEntry>, QueryError> {
        let levels = dynamic.fallback_properties();
        let mut out = Vec::new();
        let named = node.is_element().then(|| node.name()).flatten().and_then(|name| self.named.get(name));
        for branch in named.into_iter().flat_map(BTreeMap::values) {
            branch.collect(&levels, &mut out);
        }
        for (query, branch) in &self.general {
            if evaluator.matches_self(node, query)? {
                branch.collect(&levels, &mut out);
            }
        }
        Ok(out)
    }

    pub fn all_rules(&self) -> Vec<&RuleEntry> {
        let mut out = Vec::new();
        for branch in self.named.values().flat_map(BTreeMap::values).chain(self.general.values()) {
            branch.collect_all(&mut out);
        }
        out
    }
}
