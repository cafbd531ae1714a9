//! Name-keyed registries of custom functions.
//!
//! Rules reach host code through three kinds of named functions; the kind is
//! visible in the name itself:
//!
//! | prefix | kind             | signature                                   |
//! |--------|------------------|---------------------------------------------|
//! | `CQF`  | custom query     | node → nodes                                |
//! | `CSF`  | custom string    | node → string                               |
//! | `CTF`  | context function | (nodes, context) → generator of items       |

use std::collections::HashMap;
use std::fmt;

use crate::dom::{NodeId, NodeRef};
use crate::error::RegistryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionKind {
    Query,
    String,
    Context,
}

impl FunctionKind {
    pub fn prefix(self) -> &'static str {
        match self {
            FunctionKind::Query => "CQF",
            FunctionKind::String => "CSF",
            FunctionKind::Context => "CTF",
        }
    }
}

impl fmt::Display for FunctionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FunctionKind::Query => "custom query",
            FunctionKind::String => "custom string",
            FunctionKind::Context => "context function",
        })
    }
}

pub type CustomQuery = Box<dyn for<'d> Fn(NodeRef<'d>) -> Vec<NodeRef<'d>>>;

pub type CustomString = Box<dyn Fn(NodeRef<'_>) -> String>;

/// One value produced by a context generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextItem {
    Text(String),
    /// A node of the same document, spoken in place of a string.
    Node(NodeId),
}

/// Stateful generator; each call yields the item for the next recursed node.
pub type ContextGenerator = Box<dyn FnMut() -> Option<ContextItem>>;

/// Builds a generator from the selected nodes and the directive's
/// `context`/`separator` attribute (empty when absent).
pub type ContextFunction = Box<dyn for<'a, 'd> Fn(&'a [NodeRef<'d>], &'a str) -> ContextGenerator>;

pub struct Registry<F> {
    kind: FunctionKind,
    entries: HashMap<String, F>,
}

impl<F> fmt::Debug for Registry<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry").field("kind", &self.kind).field("names", &self.names()).finish()
    }
}

impl<F> Registry<F> {
    pub fn new(kind: FunctionKind) -> Self {
        Registry { kind, entries: HashMap::new() }
    }

    /// A registry pre-filled with fixed entries, which must carry the kind's
    /// prefix and be distinct.
    pub fn with_entries<const N: usize>(kind: FunctionKind, entries: [(&'static str, F); N]) -> Self {
        debug_assert!(entries.iter().all(|(name, _)| name.starts_with(kind.prefix())));
        let entries: HashMap<String, F> = entries.into_iter().map(|(name, f)| (name.to_string(), f)).collect();
        debug_assert_eq!(entries.len(), N);
        Registry { kind, entries }
    }

    pub fn kind(&self) -> FunctionKind {
        self.kind
    }

    pub fn register(&mut self, name: &str, function: F) -> Result<(), RegistryError> {
        let prefix = self.kind.prefix();
        if !name.starts_with(prefix) || name.len() == prefix.len() {
            return Err(RegistryError::BadPrefix { kind: self.kind, name: name.to_string(), prefix });
        }
        if self.entries.contains_key(name) {
            return Err(RegistryError::Duplicate { kind: self.kind, name: name.to_string() });
        }
        self.entries.insert(name.to_string(), function);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&F> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// --- Built-in context functions -----------------------------------------------

/// `CTFnodeCounter`: yields `"<context> 1"`, `"<context> 2"`, ... one per node.
pub fn node_counter(nodes: &[NodeRef<'_>], context: &str) -> ContextGenerator {
    let total = nodes.len();
    let context = context.to_string();
    let mut counter = 0;
    Box::new(move || {
        if counter < total {
            counter += 1;
        }
        Some(ContextItem::Text(format!("{} {}", context, counter).trim().to_string()))
    })
}

/// `CTFcontentIterator`: yields the operator nodes stored next to an operand
/// list (`../../content/*` of the first node), in order.
pub fn content_iterator(nodes: &[NodeRef<'_>], _context: &str) -> ContextGenerator {
    let content: Vec<NodeId> = nodes
        .first()
        .and_then(|first| first.parent())
        .and_then(|list| list.parent())
        .into_iter()
        .flat_map(|owner| owner.child_elements().filter(|n| n.name() == Some("content")).collect::<Vec<_>>())
        .flat_map(|content| content.child_elements().map(|n| n.id()).collect::<Vec<_>>())
        .collect();
    let mut remaining = content.into_iter();
    Box::new(move || remaining.next().map(ContextItem::Node))
}
