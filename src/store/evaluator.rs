//! Precondition evaluation.

use std::rc::Rc;

use crate::dom::NodeRef;
use crate::error::QueryError;
use crate::query::{Query, QueryCache};

use super::functions::{CustomQuery, FunctionKind, Registry};

/// Applies selectors and constraints to nodes, dispatching to registered
/// custom queries before falling back to compiled path queries.
#[derive(Debug)]
pub struct PreconditionEvaluator {
    custom_queries: Registry<CustomQuery>,
    queries: QueryCache,
}

impl Default for PreconditionEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl PreconditionEvaluator {
    pub fn new() -> Self {
        PreconditionEvaluator { custom_queries: Registry::new(FunctionKind::Query), queries: QueryCache::new() }
    }

    pub fn custom_queries(&self) -> &Registry<CustomQuery> {
        &self.custom_queries
    }

    pub fn custom_queries_mut(&mut self) -> &mut Registry<CustomQuery> {
        &mut self.custom_queries
    }

    /// Compiled form of `expr`; compiled on first use.
    pub fn compile(&self, expr: &str) -> Result<Rc<Query>, QueryError> {
        self.queries.get(expr)
    }

    pub fn compiled_count(&self) -> usize {
        self.queries.len()
    }

    /// Nodes selected by `expr` from `node`, in document order.
    pub fn apply_selector<'d>(&self, node: NodeRef<'d>, expr: &str) -> Result<Vec<NodeRef<'d>>, QueryError> {
        if let Some(custom) = self.custom_queries.get(expr) {
            return Ok(custom(node));
        }
        Ok(self.compile(expr)?.select(node))
    }

    pub fn apply_query<'d>(&self, node: NodeRef<'d>, expr: &str) -> Result<Option<NodeRef<'d>>, QueryError> {
        Ok(self.apply_selector(node, expr)?.into_iter().next())
    }

    /// True when `expr` selects something from `node` or holds as a boolean test.
    pub fn apply_constraint(&self, node: NodeRef<'_>, expr: &str) -> Result<bool, QueryError> {
        if self.apply_query(node, expr)?.is_some() {
            return Ok(true);
        }
        if self.custom_queries.contains(expr) {
            return Ok(false);
        }
        Ok(self.compile(expr)?.evaluate_boolean(node))
    }

    /// String value of `expr` at `node`; custom queries yield their first
    /// node's text.
    pub fn apply_string(&self, node: NodeRef<'_>, expr: &str) -> Result<String, QueryError> {
        if let Some(custom) = self.custom_queries.get(expr) {
            return Ok(custom(node).first().map(NodeRef::text_content).unwrap_or_default());
        }
        Ok(self.compile(expr)?.evaluate_string(node))
    }

    /// Whether `query` is the node's own structural test: the first selected
    /// node is `node` itself.
    pub fn matches_self(&self, node: NodeRef<'_>, query: &str) -> Result<bool, QueryError> {
        Ok(self.apply_query(node, query)? == Some(node))
    }
}
