//! Structural path queries.
//!
//! Rules select nodes with a compact XPath 1.0 dialect evaluated directly over
//! [`crate::dom`] trees:
//!
//! ```text
//! "self::fraction"                          element-name test on the node itself
//! "children/*[1]"                           first child element of <children>
//! "@role='unit'"                            boolean test on an attribute
//! "count(children/*)>2 and name(..)='sqrt'" functions, operators, parent step
//! ```
//!
//! Parsing is split from evaluation: [`Query::parse`] compiles an expression
//! once; the compiled form is reused for every node. A [`QueryCache`] keeps
//! compiled queries by source text so a rule store compiles each distinct
//! expression exactly once, the first time it is evaluated.
//!
//! ## Responsibilities by module
//!
//! - `lexer.rs`: tokens, with operator/name-test disambiguation.
//! - `parser.rs`: precedence-climbing parser into an `Expr` tree; function
//!   names and arities are checked here.
//! - `eval.rs`: node-set, string, number and boolean semantics.

#[path = "query/eval.rs"]
mod eval;
#[path = "query/lexer.rs"]
mod lexer;
#[path = "query/parser.rs"]
mod parser;
#[cfg(test)]
#[path = "query/tests.rs"]
mod tests;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::dom::NodeRef;
use crate::error::QueryError;

use eval::{Context, XNode};
use parser::{Axis, Expr, NodeTest, PathStart};

/// A compiled path query.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    source: String,
    expr: Expr,
}

impl Query {
    pub fn parse(source: &str) -> Result<Query, QueryError> {
        let expr = parser::parse(source)?;
        Ok(Query { source: source.to_string(), expr })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Tree nodes selected from `node`, in document order.
    ///
    /// Attribute matches and non-node-set results select nothing.
    pub fn select<'d>(&self, node: NodeRef<'d>) -> Vec<NodeRef<'d>> {
        eval::evaluate(&self.expr, &Context::new(node))
            .into_nodes()
            .into_iter()
            .filter_map(|n| match n {
                XNode::Node(node) => Some(node),
                XNode::Attribute(..) => None,
            })
            .collect()
    }

    pub fn evaluate_boolean(&self, node: NodeRef<'_>) -> bool {
        eval::evaluate(&self.expr, &Context::new(node)).to_boolean()
    }

    pub fn evaluate_string(&self, node: NodeRef<'_>) -> String {
        eval::evaluate(&self.expr, &Context::new(node)).to_text()
    }

    pub fn evaluate_number(&self, node: NodeRef<'_>) -> f64 {
        eval::evaluate(&self.expr, &Context::new(node)).to_number()
    }

    /// Element name `NAME` when the query is exactly `self::NAME`.
    pub fn self_name(&self) -> Option<&str> {
        match &self.expr {
            Expr::Path(path) if path.start == PathStart::Context && path.steps.len() == 1 => {
                let step = &path.steps[0];
                match (&step.axis, &step.test) {
                    (Axis::SelfAxis, NodeTest::Name(name)) if step.predicates.is_empty() => Some(name.as_str()),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

/// Compiled queries keyed by source text.
///
/// Compilation happens on first use; a failed compilation is not cached, so
/// the error is reported every time the expression is evaluated.
#[derive(Debug, Default)]
pub struct QueryCache {
    compiled: RefCell<HashMap<String, Rc<Query>>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, source: &str) -> Result<Rc<Query>, QueryError> {
        if let Some(query) = self.compiled.borrow().get(source) {
            return Ok(Rc::clone(query));
        }
        let query = Rc::new(Query::parse(source)?);
        self.compiled.borrow_mut().insert(source.to_string(), Rc::clone(&query));
        Ok(query)
    }

    pub fn len(&self) -> usize {
        self.compiled.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.compiled.borrow_mut().clear();
    }
}
