//! Query evaluation over [`NodeRef`] trees.

use std::cmp::Ordering;

use crate::dom::{NodeKind, NodeRef};

use super::lexer::Operator;
use super::parser::{Axis, Expr, Function, NodeTest, Path, PathStart, Step};

/// A node-set member: a tree node or one attribute of an element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum XNode<'d> {
    Node(NodeRef<'d>),
    Attribute(NodeRef<'d>, usize),
}

impl<'d> XNode<'d> {
    /// Document-order key; attributes sort right after their owner.
    fn order_key(&self) -> (usize, usize) {
        match self {
            XNode::Node(node) => (node.document_order(), 0),
            XNode::Attribute(owner, index) => (owner.document_order(), index + 1),
        }
    }

    fn owner(&self) -> NodeRef<'d> {
        match self {
            XNode::Node(node) | XNode::Attribute(node, _) => *node,
        }
    }

    fn name(&self) -> Option<&'d str> {
        match self {
            XNode::Node(node) => node.name(),
            XNode::Attribute(owner, index) => owner.attributes().get(*index).map(|(k, _)| k.as_str()),
        }
    }

    fn string_value(&self) -> String {
        match self {
            XNode::Node(node) => node.text_content(),
            XNode::Attribute(owner, index) => owner.attributes().get(*index).map(|(_, v)| v.clone()).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Value<'d> {
    Nodes(Vec<XNode<'d>>),
    Text(String),
    Number(f64),
    Boolean(bool),
}

impl<'d> Value<'d> {
    pub fn into_nodes(self) -> Vec<XNode<'d>> {
        match self {
            Value::Nodes(nodes) => nodes,
            _ => Vec::new(),
        }
    }

    pub fn to_boolean(&self) -> bool {
        match self {
            Value::Nodes(nodes) => !nodes.is_empty(),
            Value::Text(text) => !text.is_empty(),
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Boolean(b) => *b,
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Nodes(_) | Value::Text(_) => string_to_number(&self.to_text()),
            Value::Number(n) => *n,
            Value::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    pub fn to_text(&self) -> String {
        match self {
            Value::Nodes(nodes) => nodes.first().map(XNode::string_value).unwrap_or_default(),
            Value::Text(text) => text.clone(),
            Value::Number(n) => number_to_string(*n),
            Value::Boolean(b) => b.to_string(),
        }
    }
}

fn string_to_number(text: &str) -> f64 {
    let trimmed = text.trim();
    if regex!(r"^-?(?:\d+(?:\.\d*)?|\.\d+)$").is_match(trimmed) {
        trimmed.parse().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}

fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() }
    } else if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Context<'d> {
    pub node: XNode<'d>,
    pub position: usize,
    pub size: usize,
}

impl<'d> Context<'d> {
    pub fn new(node: NodeRef<'d>) -> Self {
        Context { node: XNode::Node(node), position: 1, size: 1 }
    }
}

pub(crate) fn evaluate<'d>(expr: &Expr, ctx: &Context<'d>) -> Value<'d> {
    match expr {
        Expr::Literal(text) => Value::Text(text.clone()),
        Expr::Number(n) => Value::Number(*n),
        Expr::Negate(inner) => Value::Number(-evaluate(inner, ctx).to_number()),
        Expr::Binary(Operator::Or, lhs, rhs) => {
            Value::Boolean(evaluate(lhs, ctx).to_boolean() || evaluate(rhs, ctx).to_boolean())
        }
        Expr::Binary(Operator::And, lhs, rhs) => {
            Value::Boolean(evaluate(lhs, ctx).to_boolean() && evaluate(rhs, ctx).to_boolean())
        }
        Expr::Binary(op, lhs, rhs) if op.is_comparison() => {
            Value::Boolean(compare(*op, &evaluate(lhs, ctx), &evaluate(rhs, ctx)))
        }
        Expr::Binary(op, lhs, rhs) => {
            let a = evaluate(lhs, ctx).to_number();
            let b = evaluate(rhs, ctx).to_number();
            Value::Number(match op {
                Operator::Plus => a + b,
                Operator::Minus => a - b,
                Operator::Mul => a * b,
                Operator::Div => a / b,
                _ => a % b,
            })
        }
        Expr::Union(lhs, rhs) => {
            let mut nodes = evaluate(lhs, ctx).into_nodes();
            nodes.extend(evaluate(rhs, ctx).into_nodes());
            Value::Nodes(document_order(nodes))
        }
        Expr::Path(path) => Value::Nodes(evaluate_path(path, ctx)),
        Expr::Filter(primary, predicates) => {
            let nodes = evaluate(primary, ctx).into_nodes();
            Value::Nodes(predicates.iter().fold(nodes, |nodes, predicate| filter(nodes, predicate)))
        }
        Expr::Call(function, args) => call(*function, args, ctx),
    }
}

fn evaluate_path<'d>(path: &Path, ctx: &Context<'d>) -> Vec<XNode<'d>> {
    let mut current = match &path.start {
        PathStart::Context => vec![ctx.node],
        PathStart::Root => vec![XNode::Node(ctx.node.owner().document().root())],
        PathStart::Expr(expr) => evaluate(expr, ctx).into_nodes(),
    };
    for step in &path.steps {
        let mut next = Vec::new();
        for node in &current {
            next.extend(evaluate_step(step, *node));
        }
        current = document_order(next);
    }
    current
}

fn evaluate_step<'d>(step: &Step, node: XNode<'d>) -> Vec<XNode<'d>> {
    // Candidates in axis order, so proximity positions are list positions.
    let candidates: Vec<XNode<'d>> =
        axis_nodes(step.axis, node).into_iter().filter(|candidate| matches_test(step, candidate)).collect();
    step.predicates.iter().fold(candidates, |nodes, predicate| filter(nodes, predicate))
}

fn filter<'d>(nodes: Vec<XNode<'d>>, predicate: &Expr) -> Vec<XNode<'d>> {
    let size = nodes.len();
    nodes
        .into_iter()
        .enumerate()
        .filter(|(i, node)| {
            let ctx = Context { node: *node, position: i + 1, size };
            match evaluate(predicate, &ctx) {
                Value::Number(n) => n == (i + 1) as f64,
                other => other.to_boolean(),
            }
        })
        .map(|(_, node)| node)
        .collect()
}

fn axis_nodes<'d>(axis: Axis, xnode: XNode<'d>) -> Vec<XNode<'d>> {
    let wrap = |nodes: Vec<NodeRef<'d>>| nodes.into_iter().map(XNode::Node).collect::<Vec<_>>();
    let node = match xnode {
        XNode::Node(node) => node,
        XNode::Attribute(owner, _) => {
            return match axis {
                Axis::SelfAxis => vec![xnode],
                Axis::Parent => vec![XNode::Node(owner)],
                Axis::Ancestor | Axis::AncestorOrSelf => {
                    let mut out = if axis == Axis::AncestorOrSelf { vec![xnode] } else { Vec::new() };
                    out.push(XNode::Node(owner));
                    out.extend(wrap(owner.ancestors()));
                    out
                }
                _ => Vec::new(),
            };
        }
    };

    match axis {
        Axis::SelfAxis => vec![xnode],
        Axis::Child => wrap(node.children().collect()),
        Axis::Descendant => wrap(node.descendants()),
        Axis::DescendantOrSelf => {
            let mut out = vec![xnode];
            out.extend(wrap(node.descendants()));
            out
        }
        Axis::Parent => wrap(node.parent().into_iter().collect()),
        Axis::Ancestor => wrap(node.ancestors()),
        Axis::AncestorOrSelf => {
            let mut out = vec![xnode];
            out.extend(wrap(node.ancestors()));
            out
        }
        Axis::FollowingSibling => wrap(node.following_siblings()),
        Axis::PrecedingSibling => wrap(node.preceding_siblings()),
        Axis::Following => {
            let mut out = Vec::new();
            let mut current = Some(node);
            while let Some(at) = current {
                for sibling in at.following_siblings() {
                    out.push(sibling);
                    out.extend(sibling.descendants());
                }
                current = at.parent();
            }
            wrap(out)
        }
        Axis::Preceding => {
            let order = node.document_order();
            let ancestors = node.ancestors();
            let mut out: Vec<_> = node
                .document()
                .root()
                .descendants()
                .into_iter()
                .filter(|n| n.document_order() < order && !ancestors.contains(n))
                .collect();
            out.reverse();
            wrap(out)
        }
        Axis::Attribute => (0..node.attributes().len()).map(|i| XNode::Attribute(node, i)).collect(),
    }
}

fn matches_test(step: &Step, candidate: &XNode<'_>) -> bool {
    let principal_attribute = step.axis == Axis::Attribute;
    match (&step.test, candidate) {
        (NodeTest::Node, _) => true,
        (NodeTest::Any, XNode::Attribute(..)) => principal_attribute,
        (NodeTest::Any, XNode::Node(node)) => !principal_attribute && node.kind() == NodeKind::Element,
        (NodeTest::Name(name), XNode::Attribute(..)) => principal_attribute && candidate.name() == Some(name.as_str()),
        (NodeTest::Name(name), XNode::Node(node)) => {
            !principal_attribute && node.kind() == NodeKind::Element && node.name() == Some(name.as_str())
        }
        (NodeTest::Text, XNode::Node(node)) => node.kind() == NodeKind::Text,
        (NodeTest::Comment, XNode::Node(node)) => node.kind() == NodeKind::Comment,
        (NodeTest::ProcessingInstruction(target), XNode::Node(node)) => {
            node.kind() == NodeKind::ProcessingInstruction
                && target.as_deref().is_none_or(|target| node.name() == Some(target))
        }
        _ => false,
    }
}

fn document_order(mut nodes: Vec<XNode<'_>>) -> Vec<XNode<'_>> {
    nodes.sort_by_key(XNode::order_key);
    nodes.dedup_by_key(|n| n.order_key());
    nodes
}

fn compare<'d>(op: Operator, lhs: &Value<'d>, rhs: &Value<'d>) -> bool {
    match (lhs, rhs) {
        (Value::Nodes(a), Value::Nodes(b)) => {
            let right: Vec<String> = b.iter().map(XNode::string_value).collect();
            a.iter().any(|x| {
                let left = x.string_value();
                right.iter().any(|r| compare_atoms(op, &Value::Text(left.clone()), &Value::Text(r.clone())))
            })
        }
        (Value::Nodes(nodes), Value::Boolean(_)) => compare_atoms(op, &Value::Boolean(!nodes.is_empty()), rhs),
        (Value::Boolean(_), Value::Nodes(nodes)) => compare_atoms(op, lhs, &Value::Boolean(!nodes.is_empty())),
        (Value::Nodes(nodes), atom) => nodes.iter().any(|n| compare_atoms(op, &node_as(atom, n), atom)),
        (atom, Value::Nodes(nodes)) => nodes.iter().any(|n| compare_atoms(op, atom, &node_as(atom, n))),
        _ => compare_atoms(op, lhs, rhs),
    }
}

/// A node's string value converted to the type of the atom it is compared with.
fn node_as<'d>(atom: &Value<'d>, node: &XNode<'d>) -> Value<'d> {
    match atom {
        Value::Number(_) => Value::Number(string_to_number(&node.string_value())),
        _ => Value::Text(node.string_value()),
    }
}

fn compare_atoms(op: Operator, lhs: &Value<'_>, rhs: &Value<'_>) -> bool {
    match op {
        Operator::Eq | Operator::Neq => {
            let equal = if matches!(lhs, Value::Boolean(_)) || matches!(rhs, Value::Boolean(_)) {
                lhs.to_boolean() == rhs.to_boolean()
            } else if matches!(lhs, Value::Number(_)) || matches!(rhs, Value::Number(_)) {
                lhs.to_number() == rhs.to_number()
            } else {
                lhs.to_text() == rhs.to_text()
            };
            equal == (op == Operator::Eq)
        }
        _ => {
            let ordering = lhs.to_number().partial_cmp(&rhs.to_number());
            match (op, ordering) {
                (_, None) => false,
                (Operator::Lt, Some(o)) => o == Ordering::Less,
                (Operator::Le, Some(o)) => o != Ordering::Greater,
                (Operator::Gt, Some(o)) => o == Ordering::Greater,
                (Operator::Ge, Some(o)) => o != Ordering::Less,
                _ => false,
            }
        }
    }
}

fn call<'d>(function: Function, args: &[Expr], ctx: &Context<'d>) -> Value<'d> {
    let arg = |i: usize| evaluate(&args[i], ctx);
    // Zero-argument string functions default to the context node.
    let text_or_context = || if args.is_empty() { ctx.node.string_value() } else { arg(0).to_text() };
    let first_node = || if args.is_empty() { Some(ctx.node) } else { arg(0).into_nodes().into_iter().next() };

    match function {
        Function::Name => Value::Text(first_node().and_then(|n| n.name()).unwrap_or_default().to_string()),
        Function::LocalName => {
            let name = first_node().and_then(|n| n.name()).unwrap_or_default();
            Value::Text(name.rsplit(':').next().unwrap_or_default().to_string())
        }
        Function::Count => Value::Number(arg(0).into_nodes().len() as f64),
        Function::Contains => Value::Boolean(arg(0).to_text().contains(&arg(1).to_text())),
        Function::StartsWith => Value::Boolean(arg(0).to_text().starts_with(&arg(1).to_text())),
        Function::SubstringBefore => {
            let haystack = arg(0).to_text();
            let needle = arg(1).to_text();
            Value::Text(haystack.split_once(needle.as_str()).map(|(before, _)| before.to_string()).unwrap_or_default())
        }
        Function::SubstringAfter => {
            let haystack = arg(0).to_text();
            let needle = arg(1).to_text();
            Value::Text(haystack.split_once(needle.as_str()).map(|(_, after)| after.to_string()).unwrap_or_default())
        }
        Function::Not => Value::Boolean(!arg(0).to_boolean()),
        Function::Boolean => Value::Boolean(arg(0).to_boolean()),
        Function::True => Value::Boolean(true),
        Function::False => Value::Boolean(false),
        Function::String => Value::Text(text_or_context()),
        Function::Number => {
            if args.is_empty() {
                Value::Number(string_to_number(&ctx.node.string_value()))
            } else {
                Value::Number(arg(0).to_number())
            }
        }
        Function::Position => Value::Number(ctx.position as f64),
        Function::Last => Value::Number(ctx.size as f64),
        Function::StringLength => Value::Number(text_or_context().chars().count() as f64),
        Function::Concat => Value::Text((0..args.len()).map(|i| arg(i).to_text()).collect()),
        Function::NormalizeSpace => Value::Text(text_or_context().split_whitespace().collect::<Vec<_>>().join(" ")),
        Function::Sum => {
            Value::Number(arg(0).into_nodes().iter().map(|n| string_to_number(&n.string_value())).sum())
        }
        Function::Floor => Value::Number(arg(0).to_number().floor()),
        Function::Ceiling => Value::Number(arg(0).to_number().ceil()),
        Function::Round => Value::Number((arg(0).to_number() + 0.5).floor()),
    }
}
