//! Recursive-descent parser producing the query AST.
//!
//! Precedence, loosest first:
//!
//! ```text
//! or < and < (= !=) < (< <= > >=) < (+ -) < (* div mod) < unary - < | < path
//! ```

use crate::error::QueryError;

use super::lexer::{Operator, Spanned, Token, syntax, tokenize};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Binary(Operator, Box<Expr>, Box<Expr>),
    Negate(Box<Expr>),
    Union(Box<Expr>, Box<Expr>),
    Path(Path),
    /// Primary expression narrowed by predicates.
    Filter(Box<Expr>, Vec<Expr>),
    Literal(String),
    Number(f64),
    Call(Function, Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Path {
    pub start: PathStart,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PathStart {
    Context,
    Root,
    Expr(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    Parent,
    Ancestor,
    AncestorOrSelf,
    FollowingSibling,
    PrecedingSibling,
    Following,
    Preceding,
    Attribute,
    SelfAxis,
}

impl Axis {
    fn from_name(name: &str) -> Option<Axis> {
        Some(match name {
            "child" => Axis::Child,
            "descendant" => Axis::Descendant,
            "descendant-or-self" => Axis::DescendantOrSelf,
            "parent" => Axis::Parent,
            "ancestor" => Axis::Ancestor,
            "ancestor-or-self" => Axis::AncestorOrSelf,
            "following-sibling" => Axis::FollowingSibling,
            "preceding-sibling" => Axis::PrecedingSibling,
            "following" => Axis::Following,
            "preceding" => Axis::Preceding,
            "attribute" => Axis::Attribute,
            "self" => Axis::SelfAxis,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum NodeTest {
    /// `*`: any node of the axis' principal kind.
    Any,
    Name(String),
    Node,
    Text,
    Comment,
    ProcessingInstruction(Option<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Function {
    Name,
    LocalName,
    Count,
    Contains,
    StartsWith,
    SubstringBefore,
    SubstringAfter,
    Not,
    String,
    Number,
    Boolean,
    True,
    False,
    Position,
    Last,
    StringLength,
    Concat,
    NormalizeSpace,
    Sum,
    Floor,
    Ceiling,
    Round,
}

impl Function {
    fn from_name(name: &str) -> Option<Function> {
        Some(match name {
            "name" => Function::Name,
            "local-name" => Function::LocalName,
            "count" => Function::Count,
            "contains" => Function::Contains,
            "starts-with" => Function::StartsWith,
            "substring-before" => Function::SubstringBefore,
            "substring-after" => Function::SubstringAfter,
            "not" => Function::Not,
            "string" => Function::String,
            "number" => Function::Number,
            "boolean" => Function::Boolean,
            "true" => Function::True,
            "false" => Function::False,
            "position" => Function::Position,
            "last" => Function::Last,
            "string-length" => Function::StringLength,
            "concat" => Function::Concat,
            "normalize-space" => Function::NormalizeSpace,
            "sum" => Function::Sum,
            "floor" => Function::Floor,
            "ceiling" => Function::Ceiling,
            "round" => Function::Round,
            _ => return None,
        })
    }

    /// Accepted argument counts as `(min, max)`; `None` is unbounded.
    fn arity(self) -> (usize, Option<usize>) {
        match self {
            Function::True | Function::False | Function::Position | Function::Last => (0, Some(0)),
            Function::Name
            | Function::LocalName
            | Function::String
            | Function::Number
            | Function::StringLength
            | Function::NormalizeSpace => (0, Some(1)),
            Function::Count
            | Function::Not
            | Function::Boolean
            | Function::Sum
            | Function::Floor
            | Function::Ceiling
            | Function::Round => (1, Some(1)),
            Function::Contains | Function::StartsWith | Function::SubstringBefore | Function::SubstringAfter => {
                (2, Some(2))
            }
            Function::Concat => (2, None),
        }
    }
}

fn describe_arity((min, max): (usize, Option<usize>)) -> String {
    match max {
        Some(max) if max == min => min.to_string(),
        Some(max) => format!("{} to {}", min, max),
        None => format!("at least {}", min),
    }
}

const NODE_TYPES: [&str; 4] = ["node", "text", "comment", "processing-instruction"];

pub(crate) fn parse(source: &str) -> Result<Expr, QueryError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { source, tokens, pos: 0 };
    if parser.tokens.is_empty() {
        return Err(syntax(source, 0, "empty expression"));
    }
    let expr = parser.parse_or()?;
    if let Some(extra) = parser.tokens.get(parser.pos) {
        return Err(syntax(source, extra.offset, format!("unexpected {:?}", extra.token)));
    }
    Ok(expr)
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    fn peek_at(&self, ahead: usize) -> Option<&Token> {
        self.tokens.get(self.pos + ahead).map(|t| &t.token)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.source.len(), |t| t.offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|t| t.token.clone());
        self.pos += 1;
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token, what: &str) -> Result<(), QueryError> {
        if self.eat(&token) { Ok(()) } else { Err(syntax(self.source, self.offset(), format!("expected {}", what))) }
    }

    fn eat_op(&mut self, ops: &[Operator]) -> Option<Operator> {
        match self.peek() {
            Some(Token::Op(op)) if ops.contains(op) => {
                let op = *op;
                self.pos += 1;
                Some(op)
            }
            _ => None,
        }
    }

    fn binary_level(
        &mut self,
        ops: &[Operator],
        next: fn(&mut Self) -> Result<Expr, QueryError>,
    ) -> Result<Expr, QueryError> {
        let mut lhs = next(self)?;
        while let Some(op) = self.eat_op(ops) {
            let rhs = next(self)?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_or(&mut self) -> Result<Expr, QueryError> {
        self.binary_level(&[Operator::Or], Self::parse_and)
    }

    fn parse_and(&mut self) -> Result<Expr, QueryError> {
        self.binary_level(&[Operator::And], Self::parse_equality)
    }

    fn parse_equality(&mut self) -> Result<Expr, QueryError> {
        self.binary_level(&[Operator::Eq, Operator::Neq], Self::parse_relational)
    }

    fn parse_relational(&mut self) -> Result<Expr, QueryError> {
        self.binary_level(&[Operator::Lt, Operator::Le, Operator::Gt, Operator::Ge], Self::parse_additive)
    }

    fn parse_additive(&mut self) -> Result<Expr, QueryError> {
        self.binary_level(&[Operator::Plus, Operator::Minus], Self::parse_multiplicative)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, QueryError> {
        self.binary_level(&[Operator::Mul, Operator::Div, Operator::Mod], Self::parse_unary)
    }

    fn parse_unary(&mut self) -> Result<Expr, QueryError> {
        if self.eat_op(&[Operator::Minus]).is_some() {
            return Ok(Expr::Negate(Box::new(self.parse_unary()?)));
        }
        self.parse_union()
    }

    fn parse_union(&mut self) -> Result<Expr, QueryError> {
        let mut lhs = self.parse_path_expr()?;
        while self.eat(&Token::Pipe) {
            let rhs = self.parse_path_expr()?;
            lhs = Expr::Union(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn starts_step(&self) -> bool {
        matches!(self.peek(), Some(Token::Name(_) | Token::Star | Token::At | Token::Dot | Token::DotDot))
    }

    fn starts_filter(&self) -> bool {
        match (self.peek(), self.peek_at(1)) {
            (Some(Token::Literal(_) | Token::Number(_) | Token::LParen), _) => true,
            (Some(Token::Name(name)), Some(Token::LParen)) => !NODE_TYPES.contains(&name.as_str()),
            _ => false,
        }
    }

    fn parse_path_expr(&mut self) -> Result<Expr, QueryError> {
        if self.eat(&Token::Slash) {
            let steps = if self.starts_step() { self.parse_relative_steps()? } else { Vec::new() };
            return Ok(Expr::Path(Path { start: PathStart::Root, steps }));
        }
        if self.eat(&Token::DoubleSlash) {
            let mut steps = vec![descendant_or_self()];
            steps.extend(self.parse_relative_steps()?);
            return Ok(Expr::Path(Path { start: PathStart::Root, steps }));
        }
        if self.starts_filter() {
            let primary = self.parse_primary()?;
            let predicates = self.parse_predicates()?;
            let filtered = if predicates.is_empty() { primary } else { Expr::Filter(Box::new(primary), predicates) };
            let mut steps = Vec::new();
            if self.eat(&Token::Slash) {
                steps = self.parse_relative_steps()?;
            } else if self.eat(&Token::DoubleSlash) {
                steps.push(descendant_or_self());
                steps.extend(self.parse_relative_steps()?);
            }
            if steps.is_empty() {
                return Ok(filtered);
            }
            return Ok(Expr::Path(Path { start: PathStart::Expr(Box::new(filtered)), steps }));
        }
        if self.starts_step() {
            let steps = self.parse_relative_steps()?;
            return Ok(Expr::Path(Path { start: PathStart::Context, steps }));
        }
        Err(syntax(self.source, self.offset(), "expected an expression"))
    }

    fn parse_relative_steps(&mut self) -> Result<Vec<Step>, QueryError> {
        let mut steps = vec![self.parse_step()?];
        loop {
            if self.eat(&Token::Slash) {
                steps.push(self.parse_step()?);
            } else if self.eat(&Token::DoubleSlash) {
                steps.push(descendant_or_self());
                steps.push(self.parse_step()?);
            } else {
                return Ok(steps);
            }
        }
    }

    fn parse_step(&mut self) -> Result<Step, QueryError> {
        if self.eat(&Token::Dot) {
            return Ok(Step { axis: Axis::SelfAxis, test: NodeTest::Node, predicates: Vec::new() });
        }
        if self.eat(&Token::DotDot) {
            return Ok(Step { axis: Axis::Parent, test: NodeTest::Node, predicates: Vec::new() });
        }

        let axis = if self.eat(&Token::At) {
            Axis::Attribute
        } else if let (Some(Token::Name(name)), Some(Token::ColonColon)) = (self.peek(), self.peek_at(1)) {
            let axis = Axis::from_name(name).ok_or_else(|| QueryError::UnknownAxis {
                expr: self.source.to_string(),
                axis: name.clone(),
            })?;
            self.pos += 2;
            axis
        } else {
            Axis::Child
        };

        let test = self.parse_node_test()?;
        let predicates = self.parse_predicates()?;
        Ok(Step { axis, test, predicates })
    }

    fn parse_node_test(&mut self) -> Result<NodeTest, QueryError> {
        let offset = self.offset();
        match self.advance() {
            Some(Token::Star) => Ok(NodeTest::Any),
            Some(Token::Name(name)) if self.peek() == Some(&Token::LParen) && NODE_TYPES.contains(&name.as_str()) => {
                self.pos += 1;
                let test = match name.as_str() {
                    "node" => NodeTest::Node,
                    "text" => NodeTest::Text,
                    "comment" => NodeTest::Comment,
                    _ => match self.peek() {
                        Some(Token::Literal(target)) => {
                            let target = target.clone();
                            self.pos += 1;
                            NodeTest::ProcessingInstruction(Some(target))
                        }
                        _ => NodeTest::ProcessingInstruction(None),
                    },
                };
                self.expect(Token::RParen, "`)`")?;
                Ok(test)
            }
            Some(Token::Name(name)) => Ok(NodeTest::Name(name)),
            _ => Err(syntax(self.source, offset, "expected a node test")),
        }
    }

    fn parse_predicates(&mut self) -> Result<Vec<Expr>, QueryError> {
        let mut predicates = Vec::new();
        while self.eat(&Token::LBracket) {
            predicates.push(self.parse_or()?);
            self.expect(Token::RBracket, "`]`")?;
        }
        Ok(predicates)
    }

    fn parse_primary(&mut self) -> Result<Expr, QueryError> {
        let offset = self.offset();
        match self.advance() {
            Some(Token::Literal(text)) => Ok(Expr::Literal(text)),
            Some(Token::Number(value)) => Ok(Expr::Number(value)),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen, "`)`")?;
                Ok(inner)
            }
            Some(Token::Name(name)) => {
                let function = Function::from_name(&name)
                    .ok_or_else(|| QueryError::UnknownFunction { expr: self.source.to_string(), name: name.clone() })?;
                self.expect(Token::LParen, "`(`")?;
                let mut args = Vec::new();
                if !self.eat(&Token::RParen) {
                    loop {
                        args.push(self.parse_or()?);
                        if self.eat(&Token::Comma) {
                            continue;
                        }
                        self.expect(Token::RParen, "`)` or `,`")?;
                        break;
                    }
                }
                let (min, max) = function.arity();
                if args.len() < min || max.is_some_and(|max| args.len() > max) {
                    return Err(QueryError::Arity {
                        expr: self.source.to_string(),
                        name,
                        expected: describe_arity((min, max)),
                        found: args.len(),
                    });
                }
                Ok(Expr::Call(function, args))
            }
            _ => Err(syntax(self.source, offset, "expected a primary expression")),
        }
    }
}

fn descendant_or_self() -> Step {
    Step { axis: Axis::DescendantOrSelf, test: NodeTest::Node, predicates: Vec::new() }
}
