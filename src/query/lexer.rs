//! Query tokenizer.
//!
//! `*` and the names `and`, `or`, `div`, `mod` are ambiguous in path queries:
//! they are operators only when the previous token could end an operand.
//! The tokenizer resolves this so the parser never has to look back.

use crate::error::QueryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Operator {
    Or,
    And,
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Mul,
    Div,
    Mod,
}

impl Operator {
    pub fn is_comparison(self) -> bool {
        matches!(self, Operator::Eq | Operator::Neq | Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Slash,
    DoubleSlash,
    LBracket,
    RBracket,
    LParen,
    RParen,
    At,
    Comma,
    Pipe,
    Dot,
    DotDot,
    ColonColon,
    /// `*` as a name test.
    Star,
    Literal(String),
    Number(f64),
    Name(String),
    Op(Operator),
}

impl Token {
    /// Whether a following `*` or operator name must be read as an operator.
    fn ends_operand(&self) -> bool {
        matches!(
            self,
            Token::RBracket
                | Token::RParen
                | Token::Dot
                | Token::DotDot
                | Token::Star
                | Token::Literal(_)
                | Token::Number(_)
                | Token::Name(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub offset: usize,
}

pub(crate) fn tokenize(expr: &str) -> Result<Vec<Spanned>, QueryError> {
    let mut tokens: Vec<Spanned> = Vec::new();
    let mut pos = 0;

    while pos < expr.len() {
        let rest = &expr[pos..];
        let Some(c) = rest.chars().next() else { break };
        if c.is_whitespace() {
            pos += c.len_utf8();
            continue;
        }

        let operator_context = tokens.last().is_some_and(|t| t.token.ends_operand());
        let start = pos;
        let (token, len) = if rest.starts_with("//") {
            (Token::DoubleSlash, 2)
        } else if rest.starts_with("::") {
            (Token::ColonColon, 2)
        } else if rest.starts_with("..") {
            (Token::DotDot, 2)
        } else if rest.starts_with("!=") {
            (Token::Op(Operator::Neq), 2)
        } else if rest.starts_with("<=") {
            (Token::Op(Operator::Le), 2)
        } else if rest.starts_with(">=") {
            (Token::Op(Operator::Ge), 2)
        } else if let Some(m) = regex!(r"^(?:\d+(?:\.\d*)?|\.\d+)").find(rest) {
            let value = m.as_str().parse::<f64>().map_err(|_| syntax(expr, pos, "invalid number"))?;
            (Token::Number(value), m.end())
        } else if let Some(m) = regex!(r"^[A-Za-z_][\w.\-]*(?::[A-Za-z_][\w.\-]*)?").find(rest) {
            let name = m.as_str();
            let token = match name {
                "and" if operator_context => Token::Op(Operator::And),
                "or" if operator_context => Token::Op(Operator::Or),
                "div" if operator_context => Token::Op(Operator::Div),
                "mod" if operator_context => Token::Op(Operator::Mod),
                _ => Token::Name(name.to_string()),
            };
            (token, m.end())
        } else {
            match c {
                '"' | '\'' => {
                    let close = rest[1..].find(c).ok_or_else(|| syntax(expr, pos, "unterminated string literal"))?;
                    (Token::Literal(rest[1..1 + close].to_string()), close + 2)
                }
                '/' => (Token::Slash, 1),
                '[' => (Token::LBracket, 1),
                ']' => (Token::RBracket, 1),
                '(' => (Token::LParen, 1),
                ')' => (Token::RParen, 1),
                '@' => (Token::At, 1),
                ',' => (Token::Comma, 1),
                '|' => (Token::Pipe, 1),
                '.' => (Token::Dot, 1),
                '*' if operator_context => (Token::Op(Operator::Mul), 1),
                '*' => (Token::Star, 1),
                '=' => (Token::Op(Operator::Eq), 1),
                '<' => (Token::Op(Operator::Lt), 1),
                '>' => (Token::Op(Operator::Gt), 1),
                '+' => (Token::Op(Operator::Plus), 1),
                '-' => (Token::Op(Operator::Minus), 1),
                other => return Err(syntax(expr, pos, format!("unexpected character `{}`", other))),
            }
        };
        tokens.push(Spanned { token, offset: start });
        pos += len;
    }
    Ok(tokens)
}

pub(crate) fn syntax(expr: &str, offset: usize, message: impl Into<String>) -> QueryError {
    QueryError::Syntax { expr: expr.to_string(), offset, message: message.into() }
}
