//! Locale vocabulary used by the bundled rule sets.
//!
//! Tables are plain data; the functions here turn counts and positions into
//! words the way each locale expects.

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// MathSpeak building blocks. Rules glue these together (`Start` + `Fraction`).
#[derive(Debug)]
pub struct MathspeakMessages {
    pub start: &'static str,
    pub end: &'static str,
    pub frac_verbose: &'static str,
    pub frac_brief: &'static str,
    pub frac_sbrief: &'static str,
    pub frac_over: &'static str,
    pub nest_frac: &'static str,
    pub twice: &'static str,
    pub superscript: &'static str,
    pub sup: &'static str,
    pub subscript: &'static str,
    pub sub: &'static str,
    pub baseline: &'static str,
    pub base: &'static str,
    pub squared: &'static str,
    pub cubed: &'static str,
    pub nested: &'static str,
    pub nest_root: &'static str,
    pub start_root: &'static str,
    pub end_root: &'static str,
    pub root_index: &'static str,
    pub root: &'static str,
    pub matrix: &'static str,
    pub by: &'static str,
    pub row: &'static str,
    pub column: &'static str,
}

pub static MATHSPEAK_EN: MathspeakMessages = MathspeakMessages {
    start: "Start",
    end: "End",
    frac_verbose: "Fraction",
    frac_brief: "Frac",
    frac_sbrief: "Frac",
    frac_over: "Over",
    nest_frac: "Nest",
    twice: "Twice",
    superscript: "Superscript",
    sup: "Sup",
    subscript: "Subscript",
    sub: "Sub",
    baseline: "Baseline",
    base: "Base",
    squared: "squared",
    cubed: "cubed",
    nested: "Nested",
    nest_root: "Nest",
    start_root: "StartRoot",
    end_root: "EndRoot",
    root_index: "RootIndex",
    root: "Root",
    matrix: "Matrix",
    by: "By",
    row: "Row",
    column: "Column",
};

/// Words announced before each part of an expression in the prefix domain.
#[derive(Debug)]
pub struct PrefixMessages {
    pub locale: &'static str,
    pub numerator: &'static str,
    pub denominator: &'static str,
    pub base: &'static str,
    pub exponent: &'static str,
    pub subscript: &'static str,
    pub overscript: &'static str,
    pub underscript: &'static str,
    pub radicand: &'static str,
    pub index: &'static str,
    pub left_subscript: &'static str,
    pub left_superscript: &'static str,
    pub right_subscript: &'static str,
    pub right_superscript: &'static str,
    pub choice: &'static str,
    pub select: &'static str,
    pub row: &'static str,
    pub column: &'static str,
    pub ordinal: fn(usize) -> String,
}

pub static PREFIX_EN: PrefixMessages = PrefixMessages {
    locale: "en",
    numerator: "Numerator",
    denominator: "Denominator",
    base: "Base",
    exponent: "Exponent",
    subscript: "Subscript",
    overscript: "Overscript",
    underscript: "Underscript",
    radicand: "Radicand",
    index: "Index",
    left_subscript: "Left Subscript",
    left_superscript: "Left Superscript",
    right_subscript: "Right Subscript",
    right_superscript: "Right Superscript",
    choice: "Choice Quantity",
    select: "Selection Quantity",
    row: "Row",
    column: "Column",
    ordinal: simple_ordinal_en,
};

pub static PREFIX_ES: PrefixMessages = PrefixMessages {
    locale: "es",
    numerator: "numerador",
    denominator: "denominador",
    base: "base",
    exponent: "exponente",
    subscript: "subíndice",
    overscript: "overscript",
    underscript: "underscript",
    radicand: "radicand",
    index: "índice",
    left_subscript: "subíndice izquierdo",
    left_superscript: "superíndice izquierdo",
    right_subscript: "derecha subíndice",
    right_superscript: "superíndice derecho",
    choice: "cantidad de elección",
    select: "cantidad de selección",
    row: "fila",
    column: "columna",
    ordinal: simple_ordinal_es,
};

/// Root indices spoken by name instead of as `RootIndex n`.
pub static ROOT_INDEX_NAMES: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| HashMap::from([("2", "Square"), ("3", "Cube")]));

/// Spoken names of operators, relations and fences.
pub static OPERATOR_NAMES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("+", "plus"),
        ("-", "minus"),
        ("−", "minus"),
        ("±", "plus-or-minus"),
        ("∓", "minus-or-plus"),
        ("×", "times"),
        ("*", "times"),
        ("·", "dot"),
        ("⋅", "dot"),
        ("/", "slash"),
        ("÷", "divided by"),
        ("=", "equals"),
        ("≠", "not-equals"),
        ("<", "less-than"),
        (">", "greater-than"),
        ("≤", "less-than-or-equals"),
        ("≥", "greater-than-or-equals"),
        ("≈", "almost-equals"),
        ("∈", "element-of"),
        ("→", "right-arrow"),
        ("(", "left-parenthesis"),
        (")", "right-parenthesis"),
        ("[", "left-bracket"),
        ("]", "right-bracket"),
        ("{", "left-brace"),
        ("}", "right-brace"),
        ("|", "vertical-bar"),
        (",", "comma"),
    ])
});

/// `1st`, `2nd`, `3rd`, `4th`, ..., `11th`, `12th`, `13th`, `21st`, ...
pub fn simple_ordinal_en(n: usize) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

pub fn simple_ordinal_es(n: usize) -> String {
    format!("{}º", n)
}

/// Words marking a fraction nested `depth` levels deep, for verbose and brief
/// styles: `Start` + `Fraction` becomes `StartStartFraction` at depth 2.
pub fn nested_fraction(depth: usize, expr: &str, end: Option<&str>) -> String {
    let mut out = expr.repeat(depth.max(1));
    if let Some(end) = end {
        out.push_str(end);
    }
    out
}

/// `""`, `"Twice"`, `"3"`, ...: the count word for the nesting depth above one.
pub fn nesting_to_string(messages: &MathspeakMessages, count: usize) -> String {
    match count {
        0 | 1 => String::new(),
        2 => messages.twice.to_string(),
        n => n.to_string(),
    }
}
