//! Dynamic constraints.
//!
//! A dynamic constraint is the contextual key a rule is defined under and an
//! engine evaluates with: one value per axis, always in the fixed
//! [`Axis::ORDER`]. Constraints are written as dot-joined specs, e.g.
//! `"en.mathspeak.brief"`; missing trailing values take the axis default.
//!
//! Ranking works axis by axis. Relative to the engine's active constraint a
//! rule value is either an exact match or a fallback to the axis default:
//!
//! ```text
//! active:    en . mathspeak . brief
//! rule A:    en . mathspeak . default    -> [Exact, Exact, Fallback]
//! rule B:    en . default   . brief      -> [Exact, Fallback, Exact]
//!                                           A wins: earlier axes dominate
//! ```

use std::cmp::Ordering;
use std::fmt;

use crate::error::ConstraintParseError;

/// Value every non-locale axis falls back to.
pub const DEFAULT_VALUE: &str = "default";

/// Locale rules fall back to when the requested locale has no match.
pub const DEFAULT_LOCALE: &str = "en";

/// Separator between axis values in a constraint spec.
pub const SEPARATOR: char = '.';

pub const AXIS_COUNT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Axis {
    Locale,
    Domain,
    Style,
}

impl Axis {
    /// Global axis order; identical for every constraint.
    pub const ORDER: [Axis; AXIS_COUNT] = [Axis::Locale, Axis::Domain, Axis::Style];

    pub fn name(self) -> &'static str {
        match self {
            Axis::Locale => "locale",
            Axis::Domain => "domain",
            Axis::Style => "style",
        }
    }

    pub fn default_value(self) -> &'static str {
        match self {
            Axis::Locale => DEFAULT_LOCALE,
            Axis::Domain | Axis::Style => DEFAULT_VALUE,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One value per [`Axis`], in axis order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DynamicCstr {
    values: [String; AXIS_COUNT],
}

impl Default for DynamicCstr {
    fn default() -> Self {
        DynamicCstr { values: Axis::ORDER.map(|axis| axis.default_value().to_string()) }
    }
}

impl DynamicCstr {
    pub fn new(locale: impl Into<String>, domain: impl Into<String>, style: impl Into<String>) -> Self {
        DynamicCstr { values: [locale.into(), domain.into(), style.into()] }
    }

    pub fn get(&self, axis: Axis) -> &str {
        &self.values[axis.index()]
    }

    pub fn locale(&self) -> &str {
        self.get(Axis::Locale)
    }

    pub fn domain(&self) -> &str {
        self.get(Axis::Domain)
    }

    pub fn style(&self) -> &str {
        self.get(Axis::Style)
    }

    /// `(axis, value)` pairs in axis order; the path a rule occupies in the trie.
    pub fn all_properties(&self) -> Vec<(Axis, &str)> {
        Axis::ORDER.iter().map(|&axis| (axis, self.get(axis))).collect()
    }

    /// Acceptable values per axis when looking rules up: the value itself, then
    /// the axis default if it differs.
    pub fn fallback_properties(&self) -> Vec<(Axis, Vec<&str>)> {
        Axis::ORDER
            .iter()
            .map(|&axis| {
                let value = self.get(axis);
                let default = axis.default_value();
                let values = if value == default { vec![value] } else { vec![value, default] };
                (axis, values)
            })
            .collect()
    }

    /// Structural equality over every axis.
    pub fn equal(&self, other: &DynamicCstr) -> bool {
        self == other
    }

    /// How well `candidate` matches `self`, axis by axis.
    pub fn specificity(&self, candidate: &DynamicCstr) -> Specificity {
        Specificity(Axis::ORDER.map(|axis| {
            let value = candidate.get(axis);
            if value == self.get(axis) {
                AxisMatch::Exact
            } else if value == axis.default_value() {
                AxisMatch::Fallback
            } else {
                AxisMatch::Mismatch
            }
        }))
    }

    /// Ranks `a` against `b` relative to `self`; `Less` means `a` is more specific.
    pub fn compare(&self, a: &DynamicCstr, b: &DynamicCstr) -> Ordering {
        self.specificity(a).cmp(&self.specificity(b))
    }
}

impl fmt::Display for DynamicCstr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{sep}{}{sep}{}", self.values[0], self.values[1], self.values[2], sep = SEPARATOR)
    }
}

/// Per-axis match quality; variant order is rank order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AxisMatch {
    Exact,
    Fallback,
    Mismatch,
}

/// Lexicographic match quality; smaller is more specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Specificity(pub [AxisMatch; AXIS_COUNT]);

/// Splits constraint specs into axis values.
#[derive(Debug, Clone, Default)]
pub struct Parser;

impl Parser {
    pub fn new() -> Self {
        Parser
    }

    pub fn parse(&self, spec: &str) -> Result<DynamicCstr, ConstraintParseError> {
        let tokens: Vec<&str> = if spec.is_empty() { Vec::new() } else { spec.split(SEPARATOR).collect() };
        if tokens.len() > AXIS_COUNT {
            return Err(ConstraintParseError::TooManyValues {
                spec: spec.to_string(),
                found: tokens.len(),
                max: AXIS_COUNT,
            });
        }

        let mut cstr = DynamicCstr::default();
        for (axis, token) in Axis::ORDER.iter().zip(&tokens) {
            let token = token.trim();
            if token.is_empty() {
                return Err(ConstraintParseError::EmptyValue { spec: spec.to_string(), axis: *axis });
            }
            cstr.values[axis.index()] = token.to_string();
        }
        Ok(cstr)
    }
}

/// Sort helper bound to the engine's active constraint.
#[derive(Debug, Clone, Copy)]
pub struct Comparator<'a> {
    reference: &'a DynamicCstr,
}

impl<'a> Comparator<'a> {
    pub fn new(reference: &'a DynamicCstr) -> Self {
        Comparator { reference }
    }

    pub fn reference(&self) -> &'a DynamicCstr {
        self.reference
    }

    pub fn compare(&self, a: &DynamicCstr, b: &DynamicCstr) -> Ordering {
        self.reference.compare(a, b)
    }
}
