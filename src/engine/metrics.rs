//! Engine run metrics.
//!
//! Every top-level [`SpeechRuleEngine::evaluate`](crate::SpeechRuleEngine::evaluate)
//! call resets and fills a [`RunMetrics`]; read it back with
//! `SpeechRuleEngine::last_metrics` or get it bundled with the output from
//! `SpeechRuleEngine::evaluate_with_metrics`.
//!
//! ## Design notes
//!
//! - `RunMetrics::fired` records one entry per rule execution, in evaluation
//!   order (pre-order over the recursion). Cache hits do not fire rules.
//! - Counters cover the whole recursion, not just the top-level node.

use std::time::Duration;

use crate::audio::SpeechSegment;
use crate::dom::NodeId;

// --- Metrics -----------------------------------------------------------------

#[derive(Debug, Default, Clone)]
pub struct RunMetrics {
    /// Total elapsed time for the top-level evaluation.
    pub total: Duration,
    /// Number of `lookup_rule` calls.
    pub lookups: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    /// Nodes no rule matched, spoken via their raw text.
    pub fallbacks: usize,
    /// Rules executed, in evaluation order.
    pub fired: Vec<FiredRule>,
}

/// One rule execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredRule {
    pub rule: String,
    /// Serialized dynamic constraint of the rule that fired.
    pub dynamic: String,
    pub node: NodeId,
    /// Recursion depth, 0 for the top-level node.
    pub depth: usize,
}

/// Engine output bundled with timing information.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub segments: Vec<SpeechSegment>,
    pub metrics: RunMetrics,
}
