//! Speech rule engine.
//!
//! This module is the *public entry point* for turning a tree into speech. It
//! owns one [`RuleStore`], the active [`DynamicCstr`] selected by the
//! [`EngineConfig`], and a result cache.
//!
//! ## How the parts work together
//!
//! ```text
//! EngineConfig ── RuleStore::from_rule_sets ──> RuleStore   (store.rs, rules/*)
//!              └─ dynamic_cstr() ───────────> DynamicCstr
//!                                                 │
//! node ── SpeechCache::get ── hit ───────────────┼──────────────> segments
//!            (cache.rs)      miss                 │
//!                             │                   v
//!                             └──> RuleStore::lookup_rule
//!                                    │ rule             │ none
//!                                    v                  v
//!                             execute(action)     evaluate_default
//!                               [t] text / CSF / query string
//!                               [p] pause
//!                               [n]/[m] recurse ──> (back to the top, per node)
//!                                    │
//!                                    v
//!                        SpeechCache::insert ──> Vec<SpeechSegment>
//! ```
//!
//! Recursion follows the tree and stops at the leaves; there is no depth limit.
//!
//! ## Responsibilities by module
//!
//! - `cache.rs`: `(node identity, serialized constraint) -> segments` cache.
//! - `metrics.rs`: timing, counters and the fired-rule trail of the last run.
//!
//! ## Invalidation
//!
//! The cache is cleared wholesale by [`SpeechRuleEngine::clear_cache`],
//! [`SpeechRuleEngine::reconfigure`] and [`SpeechRuleEngine::store_mut`].
//! Speaking a newer revision of a document evicts the entries of its older
//! revisions. Entries of documents that were dropped stay until the next
//! `clear_cache`.
//!
//! ## Debugging
//!
//! Set `SPEECHRULE_LOG=speechrule=trace` when running the binary to see rule
//! candidates and per-node evaluation.

#[path = "engine/cache.rs"]
mod cache;
#[path = "engine/metrics.rs"]
mod metrics;

pub use cache::{CacheStats, SpeechCache};
pub use metrics::{FiredRule, RunMetrics, RunResult};

use std::time::Instant;

use tracing::{debug, trace, warn};

use crate::action::{ActionDirective, ProsodyMark, RecurseOptions, TextSource};
use crate::audio::{Personality, SpeechSegment, render};
use crate::config::EngineConfig;
use crate::dom::{Document, NodeRef};
use crate::dynamic_cstr::DynamicCstr;
use crate::error::{ConfigError, QueryError, SpeechError};
use crate::rules::RULE_SETS;
use crate::store::{ContextGenerator, ContextItem, RuleStore, SpeechRule};

#[derive(Debug)]
pub struct SpeechRuleEngine {
    config: EngineConfig,
    store: RuleStore,
    dynamic: DynamicCstr,
    /// `dynamic` serialized once; the cache key suffix.
    dynamic_key: String,
    cache: SpeechCache,
    metrics: RunMetrics,
}

impl SpeechRuleEngine {
    /// Builds the rule store for `config` from the bundled rule sets.
    pub fn new(config: EngineConfig) -> Result<Self, SpeechError> {
        config.validate()?;
        let store = RuleStore::from_rule_sets(&config.locale, RULE_SETS, config.rule_sets.as_deref())?;
        Ok(Self::with_store(config, store)?)
    }

    /// An engine over a caller-built store. The store's locale is not checked
    /// against the configuration.
    pub fn with_store(config: EngineConfig, store: RuleStore) -> Result<Self, ConfigError> {
        let dynamic = config.dynamic_cstr()?;
        let dynamic_key = dynamic.to_string();
        debug!(dynamic = %dynamic_key, rules = store.len(), "speech rule engine ready");
        Ok(SpeechRuleEngine {
            cache: SpeechCache::new(config.cache),
            config,
            store,
            dynamic,
            dynamic_key,
            metrics: RunMetrics::default(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &RuleStore {
        &self.store
    }

    /// Mutable access to the store. Clears the cache, since any change to the
    /// rules may change speech.
    pub fn store_mut(&mut self) -> &mut RuleStore {
        self.clear_cache();
        &mut self.store
    }

    pub fn dynamic_cstr(&self) -> &DynamicCstr {
        &self.dynamic
    }

    /// Applies a new configuration. The store is rebuilt only when the locale
    /// or the rule-set filter changed; the cache is always cleared.
    pub fn reconfigure(&mut self, config: EngineConfig) -> Result<(), SpeechError> {
        config.validate()?;
        let dynamic = config.dynamic_cstr()?;
        if config.locale != self.config.locale || config.rule_sets != self.config.rule_sets {
            self.store = RuleStore::from_rule_sets(&config.locale, RULE_SETS, config.rule_sets.as_deref())?;
        }
        self.dynamic_key = dynamic.to_string();
        self.dynamic = dynamic;
        self.cache.set_enabled(config.cache);
        self.config = config;
        self.clear_cache();
        debug!(dynamic = %self.dynamic_key, "engine reconfigured");
        Ok(())
    }

    /// Drop every cached result. Call this after finishing with a document
    /// when one engine speaks many of them.
    pub fn clear_cache(&mut self) {
        if !self.cache.is_empty() {
            debug!(entries = self.cache.len(), "clearing speech cache");
        }
        self.cache.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Metrics of the last top-level `evaluate` call.
    pub fn last_metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    // --- Evaluation ---------------------------------------------------------

    pub fn evaluate(&mut self, node: NodeRef<'_>) -> Result<Vec<SpeechSegment>, QueryError> {
        self.metrics = RunMetrics::default();
        let start = Instant::now();
        let segments = self.evaluate_node(node, 0)?;
        self.metrics.total = start.elapsed();
        trace!(
            node = ?node,
            segments = segments.len(),
            lookups = self.metrics.lookups,
            elapsed = ?self.metrics.total,
            "evaluated"
        );
        Ok(segments)
    }

    pub fn evaluate_with_metrics(&mut self, node: NodeRef<'_>) -> Result<RunResult, QueryError> {
        let segments = self.evaluate(node)?;
        Ok(RunResult { segments, metrics: self.metrics.clone() })
    }

    /// Evaluates the document element; an empty document gives no speech.
    pub fn evaluate_tree(&mut self, document: &Document) -> Result<Vec<SpeechSegment>, QueryError> {
        match document.document_element() {
            Some(root) => self.evaluate(root),
            None => {
                self.metrics = RunMetrics::default();
                Ok(Vec::new())
            }
        }
    }

    /// Evaluates `node` and renders it with the configured markup.
    pub fn speak(&mut self, node: NodeRef<'_>) -> Result<String, QueryError> {
        let segments = self.evaluate(node)?;
        Ok(render(&segments, self.config.markup))
    }

    fn evaluate_node(&mut self, node: NodeRef<'_>, depth: usize) -> Result<Vec<SpeechSegment>, QueryError> {
        let identity = node.identity();
        if let Some(segments) = self.cache.get(identity, &self.dynamic_key) {
            self.metrics.cache_hits += 1;
            return Ok(segments);
        }
        if self.cache.is_enabled() {
            self.metrics.cache_misses += 1;
        }

        self.metrics.lookups += 1;
        let segments = match self.store.lookup_rule(node, &self.dynamic)? {
            Some(rule) => {
                trace!(rule = rule.name(), dynamic = %rule.dynamic_cstr(), node = ?node, depth, "rule fired");
                self.metrics.fired.push(FiredRule {
                    rule: rule.name().to_string(),
                    dynamic: rule.dynamic_cstr().to_string(),
                    node: node.id(),
                    depth,
                });
                self.execute(&rule, node, depth)?
            }
            None => {
                self.metrics.fallbacks += 1;
                self.store
                    .evaluate_default(node)
                    .into_iter()
                    .filter(|segment| segment.spoken().is_some_and(|words| !words.is_empty()))
                    .collect()
            }
        };

        self.cache.insert(identity, &self.dynamic_key, &segments);
        Ok(segments)
    }

    fn execute(&mut self, rule: &SpeechRule, node: NodeRef<'_>, depth: usize) -> Result<Vec<SpeechSegment>, QueryError> {
        let mut out = Vec::new();
        for directive in rule.action().directives() {
            match directive {
                ActionDirective::Text { source, personality } => {
                    let text = match source {
                        TextSource::Literal(text) => text.clone(),
                        TextSource::CustomString(name) => match self.store.custom_string(name) {
                            Some(function) => function(node),
                            None => {
                                warn!(rule = rule.name(), function = name.as_str(), "custom string vanished");
                                String::new()
                            }
                        },
                        TextSource::Query(expr) => self.store.evaluator().apply_string(node, expr)?,
                    };
                    if !text.is_empty() {
                        out.push(SpeechSegment::Text { text, context: None, personality: *personality });
                    }
                }
                ActionDirective::Prosody(ProsodyMark::Pause(millis)) => out.push(SpeechSegment::pause(*millis)),
                ActionDirective::Recurse { selector, multi, options, personality } => {
                    let mut nodes = self.store.evaluator().apply_selector(node, selector)?;
                    if !multi {
                        nodes.truncate(1);
                    }
                    let spliced = self.recurse(&nodes, options, depth + 1)?;
                    out.extend(spliced.into_iter().map(|segment| overlay(segment, personality)));
                }
            }
        }
        Ok(out)
    }

    /// Evaluates `nodes` in order, attaching context and inserting separators.
    fn recurse(
        &mut self,
        nodes: &[NodeRef<'_>],
        options: &RecurseOptions,
        depth: usize,
    ) -> Result<Vec<SpeechSegment>, QueryError> {
        let Some(document) = nodes.first().map(|node| node.document()) else {
            return Ok(Vec::new());
        };
        let argument = options.context.as_deref().unwrap_or_default();
        let mut context = options.context_function.as_deref().and_then(|name| self.generator(name, nodes, argument));
        let mut separator =
            options.separator_function.as_deref().and_then(|name| self.generator(name, nodes, argument));

        let mut out = Vec::new();
        for (index, node) in nodes.iter().enumerate() {
            let mut segments = self.evaluate_node(*node, depth)?;
            // The generator advances once per selected node, spoken or not.
            let item = context.as_mut().and_then(|next| next());
            if segments.is_empty() {
                continue;
            }

            let prefix = match (context.is_some(), item) {
                (true, Some(item)) => self.item_text(document, item, depth)?,
                (true, None) => String::new(),
                (false, _) => options.context.clone().unwrap_or_default(),
            };
            attach_context(&mut segments, prefix);
            out.extend(segments);

            if index + 1 < nodes.len() {
                match separator.as_mut() {
                    Some(next) => {
                        if let Some(item) = next() {
                            let segments = self.item_segments(document, item, depth)?;
                            out.extend(segments);
                        }
                    }
                    None => {
                        if let Some(text) = options.separator.as_deref().filter(|text| !text.is_empty()) {
                            out.push(SpeechSegment::text(text));
                        }
                    }
                }
            }
        }
        Ok(out)
    }

    fn generator(&self, name: &str, nodes: &[NodeRef<'_>], argument: &str) -> Option<ContextGenerator> {
        match self.store.context_function(name) {
            Some(function) => Some(function(nodes, argument)),
            None => {
                warn!(function = name, "context function vanished");
                None
            }
        }
    }

    fn item_segments(
        &mut self,
        document: &Document,
        item: ContextItem,
        depth: usize,
    ) -> Result<Vec<SpeechSegment>, QueryError> {
        match item {
            ContextItem::Text(text) if text.is_empty() => Ok(Vec::new()),
            ContextItem::Text(text) => Ok(vec![SpeechSegment::text(text)]),
            ContextItem::Node(id) => match document.get(id) {
                Some(node) => self.evaluate_node(node, depth),
                None => Ok(Vec::new()),
            },
        }
    }

    fn item_text(&mut self, document: &Document, item: ContextItem, depth: usize) -> Result<String, QueryError> {
        let segments = self.item_segments(document, item, depth)?;
        Ok(segments.iter().filter_map(SpeechSegment::spoken).collect::<Vec<_>>().join(" "))
    }
}

/// Puts `prefix` in front of the first text segment's context, or speaks it on
/// its own when the node produced no text.
fn attach_context(segments: &mut Vec<SpeechSegment>, prefix: String) {
    if prefix.is_empty() {
        return;
    }
    match segments.iter_mut().find_map(|segment| match segment {
        SpeechSegment::Text { context, .. } => Some(context),
        SpeechSegment::Pause { .. } => None,
    }) {
        Some(context) => {
            *context = Some(match context.take() {
                Some(existing) if !existing.is_empty() => format!("{} {}", prefix, existing),
                _ => prefix,
            });
        }
        None => segments.insert(0, SpeechSegment::text(prefix)),
    }
}

fn overlay(segment: SpeechSegment, outer: &Personality) -> SpeechSegment {
    match segment {
        SpeechSegment::Text { text, context, personality } => {
            SpeechSegment::Text { text, context, personality: personality.inherit(outer) }
        }
        pause => pause,
    }
}
