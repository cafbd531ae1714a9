use std::time::Duration;

use crate::audio::{SpeechSegment, render};
use crate::config::EngineConfig;
use crate::dom::Document;
use crate::engine::{RunResult, SpeechRuleEngine};
use crate::error::SpeechError;

/// Result from [`to_speech`] and [`to_speech_with`].
#[derive(Debug, Clone)]
pub struct Speech {
    /// Rendered speech in the configured markup.
    pub text: String,
    pub segments: Vec<SpeechSegment>,
    /// Time spent evaluating, excluding rule loading and markup parsing.
    pub elapsed: Duration,
}

/// One rule execution, resolved to names for display.
#[derive(Debug, Clone)]
pub struct FiredRuleSummary {
    pub rule: String,
    pub dynamic: String,
    /// Element name (or `#text`) of the node the rule fired on.
    pub node: String,
    pub depth: usize,
}

/// Additional details returned by [`to_speech_verbose`].
///
/// Meant for rule debugging and performance inspection.
#[derive(Debug, Clone)]
pub struct SpeechDetails {
    pub total: Duration,
    /// Active dynamic constraint, e.g. `en.mathspeak.brief`.
    pub dynamic: String,
    /// Number of rules in the store.
    pub rules_loaded: usize,
    pub lookups: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub fallbacks: usize,
    pub fired: Vec<FiredRuleSummary>,
}

#[derive(Debug, Clone)]
pub struct SpeechVerbose {
    pub text: String,
    pub segments: Vec<SpeechSegment>,
    pub elapsed: Duration,
    pub details: SpeechDetails,
}

/// Speak `xml` with the default configuration (English MathSpeak, verbose).
///
/// # Example
/// ```
/// use speechrule::to_speech;
///
/// let out = to_speech("<fraction><children><number>1</number><number>2</number></children></fraction>").unwrap();
/// assert_eq!(out.text, "StartFraction 1 Over 2 EndFraction");
/// ```
pub fn to_speech(xml: &str) -> Result<Speech, SpeechError> {
    to_speech_with(xml, &EngineConfig::default())
}

/// Speak `xml` under `config`.
pub fn to_speech_with(xml: &str, config: &EngineConfig) -> Result<Speech, SpeechError> {
    let verbose = to_speech_verbose(xml, config)?;
    Ok(Speech { text: verbose.text, segments: verbose.segments, elapsed: verbose.elapsed })
}

/// Speak `xml` under `config` and return metrics and the fired-rule trail.
pub fn to_speech_verbose(xml: &str, config: &EngineConfig) -> Result<SpeechVerbose, SpeechError> {
    let document = Document::parse(xml)?;
    let mut engine = SpeechRuleEngine::new(config.clone())?;

    let run = match document.document_element() {
        Some(root) => engine.evaluate_with_metrics(root)?,
        None => RunResult { segments: Vec::new(), metrics: Default::default() },
    };

    let fired = run
        .metrics
        .fired
        .iter()
        .map(|fired| FiredRuleSummary {
            rule: fired.rule.clone(),
            dynamic: fired.dynamic.clone(),
            node: document.get(fired.node).and_then(|node| node.name()).unwrap_or("#text").to_string(),
            depth: fired.depth,
        })
        .collect();

    let details = SpeechDetails {
        total: run.metrics.total,
        dynamic: engine.dynamic_cstr().to_string(),
        rules_loaded: engine.store().len(),
        lookups: run.metrics.lookups,
        cache_hits: run.metrics.cache_hits,
        cache_misses: run.metrics.cache_misses,
        fallbacks: run.metrics.fallbacks,
        fired,
    };

    Ok(SpeechVerbose {
        text: render(&run.segments, config.markup),
        segments: run.segments,
        elapsed: run.metrics.total,
        details,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::Markup;

    const SQUARE: &str = "<superscript><children><identifier>x</identifier><number>2</number></children></superscript>";

    #[test]
    fn to_speech_uses_the_default_configuration() {
        let res = to_speech(SQUARE).unwrap();
        assert_eq!(res.text, "x squared");
        assert_eq!(res.segments.len(), 2);
        assert!(res.elapsed >= Duration::ZERO);
    }

    #[test]
    fn to_speech_with_honours_style_and_markup() {
        let config = EngineConfig::default().with_style("brief").with_markup(Markup::Ssml);
        let xml = "<superscript><children><identifier>x</identifier><identifier>n</identifier></children></superscript>";
        assert_eq!(to_speech_with(xml, &config).unwrap().text, "<speak>x Sup n Base</speak>");
    }

    #[test]
    fn verbose_reports_fired_rules() {
        let res = to_speech_verbose(SQUARE, &EngineConfig::default()).unwrap();
        assert_eq!(res.elapsed, res.details.total);
        assert_eq!(res.details.dynamic, "en.mathspeak.default");
        assert!(res.details.rules_loaded > 0);

        let fired: Vec<_> = res.details.fired.iter().map(|f| (f.rule.as_str(), f.node.as_str())).collect();
        assert_eq!(fired, vec![("superscript-power", "superscript"), ("identifier", "identifier")]);
        assert_eq!(res.details.fallbacks, 0);
    }

    #[test]
    fn errors_are_reported_by_phase() {
        assert!(matches!(to_speech("<a>"), Err(SpeechError::Xml(_))));
        let config = EngineConfig::default().with_rule_sets(["missing"]);
        assert!(matches!(to_speech_with("<a/>", &config), Err(SpeechError::Load(_))));
        let config = EngineConfig::default().with_style("");
        assert!(matches!(to_speech_with("<a/>", &config), Err(SpeechError::Config(_))));
    }
}
