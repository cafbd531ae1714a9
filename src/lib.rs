//! Trie-indexed speech rule engine.
//!
//! Turns a semantic tree (an XML document whose elements name math roles such
//! as `fraction` or `superscript`) into a sequence of speech segments. Rules
//! pair a structural precondition with an action and live in a [`RuleStore`],
//! indexed by dynamic constraint (`locale.domain.style`) and precondition.
//! The [`SpeechRuleEngine`] picks the most specific applicable rule per node
//! and caches results.
//!
//! ```
//! use speechrule::{EngineConfig, to_speech_with};
//!
//! let xml = "<sqrt><children><identifier>x</identifier></children></sqrt>";
//! let config = EngineConfig::default().with_style("brief");
//! assert_eq!(to_speech_with(xml, &config).unwrap().text, "StartRoot x EndRoot");
//! ```

#[macro_use]
mod macros;

pub mod action;
mod api;
pub mod audio;
pub mod config;
pub mod dom;
pub mod dynamic_cstr;
pub mod engine;
pub mod error;
pub mod query;
pub mod rules;
pub mod store;

pub use api::{FiredRuleSummary, Speech, SpeechDetails, SpeechVerbose, to_speech, to_speech_verbose, to_speech_with};
pub use audio::{Markup, Personality, SpeechSegment, render};
pub use config::EngineConfig;
pub use dom::{Document, NodeId, NodeRef};
pub use dynamic_cstr::{Axis, DynamicCstr};
pub use engine::SpeechRuleEngine;
pub use error::{ConfigError, LoadError, QueryError, SpeechError, XmlError};
pub use store::{RuleStore, SpeechRule};
