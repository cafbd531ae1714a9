//! Engine configuration.
//!
//! An [`EngineConfig`] is created once, either in code or from TOML, and handed
//! to [`crate::SpeechRuleEngine::new`]:
//!
//! ```
//! use speechrule::{EngineConfig, Markup};
//!
//! let config = EngineConfig::from_toml_str(r#"
//!     locale = "en"
//!     domain = "mathspeak"
//!     style = "brief"
//!     markup = "ssml"
//! "#).unwrap();
//!
//! assert_eq!(config.dynamic_cstr().unwrap().to_string(), "en.mathspeak.brief");
//! assert_eq!(config.markup, Markup::Ssml);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::audio::Markup;
use crate::dynamic_cstr::{DEFAULT_LOCALE, DEFAULT_VALUE, DynamicCstr, Parser, SEPARATOR};
use crate::error::ConfigError;

const DEFAULT_DOMAIN: &str = "mathspeak";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub locale: String,
    /// Rule set family, e.g. `mathspeak` or `prefix`.
    pub domain: String,
    pub style: String,
    /// Names of the rule sets to load; `None` loads every set of the locale.
    /// The English sets are always available as a fallback for other locales.
    pub rule_sets: Option<Vec<String>>,
    pub markup: Markup,
    pub cache: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            locale: DEFAULT_LOCALE.to_string(),
            domain: DEFAULT_DOMAIN.to_string(),
            style: DEFAULT_VALUE.to_string(),
            rule_sets: None,
            markup: Markup::None,
            cache: true,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parses and validates configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [("locale", &self.locale), ("domain", &self.domain), ("style", &self.style)] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{} must not be empty", field)));
            }
            if value.contains(SEPARATOR) {
                return Err(ConfigError::Invalid(format!("{} `{}` must not contain `{}`", field, value, SEPARATOR)));
            }
        }
        if let Some(sets) = &self.rule_sets {
            if sets.is_empty() {
                return Err(ConfigError::Invalid("rule_sets must name at least one rule set".to_string()));
            }
        }
        Ok(())
    }

    /// The active dynamic constraint this configuration selects.
    pub fn dynamic_cstr(&self) -> Result<DynamicCstr, ConfigError> {
        let spec = [self.locale.as_str(), self.domain.as_str(), self.style.as_str()].join(&SEPARATOR.to_string());
        Ok(Parser::new().parse(&spec)?)
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = style.into();
        self
    }

    pub fn with_rule_sets<I, S>(mut self, sets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rule_sets = Some(sets.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_markup(mut self, markup: Markup) -> Self {
        self.markup = markup;
        self
    }

    pub fn with_cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }
}
