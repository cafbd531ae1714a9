//! Bundled rule sets.
//!
//! Each [`RuleSet`] names a group of initializers for one locale. Stores are
//! built from these by [`RuleStore::from_rule_sets`](crate::store::RuleStore::from_rule_sets),
//! optionally restricted to a subset of names.
//!
//! | Set         | Locale | Domain      | Styles                     |
//! |-------------|--------|-------------|----------------------------|
//! | `mathspeak` | `en`   | `mathspeak` | `default`, `brief`, `sbrief` |
//! | `prefix`    | `en`   | `prefix`    | `default`                  |
//! | `prefix`    | `es`   | `prefix`    | `default`                  |

#[path = "rules/mathspeak.rs"]
mod mathspeak;
#[path = "rules/messages.rs"]
pub mod messages;
#[path = "rules/prefix.rs"]
mod prefix;
#[path = "rules/units.rs"]
pub mod units;
#[cfg(test)]
#[path = "rules/tests.rs"]
mod tests;

use crate::store::RuleSet;

pub const RULE_SETS: &[RuleSet] = &[
    RuleSet { name: "mathspeak", locale: "en", initializers: &[mathspeak::init_functions, mathspeak::init_rules] },
    RuleSet { name: "prefix", locale: "en", initializers: &[prefix::init_english] },
    RuleSet { name: "prefix", locale: "es", initializers: &[prefix::init_spanish] },
];

/// Locales with at least one bundled rule set, sorted.
pub fn locales() -> Vec<&'static str> {
    let mut locales: Vec<&'static str> = RULE_SETS.iter().map(|set| set.locale).collect();
    locales.sort_unstable();
    locales.dedup();
    locales
}
