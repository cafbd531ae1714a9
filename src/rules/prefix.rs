//! Prefix rules: announce the role of a subexpression ("Numerator",
//! "Exponent", "3rd Row") before it is read.
//!
//! Every locale shares the same rule shapes; only the vocabulary differs.

use crate::dom::NodeRef;
use crate::error::LoadError;
use crate::rules::messages::{PREFIX_EN, PREFIX_ES, PrefixMessages};
use crate::store::RuleStore;

const DYNAMIC: &str = "prefix.default";

/// Constraint selecting the `position`-th child (0-based) of its parent list.
fn nth_child(position: usize) -> String {
    format!("count(preceding-sibling::*)={}", position)
}

fn announce(word: &str) -> String {
    format!(r#"[t] "{}"; [p] (pause:200)"#, word)
}

fn announce_ordinal(ordinal: &str, word: &str) -> String {
    format!(r#"[t] {}; [t] "{}"; [p] (pause:200)"#, ordinal, word)
}

/// Name of the locale's ordinal custom string. Stores that combine several
/// locales hold one per locale.
fn ordinal_function(locale: &str) -> String {
    format!("CSFordinalPosition_{}", locale)
}

/// 1-based position of `node` among its parent's element children.
fn element_position(node: NodeRef<'_>) -> usize {
    node.preceding_siblings().iter().filter(|sibling| sibling.is_element()).count() + 1
}

pub fn init_english(store: &mut RuleStore) -> Result<(), LoadError> {
    define_prefix_rules(store, &PREFIX_EN)
}

pub fn init_spanish(store: &mut RuleStore) -> Result<(), LoadError> {
    define_prefix_rules(store, &PREFIX_ES)
}

fn define_prefix_rules(store: &mut RuleStore, messages: &'static PrefixMessages) -> Result<(), LoadError> {
    let ordinal = messages.ordinal;
    let ordinal_name = ordinal_function(messages.locale);
    store.add_custom_string(&ordinal_name, move |node: NodeRef<'_>| ordinal(element_position(node)))?;

    speech_rule!(store,
        name: "numerator",
        dynamic: DYNAMIC,
        action: announce(messages.numerator),
        query: "self::*",
        constraints: [r#"name(../..)="fraction""#, &nth_child(0)],
    );
    speech_rule!(store,
        name: "denominator",
        dynamic: DYNAMIC,
        action: announce(messages.denominator),
        query: "self::*",
        constraints: [r#"name(../..)="fraction""#, &nth_child(1)],
    );
    speech_rule!(store,
        name: "base",
        dynamic: DYNAMIC,
        action: announce(messages.base),
        query: "self::*",
        constraints: [
            concat!(
                r#"name(../..)="superscript" or name(../..)="subscript""#,
                r#" or name(../..)="overscore" or name(../..)="underscore""#,
                r#" or name(../..)="tensor""#,
            ),
            &nth_child(0),
        ],
    );
    speech_rule!(store,
        name: "exponent",
        dynamic: DYNAMIC,
        action: announce(messages.exponent),
        query: "self::*",
        constraints: [r#"name(../..)="superscript""#, &nth_child(1)],
    );
    speech_rule!(store,
        name: "subscript",
        dynamic: DYNAMIC,
        action: announce(messages.subscript),
        query: "self::*",
        constraints: [r#"name(../..)="subscript""#, &nth_child(1)],
    );
    speech_rule!(store,
        name: "overscript",
        dynamic: DYNAMIC,
        action: announce(messages.overscript),
        query: "self::*",
        constraints: [r#"name(../..)="overscore""#, &nth_child(1)],
    );
    speech_rule!(store,
        name: "underscript",
        dynamic: DYNAMIC,
        action: announce(messages.underscript),
        query: "self::*",
        constraints: [r#"name(../..)="underscore""#, &nth_child(1)],
    );
    speech_rule!(store,
        name: "radicand",
        dynamic: DYNAMIC,
        action: announce(messages.radicand),
        query: "self::*",
        constraints: [r#"name(../..)="sqrt""#],
    );
    speech_rule!(store,
        name: "radicand",
        dynamic: DYNAMIC,
        action: announce(messages.radicand),
        query: "self::*",
        constraints: [r#"name(../..)="root""#, &nth_child(1)],
    );
    speech_rule!(store,
        name: "index",
        dynamic: DYNAMIC,
        action: announce(messages.index),
        query: "self::*",
        constraints: [r#"name(../..)="root""#, &nth_child(0)],
    );

    // Tensor scripts: a single script, or one entry of a punctuated list.
    let tensor_scripts = [
        ("leftsub", messages.left_subscript),
        ("leftsuper", messages.left_superscript),
        ("rightsub", messages.right_subscript),
        ("rightsuper", messages.right_superscript),
    ];
    for (role, word) in tensor_scripts {
        speech_rule!(store,
            name: role,
            dynamic: DYNAMIC,
            action: announce(word),
            query: "self::*",
            constraints: [r#"name(../..)="tensor""#, &format!(r#"@role="{}""#, role)],
        );
        speech_rule!(store,
            name: role,
            dynamic: DYNAMIC,
            action: announce_ordinal(&ordinal_name, word),
            query: "self::*",
            constraints: [
                r#"name(../..)="punctuated""#,
                r#"name(../../../..)="tensor""#,
                &format!(r#"../../@role="{}""#, role),
            ],
        );
    }

    speech_rule!(store,
        name: "choice",
        dynamic: DYNAMIC,
        action: announce(messages.choice),
        query: "self::line",
        constraints: [r#"@role="binomial""#, "parent::*/parent::vector", &nth_child(0)],
    );
    speech_rule!(store,
        name: "select",
        dynamic: DYNAMIC,
        action: announce(messages.select),
        query: "self::line",
        constraints: [r#"@role="binomial""#, "parent::*/parent::vector", &nth_child(1)],
    );

    // Positions in tables.
    speech_rule!(store,
        name: "row",
        dynamic: DYNAMIC,
        action: announce_ordinal(&ordinal_name, messages.row),
        query: "self::row",
    );
    store.define_rules_alias("row", "self::line", &[])?;
    speech_rule!(store,
        name: "cell",
        dynamic: DYNAMIC,
        action: format!("[n] ../..; {}", announce_ordinal(&ordinal_name, messages.column)),
        query: "self::cell",
        constraints: [r#"contains(@grammar,"depth")"#],
    );
    speech_rule!(store,
        name: "cell",
        dynamic: DYNAMIC,
        action: announce_ordinal(&ordinal_name, messages.column),
        query: "self::cell",
    );
    Ok(())
}
