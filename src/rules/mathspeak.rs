//! English MathSpeak rules in the `default` (verbose), `brief` and `sbrief`
//! (superbrief) styles.
//!
//! Trees follow the semantic layout: an element's operands sit under a
//! `children` element and its operators or fences under `content`.
//!
//! ```text
//! <fraction>
//!   <children><number>1</number><identifier>x</identifier></children>
//! </fraction>
//! ```
//!
//! Fraction markers repeat with the depth of fractions nested inside, e.g.
//! `StartStartFraction StartFraction 1 Over x EndFraction OverOver 2 EndEndFraction`;
//! radical markers grow with the radicals around them (`NestedStartRoot`).

use crate::dom::NodeRef;
use crate::error::LoadError;
use crate::rules::messages::{MATHSPEAK_EN, OPERATOR_NAMES, ROOT_INDEX_NAMES, nested_fraction, nesting_to_string};
use crate::rules::units::unit_name_string;
use crate::store::RuleStore;

/// Per-style vocabulary and custom string suffixes.
struct Style {
    name: &'static str,
    /// Suffix of the `CSF...` functions registered for this style.
    suffix: &'static str,
    superscript: &'static str,
    subscript: &'static str,
    baseline: &'static str,
}

const STYLES: [Style; 3] = [
    Style { name: "default", suffix: "Verbose", superscript: "Superscript", subscript: "Subscript", baseline: "Baseline" },
    Style { name: "brief", suffix: "Brief", superscript: "Sup", subscript: "Sub", baseline: "Base" },
    Style { name: "sbrief", suffix: "Sbrief", superscript: "Sup", subscript: "Sub", baseline: "Base" },
];

// --- Nesting depth ------------------------------------------------------------

/// Deepest chain of fractions inside `node`, `node` included. The outermost
/// fraction carries the most markers.
fn fraction_depth(node: NodeRef<'_>) -> usize {
    let inner = node.child_elements().map(fraction_depth).max().unwrap_or(0);
    if node.name() == Some("fraction") { inner + 1 } else { inner }
}

/// Radicals enclosing `node`, `node` included. The innermost radical carries
/// the most markers.
fn radical_depth(node: NodeRef<'_>) -> usize {
    std::iter::once(node).chain(node.ancestors()).filter(|n| matches!(n.name(), Some("sqrt" | "root"))).count()
}

// --- Fractions ----------------------------------------------------------------

fn open_frac_verbose(node: NodeRef<'_>) -> String {
    nested_fraction(fraction_depth(node), MATHSPEAK_EN.start, Some(MATHSPEAK_EN.frac_verbose))
}

fn close_frac_verbose(node: NodeRef<'_>) -> String {
    nested_fraction(fraction_depth(node), MATHSPEAK_EN.end, Some(MATHSPEAK_EN.frac_verbose))
}

fn over_frac_verbose(node: NodeRef<'_>) -> String {
    nested_fraction(fraction_depth(node), MATHSPEAK_EN.frac_over, None)
}

fn open_frac_brief(node: NodeRef<'_>) -> String {
    nested_fraction(fraction_depth(node), MATHSPEAK_EN.start, Some(MATHSPEAK_EN.frac_brief))
}

fn close_frac_brief(node: NodeRef<'_>) -> String {
    nested_fraction(fraction_depth(node), MATHSPEAK_EN.end, Some(MATHSPEAK_EN.frac_brief))
}

/// `word` at depth 1, `Nest[Twice|n]word` deeper down.
fn nested_sbrief(node: NodeRef<'_>, word: &str) -> String {
    match fraction_depth(node) {
        0 | 1 => word.to_string(),
        depth => format!("{}{}{}", MATHSPEAK_EN.nest_frac, nesting_to_string(&MATHSPEAK_EN, depth - 1), word),
    }
}

fn open_frac_sbrief(node: NodeRef<'_>) -> String {
    nested_sbrief(node, MATHSPEAK_EN.frac_sbrief)
}

fn over_frac_sbrief(node: NodeRef<'_>) -> String {
    nested_sbrief(node, MATHSPEAK_EN.frac_over)
}

fn close_frac_sbrief(node: NodeRef<'_>) -> String {
    nested_sbrief(node, &format!("{}{}", MATHSPEAK_EN.end, MATHSPEAK_EN.frac_sbrief))
}

// --- Radicals -----------------------------------------------------------------

fn nested_radical(node: NodeRef<'_>, prefix: &str, word: &str) -> String {
    match radical_depth(node) {
        0 | 1 => word.to_string(),
        depth => format!("{}{}{}", prefix, nesting_to_string(&MATHSPEAK_EN, depth - 1), word),
    }
}

fn open_radical_verbose(node: NodeRef<'_>) -> String {
    nested_radical(node, MATHSPEAK_EN.nested, MATHSPEAK_EN.start_root)
}

fn close_radical_verbose(node: NodeRef<'_>) -> String {
    nested_radical(node, MATHSPEAK_EN.nested, MATHSPEAK_EN.end_root)
}

fn index_radical_verbose(node: NodeRef<'_>) -> String {
    nested_radical(node, MATHSPEAK_EN.nested, MATHSPEAK_EN.root_index)
}

fn open_radical_brief(node: NodeRef<'_>) -> String {
    nested_radical(node, MATHSPEAK_EN.nest_root, MATHSPEAK_EN.start_root)
}

fn close_radical_brief(node: NodeRef<'_>) -> String {
    nested_radical(node, MATHSPEAK_EN.nest_root, MATHSPEAK_EN.end_root)
}

fn index_radical_brief(node: NodeRef<'_>) -> String {
    nested_radical(node, MATHSPEAK_EN.nest_root, MATHSPEAK_EN.root_index)
}

fn root_index(node: NodeRef<'_>) -> Option<NodeRef<'_>> {
    node.child_elements().find(|n| n.name() == Some("children"))?.child_elements().next()
}

/// `CQFnamedRootIndex`: the index of a `root` whose index has a spoken name.
fn named_root_index(node: NodeRef<'_>) -> Vec<NodeRef<'_>> {
    if node.name() != Some("root") {
        return Vec::new();
    }
    root_index(node).filter(|index| ROOT_INDEX_NAMES.contains_key(index.text_content().trim())).into_iter().collect()
}

fn root_index_name(node: NodeRef<'_>) -> String {
    root_index(node)
        .and_then(|index| ROOT_INDEX_NAMES.get(index.text_content().trim()).copied())
        .unwrap_or_default()
        .to_string()
}

// --- Operators ----------------------------------------------------------------

fn operator_name(node: NodeRef<'_>) -> String {
    let symbol = node.text_content();
    match OPERATOR_NAMES.get(symbol.trim()) {
        Some(name) => name.to_string(),
        None => symbol.trim().to_string(),
    }
}

pub fn init_functions(store: &mut RuleStore) -> Result<(), LoadError> {
    store.add_custom_string("CSFopenFracVerbose", open_frac_verbose)?;
    store.add_custom_string("CSFoverFracVerbose", over_frac_verbose)?;
    store.add_custom_string("CSFcloseFracVerbose", close_frac_verbose)?;
    store.add_custom_string("CSFopenFracBrief", open_frac_brief)?;
    store.add_custom_string("CSFoverFracBrief", over_frac_verbose)?;
    store.add_custom_string("CSFcloseFracBrief", close_frac_brief)?;
    store.add_custom_string("CSFopenFracSbrief", open_frac_sbrief)?;
    store.add_custom_string("CSFoverFracSbrief", over_frac_sbrief)?;
    store.add_custom_string("CSFcloseFracSbrief", close_frac_sbrief)?;

    store.add_custom_string("CSFopenRadicalVerbose", open_radical_verbose)?;
    store.add_custom_string("CSFcloseRadicalVerbose", close_radical_verbose)?;
    store.add_custom_string("CSFindexRadicalVerbose", index_radical_verbose)?;
    for suffix in ["Brief", "Sbrief"] {
        store.add_custom_string(&format!("CSFopenRadical{}", suffix), open_radical_brief)?;
        store.add_custom_string(&format!("CSFcloseRadical{}", suffix), close_radical_brief)?;
        store.add_custom_string(&format!("CSFindexRadical{}", suffix), index_radical_brief)?;
    }

    store.add_custom_query("CQFnamedRootIndex", named_root_index)?;
    store.add_custom_string("CSFrootIndexName", root_index_name)?;
    store.add_custom_string("CSFoperatorName", operator_name)?;
    store.add_custom_string("CSFunitName", unit_name_string)?;
    Ok(())
}

pub fn init_rules(store: &mut RuleStore) -> Result<(), LoadError> {
    for style in &STYLES {
        let dynamic = format!("mathspeak.{}", style.name);
        let s = style.suffix;

        speech_rule!(store,
            name: "fraction",
            dynamic: &dynamic,
            action: format!(
                "[t] CSFopenFrac{s}; [n] children/*[1]; [t] CSFoverFrac{s}; [n] children/*[2]; [t] CSFcloseFrac{s}"
            ),
            query: "self::fraction",
        );

        speech_rule!(store,
            name: "superscript",
            dynamic: &dynamic,
            action: format!(
                r#"[n] children/*[1]; [t] "{}"; [n] children/*[2]; [t] "{}""#,
                style.superscript, style.baseline
            ),
            query: "self::superscript",
        );
        for (exponent, word) in [("2", MATHSPEAK_EN.squared), ("3", MATHSPEAK_EN.cubed)] {
            speech_rule!(store,
                name: "superscript-power",
                dynamic: &dynamic,
                action: format!(r#"[n] children/*[1]; [t] "{}""#, word),
                query: "self::superscript",
                constraints: [r#"name(children/*[2])="number""#, &format!(r#"children/*[2]="{}""#, exponent)],
            );
        }
        speech_rule!(store,
            name: "subscript",
            dynamic: &dynamic,
            action: format!(
                r#"[n] children/*[1]; [t] "{}"; [n] children/*[2]; [t] "{}""#,
                style.subscript, style.baseline
            ),
            query: "self::subscript",
        );

        speech_rule!(store,
            name: "sqrt",
            dynamic: &dynamic,
            action: format!("[t] CSFopenRadical{s}; [n] children/*[1]; [t] CSFcloseRadical{s}"),
            query: "self::sqrt",
        );
        speech_rule!(store,
            name: "root",
            dynamic: &dynamic,
            action: format!(
                "[t] CSFindexRadical{s}; [n] children/*[1]; [t] CSFopenRadical{s}; [n] children/*[2]; \
                 [t] CSFcloseRadical{s}"
            ),
            query: "self::root",
        );
        speech_rule!(store,
            name: "root-named",
            dynamic: &dynamic,
            action: format!("[t] CSFrootIndexName; [t] CSFopenRadical{s}; [n] children/*[2]; [t] CSFcloseRadical{s}"),
            query: "self::root",
            constraints: ["CQFnamedRootIndex"],
        );
    }

    // Style independent.
    let dynamic = "mathspeak.default";
    speech_rule!(store,
        name: "infixop",
        dynamic: dynamic,
        action: "[m] children/* (sepFunc:CTFcontentIterator)",
        query: "self::infixop",
    );
    store.define_rules_alias("infixop", "self::relseq", &[])?;
    speech_rule!(store,
        name: "operator",
        dynamic: dynamic,
        action: "[t] CSFoperatorName",
        query: "self::operator",
    );
    store.define_rules_alias("operator", "self::relation", &[])?;
    store.define_rules_alias("operator", "self::fence", &[])?;
    store.define_rules_alias("operator", "self::punctuation", &[])?;
    speech_rule!(store,
        name: "fenced",
        dynamic: dynamic,
        action: "[n] content/*[1]; [n] children/*[1]; [n] content/*[2]",
        query: "self::fenced",
    );
    speech_rule!(store,
        name: "appl",
        dynamic: dynamic,
        action: "[n] children/*[1]; [n] children/*[2]",
        query: "self::appl",
    );

    speech_rule!(store,
        name: "matrix",
        dynamic: dynamic,
        action: format!(
            r#"[t] "{start}"; [t] count(children/*); [t] "{by}"; [t] count(children/*[1]/children/*); [t] "{matrix}"; [m] children/* (ctxtFunc:CTFnodeCounter, context:"{row}"); [t] "{end}{matrix}""#,
            start = MATHSPEAK_EN.start,
            by = MATHSPEAK_EN.by,
            matrix = MATHSPEAK_EN.matrix,
            row = MATHSPEAK_EN.row,
            end = MATHSPEAK_EN.end,
        ),
        query: "self::matrix",
    );
    speech_rule!(store,
        name: "row",
        dynamic: dynamic,
        action: format!(r#"[m] children/* (ctxtFunc:CTFnodeCounter, context:"{}")"#, MATHSPEAK_EN.column),
        query: "self::row",
    );
    speech_rule!(store,
        name: "cell",
        dynamic: dynamic,
        action: "[n] children/*[1]",
        query: "self::cell",
    );

    speech_rule!(store,
        name: "number",
        dynamic: dynamic,
        action: "[t] text()",
        query: "self::number",
    );
    speech_rule!(store,
        name: "identifier",
        dynamic: dynamic,
        action: "[t] text()",
        query: "self::identifier",
    );
    speech_rule!(store,
        name: "unit",
        dynamic: dynamic,
        action: "[t] CSFunitName",
        query: "self::identifier",
        constraints: [r#"@role="unit""#],
    );
    speech_rule!(store,
        name: "text",
        dynamic: dynamic,
        action: "[t] text()",
        query: "self::text",
    );
    Ok(())
}
