use crate::audio::{Markup, SpeechSegment, render};
use crate::config::EngineConfig;
use crate::dom::{Document, NodeRef};
use crate::engine::SpeechRuleEngine;
use crate::rules::{RULE_SETS, locales};
use crate::store::RuleStore;

fn speak_with(config: EngineConfig, xml: &str) -> String {
    let doc = Document::parse(xml).unwrap();
    let mut engine = SpeechRuleEngine::new(config).unwrap();
    render(&engine.evaluate_tree(&doc).unwrap(), Markup::None)
}

fn speak(style: &str, xml: &str) -> String {
    speak_with(EngineConfig::default().with_style(style), xml)
}

/// Speech for the first element named `name`, in the prefix domain.
fn prefix_for(locale: &str, xml: &str, name: &str, nth: usize) -> String {
    let doc = Document::parse(xml).unwrap();
    let config = EngineConfig::default().with_locale(locale).with_domain("prefix");
    let mut engine = SpeechRuleEngine::new(config).unwrap();
    let node: NodeRef<'_> = doc
        .root()
        .descendants()
        .into_iter()
        .filter(|n| n.name() == Some(name))
        .nth(nth)
        .unwrap();
    render(&engine.evaluate(node).unwrap(), Markup::None)
}

const SIMPLE_FRACTION: &str = "<fraction><children><number>1</number><identifier>x</identifier></children></fraction>";

const NESTED_FRACTION: &str = "<fraction><children>\
    <fraction><children><number>1</number><identifier>x</identifier></children></fraction>\
    <number>2</number></children></fraction>";

#[test]
fn fractions_in_every_style() {
    let cases = [
        ("default", SIMPLE_FRACTION, "StartFraction 1 Over x EndFraction"),
        ("brief", SIMPLE_FRACTION, "StartFrac 1 Over x EndFrac"),
        ("sbrief", SIMPLE_FRACTION, "Frac 1 Over x EndFrac"),
        ("default", NESTED_FRACTION, "StartStartFraction StartFraction 1 Over x EndFraction OverOver 2 EndEndFraction"),
        ("brief", NESTED_FRACTION, "StartStartFrac StartFrac 1 Over x EndFrac OverOver 2 EndEndFrac"),
        ("sbrief", NESTED_FRACTION, "NestFrac Frac 1 Over x EndFrac NestOver 2 NestEndFrac"),
    ];
    for (style, xml, expected) in cases {
        assert_eq!(speak(style, xml), expected, "style {}", style);
    }
}

#[test]
fn scripts_and_powers() {
    let power = |exponent: &str| {
        format!("<superscript><children><identifier>x</identifier><number>{}</number></children></superscript>", exponent)
    };
    assert_eq!(speak("default", &power("2")), "x squared");
    assert_eq!(speak("brief", &power("3")), "x cubed");
    assert_eq!(speak("default", &power("5")), "x Superscript 5 Baseline");
    assert_eq!(speak("sbrief", &power("5")), "x Sup 5 Base");

    let sub = "<subscript><children><identifier>a</identifier><number>1</number></children></subscript>";
    assert_eq!(speak("default", sub), "a Subscript 1 Baseline");
    assert_eq!(speak("brief", sub), "a Sub 1 Base");
}

#[test]
fn radicals_with_nesting_and_named_indices() {
    let nested = "<sqrt><children><sqrt><children><identifier>x</identifier></children></sqrt></children></sqrt>";
    assert_eq!(speak("default", nested), "StartRoot NestedStartRoot x NestedEndRoot EndRoot");
    assert_eq!(speak("brief", nested), "StartRoot NestStartRoot x NestEndRoot EndRoot");

    let root = |index: &str| {
        format!("<root><children><number>{}</number><identifier>y</identifier></children></root>", index)
    };
    assert_eq!(speak("default", &root("4")), "RootIndex 4 StartRoot y EndRoot");
    assert_eq!(speak("default", &root("3")), "Cube StartRoot y EndRoot");
    assert_eq!(speak("brief", &root("2")), "Square StartRoot y EndRoot");
}

#[test]
fn operators_relations_and_fences() {
    let infix = "<infixop><content><operator>+</operator><operator>×</operator></content>\
        <children><identifier>a</identifier><identifier>b</identifier><number>2</number></children></infixop>";
    assert_eq!(speak("default", infix), "a plus b times 2");

    let relseq = "<relseq><content><relation>≤</relation></content>\
        <children><identifier>y</identifier><number>0</number></children></relseq>";
    assert_eq!(speak("brief", relseq), "y less-than-or-equals 0");

    let fenced = "<fenced><content><fence>(</fence><fence>)</fence></content>\
        <children><identifier>x</identifier></children></fenced>";
    assert_eq!(speak("default", fenced), "left-parenthesis x right-parenthesis");

    // Unknown symbols are read as written.
    let odd = "<infixop><content><operator>⊕</operator></content>\
        <children><identifier>p</identifier><identifier>q</identifier></children></infixop>";
    assert_eq!(speak("default", odd), "p ⊕ q");
}

#[test]
fn matrices_count_rows_and_columns() {
    let matrix = "<matrix><children>\
        <row><children><cell><children><identifier>a</identifier></children></cell>\
                       <cell><children><identifier>b</identifier></children></cell></children></row>\
        <row><children><cell><children><identifier>c</identifier></children></cell>\
                       <cell><children><identifier>d</identifier></children></cell></children></row>\
        </children></matrix>";
    assert_eq!(
        speak("default", matrix),
        "Start 2 By 2 Matrix Row 1 Column 1 a Column 2 b Row 2 Column 1 c Column 2 d EndMatrix"
    );
}

#[test]
fn units_are_named() {
    let quantity = r#"<infixop><content><operator>·</operator></content><children><number>5</number><identifier role="unit">kg</identifier></children></infixop>"#;
    assert_eq!(speak("default", quantity), "5 dot kilogram");
    assert_eq!(speak("default", "<identifier>kg</identifier>"), "kg");
}

#[test]
fn english_prefix_announcements() {
    assert_eq!(prefix_for("en", SIMPLE_FRACTION, "number", 0), "Numerator");
    assert_eq!(prefix_for("en", SIMPLE_FRACTION, "identifier", 0), "Denominator");

    let root = "<root><children><number>3</number><identifier>y</identifier></children></root>";
    assert_eq!(prefix_for("en", root, "number", 0), "Index");
    assert_eq!(prefix_for("en", root, "identifier", 0), "Radicand");

    let tensor = r#"<tensor><children><identifier>T</identifier><punctuated role="rightsuper"><children><identifier>a</identifier><identifier>b</identifier></children></punctuated></children></tensor>"#;
    assert_eq!(prefix_for("en", tensor, "identifier", 0), "Base");
    assert_eq!(prefix_for("en", tensor, "identifier", 2), "2nd Right Superscript");
}

#[test]
fn spanish_prefix_announcements() {
    let superscript = "<superscript><children><identifier>x</identifier><number>2</number></children></superscript>";
    assert_eq!(prefix_for("es", superscript, "number", 0), "exponente");

    let tensor = r#"<tensor><children><identifier>T</identifier><identifier role="leftsub">i</identifier></children></tensor>"#;
    assert_eq!(prefix_for("es", tensor, "identifier", 1), "subíndice izquierdo");

    let binomial = r#"<vector><children><line role="binomial"><children><identifier>n</identifier></children></line><line role="binomial"><children><identifier>k</identifier></children></line></children></vector>"#;
    assert_eq!(prefix_for("es", binomial, "line", 0), "cantidad de elección");
    assert_eq!(prefix_for("es", binomial, "line", 1), "cantidad de selección");

    let table = r#"<table><children>
        <row><children><cell><children><number>1</number></children></cell></children></row>
        <row><children><cell><children><number>2</number></children></cell><cell grammar="depth"><children><number>3</number></children></cell></children></row>
        </children></table>"#;
    assert_eq!(prefix_for("es", table, "row", 1), "2º fila");
    assert_eq!(prefix_for("es", table, "cell", 1), "1º columna");
    assert_eq!(prefix_for("es", table, "cell", 2), "2º fila 2º columna");
    // `line` is an alias of `row`.
    assert_eq!(prefix_for("es", "<table><children><line/><line/></children></table>", "line", 1), "2º fila");
}

#[test]
fn prefix_rules_end_with_a_pause() {
    let doc = Document::parse(SIMPLE_FRACTION).unwrap();
    let config = EngineConfig::default().with_domain("prefix");
    let mut engine = SpeechRuleEngine::new(config).unwrap();
    let numerator = doc.root().descendants().into_iter().find(|n| n.name() == Some("number")).unwrap();
    assert_eq!(engine.evaluate(numerator).unwrap(), vec![SpeechSegment::text("Numerator"), SpeechSegment::pause(200)]);
}

#[test]
fn rule_set_filter_limits_what_loads() {
    let only_prefix = EngineConfig::default().with_rule_sets(["prefix"]);
    // Without the mathspeak set the fraction falls back to its text.
    assert_eq!(speak_with(only_prefix, SIMPLE_FRACTION), "1x");

    // A Spanish store also carries the English sets, under their own locale.
    let spanish = RuleStore::from_rule_sets("es", RULE_SETS, None).unwrap();
    let english = RuleStore::from_rule_sets("en", RULE_SETS, None).unwrap();
    let es_rules = spanish.find_all_rules(|rule| rule.dynamic_cstr().locale() == "es");
    assert_eq!(es_rules.len(), 24);
    assert_eq!(spanish.len(), english.len() + 24);
    assert!(english.speech_rules().all(|rule| rule.dynamic_cstr().locale() == "en"));
    assert_eq!(locales(), vec!["en", "es"]);
}
