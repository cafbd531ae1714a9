use crate::dom::{Document, NodeRef};
use crate::dynamic_cstr::DynamicCstr;
use crate::error::{LoadError, QueryError, RegistryError};
use crate::store::{ContextGenerator, FunctionKind, RuleSet, RuleStore};

const FRACTION: &str = "<fraction><children><identifier>a</identifier><identifier>b</identifier></children></fraction>";

fn numerator(doc: &Document) -> NodeRef<'_> {
    doc.document_element().unwrap().child_elements().next().unwrap().child_elements().next().unwrap()
}

fn lookup_name(store: &RuleStore, node: NodeRef<'_>, dynamic: &DynamicCstr) -> Option<String> {
    store.lookup_rule(node, dynamic).unwrap().map(|rule| rule.name().to_string())
}

#[test]
fn style_specific_rule_wins_even_when_defined_later() {
    let mut store = RuleStore::empty("en");
    store.define_rule("numerator-phrase", "mathspeak.default", r#"[t] "numerator""#, "self::*", &[
        r#"name(../..)="fraction""#,
    ])
    .unwrap();
    store.define_rule("numerator-brief", "mathspeak.brief", r#"[t] "num""#, "self::*", &[r#"name(../..)="fraction""#])
        .unwrap();

    let doc = Document::parse(FRACTION).unwrap();
    let node = numerator(&doc);

    assert_eq!(
        lookup_name(&store, node, &DynamicCstr::new("en", "mathspeak", "brief")),
        Some("numerator-brief".to_string())
    );
    assert_eq!(
        lookup_name(&store, node, &DynamicCstr::new("en", "mathspeak", "default")),
        Some("numerator-phrase".to_string())
    );
    // No rule exists for "sbrief"; the default style is the fallback.
    assert_eq!(
        lookup_name(&store, node, &DynamicCstr::new("en", "mathspeak", "sbrief")),
        Some("numerator-phrase".to_string())
    );
}

#[test]
fn more_static_constraints_win_among_equally_specific_rules() {
    let mut store = RuleStore::empty("en");
    store
        .define_rule("b", "mathspeak.default", r#"[t] "first""#, "self::*", &[
            r#"name(../..)="fraction""#,
            "count(preceding-sibling::*)=0",
        ])
        .unwrap();
    store.define_rule("a", "mathspeak.default", r#"[t] "any""#, "self::*", &[r#"name(../..)="fraction""#]).unwrap();

    let doc = Document::parse(FRACTION).unwrap();
    let dynamic = DynamicCstr::new("en", "mathspeak", "default");
    assert_eq!(lookup_name(&store, numerator(&doc), &dynamic), Some("b".to_string()));

    let second = numerator(&doc).following_siblings()[0];
    assert_eq!(lookup_name(&store, second, &dynamic), Some("a".to_string()));
}

#[test]
fn full_ties_resolve_to_the_newest_definition() {
    let mut store = RuleStore::empty("en");
    store.define_rule("older", "mathspeak.default", r#"[t] "old""#, "self::identifier", &["text()='a'"]).unwrap();
    store.define_rule("newer", "mathspeak.default", r#"[t] "new""#, "self::identifier", &["string-length(.)=1"]).unwrap();

    let doc = Document::parse(FRACTION).unwrap();
    let dynamic = DynamicCstr::new("en", "mathspeak", "default");
    assert_eq!(lookup_name(&store, numerator(&doc), &dynamic), Some("newer".to_string()));

    let newer = store.find_rule(|rule| rule.name() == "newer").unwrap();
    assert!(store.delete_rule(&newer));
    assert_eq!(lookup_name(&store, numerator(&doc), &dynamic), Some("older".to_string()));
}

#[test]
fn fallback_rule_is_used_when_the_specific_one_fails_its_constraints() {
    let mut store = RuleStore::empty("en");
    store.define_rule("generic", "default.default", r#"[t] "generic""#, "self::identifier", &[]).unwrap();
    store.define_rule("special", "mathspeak.brief", r#"[t] "special""#, "self::identifier", &["text()='z'"]).unwrap();

    let doc = Document::parse(FRACTION).unwrap();
    let dynamic = DynamicCstr::new("en", "mathspeak", "brief");
    assert_eq!(lookup_name(&store, numerator(&doc), &dynamic), Some("generic".to_string()));
}

#[test]
fn non_element_nodes_never_get_rules() {
    let mut store = RuleStore::empty("en");
    store.define_rule("anything", "default.default", r#"[t] "node""#, "self::node()", &[]).unwrap();

    let doc = Document::parse("<row><!-- note --><?pi data?><cell>x</cell></row>").unwrap();
    let dynamic = DynamicCstr::new("en", "default", "default");
    let children: Vec<_> = doc.document_element().unwrap().children().collect();

    assert_eq!(lookup_name(&store, children[0], &dynamic), None);
    assert_eq!(lookup_name(&store, children[1], &dynamic), None);
    assert_eq!(lookup_name(&store, children[2], &dynamic), Some("anything".to_string()));
    assert_eq!(lookup_name(&store, doc.root(), &dynamic), None);

    let text = children[2].children().next().unwrap();
    assert_eq!(lookup_name(&store, text, &dynamic), Some("anything".to_string()));
}

#[test]
fn name_tests_are_probed_by_element_name() {
    let mut store = RuleStore::empty("en");
    for i in 0..40 {
        let name = format!("n{}", i);
        store.define_rule(&name, "mathspeak", &format!(r#"[t] "{}""#, name), &format!("self::{}", name), &[]).unwrap();
    }
    store.define_rule("wildcard", "mathspeak", r#"[t] "any""#, "self::*", &["@keep"]).unwrap();
    store.define_rule("predicate", "mathspeak", r#"[t] "p""#, "self::*[@p]", &[]).unwrap();

    // Only the two non-name queries are tested on every lookup.
    assert_eq!(store.trie().scanned_queries(), 2);
    assert_eq!(store.trie().len(), 42);

    let doc = Document::parse(r#"<r><n7/><n7 keep="1"/><other/></r>"#).unwrap();
    let nodes: Vec<_> = doc.document_element().unwrap().child_elements().collect();
    let dynamic = DynamicCstr::new("en", "mathspeak", "default");
    assert_eq!(lookup_name(&store, nodes[0], &dynamic), Some("n7".to_string()));
    // More constraints win over the name test.
    assert_eq!(lookup_name(&store, nodes[1], &dynamic), Some("wildcard".to_string()));
    assert_eq!(lookup_name(&store, nodes[2], &dynamic), None);

    let n7 = store.find_rule(|rule| rule.name() == "n7").unwrap();
    assert!(store.delete_rule(&n7));
    assert_eq!(lookup_name(&store, nodes[0], &dynamic), None);
    assert_eq!(store.trie().len(), 41);
}

#[test]
fn empty_stores_carry_the_builtin_context_functions() {
    let mut store = RuleStore::empty("en");
    assert!(store.context_function("CTFnodeCounter").is_some());
    assert!(store.context_function("CTFcontentIterator").is_some());

    fn silent(_: &[NodeRef<'_>], _: &str) -> ContextGenerator {
        Box::new(|| None)
    }
    let err = store.add_context_function("CTFnodeCounter", silent).unwrap_err();
    assert_eq!(err, RegistryError::Duplicate { kind: FunctionKind::Context, name: "CTFnodeCounter".into() });
}

#[test]
fn redefinition_keeps_only_the_later_rule() {
    let mut store = RuleStore::empty("es");
    store.define_rule("row", "prefix.default", r#"[t] "fila""#, "self::row", &[]).unwrap();
    store.define_rule("cell", "prefix.default", r#"[t] "columna""#, "self::cell", &[]).unwrap();
    let later = store.define_rule("row", "prefix.default", r#"[t] "renglón""#, "self::row", &[]).unwrap().unwrap();

    let rows = store.find_all_rules(|rule| rule.name() == "row");
    assert_eq!(rows.len(), 1);
    assert!(std::rc::Rc::ptr_eq(&rows[0], &later));
    assert_eq!(store.len(), 2);
    assert_eq!(store.trie().len(), 2);

    // Newest first.
    let names: Vec<_> = store.speech_rules().map(|rule| rule.name().to_string()).collect();
    assert_eq!(names, vec!["row", "cell"]);
}

#[test]
fn constraint_order_does_not_distinguish_rules() {
    let mut store = RuleStore::empty("en");
    store.define_rule("x", "mathspeak.default", r#"[t] "one""#, "self::*", &["@a", "@b"]).unwrap();
    store.define_rule("y", "mathspeak.default", r#"[t] "two""#, "self::*", &["@b", "@a"]).unwrap();
    assert_eq!(store.len(), 1);
    assert_eq!(store.speech_rules().next().unwrap().name(), "y");

    store.define_rule("z", "mathspeak.brief", r#"[t] "three""#, "self::*", &["@b", "@a"]).unwrap();
    assert_eq!(store.len(), 2);
}

#[test]
fn malformed_rules_are_skipped_and_loading_continues() {
    let mut store = RuleStore::empty("en");
    let cases: Vec<(&str, &str, &str)> = vec![
        ("too-many", "a.b.c", r#"[t] "x""#),
        ("empty-axis", "mathspeak..", r#"[t] "x""#),
        ("bad-action", "mathspeak", "numerator"),
        ("unterminated", "mathspeak", r#"[t] "x"#),
        ("unknown-csf", "mathspeak", "[t] CSFmissing"),
        ("unknown-ctf", "mathspeak", "[m] ./* (ctxtFunc:CTFmissing)"),
        ("", "mathspeak", r#"[t] "x""#),
    ];
    for (name, dynamic, action) in cases {
        let defined = store.define_rule(name, dynamic, action, "self::*", &[]).unwrap();
        assert!(defined.is_none(), "rule `{}` should have been skipped", name);
    }
    assert!(store.is_empty());

    assert!(store.define_rule("ok", "mathspeak", r#"[t] "x""#, "self::*", &[]).unwrap().is_some());
    assert_eq!(store.len(), 1);
}

#[test]
fn registered_functions_make_rules_valid() {
    let mut store = RuleStore::empty("en");
    fn shout(node: NodeRef<'_>) -> String {
        node.text_content().to_uppercase()
    }
    store.add_custom_string("CSFshout", shout).unwrap();
    assert!(store.add_custom_string("CSFshout", shout).is_err());

    let rule = store.define_rule("loud", "mathspeak", "[t] CSFshout", "self::identifier", &[]).unwrap();
    assert!(rule.is_some());
    let rule = store.define_rule("rows", "mathspeak", "[m] ./* (ctxtFunc:CTFnodeCounter, context:\"Row\")", "self::table", &[]);
    assert!(rule.unwrap().is_some());
}

#[test]
fn query_errors_surface_at_lookup_time() {
    let mut store = RuleStore::empty("en");
    // Queries compile lazily, so definition succeeds.
    store.define_rule("broken", "mathspeak", r#"[t] "x""#, "self::*", &["count(children/*"]).unwrap().unwrap();

    let doc = Document::parse(FRACTION).unwrap();
    let err = store.lookup_rule(numerator(&doc), &DynamicCstr::new("en", "mathspeak", "default")).unwrap_err();
    assert!(matches!(err, QueryError::Syntax { .. }));
}

#[test]
fn custom_queries_serve_as_selectors_and_constraints() {
    let mut store = RuleStore::empty("en");
    fn grandparent(node: NodeRef<'_>) -> Vec<NodeRef<'_>> {
        node.parent().and_then(|p| p.parent()).into_iter().collect()
    }
    store.add_custom_query("CQFgrandparent", grandparent).unwrap();

    let doc = Document::parse(FRACTION).unwrap();
    let node = numerator(&doc);
    let evaluator = store.evaluator();
    assert_eq!(evaluator.apply_query(node, "CQFgrandparent").unwrap(), doc.document_element());
    assert!(evaluator.apply_constraint(node, "CQFgrandparent").unwrap());
    assert!(!evaluator.apply_constraint(doc.document_element().unwrap(), "CQFgrandparent").unwrap());
    assert!(evaluator.apply_constraint(node, "name(..)='children'").unwrap());

    store.define_rule("deep", "mathspeak", r#"[t] "deep""#, "self::*", &["CQFgrandparent"]).unwrap();
    assert_eq!(lookup_name(&store, node, &DynamicCstr::new("en", "mathspeak", "default")), Some("deep".to_string()));
}

#[test]
fn rules_alias_copies_action_and_constraint() {
    let mut store = RuleStore::empty("es");
    store.define_rule("row", "prefix.default", r#"[t] "fila""#, "self::row", &[]).unwrap();
    store.define_rule("row", "prefix.brief", r#"[t] "f""#, "self::row", &[]).unwrap();
    store.define_rules_alias("row", "self::line", &[]).unwrap();

    let aliases = store.find_all_rules(|rule| rule.precondition().query() == "self::line");
    assert_eq!(aliases.len(), 2);
    assert!(aliases.iter().all(|rule| rule.name() == "row"));

    store.define_unique_rule_alias("row", "prefix.brief", "self::mtr", &["@x"]).unwrap();
    let unique = store.find_rule(|rule| rule.precondition().query() == "self::mtr").unwrap();
    assert_eq!(unique.dynamic_cstr(), &DynamicCstr::new("es", "prefix", "brief"));
    assert_eq!(unique.action().to_string(), r#"[t] "f""#);

    assert_eq!(store.define_rules_alias("nope", "self::x", &[]), Err(LoadError::UnknownRule { name: "nope".into() }));
    assert!(matches!(
        store.define_unique_rule_alias("row", "prefix.sbrief", "self::x", &[]),
        Err(LoadError::UnknownRule { .. })
    ));
}

#[test]
fn parse_cstr_prefixes_the_store_locale() {
    let store = RuleStore::empty("es");
    assert_eq!(store.parse_cstr("prefix.default").unwrap(), DynamicCstr::new("es", "prefix", "default"));
    assert_eq!(store.parse_cstr("").unwrap(), DynamicCstr::new("es", "default", "default"));
    assert!(store.parse_cstr("prefix.default.extra").is_err());
}

fn define_greeting(store: &mut RuleStore) -> Result<(), LoadError> {
    store.define_rule("hello", "greeting", r#"[t] "hello""#, "self::*", &[])?;
    Ok(())
}

fn define_farewell(store: &mut RuleStore) -> Result<(), LoadError> {
    store.define_rule("bye", "farewell", r#"[t] "bye""#, "self::*", &[])?;
    Ok(())
}

fn fail_loading(_: &mut RuleStore) -> Result<(), LoadError> {
    Err(LoadError::UnknownRule { name: "missing".into() })
}

const SETS: &[RuleSet] = &[
    RuleSet { name: "greeting", locale: "en", initializers: &[define_greeting] },
    RuleSet { name: "farewell", locale: "en", initializers: &[define_farewell] },
    RuleSet { name: "greeting", locale: "fr", initializers: &[fail_loading] },
];

#[test]
fn rule_sets_are_filtered_by_locale_and_name() {
    let all = RuleStore::from_rule_sets("en", SETS, None).unwrap();
    assert_eq!(all.len(), 2);

    let only = RuleStore::from_rule_sets("en", SETS, Some(&["farewell".to_string()])).unwrap();
    let names: Vec<_> = only.speech_rules().map(|rule| rule.name().to_string()).collect();
    assert_eq!(names, vec!["bye"]);

    let err = RuleStore::from_rule_sets("en", SETS, Some(&["nonsense".to_string()])).unwrap_err();
    assert_eq!(err, LoadError::UnknownRuleSet { name: "nonsense".into(), locale: "en".into() });

    // Non-definition failures abort loading.
    assert!(RuleStore::from_rule_sets("fr", SETS, None).is_err());
}

#[test]
fn default_evaluation_speaks_text_content() {
    let store = RuleStore::empty("en");
    let doc = Document::parse(FRACTION).unwrap();
    let segments = store.evaluate_default(doc.document_element().unwrap());
    assert_eq!(segments, vec![crate::audio::SpeechSegment::text("ab")]);

    // Text is passed through as written, surrounding spaces included.
    let doc = Document::parse("<mystery> a  b </mystery>").unwrap();
    let segments = store.evaluate_default(doc.document_element().unwrap());
    assert_eq!(segments, vec![crate::audio::SpeechSegment::text(" a  b ")]);
}
