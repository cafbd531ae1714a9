use proptest::prelude::*;
use speechrule::{Document, DynamicCstr, EngineConfig, RuleStore, SpeechRuleEngine};

const STYLES: [&str; 3] = ["default", "brief", "sbrief"];
const QUERIES: [&str; 3] = ["self::x", "self::y", "self::*"];
const CONSTRAINTS: [Option<&str>; 3] = [None, Some(r#"@a="1""#), Some(r#"@a="2""#)];

/// A rule shape: indices into `STYLES`, `QUERIES` and `CONSTRAINTS`.
#[derive(Debug, Clone, Copy)]
struct RuleShape {
    style: usize,
    query: usize,
    constraint: usize,
}

impl RuleShape {
    /// Whether the rule can fire on `<x a="1"/>` under `target` style.
    fn applies(&self, target: usize) -> bool {
        let query_ok = QUERIES[self.query] != "self::y";
        let constraint_ok = CONSTRAINTS[self.constraint] != Some(r#"@a="2""#);
        let style_ok = self.style == target || STYLES[self.style] == "default";
        query_ok && constraint_ok && style_ok
    }

    /// Ranking key; larger wins.
    fn rank(&self, target: usize, index: usize) -> (bool, usize, usize) {
        (self.style == target, CONSTRAINTS[self.constraint].iter().count(), index)
    }
}

fn rule_shape() -> impl Strategy<Value = RuleShape> {
    (0..STYLES.len(), 0..QUERIES.len(), 0..CONSTRAINTS.len())
        .prop_map(|(style, query, constraint)| RuleShape { style, query, constraint })
}

fn build_store(shapes: &[RuleShape]) -> RuleStore {
    let mut store = RuleStore::empty("en");
    for (index, shape) in shapes.iter().enumerate() {
        let constraints: Vec<&str> = CONSTRAINTS[shape.constraint].into_iter().collect();
        store
            .define_rule(
                &format!("r{}", index),
                &format!("mathspeak.{}", STYLES[shape.style]),
                &format!(r#"[t] "r{}""#, index),
                QUERIES[shape.query],
                &constraints,
            )
            .unwrap()
            .unwrap();
    }
    store
}

fn expected_winner(shapes: &[RuleShape], target: usize) -> Option<String> {
    shapes
        .iter()
        .enumerate()
        .filter(|(_, shape)| shape.applies(target))
        .max_by_key(|(index, shape)| shape.rank(target, *index))
        .map(|(index, _)| format!("r{}", index))
}

/// Small semantic trees built from the bundled MathSpeak vocabulary.
fn math_tree() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![
        (0u32..20).prop_map(|n| format!("<number>{}</number>", n)),
        prop::sample::select(vec!["x", "y", "n"]).prop_map(|id| format!("<identifier>{}</identifier>", id)),
    ];
    leaf.prop_recursive(4, 24, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone())
                .prop_map(|(a, b)| format!("<fraction><children>{}{}</children></fraction>", a, b)),
            (inner.clone(), inner.clone())
                .prop_map(|(a, b)| format!("<superscript><children>{}{}</children></superscript>", a, b)),
            inner.clone().prop_map(|a| format!("<sqrt><children>{}</children></sqrt>", a)),
            (inner.clone(), inner).prop_map(|(a, b)| {
                format!(
                    "<infixop><content><operator>+</operator></content><children>{}{}</children></infixop>",
                    a, b
                )
            }),
        ]
    })
}

proptest! {
    #[test]
    fn lookup_returns_the_best_applicable_rule(
        shapes in prop::collection::vec(rule_shape(), 0..12),
        target in 0..STYLES.len(),
    ) {
        let store = build_store(&shapes);
        let doc = Document::parse(r#"<x a="1"/>"#).unwrap();
        let node = doc.document_element().unwrap();
        let dynamic = DynamicCstr::new("en", "mathspeak", STYLES[target]);

        let found = store.lookup_rule(node, &dynamic).unwrap().map(|rule| rule.name().to_string());
        prop_assert_eq!(found, expected_winner(&shapes, target));
    }

    #[test]
    fn exact_style_never_loses_to_fallback(
        shapes in prop::collection::vec(rule_shape(), 1..12),
        target in 1..STYLES.len(),
    ) {
        let store = build_store(&shapes);
        let doc = Document::parse(r#"<x a="1"/>"#).unwrap();
        let node = doc.document_element().unwrap();
        let dynamic = DynamicCstr::new("en", "mathspeak", STYLES[target]);

        let any_exact = shapes.iter().any(|shape| shape.applies(target) && shape.style == target);
        if let Some(rule) = store.lookup_rule(node, &dynamic).unwrap() {
            prop_assert_eq!(rule.dynamic_cstr().style() == STYLES[target], any_exact);
        }
    }

    #[test]
    fn redefining_rules_is_idempotent(shapes in prop::collection::vec(rule_shape(), 0..12)) {
        let once = build_store(&shapes);
        let mut twice_shapes = shapes.clone();
        twice_shapes.extend(shapes.iter().copied());
        let twice = build_store(&twice_shapes);
        prop_assert_eq!(once.len(), twice.len());
        prop_assert!(twice.len() <= shapes.len());
    }

    #[test]
    fn cache_does_not_change_speech(xml in math_tree(), style in prop::sample::select(STYLES.to_vec())) {
        let doc = Document::parse(&xml).unwrap();
        let cached_config = EngineConfig::default().with_style(style);
        let mut cached = SpeechRuleEngine::new(cached_config.clone()).unwrap();
        let mut uncached = SpeechRuleEngine::new(cached_config.with_cache(false)).unwrap();

        let cold = cached.evaluate_tree(&doc).unwrap();
        let warm = cached.evaluate_tree(&doc).unwrap();
        let plain = uncached.evaluate_tree(&doc).unwrap();
        prop_assert_eq!(&cold, &warm);
        prop_assert_eq!(&cold, &plain);
        prop_assert!(cached.cache_stats().hits >= 1);
        prop_assert_eq!(uncached.cache_stats().entries, 0);
    }
}
