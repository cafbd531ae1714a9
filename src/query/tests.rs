use crate::dom::Document;
use crate::error::QueryError;
use crate::query::{Query, QueryCache};

const FRACTION: &str = r#"<fraction role="division"><children><number>1</number><identifier font="italic">x</identifier></children><content><operator>/</operator></content></fraction>"#;

fn names(nodes: &[crate::dom::NodeRef<'_>]) -> Vec<String> {
    nodes.iter().map(|n| n.name().unwrap_or("#text").to_string()).collect()
}

#[test]
fn child_paths_and_positional_predicates() {
    let doc = Document::parse(FRACTION).unwrap();
    let frac = doc.document_element().unwrap();

    let cases: Vec<(&str, Vec<&str>)> = vec![
        ("children/*", vec!["number", "identifier"]),
        ("children/*[1]", vec!["number"]),
        ("children/*[2]", vec!["identifier"]),
        ("children/*[last()]", vec!["identifier"]),
        ("children/*[position()>1]", vec!["identifier"]),
        ("./children/number", vec!["number"]),
        ("children/identifier[@font='italic']", vec!["identifier"]),
        ("children/identifier[@font='bold']", vec![]),
        ("*", vec!["children", "content"]),
        ("//operator", vec!["operator"]),
        (".//number | .//operator", vec!["number", "operator"]),
        ("self::fraction", vec!["fraction"]),
        ("self::sqrt", vec![]),
    ];

    for (expr, expected) in cases {
        let query = Query::parse(expr).unwrap();
        assert_eq!(names(&query.select(frac)), expected, "query `{}`", expr);
    }
}

#[test]
fn reverse_axes_count_positions_from_the_context_node() {
    let doc = Document::parse("<row><a/><b/><c/><d/></row>").unwrap();
    let d = doc.document_element().unwrap().child_elements().last().unwrap();

    let nearest = Query::parse("preceding-sibling::*[1]").unwrap().select(d);
    assert_eq!(names(&nearest), vec!["c"]);

    // Results come back in document order even from reverse axes.
    let all = Query::parse("preceding-sibling::*").unwrap().select(d);
    assert_eq!(names(&all), vec!["a", "b", "c"]);

    let ancestors = Query::parse("ancestor-or-self::*").unwrap().select(d);
    assert_eq!(names(&ancestors), vec!["row", "d"]);
}

#[test]
fn following_and_preceding_axes() {
    let doc = Document::parse("<r><a><x/></a><b><y/></b><c/></r>").unwrap();
    let b = Query::parse("b").unwrap().select(doc.document_element().unwrap())[0];
    assert_eq!(names(&Query::parse("following::*").unwrap().select(b)), vec!["c"]);
    assert_eq!(names(&Query::parse("preceding::*").unwrap().select(b)), vec!["a", "x"]);
    assert_eq!(names(&Query::parse("..").unwrap().select(b)), vec!["r"]);
}

#[test]
fn boolean_constraints() {
    let doc = Document::parse(FRACTION).unwrap();
    let frac = doc.document_element().unwrap();

    let truthy = [
        "@role='division'",
        "@role",
        "count(children/*)=2",
        "name(children/*[1])='number'",
        "children/number=1",
        "children/number<2",
        "not(@missing)",
        "contains(string(children/identifier), 'x')",
        "starts-with(@role, 'div')",
        "string-length(@role)=8",
        "concat('a', 'b', 'c')='abc'",
        "normalize-space('  a   b ')='a b'",
        "2 * 3 + 1 = 7",
        "7 mod 4 = 3",
        "9 div 2 = 4.5",
        "-1 < 0",
        "true() and not(false())",
        "local-name(.)='fraction'",
        "sum(children/number) = 1",
        "round(2.5) = 3 and floor(2.5) = 2 and ceiling(2.1) = 3",
        "substring-before('a-b', '-') = 'a' and substring-after('a-b', '-') = 'b'",
        "children/* = 'x'",
    ];
    for expr in truthy {
        assert!(Query::parse(expr).unwrap().evaluate_boolean(frac), "expected `{}` to hold", expr);
    }

    let falsy = ["@role='relation'", "children/number>1", "count(children/*)>2", "'' ", "0", "children/*[5]"];
    for expr in falsy {
        assert!(!Query::parse(expr).unwrap().evaluate_boolean(frac), "expected `{}` to fail", expr);
    }
}

#[test]
fn string_values_and_non_node_set_selection() {
    let doc = Document::parse(FRACTION).unwrap();
    let frac = doc.document_element().unwrap();

    assert_eq!(Query::parse("text()").unwrap().evaluate_string(frac), "");
    assert_eq!(Query::parse("children/*[2]").unwrap().evaluate_string(frac), "x");
    assert_eq!(Query::parse("@role").unwrap().evaluate_string(frac), "division");
    assert_eq!(Query::parse("count(//*)").unwrap().evaluate_string(frac), "6");
    assert_eq!(Query::parse("1 div 0").unwrap().evaluate_string(frac), "Infinity");

    assert!(Query::parse("count(children/*)").unwrap().select(frac).is_empty());
    assert!(Query::parse("@role").unwrap().select(frac).is_empty());

    let number = Query::parse("children/number").unwrap().select(frac)[0];
    assert_eq!(names(&Query::parse("text()").unwrap().select(number)), vec!["#text"]);
}

#[test]
fn operator_names_are_context_sensitive() {
    let doc = Document::parse("<and><or/><div>4</div></and>").unwrap();
    let root = doc.document_element().unwrap();

    assert_eq!(names(&Query::parse("self::and").unwrap().select(root)), vec!["and"]);
    assert_eq!(names(&Query::parse("or").unwrap().select(root)), vec!["or"]);
    assert!(Query::parse("div div 2 = 2").unwrap().evaluate_boolean(root));
    assert!(Query::parse("or and div").unwrap().evaluate_boolean(root));
}

#[test]
fn compile_errors() {
    assert!(matches!(Query::parse(""), Err(QueryError::Syntax { .. })));
    assert!(matches!(Query::parse("children/*["), Err(QueryError::Syntax { .. })));
    assert!(matches!(Query::parse("'open"), Err(QueryError::Syntax { .. })));
    assert!(matches!(Query::parse("children/*]"), Err(QueryError::Syntax { .. })));
    assert!(matches!(Query::parse("frobnicate(.)"), Err(QueryError::UnknownFunction { name, .. }) if name == "frobnicate"));
    assert!(matches!(Query::parse("count()"), Err(QueryError::Arity { found: 0, .. })));
    assert!(matches!(Query::parse("concat('a')"), Err(QueryError::Arity { found: 1, .. })));
    assert!(matches!(Query::parse("sideways::x"), Err(QueryError::UnknownAxis { axis, .. }) if axis == "sideways"));
}

#[test]
fn self_name_recognises_plain_element_tests() {
    assert_eq!(Query::parse("self::fraction").unwrap().self_name(), Some("fraction"));
    assert_eq!(Query::parse("self::fraction[@role]").unwrap().self_name(), None);
    assert_eq!(Query::parse("self::*").unwrap().self_name(), None);
    assert_eq!(Query::parse("children/fraction").unwrap().self_name(), None);
}

#[test]
fn cache_compiles_each_source_once() {
    let cache = QueryCache::new();
    let a = cache.get("children/*").unwrap();
    let b = cache.get("children/*").unwrap();
    assert!(std::rc::Rc::ptr_eq(&a, &b));
    assert_eq!(cache.len(), 1);

    assert!(cache.get("children/*[").is_err());
    assert_eq!(cache.len(), 1);
}
