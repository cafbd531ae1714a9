//! Unit names, weight category.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::dom::NodeRef;

/// Map of unit symbols (every accepted spelling) to their spoken names.
static WEIGHT_UNITS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("lb", "pound"),
        ("lb.", "pound"),
        ("LT", "long ton"),
        ("L.T.", "long ton"),
        ("oz", "ounce"),
        ("oz.", "ounce"),
        ("µg", "microgram"),
        ("mcg", "microgram"),
        ("g", "gram"),
        ("gr", "gram"),
        ("kg", "kilogram"),
        ("mg", "milligram"),
        ("t", "ton"),
        ("T", "ton"),
    ])
});

pub fn unit_name(symbol: &str) -> Option<&'static str> {
    WEIGHT_UNITS.get(symbol.trim()).copied()
}

/// `CSFunitName`: the spoken unit name, or the symbol itself when unknown.
pub fn unit_name_string(node: NodeRef<'_>) -> String {
    let symbol = node.text_content();
    match unit_name(&symbol) {
        Some(name) => name.to_string(),
        None => symbol.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_units_by_every_spelling() {
        let cases = [
            ("lb.", "pound"),
            ("L.T.", "long ton"),
            ("mcg", "microgram"),
            ("µg", "microgram"),
            ("gr", "gram"),
            ("T", "ton"),
            (" kg ", "kilogram"),
        ];
        for (symbol, name) in cases {
            assert_eq!(unit_name(symbol), Some(name), "symbol {:?}", symbol);
        }
        assert_eq!(unit_name("furlong"), None);
    }
}
