//! Rule action programs.
//!
//! An action is an ordered list of directives written in a compact DSL:
//!
//! ```text
//! [t] "StartFraction"; [n] children/*[1]; [p] (pause:200); [m] children/* (sepFunc:CTFcontentIterator)
//! └──── Text ──────┘   └──── Recurse ───┘  └─ Prosody ──┘  └──────────── Recurse (multi) ──────────┘
//! ```
//!
//! | tag   | content                                   | attributes                                        |
//! |-------|-------------------------------------------|---------------------------------------------------|
//! | `[t]` | `"literal"`, `CSFname` or a query         | `rate`, `pitch`, `volume`                         |
//! | `[n]` | selector, first match is spoken           | prosody, `context`, `ctxtFunc`                    |
//! | `[m]` | selector, every match is spoken           | prosody, `context`, `ctxtFunc`, `separator`, `sepFunc` |
//! | `[p]` | none                                      | `pause` (milliseconds)                            |
//!
//! Components are separated by `;` outside quotes, brackets and parentheses.

use std::fmt;

use crate::audio::Personality;
use crate::error::ActionParseError;

/// Prefix that marks a custom string reference inside `[t]`.
pub const CUSTOM_STRING_PREFIX: &str = "CSF";

#[derive(Debug, Clone, PartialEq)]
pub enum TextSource {
    Literal(String),
    CustomString(String),
    /// String value of a structural query evaluated against the node.
    Query(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProsodyMark {
    /// A timed pause in milliseconds.
    Pause(u32),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecurseOptions {
    pub context: Option<String>,
    pub context_function: Option<String>,
    pub separator: Option<String>,
    pub separator_function: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionDirective {
    Text { source: TextSource, personality: Personality },
    Prosody(ProsodyMark),
    Recurse { selector: String, multi: bool, options: RecurseOptions, personality: Personality },
}

/// Parsed action program of a speech rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    directives: Vec<ActionDirective>,
}

impl Action {
    pub fn parse(spec: &str) -> Result<Action, ActionParseError> {
        let directives = split_outside(spec, ';')?
            .into_iter()
            .map(str::trim)
            .filter(|component| !component.is_empty())
            .map(parse_component)
            .collect::<Result<Vec<_>, _>>()?;
        if directives.is_empty() {
            return Err(ActionParseError::Empty);
        }
        Ok(Action { directives })
    }

    pub fn directives(&self) -> &[ActionDirective] {
        &self.directives
    }

    /// Names of custom strings referenced by `[t]` directives.
    pub fn custom_strings(&self) -> impl Iterator<Item = &str> {
        self.directives.iter().filter_map(|d| match d {
            ActionDirective::Text { source: TextSource::CustomString(name), .. } => Some(name.as_str()),
            _ => None,
        })
    }

    /// Names of context functions referenced through `ctxtFunc` and `sepFunc`.
    pub fn context_functions(&self) -> impl Iterator<Item = &str> {
        self.directives.iter().flat_map(|d| match d {
            ActionDirective::Recurse { options, .. } => {
                [options.context_function.as_deref(), options.separator_function.as_deref()]
            }
            _ => [None, None],
        })
        .flatten()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, directive) in self.directives.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            let mut attrs: Vec<String> = Vec::new();
            match directive {
                ActionDirective::Text { source, personality } => {
                    match source {
                        TextSource::Literal(text) => write!(f, "[t] \"{}\"", text)?,
                        TextSource::CustomString(name) | TextSource::Query(name) => write!(f, "[t] {}", name)?,
                    }
                    attrs.extend(personality_attributes(personality));
                }
                ActionDirective::Prosody(ProsodyMark::Pause(ms)) => {
                    f.write_str("[p]")?;
                    attrs.push(format!("pause:{}", ms));
                }
                ActionDirective::Recurse { selector, multi, options, personality } => {
                    write!(f, "[{}] {}", if *multi { 'm' } else { 'n' }, selector)?;
                    attrs.extend(personality_attributes(personality));
                    let named = [
                        ("context", &options.context, true),
                        ("ctxtFunc", &options.context_function, false),
                        ("separator", &options.separator, true),
                        ("sepFunc", &options.separator_function, false),
                    ];
                    for (key, value, quoted) in named {
                        if let Some(value) = value {
                            attrs.push(if quoted { format!("{}:\"{}\"", key, value) } else { format!("{}:{}", key, value) });
                        }
                    }
                }
            }
            if !attrs.is_empty() {
                write!(f, " ({})", attrs.join(", "))?;
            }
        }
        Ok(())
    }
}

fn personality_attributes(personality: &Personality) -> Vec<String> {
    [("rate", personality.rate), ("pitch", personality.pitch), ("volume", personality.volume)]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| format!("{}:{}", key, v)))
        .collect()
}

fn parse_component(component: &str) -> Result<ActionDirective, ActionParseError> {
    let caps = regex!(r"(?s)^\[(?P<tag>[a-z]+)\]\s*(?P<body>.*)$")
        .captures(component)
        .ok_or_else(|| ActionParseError::MissingTag(component.to_string()))?;
    let tag = &caps["tag"];
    let (content, attributes) = split_attributes(caps["body"].trim())?;

    match tag {
        "t" => {
            let source = parse_text_source(component, content)?;
            let mut personality = Personality::default();
            for (key, value) in attributes {
                if !apply_prosody(&mut personality, &key, &value)? {
                    return Err(ActionParseError::UnsupportedAttribute { tag: 't', key });
                }
            }
            Ok(ActionDirective::Text { source, personality })
        }
        "n" | "m" => {
            if content.is_empty() {
                return Err(ActionParseError::MissingContent(component.to_string()));
            }
            let multi = tag == "m";
            let mut options = RecurseOptions::default();
            let mut personality = Personality::default();
            for (key, value) in attributes {
                match key.as_str() {
                    "context" => options.context = Some(value),
                    "ctxtFunc" => options.context_function = Some(value),
                    "separator" if multi => options.separator = Some(value),
                    "sepFunc" if multi => options.separator_function = Some(value),
                    _ => {
                        if !apply_prosody(&mut personality, &key, &value)? {
                            return Err(ActionParseError::UnsupportedAttribute { tag: if multi { 'm' } else { 'n' }, key });
                        }
                    }
                }
            }
            Ok(ActionDirective::Recurse { selector: content.to_string(), multi, options, personality })
        }
        "p" => {
            if !content.is_empty() {
                return Err(ActionParseError::MalformedAttribute(component.to_string()));
            }
            let mut pause = None;
            for (key, value) in attributes {
                match key.as_str() {
                    "pause" => {
                        let ms = value.parse::<u32>().map_err(|_| ActionParseError::InvalidValue { key, value })?;
                        pause = Some(ms);
                    }
                    _ => return Err(ActionParseError::UnsupportedAttribute { tag: 'p', key }),
                }
            }
            pause
                .map(|ms| ActionDirective::Prosody(ProsodyMark::Pause(ms)))
                .ok_or_else(|| ActionParseError::MissingContent(component.to_string()))
        }
        other => Err(ActionParseError::UnknownTag(other.to_string())),
    }
}

fn parse_text_source(component: &str, content: &str) -> Result<TextSource, ActionParseError> {
    if content.is_empty() {
        return Err(ActionParseError::MissingContent(component.to_string()));
    }
    if let Some(rest) = content.strip_prefix('"') {
        return match rest.strip_suffix('"') {
            Some(text) => Ok(TextSource::Literal(text.to_string())),
            None => Err(ActionParseError::UnterminatedString(component.to_string())),
        };
    }
    if content.starts_with(CUSTOM_STRING_PREFIX) {
        return Ok(TextSource::CustomString(content.to_string()));
    }
    Ok(TextSource::Query(content.to_string()))
}

/// Returns false when `key` is not a prosody attribute.
fn apply_prosody(personality: &mut Personality, key: &str, value: &str) -> Result<bool, ActionParseError> {
    let slot = match key {
        "rate" => &mut personality.rate,
        "pitch" => &mut personality.pitch,
        "volume" => &mut personality.volume,
        _ => return Ok(false),
    };
    let parsed = value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ActionParseError::InvalidValue { key: key.to_string(), value: value.to_string() })?;
    *slot = Some(parsed);
    Ok(true)
}

/// Splits `body` into content and a trailing `(key:value, ...)` group.
///
/// The group must be top-level, close at the very end of `body` and start at the
/// beginning of `body` or after whitespace; a selector such as
/// `children/*[position()=1]` is left untouched.
fn split_attributes(body: &str) -> Result<(&str, Vec<(String, String)>), ActionParseError> {
    if !body.ends_with(')') {
        return Ok((body, Vec::new()));
    }

    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut group_start = None;
    for (i, c) in body.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(' | '[') => {
                if depth == 0 && c == '(' {
                    group_start = Some(i);
                }
                depth += 1;
            }
            (None, ')' | ']') => {
                depth = depth.checked_sub(1).ok_or_else(|| ActionParseError::UnbalancedParens(body.to_string()))?;
            }
            _ => {}
        }
    }
    if quote.is_some() {
        return Err(ActionParseError::UnterminatedString(body.to_string()));
    }
    if depth != 0 {
        return Err(ActionParseError::UnbalancedParens(body.to_string()));
    }

    let Some(start) = group_start else {
        return Ok((body, Vec::new()));
    };
    let content = &body[..start];
    if !(content.is_empty() || content.ends_with(char::is_whitespace)) {
        return Ok((body, Vec::new()));
    }

    let inner = &body[start + 1..body.len() - 1];
    let mut attributes = Vec::new();
    for pair in split_outside(inner, ',')? {
        let pair = pair.trim();
        let (key, value) = pair.split_once(':').ok_or_else(|| ActionParseError::MalformedAttribute(pair.to_string()))?;
        let key = key.trim();
        let value = value.trim();
        if key.is_empty() || value.is_empty() {
            return Err(ActionParseError::MalformedAttribute(pair.to_string()));
        }
        let value = value.strip_prefix('"').and_then(|v| v.strip_suffix('"')).unwrap_or(value);
        attributes.push((key.to_string(), value.to_string()));
    }
    Ok((content.trim_end(), attributes))
}

/// Splits on `sep` outside quotes, brackets and parentheses.
fn split_outside(input: &str, sep: char) -> Result<Vec<&str>, ActionParseError> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut last = 0;
    for (i, c) in input.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') => quote = Some(c),
            (None, '(' | '[') => depth += 1,
            (None, ')' | ']') => {
                depth = depth.checked_sub(1).ok_or_else(|| ActionParseError::UnbalancedParens(input.to_string()))?;
            }
            (None, c) if c == sep && depth == 0 => {
                parts.push(&input[last..i]);
                last = i + c.len_utf8();
            }
            _ => {}
        }
    }
    if quote.is_some() {
        return Err(ActionParseError::UnterminatedString(input.to_string()));
    }
    if depth != 0 {
        return Err(ActionParseError::UnbalancedParens(input.to_string()));
    }
    parts.push(&input[last..]);
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_pause_and_recurse_components() {
        let action = Action::parse(r#"[t] "numerador"; [p] (pause:200); [n] children/*[1] (rate:0.8); [t] CSFordinalPosition"#)
            .unwrap();
        let directives = action.directives();
        assert_eq!(directives.len(), 4);
        assert_eq!(
            directives[0],
            ActionDirective::Text { source: TextSource::Literal("numerador".into()), personality: Personality::default() }
        );
        assert_eq!(directives[1], ActionDirective::Prosody(ProsodyMark::Pause(200)));
        match &directives[2] {
            ActionDirective::Recurse { selector, multi, personality, .. } => {
                assert_eq!(selector, "children/*[1]");
                assert!(!multi);
                assert_eq!(personality.rate, Some(0.8));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(action.custom_strings().collect::<Vec<_>>(), vec!["CSFordinalPosition"]);
    }

    #[test]
    fn semicolons_inside_quotes_do_not_split() {
        let action = Action::parse(r#"[t] "a; b"; [t] text()"#).unwrap();
        assert_eq!(action.directives().len(), 2);
        assert_eq!(
            action.directives()[1],
            ActionDirective::Text { source: TextSource::Query("text()".into()), personality: Personality::default() }
        );
    }

    #[test]
    fn multi_recurse_collects_context_and_separator_functions() {
        let action =
            Action::parse(r#"[m] children/* (ctxtFunc:CTFnodeCounter, context:"Row", sepFunc:CTFcontentIterator)"#).unwrap();
        match &action.directives()[0] {
            ActionDirective::Recurse { multi, options, .. } => {
                assert!(multi);
                assert_eq!(options.context.as_deref(), Some("Row"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(action.context_functions().collect::<Vec<_>>(), vec!["CTFnodeCounter", "CTFcontentIterator"]);
    }

    #[test]
    fn selector_parentheses_are_not_attributes() {
        let action = Action::parse("[n] children/*[position()=1]").unwrap();
        match &action.directives()[0] {
            ActionDirective::Recurse { selector, .. } => assert_eq!(selector, "children/*[position()=1]"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn malformed_components_are_rejected() {
        assert_eq!(Action::parse(""), Err(ActionParseError::Empty));
        assert!(matches!(Action::parse("numerator"), Err(ActionParseError::MissingTag(_))));
        assert!(matches!(Action::parse("[x] foo"), Err(ActionParseError::UnknownTag(_))));
        assert!(matches!(Action::parse(r#"[t] "open"#), Err(ActionParseError::UnterminatedString(_))));
        assert!(matches!(Action::parse("[p] (pause:soon)"), Err(ActionParseError::InvalidValue { .. })));
        assert!(matches!(Action::parse("[n] ./* (separator:\",\")"), Err(ActionParseError::UnsupportedAttribute { .. })));
        assert!(matches!(Action::parse("[n] children/*[1"), Err(ActionParseError::UnbalancedParens(_))));
    }

    #[test]
    fn display_round_trips_through_parse() {
        let spec = r#"[t] "Start"; [m] children/* (rate:0.5, context:"Row", sepFunc:CTFcontentIterator); [p] (pause:250)"#;
        let action = Action::parse(spec).unwrap();
        assert_eq!(Action::parse(&action.to_string()).unwrap(), action);
    }
}
