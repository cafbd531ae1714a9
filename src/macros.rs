#[macro_export]
macro_rules! regex {
    ($pat:literal) => {{
        static RE: once_cell::sync::Lazy<regex::Regex> =
            once_cell::sync::Lazy::new(|| regex::Regex::new($pat).unwrap());
        &*RE
    }};
}

/// Defines one speech rule on a `RuleStore`, propagating load failures with `?`.
///
/// A malformed definition is logged and skipped by `define_rule` itself, so
/// only registry and store errors leave the enclosing initializer.
#[macro_export]
macro_rules! speech_rule {
    (
        $store:expr,
        name: $name:expr,
        dynamic: $dynamic:expr,
        action: $action:expr,
        query: $query:expr
        $(, constraints: [ $($cstr:expr),* $(,)? ])?
        $(,)?
    ) => {
        $store.define_rule($name, $dynamic, &$action, $query, &[ $($($cstr),*)? ])?
    };
}
