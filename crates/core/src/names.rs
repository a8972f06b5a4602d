//! Variable name sets and the filters applied before dependency tracking.

use std::collections::BTreeSet;

/// An ordered, deduplicated set of variable names.
pub type NameSet = BTreeSet<String>;

/// Builtin names (`@def`, `@true`, ...) are never tracked as dependencies.
pub fn is_builtin(name: &str) -> bool {
    name.starts_with('@')
}

/// Positional argument placeholders (`$0`, `$1`, ...) are never tracked either.
pub fn is_argument(name: &str) -> bool {
    name.starts_with('$')
}

/// Whether a name participates in dataflow analysis.
pub fn is_tracked(name: &str) -> bool {
    !name.is_empty() && !is_builtin(name) && !is_argument(name)
}

/// Iterate over the tracked names of a set.
pub fn tracked<'a>(names: &'a NameSet) -> impl Iterator<Item = &'a str> + 'a {
    names.iter().map(String::as_str).filter(|n| is_tracked(n))
}

/// Build a name set from anything yielding string-ish items.
pub fn name_set<I, S>(names: I) -> NameSet
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    names.into_iter().map(Into::into).collect()
}
