//! Class-usage analysis for CSS purging.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use super::transform::{collect_class_symbols, parse};
use crate::error::CssError;

static CLASS_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\sclass\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>"']+))"#).unwrap()
});

static CLASS_SELECTOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\.(-?(?:[_a-zA-Z]|[^\x00-\x7F]|\\.)(?:[\w-]|[^\x00-\x7F]|\\.)*)").unwrap()
});

/// Class tokens used in rendered HTML.
#[must_use]
pub fn html_classes(html: &str) -> BTreeSet<String> {
    CLASS_ATTR_RE
        .captures_iter(html)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)))
        .flat_map(|value| value.as_str().split_whitespace())
        .map(str::to_owned)
        .collect()
}

/// Class symbols that appear in the selectors of `css`.
pub fn css_class_symbols(css: &str) -> Result<BTreeSet<String>, CssError> {
    let nodes = parse(css)?;
    let mut symbols = BTreeSet::new();
    collect_class_symbols(&nodes, &mut symbols);
    Ok(symbols)
}

/// Blank out quoted strings so attribute values cannot look like classes.
fn strip_strings(selector: &str) -> String {
    let mut out = String::with_capacity(selector.len());
    let mut quote: Option<char> = None;
    let mut chars = selector.chars();
    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                if c == '\\' {
                    chars.next();
                } else if c == q {
                    out.push(c);
                    quote = None;
                }
            }
            None => {
                if c == '"' || c == '\'' {
                    quote = Some(c);
                }
                out.push(c);
                if c == '\\'
                    && let Some(escaped) = chars.next()
                {
                    out.push(escaped);
                }
            }
        }
    }
    out
}

fn unescape(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len());
    let mut chars = ident.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn class_names(selector: &str) -> Vec<String> {
    CLASS_SELECTOR_RE
        .captures_iter(selector)
        .map(|caps| unescape(&caps[1]))
        .collect()
}

/// Unescaped class names referenced by one selector.
pub(crate) fn selector_classes(selector: &str) -> Vec<String> {
    class_names(&strip_strings(selector))
}

/// Class names a selector cannot match without.
///
/// Arguments of functional pseudo-classes (`:not()`, `:is()`, `:where()`,
/// `:has()`, `:nth-child(... of ...)`) are skipped: a class missing from the
/// page there can still leave the selector matching.
pub(crate) fn required_classes(selector: &str) -> Vec<String> {
    let stripped = strip_strings(selector);
    let mut outer = String::with_capacity(stripped.len());
    let mut depth = 0usize;
    let mut chars = stripped.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let escaped = chars.next();
                if depth == 0 {
                    outer.push(c);
                    outer.extend(escaped);
                }
            }
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => outer.push(c),
            _ => {}
        }
    }
    class_names(&outer)
}

/// `a` and `b` are equal or one is a dash-separated prefix of the other.
fn has_affinity(a: &str, b: &str) -> bool {
    a == b
        || a.strip_prefix(b).is_some_and(|rest| rest.starts_with('-'))
        || b.strip_prefix(a).is_some_and(|rest| rest.starts_with('-'))
}

/// The CSS symbols kept by `keep` under prefix affinity.
#[must_use]
pub fn expand_keep_set(symbols: &BTreeSet<String>, keep: &BTreeSet<String>) -> BTreeSet<String> {
    symbols
        .iter()
        .filter(|symbol| keep.iter().any(|token| has_affinity(symbol, token)))
        .cloned()
        .collect()
}

/// CSS symbols eligible for removal.
#[must_use]
pub fn unused_symbols(symbols: &BTreeSet<String>, keep: &BTreeSet<String>) -> BTreeSet<String> {
    let kept = expand_keep_set(symbols, keep);
    symbols.difference(&kept).cloned().collect()
}
