//! Native CSS transformer.
//!
//! Two passes:
//!
//! 1. A structural pass (only when there are unused symbols) parses the
//!    stylesheet into rules, group at-rules (`@media`, `@supports`,
//!    `@layer`, ...) and opaque chunks, drops selectors that reference an
//!    unused class and re-serializes what is left.
//! 2. A lexical minifier that strips comments and collapses whitespace while
//!    leaving strings and escapes untouched.

use std::collections::BTreeSet;

use super::purge::{required_classes, selector_classes};
use super::{CssTransformer, TransformOptions};
use crate::error::CssError;

/// At-rules whose block holds rules and is purged recursively.
const GROUP_RULES: &[&str] = &[
    "media",
    "supports",
    "layer",
    "container",
    "document",
    "scope",
    "starting-style",
];

fn at_rule_name(prelude: &str) -> Option<String> {
    let rest = prelude.trim_start().strip_prefix('@')?;
    Some(
        rest.chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
            .collect::<String>()
            .to_ascii_lowercase(),
    )
}

fn is_group_rule(prelude: &str) -> bool {
    at_rule_name(prelude).is_some_and(|name| GROUP_RULES.contains(&name.as_str()))
}

/// Whether the block opened after `prelude` contains rules rather than declarations.
fn opens_rule_list(prelude: &str) -> bool {
    at_rule_name(prelude)
        .is_some_and(|name| GROUP_RULES.contains(&name.as_str()) || name.ends_with("keyframes"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Node<'a> {
    Rule { selector: &'a str, body: &'a str },
    Group { prelude: &'a str, children: Vec<Node<'a>> },
    /// Statements and at-rule blocks that are kept verbatim.
    Raw(&'a str),
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn bytes(&self) -> &'a [u8] {
        self.src.as_bytes()
    }

    fn skip_string(&self, start: usize) -> Result<usize, CssError> {
        let bytes = self.bytes();
        let quote = bytes[start];
        let mut i = start + 1;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' => i += 2,
                b if b == quote => return Ok(i + 1),
                _ => i += 1,
            }
        }
        Err(CssError::Unterminated {
            what: "string",
            at: start,
        })
    }

    fn skip_comment(&self, start: usize) -> Result<usize, CssError> {
        self.src[start + 2..]
            .find("*/")
            .map(|offset| start + 2 + offset + 2)
            .ok_or(CssError::Unterminated {
                what: "comment",
                at: start,
            })
    }

    fn is_comment_start(&self, i: usize) -> bool {
        self.bytes().get(i) == Some(&b'/') && self.bytes().get(i + 1) == Some(&b'*')
    }

    fn skip_trivia(&mut self) -> Result<(), CssError> {
        loop {
            while self
                .bytes()
                .get(self.pos)
                .is_some_and(u8::is_ascii_whitespace)
            {
                self.pos += 1;
            }
            if self.is_comment_start(self.pos) {
                self.pos = self.skip_comment(self.pos)?;
            } else {
                return Ok(());
            }
        }
    }

    /// Find the next `{`, `;` or `}` outside strings, comments and parentheses.
    fn scan_prelude(&self, from: usize) -> Result<Option<(usize, u8)>, CssError> {
        let bytes = self.bytes();
        let mut i = from;
        let mut parens = 0usize;
        while i < bytes.len() {
            match bytes[i] {
                b'"' | b'\'' => {
                    i = self.skip_string(i)?;
                    continue;
                }
                b'/' if self.is_comment_start(i) => {
                    i = self.skip_comment(i)?;
                    continue;
                }
                b'\\' => {
                    i += 2;
                    continue;
                }
                b'(' => parens += 1,
                b')' => parens = parens.saturating_sub(1),
                b @ (b'{' | b';' | b'}') if parens == 0 => return Ok(Some((i, b))),
                _ => {}
            }
            i += 1;
        }
        Ok(None)
    }

    fn matching_close(&self, open: usize) -> Result<usize, CssError> {
        let bytes = self.bytes();
        let mut depth = 0usize;
        let mut i = open;
        while i < bytes.len() {
            match bytes[i] {
                b'"' | b'\'' => {
                    i = self.skip_string(i)?;
                    continue;
                }
                b'/' if self.is_comment_start(i) => {
                    i = self.skip_comment(i)?;
                    continue;
                }
                b'\\' => {
                    i += 2;
                    continue;
                }
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(i);
                    }
                }
                _ => {}
            }
            i += 1;
        }
        Err(CssError::Unclosed(open))
    }

    fn parse_list(&mut self, open: Option<usize>) -> Result<Vec<Node<'a>>, CssError> {
        let src = self.src;
        let mut nodes = Vec::new();
        loop {
            self.skip_trivia()?;
            if self.pos >= src.len() {
                return match open {
                    Some(at) => Err(CssError::Unclosed(at)),
                    None => Ok(nodes),
                };
            }

            let start = self.pos;
            match self.scan_prelude(start)? {
                None => {
                    nodes.push(Node::Raw(src[start..].trim()));
                    self.pos = src.len();
                }
                Some((i, b'}')) => {
                    if open.is_none() {
                        return Err(CssError::UnexpectedClose(i));
                    }
                    let text = src[start..i].trim();
                    if !text.is_empty() {
                        nodes.push(Node::Raw(text));
                    }
                    self.pos = i + 1;
                    return Ok(nodes);
                }
                Some((i, b';')) => {
                    nodes.push(Node::Raw(src[start..=i].trim()));
                    self.pos = i + 1;
                }
                Some((i, _)) => {
                    let prelude = src[start..i].trim();
                    if is_group_rule(prelude) {
                        self.pos = i + 1;
                        let children = self.parse_list(Some(i))?;
                        nodes.push(Node::Group { prelude, children });
                    } else {
                        let close = self.matching_close(i)?;
                        if prelude.starts_with('@') {
                            nodes.push(Node::Raw(src[start..=close].trim()));
                        } else {
                            nodes.push(Node::Rule {
                                selector: prelude,
                                body: &src[i + 1..close],
                            });
                        }
                        self.pos = close + 1;
                    }
                }
            }
        }
    }
}

pub(crate) fn parse(css: &str) -> Result<Vec<Node<'_>>, CssError> {
    Parser { src: css, pos: 0 }.parse_list(None)
}

/// Every class referenced by a rule selector, descending into group rules.
pub(crate) fn collect_class_symbols(nodes: &[Node<'_>], symbols: &mut BTreeSet<String>) {
    for node in nodes {
        match node {
            Node::Rule { selector, .. } => symbols.extend(selector_classes(selector)),
            Node::Group { children, .. } => collect_class_symbols(children, symbols),
            Node::Raw(_) => {}
        }
    }
}

/// Split a selector list on top-level commas.
fn split_selector_list(selector: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in selector.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, c) {
            (_, '\\') => escaped = true,
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(' | '[') => depth += 1,
            (None, ')' | ']') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                parts.push(selector[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(selector[start..].trim());
    parts.retain(|part| !part.is_empty());
    parts
}

fn render_purged(nodes: &[Node<'_>], unused: &BTreeSet<String>) -> Vec<String> {
    let mut out = Vec::new();
    for node in nodes {
        match node {
            Node::Rule { selector, body } => {
                let kept: Vec<&str> = split_selector_list(selector)
                    .into_iter()
                    .filter(|sel| !required_classes(sel).iter().any(|c| unused.contains(c)))
                    .collect();
                if !kept.is_empty() {
                    out.push(format!("{} {{{body}}}", kept.join(", ")));
                }
            }
            Node::Group { prelude, children } => {
                let inner = render_purged(children, unused);
                if !inner.is_empty() {
                    out.push(format!("{prelude} {{\n{}\n}}", inner.join("\n")));
                }
            }
            Node::Raw(text) => out.push((*text).to_owned()),
        }
    }
    out
}

/// Remove rules whose selectors only reference unused classes.
pub(crate) fn purge(css: &str, unused: &BTreeSet<String>) -> Result<String, CssError> {
    let nodes = parse(css)?;
    Ok(render_purged(&nodes, unused).join("\n"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    /// Selectors and at-rule preludes.
    Prelude,
    /// Declaration blocks.
    Body,
}

/// Characters that never need surrounding whitespace in `ctx`.
fn is_tight(c: char, ctx: Context) -> bool {
    match ctx {
        Context::Prelude => matches!(c, ',' | '>' | '+' | '~' | '{' | '}' | ';'),
        Context::Body => matches!(c, '{' | '}' | ';' | ':' | ','),
    }
}

pub(crate) fn minify(css: &str) -> Result<String, CssError> {
    let mut out = String::with_capacity(css.len());
    let mut stack: Vec<Context> = Vec::new();
    let mut prelude_start = 0usize;
    let mut pending_space = false;
    let mut chars = css.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let ctx = stack.last().copied().unwrap_or(Context::Prelude);

        if c == '/' && css[i..].starts_with("/*") {
            let end = css[i + 2..]
                .find("*/")
                .map(|offset| i + 2 + offset + 2)
                .ok_or(CssError::Unterminated {
                    what: "comment",
                    at: i,
                })?;
            while chars.peek().is_some_and(|(j, _)| *j < end) {
                chars.next();
            }
            pending_space = true;
            continue;
        }
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }

        if pending_space
            && let Some(last) = out.chars().next_back()
            && !is_tight(last, ctx)
            && !is_tight(c, ctx)
        {
            out.push(' ');
        }
        pending_space = false;

        match c {
            '"' | '\'' => {
                out.push(c);
                loop {
                    match chars.next() {
                        Some((_, '\\')) => {
                            out.push('\\');
                            if let Some((_, escaped)) = chars.next() {
                                out.push(escaped);
                            }
                        }
                        Some((_, q)) if q == c => {
                            out.push(q);
                            break;
                        }
                        Some((_, other)) => out.push(other),
                        None => {
                            return Err(CssError::Unterminated {
                                what: "string",
                                at: i,
                            });
                        }
                    }
                }
            }
            '\\' => {
                out.push('\\');
                if let Some((_, escaped)) = chars.next() {
                    out.push(escaped);
                }
            }
            '{' => {
                let next = if ctx == Context::Prelude && opens_rule_list(&out[prelude_start..]) {
                    Context::Prelude
                } else {
                    Context::Body
                };
                out.push('{');
                stack.push(next);
                prelude_start = out.len();
            }
            '}' => {
                if out.ends_with(';') {
                    out.pop();
                }
                out.push('}');
                stack.pop();
                prelude_start = out.len();
            }
            ';' => {
                out.push(';');
                if ctx == Context::Prelude {
                    prelude_start = out.len();
                }
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}

/// Dependency-free transformer used by default.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeCss;

impl CssTransformer for NativeCss {
    fn transform(&self, css: &str, options: &TransformOptions) -> Result<String, CssError> {
        let mut output = if options.unused_symbols.is_empty() {
            css.to_owned()
        } else {
            purge(css, &options.unused_symbols)?
        };
        if options.minify {
            output = minify(&output)?;
        }
        Ok(output)
    }
}
