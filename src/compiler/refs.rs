//! Static template reference analysis.
//!
//! Finds the templates a source refers to without rendering it:
//!
//! ```text
//! {% extends "_base.html" %}            → _base.html
//! {% include "_nav.html" %}             → _nav.html
//! {% include ["_a.html", "_b.html"] %}  → _a.html, _b.html
//! {% import "_macros.html" as m %}      → _macros.html
//! {% from "_forms.html" import field %} → _forms.html
//! {% include template_var %}            → (dynamic, not a dependency)
//! ```
//!
//! Comments and `{% raw %}` blocks are skipped.

use regex::Regex;
use rustc_hash::FxHashSet;
use std::sync::LazyLock;
use thiserror::Error;

/// Tags whose argument names another template.
const REFERENCE_TAGS: &[&str] = &["extends", "include", "import", "from"];

static RAW_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{%[-+]?\s*endraw\s*[-+]?%\}").expect("valid regex"));

/// A template source whose references cannot be determined.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RefError {
    #[error("unclosed {kind} starting at line {line}")]
    Unclosed { kind: &'static str, line: usize },

    #[error("unterminated string in `{tag}` tag at line {line}")]
    UnterminatedString { tag: &'static str, line: usize },

    #[error("malformed `{tag}` tag at line {line}")]
    Malformed { tag: &'static str, line: usize },
}

/// Return the literal template names referenced by `source`, in order of
/// first appearance.
pub fn scan_references(source: &str) -> Result<Vec<String>, RefError> {
    let mut refs = Vec::new();
    let mut seen = FxHashSet::default();
    let mut pos = 0;

    while let Some(offset) = source[pos..].find('{') {
        let start = pos + offset;
        let rest = &source[start..];

        if rest.starts_with("{#") {
            let end = rest.find("#}").ok_or(RefError::Unclosed {
                kind: "comment",
                line: line_of(source, start),
            })?;
            pos = start + end + 2;
            continue;
        }

        // Expressions may hold `{#` or `{%` inside string literals
        if rest.starts_with("{{") {
            let end = expression_end(rest).ok_or(RefError::Unclosed {
                kind: "expression",
                line: line_of(source, start),
            })?;
            pos = start + end;
            continue;
        }

        if !rest.starts_with("{%") {
            pos = start + 1;
            continue;
        }

        let line = line_of(source, start);
        let end = rest.find("%}").ok_or(RefError::Unclosed { kind: "tag", line })?;
        pos = start + end + 2;

        let body = rest[2..end]
            .trim_start_matches(['-', '+'])
            .trim_end_matches(['-', '+'])
            .trim();
        let (keyword, args) = body
            .split_once(char::is_whitespace)
            .unwrap_or((body, ""));

        if keyword == "raw" {
            let close = RAW_END
                .find(&source[pos..])
                .ok_or(RefError::Unclosed { kind: "raw block", line })?;
            pos += close.end();
            continue;
        }

        let Some(tag) = REFERENCE_TAGS.iter().find(|t| **t == keyword) else {
            continue;
        };

        for name in parse_targets(tag, args.trim(), line)? {
            if seen.insert(name.clone()) {
                refs.push(name);
            }
        }
    }

    Ok(refs)
}

/// Parse the target of a reference tag: a string literal or a list of them.
fn parse_targets(tag: &'static str, args: &str, line: usize) -> Result<Vec<String>, RefError> {
    match args.chars().next() {
        Some('"' | '\'') => {
            let (name, _) = parse_literal(args).ok_or(RefError::UnterminatedString { tag, line })?;
            Ok(vec![name])
        }
        Some('[') => parse_list(tag, &args[1..], line),
        // Dynamic target, resolved only at render time
        _ => Ok(Vec::new()),
    }
}

/// Parse `"a", 'b', var]` (the opening bracket already consumed).
fn parse_list(tag: &'static str, mut rest: &str, line: usize) -> Result<Vec<String>, RefError> {
    let mut names = Vec::new();

    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ',');
        match rest.chars().next() {
            None => return Err(RefError::Malformed { tag, line }),
            Some(']') => return Ok(names),
            Some('"' | '\'') => {
                let (name, remaining) =
                    parse_literal(rest).ok_or(RefError::UnterminatedString { tag, line })?;
                names.push(name);
                rest = remaining;
            }
            Some(_) => {
                let skip = rest.find([',', ']']).ok_or(RefError::Malformed { tag, line })?;
                rest = &rest[skip..];
            }
        }
    }
}

/// Parse a quoted literal at the start of `s`, returning it and the remainder.
fn parse_literal(s: &str) -> Option<(String, &str)> {
    let mut chars = s.char_indices();
    let (_, quote) = chars.next()?;
    let mut value = String::new();
    let mut escaped = false;

    for (i, c) in chars {
        match c {
            _ if escaped => {
                value.push(c);
                escaped = false;
            }
            '\\' => escaped = true,
            c if c == quote => return Some((value, &s[i + c.len_utf8()..])),
            c => value.push(c),
        }
    }
    None
}

/// Byte offset just past the `}}` closing the expression at the start of `s`,
/// ignoring braces inside string literals.
fn expression_end(s: &str) -> Option<usize> {
    let mut quote = None;
    let mut escaped = false;
    let mut chars = s.char_indices().skip(2).peekable();

    while let Some((i, c)) = chars.next() {
        match (quote, c) {
            (Some(_), _) if escaped => escaped = false,
            (Some(_), '\\') => escaped = true,
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '}') if chars.peek().is_some_and(|(_, next)| *next == '}') => {
                return Some(i + 2);
            }
            (None, _) => {}
        }
    }
    None
}

fn line_of(source: &str, byte: usize) -> usize {
    source[..byte].matches('\n').count() + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extends_and_include() {
        let src = r#"{% extends "_base.html" %}
{% block body %}{% include '_nav.html' %}{% endblock %}"#;
        assert_eq!(scan_references(src).unwrap(), vec!["_base.html", "_nav.html"]);
    }

    #[test]
    fn test_whitespace_control_markers() {
        let src = r#"{%- include "_a.html" -%}{%+ extends "_b.html" +%}"#;
        assert_eq!(scan_references(src).unwrap(), vec!["_a.html", "_b.html"]);
    }

    #[test]
    fn test_import_and_from() {
        let src = r#"{% import "_macros.html" as m %}{% from "_forms.html" import field, label %}"#;
        assert_eq!(scan_references(src).unwrap(), vec!["_macros.html", "_forms.html"]);
    }

    #[test]
    fn test_include_list_skips_dynamic_items() {
        let src = r#"{% include ["_a.html", custom, '_b.html'] ignore missing %}"#;
        assert_eq!(scan_references(src).unwrap(), vec!["_a.html", "_b.html"]);
    }

    #[test]
    fn test_dynamic_targets_are_not_dependencies() {
        let src = r#"{% extends layout %}{% include "_x" ~ suffix %}"#;
        // The concatenation still names "_x" literally; the bare variable does not
        assert_eq!(scan_references(src).unwrap(), vec!["_x"]);
    }

    #[test]
    fn test_duplicates_reported_once() {
        let src = r#"{% include "_a.html" %}{% include "_a.html" %}"#;
        assert_eq!(scan_references(src).unwrap(), vec!["_a.html"]);
    }

    #[test]
    fn test_comments_and_raw_blocks_skipped() {
        let src = r#"{# {% include "_commented.html" %} #}
{% raw %}{% include "_raw.html" %}{% endraw %}
{% include "_real.html" %}"#;
        assert_eq!(scan_references(src).unwrap(), vec!["_real.html"]);
    }

    #[test]
    fn test_escaped_quote_in_literal() {
        let src = r#"{% include "we\"ird.html" %}"#;
        assert_eq!(scan_references(src).unwrap(), vec![r#"we"ird.html"#]);
    }

    #[test]
    fn test_plain_text_and_expressions_ignored() {
        let src = "<p>{{ title }}</p> { not a tag } {% if x %}{% endif %}";
        assert!(scan_references(src).unwrap().is_empty());
    }

    #[test]
    fn test_braces_inside_expression_strings() {
        let src = r#"{% extends "_base.html" %}{{ "{#" }}{{ '{% include "_fake.html" %}' }}{% include "_nav.html" %}"#;
        assert_eq!(scan_references(src).unwrap(), vec!["_base.html", "_nav.html"]);
    }

    #[test]
    fn test_expression_with_escaped_quote_and_map() {
        let src = r#"{{ {"a": "\"}}"}["a"] }}{% include "_a.html" %}"#;
        assert_eq!(scan_references(src).unwrap(), vec!["_a.html"]);
    }

    #[test]
    fn test_unclosed_expression() {
        assert_eq!(
            scan_references("{{ \"}}\""),
            Err(RefError::Unclosed { kind: "expression", line: 1 })
        );
    }

    #[test]
    fn test_unclosed_tag() {
        let src = "line one\n{% include \"_a.html\"";
        assert_eq!(
            scan_references(src),
            Err(RefError::Unclosed { kind: "tag", line: 2 })
        );
    }

    #[test]
    fn test_unterminated_string() {
        let src = r#"{% include "_a.html %}"#;
        assert_eq!(
            scan_references(src),
            Err(RefError::UnterminatedString { tag: "include", line: 1 })
        );
    }

    #[test]
    fn test_unclosed_list() {
        let src = r#"{% include ["_a.html" %}"#;
        assert_eq!(
            scan_references(src),
            Err(RefError::Malformed { tag: "include", line: 1 })
        );
    }

    #[test]
    fn test_unclosed_comment_and_raw() {
        assert!(matches!(
            scan_references("{# never closed"),
            Err(RefError::Unclosed { kind: "comment", .. })
        ));
        assert!(matches!(
            scan_references("{% raw %} forever"),
            Err(RefError::Unclosed { kind: "raw block", .. })
        ));
    }
}
