//! Interpolation scanning for `${...}` sites inside render templates.
//!
//! Matching counts literal braces only; a string literal holding an unbalanced
//! brace inside an interpolation will be mis-split.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref PLACEHOLDER_RE: Regex = Regex::new(r"__HENE_EXPR_(\d+)__").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'s> {
    Static(&'s str),
    /// `raw` is the full `${...}` span, `expression` its inner text.
    Dynamic { raw: &'s str, expression: &'s str },
}

impl<'s> Segment<'s> {
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Segment::Dynamic { .. })
    }
}

/// Byte index just past the `}` closing the interpolation whose body starts at `start`.
fn find_closing_brace(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 1usize;
    for (offset, byte) in bytes[start..].iter().enumerate() {
        match byte {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + offset + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split `text` into static and dynamic segments. An unterminated `${` is kept as static text.
/// Adjacent static runs are merged and empty ones dropped.
pub fn scan(text: &str) -> Vec<Segment<'_>> {
    let bytes = text.as_bytes();
    let mut segments = Vec::new();
    let mut static_start = 0;
    let mut i = 0;

    while i + 1 < bytes.len() {
        if bytes[i] == b'$' && bytes[i + 1] == b'{' {
            if let Some(end) = find_closing_brace(bytes, i + 2) {
                if static_start < i {
                    segments.push(Segment::Static(&text[static_start..i]));
                }
                segments.push(Segment::Dynamic {
                    raw: &text[i..end],
                    expression: &text[i + 2..end - 1],
                });
                i = end;
                static_start = end;
                continue;
            }
            break;
        }
        i += 1;
    }
    if static_start < text.len() {
        segments.push(Segment::Static(&text[static_start..]));
    }
    segments
}

/// True when `text` still contains a placeholder token. html5ever lowercases
/// attribute names, so the match ignores case.
pub fn holds_placeholder(text: &str) -> bool {
    PLACEHOLDER_RE.is_match(&text.to_ascii_uppercase())
}

/// Replace every interpolation with an opaque token the HTML tokenizer leaves alone.
pub fn protect(html: &str) -> (String, Vec<String>) {
    let mut protected = String::with_capacity(html.len());
    let mut originals = Vec::new();
    for segment in scan(html) {
        match segment {
            Segment::Static(text) => protected.push_str(text),
            Segment::Dynamic { raw, .. } => {
                protected.push_str(&format!("__HENE_EXPR_{}__", originals.len()));
                originals.push(raw.to_string());
            }
        }
    }
    (protected, originals)
}

/// Inverse of [`protect`]. Unknown tokens are left as they are.
pub fn restore(text: &str, originals: &[String]) -> String {
    if !text.contains("__HENE_EXPR_") {
        return text.to_string();
    }
    PLACEHOLDER_RE
        .replace_all(text, |caps: &regex::Captures| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|i| originals.get(i))
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

// ═══════════════════════════════════════════════════════════════════════════════
// JS LITERAL EMISSION
// ═══════════════════════════════════════════════════════════════════════════════

/// Double-quoted JS string literal.
pub fn string_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Literal standing in for an interpolation that failed to parse.
pub fn parse_error_placeholder(expression: &str) -> String {
    string_literal(&format!(
        "/* HENE_PARSE_ERROR: {} */",
        expression.trim().replace("*/", "* /")
    ))
}

fn escape_template_chunk(s: &str) -> String {
    s.replace('\\', "\\\\").replace('`', "\\`").replace("${", "\\${")
}

/// JS expression text for an attribute value: a plain string literal when there is nothing
/// to interpolate, otherwise a template literal. `resolve` maps each interpolation body to
/// the expression text to embed.
pub fn value_expression<F>(raw: &str, mut resolve: F) -> String
where
    F: FnMut(&str) -> String,
{
    let segments = scan(raw);
    if !segments.iter().any(Segment::is_dynamic) {
        return string_literal(raw);
    }
    let mut out = String::from("`");
    for segment in segments {
        match segment {
            Segment::Static(text) => out.push_str(&escape_template_chunk(text)),
            Segment::Dynamic { expression, .. } => {
                out.push_str("${");
                out.push_str(&resolve(expression));
                out.push('}');
            }
        }
    }
    out.push('`');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_nested_braces() {
        let segs = scan("Total: ${items.map(i => { return i.n; }).length} left");
        assert_eq!(segs.len(), 3);
        assert_eq!(segs[0], Segment::Static("Total: "));
        assert_eq!(
            segs[1],
            Segment::Dynamic {
                raw: "${items.map(i => { return i.n; }).length}",
                expression: "items.map(i => { return i.n; }).length",
            }
        );
        assert_eq!(segs[2], Segment::Static(" left"));
    }

    #[test]
    fn test_scan_unterminated_is_static() {
        let segs = scan("a ${b");
        assert_eq!(segs, vec![Segment::Static("a ${b")]);
        assert!(scan("price: $5 {x}").iter().all(|s| !s.is_dynamic()));
    }

    #[test]
    fn test_scan_adjacent_dynamics() {
        let segs = scan("${a}${b}");
        assert_eq!(segs.len(), 2);
        assert!(segs.iter().all(Segment::is_dynamic));
    }

    #[test]
    fn test_protect_restore() {
        let html = r#"<p class="${this.cls()}">${ {a: 1}.a }</p>"#;
        let (protected, originals) = protect(html);
        assert_eq!(protected, r#"<p class="__HENE_EXPR_0__">__HENE_EXPR_1__</p>"#);
        assert_eq!(originals.len(), 2);
        assert_eq!(restore(&protected, &originals), html);
        assert_eq!(restore("__HENE_EXPR_9__", &originals), "__HENE_EXPR_9__");
    }

    #[test]
    fn test_string_literal_escapes() {
        assert_eq!(string_literal("say \"hi\"\n"), r#""say \"hi\"\n""#);
        assert_eq!(string_literal("a\\b"), r#""a\\b""#);
    }

    #[test]
    fn test_value_expression() {
        assert_eq!(value_expression("plain", |e| e.to_string()), "\"plain\"");
        assert_eq!(
            value_expression("btn ${this.kind()} `x`", |e| e.trim().to_string()),
            "`btn ${this.kind()} \\`x\\``"
        );
    }

    #[test]
    fn test_parse_error_placeholder_cannot_close_comment() {
        let lit = parse_error_placeholder("a */ b");
        assert_eq!(lit, "\"/* HENE_PARSE_ERROR: a * / b */\"");
    }
}
