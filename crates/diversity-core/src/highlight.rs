//! Interval highlighting to HTML
//!
//! Spans may nest, overlap or cross. Output stays well formed: when a span
//! ends while spans opened after it are still open, those are closed and
//! reopened around the boundary.

use std::collections::BTreeSet;
use std::fmt::Write;

/// A byte range of the text to wrap in a `<span>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightSpan {
    pub start: usize,
    pub end: usize,
    /// Written to `data-pattern`
    pub label: String,
    pub class: String,
    pub attributes: Vec<(String, String)>,
    /// Raw markup placed right after the first opening tag
    pub badge: Option<String>,
}

impl HighlightSpan {
    pub fn new(start: usize, end: usize, label: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            start,
            end,
            label: label.into(),
            class: class.into(),
            attributes: Vec::new(),
            badge: None,
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn with_badge(mut self, html: impl Into<String>) -> Self {
        self.badge = Some(html.into());
        self
    }

    fn open_tag(&self, out: &mut String) {
        let _ = write!(
            out,
            "<span class=\"{}\" data-pattern=\"{}\"",
            escape_html(&self.class),
            escape_html(&self.label)
        );
        for (name, value) in &self.attributes {
            let _ = write!(out, " {}=\"{}\"", name, escape_html(value));
        }
        out.push('>');
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn floor_boundary(text: &str, mut i: usize) -> usize {
    i = i.min(text.len());
    while !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_boundary(text: &str, mut i: usize) -> usize {
    i = i.min(text.len());
    while !text.is_char_boundary(i) {
        i += 1;
    }
    i
}

/// Render `text` as escaped HTML with every span wrapped.
///
/// Spans are clamped to the text and snapped outward to character
/// boundaries; empty spans are dropped. For equal starts the longer span is
/// the outer one.
pub fn render_highlights(text: &str, spans: &[HighlightSpan]) -> String {
    let mut ordered: Vec<(usize, usize, &HighlightSpan)> = spans
        .iter()
        .map(|s| (floor_boundary(text, s.start), ceil_boundary(text, s.end), s))
        .filter(|(start, end, _)| start < end)
        .collect();

    if ordered.is_empty() {
        return escape_html(text);
    }

    // outer spans first; sort is stable so input order breaks ties
    ordered.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

    let boundaries: BTreeSet<usize> = ordered.iter().flat_map(|(s, e, _)| [*s, *e]).collect();

    let mut out = String::with_capacity(text.len() * 2);
    let mut open: Vec<usize> = Vec::new();
    let mut badge_shown = vec![false; ordered.len()];
    let mut last = 0;

    for pos in boundaries {
        out.push_str(&escape_html(&text[last..pos]));
        last = pos;

        if let Some(lowest) = open.iter().position(|&i| ordered[i].1 == pos) {
            let popped: Vec<usize> = open.drain(lowest..).collect();
            for _ in &popped {
                out.push_str("</span>");
            }
            for i in popped.into_iter().filter(|&i| ordered[i].1 != pos) {
                ordered[i].2.open_tag(&mut out);
                open.push(i);
            }
        }

        for (i, (start, _, span)) in ordered.iter().enumerate() {
            if *start == pos {
                span.open_tag(&mut out);
                if let Some(badge) = span.badge.as_deref().filter(|_| !badge_shown[i]) {
                    out.push_str(badge);
                    badge_shown[i] = true;
                }
                open.push(i);
            }
        }
    }

    out.push_str(&escape_html(&text[last..]));
    for _ in &open {
        out.push_str("</span>");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn span(start: usize, end: usize, label: &str) -> HighlightSpan {
        HighlightSpan::new(start, end, label, "hl")
    }

    #[test]
    fn test_nested_span() {
        let html = render_highlights("0123456789", &[span(0, 10, "A"), span(5, 8, "B")]);
        assert_eq!(
            html,
            concat!(
                r#"<span class="hl" data-pattern="A">01234"#,
                r#"<span class="hl" data-pattern="B">567</span>"#,
                "89</span>"
            )
        );
    }

    #[test]
    fn test_crossing_spans_reopen() {
        let html = render_highlights("abcdefghi", &[span(0, 6, "A"), span(3, 9, "B")]);
        assert_eq!(
            html,
            concat!(
                r#"<span class="hl" data-pattern="A">abc"#,
                r#"<span class="hl" data-pattern="B">def</span></span>"#,
                r#"<span class="hl" data-pattern="B">ghi</span>"#
            )
        );
    }

    #[test]
    fn test_escapes_text_and_attributes() {
        let html = render_highlights("a<b>&c", &[span(1, 4, "x\"y")]);
        assert_eq!(
            html,
            r#"a<span class="hl" data-pattern="x&quot;y">&lt;b&gt;</span>&amp;c"#
        );
    }

    #[test]
    fn test_drops_empty_and_clamps() {
        assert_eq!(render_highlights("abc", &[span(2, 2, "A")]), "abc");
        assert_eq!(
            render_highlights("abc", &[span(1, 99, "A")]),
            r#"a<span class="hl" data-pattern="A">bc</span>"#
        );
    }

    #[test]
    fn test_snaps_to_char_boundaries() {
        // 'é' is two bytes at 1..3
        let html = render_highlights("x\u{e9}y", &[span(2, 3, "A")]);
        assert_eq!(html, "x<span class=\"hl\" data-pattern=\"A\">\u{e9}</span>y");
    }

    #[test]
    fn test_badge_only_on_first_open() {
        let a = span(0, 6, "A");
        let b = span(3, 9, "B").with_badge("<i></i>");
        let html = render_highlights("abcdefghi", &[a, b]);
        assert_eq!(html.matches("<i></i>").count(), 1);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn strip_and_check(html: &str) -> Option<String> {
            let mut depth: i64 = 0;
            let mut text = String::new();
            let mut rest = html;
            while !rest.is_empty() {
                if let Some(r) = rest.strip_prefix("</span>") {
                    depth -= 1;
                    if depth < 0 {
                        return None;
                    }
                    rest = r;
                } else if rest.starts_with("<span") {
                    let close = rest.find('>')?;
                    depth += 1;
                    rest = &rest[close + 1..];
                } else {
                    let c = rest.chars().next()?;
                    text.push(c);
                    rest = &rest[c.len_utf8()..];
                }
            }
            (depth == 0).then_some(text)
        }

        fn unescape(s: &str) -> String {
            s.replace("&lt;", "<")
                .replace("&gt;", ">")
                .replace("&quot;", "\"")
                .replace("&#39;", "'")
                .replace("&amp;", "&")
        }

        proptest! {
            #[test]
            fn output_is_balanced_and_preserves_text(
                text in "[a-z <&é]{0,40}",
                raw in proptest::collection::vec((0usize..50, 0usize..50), 0..8),
            ) {
                let spans: Vec<HighlightSpan> = raw
                    .iter()
                    .enumerate()
                    .map(|(i, (a, b))| span(*a.min(b), *a.max(b), &format!("p{}", i)))
                    .collect();
                let html = render_highlights(&text, &spans);
                let stripped = strip_and_check(&html);
                prop_assert!(stripped.is_some(), "unbalanced: {}", html);
                prop_assert_eq!(unescape(&stripped.unwrap()), text);
            }
        }
    }
}
