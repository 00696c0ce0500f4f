//! Content renderer: raw answer text to safe, clickable markup.
//!
//! Text is first classified into [`Segment`]s and only then serialized, so
//! escaping applies to everything that is not a recognized link or `**strong**`
//! span. Callers insert the output as live markup; this module is the only
//! place that neutralizes it.

use regex::Regex;
use std::sync::OnceLock;

const STRONG_MARKER: &str = "**";

/// URL-like runs. The last character may not be sentence punctuation, so
/// "see http://example.com." keeps its full stop outside the link. Only the
/// scheme is case-insensitive, and ASCII-only, so no Unicode case folding lets
/// a non-ASCII letter into a URL.
fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\b(?i-u:https?|ftp|file)://[-A-Za-z0-9+&@#/%?=~_|!:,.;]*[-A-Za-z0-9+&@#/%?=~_|]")
            .expect("URL pattern is valid")
    })
}

/// A classified run of input text. Slices borrow from the input unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Plain(&'a str),
    Link(&'a str),
    /// Text between a pair of `**` markers. Children are only `Plain` or `Link`.
    Strong(Vec<Segment<'a>>),
}

/// Split `text` into plain, link and strong runs, left to right.
///
/// Strong spans are paired first; URLs cannot contain `*`, so no link ever
/// straddles a marker. An unterminated `**`, or an empty `****`, is plain text.
pub fn segments(text: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut plain_from = 0;
    let mut cursor = 0;

    while let Some(open) = text[cursor..].find(STRONG_MARKER).map(|i| cursor + i) {
        let inner_start = open + STRONG_MARKER.len();
        let Some(close) = text[inner_start..]
            .find(STRONG_MARKER)
            .map(|i| inner_start + i)
        else {
            break;
        };

        if close == inner_start {
            cursor = close + STRONG_MARKER.len();
            continue;
        }

        linkify(&text[plain_from..open], &mut out);
        let mut inner = Vec::new();
        linkify(&text[inner_start..close], &mut inner);
        out.push(Segment::Strong(inner));

        cursor = close + STRONG_MARKER.len();
        plain_from = cursor;
    }

    linkify(&text[plain_from..], &mut out);
    out
}

fn linkify<'a>(text: &'a str, out: &mut Vec<Segment<'a>>) {
    let mut last = 0;
    for found in url_pattern().find_iter(text) {
        if found.start() > last {
            out.push(Segment::Plain(&text[last..found.start()]));
        }
        out.push(Segment::Link(found.as_str()));
        last = found.end();
    }
    if last < text.len() {
        out.push(Segment::Plain(&text[last..]));
    }
}

/// Render `text` as HTML markup. Pure and deterministic.
pub fn render(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    write_segments(&segments(text), &mut out);
    out
}

fn write_segments(segments: &[Segment<'_>], out: &mut String) {
    for segment in segments {
        match segment {
            Segment::Plain(text) => push_escaped(text, out),
            Segment::Link(url) => {
                // Opened in a new browsing context with no opener reference.
                out.push_str("<a href=\"");
                push_escaped(url, out);
                out.push_str("\" target=\"_blank\" rel=\"noopener noreferrer\">");
                push_escaped(url, out);
                out.push_str("</a>");
            }
            Segment::Strong(children) => {
                out.push_str("<strong>");
                write_segments(children, out);
                out.push_str("</strong>");
            }
        }
    }
}

/// Escape the characters that could be read as markup or break out of an
/// attribute value.
fn push_escaped(text: &str, out: &mut String) {
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
}
