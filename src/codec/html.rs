//! A small tag-level HTML reader for pasted content.
//!
//! Pasted markup only needs to be understood at the level of list structure and inline
//! formatting, so the reader works on a flat token stream rather than a document tree.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::codec::Block;

static TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<(/?)([A-Za-z][A-Za-z0-9]*)((?:[^>"']|"[^"]*"|'[^']*')*?)(/?)>"#)
        .expect("static regex")
});
static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
        .expect("static regex")
});
static COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").expect("static regex"));

/// Tags kept by [sanitize]. Everything else is escaped.
pub const ALLOWED_TAGS: &[&str] = &[
    "a", "b", "br", "code", "em", "font", "i", "li", "ol", "pre", "s", "span", "strike", "strong",
    "u", "ul",
];

/// Attributes kept by [sanitize], per tag.
pub const ALLOWED_ATTRIBUTES: &[(&str, &[&str])] = &[
    ("a", &["href"]),
    ("font", &["color", "face", "size"]),
    ("span", &["class", "style"]),
];

const VOID_TAGS: &[&str] = &["br"];

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Token<'a> {
    Open {
        name: String,
        attributes: &'a str,
        raw: &'a str,
    },
    Close {
        name: String,
        raw: &'a str,
    },
    Text(&'a str),
}

pub(crate) fn tokenize(html: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut last = 0;
    for captures in TAG.captures_iter(html) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        if whole.start() > last {
            tokens.push(Token::Text(&html[last..whole.start()]));
        }
        let name = captures
            .get(2)
            .map(|m| m.as_str().to_lowercase())
            .unwrap_or_default();
        let closing = captures.get(1).is_some_and(|m| !m.as_str().is_empty());
        tokens.push(match closing {
            true => Token::Close {
                name,
                raw: whole.as_str(),
            },
            false => Token::Open {
                name,
                attributes: captures.get(3).map(|m| m.as_str()).unwrap_or_default(),
                raw: whole.as_str(),
            },
        });
        last = whole.end();
    }
    if last < html.len() {
        tokens.push(Token::Text(&html[last..]));
    }
    tokens
}

fn is_allowed(name: &str) -> bool {
    ALLOWED_TAGS.contains(&name)
}

fn escape_tag(raw: &str) -> String {
    raw.replace('<', "&lt;").replace('>', "&gt;")
}

fn filter_attributes(name: &str, attributes: &str) -> String {
    let allowed = ALLOWED_ATTRIBUTES
        .iter()
        .find(|(tag, _)| *tag == name)
        .map(|(_, attributes)| *attributes)
        .unwrap_or_default();
    let mut out = String::new();
    for captures in ATTRIBUTE.captures_iter(attributes) {
        let Some(key) = captures.get(1).map(|m| m.as_str().to_lowercase()) else {
            continue;
        };
        if !allowed.contains(&key.as_str()) {
            continue;
        }
        let value = captures
            .get(2)
            .or_else(|| captures.get(3))
            .or_else(|| captures.get(4))
            .map(|m| m.as_str())
            .unwrap_or_default();
        if key == "href" && value.trim_start().to_lowercase().starts_with("javascript:") {
            continue;
        }
        out.push_str(&format!(" {key}=\"{}\"", value.replace('"', "&quot;")));
    }
    out
}

/// Reduce markup to [ALLOWED_TAGS] and [ALLOWED_ATTRIBUTES].
///
/// Disallowed tags are escaped so their text survives as content. Unclosed allowed tags are
/// closed at the end and stray closing tags are dropped.
pub fn sanitize(html: &str) -> String {
    let html = COMMENT.replace_all(html, "");
    let mut out = String::with_capacity(html.len());
    let mut open: Vec<String> = Vec::new();
    for token in tokenize(&html) {
        match token {
            Token::Text(text) => out.push_str(text),
            Token::Open { name, attributes, raw } => {
                if !is_allowed(&name) {
                    out.push_str(&escape_tag(raw));
                    continue;
                }
                out.push_str(&format!("<{name}{}>", filter_attributes(&name, attributes)));
                if !VOID_TAGS.contains(&name.as_str()) && !raw.ends_with("/>") {
                    open.push(name);
                }
            }
            Token::Close { name, raw } => {
                if !is_allowed(&name) {
                    out.push_str(&escape_tag(raw));
                    continue;
                }
                if let Some(position) = open.iter().rposition(|tag| *tag == name) {
                    for tag in open.drain(position..).rev() {
                        out.push_str(&format!("</{tag}>"));
                    }
                }
            }
        }
    }
    for tag in open.into_iter().rev() {
        out.push_str(&format!("</{tag}>"));
    }
    out
}

/// Remove markup. With `preserve_formatting`, inline formatting tags are kept.
pub fn strip(html: &str, preserve_formatting: bool) -> String {
    const FORMATTING: &[&str] = &["a", "b", "code", "em", "font", "i", "s", "span", "strike", "strong", "u"];
    let mut out = String::with_capacity(html.len());
    for token in tokenize(html) {
        match token {
            Token::Text(text) => out.push_str(text),
            Token::Open { name, raw, .. } | Token::Close { name, raw } => {
                if preserve_formatting && FORMATTING.contains(&name.as_str()) {
                    out.push_str(raw);
                } else if name == "br" || name == "li" {
                    out.push(' ');
                }
            }
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

enum Frame {
    List,
    Item(Block),
}

fn attach(stack: &mut [Frame], roots: &mut Vec<Block>, mut block: Block) {
    block.value = block.value.trim().to_string();
    let parent = stack.iter_mut().rev().find_map(|frame| match frame {
        Frame::Item(parent) => Some(parent),
        Frame::List => None,
    });
    match parent {
        Some(parent) => parent.children.push(block),
        None => roots.push(block),
    }
}

fn flush_text(roots: &mut Vec<Block>, text: &mut String) {
    let value = text.trim();
    if !value.is_empty() {
        roots.push(Block::new(value));
    }
    text.clear();
}

/// Pop frames down to and including the innermost frame matching `item`.
fn close_until(stack: &mut Vec<Frame>, roots: &mut Vec<Block>, item: bool) {
    while let Some(frame) = stack.pop() {
        match frame {
            Frame::Item(block) => {
                attach(stack, roots, block);
                if item {
                    return;
                }
            }
            Frame::List => {
                if !item {
                    return;
                }
            }
        }
    }
}

/// Parse sanitized markup into a forest of blocks.
///
/// Each `<li>` becomes a block whose value is its inline content; a nested list supplies its
/// children. Text outside of any list item becomes one top-level block per `<br>`-separated
/// run.
pub fn html_to_blocks(html: &str) -> Vec<Block> {
    let mut stack: Vec<Frame> = Vec::new();
    let mut roots: Vec<Block> = Vec::new();
    let mut loose = String::new();

    for token in tokenize(html) {
        match token {
            Token::Open { name, .. } if name == "ul" || name == "ol" => {
                stack.push(Frame::List);
            }
            Token::Close { name, .. } if name == "ul" || name == "ol" => {
                if stack.iter().any(|frame| matches!(frame, Frame::List)) {
                    close_until(&mut stack, &mut roots, false);
                }
            }
            Token::Open { name, .. } if name == "li" => {
                flush_text(&mut roots, &mut loose);
                // A list item directly inside another item closes it.
                if matches!(stack.last(), Some(Frame::Item(_))) {
                    close_until(&mut stack, &mut roots, true);
                }
                stack.push(Frame::Item(Block::default()));
            }
            Token::Close { name, .. } if name == "li" => {
                if matches!(stack.last(), Some(Frame::Item(_))) {
                    close_until(&mut stack, &mut roots, true);
                }
            }
            token => {
                let (raw, is_break) = match &token {
                    Token::Text(text) => (*text, false),
                    Token::Open { name, raw, .. } => (*raw, name == "br"),
                    Token::Close { raw, .. } => (*raw, false),
                };
                match stack.last_mut() {
                    Some(Frame::Item(block)) => block.value.push_str(raw),
                    Some(Frame::List) => {}
                    None if is_break => flush_text(&mut roots, &mut loose),
                    None => loose.push_str(raw),
                }
            }
        }
    }
    while !stack.is_empty() {
        close_until(&mut stack, &mut roots, true);
    }
    flush_text(&mut roots, &mut loose);
    roots
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_escapes_disallowed_tags() {
        let clean = sanitize(r#"<li>a <script>x()</script><b onclick="y">b</b></li>"#);
        assert_eq!(
            clean,
            "<li>a &lt;script&gt;x()&lt;/script&gt;<b>b</b></li>"
        );
    }

    #[test]
    fn test_sanitize_filters_attributes_and_closes_tags() {
        let clean = sanitize(r#"<ul><li><a href="http://x" target="_blank">x</a><li>y"#);
        assert_eq!(
            clean,
            r#"<ul><li><a href="http://x">x</a><li>y</li></li></ul>"#
        );
        assert_eq!(sanitize(r#"<a href="javascript:alert(1)">x</a>"#), "<a>x</a>");
    }

    #[test]
    fn test_html_to_blocks_nested() {
        let blocks = html_to_blocks("<ul><li>a<ul><li>b</li><li>c</li></ul></li><li>d</li></ul>");
        assert_eq!(
            blocks,
            vec![
                Block::new("a").with_children(vec![Block::new("b"), Block::new("c")]),
                Block::new("d"),
            ]
        );
    }

    #[test]
    fn test_html_to_blocks_unclosed_items() {
        let blocks = html_to_blocks("<li>a<li>b<ul><li>c</ul><li>d");
        assert_eq!(
            blocks,
            vec![
                Block::new("a"),
                Block::new("b").with_children(vec![Block::new("c")]),
                Block::new("d"),
            ]
        );
    }

    #[test]
    fn test_html_to_blocks_keeps_inline_markup() {
        let blocks = html_to_blocks("<li><b>bold</b> text</li>");
        assert_eq!(blocks, vec![Block::new("<b>bold</b> text")]);
    }

    #[test]
    fn test_loose_text_splits_on_breaks() {
        let blocks = html_to_blocks("one<br>two<br/>three");
        assert_eq!(
            blocks,
            vec![Block::new("one"), Block::new("two"), Block::new("three")]
        );
    }

    #[test]
    fn test_strip() {
        assert_eq!(strip("<li><b>a</b>  b</li>", true), "<b>a</b> b");
        assert_eq!(strip("<li><b>a</b>  b</li>", false), "a b");
    }
}
