//! Plain text outlines.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::codec::{blocks_to_html, Block};

static HTML_LIKE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<(ul|ol|li|br|p|div|span|b|i|u|em|strong|a|font|code|pre|s|strike)(\s[^>]*)?/?>")
        .expect("static regex")
});
static BULLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[-*+•▪◦]|\d+[.)])\s+").expect("static regex"));

const TAB_WIDTH: usize = 4;

/// True if the text already carries markup that [crate::codec::html_to_blocks] understands.
pub fn is_html(text: &str) -> bool {
    HTML_LIKE.is_match(text)
}

fn indentation(line: &str) -> usize {
    line.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { TAB_WIDTH } else { 1 })
        .sum()
}

fn strip_bullet(line: &str) -> &str {
    let trimmed = line.trim();
    match BULLET.find(trimmed) {
        Some(bullet) => &trimmed[bullet.end()..],
        None => trimmed,
    }
}

/// Parse an indented outline. Deeper indentation than the previous line nests under it;
/// leading bullets (`-`, `*`, `+`, `•`, `1.`) are removed. Blank lines are ignored.
pub fn parse_indented(text: &str) -> Vec<Block> {
    let mut roots: Vec<Block> = Vec::new();
    let mut stack: Vec<(usize, Block)> = Vec::new();

    fn attach(stack: &mut [(usize, Block)], roots: &mut Vec<Block>, block: Block) {
        match stack.last_mut() {
            Some((_, parent)) => parent.children.push(block),
            None => roots.push(block),
        }
    }

    for line in text.lines().filter(|line| !line.trim().is_empty()) {
        let indent = indentation(line);
        while stack.last().is_some_and(|(top, _)| *top >= indent) {
            if let Some((_, block)) = stack.pop() {
                attach(&mut stack, &mut roots, block);
            }
        }
        stack.push((indent, Block::new(strip_bullet(line))));
    }
    while let Some((_, block)) = stack.pop() {
        attach(&mut stack, &mut roots, block);
    }
    roots
}

/// Escape text so that it reads back as the same characters inside markup.
pub fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_blocks(blocks: Vec<Block>) -> Vec<Block> {
    blocks
        .into_iter()
        .map(|block| Block {
            value: escape_text(&block.value),
            children: escape_blocks(block.children),
        })
        .collect()
}

/// Convert pasted text to markup.
///
/// Markup is returned unchanged apart from trimming. A single line of plain text is returned
/// without its bullet; several lines become a nested list. Plain text is escaped first.
pub fn text_to_html(text: &str) -> String {
    let trimmed = text.trim();
    if is_html(trimmed) {
        return trimmed.to_string();
    }
    let mut lines = trimmed.lines().filter(|line| !line.trim().is_empty());
    match (lines.next(), lines.next()) {
        (None, _) => String::new(),
        (Some(line), None) => escape_text(strip_bullet(line)),
        _ => blocks_to_html(&escape_blocks(parse_indented(text))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_indented() {
        let blocks = parse_indented("- a\n  - b\n    - c\n      - m\n- m\n");
        assert_eq!(
            blocks,
            vec![
                Block::new("a").with_children(vec![Block::new("b")
                    .with_children(vec![Block::new("c").with_children(vec![Block::new("m")])])]),
                Block::new("m"),
            ]
        );
    }

    #[test]
    fn test_parse_indented_tabs_and_dedent() {
        let blocks = parse_indented("a\n\tb\n\t\tc\n\td\ne");
        assert_eq!(
            blocks,
            vec![
                Block::new("a").with_children(vec![
                    Block::new("b").with_children(vec![Block::new("c")]),
                    Block::new("d"),
                ]),
                Block::new("e"),
            ]
        );
    }

    #[test]
    fn test_text_to_html() {
        assert_eq!(text_to_html("  - hello  "), "hello");
        assert_eq!(text_to_html("<b>x</b>"), "<b>x</b>");
        assert_eq!(
            text_to_html("a\n  b\nc"),
            "<ul><li>a<ul><li>b</li></ul></li><li>c</li></ul>"
        );
    }

    #[test]
    fn test_text_to_html_escapes_plain_values() {
        assert_eq!(text_to_html("- 1 < 2 & 3"), "1 &lt; 2 &amp; 3");
        let html = text_to_html("- x<y\n- y>z");
        assert_eq!(html, "<ul><li>x&lt;y</li><li>y&gt;z</li></ul>");
        assert_eq!(
            crate::codec::html_to_blocks(&crate::codec::sanitize(&html)),
            vec![Block::new("x&lt;y"), Block::new("y&gt;z")]
        );
    }
}
