//! Conversion between external text and the thought graph.
//!
//! ## Import
//!
//! Pasted content goes through three stages before it reaches
//! [crate::reducers::import_text]:
//!
//! 1. [text_to_html] turns an indented plain-text outline into a nested list and leaves markup
//!    alone.
//! 2. [sanitize] reduces the markup to [ALLOWED_TAGS] and [ALLOWED_ATTRIBUTES], escaping the
//!    rest.
//! 3. [html_to_blocks] reads the list structure into a forest of [Block]s.
//!
//! [ImportFormat::detect] decides which path a paste takes. A full state dump (see
//! [is_full_state_dump]) bypasses all of the above.
//!
//! ## Export
//!
//! [export_context] renders a thought and its descendants as plain text or HTML.

mod export;
mod html;
mod text;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub use export::{export_context, ExportFormat};
pub use html::{html_to_blocks, sanitize, strip, ALLOWED_ATTRIBUTES, ALLOWED_TAGS};
pub use text::{escape_text, is_html, parse_indented, text_to_html};

static LIST_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<li(?:\s|>)").expect("static regex"));

/// Opening of a serialized [crate::properties::ThoughtIndices] dump, compared with all
/// whitespace removed.
pub const FULL_STATE_SIGNATURE: &str = r#"{"thoughtIndex":{"#;

/// Key that a dump must contain. Map keys are serialized in sorted order, so the home sentinel
/// is not necessarily the first entry.
const FULL_STATE_HOME_KEY: &str = r#""__ROOT__":{"#;

/// One parsed line of an import with its nested lines.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub value: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Block>,
}

impl Block {
    pub fn new(value: impl Into<String>) -> Self {
        Block {
            value: value.into(),
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<Block>) -> Self {
        self.children = children;
        self
    }

    /// Number of blocks in this subtree, including itself.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(Block::count).sum::<usize>()
    }
}

/// Render blocks as a nested `<ul>` list.
pub fn blocks_to_html(blocks: &[Block]) -> String {
    let mut out = String::new();
    if blocks.is_empty() {
        return out;
    }
    out.push_str("<ul>");
    for block in blocks {
        out.push_str("<li>");
        out.push_str(&block.value);
        out.push_str(&blocks_to_html(&block.children));
        out.push_str("</li>");
    }
    out.push_str("</ul>");
    out
}

/// Number of list items in converted markup.
pub fn count_list_items(html: &str) -> usize {
    LIST_ITEM.find_iter(html).count()
}

pub fn is_full_state_dump(text: &str) -> bool {
    let compact = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>();
    compact.starts_with(FULL_STATE_SIGNATURE) && compact.contains(FULL_STATE_HOME_KEY)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImportFormat {
    /// A serialized state that replaces the whole graph.
    FullState,
    /// At most one line, spliced into the destination thought's value.
    Inline(String),
    /// A list that becomes new thoughts, as converted markup.
    Structured(String),
}

impl ImportFormat {
    /// Classify pasted text. Pasting at the home context always creates thoughts, since the
    /// home context has no value to splice into.
    pub fn detect(text: &str, at_root: bool) -> ImportFormat {
        if is_full_state_dump(text) {
            return ImportFormat::FullState;
        }
        let html = text_to_html(text);
        match count_list_items(&html) <= 1 && !at_root {
            true => ImportFormat::Inline(html),
            false => ImportFormat::Structured(html),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_formats() {
        assert_eq!(
            ImportFormat::detect("{\n  \"thoughtIndex\": {\n    \"__ROOT__\": {", false),
            ImportFormat::FullState
        );
        assert_eq!(
            ImportFormat::detect(
                r#"{"thoughtIndex":{"__ABSOLUTE__":{},"__ROOT__":{}},"lexemeIndex":{}}"#,
                true
            ),
            ImportFormat::FullState
        );
        assert_ne!(
            ImportFormat::detect(r#"{"thoughtIndex":{"a":{}}}"#, true),
            ImportFormat::FullState
        );
        assert_eq!(
            ImportFormat::detect("hello", false),
            ImportFormat::Inline("hello".to_string())
        );
        assert_eq!(
            ImportFormat::detect("hello", true),
            ImportFormat::Structured("hello".to_string())
        );
        assert!(matches!(
            ImportFormat::detect("a\nb", false),
            ImportFormat::Structured(_)
        ));
    }

    #[test]
    fn test_blocks_to_html_reads_back() {
        let blocks = vec![Block::new("a").with_children(vec![Block::new("b")]), Block::new("c")];
        let html = blocks_to_html(&blocks);
        assert_eq!(count_list_items(&html), 3);
        assert_eq!(html_to_blocks(&sanitize(&html)), blocks);
    }
}
