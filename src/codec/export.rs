use serde::{Deserialize, Serialize};

use crate::{codec::strip, hashing::decode_entities, properties::ThoughtId, state::State};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    /// `- value` lines indented by two spaces per level, markup removed.
    #[default]
    PlainText,
    /// Nested `<ul><li>` lists.
    Html,
}

fn write_text(state: &State, id: &ThoughtId, depth: usize, out: &mut String) {
    let Some(thought) = state.get_thought(id) else {
        return;
    };
    out.push_str(&"  ".repeat(depth));
    out.push_str("- ");
    out.push_str(&decode_entities(&strip(&thought.value, false)));
    out.push('\n');
    for child in state.get_children_ranked(id) {
        write_text(state, &child.id, depth + 1, out);
    }
}

fn write_html(state: &State, ids: &[ThoughtId], out: &mut String) {
    if ids.is_empty() {
        return;
    }
    out.push_str("<ul>");
    for id in ids {
        let Some(thought) = state.get_thought(id) else {
            continue;
        };
        out.push_str("<li>");
        out.push_str(&thought.value);
        let children = state
            .get_children_ranked(id)
            .into_iter()
            .map(|child| child.id.clone())
            .collect::<Vec<_>>();
        write_html(state, &children, out);
        out.push_str("</li>");
    }
    out.push_str("</ul>");
}

/// Render a thought and its loaded descendants in rank order. A root sentinel is not rendered
/// itself; its children become the top level.
pub fn export_context(state: &State, id: &ThoughtId, format: ExportFormat) -> String {
    let top = match id.is_root_sentinel() {
        true => state
            .get_children_ranked(id)
            .into_iter()
            .map(|child| child.id.clone())
            .collect::<Vec<_>>(),
        false => vec![id.clone()],
    };
    let mut out = String::new();
    match format {
        ExportFormat::PlainText => {
            for id in &top {
                write_text(state, id, 0, &mut out);
            }
        }
        ExportFormat::Html => write_html(state, &top, &mut out),
    }
    out
}
