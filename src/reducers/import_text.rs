use serde::{Deserialize, Serialize};

use crate::{
    codec::{html_to_blocks, sanitize, strip, Block, ImportFormat},
    error::OutlineError,
    event::EventOrigin,
    hashing::create_id,
    paths::{simplify_path, Path, SimplePath},
    properties::{SessionId, ThoughtId, ThoughtIndices, Timestamp},
    reducers::{
        collapse_context::{collapse_context, CollapseContext},
        edit_thought::{edit_thought, EditThought},
        move_thought::discard_thought,
        new_thought::{new_thought, reject_new_child, NewThought},
    },
    state::{AlertKind, State},
};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportText {
    /// Destination. Defaults to the home context.
    pub path: Option<Path>,
    /// Plain text, markup or a serialized state.
    pub text: String,
    /// Timestamp of the imported thoughts. Defaults to now.
    pub last_updated: Option<Timestamp>,
    /// Session credited with the imported thoughts. Defaults to the current session.
    pub updated_by: Option<SessionId>,
    /// Leave the cursor where it was.
    pub prevent_set_cursor: bool,
    /// Untrimmed destination value for single-line imports, used instead of the stored value.
    pub raw_dest_value: Option<String>,
    /// Character offset where a single-line import starts replacing the destination value.
    pub replace_start: Option<usize>,
    /// Character offset where a single-line import stops replacing the destination value.
    pub replace_end: Option<usize>,
    /// Character offset where a single-line import is inserted when nothing is replaced.
    pub caret_position: usize,
}

/// Import text below or into the thought at `path`.
///
/// Returns the path of the last imported first-level thought (or of the edited thought for a
/// single-line import). A serialized state replaces the whole graph and returns None.
pub fn import_text(state: &mut State, payload: ImportText) -> Result<Option<Path>, OutlineError> {
    let path = payload.path.clone().unwrap_or_else(Path::home);
    path.head()?;
    match ImportFormat::detect(&payload.text, path.is_root()) {
        ImportFormat::FullState => import_full_state(state, &payload.text),
        ImportFormat::Inline(html) => import_inline(state, &path, &html, &payload),
        ImportFormat::Structured(html) => import_structured(state, &path, &html, &payload),
    }
}

/// Replace every thought and lexeme with the contents of a dump.
fn import_full_state(state: &mut State, text: &str) -> Result<Option<Path>, OutlineError> {
    let parsed: ThoughtIndices = match serde_json::from_str(text) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!("[import_text] unreadable state dump: {e}");
            state.raise_alert(AlertKind::Validation, format!("Invalid state dump: {e}"));
            return Ok(None);
        }
    };
    let mut next = State::initial(state.session_id.clone()).thoughts;
    next.thought_index.extend(parsed.thought_index);
    if !parsed.lexeme_index.is_empty() {
        next.lexeme_index = parsed.lexeme_index;
    }

    let stale_thoughts = state
        .thoughts
        .thought_index
        .keys()
        .filter(|id| !next.thought_index.contains_key(*id))
        .cloned()
        .collect::<Vec<_>>();
    let stale_lexemes = state
        .thoughts
        .lexeme_index
        .keys()
        .filter(|key| !next.lexeme_index.contains_key(*key))
        .cloned()
        .collect::<Vec<_>>();
    for id in stale_thoughts {
        state.take_thought(&id, EventOrigin::Local);
    }
    for key in stale_lexemes {
        state.take_lexeme(&key, EventOrigin::Local);
    }
    for (id, thought) in next.thought_index {
        state.tombstones.remove(&id);
        state.put_thought(thought, EventOrigin::Local);
    }
    for (key, lexeme) in next.lexeme_index {
        state.put_lexeme(key, lexeme, EventOrigin::Local);
    }
    state.context_views.clear();
    state.cursor = None;
    tracing::debug!(
        "[import_text] replaced state with {} thoughts",
        state.thoughts.thought_index.len()
    );
    Ok(None)
}

/// Splice a single line into the destination value.
fn import_inline(
    state: &mut State,
    path: &Path,
    html: &str,
    payload: &ImportText,
) -> Result<Option<Path>, OutlineError> {
    let simple = simplify_path(state, path)?;
    let id = simple.head()?.clone();
    let Some(thought) = state.get_thought(&id) else {
        tracing::warn!("[import_text] destination {id} is not loaded");
        return Ok(None);
    };
    let dest_value = payload
        .raw_dest_value
        .clone()
        .unwrap_or_else(|| thought.value.clone());
    let inserted = strip(html, true);

    let chars = dest_value.chars().collect::<Vec<_>>();
    let start = payload.replace_start.unwrap_or(0).min(chars.len());
    let end = payload.replace_end.unwrap_or(0).clamp(start, chars.len());
    let replaced = chars[..start].iter().chain(&chars[end..]).collect::<Vec<_>>();
    let at = payload
        .replace_start
        .filter(|start| *start > 0)
        .unwrap_or(payload.caret_position)
        .min(replaced.len());
    let mut new_value = replaced[..at].iter().copied().collect::<String>();
    new_value.push_str(&inserted);
    new_value.extend(replaced[at..].iter().copied());

    edit_thought(
        state,
        EditThought {
            old_value: dest_value,
            new_value,
            path: simple,
        },
    )?;
    if !payload.prevent_set_cursor {
        state.cursor = Some(path.clone());
    }
    Ok(Some(path.clone()))
}

/// Create the blocks under `parent_id` with consecutive ranks from `rank`. Returns the id and
/// value of each first-level thought.
fn import_blocks(
    state: &mut State,
    parent_id: &ThoughtId,
    blocks: &[Block],
    rank: f64,
    stamp: &(Timestamp, SessionId),
) -> Vec<(ThoughtId, String)> {
    let mut created = Vec::with_capacity(blocks.len());
    for (i, block) in blocks.iter().enumerate() {
        let id = state.create_thought(
            parent_id,
            &block.value,
            rank + i as f64,
            None,
            Some(stamp.clone()),
        );
        import_blocks(state, &id, &block.children, 0.0, stamp);
        created.push((id, block.value.clone()));
    }
    created
}

/// Create thoughts from a list.
///
/// An empty leaf that is the only thought in its context is replaced by the import. Otherwise,
/// if the destination already has children (or is an empty thought among siblings), the list is
/// imported under a temporary thought that is then collapsed into the destination, so that
/// imported thoughts merge by value with existing ones.
fn import_structured(
    state: &mut State,
    path: &Path,
    html: &str,
    payload: &ImportText,
) -> Result<Option<Path>, OutlineError> {
    let simple = simplify_path(state, path)?;
    let dest_id = simple.head()?.clone();
    let Some(dest) = state.get_thought(&dest_id) else {
        tracing::warn!("[import_text] destination {dest_id} is not loaded");
        return Ok(None);
    };
    let dest_parent_id = dest.parent_id.clone();
    let dest_rank = dest.rank;
    let dest_is_leaf = state.get_all_children(&dest_id).is_empty();
    let dest_empty = dest.value.is_empty() && dest_is_leaf;
    let parent_path = simple.rooted_parent()?;
    let parent_context_empty = state.get_all_children(parent_path.head()?).len() <= 1;
    let into_dummy = match dest_empty {
        true => !parent_context_empty,
        false => !dest_is_leaf,
    };

    let blocks = html_to_blocks(&sanitize(html));
    if blocks.is_empty() {
        return Ok(None);
    }
    let target_parent = match dest_empty && !into_dummy {
        true => dest_parent_id.clone(),
        false => dest_id.clone(),
    };
    if reject_new_child(state, &target_parent) {
        return Ok(None);
    }

    let cursor_before = state.cursor.clone();
    let stamp = (
        payload.last_updated.unwrap_or_else(Timestamp::now),
        payload
            .updated_by
            .clone()
            .unwrap_or_else(|| state.session_id.clone()),
    );

    let (imported, import_path): (Vec<(ThoughtId, String)>, SimplePath) = if into_dummy {
        let dummy = new_thought(
            state,
            NewThought {
                at: Some(simple.clone().into()),
                value: create_id().to_string(),
                insert_new_subthought: true,
                prevent_set_cursor: true,
                ..Default::default()
            },
        )?;
        let Some(dummy) = dummy else {
            tracing::warn!("[import_text] could not create a placeholder under {dest_id}");
            return Ok(None);
        };
        let imported = import_blocks(state, &dummy, &blocks, 0.0, &stamp);
        (imported, simple.append([dummy]))
    } else if dest_empty {
        discard_thought(state, &dest_id);
        let imported = import_blocks(state, &dest_parent_id, &blocks, dest_rank, &stamp);
        (imported, simple.clone())
    } else {
        let imported = import_blocks(state, &dest_id, &blocks, 0.0, &stamp);
        (imported, simple.append([]))
    };
    tracing::debug!(
        "[import_text] imported {} thoughts below {dest_id}",
        blocks.iter().map(Block::count).sum::<usize>()
    );

    let Some((last_id, last_value)) = imported.last().cloned() else {
        return Ok(None);
    };

    let last_imported = if into_dummy {
        collapse_context(
            state,
            CollapseContext {
                at: import_path.clone().into(),
            },
        )?;
        if dest_empty {
            collapse_context(
                state,
                CollapseContext {
                    at: simple.clone().into(),
                },
            )?;
        }
        let (final_parent, final_parent_path) = match dest_empty {
            true => (dest_parent_id, Path::from(parent_path)),
            false => (dest_id, Path::from(simple)),
        };
        let resolved = match state.get_thought(&last_id) {
            Some(_) => Some(last_id.clone()),
            None => state
                .find_child_by_value(&final_parent, &last_value, None)
                .map(|thought| thought.id.clone()),
        };
        match resolved {
            Some(id) => Some(final_parent_path.append([id])),
            None => {
                tracing::warn!(
                    "[import_text] last imported thought {last_id} was merged away and no sibling holds {last_value:?}"
                );
                None
            }
        }
    } else if dest_empty {
        Some(Path::from(parent_path).append([last_id]))
    } else {
        Some(Path::from(import_path).append([last_id]))
    };

    state.cursor = match payload.prevent_set_cursor {
        true => cursor_before,
        false => last_imported.clone().or(cursor_before),
    };
    Ok(last_imported)
}
