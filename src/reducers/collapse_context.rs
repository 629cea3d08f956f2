use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{
    error::OutlineError,
    event::EventOrigin,
    hashing::create_id,
    paths::{simplify_path, Path},
    reducers::{
        move_thought::{discard_thought, merge_thoughts, relocate, rewrite_cursor},
        new_thought::rank_beside,
    },
    state::State,
};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CollapseContext {
    pub at: Path,
}

/// Replace a thought with its children.
///
/// The children are moved, in rank order, into the thought's position among its siblings and
/// merged by value with any sibling that already holds the same value. The thought itself is
/// renamed to a unique value first so that it cannot absorb one of its own children while they
/// are moved, and is deleted afterwards. A thought without children is left alone.
pub fn collapse_context(state: &mut State, payload: CollapseContext) -> Result<(), OutlineError> {
    let simple = simplify_path(state, &payload.at)?;
    let id = simple.head()?.clone();
    let Some(thought) = state.get_thought(&id) else {
        tracing::warn!("[collapse_context] thought {id} is not loaded");
        return Ok(());
    };
    let parent_id = thought.parent_id.clone();
    let children = state
        .get_children_ranked(&id)
        .into_iter()
        .map(|child| (child.id.clone(), child.value.clone()))
        .collect::<Vec<_>>();
    if children.is_empty() {
        return Ok(());
    }
    if state.get_thought(&parent_id).is_none() {
        tracing::warn!("[collapse_context] parent {parent_id} of {id} is not loaded");
        return Ok(());
    }

    let placeholder = create_id().to_string();
    let old_value = thought.value.clone();
    state.update_thought(&id, |thought| thought.value = placeholder.clone());
    state.update_thought(&parent_id, |parent| parent.add_child(&id, &placeholder));
    state.unlink_lexeme(&id, &old_value, EventOrigin::Local);

    let parent_path = payload.at.rooted_parent()?;
    let mut merged = BTreeMap::new();
    for (child, value) in &children {
        let existing = state
            .find_child_by_value(&parent_id, value, Some(&id))
            .map(|thought| thought.id.clone());
        match existing {
            Some(existing) => merge_thoughts(state, child, &existing, &mut merged),
            None => {
                let Some(rank) = rank_beside(state, &id, true) else {
                    continue;
                };
                relocate(state, child, &id, &parent_id, rank);
            }
        }
    }

    // Cursor inside the collapsed thought moves up one level; a cursor on it moves to its
    // first child.
    if state.cursor.as_ref() == Some(&payload.at) {
        if let Some((first, _)) = children.first() {
            let first = merged.get(first).unwrap_or(first).clone();
            state.cursor = Some(parent_path.append([first]));
        }
    } else {
        rewrite_cursor(state, &payload.at, &parent_path, &merged);
    }

    discard_thought(state, &id);
    tracing::debug!("[collapse_context] collapsed {id} into {parent_id}");
    Ok(())
}
