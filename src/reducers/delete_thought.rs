use serde::{Deserialize, Serialize};

use crate::{
    error::OutlineError,
    event::EventOrigin,
    paths::Path,
    properties::{ThoughtId, Timestamp},
    reducers::READONLY,
    state::{AlertKind, State},
};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteThought {
    /// Path of the parent context. Used to reposition the cursor.
    pub path_parent: Path,
    pub thought_id: ThoughtId,
}

/// Remove a thought and every loaded descendant, unlinking each from its lexeme.
///
/// Descendants that are pending or not loaded at all cannot be enumerated here. They are
/// tombstoned and queued in [crate::state::PushBatch::pending_deletes] so the sync layer can
/// remove their remote closure.
pub(crate) fn cascade_delete(state: &mut State, id: &ThoughtId) -> usize {
    let now = Timestamp::now();
    let parent_id = state.get_thought(id).map(|thought| thought.parent_id.clone());
    let mut removed = 0;
    let mut stack = vec![id.clone()];
    while let Some(next) = stack.pop() {
        state.tombstones.insert(next.clone(), now);
        state.context_views.remove(&next);
        match state.take_thought(&next, EventOrigin::Local) {
            Some(thought) => {
                removed += 1;
                state.unlink_lexeme(&next, &thought.value, EventOrigin::Local);
                if thought.pending {
                    state.push_batch.pending_deletes.insert(next.clone());
                }
                stack.extend(thought.child_ids().cloned());
            }
            None => {
                state.push_batch.pending_deletes.insert(next.clone());
            }
        }
    }
    if let Some(parent_id) = parent_id {
        state.update_thought(&parent_id, |parent| {
            parent.remove_child(id);
        });
    }
    removed
}

pub fn delete_thought(state: &mut State, payload: DeleteThought) -> Result<(), OutlineError> {
    let id = payload.thought_id;
    let Some(thought) = state.get_thought(&id) else {
        tracing::warn!("[delete_thought] thought {id} is not loaded");
        return Ok(());
    };
    let value = thought.value.clone();
    if id.is_root_sentinel() || id.is_root_parent() {
        state.raise_alert(AlertKind::Validation, "Root contexts cannot be deleted.");
        return Ok(());
    }
    if state.has_attribute(&id, READONLY) {
        state.raise_alert(
            AlertKind::Validation,
            format!("\"{value}\" is readonly and cannot be deleted."),
        );
        return Ok(());
    }

    let removed = cascade_delete(state, &id);
    tracing::debug!("[delete_thought] removed {removed} thoughts under {id}");

    let cursor_inside = state
        .cursor
        .as_ref()
        .map(|cursor| cursor.contains_id(&id))
        .unwrap_or(false);
    if cursor_inside {
        state.cursor = match payload.path_parent.is_root() {
            true => None,
            false => Some(payload.path_parent),
        };
    }
    Ok(())
}
