use serde::{Deserialize, Serialize};

use crate::{
    error::OutlineError,
    event::EventOrigin,
    hashing::hash_thought,
    paths::SimplePath,
    reducers::{READONLY, UNEDITABLE},
    state::{AlertKind, State},
};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EditThought {
    pub old_value: String,
    pub new_value: String,
    pub path: SimplePath,
}

/// Change the value of the thought at the head of `path` and move it between lexemes.
pub fn edit_thought(state: &mut State, payload: EditThought) -> Result<(), OutlineError> {
    let id = payload.path.head()?.clone();
    let Some(thought) = state.get_thought(&id) else {
        tracing::warn!("[edit_thought] thought {id} is not loaded");
        return Ok(());
    };
    let parent_id = thought.parent_id.clone();

    for attribute in [READONLY, UNEDITABLE] {
        if state.has_attribute(&id, attribute) {
            state.raise_alert(
                AlertKind::Validation,
                format!(
                    "\"{}\" is {}. Editing is disabled.",
                    payload.old_value,
                    &attribute[1..]
                ),
            );
            return Ok(());
        }
    }

    let listed = state
        .get_lexeme(&payload.old_value)
        .map(|lexeme| lexeme.contexts.contains(&id))
        .unwrap_or(false);
    if !listed {
        tracing::warn!(
            "[edit_thought] lexeme of {:?} does not list {id}; refusing to edit",
            payload.old_value
        );
        return Ok(());
    }
    if payload.old_value == payload.new_value {
        return Ok(());
    }

    let new_value = payload.new_value.clone();
    state.update_thought(&id, |thought| thought.value = new_value);
    state.update_thought(&parent_id, |parent| parent.add_child(&id, &payload.new_value));

    if hash_thought(&payload.old_value) != hash_thought(&payload.new_value) {
        state.unlink_lexeme(&id, &payload.old_value, EventOrigin::Local);
        state.link_lexeme(&id, &payload.new_value, EventOrigin::Local);
    }
    tracing::debug!("[edit_thought] {id}: {:?} -> {:?}", payload.old_value, payload.new_value);
    Ok(())
}
