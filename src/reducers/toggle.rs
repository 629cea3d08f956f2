use serde::{Deserialize, Serialize};

use crate::{
    error::OutlineError,
    paths::Path,
    properties::is_attribute,
    reducers::delete_thought::cascade_delete,
    state::State,
};

/// Switch the head of `at` between browsing by children and browsing by context.
pub fn toggle_context_view(state: &mut State, at: &Path) -> Result<(), OutlineError> {
    let id = at.head()?.clone();
    if !state.context_views.remove(&id) {
        tracing::debug!("[toggle_context_view] enabled for {id}");
        state.context_views.insert(id);
    }
    Ok(())
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ToggleAttribute {
    pub at: Path,
    /// Attribute name including its prefix, e.g. `=pin`.
    pub key: String,
    /// Optional attribute value, stored as the single child of the attribute.
    pub value: Option<String>,
}

/// Add or remove a meta attribute.
///
/// An attribute that is present with the requested value (or with any value when no value is
/// given) is removed. Otherwise it is created, or its value replaced.
pub fn toggle_attribute(state: &mut State, payload: ToggleAttribute) -> Result<(), OutlineError> {
    let id = payload.at.head()?.clone();
    if !is_attribute(&payload.key) {
        return Err(OutlineError::Custom(format!(
            "{:?} is not a meta attribute",
            payload.key
        )));
    }
    if state.get_thought(&id).is_none() {
        tracing::warn!("[toggle_attribute] thought {id} is not loaded");
        return Ok(());
    }

    match state.attribute_id(&id, &payload.key).cloned() {
        Some(attribute_id) => {
            let current = state.attribute(&id, &payload.key).map(str::to_string);
            if payload.value.is_none() || payload.value == current {
                cascade_delete(state, &attribute_id);
                return Ok(());
            }
            for child in state
                .get_all_children(&attribute_id)
                .into_iter()
                .map(|child| child.id.clone())
                .collect::<Vec<_>>()
            {
                cascade_delete(state, &child);
            }
            if let Some(value) = &payload.value {
                state.create_thought(&attribute_id, value, 0.0, None, None);
            }
        }
        None => {
            let rank = state.get_prev_rank(&id);
            let attribute_id = state.create_thought(&id, &payload.key, rank, None, None);
            if let Some(value) = &payload.value {
                state.create_thought(&attribute_id, value, 0.0, None, None);
            }
        }
    }
    Ok(())
}

pub fn set_cursor(state: &mut State, path: Option<Path>) {
    state.cursor = path.filter(|path| !path.is_empty());
}
