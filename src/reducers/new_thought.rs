use serde::{Deserialize, Serialize};

use crate::{
    error::OutlineError,
    paths::{simplify_path, Path},
    properties::ThoughtId,
    reducers::{READONLY, UNEXTENDABLE},
    state::{AlertKind, State},
};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NewThought {
    /// Where to insert. Defaults to the cursor, then to the home context.
    pub at: Option<Path>,
    pub value: String,
    /// Insert before `at` (or as the first child) instead of after it (or as the last child).
    pub insert_before: bool,
    /// Insert as a child of `at` rather than as its sibling.
    pub insert_new_subthought: bool,
    /// Use this id instead of generating one.
    pub id: Option<ThoughtId>,
    pub prevent_set_cursor: bool,
}

/// A rank directly before or after `id` among its siblings, renumbering the siblings once if
/// floating point cannot split the gap. None if `id` is not loaded.
pub(crate) fn rank_beside(state: &mut State, id: &ThoughtId, before: bool) -> Option<f64> {
    let parent_id = state.get_thought(id)?.parent_id.clone();
    let rank = |state: &State| match before {
        true => state.get_rank_before(id),
        false => state.get_rank_after(id),
    };
    if let Some(rank) = rank(state) {
        return Some(rank);
    }
    state.rerank_children(&parent_id);
    rank(state)
}

/// Returns true (after raising an alert) if children may not be added under `parent_id`.
pub(crate) fn reject_new_child(state: &mut State, parent_id: &ThoughtId) -> bool {
    for attribute in [READONLY, UNEXTENDABLE] {
        if state.has_attribute(parent_id, attribute) {
            let value = state
                .get_thought(parent_id)
                .map(|parent| parent.value.clone())
                .unwrap_or_default();
            state.raise_alert(
                AlertKind::Validation,
                format!("\"{value}\" is {}. No subthoughts may be added.", &attribute[1..]),
            );
            return true;
        }
    }
    false
}

/// Create a thought next to or under `at`, with a rank interpolated between its neighbours.
///
/// Returns the id of the new thought, or None if the insertion point is not loaded or the
/// insertion was rejected.
pub fn new_thought(state: &mut State, payload: NewThought) -> Result<Option<ThoughtId>, OutlineError> {
    let at = match payload.at.or_else(|| state.cursor.clone()) {
        Some(at) => at,
        None => Path::home(),
    };
    let head = at.head()?.clone();
    let as_child = payload.insert_new_subthought || at.is_root();

    let simple = simplify_path(state, &at)?;
    let (parent_id, parent_path) = if as_child {
        (head.clone(), at.clone())
    } else {
        let Some(thought) = state.get_thought(&head) else {
            tracing::warn!("[new_thought] insertion point {head} is not loaded");
            return Ok(None);
        };
        (thought.parent_id.clone(), at.parent())
    };
    if state.get_thought(&parent_id).is_none() {
        tracing::warn!("[new_thought] parent {parent_id} of {simple} is not loaded");
        return Ok(None);
    }
    if reject_new_child(state, &parent_id) {
        return Ok(None);
    }

    let rank = match (as_child, payload.insert_before) {
        (true, true) => state.get_prev_rank(&parent_id),
        (true, false) => state.get_next_rank(&parent_id),
        (false, before) => match rank_beside(state, &head, before) {
            Some(rank) => rank,
            None => return Ok(None),
        },
    };

    let id = state.create_thought(&parent_id, &payload.value, rank, payload.id, None);
    tracing::debug!("[new_thought] created {id} under {parent_id} at rank {rank}");

    if !payload.prevent_set_cursor {
        state.cursor = Some(parent_path.append([id.clone()]));
    }
    Ok(Some(id))
}
