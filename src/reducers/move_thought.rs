use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{
    error::OutlineError,
    event::EventOrigin,
    paths::Path,
    properties::{ThoughtId, Timestamp},
    reducers::{new_thought::reject_new_child, IMMOVABLE, READONLY},
    state::{AlertKind, State},
};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MoveThought {
    pub old_path: Path,
    /// Destination path. Its head must be the moved thought; its parent is the new context.
    pub new_path: Path,
    pub new_rank: f64,
}

/// Detach `id` from `old_parent` and attach it under `new_parent` at `rank`.
pub(crate) fn relocate(
    state: &mut State,
    id: &ThoughtId,
    old_parent: &ThoughtId,
    new_parent: &ThoughtId,
    rank: f64,
) {
    let Some(value) = state.get_thought(id).map(|thought| thought.value.clone()) else {
        return;
    };
    if old_parent != new_parent {
        state.update_thought(old_parent, |parent| {
            parent.remove_child(id);
        });
    }
    let new_parent_id = new_parent.clone();
    state.update_thought(id, |thought| {
        thought.parent_id = new_parent_id;
        thought.rank = rank;
    });
    state.update_thought(new_parent, |parent| parent.add_child(id, &value));
}

/// True if the thought and all of its descendants are loaded and not pending. Only such a
/// subtree can be merged, since merging deletes the source thoughts.
fn subtree_loaded(state: &State, id: &ThoughtId) -> bool {
    let mut stack = vec![id.clone()];
    while let Some(next) = stack.pop() {
        match state.get_thought(&next) {
            Some(thought) if !thought.pending => stack.extend(thought.child_ids().cloned()),
            _ => return false,
        }
    }
    true
}

/// Remove a thought whose children have already been moved away.
pub(crate) fn discard_thought(state: &mut State, id: &ThoughtId) {
    let Some(thought) = state.take_thought(id, EventOrigin::Local) else {
        return;
    };
    state.update_thought(&thought.parent_id, |parent| {
        parent.remove_child(id);
    });
    state.unlink_lexeme(id, &thought.value, EventOrigin::Local);
    state.tombstones.insert(id.clone(), Timestamp::now());
    state.context_views.remove(id);
}

/// Merge `source` into `dest`, depth first: children of `source` with a value already present
/// under `dest` are merged recursively, the rest are appended to `dest` in rank order.
/// `source` is discarded afterwards. Every merged id is recorded in `merged`.
pub(crate) fn merge_thoughts(
    state: &mut State,
    source: &ThoughtId,
    dest: &ThoughtId,
    merged: &mut BTreeMap<ThoughtId, ThoughtId>,
) {
    if source == dest || state.get_thought(source).is_none() {
        return;
    }
    merged.insert(source.clone(), dest.clone());
    let children = state
        .get_children_ranked(source)
        .into_iter()
        .map(|child| (child.id.clone(), child.value.clone()))
        .collect::<Vec<_>>();
    for (child, value) in children {
        let existing = state
            .find_child_by_value(dest, &value, None)
            .map(|thought| thought.id.clone());
        match existing {
            Some(existing) => merge_thoughts(state, &child, &existing, merged),
            None => {
                let rank = state.get_next_rank(dest);
                relocate(state, &child, source, dest, rank);
            }
        }
    }
    discard_thought(state, source);
    tracing::debug!("[merge_thoughts] merged {source} into {dest}");
}

/// Rewrite a cursor that runs through `old_prefix` so that it runs through `new_prefix`,
/// following merged ids.
pub(crate) fn rewrite_cursor(
    state: &mut State,
    old_prefix: &Path,
    new_prefix: &Path,
    merged: &BTreeMap<ThoughtId, ThoughtId>,
) {
    let Some(cursor) = &state.cursor else {
        return;
    };
    if old_prefix.is_empty() || !cursor.starts_with(old_prefix) {
        return;
    }
    let suffix = cursor[old_prefix.len()..]
        .iter()
        .map(|id| merged.get(id).unwrap_or(id).clone())
        .collect::<Vec<_>>();
    state.cursor = Some(new_prefix.append(suffix));
}

/// Re-parent a thought. If the destination context already holds a thought with the same
/// value, the moved thought is merged into it.
pub fn move_thought(state: &mut State, payload: MoveThought) -> Result<(), OutlineError> {
    let id = payload.old_path.head()?.clone();
    if payload.new_path.head()? != &id {
        return Err(OutlineError::InvalidPath(format!(
            "move destination {} does not end in the moved thought {id}",
            payload.new_path
        )));
    }
    let new_parent_path = payload.new_path.rooted_parent()?;
    let new_parent = new_parent_path.head()?.clone();

    let Some(thought) = state.get_thought(&id) else {
        tracing::warn!("[move_thought] thought {id} is not loaded");
        return Ok(());
    };
    let old_parent = thought.parent_id.clone();
    let value = thought.value.clone();
    if state.get_thought(&new_parent).is_none() {
        tracing::warn!("[move_thought] destination {new_parent} is not loaded");
        return Ok(());
    }

    for attribute in [READONLY, IMMOVABLE] {
        if state.has_attribute(&id, attribute) {
            state.raise_alert(
                AlertKind::Validation,
                format!("\"{value}\" is {}. It cannot be moved.", &attribute[1..]),
            );
            return Ok(());
        }
    }
    if state.is_descendant_or_self(&new_parent, &id) {
        state.raise_alert(
            AlertKind::Validation,
            format!("\"{value}\" cannot be moved into itself."),
        );
        return Ok(());
    }
    let reparent = old_parent != new_parent;
    if reparent && reject_new_child(state, &new_parent) {
        return Ok(());
    }

    let duplicate = reparent
        .then(|| state.find_child_by_value(&new_parent, &value, Some(&id)))
        .flatten()
        .map(|thought| thought.id.clone());

    let mut merged = BTreeMap::new();
    let final_id = match duplicate {
        Some(dest) if subtree_loaded(state, &id) => {
            merge_thoughts(state, &id, &dest, &mut merged);
            dest
        }
        Some(dest) => {
            tracing::warn!(
                "[move_thought] {id} has unloaded descendants; not merging into {dest}"
            );
            relocate(state, &id, &old_parent, &new_parent, payload.new_rank);
            id
        }
        None => {
            relocate(state, &id, &old_parent, &new_parent, payload.new_rank);
            id
        }
    };

    rewrite_cursor(
        state,
        &payload.old_path,
        &new_parent_path.append([final_id]),
        &merged,
    );
    Ok(())
}
