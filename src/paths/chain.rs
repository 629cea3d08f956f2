//! Context-view aware path resolution.
//!
//! A thought with an active context view lists every placement of its lexeme as its
//! children. Navigating into one of them re-enters the ordinary tree somewhere else, so a
//! [Path] may jump between unrelated branches. [split_chain] recovers the ordinary
//! ([SimplePath]) pieces of such a path.

use crate::{
    error::OutlineError,
    paths::{head, Path, SimplePath},
    properties::{Thought, ThoughtId},
    state::State,
};

/// True if the last thought of `path` is browsed by context.
pub fn is_context_view_active(state: &State, path: &[ThoughtId]) -> bool {
    path.last()
        .map(|id| state.context_views.contains(id))
        .unwrap_or(false)
}

/// Children of a thought as they appear in its context view: every placement of its
/// lexeme, in lexeme order.
pub fn context_view_children<'a>(state: &'a State, id: &ThoughtId) -> Vec<&'a Thought> {
    let Some(thought) = state.get_thought(id) else {
        return Vec::new();
    };
    state
        .get_contexts(&thought.value)
        .iter()
        .filter_map(|context| state.get_thought(context))
        .collect()
}

/// Children of the last thought of `path`, honouring its context view.
pub fn get_children_of_path<'a>(
    state: &'a State,
    path: &Path,
) -> Result<Vec<&'a Thought>, OutlineError> {
    let id = path.head()?;
    Ok(match is_context_view_active(state, path) {
        true => context_view_children(state, id),
        false => state.get_children_sorted(id),
    })
}

/// Split a path at every context-view boundary.
///
/// Every element is appended to the current segment. When the element at position `i` has
/// an active context view and is not last, the next element is one of the placements of its
/// lexeme; a new segment is started, seeded with the ancestors of that placement. A placement
/// that cannot be found (deleted, or not loaded) seeds an empty segment. A path whose thoughts
/// are not all loaded yields a single empty segment.
///
/// ```rust
/// # use outline_core::{paths::{split_chain, Path}, properties::SessionId, state::State};
/// let state = State::initial(SessionId::from("doc"));
/// assert_eq!(split_chain(&state, &Path::home()).len(), 1);
/// ```
pub fn split_chain(state: &State, path: &Path) -> Vec<SimplePath> {
    let mut chain = vec![SimplePath::default()];
    let thoughts = path
        .iter()
        .map(|id| state.get_thought(id))
        .collect::<Option<Vec<_>>>();
    let Some(thoughts) = thoughts else {
        return chain;
    };

    for (i, id) in path.iter().enumerate() {
        if let Some(segment) = chain.last_mut() {
            segment.push(id.clone());
        }
        if i + 1 < path.len() && is_context_view_active(state, &path[..=i]) {
            let next = thoughts[i + 1];
            let matching = (i > 0)
                .then(|| state.get_contexts(&next.value))
                .unwrap_or_default()
                .into_iter()
                .find(|context| *context == next.id);
            let seed = match matching {
                Some(context) => state.thought_to_path(&context).parent(),
                None => {
                    tracing::debug!(
                        "[split_chain] no context matches {} below {id}, emitting empty segment",
                        next.id
                    );
                    SimplePath::default()
                }
            };
            chain.push(seed);
        }
    }
    chain
}

/// The direct-ancestor chain equivalent of a path.
///
/// Uses the last segment of [split_chain] when the path crosses a context view, and falls
/// back to a parent walk from the head when the chain cannot be resolved.
pub fn simplify_path(state: &State, path: &Path) -> Result<SimplePath, OutlineError> {
    let id = head(path)?;
    let mut chain = split_chain(state, path);
    match chain.pop() {
        Some(last) if chain.is_empty() && !last.is_empty() => Ok(last),
        Some(last) if !last.is_empty() && last.last() == Some(id) => Ok(last),
        _ => Ok(state.thought_to_path(id)),
    }
}
