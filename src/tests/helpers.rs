//! Shared test utilities for building outlines

use crate::{
    paths::Path,
    properties::{SessionId, ThoughtId},
    state::State,
};

/// Initialize logging for tests
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

pub fn test_session() -> SessionId {
    SessionId::from("test-session")
}

/// An initial state whose root sentinels are loaded, as if a provider had returned them empty.
pub fn loaded_state() -> State {
    let mut state = State::initial(test_session());
    for thought in state.thoughts.thought_index.values_mut() {
        thought.pending = false;
    }
    state
}

/// Build an outline from lines indented by two spaces per level, e.g.
/// `&["a", "  b", "c"]`. Thoughts are ranked in line order. Pending changes and the push
/// batch are cleared so tests start from a settled state.
pub fn outline(lines: &[&str]) -> State {
    let mut state = loaded_state();
    let mut stack: Vec<ThoughtId> = Vec::new();
    for line in lines {
        let depth = (line.len() - line.trim_start().len()) / 2;
        stack.truncate(depth);
        let parent = stack.last().cloned().unwrap_or_else(ThoughtId::root);
        let rank = state.get_next_rank(&parent);
        let id = state.create_thought(&parent, line.trim(), rank, None, None);
        stack.push(id);
    }
    state.take_changes();
    state.take_push_batch();
    state
}

/// Path of the thought reached by following `values` from the home context.
pub fn path_to(state: &State, values: &[&str]) -> Path {
    state
        .context_to_path(values)
        .unwrap_or_else(|| panic!("no thought at {values:?}"))
        .into()
}

pub fn id_of(state: &State, values: &[&str]) -> ThoughtId {
    state
        .context_to_thought_id(values)
        .unwrap_or_else(|| panic!("no thought at {values:?}"))
}

/// Values of the children of the thought at `values`, in rank order.
pub fn ranked_values(state: &State, values: &[&str]) -> Vec<String> {
    state
        .get_children_ranked(&id_of(state, values))
        .into_iter()
        .map(|child| child.value.clone())
        .collect()
}

/// Assert that every loaded thought is listed by the lexeme of its value and that every
/// lexeme context that is loaded has a matching value.
pub fn assert_lexemes_consistent(state: &State) {
    for thought in state.thoughts.thought_index.values() {
        if thought.id.is_root_sentinel() {
            continue;
        }
        assert!(
            state.get_contexts(&thought.value).contains(&thought.id),
            "{} ({:?}) is missing from its lexeme",
            thought.id,
            thought.value
        );
    }
    for (key, lexeme) in &state.thoughts.lexeme_index {
        for id in &lexeme.contexts {
            if let Some(thought) = state.get_thought(id) {
                assert_eq!(
                    crate::hashing::hash_thought(&thought.value),
                    *key,
                    "{id} is listed by the lexeme {:?}",
                    lexeme.lemma
                );
            } else {
                assert!(
                    !state.tombstones.contains_key(id),
                    "deleted {id} is still listed by {:?}",
                    lexeme.lemma
                );
            }
        }
    }
}
