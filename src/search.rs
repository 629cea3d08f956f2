//! Lexeme search.
//!
//! The local baseline scans the loaded lexeme index. A [SearchIndex] stands in for an external
//! full-text index; its results are resolved and reconciled by
//! [crate::sync::SyncQueue::remote_search].

use std::{
    collections::{BTreeMap, BTreeSet},
    future::Future,
};

use crate::{
    error::OutlineError,
    hashing::{normalize_value, HashKey},
    properties::{ThoughtId, ABSOLUTE_TOKEN, EM_TOKEN, HOME_TOKEN},
    state::State,
};

/// Remote full-text index over lemmas.
pub trait SearchIndex: Sync {
    /// Keys of the lexemes matching `query`.
    fn search(&self, query: &str) -> impl Future<Output = Result<Vec<HashKey>, OutlineError>> + Send;
}

/// Keys of the loaded lexemes whose normalized lemma contains the normalized query.
pub fn search_lexemes(state: &State, query: &str) -> Vec<HashKey> {
    let query = normalize_value(query);
    if query.is_empty() {
        return Vec::new();
    }
    state
        .thoughts
        .lexeme_index
        .iter()
        .filter(|(_, lexeme)| !matches!(lexeme.lemma.as_str(), HOME_TOKEN | EM_TOKEN | ABSOLUTE_TOKEN))
        .filter(|(_, lexeme)| normalize_value(&lexeme.lemma).contains(&query))
        .map(|(key, _)| key.clone())
        .collect()
}

/// Group the contexts of the given lexemes by parent.
///
/// Maps each parent id to the ids of its children that matched. Contexts whose thought is not
/// loaded are skipped.
pub fn get_context_map(state: &State, keys: &[HashKey]) -> BTreeMap<ThoughtId, BTreeSet<ThoughtId>> {
    let mut map: BTreeMap<ThoughtId, BTreeSet<ThoughtId>> = BTreeMap::new();
    for lexeme in keys.iter().filter_map(|key| state.get_lexeme_by_key(key)) {
        for id in &lexeme.contexts {
            match state.get_thought(id) {
                Some(thought) => {
                    map.entry(thought.parent_id.clone())
                        .or_default()
                        .insert(id.clone());
                }
                None => tracing::debug!("[get_context_map] context {id} is not loaded"),
            }
        }
    }
    map
}
