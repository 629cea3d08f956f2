use parking_lot::RwLock;
use std::{
    collections::BTreeMap,
    future::Future,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

use crate::{
    error::OutlineError,
    hashing::{normalize_value, HashKey},
    properties::{Lexeme, Thought, ThoughtId, ThoughtIndices},
    search::SearchIndex,
    sync::DataProvider,
};

/// A [DataProvider] backed by in-process maps.
///
/// Used as the reference provider in tests and as a local cache in front of slower backends.
/// It can be switched offline to exercise failure handling.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    thoughts: RwLock<BTreeMap<ThoughtId, Thought>>,
    lexemes: RwLock<BTreeMap<HashKey, Lexeme>>,
    offline: AtomicBool,
    reads: AtomicUsize,
}

impl MemoryProvider {
    pub fn new() -> Self {
        MemoryProvider::default()
    }

    pub fn from_indices(indices: ThoughtIndices) -> Self {
        MemoryProvider {
            thoughts: RwLock::new(indices.thought_index),
            lexemes: RwLock::new(indices.lexeme_index),
            ..Default::default()
        }
    }

    /// Copy of everything stored.
    pub fn snapshot(&self) -> ThoughtIndices {
        ThoughtIndices {
            thought_index: self.thoughts.read().clone(),
            lexeme_index: self.lexemes.read().clone(),
        }
    }

    /// While offline every call fails with [OutlineError::Sync].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of entries read so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn check_online(&self) -> Result<(), OutlineError> {
        match self.offline.load(Ordering::SeqCst) {
            true => Err(OutlineError::Sync(format!("{} is offline", self.name()))),
            false => Ok(()),
        }
    }

    fn read_thought(&self, id: &ThoughtId) -> Result<Option<Thought>, OutlineError> {
        self.check_online()?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.thoughts.read().get(id).cloned())
    }

    fn read_lexeme(&self, key: &HashKey) -> Result<Option<Lexeme>, OutlineError> {
        self.check_online()?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.lexemes.read().get(key).cloned())
    }
}

impl DataProvider for MemoryProvider {
    fn name(&self) -> &str {
        "memory"
    }

    fn get_thought_by_id(
        &self,
        id: &ThoughtId,
    ) -> impl Future<Output = Result<Option<Thought>, OutlineError>> + Send {
        let result = self.read_thought(id);
        async move { result }
    }

    fn get_thoughts_by_ids(
        &self,
        ids: &[ThoughtId],
    ) -> impl Future<Output = Result<Vec<Option<Thought>>, OutlineError>> + Send {
        let result = ids
            .iter()
            .map(|id| self.read_thought(id))
            .collect::<Result<Vec<_>, _>>();
        async move { result }
    }

    fn get_lexeme_by_id(
        &self,
        key: &HashKey,
    ) -> impl Future<Output = Result<Option<Lexeme>, OutlineError>> + Send {
        let result = self.read_lexeme(key);
        async move { result }
    }

    fn update_thoughts(
        &self,
        thought_updates: &BTreeMap<ThoughtId, Option<Thought>>,
        lexeme_updates: &BTreeMap<HashKey, Option<Lexeme>>,
        schema_version: u32,
    ) -> impl Future<Output = Result<(), OutlineError>> + Send {
        let result = self.check_online().map(|_| {
            tracing::debug!(
                "[MemoryProvider] writing {} thoughts and {} lexemes (schema {schema_version})",
                thought_updates.len(),
                lexeme_updates.len()
            );
            let mut thoughts = self.thoughts.write();
            for (id, update) in thought_updates {
                match update {
                    Some(thought) => thoughts.insert(id.clone(), thought.clone()),
                    None => thoughts.remove(id),
                };
            }
            let mut lexemes = self.lexemes.write();
            for (key, update) in lexeme_updates {
                match update {
                    Some(lexeme) => lexemes.insert(key.clone(), lexeme.clone()),
                    None => lexemes.remove(key),
                };
            }
        });
        async move { result }
    }

    fn clear_all(&self) -> impl Future<Output = Result<(), OutlineError>> + Send {
        let result = self.check_online().map(|_| {
            self.thoughts.write().clear();
            self.lexemes.write().clear();
        });
        async move { result }
    }
}

impl SearchIndex for MemoryProvider {
    fn search(&self, query: &str) -> impl Future<Output = Result<Vec<HashKey>, OutlineError>> + Send {
        let query = normalize_value(query);
        let result = self.check_online().map(|_| {
            match query.is_empty() {
                true => Vec::new(),
                false => self
                    .lexemes
                    .read()
                    .iter()
                    .filter(|(_, lexeme)| normalize_value(&lexeme.lemma).contains(&query))
                    .map(|(key, _)| key.clone())
                    .collect(),
            }
        });
        async move { result }
    }
}
