use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, future::Future};

use crate::{
    error::OutlineError,
    hashing::HashKey,
    properties::{Lexeme, Thought, ThoughtId},
};

/// A thought together with its loaded children.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThoughtWithChildren {
    pub thought: Thought,
    pub children: BTreeMap<ThoughtId, Thought>,
}

/// A persistence backend the thought graph is pulled from and pushed to.
///
/// Providers are treated as possibly stale caches: whatever they return is merged through
/// [crate::sync::reconcile] and never written into the state directly. Only the single-item
/// lookups and the write methods are required; the batch lookups default to sequential calls.
pub trait DataProvider: Sync {
    fn name(&self) -> &str {
        "provider"
    }

    fn get_thought_by_id(
        &self,
        id: &ThoughtId,
    ) -> impl Future<Output = Result<Option<Thought>, OutlineError>> + Send;

    fn get_thoughts_by_ids(
        &self,
        ids: &[ThoughtId],
    ) -> impl Future<Output = Result<Vec<Option<Thought>>, OutlineError>> + Send {
        async move {
            let mut thoughts = Vec::with_capacity(ids.len());
            for id in ids {
                thoughts.push(self.get_thought_by_id(id).await?);
            }
            Ok(thoughts)
        }
    }

    fn get_thought_with_children(
        &self,
        id: &ThoughtId,
    ) -> impl Future<Output = Result<Option<ThoughtWithChildren>, OutlineError>> + Send {
        async move {
            let Some(thought) = self.get_thought_by_id(id).await? else {
                return Ok(None);
            };
            let ids = thought.child_ids().cloned().collect::<Vec<_>>();
            let children = self
                .get_thoughts_by_ids(&ids)
                .await?
                .into_iter()
                .flatten()
                .map(|child| (child.id.clone(), child))
                .collect();
            Ok(Some(ThoughtWithChildren { thought, children }))
        }
    }

    fn get_lexeme_by_id(
        &self,
        key: &HashKey,
    ) -> impl Future<Output = Result<Option<Lexeme>, OutlineError>> + Send;

    fn get_lexemes_by_ids(
        &self,
        keys: &[HashKey],
    ) -> impl Future<Output = Result<Vec<Option<Lexeme>>, OutlineError>> + Send {
        async move {
            let mut lexemes = Vec::with_capacity(keys.len());
            for key in keys {
                lexemes.push(self.get_lexeme_by_id(key).await?);
            }
            Ok(lexemes)
        }
    }

    /// Apply a batch of writes. A `None` value deletes the entry.
    fn update_thoughts(
        &self,
        thought_updates: &BTreeMap<ThoughtId, Option<Thought>>,
        lexeme_updates: &BTreeMap<HashKey, Option<Lexeme>>,
        schema_version: u32,
    ) -> impl Future<Output = Result<(), OutlineError>> + Send;

    fn clear_all(&self) -> impl Future<Output = Result<(), OutlineError>> + Send;
}
