use futures::{StreamExt, TryStreamExt};
use std::{
    collections::{BTreeMap, BTreeSet},
    pin::pin,
    sync::Arc,
};

use crate::{
    config::OutlineConfig,
    error::OutlineError,
    event::EventOrigin,
    hashing::hash_thought,
    paths::Path,
    properties::{SessionId, ThoughtId, ThoughtIndices, Timestamp},
    reducers::{Action, DeleteThought},
    search::{get_context_map, SearchIndex},
    state::{AlertKind, PushBatch, State, Store},
    sync::{get_descendant_thoughts, get_many_descendants, reconcile, DataProvider, PullOptions},
};

/// Moves data between a [Store] and a [DataProvider].
///
/// Pulls stream fragments into [Store::reconcile] as they arrive; pushes drain the store's
/// [PushBatch]. Provider failures never leave the store half-updated: they are logged, shown
/// as a [AlertKind::SyncFailure] alert and returned to the caller.
pub struct SyncQueue<P> {
    provider: Arc<P>,
    store: Arc<Store>,
    config: OutlineConfig,
}

impl<P: DataProvider> SyncQueue<P> {
    pub fn new(provider: Arc<P>, store: Arc<Store>, config: OutlineConfig) -> Self {
        SyncQueue {
            provider,
            store,
            config,
        }
    }

    /// Create a fresh store for the configured session.
    pub fn from_config(provider: Arc<P>, config: OutlineConfig) -> Self {
        let session_id = config
            .session_id
            .as_deref()
            .map(SessionId::from)
            .unwrap_or_default();
        let mut state = State::initial(session_id);
        state.schema_version = config.schema_version;
        SyncQueue::new(provider, Arc::new(Store::new(state)), config)
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    pub fn config(&self) -> &OutlineConfig {
        &self.config
    }

    fn fail(&self, operation: &str, e: OutlineError) -> OutlineError {
        tracing::error!("[SyncQueue::{operation}] {} failed: {e}", self.provider.name());
        let message = format!("Could not {operation}: {e}");
        self.store
            .update(EventOrigin::Remote, |state| {
                state.raise_alert(AlertKind::SyncFailure, message);
                Ok(())
            })
            .ok();
        e
    }

    /// Default options for user-driven pulls.
    pub fn pull_options(&self) -> PullOptions {
        PullOptions::with_max_depth(self.config.max_depth)
    }

    /// Load the subtrees below `ids` and reconcile every fragment as it arrives. Returns the
    /// number of fragments applied.
    #[tracing::instrument(skip(self))]
    pub async fn pull(&self, ids: Vec<ThoughtId>, opts: PullOptions) -> Result<usize, OutlineError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let store = self.store.clone();
        let get_state = move || store.get_state();
        let mut fragments = pin!(get_many_descendants(
            self.provider.as_ref(),
            ids,
            get_state,
            opts
        ));
        let mut applied = 0;
        while let Some(fragment) = fragments.next().await {
            match fragment {
                Ok(fragment) => {
                    self.store.reconcile(fragment);
                    applied += 1;
                }
                Err(e) => return Err(self.fail("pull", e)),
            }
        }
        tracing::debug!("[SyncQueue::pull] applied {applied} fragments");
        Ok(applied)
    }

    /// Load the three roots. The settings root is loaded completely.
    ///
    /// Roots the provider does not know about belong to a new outline. They stop being
    /// placeholders and are saved on the next flush.
    pub async fn initialize(&self) -> Result<usize, OutlineError> {
        let roots = vec![ThoughtId::root(), ThoughtId::em(), ThoughtId::absolute()];
        let applied = self.pull(roots.clone(), self.pull_options()).await?;
        self.store.update(EventOrigin::Local, |state| {
            for id in &roots {
                if state.get_thought(id).is_some_and(|root| root.pending) {
                    tracing::info!("[SyncQueue::initialize] creating {id}");
                    state.update_thought(id, |root| root.pending = false);
                }
            }
            Ok(())
        })?;
        Ok(applied)
    }

    /// Load every thought that is still a pending placeholder.
    pub async fn pull_pending(&self) -> Result<usize, OutlineError> {
        let pending = self.store.get_state().pending_ids();
        self.pull(
            pending,
            PullOptions {
                prevent_loading_ancestors: true,
                ..self.pull_options()
            },
        )
        .await
    }

    /// Fetch everything the provider stores below `id`, without touching the store.
    async fn remote_closure(&self, id: &ThoughtId) -> Result<ThoughtIndices, OutlineError> {
        let empty = Arc::new(State::initial(SessionId::default()));
        let get_state = move || empty.clone();
        let fragments = get_descendant_thoughts(
            self.provider.as_ref(),
            id.clone(),
            get_state,
            PullOptions {
                max_depth: None,
                prevent_loading_ancestors: true,
            },
        )
        .try_collect::<Vec<_>>()
        .await?;
        let mut closure = ThoughtIndices::default();
        for fragment in fragments {
            closure.thought_index.extend(fragment.thought_index);
            closure.lexeme_index.extend(fragment.lexeme_index);
        }
        Ok(closure)
    }

    /// Expand the batch's pending deletes into deletions of their remote closure, and drop the
    /// deleted ids from the lexemes that list them.
    async fn expand_pending_deletes(
        &self,
        batch: &PushBatch,
    ) -> Result<(PushBatch, BTreeSet<ThoughtId>), OutlineError> {
        let mut expanded = batch.clone();
        let mut deleted = BTreeSet::new();
        for id in &batch.pending_deletes {
            let closure = self.remote_closure(id).await?;
            let state = self.store.get_state();
            for thought in closure.thought_index.values() {
                deleted.insert(thought.id.clone());
                expanded
                    .thought_updates
                    .entry(thought.id.clone())
                    .or_insert(None);

                let key = hash_thought(&thought.value);
                let lexeme = match expanded.lexeme_updates.get(&key) {
                    Some(Some(lexeme)) => Some(lexeme.clone()),
                    Some(None) => None,
                    None => state
                        .get_lexeme_by_key(&key)
                        .or_else(|| closure.lexeme_index.get(&key))
                        .cloned(),
                };
                let Some(mut lexeme) = lexeme else {
                    continue;
                };
                if !lexeme.remove_context(&thought.id) {
                    continue;
                }
                let update = match lexeme.contexts.is_empty() {
                    true => None,
                    false => Some(lexeme),
                };
                expanded.lexeme_updates.insert(key, update);
            }
        }
        expanded.pending_deletes.clear();
        Ok((expanded, deleted))
    }

    /// Fold the provider's copy of every outgoing lexeme into the batch.
    ///
    /// A device only knows the contexts of the thoughts it has loaded, so a lexeme written from
    /// local state alone would drop placements made elsewhere. Remote contexts are kept unless
    /// this batch deletes them, moves them to another lexeme, or they are tombstoned.
    async fn merge_remote_lexemes(&self, batch: &mut PushBatch) -> Result<(), OutlineError> {
        let keys = batch.lexeme_updates.keys().cloned().collect::<Vec<_>>();
        if keys.is_empty() {
            return Ok(());
        }
        let remote = self.provider.get_lexemes_by_ids(&keys).await?;
        let state = self.store.get_state();
        for (key, remote) in keys.into_iter().zip(remote) {
            let Some(remote) = remote else {
                continue;
            };
            let superseded = |id: &ThoughtId| {
                state.tombstones.contains_key(id)
                    || match batch.thought_updates.get(id) {
                        Some(Some(thought)) => hash_thought(&thought.value) != key,
                        Some(None) => true,
                        None => false,
                    }
            };
            let kept = remote
                .contexts
                .iter()
                .filter(|id| !superseded(*id))
                .cloned()
                .collect::<Vec<_>>();
            let Some(update) = batch.lexeme_updates.get_mut(&key) else {
                continue;
            };
            match update {
                Some(lexeme) => {
                    for id in &kept {
                        lexeme.add_context(id);
                    }
                }
                None if kept.is_empty() => {}
                None => {
                    tracing::debug!(
                        "[SyncQueue::flush] keeping {key}: {} contexts remain remotely",
                        kept.len()
                    );
                    let mut lexeme = remote;
                    lexeme.contexts = kept;
                    lexeme.last_updated = Timestamp::now();
                    lexeme.updated_by = state.session_id.clone();
                    *update = Some(lexeme);
                }
            }
        }
        Ok(())
    }

    /// Push every local write to the provider. On failure the writes stay queued for the next
    /// flush. Returns the number of entries written.
    #[tracing::instrument(skip(self))]
    pub async fn flush(&self) -> Result<usize, OutlineError> {
        let batch = self.store.take_push_batch();
        if batch.is_empty() {
            return Ok(0);
        }
        let pushed = async {
            let (mut expanded, deleted) = self.expand_pending_deletes(&batch).await?;
            self.merge_remote_lexemes(&mut expanded).await?;
            self.provider
                .update_thoughts(
                    &expanded.thought_updates,
                    &expanded.lexeme_updates,
                    self.config.schema_version,
                )
                .await?;
            Ok::<_, OutlineError>((expanded, deleted))
        }
        .await;

        match pushed {
            Ok((expanded, deleted)) => {
                let written_lexemes = ThoughtIndices {
                    thought_index: Default::default(),
                    lexeme_index: expanded
                        .lexeme_updates
                        .iter()
                        .filter_map(|(key, lexeme)| Some((key.clone(), lexeme.clone()?)))
                        .collect(),
                };
                let ttl = self.config.tombstone_ttl_ms as i64;
                self.store
                    .update(EventOrigin::Remote, |state| {
                        let now = Timestamp::now();
                        for id in deleted {
                            state.tombstones.entry(id).or_insert(now);
                        }
                        // Contexts learned from the provider while merging.
                        reconcile(state, written_lexemes);
                        let cutoff = Timestamp::from_millis(now.as_millis() - ttl);
                        let pruned = state.prune_tombstones(cutoff);
                        if pruned > 0 {
                            tracing::debug!("[SyncQueue::flush] forgot {pruned} tombstones");
                        }
                        Ok(())
                    })
                    .ok();
                let written = expanded.thought_updates.len() + expanded.lexeme_updates.len();
                tracing::debug!("[SyncQueue::flush] wrote {written} entries");
                Ok(written)
            }
            Err(e) => {
                self.store.restore_push_batch(batch);
                Err(self.fail("save changes", e))
            }
        }
    }

    /// Delete a thought after loading its descendants so the delete can cascade locally.
    ///
    /// Pulls are repeated while pending descendants remain, at most
    /// [OutlineConfig::delete_pull_cutoff] times. Whatever is still unloaded afterwards is
    /// removed remotely on the next [SyncQueue::flush].
    pub async fn delete_thought(&self, path_parent: Path, id: ThoughtId) -> Result<(), OutlineError> {
        for round in 0..self.config.delete_pull_cutoff {
            let state = self.store.get_state();
            let pending = state
                .pending_ids()
                .into_iter()
                .filter(|pending| state.is_descendant_or_self(pending, &id))
                .collect::<Vec<_>>();
            if pending.is_empty() {
                break;
            }
            tracing::debug!(
                "[SyncQueue::delete_thought] round {round}: loading {} pending descendants of {id}",
                pending.len()
            );
            if let Err(e) = self
                .pull(
                    pending,
                    PullOptions {
                        max_depth: None,
                        prevent_loading_ancestors: true,
                    },
                )
                .await
            {
                tracing::warn!("[SyncQueue::delete_thought] deleting {id} with unloaded descendants: {e}");
                break;
            }
        }
        self.store.dispatch(Action::DeleteThought(DeleteThought {
            path_parent,
            thought_id: id,
        }))
    }

    /// Search a remote index, load the matching lexemes and their contexts, and group the
    /// matches by parent.
    #[tracing::instrument(skip(self, index))]
    pub async fn remote_search<I: SearchIndex>(
        &self,
        index: &I,
        query: &str,
    ) -> Result<BTreeMap<ThoughtId, BTreeSet<ThoughtId>>, OutlineError> {
        let keys = match index.search(query).await {
            Ok(keys) => keys,
            Err(e) => return Err(self.fail("search", e)),
        };
        let lexemes = match self.provider.get_lexemes_by_ids(&keys).await {
            Ok(lexemes) => lexemes,
            Err(e) => return Err(self.fail("search", e)),
        };

        let mut fragment = ThoughtIndices::default();
        let state = self.store.get_state();
        let mut missing = BTreeSet::new();
        for (key, lexeme) in keys.iter().zip(lexemes) {
            let Some(lexeme) = lexeme else {
                tracing::debug!("[SyncQueue::remote_search] lexeme {key} is missing");
                continue;
            };
            missing.extend(
                lexeme
                    .contexts
                    .iter()
                    .filter(|id| state.get_thought(id).is_none())
                    .cloned(),
            );
            fragment.lexeme_index.insert(key.clone(), lexeme);
        }
        let missing = missing.into_iter().collect::<Vec<_>>();
        let thoughts = match self.provider.get_thoughts_by_ids(&missing).await {
            Ok(thoughts) => thoughts,
            Err(e) => return Err(self.fail("search", e)),
        };
        for mut thought in thoughts.into_iter().flatten() {
            thought.pending = true;
            fragment.thought_index.insert(thought.id.clone(), thought);
        }
        self.store.reconcile(fragment);
        Ok(get_context_map(&self.store.get_state(), &keys))
    }
}
