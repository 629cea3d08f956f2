//! The in-memory [State] and the low-level index writes every reducer and the reconciler
//! build on.
//!
//! Each write goes through one of the `put_*`/`take_*` helpers so that the change is
//! recorded twice: in [State::changes] for the store's event stream, and, for
//! [EventOrigin::Local] writes only, in [State::push_batch] for the persistence layer.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::{
    event::{EventOrigin, ThoughtEvent},
    hashing::{hash_thought, HashKey},
    paths::Path,
    properties::{
        Lexeme, SessionId, Thought, ThoughtId, ThoughtIndices, Timestamp, ABSOLUTE_TOKEN,
        EM_TOKEN, HOME_TOKEN, SCHEMA_LATEST,
    },
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertKind {
    /// A mutation was rejected because of a permission attribute or an invalid target.
    Validation,
    /// A persistence or search call failed.
    SyncFailure,
    Info,
}

/// A transient, user-visible notification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub value: String,
    pub kind: AlertKind,
    pub created: Timestamp,
}

/// Local writes not yet sent to the persistence provider. `None` marks a deletion.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PushBatch {
    pub thought_updates: BTreeMap<ThoughtId, Option<Thought>>,
    pub lexeme_updates: BTreeMap<HashKey, Option<Lexeme>>,
    /// Deleted thoughts whose descendants were not loaded. Their remote closure still has to
    /// be fetched and removed.
    pub pending_deletes: BTreeSet<ThoughtId>,
}

impl PushBatch {
    pub fn is_empty(&self) -> bool {
        self.thought_updates.is_empty()
            && self.lexeme_updates.is_empty()
            && self.pending_deletes.is_empty()
    }

    /// Fold an older batch back underneath this one, e.g. after a failed flush. Entries
    /// already present here are newer and win.
    pub fn merge_older(&mut self, older: PushBatch) {
        for (id, thought) in older.thought_updates {
            self.thought_updates.entry(id).or_insert(thought);
        }
        for (key, lexeme) in older.lexeme_updates {
            self.lexeme_updates.entry(key).or_insert(lexeme);
        }
        self.pending_deletes.extend(older.pending_deletes);
    }
}

/// Ids and keys touched since the store last drained them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChangeSet {
    pub thoughts_updated: BTreeSet<ThoughtId>,
    pub thoughts_removed: BTreeSet<ThoughtId>,
    pub lexemes_updated: BTreeSet<HashKey>,
    pub lexemes_removed: BTreeSet<HashKey>,
    pub alert: Option<Alert>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.thoughts_updated.is_empty()
            && self.thoughts_removed.is_empty()
            && self.lexemes_updated.is_empty()
            && self.lexemes_removed.is_empty()
            && self.alert.is_none()
    }

    pub fn into_events(self, origin: EventOrigin) -> Vec<ThoughtEvent> {
        let mut events = Vec::new();
        if !self.thoughts_updated.is_empty() {
            events.push(ThoughtEvent::ThoughtsUpdated(
                self.thoughts_updated.into_iter().collect(),
                origin,
            ));
        }
        if !self.thoughts_removed.is_empty() {
            events.push(ThoughtEvent::ThoughtsRemoved(
                self.thoughts_removed.into_iter().collect(),
                origin,
            ));
        }
        if !self.lexemes_updated.is_empty() {
            events.push(ThoughtEvent::LexemesUpdated(
                self.lexemes_updated.into_iter().collect(),
                origin,
            ));
        }
        if !self.lexemes_removed.is_empty() {
            events.push(ThoughtEvent::LexemesRemoved(
                self.lexemes_removed.into_iter().collect(),
                origin,
            ));
        }
        if let Some(alert) = self.alert {
            events.push(ThoughtEvent::Alert(alert));
        }
        events
    }
}

/// The single shared value threaded through every reducer.
#[derive(Clone, Debug, PartialEq)]
pub struct State {
    pub thoughts: ThoughtIndices,
    /// Thoughts currently browsed by context rather than by children.
    pub context_views: BTreeSet<ThoughtId>,
    pub cursor: Option<Path>,
    pub alert: Option<Alert>,
    pub session_id: SessionId,
    pub schema_version: u32,
    /// Deletion time of every thought deleted in this session.
    pub tombstones: BTreeMap<ThoughtId, Timestamp>,
    pub push_batch: PushBatch,
    pub changes: ChangeSet,
}

impl State {
    /// A fresh state holding the three root sentinels as pending placeholders, stamped at the
    /// beginning of the epoch so that any persisted copy wins reconciliation.
    pub fn initial(session_id: SessionId) -> State {
        let mut thoughts = ThoughtIndices::default();
        for token in [HOME_TOKEN, ABSOLUTE_TOKEN, EM_TOKEN] {
            let mut sentinel = Thought::new(
                ThoughtId::from(token),
                token,
                0.0,
                ThoughtId::root_parent(),
                Timestamp::never(),
                session_id.clone(),
            );
            sentinel.pending = true;
            thoughts.thought_index.insert(sentinel.id.clone(), sentinel);

            let mut lexeme = Lexeme::new(token, Timestamp::now(), session_id.clone());
            lexeme.last_updated = Timestamp::never();
            thoughts.lexeme_index.insert(hash_thought(token), lexeme);
        }
        State {
            thoughts,
            context_views: BTreeSet::new(),
            cursor: None,
            alert: None,
            session_id,
            schema_version: SCHEMA_LATEST,
            tombstones: BTreeMap::new(),
            push_batch: PushBatch::default(),
            changes: ChangeSet::default(),
        }
    }

    pub fn take_changes(&mut self) -> ChangeSet {
        std::mem::take(&mut self.changes)
    }

    pub fn take_push_batch(&mut self) -> PushBatch {
        std::mem::take(&mut self.push_batch)
    }

    pub fn raise_alert(&mut self, kind: AlertKind, value: impl Into<String>) {
        let alert = Alert {
            value: value.into(),
            kind,
            created: Timestamp::now(),
        };
        tracing::debug!("[State::raise_alert] {:?}: {}", alert.kind, alert.value);
        self.changes.alert = Some(alert.clone());
        self.alert = Some(alert);
    }

    /// Forget deletions made at or before `cutoff`, except those still waiting to be pushed.
    /// Returns the number of tombstones removed.
    pub fn prune_tombstones(&mut self, cutoff: Timestamp) -> usize {
        let before = self.tombstones.len();
        let unpushed = &self.push_batch.thought_updates;
        self.tombstones
            .retain(|id, deleted| *deleted > cutoff || unpushed.contains_key(id));
        before - self.tombstones.len()
    }

    pub fn dismiss_alert(&mut self) {
        self.alert = None;
    }

    /// Drop the current alert once it has been visible for `duration_ms`.
    pub fn dismiss_expired_alerts(&mut self, now: Timestamp, duration_ms: u64) -> bool {
        match &self.alert {
            Some(alert) if now.as_millis() - alert.created.as_millis() >= duration_ms as i64 => {
                self.alert = None;
                true
            }
            _ => false,
        }
    }

    /// Insert or replace a thought.
    pub(crate) fn put_thought(&mut self, thought: Thought, origin: EventOrigin) {
        let id = thought.id.clone();
        if origin == EventOrigin::Local {
            self.push_batch
                .thought_updates
                .insert(id.clone(), Some(thought.clone()));
        }
        self.thoughts.thought_index.insert(id.clone(), thought);
        self.changes.thoughts_removed.remove(&id);
        self.changes.thoughts_updated.insert(id);
    }

    pub(crate) fn take_thought(&mut self, id: &ThoughtId, origin: EventOrigin) -> Option<Thought> {
        let removed = self.thoughts.thought_index.remove(id);
        if origin == EventOrigin::Local {
            self.push_batch.thought_updates.insert(id.clone(), None);
        }
        self.changes.thoughts_updated.remove(id);
        self.changes.thoughts_removed.insert(id.clone());
        removed
    }

    pub(crate) fn put_lexeme(&mut self, key: HashKey, lexeme: Lexeme, origin: EventOrigin) {
        if origin == EventOrigin::Local {
            self.push_batch
                .lexeme_updates
                .insert(key.clone(), Some(lexeme.clone()));
        }
        self.thoughts.lexeme_index.insert(key.clone(), lexeme);
        self.changes.lexemes_removed.remove(&key);
        self.changes.lexemes_updated.insert(key);
    }

    pub(crate) fn take_lexeme(&mut self, key: &HashKey, origin: EventOrigin) -> Option<Lexeme> {
        let removed = self.thoughts.lexeme_index.remove(key);
        if origin == EventOrigin::Local {
            self.push_batch.lexeme_updates.insert(key.clone(), None);
        }
        self.changes.lexemes_updated.remove(key);
        self.changes.lexemes_removed.insert(key.clone());
        removed
    }

    /// Apply `update` to a copy of the thought, restamp it and store it as a local write.
    /// Returns false if the thought is not loaded.
    pub(crate) fn update_thought<F>(&mut self, id: &ThoughtId, update: F) -> bool
    where
        F: FnOnce(&mut Thought),
    {
        let Some(mut thought) = self.thoughts.thought_index.get(id).cloned() else {
            return false;
        };
        update(&mut thought);
        thought.last_updated = Timestamp::now();
        thought.updated_by = self.session_id.clone();
        self.put_thought(thought, EventOrigin::Local);
        true
    }

    /// Add `id` to the contexts of the lexeme of `value`, creating the lexeme if needed.
    pub(crate) fn link_lexeme(&mut self, id: &ThoughtId, value: &str, origin: EventOrigin) {
        let key = hash_thought(value);
        let now = Timestamp::now();
        let mut lexeme = self
            .thoughts
            .lexeme_index
            .get(&key)
            .cloned()
            .unwrap_or_else(|| Lexeme::new(value, now, self.session_id.clone()));
        if !lexeme.add_context(id) && self.thoughts.lexeme_index.contains_key(&key) {
            return;
        }
        if origin == EventOrigin::Local {
            lexeme.last_updated = now;
            lexeme.updated_by = self.session_id.clone();
        }
        self.put_lexeme(key, lexeme, origin);
    }

    /// Remove `id` from the contexts of the lexeme of `value`, pruning the lexeme once its
    /// context list is empty. Returns false if the lexeme did not list `id`.
    pub(crate) fn unlink_lexeme(&mut self, id: &ThoughtId, value: &str, origin: EventOrigin) -> bool {
        let key = hash_thought(value);
        let Some(mut lexeme) = self.thoughts.lexeme_index.get(&key).cloned() else {
            return false;
        };
        if !lexeme.remove_context(id) {
            return false;
        }
        if lexeme.contexts.is_empty() {
            self.take_lexeme(&key, origin);
        } else {
            if origin == EventOrigin::Local {
                lexeme.last_updated = Timestamp::now();
                lexeme.updated_by = self.session_id.clone();
            }
            self.put_lexeme(key, lexeme, origin);
        }
        true
    }

    /// Create a thought under `parent_id`, register it with its parent and its lexeme, and
    /// return its id. The parent must be loaded.
    pub(crate) fn create_thought(
        &mut self,
        parent_id: &ThoughtId,
        value: &str,
        rank: f64,
        id: Option<ThoughtId>,
        stamp: Option<(Timestamp, SessionId)>,
    ) -> ThoughtId {
        let id = id.unwrap_or_default();
        let (last_updated, updated_by) =
            stamp.unwrap_or_else(|| (Timestamp::now(), self.session_id.clone()));
        let thought = Thought::new(
            id.clone(),
            value,
            rank,
            parent_id.clone(),
            last_updated,
            updated_by,
        );
        self.put_thought(thought, EventOrigin::Local);
        self.update_thought(parent_id, |parent| parent.add_child(&id, value));
        self.link_lexeme(&id, value, EventOrigin::Local);
        id
    }

    /// Reassign ranks `0..n` to the children of `parent_id` in their current order. Used when
    /// floating point interpolation runs out of room between two neighbours.
    pub(crate) fn rerank_children(&mut self, parent_id: &ThoughtId) {
        let ids = self
            .get_children_ranked(parent_id)
            .into_iter()
            .map(|child| child.id.clone())
            .collect::<Vec<_>>();
        tracing::debug!(
            "[State::rerank_children] renumbering {} children of {parent_id}",
            ids.len()
        );
        for (rank, id) in ids.iter().enumerate() {
            self.update_thought(id, |child| child.rank = rank as f64);
        }
    }
}
