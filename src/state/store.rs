use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

use crate::{
    error::OutlineError,
    event::{EventOrigin, ThoughtEvent},
    properties::ThoughtIndices,
    reducers::{reduce, Action},
    state::{PushBatch, State},
    sync::reconcile,
};

/// Owner of the current [State].
///
/// Readers receive an `Arc<State>` snapshot that never changes underneath them. Writers run
/// on a copy-on-write clone and swap it in only if the whole transition succeeds, so a failing
/// reducer leaves the published state untouched.
#[derive(Debug)]
pub struct Store {
    state: RwLock<Arc<State>>,
    tx: Option<UnboundedSender<ThoughtEvent>>,
}

impl Store {
    pub fn new(state: State) -> Store {
        Store {
            state: RwLock::new(Arc::new(state)),
            tx: None,
        }
    }

    /// Emit a [ThoughtEvent] for every committed change on `tx`.
    pub fn with_events(mut self, tx: UnboundedSender<ThoughtEvent>) -> Store {
        self.tx = Some(tx);
        self
    }

    pub fn get_state(&self) -> Arc<State> {
        self.state.read().clone()
    }

    /// Run a reducer. On error the state is left exactly as it was.
    pub fn dispatch(&self, action: Action) -> Result<(), OutlineError> {
        tracing::debug!("[Store::dispatch] {}", action.name());
        self.update(EventOrigin::Local, |state| reduce(state, action))
    }

    /// Merge a fragment fetched from a persistence provider.
    pub fn reconcile(&self, fragment: ThoughtIndices) {
        self.update(EventOrigin::Remote, |state| {
            reconcile(state, fragment);
            Ok(())
        })
        .ok();
    }

    /// Drain local writes for the persistence provider.
    pub fn take_push_batch(&self) -> PushBatch {
        let mut guard = self.state.write();
        if guard.push_batch.is_empty() {
            return PushBatch::default();
        }
        Arc::make_mut(&mut guard).take_push_batch()
    }

    /// Put a batch back after a failed push. Writes made since it was taken take precedence.
    pub fn restore_push_batch(&self, batch: PushBatch) {
        let mut guard = self.state.write();
        Arc::make_mut(&mut guard).push_batch.merge_older(batch);
    }

    /// Apply an arbitrary transition, e.g. raising an alert from the sync layer.
    pub fn update<F>(&self, origin: EventOrigin, transition: F) -> Result<(), OutlineError>
    where
        F: FnOnce(&mut State) -> Result<(), OutlineError>,
    {
        let changes = {
            let mut guard = self.state.write();
            let mut next = Arc::clone(&guard);
            let state = Arc::make_mut(&mut next);
            transition(state)?;
            let changes = state.take_changes();
            *guard = next;
            changes
        };
        if let Some(tx) = &self.tx {
            for event in changes.into_events(origin) {
                if let Err(e) = tx.send(event) {
                    tracing::warn!("[Store] event receiver dropped: {}", OutlineError::from(e));
                    break;
                }
            }
        }
        Ok(())
    }
}
