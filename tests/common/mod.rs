//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use outline_core::{
    config::OutlineConfig,
    paths::Path,
    properties::{SessionId, ThoughtId},
    reducers::{Action, ImportText},
    state::{State, Store},
    sync::{MemoryProvider, SyncQueue},
};
use std::sync::Arc;

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times. Subsequent calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// A store over a new, empty outline whose roots are loaded.
#[allow(dead_code)]
pub fn empty_store(session: &str) -> Store {
    let mut state = State::initial(SessionId::from(session));
    for thought in state.thoughts.thought_index.values_mut() {
        thought.pending = false;
    }
    Store::new(state)
}

/// Import indented `- value` lines into the home context.
#[allow(dead_code)]
pub fn import_outline(store: &Store, text: &str) {
    store
        .dispatch(Action::ImportText(ImportText {
            path: Some(Path::home()),
            text: text.into(),
            ..Default::default()
        }))
        .unwrap();
}

#[allow(dead_code)]
pub fn id_of(store: &Store, values: &[&str]) -> ThoughtId {
    store
        .get_state()
        .context_to_thought_id(values)
        .unwrap_or_else(|| panic!("no thought at {values:?}"))
}

#[allow(dead_code)]
pub fn path_to(store: &Store, values: &[&str]) -> Path {
    store
        .get_state()
        .context_to_path(values)
        .unwrap_or_else(|| panic!("no thought at {values:?}"))
        .into()
}

/// Child values of the thought at `values`, in rank order.
#[allow(dead_code)]
pub fn ranked_values(store: &Store, values: &[&str]) -> Vec<String> {
    let state = store.get_state();
    let id = state
        .context_to_thought_id(values)
        .unwrap_or_else(|| panic!("no thought at {values:?}"));
    state
        .get_children_ranked(&id)
        .into_iter()
        .map(|child| child.value.clone())
        .collect()
}

/// A sync queue for one device sharing `provider` with other devices.
#[allow(dead_code)]
pub fn device(provider: &Arc<MemoryProvider>, session: &str) -> SyncQueue<MemoryProvider> {
    SyncQueue::from_config(
        provider.clone(),
        OutlineConfig {
            session_id: Some(session.to_string()),
            ..Default::default()
        },
    )
}
