//! # outline-core
//!
//! The data core of an outliner: a graph of ranked thoughts, a deduplicated lexeme index over
//! their values, context views across that index, bulk import, and lazy synchronization with a
//! persistence provider.
//!
//! ## Overview
//!
//! An outline is a tree of [`properties::Thought`]s. Each thought is one *placement* of a value:
//! the same text may appear under many parents, and every placement is its own thought with its
//! own id, rank and children. All placements whose values normalize to the same text share one
//! [`properties::Lexeme`], which lists them as its *contexts*. The two indices are kept in step by
//! every mutation: a thought is listed in the lexeme of its value if and only if it exists.
//!
//! Because lexemes link otherwise unrelated parts of the tree, a thought can be browsed by
//! *context* rather than by children. A [`paths::Path`] through such a view crosses from one
//! placement into another; [`paths::split_chain`] breaks it back into plain
//! [`paths::SimplePath`] segments.
//!
//! ### Key Features
//!
//! - **Fractional ranks**: siblings are ordered by `f64` ranks, so insertion never renumbers
//!   (except when two neighbours are too close to split)
//! - **Context views**: traversal across lexeme contexts without introducing cycles into the tree
//! - **Synchronous reducers**: every mutation is a pure function of the [`state::State`],
//!   applied copy-on-write by the [`state::Store`]
//! - **Bulk import**: indented text, HTML lists and full state dumps, merged by value into
//!   existing thoughts
//! - **Lazy sync**: breadth-first streaming of subtrees from a [`sync::DataProvider`], merged
//!   with an idempotent last-writer-wins [`sync::reconcile`]
//!
//! ## Architecture
//!
//! - **[`properties`]**: ids, timestamps, thoughts, lexemes and the [`properties::ThoughtIndices`]
//!   exchange format
//! - **[`hashing`]**: value normalization and lexeme keys
//! - **[`state`]**: the state value, its selectors, and the [`state::Store`] that owns it
//! - **[`paths`]**: paths, context views and path simplification
//! - **[`reducers`]**: every graph mutation, dispatched through [`reducers::Action`]
//! - **[`codec`]**: import parsing and export
//! - **[`sync`]**: persistence providers, subtree streaming, reconciliation and the push queue
//! - **[`search`]**: lexeme search
//! - **[`throttle`]**: coalescing of rapid edits
//! - **[`event`]**: change notifications emitted by the store
//!
//! ## Quick Start
//!
//! ```rust
//! use outline_core::{
//!     properties::SessionId,
//!     reducers::{Action, ImportText},
//!     state::{State, Store},
//! };
//!
//! # fn main() -> Result<(), outline_core::OutlineError> {
//! let mut state = State::initial(SessionId::new());
//! // A new outline is loaded, not waiting for a provider.
//! for thought in state.thoughts.thought_index.values_mut() {
//!     thought.pending = false;
//! }
//! let store = Store::new(state);
//!
//! store.dispatch(Action::ImportText(ImportText {
//!     text: "- fruit\n  - apple\n  - pear\n- apple".into(),
//!     ..Default::default()
//! }))?;
//!
//! let state = store.get_state();
//! assert_eq!(state.get_contexts("apple").len(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! ### Syncing with a provider
//!
//! ```rust
//! use outline_core::{config::OutlineConfig, sync::{MemoryProvider, SyncQueue}};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), outline_core::OutlineError> {
//! let queue = SyncQueue::from_config(Arc::new(MemoryProvider::new()), OutlineConfig::default());
//! queue.initialize().await?;
//! // ... dispatch actions on queue.store() ...
//! queue.flush().await?;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod event;
pub mod hashing;
pub mod paths;
pub mod properties;
pub mod reducers;
pub mod search;
pub mod state;
pub mod sync;
#[cfg(test)]
mod tests;
pub mod throttle;

pub use error::*;
