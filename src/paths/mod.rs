//! Paths through the thought graph.
//!
//! - [`path`]: the [Path] and [SimplePath] id chains and their structural helpers
//! - [`chain`]: context-view boundaries, [split_chain] and [simplify_path]

pub mod chain;
pub mod path;

pub use chain::{
    context_view_children, get_children_of_path, is_context_view_active, simplify_path,
    split_chain,
};
pub use path::{head, parent_of, rooted_parent_of, Path, SimplePath};
