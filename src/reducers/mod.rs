//! Graph mutation reducers.
//!
//! Every reducer is a plain function `fn(&mut State, Payload) -> Result<(), OutlineError>`
//! that performs no I/O. They share one failure contract:
//!
//! - an empty or malformed [crate::paths::Path] is a programmer error and is returned as
//!   `Err` before anything is written;
//! - a reference to data that is missing or not loaded yet is logged with `tracing::warn!` and
//!   the reducer returns `Ok(())` without changes;
//! - a rejected user action (permission attributes, moving a thought into itself, ...) raises
//!   an [crate::state::Alert] of kind [crate::state::AlertKind::Validation] and returns `Ok(())`.
//!
//! Reducers validate before they write, and [crate::state::Store::dispatch] runs them on a
//! copy, so a failed dispatch never publishes a partial transition.

mod collapse_context;
mod delete_thought;
mod edit_thought;
mod import_text;
mod move_thought;
mod new_thought;
mod toggle;

use serde::{Deserialize, Serialize};

use crate::{error::OutlineError, paths::Path, state::State};

pub use collapse_context::{collapse_context, CollapseContext};
pub use delete_thought::{delete_thought, DeleteThought};
pub use edit_thought::{edit_thought, EditThought};
pub use import_text::{import_text, ImportText};
pub use move_thought::{move_thought, MoveThought};
pub use new_thought::{new_thought, NewThought};
pub use toggle::{set_cursor, toggle_attribute, toggle_context_view, ToggleAttribute};

/// Permission attributes checked by the reducers.
pub const READONLY: &str = "=readonly";
pub const UNEDITABLE: &str = "=uneditable";
pub const UNEXTENDABLE: &str = "=unextendable";
pub const IMMOVABLE: &str = "=immovable";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Action {
    NewThought(NewThought),
    EditThought(EditThought),
    MoveThought(MoveThought),
    DeleteThought(DeleteThought),
    CollapseContext(CollapseContext),
    ToggleContextView(Path),
    ToggleAttribute(ToggleAttribute),
    ImportText(ImportText),
    SetCursor(Option<Path>),
    DismissAlert,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::NewThought(_) => "newThought",
            Action::EditThought(_) => "editThought",
            Action::MoveThought(_) => "moveThought",
            Action::DeleteThought(_) => "deleteThought",
            Action::CollapseContext(_) => "collapseContext",
            Action::ToggleContextView(_) => "toggleContextView",
            Action::ToggleAttribute(_) => "toggleAttribute",
            Action::ImportText(_) => "importText",
            Action::SetCursor(_) => "setCursor",
            Action::DismissAlert => "dismissAlert",
        }
    }
}

pub fn reduce(state: &mut State, action: Action) -> Result<(), OutlineError> {
    match action {
        Action::NewThought(payload) => new_thought(state, payload).map(|_| ()),
        Action::EditThought(payload) => edit_thought(state, payload),
        Action::MoveThought(payload) => move_thought(state, payload),
        Action::DeleteThought(payload) => delete_thought(state, payload),
        Action::CollapseContext(payload) => collapse_context(state, payload),
        Action::ToggleContextView(at) => toggle_context_view(state, &at),
        Action::ToggleAttribute(payload) => toggle_attribute(state, payload),
        Action::ImportText(payload) => import_text(state, payload).map(|_| ()),
        Action::SetCursor(path) => {
            set_cursor(state, path);
            Ok(())
        }
        Action::DismissAlert => {
            state.dismiss_alert();
            Ok(())
        }
    }
}
