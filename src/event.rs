use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::{hashing::HashKey, properties::ThoughtId, state::Alert};

/// Indicates where a state change came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EventOrigin {
    /// Produced by a reducer in this process. Already recorded in the push batch.
    Local,

    /// Merged in from a persistence provider. Never pushed back.
    #[default]
    Remote,
}

/// Change notifications emitted by [crate::state::Store] after every dispatch or
/// reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ThoughtEvent {
    ThoughtsUpdated(Vec<ThoughtId>, EventOrigin),
    ThoughtsRemoved(Vec<ThoughtId>, EventOrigin),
    LexemesUpdated(Vec<HashKey>, EventOrigin),
    LexemesRemoved(Vec<HashKey>, EventOrigin),
    /// A user-visible notification was raised.
    Alert(Alert),
}

impl ThoughtEvent {
    /// Returns the EventOrigin of this event, or None for alerts
    pub fn origin(&self) -> Option<EventOrigin> {
        match self {
            ThoughtEvent::ThoughtsUpdated(_, origin) => Some(*origin),
            ThoughtEvent::ThoughtsRemoved(_, origin) => Some(*origin),
            ThoughtEvent::LexemesUpdated(_, origin) => Some(*origin),
            ThoughtEvent::LexemesRemoved(_, origin) => Some(*origin),
            ThoughtEvent::Alert(_) => None,
        }
    }
}

impl Display for ThoughtEvent {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            ThoughtEvent::ThoughtsUpdated(ids, _) => write!(f, "ThoughtsUpdated({})", ids.len()),
            ThoughtEvent::ThoughtsRemoved(ids, _) => write!(f, "ThoughtsRemoved({})", ids.len()),
            ThoughtEvent::LexemesUpdated(keys, _) => write!(f, "LexemesUpdated({})", keys.len()),
            ThoughtEvent::LexemesRemoved(keys, _) => write!(f, "LexemesRemoved({})", keys.len()),
            ThoughtEvent::Alert(alert) => write!(f, "Alert({})", alert.value),
        }
    }
}
