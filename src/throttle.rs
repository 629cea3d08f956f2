//! Coalescing of rapid edits.
//!
//! Typing into a thought produces an edit per keystroke. [EditThrottle] holds the latest one
//! back until the thought has been quiet for `delay_ms`, so the lexeme index and the push batch
//! see a single edit per burst. The caller drives it: [EditThrottle::poll] from a timer, and
//! [EditThrottle::flush] from anything that must see committed state (focus change, an
//! explicit command, shutdown). Flushing twice is harmless.

use serde::{Deserialize, Serialize};

use crate::{
    paths::SimplePath,
    properties::Timestamp,
    reducers::{Action, EditThought},
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingEdit {
    pub path: SimplePath,
    pub old_value: String,
    pub new_value: String,
}

impl PendingEdit {
    pub fn into_action(self) -> Action {
        Action::EditThought(EditThought {
            old_value: self.old_value,
            new_value: self.new_value,
            path: self.path,
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct EditThrottle {
    delay_ms: u64,
    pending: Option<(PendingEdit, Timestamp)>,
}

impl EditThrottle {
    pub fn new(delay_ms: u64) -> Self {
        EditThrottle {
            delay_ms,
            pending: None,
        }
    }

    fn deadline(&self, now: Timestamp) -> Timestamp {
        Timestamp::from_millis(now.as_millis().saturating_add(self.delay_ms as i64))
    }

    /// Queue an edit.
    ///
    /// An edit of the thought that is already queued replaces its new value and restarts the
    /// delay; the original old value is kept. An edit of any other thought returns the queued
    /// edit, which must be committed before the new one.
    pub fn schedule(&mut self, edit: PendingEdit, now: Timestamp) -> Option<PendingEdit> {
        let deadline = self.deadline(now);
        match self.pending.take() {
            Some((mut queued, _)) if queued.path.last() == edit.path.last() => {
                queued.new_value = edit.new_value;
                queued.path = edit.path;
                self.pending = Some((queued, deadline));
                None
            }
            previous => {
                self.pending = Some((edit, deadline));
                previous.map(|(queued, _)| queued)
            }
        }
    }

    /// The queued edit, once the delay has passed.
    pub fn poll(&mut self, now: Timestamp) -> Option<PendingEdit> {
        match &self.pending {
            Some((_, deadline)) if now >= *deadline => self.flush(),
            _ => None,
        }
    }

    /// The queued edit, regardless of the delay.
    pub fn flush(&mut self) -> Option<PendingEdit> {
        self.pending.take().map(|(edit, _)| edit)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties::ThoughtId;
    use test_log::test;

    fn edit(id: &str, old_value: &str, new_value: &str) -> PendingEdit {
        PendingEdit {
            path: SimplePath::new(vec![ThoughtId::from(id)]),
            old_value: old_value.into(),
            new_value: new_value.into(),
        }
    }

    #[test]
    fn test_burst_coalesces_into_one_edit() {
        let mut throttle = EditThrottle::new(1000);
        let t0 = Timestamp::from_millis(0);
        assert_eq!(throttle.schedule(edit("x", "a", "ab"), t0), None);
        assert_eq!(
            throttle.schedule(edit("x", "ab", "abc"), Timestamp::from_millis(500)),
            None
        );
        assert_eq!(throttle.poll(Timestamp::from_millis(1200)), None);
        assert_eq!(
            throttle.poll(Timestamp::from_millis(1500)),
            Some(edit("x", "a", "abc"))
        );
        assert!(!throttle.is_pending());
    }

    #[test]
    fn test_other_thought_commits_the_queued_edit() {
        let mut throttle = EditThrottle::new(1000);
        let now = Timestamp::from_millis(0);
        throttle.schedule(edit("x", "a", "ab"), now);
        assert_eq!(
            throttle.schedule(edit("y", "c", "cd"), now),
            Some(edit("x", "a", "ab"))
        );
        assert_eq!(throttle.flush(), Some(edit("y", "c", "cd")));
        assert_eq!(throttle.flush(), None);
    }

    #[test]
    fn test_into_action() {
        let action = edit("x", "a", "b").into_action();
        assert_eq!(action.name(), "editThought");
    }
}
