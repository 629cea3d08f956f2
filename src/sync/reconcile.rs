//! Merging fetched fragments into the live state.
//!
//! [reconcile] is a pure merge: applying the same fragment twice, or two fragments in either
//! order, gives the same state. Thoughts follow last-writer-wins on `(last_updated,
//! updated_by)` with two exceptions. A local pending placeholder always yields to real data,
//! and real local data never yields to an incoming placeholder. Lexeme context lists are merged
//! as a union and then checked against the thoughts that are loaded locally, since those are
//! the ground truth for which lexeme a thought belongs to.

use crate::{
    event::EventOrigin,
    hashing::{hash_thought, HashKey},
    properties::{Lexeme, Thought, ThoughtId, ThoughtIndices},
    state::State,
};

/// Outcome of merging one incoming thought.
enum ThoughtMerge {
    Kept,
    Inserted,
    Replaced { old_value: String },
}

fn merge_thought(state: &mut State, incoming: Thought) -> ThoughtMerge {
    if let Some(deleted) = state.tombstones.get(&incoming.id) {
        if incoming.last_updated <= *deleted {
            tracing::debug!(
                "[reconcile] ignoring {} deleted at {deleted}",
                incoming.id
            );
            return ThoughtMerge::Kept;
        }
    }
    let Some(local) = state.get_thought(&incoming.id) else {
        state.put_thought(incoming, EventOrigin::Remote);
        return ThoughtMerge::Inserted;
    };

    let replace = match (local.pending, incoming.pending) {
        (true, false) => true,
        (true, true) | (false, false) => incoming.stamp() > local.stamp(),
        (false, true) => false,
    };
    if !replace {
        return ThoughtMerge::Kept;
    }

    let old_value = local.value.clone();
    let was_pending = local.pending;
    let orphans = match was_pending {
        true => local
            .child_ids()
            .filter(|child| !incoming.has_child(child))
            .filter_map(|child| state.get_thought(child))
            .filter(|child| child.parent_id == incoming.id)
            .map(|child| (child.id.clone(), child.value.clone()))
            .collect::<Vec<_>>(),
        false => Vec::new(),
    };

    let mut merged = incoming;
    if orphans.is_empty() {
        state.put_thought(merged, EventOrigin::Remote);
    } else {
        // Children created under a placeholder before its data arrived.
        for (id, value) in &orphans {
            merged.add_child(id, value);
        }
        tracing::debug!(
            "[reconcile] kept {} local children of {}",
            orphans.len(),
            merged.id
        );
        state.put_thought(merged, EventOrigin::Local);
    }
    ThoughtMerge::Replaced { old_value }
}

/// True if `id` may be listed as a context of `key`.
fn is_valid_context(state: &State, key: &HashKey, id: &ThoughtId) -> bool {
    match state.get_thought(id) {
        Some(thought) => hash_thought(&thought.value) == *key,
        None => !state.tombstones.contains_key(id),
    }
}

fn merge_lexeme(state: &mut State, key: HashKey, incoming: Lexeme) {
    let local = state.get_lexeme_by_key(&key).cloned();
    let (newer, older) = match &local {
        Some(local) if local.stamp() >= incoming.stamp() => (local.clone(), Some(incoming)),
        Some(local) => (incoming, Some(local.clone())),
        None => (incoming, None),
    };

    let mut merged = newer;
    if let Some(older) = older {
        merged.created = merged.created.min(older.created);
        for id in &older.contexts {
            merged.add_context(id);
        }
    }
    merged
        .contexts
        .retain(|id| is_valid_context(state, &key, id));

    if local.as_ref() == Some(&merged) {
        return;
    }
    match (merged.contexts.is_empty(), local.is_some()) {
        (true, true) => {
            state.take_lexeme(&key, EventOrigin::Remote);
        }
        (true, false) => {}
        _ => state.put_lexeme(key, merged, EventOrigin::Remote),
    }
}

/// Merge a fragment fetched from a persistence provider into `state`.
///
/// Every write is recorded as a remote change and is not pushed back to the provider, except a
/// placeholder's locally created children, which are folded into the incoming record and
/// pushed so the provider learns about them.
pub fn reconcile(state: &mut State, fragment: ThoughtIndices) {
    if fragment.is_empty() {
        return;
    }
    let mut changed = Vec::new();
    for (_, thought) in fragment.thought_index {
        let id = thought.id.clone();
        match merge_thought(state, thought) {
            ThoughtMerge::Kept => {}
            ThoughtMerge::Inserted => changed.push((id, None)),
            ThoughtMerge::Replaced { old_value } => changed.push((id, Some(old_value))),
        }
    }
    for (key, lexeme) in fragment.lexeme_index {
        merge_lexeme(state, key, lexeme);
    }

    // Keep loaded lexemes in step with the thoughts that changed above.
    for (id, old_value) in changed {
        if id.is_root_sentinel() {
            continue;
        }
        let Some(value) = state.get_thought(&id).map(|thought| thought.value.clone()) else {
            continue;
        };
        if let Some(old_value) = old_value {
            if hash_thought(&old_value) != hash_thought(&value) {
                state.unlink_lexeme(&id, &old_value, EventOrigin::Remote);
            }
        }
        if !state.get_contexts(&value).contains(&id) {
            state.link_lexeme(&id, &value, EventOrigin::Remote);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        properties::{SessionId, Timestamp},
        tests::helpers::{init_logging, outline},
    };
    use test_log::test;

    fn remote_thought(id: &str, value: &str, parent: &str, millis: i64, session: &str) -> Thought {
        Thought::new(
            ThoughtId::from(id),
            value,
            0.0,
            ThoughtId::from(parent),
            Timestamp::from_millis(millis),
            SessionId::from(session),
        )
    }

    fn fragment(thoughts: Vec<Thought>) -> ThoughtIndices {
        ThoughtIndices {
            thought_index: thoughts.into_iter().map(|t| (t.id.clone(), t)).collect(),
            lexeme_index: Default::default(),
        }
    }

    #[test]
    fn test_pending_placeholder_is_replaced() {
        init_logging();
        let mut state = State::initial(SessionId::from("local"));
        let mut root = remote_thought("__ROOT__", "__ROOT__", "__ROOT_PARENT_ID__", 5, "remote");
        root.add_child(&ThoughtId::from("a"), "a");
        reconcile(&mut state, fragment(vec![root]));
        let loaded = state.get_thought(&ThoughtId::root()).unwrap();
        assert!(!loaded.pending);
        assert!(loaded.has_child(&ThoughtId::from("a")));
        assert!(state.push_batch.is_empty());
    }

    #[test]
    fn test_last_writer_wins_and_ties_keep_local() {
        let mut state = outline(&["a"]);
        let id = state.context_to_thought_id(&["a"]).unwrap();
        let local = state.get_thought(&id).unwrap().clone();

        let mut older = local.clone();
        older.value = "older".into();
        older.last_updated = Timestamp::from_millis(local.last_updated.as_millis() - 1);
        reconcile(&mut state, fragment(vec![older]));
        assert_eq!(state.get_thought(&id).unwrap().value, "a");

        let mut tie = local.clone();
        tie.value = "tie".into();
        reconcile(&mut state, fragment(vec![tie]));
        assert_eq!(state.get_thought(&id).unwrap().value, "a");

        let mut newer = local.clone();
        newer.value = "newer".into();
        newer.last_updated = Timestamp::from_millis(local.last_updated.as_millis() + 1);
        reconcile(&mut state, fragment(vec![newer]));
        assert_eq!(state.get_thought(&id).unwrap().value, "newer");
        assert_eq!(state.get_contexts("newer"), vec![id.clone()]);
        assert!(state.get_lexeme("a").is_none());
    }

    #[test]
    fn test_placeholder_never_overwrites_loaded_thought() {
        let mut state = outline(&["a"]);
        let id = state.context_to_thought_id(&["a"]).unwrap();
        let mut placeholder = state.get_thought(&id).unwrap().clone();
        placeholder.pending = true;
        placeholder.children_map.clear();
        placeholder.last_updated = Timestamp::from_millis(i64::MAX);
        reconcile(&mut state, fragment(vec![placeholder]));
        assert!(!state.get_thought(&id).unwrap().pending);
    }

    #[test]
    fn test_tombstoned_thought_is_not_resurrected() {
        let mut state = State::initial(SessionId::from("local"));
        state
            .tombstones
            .insert(ThoughtId::from("gone"), Timestamp::from_millis(10));
        reconcile(
            &mut state,
            fragment(vec![remote_thought("gone", "x", "__ROOT__", 9, "remote")]),
        );
        assert!(state.get_thought(&ThoughtId::from("gone")).is_none());
    }

    #[test]
    fn test_reapplying_a_fragment_is_a_no_op() {
        let mut state = State::initial(SessionId::from("local"));
        let mut incoming = fragment(vec![remote_thought("x", "hello", "__ROOT__", 3, "remote")]);
        let mut lexeme = Lexeme::new("hello", Timestamp::from_millis(3), SessionId::from("remote"));
        lexeme.add_context(&ThoughtId::from("x"));
        lexeme.add_context(&ThoughtId::from("unloaded"));
        incoming.lexeme_index.insert(hash_thought("hello"), lexeme);

        reconcile(&mut state, incoming.clone());
        let once = state.clone();
        state.take_changes();
        reconcile(&mut state, incoming);
        assert!(state.changes.is_empty());
        assert_eq!(state.thoughts, once.thoughts);
        assert_eq!(
            state.get_contexts("hello"),
            vec![ThoughtId::from("x"), ThoughtId::from("unloaded")]
        );
    }

    fn lexeme(value: &str, contexts: &[&str], millis: i64, session: &str) -> Lexeme {
        let mut lexeme = Lexeme::new(value, Timestamp::from_millis(millis), SessionId::from(session));
        for id in contexts {
            lexeme.add_context(&ThoughtId::from(*id));
        }
        lexeme
    }

    #[test]
    fn test_overlapping_fragments_merge_in_either_order() {
        // An early snapshot, and a later one in which x was renamed and z was added.
        let mut early = fragment(vec![
            remote_thought("x", "hello", "__ROOT__", 5, "one"),
            remote_thought("y", "hello", "__ROOT__", 5, "one"),
        ]);
        early
            .lexeme_index
            .insert(hash_thought("hello"), lexeme("hello", &["x", "y"], 5, "one"));
        let mut late = fragment(vec![
            remote_thought("x", "howdy", "__ROOT__", 9, "two"),
            remote_thought("z", "hello", "__ROOT__", 9, "two"),
        ]);
        late.lexeme_index
            .insert(hash_thought("hello"), lexeme("hello", &["y", "z"], 9, "two"));
        late.lexeme_index
            .insert(hash_thought("howdy"), lexeme("howdy", &["x"], 9, "two"));

        let initial = State::initial(SessionId::from("local"));
        let mut forward = initial.clone();
        reconcile(&mut forward, early.clone());
        reconcile(&mut forward, late.clone());

        let mut backward = initial;
        reconcile(&mut backward, late);
        reconcile(&mut backward, early);

        assert_eq!(forward.thoughts, backward.thoughts);
        assert_eq!(forward.get_thought(&ThoughtId::from("x")).unwrap().value, "howdy");
        assert_eq!(
            forward.get_contexts("hello"),
            vec![ThoughtId::from("y"), ThoughtId::from("z")]
        );
        assert_eq!(forward.get_contexts("howdy"), vec![ThoughtId::from("x")]);
    }

    #[test]
    fn test_stale_lexeme_context_is_dropped() {
        let mut state = outline(&["a"]);
        let id = state.context_to_thought_id(&["a"]).unwrap();
        let mut stale = Lexeme::new("b", Timestamp::from_millis(i64::MAX), SessionId::from("r"));
        stale.add_context(&id);
        let incoming = ThoughtIndices {
            thought_index: Default::default(),
            lexeme_index: [(hash_thought("b"), stale)].into_iter().collect(),
        };
        reconcile(&mut state, incoming);
        assert!(state.get_lexeme("b").is_none());
        assert_eq!(state.get_contexts("a"), vec![id]);
    }
}
