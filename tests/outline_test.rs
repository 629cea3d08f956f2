//! Editing sessions driven through the public store API.

mod common;

use common::{empty_store, id_of, import_outline, init_logging, path_to, ranked_values};
use outline_core::{
    codec::{export_context, ExportFormat},
    hashing::hash_thought,
    paths::{split_chain, Path},
    properties::{ThoughtId, Timestamp},
    reducers::{Action, DeleteThought, EditThought, MoveThought, NewThought},
    search::{get_context_map, search_lexemes},
    state::State,
    throttle::{EditThrottle, PendingEdit},
};
use test_log::test;

fn assert_consistent(state: &State) {
    for thought in state.thoughts.thought_index.values() {
        if thought.id.is_root_sentinel() {
            continue;
        }
        assert!(
            state.get_contexts(&thought.value).contains(&thought.id),
            "{:?} is missing from its lexeme",
            thought.value
        );
    }
    for (key, lexeme) in &state.thoughts.lexeme_index {
        for id in &lexeme.contexts {
            let thought = state
                .get_thought(id)
                .unwrap_or_else(|| panic!("{:?} lists unknown {id}", lexeme.lemma));
            assert_eq!(hash_thought(&thought.value), *key);
        }
    }
}

#[test]
fn test_editing_session_keeps_indices_in_step() {
    init_logging();
    let store = empty_store("session");
    import_outline(
        &store,
        "- projects\n  - garden\n    - tomatoes\n  - house\n- inbox\n  - tomatoes\n  - paint",
    );
    assert_eq!(store.get_state().get_contexts("tomatoes").len(), 2);

    let paint = id_of(&store, &["inbox", "paint"]);
    let house = id_of(&store, &["projects", "house"]);
    store
        .dispatch(Action::MoveThought(MoveThought {
            old_path: path_to(&store, &["inbox", "paint"]),
            new_path: Path::new(vec![id_of(&store, &["projects"]), house.clone(), paint.clone()]),
            new_rank: 0.0,
        }))
        .unwrap();
    assert_eq!(ranked_values(&store, &["projects", "house"]), vec!["paint"]);

    store
        .dispatch(Action::EditThought(EditThought {
            old_value: "paint".into(),
            new_value: "paint walls".into(),
            path: store.get_state().thought_to_path(&paint),
        }))
        .unwrap();

    let inbox_tomatoes = id_of(&store, &["inbox", "tomatoes"]);
    store
        .dispatch(Action::DeleteThought(DeleteThought {
            path_parent: path_to(&store, &["inbox"]),
            thought_id: inbox_tomatoes,
        }))
        .unwrap();

    let state = store.get_state();
    assert!(ranked_values(&store, &["inbox"]).is_empty());
    assert_eq!(state.get_contexts("tomatoes").len(), 1);
    assert_eq!(state.get_contexts("paint walls"), vec![paint]);
    assert!(state.get_lexeme("paint").is_none());
    assert_consistent(&state);
}

#[test]
fn test_export_imports_back_into_the_same_tree() {
    let store = empty_store("source");
    import_outline(&store, "- a\n  - b\n    - c\n  - d\n- e");
    let text = export_context(&store.get_state(), &ThoughtId::root(), ExportFormat::PlainText);
    assert_eq!(text, "- a\n  - b\n    - c\n  - d\n- e\n");

    let copy = empty_store("copy");
    import_outline(&copy, &text);
    assert_eq!(ranked_values(&copy, &[]), vec!["a", "e"]);
    assert_eq!(ranked_values(&copy, &["a"]), vec!["b", "d"]);
    assert_eq!(ranked_values(&copy, &["a", "b"]), vec!["c"]);

    let html = export_context(&store.get_state(), &id_of(&store, &["a"]), ExportFormat::Html);
    assert_eq!(
        html,
        "<ul><li>a<ul><li>b<ul><li>c</li></ul></li><li>d</li></ul></li></ul>"
    );
}

#[test]
fn test_context_view_joins_two_branches() {
    let store = empty_store("session");
    import_outline(&store, "- a\n  - m\n    - x\n- b\n  - m\n    - y");
    let at = path_to(&store, &["a", "m"]);
    store.dispatch(Action::ToggleContextView(at.clone())).unwrap();

    let m_b = id_of(&store, &["b", "m"]);
    let y = id_of(&store, &["b", "m", "y"]);
    let through = at.append([m_b.clone(), y.clone()]);
    let chain = split_chain(&store.get_state(), &through);
    assert_eq!(chain.len(), 2);
    assert_eq!(chain[0].to_vec(), at.to_vec());
    assert_eq!(chain[1].to_vec(), vec![id_of(&store, &["b"]), m_b, y]);
}

#[test]
fn test_local_search_groups_matches_by_parent() {
    let store = empty_store("session");
    import_outline(&store, "- recipes\n  - Apple pie\n  - apple\n- trees\n  - apple");
    let state = store.get_state();
    let keys = search_lexemes(&state, "apple");
    assert_eq!(keys.len(), 2);
    let map = get_context_map(&state, &keys);
    assert_eq!(map[&id_of(&store, &["recipes"])].len(), 2);
    assert_eq!(map[&id_of(&store, &["trees"])].len(), 1);
}

#[test]
fn test_throttled_edits_commit_once() {
    let store = empty_store("session");
    store
        .dispatch(Action::NewThought(NewThought {
            value: "d".into(),
            ..Default::default()
        }))
        .unwrap();
    let path = store.get_state().context_to_path(&["d"]).unwrap();

    let mut throttle = EditThrottle::new(1000);
    let start = Timestamp::from_millis(10_000);
    let mut previous = "d".to_string();
    for (i, value) in ["do", "dog", "dogs"].into_iter().enumerate() {
        let flushed = throttle.schedule(
            PendingEdit {
                path: path.clone(),
                old_value: previous.clone(),
                new_value: value.into(),
            },
            Timestamp::from_millis(start.as_millis() + 100 * i as i64),
        );
        assert!(flushed.is_none());
        previous = value.into();
    }
    assert!(throttle
        .poll(Timestamp::from_millis(start.as_millis() + 500))
        .is_none());
    let edit = throttle
        .poll(Timestamp::from_millis(start.as_millis() + 1200))
        .unwrap();
    assert_eq!(edit.old_value, "d");
    assert_eq!(edit.new_value, "dogs");
    store.dispatch(edit.into_action()).unwrap();

    assert_eq!(ranked_values(&store, &[]), vec!["dogs"]);
    assert!(store.get_state().get_lexeme("d").is_none());
    assert!(!throttle.is_pending());
}
