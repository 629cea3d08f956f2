//! Tests for context views and path resolution

use super::helpers::*;
use crate::{
    paths::{
        get_children_of_path, is_context_view_active, simplify_path, split_chain, Path,
        SimplePath,
    },
    properties::ThoughtId,
    reducers::toggle_context_view,
};
use test_log::test;

fn ids(path: &[ThoughtId]) -> Vec<ThoughtId> {
    path.to_vec()
}

#[test]
fn test_plain_path_is_one_segment() {
    let state = outline(&["a", "  b", "    c"]);
    let path = path_to(&state, &["a", "b", "c"]);
    let chain = split_chain(&state, &path);
    assert_eq!(chain.len(), 1);
    assert_eq!(ids(&chain[0]), ids(&path));
    assert_eq!(simplify_path(&state, &path).unwrap(), state.thought_to_path(path.last().unwrap()));
}

#[test]
fn test_context_view_round_trip() {
    let mut state = outline(&["a", "  m", "    x", "b", "  m", "    y"]);
    let a = id_of(&state, &["a"]);
    let m_a = id_of(&state, &["a", "m"]);
    let b = id_of(&state, &["b"]);
    let m_b = id_of(&state, &["b", "m"]);
    let y = id_of(&state, &["b", "m", "y"]);

    let at = Path::new(vec![a.clone(), m_a.clone()]);
    assert!(!is_context_view_active(&state, &at));
    toggle_context_view(&mut state, &at).unwrap();
    assert!(is_context_view_active(&state, &at));

    let children = get_children_of_path(&state, &at)
        .unwrap()
        .into_iter()
        .map(|child| child.id.clone())
        .collect::<Vec<_>>();
    assert_eq!(children, vec![m_a.clone(), m_b.clone()]);

    let through = at.append([m_b.clone(), y.clone()]);
    let chain = split_chain(&state, &through);
    assert_eq!(chain.len(), 2);
    assert_eq!(ids(&chain[0]), vec![a, m_a.clone()]);
    assert_eq!(ids(&chain[1]), vec![b.clone(), m_b.clone(), y.clone()]);
    assert_eq!(
        simplify_path(&state, &through).unwrap(),
        SimplePath::new(vec![b, m_b, y])
    );

    toggle_context_view(&mut state, &at).unwrap();
    assert!(!is_context_view_active(&state, &at));
    let children = get_children_of_path(&state, &at).unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].value, "x");
}

#[test]
fn test_segment_is_seeded_with_the_ancestors_of_the_next_thought() {
    let mut state = outline(&["a", "  m", "    x"]);
    let at = path_to(&state, &["a", "m"]);
    toggle_context_view(&mut state, &at).unwrap();
    let x = id_of(&state, &["a", "m", "x"]);
    let chain = split_chain(&state, &at.append([x.clone()]));
    assert_eq!(chain.len(), 2);
    assert_eq!(ids(&chain[1]), ids(&at.append([x])));
}

#[test]
fn test_unloaded_path_falls_back_to_parent_walk() {
    let state = outline(&["a", "  b"]);
    let b = id_of(&state, &["a", "b"]);
    let path = Path::new(vec![ThoughtId::from("missing"), b.clone()]);
    let chain = split_chain(&state, &path);
    assert_eq!(chain, vec![SimplePath::default()]);
    assert_eq!(
        simplify_path(&state, &path).unwrap(),
        SimplePath::new(vec![id_of(&state, &["a"]), b])
    );
}

#[test]
fn test_empty_path_is_an_error() {
    let state = outline(&["a"]);
    assert!(simplify_path(&state, &Path::new(vec![])).is_err());
    assert!(get_children_of_path(&state, &Path::new(vec![])).is_err());
}
