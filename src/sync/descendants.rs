//! Lazy, breadth-first loading of subtrees from a [DataProvider].

use futures::{
    stream::{self, BoxStream},
    Stream, StreamExt,
};
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use crate::{
    error::OutlineError,
    hashing::{hash_thought, HashKey},
    properties::{ThoughtId, ThoughtIndices},
    state::State,
    sync::DataProvider,
};

/// Upper bound on the number of ancestors walked when loading the context of a pulled thought.
const MAX_ANCESTORS: usize = 1000;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PullOptions {
    /// Levels loaded below the root. Thoughts at this depth are returned as pending
    /// placeholders. `None` loads the whole subtree.
    pub max_depth: Option<usize>,
    /// Skip loading the ancestors of the root.
    pub prevent_loading_ancestors: bool,
}

impl PullOptions {
    pub fn with_max_depth(max_depth: usize) -> Self {
        PullOptions {
            max_depth: Some(max_depth),
            ..Default::default()
        }
    }

    pub fn unbounded() -> Self {
        PullOptions::default()
    }
}

struct Walk<'a, P, F> {
    provider: &'a P,
    get_state: F,
    root_id: ThoughtId,
    opts: PullOptions,
    frontier: Vec<(ThoughtId, usize)>,
    visited: BTreeSet<ThoughtId>,
    ancestors_pending: bool,
}

impl<'a, P, F> Walk<'a, P, F>
where
    P: DataProvider,
    F: Fn() -> Arc<State> + Send + Sync,
{
    fn expands(&self, depth: usize) -> bool {
        self.opts.max_depth.is_none_or(|max| depth < max)
    }

    /// Load one level of the subtree. Levels that only contain thoughts already loaded locally
    /// are walked without a fetch and do not produce a fragment.
    async fn next_fragment(&mut self) -> Result<Option<ThoughtIndices>, OutlineError> {
        loop {
            if self.frontier.is_empty() && !self.ancestors_pending {
                return Ok(None);
            }
            let mut fragment = ThoughtIndices::default();
            let level = std::mem::take(&mut self.frontier);

            let mut to_fetch = Vec::new();
            {
                let state = (self.get_state)();
                for (id, depth) in level {
                    if !self.visited.insert(id.clone()) {
                        continue;
                    }
                    match state.get_thought(&id) {
                        Some(local) if !local.pending => {
                            if self.expands(depth) {
                                self.frontier
                                    .extend(local.child_ids().map(|child| (child.clone(), depth + 1)));
                            }
                        }
                        _ => to_fetch.push((id, depth)),
                    }
                }
            }

            if !to_fetch.is_empty() {
                let ids = to_fetch.iter().map(|(id, _)| id.clone()).collect::<Vec<_>>();
                let fetched = self.provider.get_thoughts_by_ids(&ids).await?;
                for ((id, depth), thought) in to_fetch.into_iter().zip(fetched) {
                    let Some(mut thought) = thought else {
                        tracing::debug!(
                            "[get_descendant_thoughts] {id} is missing from {}",
                            self.provider.name()
                        );
                        continue;
                    };
                    thought.pending = !self.expands(depth);
                    if !thought.pending {
                        self.frontier
                            .extend(thought.child_ids().map(|child| (child.clone(), depth + 1)));
                    }
                    fragment.thought_index.insert(id, thought);
                }
            }

            if self.ancestors_pending {
                self.ancestors_pending = false;
                self.load_ancestors(&mut fragment).await?;
            }

            if fragment.thought_index.is_empty() {
                continue;
            }
            self.load_lexemes(&mut fragment).await?;
            return Ok(Some(fragment));
        }
    }

    /// Add the not yet loaded ancestors of the root to `fragment` as pending placeholders.
    async fn load_ancestors(&mut self, fragment: &mut ThoughtIndices) -> Result<(), OutlineError> {
        let mut parent_id = {
            let state = (self.get_state)();
            match fragment
                .thought_index
                .get(&self.root_id)
                .or_else(|| state.get_thought(&self.root_id))
            {
                Some(root) => root.parent_id.clone(),
                None => return Ok(()),
            }
        };
        for _ in 0..MAX_ANCESTORS {
            if parent_id.is_root_parent()
                || self.visited.contains(&parent_id)
                || (self.get_state)().get_thought(&parent_id).is_some()
            {
                return Ok(());
            }
            let Some(mut ancestor) = self.provider.get_thought_by_id(&parent_id).await? else {
                tracing::debug!("[get_descendant_thoughts] ancestor {parent_id} is missing");
                return Ok(());
            };
            self.visited.insert(parent_id.clone());
            ancestor.pending = true;
            parent_id = ancestor.parent_id.clone();
            fragment.thought_index.insert(ancestor.id.clone(), ancestor);
        }
        tracing::warn!(
            "[get_descendant_thoughts] stopped loading ancestors of {} after {MAX_ANCESTORS}",
            self.root_id
        );
        Ok(())
    }

    /// Add the lexemes of the fetched thoughts that are not loaded yet.
    async fn load_lexemes(&self, fragment: &mut ThoughtIndices) -> Result<(), OutlineError> {
        let keys = {
            let state = (self.get_state)();
            fragment
                .thought_index
                .values()
                .map(|thought| hash_thought(&thought.value))
                .filter(|key| state.get_lexeme_by_key(key).is_none())
                .collect::<BTreeSet<HashKey>>()
                .into_iter()
                .collect::<Vec<_>>()
        };
        if keys.is_empty() {
            return Ok(());
        }
        let lexemes = self.provider.get_lexemes_by_ids(&keys).await?;
        fragment.lexeme_index.extend(
            keys.into_iter()
                .zip(lexemes)
                .filter_map(|(key, lexeme)| lexeme.map(|lexeme| (key, lexeme)))
                .collect::<BTreeMap<_, _>>(),
        );
        Ok(())
    }
}

/// Stream the subtree below `root_id` one level at a time.
///
/// Each item is a fragment to pass to [crate::sync::reconcile]. Thoughts that are already
/// loaded locally (and not pending) are walked without being fetched again, so an abandoned or
/// overlapping pull only costs what it has not loaded yet. `get_state` is called for every level
/// so that fragments reconciled in the meantime are taken into account.
///
/// The stream ends after the first error.
pub fn get_descendant_thoughts<'a, P, F>(
    provider: &'a P,
    root_id: ThoughtId,
    get_state: F,
    opts: PullOptions,
) -> impl Stream<Item = Result<ThoughtIndices, OutlineError>> + Send + 'a
where
    P: DataProvider,
    F: Fn() -> Arc<State> + Send + Sync + 'a,
{
    let walk = Walk {
        provider,
        get_state,
        frontier: vec![(root_id.clone(), 0)],
        ancestors_pending: !opts.prevent_loading_ancestors,
        root_id,
        opts,
        visited: BTreeSet::new(),
    };
    stream::unfold(walk, |mut walk| async move {
        match walk.next_fragment().await {
            Ok(Some(fragment)) => Some((Ok(fragment), walk)),
            Ok(None) => None,
            Err(e) => {
                walk.frontier.clear();
                walk.ancestors_pending = false;
                Some((Err(e), walk))
            }
        }
    })
}

/// Pull several subtrees concurrently and interleave their fragments.
///
/// The settings root is small by convention and is always loaded completely.
pub fn get_many_descendants<'a, P, F>(
    provider: &'a P,
    ids: Vec<ThoughtId>,
    get_state: F,
    opts: PullOptions,
) -> impl Stream<Item = Result<ThoughtIndices, OutlineError>> + Send + 'a
where
    P: DataProvider,
    F: Fn() -> Arc<State> + Clone + Send + Sync + 'a,
{
    let streams = ids
        .into_iter()
        .map(|id| {
            let opts = match id == ThoughtId::em() {
                true => PullOptions {
                    max_depth: None,
                    ..opts.clone()
                },
                false => opts.clone(),
            };
            get_descendant_thoughts(provider, id, get_state.clone(), opts).boxed()
        })
        .collect::<Vec<BoxStream<'a, _>>>();
    stream::select_all(streams)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        properties::SessionId,
        sync::{reconcile, MemoryProvider},
        tests::helpers::{init_logging, outline},
    };
    use futures::TryStreamExt;
    use parking_lot::RwLock;

    fn remote() -> (MemoryProvider, State) {
        let source = outline(&["a", "  b", "    c", "      d", "x"]);
        (MemoryProvider::from_indices(source.thoughts.clone()), source)
    }

    #[tokio::test]
    async fn test_levels_arrive_breadth_first() {
        init_logging();
        let (provider, _) = remote();
        let state = Arc::new(State::initial(SessionId::from("local")));
        let get_state = move || state.clone();
        let fragments = get_descendant_thoughts(
            &provider,
            ThoughtId::root(),
            get_state,
            PullOptions::unbounded(),
        )
        .try_collect::<Vec<_>>()
        .await
        .unwrap();
        let sizes = fragments
            .iter()
            .map(|f| f.thought_index.len())
            .collect::<Vec<_>>();
        assert_eq!(sizes, vec![1, 2, 1, 1, 1]);
        assert!(fragments.iter().all(|f| f.thought_index.values().all(|t| !t.pending)));
    }

    #[tokio::test]
    async fn test_max_depth_leaves_placeholders() {
        let (provider, source) = remote();
        let state = Arc::new(State::initial(SessionId::from("local")));
        let get_state = move || state.clone();
        let fragments = get_descendant_thoughts(
            &provider,
            ThoughtId::root(),
            get_state,
            PullOptions::with_max_depth(2),
        )
        .try_collect::<Vec<_>>()
        .await
        .unwrap();
        assert_eq!(fragments.len(), 3);
        let b = source.context_to_thought_id(&["a", "b"]).unwrap();
        let last = fragments.last().unwrap();
        assert!(last.thought_index[&b].pending);
        assert!(fragments
            .iter()
            .all(|f| !f.thought_index.contains_key(&source.context_to_thought_id(&["a", "b", "c"]).unwrap())));
    }

    #[tokio::test]
    async fn test_loaded_thoughts_are_not_fetched_again() {
        let (provider, source) = remote();
        let shared = Arc::new(RwLock::new(Arc::new(State::initial(SessionId::from("local")))));
        let reader = shared.clone();
        let get_state = move || reader.read().clone();
        let mut stream = std::pin::pin!(get_descendant_thoughts(
            &provider,
            ThoughtId::root(),
            get_state.clone(),
            PullOptions::unbounded(),
        ));
        while let Some(fragment) = stream.try_next().await.unwrap() {
            let mut guard = shared.write();
            reconcile(Arc::make_mut(&mut guard), fragment);
        }
        let reads = provider.reads();
        let state = shared.read().clone();
        assert_eq!(state.get_contexts("d").len(), 1);
        assert_eq!(
            state.thought_to_context(&source.context_to_thought_id(&["a", "b", "c", "d"]).unwrap()),
            Some(vec!["a".into(), "b".into(), "c".into(), "d".into()])
        );

        let again = get_descendant_thoughts(
            &provider,
            ThoughtId::root(),
            get_state,
            PullOptions::unbounded(),
        )
        .try_collect::<Vec<_>>()
        .await
        .unwrap();
        assert!(again.is_empty());
        assert_eq!(provider.reads(), reads);
    }

    #[tokio::test]
    async fn test_ancestors_are_loaded_as_placeholders() {
        let (provider, source) = remote();
        let c = source.context_to_thought_id(&["a", "b", "c"]).unwrap();
        let state = Arc::new(State::initial(SessionId::from("local")));
        let get_state = move || state.clone();
        let first = get_descendant_thoughts(&provider, c.clone(), get_state, PullOptions::with_max_depth(0))
            .try_collect::<Vec<_>>()
            .await
            .unwrap();
        assert_eq!(first.len(), 1);
        let fragment = &first[0];
        let a = source.context_to_thought_id(&["a"]).unwrap();
        let b = source.context_to_thought_id(&["a", "b"]).unwrap();
        assert!(fragment.thought_index[&a].pending);
        assert!(fragment.thought_index[&b].pending);
        assert!(fragment.thought_index[&c].pending);
        assert!(fragment.lexeme_index.contains_key(&hash_thought("c")));
    }

    #[tokio::test]
    async fn test_errors_end_the_stream() {
        let (provider, _) = remote();
        provider.set_offline(true);
        let state = Arc::new(State::initial(SessionId::from("local")));
        let get_state = move || state.clone();
        let items = get_descendant_thoughts(
            &provider,
            ThoughtId::root(),
            get_state,
            PullOptions::unbounded(),
        )
        .collect::<Vec<_>>()
        .await;
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(OutlineError::Sync(_))));
    }

    #[tokio::test]
    async fn test_many_descendants_interleaves_roots() {
        let (provider, source) = remote();
        let state = Arc::new(State::initial(SessionId::from("local")));
        let get_state = move || state.clone();
        let a = source.context_to_thought_id(&["a"]).unwrap();
        let x = source.context_to_thought_id(&["x"]).unwrap();
        let fragments = get_many_descendants(
            &provider,
            vec![a.clone(), x.clone()],
            get_state,
            PullOptions {
                max_depth: None,
                prevent_loading_ancestors: true,
            },
        )
        .try_collect::<Vec<_>>()
        .await
        .unwrap();
        let ids = fragments
            .iter()
            .flat_map(|f| f.thought_index.keys().cloned())
            .collect::<BTreeSet<_>>();
        assert_eq!(ids.len(), 5);
        assert!(ids.contains(&a) && ids.contains(&x));
        assert!(!ids.contains(&ThoughtId::root()));
    }
}
