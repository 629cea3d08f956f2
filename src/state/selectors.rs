//! Read-only queries over [State].

use std::{
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet},
};

use crate::{
    hashing::{hash_thought, HashKey},
    paths::SimplePath,
    properties::{ChildKey, Lexeme, Thought, ThoughtId},
    state::State,
};

pub const SORT_ATTRIBUTE: &str = "=sort";
pub const ALPHABETICAL: &str = "Alphabetical";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortPreference {
    /// Children are shown in rank order.
    None,
    Alphabetical(SortDirection),
}

/// Order by `(rank, id)`. Ranks are finite by construction, `total_cmp` keeps the order total
/// regardless.
fn by_rank(a: &Thought, b: &Thought) -> Ordering {
    a.rank.total_cmp(&b.rank).then_with(|| a.id.cmp(&b.id))
}

/// Midpoint of two ranks, or None once floating point can no longer separate them.
pub fn rank_between(lower: f64, upper: f64) -> Option<f64> {
    let mid = lower + (upper - lower) / 2.0;
    (mid > lower && mid < upper).then_some(mid)
}

impl State {
    pub fn get_thought(&self, id: &ThoughtId) -> Option<&Thought> {
        self.thoughts.thought_index.get(id)
    }

    pub fn get_lexeme_by_key(&self, key: &HashKey) -> Option<&Lexeme> {
        self.thoughts.lexeme_index.get(key)
    }

    /// The lexeme that `value` normalizes to.
    pub fn get_lexeme(&self, value: &str) -> Option<&Lexeme> {
        self.get_lexeme_by_key(&hash_thought(value))
    }

    /// Ids of every thought whose value normalizes to the same lexeme as `value`.
    pub fn get_contexts(&self, value: &str) -> Vec<ThoughtId> {
        self.get_lexeme(value)
            .map(|lexeme| lexeme.contexts.clone())
            .unwrap_or_default()
    }

    /// Loaded children in children-map order. Children that are not loaded yet are skipped.
    pub fn get_all_children(&self, id: &ThoughtId) -> Vec<&Thought> {
        self.get_thought(id)
            .map(|thought| {
                thought
                    .child_ids()
                    .filter_map(|child| self.get_thought(child))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn get_children_ranked(&self, id: &ThoughtId) -> Vec<&Thought> {
        let mut children = self.get_all_children(id);
        children.sort_by(|a, b| by_rank(a, b));
        children
    }

    /// True if the thought has a meta attribute child named `name`.
    pub fn has_attribute(&self, id: &ThoughtId, name: &str) -> bool {
        self.attribute_id(id, name).is_some()
    }

    /// Id of the attribute child `name` of the thought.
    pub fn attribute_id(&self, id: &ThoughtId, name: &str) -> Option<&ThoughtId> {
        self.get_thought(id)?
            .children_map
            .get(&ChildKey::Attribute(name.to_string()))
    }

    /// Value of an attribute: the first ranked child of the attribute child.
    pub fn attribute(&self, id: &ThoughtId, name: &str) -> Option<&str> {
        let attribute = self.attribute_id(id, name)?;
        self.get_children_ranked(attribute)
            .first()
            .map(|child| child.value.as_str())
    }

    /// Reads `=sort/Alphabetical[/Asc|Desc]`.
    pub fn get_sort_preference(&self, id: &ThoughtId) -> SortPreference {
        let Some(sort_id) = self.attribute_id(id, SORT_ATTRIBUTE) else {
            return SortPreference::None;
        };
        let Some(kind) = self
            .get_children_ranked(sort_id)
            .into_iter()
            .find(|child| child.value == ALPHABETICAL)
        else {
            return SortPreference::None;
        };
        let direction = match self.get_children_ranked(&kind.id).first() {
            Some(child) if child.value == "Desc" => SortDirection::Desc,
            _ => SortDirection::Asc,
        };
        SortPreference::Alphabetical(direction)
    }

    /// Children in display order.
    ///
    /// With an alphabetical sort preference, non-empty children are ordered by lowercase value
    /// (ties by rank, then id) and every empty child stays directly after its nearest non-empty
    /// predecessor in rank order, or at the top if it has none. A freshly inserted blank thus
    /// appears where it was created rather than jumping to the start of the list.
    pub fn get_children_sorted(&self, id: &ThoughtId) -> Vec<&Thought> {
        let ranked = self.get_children_ranked(id);
        let direction = match self.get_sort_preference(id) {
            SortPreference::None => return ranked,
            SortPreference::Alphabetical(direction) => direction,
        };

        let mut leading = Vec::new();
        let mut anchored: BTreeMap<&ThoughtId, Vec<&Thought>> = BTreeMap::new();
        let mut non_empty = Vec::new();
        let mut last_non_empty: Option<&ThoughtId> = None;
        for child in ranked.iter().copied() {
            if child.value.is_empty() {
                match last_non_empty {
                    Some(anchor) => anchored.entry(anchor).or_default().push(child),
                    None => leading.push(child),
                }
            } else {
                non_empty.push(child);
                last_non_empty = Some(&child.id);
            }
        }

        non_empty.sort_by(|a, b| {
            let by_value = a.value.to_lowercase().cmp(&b.value.to_lowercase());
            let by_value = match direction {
                SortDirection::Asc => by_value,
                SortDirection::Desc => by_value.reverse(),
            };
            by_value.then_with(|| by_rank(a, b))
        });

        let mut sorted = leading;
        for child in non_empty {
            sorted.push(child);
            if let Some(empties) = anchored.remove(&child.id) {
                sorted.extend(empties);
            }
        }
        sorted
    }

    /// First loaded child of `parent_id` with exactly this value, other than `except`.
    pub fn find_child_by_value(
        &self,
        parent_id: &ThoughtId,
        value: &str,
        except: Option<&ThoughtId>,
    ) -> Option<&Thought> {
        self.get_children_ranked(parent_id)
            .into_iter()
            .find(|child| child.value == value && Some(&child.id) != except)
    }

    /// Ancestor chain of a thought via `parent_id`, excluding the home sentinel.
    ///
    /// The walk stops early at the first ancestor that is not loaded, so the result is best
    /// effort while ancestors are still pending.
    pub fn thought_to_path(&self, id: &ThoughtId) -> SimplePath {
        if *id == ThoughtId::root() {
            return SimplePath::home();
        }
        let mut ids = vec![id.clone()];
        let mut visited = BTreeSet::from([id.clone()]);
        let mut current = self.get_thought(id);
        while let Some(thought) = current {
            let parent = &thought.parent_id;
            if parent.is_root_parent() || *parent == ThoughtId::root() {
                break;
            }
            if !visited.insert(parent.clone()) {
                tracing::warn!("[thought_to_path] parent cycle detected at {parent}");
                break;
            }
            ids.push(parent.clone());
            current = self.get_thought(parent);
        }
        ids.reverse();
        SimplePath::new(ids)
    }

    /// Ancestor values of a thought including its own, excluding the home sentinel.
    pub fn thought_to_context(&self, id: &ThoughtId) -> Option<Vec<String>> {
        self.get_thought(id)?;
        self.thought_to_path(id)
            .iter()
            .map(|id| self.get_thought(id).map(|thought| thought.value.clone()))
            .collect()
    }

    /// Resolve a chain of values from the home context to a path of ids by following the first
    /// child with each value.
    pub fn context_to_path<S: AsRef<str>>(&self, context: &[S]) -> Option<SimplePath> {
        let mut parent = ThoughtId::root();
        let mut ids = Vec::with_capacity(context.len());
        for value in context {
            let child = self.find_child_by_value(&parent, value.as_ref(), None)?;
            parent = child.id.clone();
            ids.push(child.id.clone());
        }
        Some(SimplePath::new(ids))
    }

    pub fn context_to_thought_id<S: AsRef<str>>(&self, context: &[S]) -> Option<ThoughtId> {
        match context.is_empty() {
            true => Some(ThoughtId::root()),
            false => self.context_to_path(context)?.last().cloned(),
        }
    }

    fn siblings_of(&self, id: &ThoughtId) -> Option<(Vec<&Thought>, usize)> {
        let thought = self.get_thought(id)?;
        let siblings = self.get_children_ranked(&thought.parent_id);
        let index = siblings.iter().position(|sibling| sibling.id == *id)?;
        Some((siblings, index))
    }

    /// Previous sibling in rank order.
    pub fn prev_sibling(&self, id: &ThoughtId) -> Option<&Thought> {
        let (siblings, index) = self.siblings_of(id)?;
        index.checked_sub(1).map(|prev| siblings[prev])
    }

    /// Next sibling in rank order.
    pub fn next_sibling(&self, id: &ThoughtId) -> Option<&Thought> {
        let (siblings, index) = self.siblings_of(id)?;
        siblings.get(index + 1).copied()
    }

    /// A rank strictly between the thought and its previous sibling. None if the thought is
    /// not loaded or the two ranks are too close to split.
    pub fn get_rank_before(&self, id: &ThoughtId) -> Option<f64> {
        let thought = self.get_thought(id)?;
        match self.prev_sibling(id) {
            Some(prev) => rank_between(prev.rank, thought.rank),
            None => Some(thought.rank - 1.0),
        }
    }

    /// A rank strictly between the thought and its next sibling.
    pub fn get_rank_after(&self, id: &ThoughtId) -> Option<f64> {
        let thought = self.get_thought(id)?;
        match self.next_sibling(id) {
            Some(next) => rank_between(thought.rank, next.rank),
            None => Some(thought.rank + 1.0),
        }
    }

    /// A rank after every child of `parent_id`.
    pub fn get_next_rank(&self, parent_id: &ThoughtId) -> f64 {
        self.get_children_ranked(parent_id)
            .last()
            .map(|last| last.rank + 1.0)
            .unwrap_or(0.0)
    }

    /// A rank before every child of `parent_id`.
    pub fn get_prev_rank(&self, parent_id: &ThoughtId) -> f64 {
        self.get_children_ranked(parent_id)
            .first()
            .map(|first| first.rank - 1.0)
            .unwrap_or(0.0)
    }

    /// True if `ancestor` appears on the parent chain of `id`, or is `id` itself.
    pub fn is_descendant_or_self(&self, id: &ThoughtId, ancestor: &ThoughtId) -> bool {
        let mut visited = BTreeSet::new();
        let mut current = Some(id.clone());
        while let Some(next) = current {
            if next == *ancestor {
                return true;
            }
            if !visited.insert(next.clone()) {
                return false;
            }
            current = self.get_thought(&next).map(|thought| thought.parent_id.clone());
        }
        false
    }

    /// Ids of every loaded thought that is still a pending placeholder.
    pub fn pending_ids(&self) -> Vec<ThoughtId> {
        self.thoughts
            .thought_index
            .values()
            .filter(|thought| thought.pending)
            .map(|thought| thought.id.clone())
            .collect()
    }
}
