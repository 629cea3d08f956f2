use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter},
    ops::Deref,
};

use crate::{error::OutlineError, properties::ThoughtId};

/// Shared behavior of [Path] and [SimplePath]. Both are an ordered chain of ids from a
/// root-adjacent ancestor down to a target; they differ only in the guarantee they carry.
macro_rules! id_chain {
    ($name:ident) => {
        impl $name {
            pub fn new(ids: Vec<ThoughtId>) -> Self {
                $name(ids)
            }

            /// The single-element path of the home context.
            pub fn home() -> Self {
                $name(vec![ThoughtId::root()])
            }

            /// The last element. Fails with [OutlineError::EmptyPath] on an empty path.
            pub fn head(&self) -> Result<&ThoughtId, OutlineError> {
                head(&self.0)
            }

            /// All but the last element.
            pub fn parent(&self) -> Self {
                $name(self.0[..self.0.len().saturating_sub(1)].to_vec())
            }

            /// Like [Self::parent], but a path of length one yields the home path instead of an
            /// empty path.
            pub fn rooted_parent(&self) -> Result<Self, OutlineError> {
                match self.0.len() {
                    0 => Err(OutlineError::EmptyPath),
                    1 => Ok($name::home()),
                    _ => Ok(self.parent()),
                }
            }

            /// Append ids, dropping a leading home sentinel so the result stays unrooted.
            pub fn append<I: IntoIterator<Item = ThoughtId>>(&self, ids: I) -> Self {
                let mut next = self.0.clone();
                next.extend(ids);
                $name(next).unroot()
            }

            /// Remove a leading home sentinel unless it is the only element.
            pub fn unroot(mut self) -> Self {
                if self.0.len() > 1 && self.0[0] == ThoughtId::root() {
                    self.0.remove(0);
                }
                self
            }

            /// True for the home path and for the empty path.
            pub fn is_root(&self) -> bool {
                self.0.is_empty() || (self.0.len() == 1 && self.0[0] == ThoughtId::root())
            }

            pub fn starts_with(&self, prefix: &[ThoughtId]) -> bool {
                self.0.starts_with(prefix)
            }

            pub fn contains_id(&self, id: &ThoughtId) -> bool {
                self.0.contains(id)
            }

            pub fn push(&mut self, id: ThoughtId) {
                self.0.push(id);
            }

            pub fn into_inner(self) -> Vec<ThoughtId> {
                self.0
            }
        }

        impl Deref for $name {
            type Target = [ThoughtId];

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl From<Vec<ThoughtId>> for $name {
            fn from(ids: Vec<ThoughtId>) -> Self {
                $name(ids)
            }
        }

        impl From<&[ThoughtId]> for $name {
            fn from(ids: &[ThoughtId]) -> Self {
                $name(ids.to_vec())
            }
        }

        impl FromIterator<ThoughtId> for $name {
            fn from_iter<T: IntoIterator<Item = ThoughtId>>(iter: T) -> Self {
                $name(iter.into_iter().collect())
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                let ids = self.0.iter().map(|id| id.as_str()).collect::<Vec<_>>();
                write!(f, "[{}]", ids.join(", "))
            }
        }
    };
}

/// A chain of thought ids that may cross one or more context-view boundaries.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(Vec<ThoughtId>);

/// A chain of thought ids that follows `parent_id` links exactly. Obtained from
/// [crate::paths::simplify_path] or from a parent walk.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimplePath(Vec<ThoughtId>);

id_chain!(Path);
id_chain!(SimplePath);

impl From<SimplePath> for Path {
    fn from(path: SimplePath) -> Self {
        Path(path.0)
    }
}

/// Last element of a chain.
pub fn head(path: &[ThoughtId]) -> Result<&ThoughtId, OutlineError> {
    path.last().ok_or(OutlineError::EmptyPath)
}

pub fn parent_of(path: &Path) -> Path {
    path.parent()
}

pub fn rooted_parent_of(path: &Path) -> Result<Path, OutlineError> {
    path.rooted_parent()
}
