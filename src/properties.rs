/// [crate::properties] contains the basic building blocks of the thought graph: identifiers,
/// the per-placement [Thought] record, the deduplicated [Lexeme] record and the
/// [ThoughtIndices] pair that is exchanged with persistence providers.
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter},
    time::{SystemTime, UNIX_EPOCH},
};
use uuid::Uuid;

use crate::hashing::HashKey;

/// Id and value of the home context.
pub const HOME_TOKEN: &str = "__ROOT__";
/// Id and value of the metaprogramming/settings root.
pub const EM_TOKEN: &str = "__EM__";
/// Id and value of the alternate root namespace.
pub const ABSOLUTE_TOKEN: &str = "__ABSOLUTE__";
/// Parent id of the three root sentinels.
pub const ROOT_PARENT_ID: &str = "__ROOT_PARENT_ID__";

/// Values starting with this prefix are meta attributes (`=sort`, `=pin`, ...).
pub const ATTRIBUTE_PREFIX: char = '=';

pub const SCHEMA_LATEST: u32 = 7;

/// Opaque thought identifier.
///
/// Ids are generated as random (v4) UUIDs so that clients never need to coordinate. The root
/// sentinels use their token as id.
#[derive(Clone, Debug, Serialize, Deserialize, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ThoughtId(String);

impl ThoughtId {
    pub fn new() -> Self {
        ThoughtId(
            Uuid::new_v4()
                .simple()
                .encode_lower(&mut Uuid::encode_buffer())
                .to_string(),
        )
    }

    pub fn root() -> Self {
        ThoughtId(HOME_TOKEN.to_string())
    }

    pub fn em() -> Self {
        ThoughtId(EM_TOKEN.to_string())
    }

    pub fn absolute() -> Self {
        ThoughtId(ABSOLUTE_TOKEN.to_string())
    }

    pub fn root_parent() -> Self {
        ThoughtId(ROOT_PARENT_ID.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for ROOT, EM and ABSOLUTE.
    pub fn is_root_sentinel(&self) -> bool {
        matches!(self.0.as_str(), HOME_TOKEN | EM_TOKEN | ABSOLUTE_TOKEN)
    }

    pub fn is_root_parent(&self) -> bool {
        self.0 == ROOT_PARENT_ID
    }
}

impl Default for ThoughtId {
    fn default() -> Self {
        ThoughtId::new()
    }
}

impl Display for ThoughtId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ThoughtId {
    fn from(id: &str) -> Self {
        ThoughtId(id.to_string())
    }
}

impl From<String> for ThoughtId {
    fn from(id: String) -> Self {
        ThoughtId(id)
    }
}

impl From<Uuid> for ThoughtId {
    fn from(id: Uuid) -> Self {
        ThoughtId(id.simple().encode_lower(&mut Uuid::encode_buffer()).to_string())
    }
}

impl AsRef<str> for ThoughtId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Milliseconds since the unix epoch.
#[derive(
    Clone, Copy, Debug, Default, Serialize, Deserialize, Hash, PartialEq, Eq, PartialOrd, Ord,
)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or_default();
        Timestamp(millis)
    }

    /// The beginning of the epoch. Anything persisted is newer than `never`.
    pub fn never() -> Self {
        Timestamp(0)
    }

    pub fn from_millis(millis: i64) -> Self {
        Timestamp(millis)
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies the client session that produced a write. Used as the tie-breaker for
/// last-writer-wins reconciliation.
#[derive(Clone, Debug, Serialize, Deserialize, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        SessionId(
            Uuid::new_v4()
                .simple()
                .encode_lower(&mut Uuid::encode_buffer())
                .to_string(),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        SessionId::new()
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        SessionId(id.to_string())
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Returns true if the value is a meta attribute such as `=sort`.
pub fn is_attribute(value: &str) -> bool {
    value.len() > 1 && value.starts_with(ATTRIBUTE_PREFIX)
}

/// Key of a child within [Thought::children_map].
///
/// Meta attributes are keyed by their literal value so that a thought has at most one child
/// per attribute name. Everything else, including a second child with the same attribute value,
/// is keyed by id. Serialized as a plain string so it can be used as a JSON object key.
#[derive(Clone, Debug, Serialize, Deserialize, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[serde(from = "String", into = "String")]
pub enum ChildKey {
    Id(ThoughtId),
    Attribute(String),
}

impl ChildKey {
    /// Classify a child by value. `taken` reports whether the attribute key is already used
    /// by a different child.
    pub fn classify(id: &ThoughtId, value: &str, taken: impl Fn(&ChildKey) -> bool) -> ChildKey {
        if is_attribute(value) {
            let key = ChildKey::Attribute(value.to_string());
            if !taken(&key) {
                return key;
            }
        }
        ChildKey::Id(id.clone())
    }
}

impl From<String> for ChildKey {
    fn from(key: String) -> Self {
        if is_attribute(&key) {
            ChildKey::Attribute(key)
        } else {
            ChildKey::Id(ThoughtId::from(key))
        }
    }
}

impl From<ChildKey> for String {
    fn from(key: ChildKey) -> Self {
        match key {
            ChildKey::Id(id) => id.0,
            ChildKey::Attribute(value) => value,
        }
    }
}

pub type ChildrenMap = BTreeMap<ChildKey, ThoughtId>;

/// Build a children map for the given `(id, value)` pairs in order.
pub fn create_children_map<'a, I>(children: I) -> ChildrenMap
where
    I: IntoIterator<Item = (&'a ThoughtId, &'a str)>,
{
    let mut map = ChildrenMap::new();
    for (id, value) in children {
        let key = ChildKey::classify(id, value, |k| map.contains_key(k));
        map.insert(key, id.clone());
    }
    map
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// One placement of a value in the context tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thought {
    pub id: ThoughtId,
    pub value: String,
    pub rank: f64,
    pub parent_id: ThoughtId,
    #[serde(default)]
    pub children_map: ChildrenMap,
    /// Placeholder awaiting data from the persistence provider. The children map is not
    /// complete while this is set.
    #[serde(default, skip_serializing_if = "is_false")]
    pub pending: bool,
    pub last_updated: Timestamp,
    pub updated_by: SessionId,
}

impl Thought {
    pub fn new(
        id: ThoughtId,
        value: impl Into<String>,
        rank: f64,
        parent_id: ThoughtId,
        last_updated: Timestamp,
        updated_by: SessionId,
    ) -> Self {
        Thought {
            id,
            value: value.into(),
            rank,
            parent_id,
            children_map: ChildrenMap::new(),
            pending: false,
            last_updated,
            updated_by,
        }
    }

    pub fn child_ids(&self) -> impl Iterator<Item = &ThoughtId> {
        self.children_map.values()
    }

    pub fn has_child(&self, id: &ThoughtId) -> bool {
        self.children_map.values().any(|child| child == id)
    }

    /// The key under which `id` is stored, if it is a child.
    pub fn child_key(&self, id: &ThoughtId) -> Option<ChildKey> {
        self.children_map
            .iter()
            .find(|(_, child)| *child == id)
            .map(|(key, _)| key.clone())
    }

    /// Add a child, keyed according to its value. Re-adding an existing child re-keys it.
    pub fn add_child(&mut self, id: &ThoughtId, value: &str) {
        self.remove_child(id);
        let key = ChildKey::classify(id, value, |k| self.children_map.contains_key(k));
        self.children_map.insert(key, id.clone());
    }

    pub fn remove_child(&mut self, id: &ThoughtId) -> bool {
        match self.child_key(id) {
            Some(key) => self.children_map.remove(&key).is_some(),
            None => false,
        }
    }

    /// Last-writer-wins ordering key.
    pub fn stamp(&self) -> (Timestamp, &SessionId) {
        (self.last_updated, &self.updated_by)
    }
}

/// The deduplicated record of a normalized value, listing every thought whose value
/// normalizes to it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lexeme {
    pub lemma: String,
    #[serde(default)]
    pub contexts: Vec<ThoughtId>,
    pub created: Timestamp,
    pub last_updated: Timestamp,
    pub updated_by: SessionId,
}

impl Lexeme {
    pub fn new(lemma: impl Into<String>, created: Timestamp, updated_by: SessionId) -> Self {
        Lexeme {
            lemma: lemma.into(),
            contexts: Vec::new(),
            created,
            last_updated: created,
            updated_by,
        }
    }

    /// Append a context unless it is already listed.
    pub fn add_context(&mut self, id: &ThoughtId) -> bool {
        if self.contexts.contains(id) {
            false
        } else {
            self.contexts.push(id.clone());
            true
        }
    }

    pub fn remove_context(&mut self, id: &ThoughtId) -> bool {
        let len = self.contexts.len();
        self.contexts.retain(|cx| cx != id);
        len != self.contexts.len()
    }

    pub fn stamp(&self) -> (Timestamp, &SessionId) {
        (self.last_updated, &self.updated_by)
    }
}

/// The unit of synchronization: the full placement graph and the lexeme reverse index.
///
/// Used as the in-memory state, as the payload exchanged with [crate::sync::DataProvider]s
/// and as the full-state dump format.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThoughtIndices {
    #[serde(default)]
    pub thought_index: BTreeMap<ThoughtId, Thought>,
    #[serde(default)]
    pub lexeme_index: BTreeMap<HashKey, Lexeme>,
}

impl ThoughtIndices {
    pub fn is_empty(&self) -> bool {
        self.thought_index.is_empty() && self.lexeme_index.is_empty()
    }

    pub fn len(&self) -> usize {
        self.thought_index.len() + self.lexeme_index.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_attribute() {
        assert!(is_attribute("=sort"));
        assert!(is_attribute("=pin"));
        assert!(!is_attribute("="));
        assert!(!is_attribute("sort"));
        assert!(!is_attribute(""));
    }

    #[test]
    fn test_children_map_keys_attributes_once() {
        let a = ThoughtId::from("a");
        let b = ThoughtId::from("b");
        let c = ThoughtId::from("c");
        let map = create_children_map([(&a, "=pin"), (&b, "=pin"), (&c, "hello")]);
        assert_eq!(map.len(), 3);
        assert_eq!(map.get(&ChildKey::Attribute("=pin".into())), Some(&a));
        assert_eq!(map.get(&ChildKey::Id(b.clone())), Some(&b));
        assert_eq!(map.get(&ChildKey::Id(c.clone())), Some(&c));
    }

    #[test]
    fn test_add_child_rekeys() {
        let mut parent = Thought::new(
            ThoughtId::root(),
            HOME_TOKEN,
            0.0,
            ThoughtId::root_parent(),
            Timestamp::never(),
            SessionId::from("s"),
        );
        let child = ThoughtId::from("x");
        parent.add_child(&child, "plain");
        assert_eq!(parent.child_key(&child), Some(ChildKey::Id(child.clone())));
        parent.add_child(&child, "=readonly");
        assert_eq!(parent.children_map.len(), 1);
        assert_eq!(
            parent.child_key(&child),
            Some(ChildKey::Attribute("=readonly".into()))
        );
        assert!(parent.remove_child(&child));
        assert!(parent.children_map.is_empty());
    }

    #[test]
    fn test_thought_indices_json_shape() {
        let mut indices = ThoughtIndices::default();
        let mut root = Thought::new(
            ThoughtId::root(),
            HOME_TOKEN,
            0.0,
            ThoughtId::root_parent(),
            Timestamp::never(),
            SessionId::from("s"),
        );
        root.add_child(&ThoughtId::from("k"), "=sort");
        indices.thought_index.insert(root.id.clone(), root);
        let json = serde_json::to_string(&indices).unwrap();
        assert!(json.starts_with(r#"{"thoughtIndex":{"__ROOT__":{"#));
        assert!(json.contains(r#""childrenMap":{"=sort":"k"}"#));
        assert!(json.contains(r#""parentId":"__ROOT_PARENT_ID__""#));
        assert!(!json.contains("pending"));

        let parsed: ThoughtIndices = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, indices);
    }
}
