//! Identifier generation and lexeme keys.
//!
//! [hash_thought] is the only way a value is turned into a [HashKey]. It must stay a pure
//! function of its input: every client derives lexeme keys independently and the keys only
//! deduplicate across devices if they agree byte for byte.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::{Display, Formatter};
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

use crate::properties::{ThoughtId, ABSOLUTE_TOKEN, ATTRIBUTE_PREFIX, EM_TOKEN, HOME_TOKEN};

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("static regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

/// Key of a [crate::properties::Lexeme] within the lexeme index.
#[derive(Clone, Debug, Serialize, Deserialize, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[serde(transparent)]
pub struct HashKey(String);

impl HashKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for HashKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for HashKey {
    fn from(key: &str) -> Self {
        HashKey(key.to_string())
    }
}

impl From<String> for HashKey {
    fn from(key: String) -> Self {
        HashKey(key)
    }
}

/// Generate a new globally unique thought id.
pub fn create_id() -> ThoughtId {
    ThoughtId::new()
}

/// Replace the character entities that escaped plain text can contain.
pub(crate) fn decode_entities(value: &str) -> String {
    value
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn collapse_whitespace(value: &str) -> String {
    WHITESPACE.replace_all(value.trim(), " ").to_string()
}

fn strip_punctuation(value: &str) -> String {
    let stripped: String = value
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    let stripped = collapse_whitespace(&stripped);
    // A value made only of punctuation is its own word.
    if stripped.is_empty() {
        value.to_string()
    } else {
        stripped
    }
}

/// Normalize a value into the form that determines its lexeme.
///
/// Markup is removed, diacritics are stripped, case and whitespace are folded, and punctuation
/// is dropped unless the value consists of nothing else. Meta attributes keep their `=`
/// prefix so `=sort` and `sort` remain distinct lexemes.
pub fn normalize_value(value: &str) -> String {
    if matches!(value, HOME_TOKEN | EM_TOKEN | ABSOLUTE_TOKEN) {
        return value.to_string();
    }
    let text = decode_entities(&HTML_TAG.replace_all(value, ""));
    let folded: String = text
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();
    let folded = collapse_whitespace(&folded);
    match folded.strip_prefix(ATTRIBUTE_PREFIX) {
        Some(rest) if !rest.is_empty() => format!("{ATTRIBUTE_PREFIX}{}", strip_punctuation(rest)),
        _ => strip_punctuation(&folded),
    }
}

/// Compute the lexeme key of a value.
pub fn hash_thought(value: &str) -> HashKey {
    let digest = Sha256::digest(normalize_value(value).as_bytes());
    HashKey(hex::encode(digest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_and_whitespace_share_lexeme() {
        assert_eq!(hash_thought("Foo"), hash_thought("foo"));
        assert_eq!(hash_thought("  foo   bar "), hash_thought("foo bar"));
        assert_ne!(hash_thought("foo"), hash_thought("bar"));
    }

    #[test]
    fn test_diacritics_and_punctuation() {
        assert_eq!(normalize_value("Café!"), "cafe");
        assert_eq!(hash_thought("naïve."), hash_thought("naive"));
        assert_eq!(normalize_value("?!"), "?!");
        assert_ne!(hash_thought("?"), hash_thought("!"));
    }

    #[test]
    fn test_markup_is_ignored() {
        assert_eq!(hash_thought("<b>Bold</b>"), hash_thought("bold"));
        assert_eq!(normalize_value("a&amp;b"), "ab");
    }

    #[test]
    fn test_attributes_and_sentinels() {
        assert_eq!(normalize_value("=Sort"), "=sort");
        assert_ne!(hash_thought("=sort"), hash_thought("sort"));
        assert_eq!(normalize_value(HOME_TOKEN), HOME_TOKEN);
        assert_ne!(hash_thought(HOME_TOKEN), hash_thought("root"));
    }

    #[test]
    fn test_hash_is_stable_hex() {
        let key = hash_thought("hello");
        assert_eq!(key.as_str().len(), 64);
        assert_eq!(key, hash_thought("hello"));
    }

    #[test]
    fn test_create_id_unique() {
        assert_ne!(create_id(), create_id());
    }
}
