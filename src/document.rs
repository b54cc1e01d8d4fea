//! The normalized feed document.
//!
//! Whatever the source format, a parsed feed ends up as an ordered key-value
//! tree whose root is always a mapping. [`Document`] enforces that invariant
//! at construction; everything below the root is an arbitrary
//! [`serde_json::Value`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Returned when a value that is not a JSON object is turned into a [`Document`].
#[derive(Debug, Error)]
#[error("document root must be a mapping, found {0}")]
pub struct NotAMapping(&'static str);

/// Ordered key-value tree with a mapping at the root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Follows a path of object keys from the root.
    pub fn get_path(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        rest.iter()
            .try_fold(self.0.get(*first)?, |node, key| node.as_object()?.get(*key))
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    /// Removes the value at `path`, returning it if it was present.
    ///
    /// Intermediate nodes that are missing or not objects make this a no-op.
    /// Sibling order is preserved.
    pub fn remove_path(&mut self, path: &[&str]) -> Option<Value> {
        let (last, parents) = path.split_last()?;
        let mut node = &mut self.0;
        for key in parents {
            node = node.get_mut(*key)?.as_object_mut()?;
        }
        node.shift_remove(*last)
    }

    /// Serializes with two-space indentation.
    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.0)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Document {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for Document {
    type Error = NotAMapping;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Array(_) => Err(NotAMapping("an array")),
            Value::String(_) => Err(NotAMapping("a string")),
            Value::Number(_) => Err(NotAMapping("a number")),
            Value::Bool(_) => Err(NotAMapping("a boolean")),
            Value::Null => Err(NotAMapping("null")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        Document::try_from(value).unwrap()
    }

    #[test]
    fn test_root_must_be_mapping() {
        assert!(Document::try_from(json!([1, 2])).is_err());
        assert!(Document::try_from(json!("feed")).is_err());
        assert!(Document::try_from(json!(null)).is_err());
        assert!(Document::try_from(json!({})).is_ok());
    }

    #[test]
    fn test_not_a_mapping_message() {
        let err = Document::try_from(json!([1])).unwrap_err();
        assert_eq!(err.to_string(), "document root must be a mapping, found an array");
    }

    #[test]
    fn test_remove_path_nested() {
        let mut d = doc(json!({
            "rss": {"channel": {"title": "T", "lastBuildDate": "x", "link": "L"}}
        }));
        assert_eq!(
            d.remove_path(&["rss", "channel", "lastBuildDate"]),
            Some(json!("x"))
        );
        assert_eq!(
            d.into_value(),
            json!({"rss": {"channel": {"title": "T", "link": "L"}}})
        );
    }

    #[test]
    fn test_remove_path_preserves_sibling_order() {
        let mut d = doc(json!({"a": 1, "published": 2, "b": 3, "c": 4}));
        d.remove_path(&["published"]);
        let keys: Vec<_> = d.as_map().keys().cloned().collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_remove_path_missing_is_noop() {
        let original = doc(json!({"rss": {"channel": "scalar"}}));
        let mut d = original.clone();
        assert_eq!(d.remove_path(&["rss", "channel", "lastBuildDate"]), None);
        assert_eq!(d.remove_path(&["nope"]), None);
        assert_eq!(d.remove_path(&[]), None);
        assert_eq!(d, original);
    }

    #[test]
    fn test_get_path() {
        let d = doc(json!({"feed": {"title": {"_": "T", "$": {"type": "text"}}}}));
        assert_eq!(d.get_path(&["feed", "title", "_"]), Some(&json!("T")));
        assert_eq!(d.get_path(&["feed", "missing"]), None);
    }

    #[test]
    fn test_pretty_json_uses_two_spaces() {
        let d = doc(json!({"title": "Test Feed"}));
        assert_eq!(d.to_pretty_json().unwrap(), "{\n  \"title\": \"Test Feed\"\n}");
    }

    fn arb_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            "[a-zA-Z0-9 :<>&\"]{0,12}".prop_map(Value::String),
        ];
        leaf.prop_recursive(4, 32, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::vec(("[a-z:$_]{1,8}", inner), 0..4)
                    .prop_map(|pairs| Value::Object(pairs.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn prop_json_round_trip(pairs in prop::collection::vec(("[a-z]{1,6}", arb_value()), 0..5)) {
            let original = Document::from(pairs.into_iter().collect::<Map<_, _>>());
            let text = original.to_pretty_json().unwrap();
            let reparsed: Document = serde_json::from_str(&text).unwrap();
            prop_assert_eq!(reparsed, original);
        }
    }
}
