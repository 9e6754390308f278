//! Ordered procedure parameters

use indexmap::map::{IntoIter, Iter};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Named parameters of one procedure call.
///
/// Insertion order is significant: it is the positional argument order of the
/// generated `CALL endpoint($a, $b, ...)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallParameters(IndexMap<String, Value>);

impl CallParameters {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Insert or replace a parameter; a replaced key keeps its position
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.0.get_mut(key)
    }

    /// Remove a parameter, keeping the order of the others
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> Iter<'_, String, Value> {
        self.0.iter()
    }

    /// `$a, $b, $c` in parameter order
    pub fn placeholder_str(&self) -> String {
        self.0
            .keys()
            .map(|k| format!("${}", k))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn as_map(&self) -> &IndexMap<String, Value> {
        &self.0
    }

    pub fn into_inner(self) -> IndexMap<String, Value> {
        self.0
    }
}

impl From<IndexMap<String, Value>> for CallParameters {
    fn from(map: IndexMap<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for CallParameters {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for CallParameters {
    type Item = (String, Value);
    type IntoIter = IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a CallParameters {
    type Item = (&'a String, &'a Value);
    type IntoIter = Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// `undirected_relationship_types` -> `undirectedRelationshipTypes`
pub fn snake_to_camel(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for ch in name.chars() {
        if ch == '_' {
            upper_next = !out.is_empty();
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_placeholder_order() {
        let params = CallParameters::new()
            .with("graph_name", "g")
            .with("query", "RETURN 1")
            .with("concurrency", 4);
        assert_eq!(params.placeholder_str(), "$graph_name, $query, $concurrency");
        assert_eq!(CallParameters::new().placeholder_str(), "");
    }

    #[test]
    fn test_replace_keeps_position_and_remove_keeps_order() {
        let mut params = CallParameters::new()
            .with("a", 1)
            .with("b", 2)
            .with("c", 3);

        params.insert("a", 10);
        assert_eq!(params.keys().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(params.get("a"), Some(&json!(10)));

        params.remove("b");
        assert_eq!(params.keys().collect::<Vec<_>>(), vec!["a", "c"]);
    }

    #[test]
    fn test_serializes_as_object() {
        let params = CallParameters::new().with("x", true);
        assert_eq!(serde_json::to_value(&params).unwrap(), json!({"x": true}));
    }

    #[test]
    fn test_snake_to_camel() {
        assert_eq!(snake_to_camel("concurrency"), "concurrency");
        assert_eq!(
            snake_to_camel("undirected_relationship_types"),
            "undirectedRelationshipTypes"
        );
        assert_eq!(snake_to_camel("alreadyCamel"), "alreadyCamel");
        assert_eq!(snake_to_camel("_private_key"), "privateKey");
    }
}
