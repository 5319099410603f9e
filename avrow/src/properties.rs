use std::collections::HashMap;

/// Table property holding the schema text inline.
pub const SCHEMA_LITERAL: &str = "schema.literal";
/// Table property holding the location of the schema, consulted when no literal is present.
pub const SCHEMA_URL: &str = "schema.url";

/// The string key/value properties attached to a table by the host engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableProperties {
    inner: HashMap<String, String>,
}

impl TableProperties {
    /// Create an empty set of properties.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`TableProperties::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set a property, returning the previous value if there was one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.inner.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl From<HashMap<String, String>> for TableProperties {
    fn from(inner: HashMap<String, String>) -> Self {
        Self { inner }
    }
}

impl<K, V> FromIterator<(K, V)> for TableProperties
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            inner: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
