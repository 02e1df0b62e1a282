use std::collections::{BTreeMap, btree_map};

use serde::{Deserialize, Serialize};

use crate::{ContextValue, StaticCowStr};

/// A set of key/value pairs attached to log records.
///
/// Values may themselves be contexts, which makes a context a tree. Once a
/// context is installed on a logger it is shared behind an [`Arc`](std::sync::Arc)
/// and never mutated again; new scopes build new contexts with
/// [`Context::deep_merge`].
///
/// # Examples
///
/// ```
/// use context_redact_logger::Context;
///
/// let context = Context::new()
///     .record("request_id", "req-123")
///     .record("user", Context::new().record("id", 42));
/// assert_eq!(context.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context(BTreeMap<StaticCowStr, ContextValue>);

impl Context {
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Adds a record and returns the context, builder style.
    #[must_use]
    pub fn record(mut self, key: impl Into<StaticCowStr>, value: impl Into<ContextValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts a record, returning the value previously stored under `key`.
    pub fn insert(
        &mut self,
        key: impl Into<StaticCowStr>,
        value: impl Into<ContextValue>,
    ) -> Option<ContextValue> {
        self.0.insert(key.into(), value.into())
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.0.get(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, StaticCowStr, ContextValue> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|key| &**key)
    }

    /// Returns a new context with `overlay` deep-merged on top of `self`.
    ///
    /// Keys from `overlay` win. When both sides hold a nested map under the
    /// same key, the maps are merged recursively; any other value (including
    /// arrays) is replaced as a whole.
    ///
    /// ```
    /// use context_redact_logger::{Context, ContextValue};
    ///
    /// let base = Context::new().record("a", Context::new().record("x", 1).record("y", 2));
    /// let overlay = Context::new().record("a", Context::new().record("y", 3));
    ///
    /// let merged = base.deep_merge(&overlay);
    /// let a = merged.get("a").and_then(|a| a.as_map()).unwrap();
    /// assert_eq!(a.get("x"), Some(&ContextValue::from(1)));
    /// assert_eq!(a.get("y"), Some(&ContextValue::from(3)));
    /// ```
    #[must_use]
    pub fn deep_merge(&self, overlay: &Self) -> Self {
        let mut merged = self.clone();
        merged.deep_merge_from(overlay);
        merged
    }

    fn deep_merge_from(&mut self, overlay: &Self) {
        for (key, value) in overlay {
            if let ContextValue::Map(incoming) = value {
                if let Some(ContextValue::Map(existing)) = self.0.get_mut(key) {
                    existing.deep_merge_from(incoming);
                    continue;
                }
            }
            self.0.insert(key.clone(), value.clone());
        }
    }
}

impl<'a> IntoIterator for &'a Context {
    type Item = (&'a StaticCowStr, &'a ContextValue);
    type IntoIter = btree_map::Iter<'a, StaticCowStr, ContextValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for Context {
    type Item = (StaticCowStr, ContextValue);
    type IntoIter = btree_map::IntoIter<StaticCowStr, ContextValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<K, V> FromIterator<(K, V)> for Context
where
    K: Into<StaticCowStr>,
    V: Into<ContextValue>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for Context
where
    K: Into<StaticCowStr>,
    V: Into<ContextValue>,
{
    fn from(records: [(K, V); N]) -> Self {
        records.into_iter().collect()
    }
}
