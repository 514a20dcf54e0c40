use std::collections::{BTreeMap, HashMap};

/// A resolved `KEY=VALUE` binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: String,
    pub value: String,
    /// 1-based line of the assignment that produced the value, or 0 when the
    /// binding came from the seed.
    pub line: u32,
}

/// Quote character that wrapped a raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quote {
    /// Unquoted value: substitutions apply, no escape expansion.
    #[default]
    None,
    /// `'...'`: fully literal.
    Single,
    /// `"..."`: escapes are expanded and substitutions apply.
    Double,
}

/// Insertion-ordered environment mapping with unique keys.
///
/// Re-binding an existing key replaces its value in place, so the key keeps
/// the position of its first binding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvMap {
    entries: Vec<Entry>,
    by_key: HashMap<String, usize>,
}

impl EnvMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_entry(key).map(|entry| entry.value.as_str())
    }

    pub fn get_entry(&self, key: &str) -> Option<&Entry> {
        self.by_key.get(key).map(|idx| &self.entries[*idx])
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    /// Bind `key` to `value`, returning the previous value if any.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.insert_at(key.into(), value.into(), 0)
    }

    pub(crate) fn insert_at(&mut self, key: String, value: String, line: u32) -> Option<String> {
        if let Some(existing_idx) = self.by_key.get(&key).copied() {
            let entry = &mut self.entries[existing_idx];
            entry.line = line;
            return Some(std::mem::replace(&mut entry.value, value));
        }

        self.by_key.insert(key.clone(), self.entries.len());
        self.entries.push(Entry { key, value, line });
        None
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(key, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|entry| (entry.key.as_str(), entry.value.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.key.as_str())
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<Entry> {
        self.entries
    }
}

impl<K, V> FromIterator<(K, V)> for EnvMap
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<K, V> Extend<(K, V)> for EnvMap
where
    K: Into<String>,
    V: Into<String>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl IntoIterator for EnvMap {
    type Item = (String, String);
    type IntoIter = std::iter::Map<std::vec::IntoIter<Entry>, fn(Entry) -> (String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        fn split(entry: Entry) -> (String, String) {
            (entry.key, entry.value)
        }
        self.entries.into_iter().map(split as fn(Entry) -> (String, String))
    }
}

impl From<EnvMap> for BTreeMap<String, String> {
    fn from(value: EnvMap) -> Self {
        value.into_iter().collect()
    }
}

impl From<EnvMap> for HashMap<String, String> {
    fn from(value: EnvMap) -> Self {
        value.into_iter().collect()
    }
}
