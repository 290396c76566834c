//! Case-insensitive header storage.
//!
//! Keys are normalized to ASCII lowercase for lookup. The casing of the
//! first occurrence of a name is kept and used when the set is written out.
//! Repeated names keep every value in arrival order.

use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
struct HeaderEntry {
    name: String,
    values: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSet {
    entries: BTreeMap<String, HeaderEntry>,
}

fn normalize(name: &str) -> String {
    name.to_ascii_lowercase()
}

impl HeaderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every value stored under `name`.
    ///
    /// An existing entry keeps its original casing.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        self.entries
            .entry(normalize(&name))
            .and_modify(|e| e.values = vec![value.clone()])
            .or_insert_with(|| HeaderEntry {
                name,
                values: vec![value],
            });
    }

    /// Adds a value under `name`, keeping values already present.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        self.entries
            .entry(normalize(&name))
            .or_insert_with(|| HeaderEntry {
                name,
                values: Vec::new(),
            })
            .values
            .push(value);
    }

    /// First value stored under `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&normalize(name))
            .and_then(|e| e.values.first())
            .map(|v| v.as_str())
    }

    pub fn get_all(&self, name: &str) -> &[String] {
        self.entries
            .get(&normalize(name))
            .map(|e| e.values.as_slice())
            .unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&normalize(name))
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.entries.remove(&normalize(name)).map(|e| e.values)
    }

    /// Iterates `(name, value)` pairs using the stored casing. A name with
    /// several values is yielded once per value.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .values()
            .flat_map(|e| e.values.iter().map(move |v| (e.name.as_str(), v.as_str())))
    }

    /// Number of distinct header names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case() {
        let mut headers = HeaderSet::new();
        headers.append("Content-Type", "text/html");

        assert_eq!(headers.get("content-type"), Some("text/html"));
        assert_eq!(headers.get("CONTENT-TYPE"), Some("text/html"));
        assert!(headers.contains("Content-type"));
    }

    #[test]
    fn first_casing_wins_for_output() {
        let mut headers = HeaderSet::new();
        headers.append("X-Trace", "a");
        headers.append("x-trace", "b");

        let pairs: Vec<_> = headers.iter().collect();
        assert_eq!(pairs, vec![("X-Trace", "a"), ("X-Trace", "b")]);
        assert_eq!(headers.get_all("X-TRACE"), &["a".to_string(), "b".to_string()]);
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn insert_replaces_values() {
        let mut headers = HeaderSet::new();
        headers.append("Accept", "a");
        headers.append("Accept", "b");
        headers.insert("ACCEPT", "c");

        assert_eq!(headers.get_all("accept"), &["c".to_string()]);
        assert_eq!(headers.iter().next(), Some(("Accept", "c")));
    }

    #[test]
    fn remove_returns_values() {
        let mut headers = HeaderSet::new();
        headers.insert("Host", "example.com");

        assert_eq!(headers.remove("host"), Some(vec!["example.com".to_string()]));
        assert!(headers.is_empty());
        assert_eq!(headers.get("Host"), None);
    }
}
