use serde::{Deserialize, Deserializer};

/// Ordered multi-valued header collection.
///
/// Names are compared case-insensitively; the first-seen spelling of a name
/// is the one that is kept. Values keep their arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderCollection {
    entries: Vec<(String, Vec<String>)>,
}

impl HeaderCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value, merging with an existing header of the same name
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(idx) => self.entries[idx].1.push(value),
            None => self.entries.push((name, vec![value])),
        }
    }

    /// All values for a header, if present
    pub fn get_all(&self, name: &str) -> Option<&[String]> {
        self.position(name).map(|idx| self.entries[idx].1.as_slice())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Iterate `(name, values)` pairs in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Number of distinct header names
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(existing, _)| existing.eq_ignore_ascii_case(name))
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for HeaderCollection {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.append(name, value);
        }
        headers
    }
}

/// A header value on the wire: either a single string or a list of strings
#[derive(Deserialize)]
#[serde(untagged)]
enum WireValues {
    One(String),
    Many(Vec<String>),
}

/// A single `[name, value]` or `[name, [values...]]` wire entry
#[derive(Deserialize)]
struct WireEntry(String, WireValues);

impl<'de> Deserialize<'de> for HeaderCollection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = Vec::<WireEntry>::deserialize(deserializer)?;
        let mut headers = Self::new();
        for WireEntry(name, values) in entries {
            match values {
                WireValues::One(value) => headers.append(name, value),
                WireValues::Many(values) => {
                    for value in values {
                        headers.append(name.clone(), value);
                    }
                }
            }
        }
        Ok(headers)
    }
}
