//! Parsed records, either indexed or keyed by a header.

use std::fmt;
use std::sync::Arc;

/// One logical row of parsed fields.
///
/// Without a header a record is indexed by position. With a header every
/// value is paired with a column name; missing values are `None`.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Record {
    values: Vec<Option<String>>,
    keys: Option<Arc<[String]>>,
}

/// A column addressed by position or by header name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnKey {
    Index(usize),
    Name(String),
}

impl From<usize> for ColumnKey {
    fn from(index: usize) -> Self {
        ColumnKey::Index(index)
    }
}

impl From<&str> for ColumnKey {
    fn from(name: &str) -> Self {
        ColumnKey::Name(name.to_string())
    }
}

impl From<String> for ColumnKey {
    fn from(name: String) -> Self {
        ColumnKey::Name(name)
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKey::Index(i) => write!(f, "#{i}"),
            ColumnKey::Name(n) => write!(f, "`{n}`"),
        }
    }
}

impl Record {
    /// An indexed record.
    pub fn new(fields: Vec<String>) -> Self {
        Self {
            values: fields.into_iter().map(Some).collect(),
            keys: None,
        }
    }

    /// A record keyed by `header`, padded with `None` or truncated to its width.
    pub fn with_header(fields: Vec<String>, header: Arc<[String]>) -> Self {
        let mut values: Vec<Option<String>> = fields.into_iter().map(Some).collect();
        values.resize(header.len(), None);
        Self {
            values,
            keys: Some(header),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True when values are paired with header names.
    pub fn is_associative(&self) -> bool {
        self.keys.is_some()
    }

    pub fn keys(&self) -> Option<&[String]> {
        self.keys.as_deref()
    }

    pub fn values(&self) -> &[Option<String>] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Option<String>> {
        self.values
    }

    /// Value at `index`, `None` when missing or padded.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.values.get(index)?.as_deref()
    }

    /// Value under the header name `name`.
    pub fn get_named(&self, name: &str) -> Option<&str> {
        let index = self.keys.as_ref()?.iter().position(|k| k == name)?;
        self.get(index)
    }

    /// Value addressed by `key`.
    pub fn value(&self, key: &ColumnKey) -> Option<&str> {
        match key {
            ColumnKey::Index(i) => self.get(*i),
            ColumnKey::Name(n) => self.get_named(n),
        }
    }

    /// Iterate over the values in order.
    pub fn iter(&self) -> impl Iterator<Item = Option<&str>> {
        self.values.iter().map(Option::as_deref)
    }

    /// Iterate over `(name, value)` pairs. Empty for indexed records.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.keys
            .iter()
            .flat_map(|keys| keys.iter())
            .map(String::as_str)
            .zip(self.iter())
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.keys {
            Some(_) => f.debug_map().entries(self.pairs()).finish(),
            None => f.debug_list().entries(self.iter()).finish(),
        }
    }
}

impl<const N: usize> PartialEq<[&str; N]> for Record {
    fn eq(&self, other: &[&str; N]) -> bool {
        self.eq(&other[..])
    }
}

impl PartialEq<[&str]> for Record {
    fn eq(&self, other: &[&str]) -> bool {
        self.values.len() == other.len()
            && self
                .values
                .iter()
                .zip(other)
                .all(|(v, o)| v.as_deref() == Some(*o))
    }
}

impl PartialEq<Vec<&str>> for Record {
    fn eq(&self, other: &Vec<&str>) -> bool {
        self.eq(other.as_slice())
    }
}

impl From<Vec<String>> for Record {
    fn from(fields: Vec<String>) -> Self {
        Self::new(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(names: &[&str]) -> Arc<[String]> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_indexed_record() {
        let record = Record::new(vec!["john".into(), "doe".into()]);
        assert!(!record.is_associative());
        assert_eq!(record.get(1), Some("doe"));
        assert_eq!(record.get(2), None);
        assert_eq!(record.get_named("firstname"), None);
        assert_eq!(record, ["john", "doe"]);
        assert_eq!(record.pairs().count(), 0);
    }

    #[test]
    fn test_header_pads_and_truncates() {
        let h = header(&["a", "b", "c"]);
        let short = Record::with_header(vec!["1".into()], h.clone());
        assert_eq!(short.values(), &[Some("1".to_string()), None, None]);
        assert_eq!(short.get_named("c"), None);

        let long = Record::with_header(
            vec!["1".into(), "2".into(), "3".into(), "4".into()],
            h.clone(),
        );
        assert_eq!(long.len(), 3);
        assert_eq!(long.value(&ColumnKey::from("b")), Some("2"));

        let empty = Record::with_header(Vec::new(), h);
        assert!(empty.iter().all(|v| v.is_none()));
    }

    #[test]
    fn test_pairs_and_debug() {
        let record = Record::with_header(vec!["x".into()], header(&["a", "b"]));
        let pairs: Vec<_> = record.pairs().collect();
        assert_eq!(pairs, vec![("a", Some("x")), ("b", None)]);
        assert_eq!(format!("{record:?}"), r#"{"a": Some("x"), "b": None}"#);
    }
}
