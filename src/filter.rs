//! Named byte transforms applied while a document is read or written.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

type TransformFn = dyn Fn(&[u8]) -> Vec<u8> + Send + Sync;

/// A named byte-in/byte-out transform.
///
/// On the read path a filter is applied to every physical line, terminator
/// included. On the write path it is applied to every serialized record.
#[derive(Clone)]
pub struct StreamFilter {
    name: String,
    transform: Arc<TransformFn>,
}

impl StreamFilter {
    /// Create a filter from a name and a transform function.
    pub fn new<F>(name: impl Into<String>, transform: F) -> Self
    where
        F: Fn(&[u8]) -> Vec<u8> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            transform: Arc::new(transform),
        }
    }

    /// ASCII upper-casing (`string.toupper`).
    pub fn to_upper() -> Self {
        Self::new("string.toupper", <[u8]>::to_ascii_uppercase)
    }

    /// ASCII lower-casing (`string.tolower`).
    pub fn to_lower() -> Self {
        Self::new("string.tolower", <[u8]>::to_ascii_lowercase)
    }

    /// ROT13 over ASCII letters (`string.rot13`).
    pub fn rot13() -> Self {
        Self::new("string.rot13", |input| input.iter().map(|&b| rot13(b)).collect())
    }

    /// Replace every occurrence of `from` with `to` (`string.replace`).
    pub fn replace(from: impl Into<Vec<u8>>, to: impl Into<Vec<u8>>) -> Self {
        let from = from.into();
        let to = to.into();
        Self::new("string.replace", move |input| replace_all(input, &from, &to))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the transform over `input`.
    #[inline]
    pub fn apply(&self, input: &[u8]) -> Vec<u8> {
        (self.transform)(input)
    }
}

impl fmt::Debug for StreamFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamFilter")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Ordered sequence of stream filters, applied in registration order.
#[derive(Debug, Clone, Default)]
pub struct TransformChain {
    filters: Vec<StreamFilter>,
}

impl TransformChain {
    pub const fn new() -> Self {
        Self {
            filters: Vec::new(),
        }
    }

    /// Append a filter at the end of the chain.
    pub fn push(&mut self, filter: StreamFilter) {
        self.filters.push(filter);
    }

    /// Remove every filter registered under `name`. Returns true if any was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.filters.len();
        self.filters.retain(|f| f.name() != name);
        before != self.filters.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.filters.iter().any(|f| f.name() == name)
    }

    pub fn clear(&mut self) {
        self.filters.clear();
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Filter names in application order.
    pub fn names(&self) -> Vec<String> {
        self.filters.iter().map(|f| f.name().to_string()).collect()
    }

    /// Run `input` through every filter. Borrows the input when the chain is empty.
    pub fn apply<'a>(&self, input: &'a [u8]) -> Cow<'a, [u8]> {
        let mut output = Cow::Borrowed(input);
        for filter in &self.filters {
            output = Cow::Owned(filter.apply(&output));
        }
        output
    }
}

fn rot13(b: u8) -> u8 {
    match b {
        b'a'..=b'z' => (b - b'a' + 13) % 26 + b'a',
        b'A'..=b'Z' => (b - b'A' + 13) % 26 + b'A',
        _ => b,
    }
}

fn replace_all(input: &[u8], from: &[u8], to: &[u8]) -> Vec<u8> {
    if from.is_empty() || input.len() < from.len() {
        return input.to_vec();
    }

    let mut result = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        if input[i..].starts_with(from) {
            result.extend_from_slice(to);
            i += from.len();
        } else {
            result.push(input[i]);
            i += 1;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_filters() {
        assert_eq!(StreamFilter::to_upper().apply(b"john,doe"), b"JOHN,DOE");
        assert_eq!(StreamFilter::to_lower().apply(b"JOHN"), b"john");
        assert_eq!(StreamFilter::rot13().apply(b"john.doe"), b"wbua.qbr");
        assert_eq!(
            StreamFilter::replace("\r\n", "\n").apply(b"new\r\nline\r\n"),
            b"new\nline\n"
        );
    }

    #[test]
    fn test_chain_order() {
        let mut chain = TransformChain::new();
        assert!(matches!(chain.apply(b"abc"), Cow::Borrowed(_)));

        chain.push(StreamFilter::rot13());
        chain.push(StreamFilter::to_lower());
        chain.push(StreamFilter::to_upper());
        assert_eq!(chain.apply(b"john").as_ref(), b"WBUA");
        assert_eq!(
            chain.names(),
            vec!["string.rot13", "string.tolower", "string.toupper"]
        );
    }

    #[test]
    fn test_chain_remove() {
        let mut chain = TransformChain::new();
        chain.push(StreamFilter::to_upper());
        chain.push(StreamFilter::to_upper());
        assert!(chain.contains("string.toupper"));
        assert!(chain.remove("string.toupper"));
        assert!(!chain.remove("string.toupper"));
        assert!(chain.is_empty());
    }

    #[test]
    fn test_custom_filter() {
        let filter = StreamFilter::new("strip.cr", |input: &[u8]| {
            input.iter().copied().filter(|&b| b != b'\r').collect()
        });
        assert_eq!(filter.name(), "strip.cr");
        assert_eq!(filter.apply(b"a\r\n"), b"a\n");
    }
}
