//! Byte-order-mark detection and field text decoding.

use simdutf8::basic::from_utf8;
use std::fmt;

/// A recognized byte-order-mark sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteSequence {
    /// UTF-8 BOM: EF BB BF
    Utf8,
    /// UTF-16 little endian BOM: FF FE
    Utf16Le,
    /// UTF-16 big endian BOM: FE FF
    Utf16Be,
    /// UTF-32 little endian BOM: FF FE 00 00
    Utf32Le,
    /// UTF-32 big endian BOM: 00 00 FE FF
    Utf32Be,
}

/// Known sequences ordered longest first so that UTF-32 LE wins over UTF-16 LE.
const MATCH_ORDER: [ByteSequence; 5] = [
    ByteSequence::Utf32Le,
    ByteSequence::Utf32Be,
    ByteSequence::Utf8,
    ByteSequence::Utf16Le,
    ByteSequence::Utf16Be,
];

impl ByteSequence {
    pub const BOM_UTF8: &'static [u8] = b"\xEF\xBB\xBF";
    pub const BOM_UTF16_LE: &'static [u8] = b"\xFF\xFE";
    pub const BOM_UTF16_BE: &'static [u8] = b"\xFE\xFF";
    pub const BOM_UTF32_LE: &'static [u8] = b"\xFF\xFE\x00\x00";
    pub const BOM_UTF32_BE: &'static [u8] = b"\x00\x00\xFE\xFF";

    /// Returns the exact byte sequence of this BOM.
    pub const fn as_bytes(&self) -> &'static [u8] {
        match self {
            ByteSequence::Utf8 => Self::BOM_UTF8,
            ByteSequence::Utf16Le => Self::BOM_UTF16_LE,
            ByteSequence::Utf16Be => Self::BOM_UTF16_BE,
            ByteSequence::Utf32Le => Self::BOM_UTF32_LE,
            ByteSequence::Utf32Be => Self::BOM_UTF32_BE,
        }
    }

    /// Length of the sequence in bytes.
    #[inline]
    pub const fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Always false; present so `len` has its usual companion.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// The encoding label this BOM announces.
    pub const fn label(&self) -> &'static str {
        match self {
            ByteSequence::Utf8 => "UTF-8",
            ByteSequence::Utf16Le => "UTF-16LE",
            ByteSequence::Utf16Be => "UTF-16BE",
            ByteSequence::Utf32Le => "UTF-32LE",
            ByteSequence::Utf32Be => "UTF-32BE",
        }
    }
}

impl fmt::Display for ByteSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Match the leading bytes of `data` against the known BOM sequences.
///
/// Returns `None` when the buffer is shorter than every sequence or no
/// sequence prefixes it. A BOM found anywhere but at offset 0 is ignored.
pub fn bom_match(data: &[u8]) -> Option<ByteSequence> {
    MATCH_ORDER
        .into_iter()
        .find(|bom| data.starts_with(bom.as_bytes()))
}

/// Skip a leading BOM, if any, and return the remaining data.
pub fn skip_bom(data: &[u8]) -> &[u8] {
    match bom_match(data) {
        Some(bom) => &data[bom.len()..],
        None => data,
    }
}

/// Check if the given bytes are valid UTF-8.
///
/// Uses SIMD-accelerated validation for performance.
#[inline]
pub fn is_utf8(data: &[u8]) -> bool {
    from_utf8(data).is_ok()
}

/// Convert raw field bytes into a `String`.
///
/// Valid UTF-8 is moved without copying; anything else is decoded lossily.
pub fn into_text(bytes: Vec<u8>) -> String {
    if !is_utf8(&bytes) {
        return String::from_utf8_lossy(&bytes).into_owned();
    }
    String::from_utf8(bytes)
        .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bom_match_empty_and_random() {
        assert_eq!(bom_match(b""), None);
        assert_eq!(bom_match(b"foo bar"), None);
    }

    #[test]
    fn test_bom_match_utf8() {
        assert_eq!(bom_match(&[239, 187, 191]), Some(ByteSequence::Utf8));

        let mut text = ByteSequence::BOM_UTF8.to_vec();
        text.extend_from_slice(b"The quick brown fox jumps over the lazy dog");
        assert_eq!(bom_match(&text), Some(ByteSequence::Utf8));
    }

    #[test]
    fn test_bom_inside_text_is_ignored() {
        let mut text = b"The quick brown fox ".to_vec();
        text.extend_from_slice(ByteSequence::BOM_UTF8);
        text.extend_from_slice(b" jumps over the lazy dog");
        assert_eq!(bom_match(&text), None);
    }

    #[test]
    fn test_longest_prefix_wins() {
        assert_eq!(bom_match(&[255, 254, 0, 0]), Some(ByteSequence::Utf32Le));
        assert_eq!(bom_match(&[255, 254, b'a', 0]), Some(ByteSequence::Utf16Le));
        assert_eq!(bom_match(&[0, 0, 254, 255]), Some(ByteSequence::Utf32Be));
        assert_eq!(bom_match(&[254, 255]), Some(ByteSequence::Utf16Be));
    }

    #[test]
    fn test_skip_bom() {
        let with_bom = [0xEF, 0xBB, 0xBF, b'a', b'b', b'c'];
        assert_eq!(skip_bom(&with_bom), b"abc");
        assert_eq!(skip_bom(b"abc"), b"abc");
    }

    #[test]
    fn test_into_text() {
        assert_eq!(into_text("東京".as_bytes().to_vec()), "東京");
        assert_eq!(into_text(vec![b'a', 0xFF]), "a\u{FFFD}");
        assert!(is_utf8(b""));
        assert!(!is_utf8(&[0x80, 0x81]));
    }
}
