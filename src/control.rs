use crate::error::{CsvError, Result};
use std::fmt;

/// Field delimiter, enclosure and escape characters of a CSV document.
///
/// Delimiter and enclosure are single bytes. The escape is a single byte or
/// absent; an absent escape selects the fallback record parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControlCharacters {
    delimiter: u8,
    enclosure: u8,
    escape: Option<u8>,
}

impl Default for ControlCharacters {
    fn default() -> Self {
        Self {
            delimiter: b',',
            enclosure: b'"',
            escape: Some(b'\\'),
        }
    }
}

impl ControlCharacters {
    /// Create control characters from their string forms, validating each one.
    pub fn new(delimiter: &str, enclosure: &str, escape: &str) -> Result<Self> {
        let mut controls = Self::default();
        controls
            .set_delimiter(delimiter)?
            .set_enclosure(enclosure)?
            .set_escape(escape)?;
        Ok(controls)
    }

    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    pub fn enclosure(&self) -> u8 {
        self.enclosure
    }

    /// The escape byte, or `None` when the empty escape was configured.
    pub fn escape(&self) -> Option<u8> {
        self.escape
    }

    /// Set the field delimiter. Must be exactly one byte.
    pub fn set_delimiter(&mut self, delimiter: &str) -> Result<&mut Self> {
        self.delimiter = single_byte(delimiter, "delimiter")?;
        Ok(self)
    }

    /// Set the field enclosure. Must be exactly one byte.
    pub fn set_enclosure(&mut self, enclosure: &str) -> Result<&mut Self> {
        self.enclosure = single_byte(enclosure, "enclosure")?;
        Ok(self)
    }

    /// Set the escape character. Must be exactly one byte or empty.
    pub fn set_escape(&mut self, escape: &str) -> Result<&mut Self> {
        self.escape = if escape.is_empty() {
            None
        } else {
            Some(single_byte(escape, "escape")?)
        };
        Ok(self)
    }
}

impl fmt::Display for ControlCharacters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "delimiter={:?} enclosure={:?} escape=",
            self.delimiter as char, self.enclosure as char
        )?;
        match self.escape {
            Some(e) => write!(f, "{:?}", e as char),
            None => write!(f, "none"),
        }
    }
}

fn single_byte(value: &str, kind: &str) -> Result<u8> {
    match value.as_bytes() {
        [byte] => Ok(*byte),
        _ => Err(CsvError::InvalidArgument(format!(
            "the {kind} must be a single character, {value:?} given"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let controls = ControlCharacters::default();
        assert_eq!(controls.delimiter(), b',');
        assert_eq!(controls.enclosure(), b'"');
        assert_eq!(controls.escape(), Some(b'\\'));
    }

    #[test]
    fn test_setters_round_trip() {
        let mut controls = ControlCharacters::default();
        for d in [";", "\t", "|", "o"] {
            controls.set_delimiter(d).unwrap();
            assert_eq!(controls.delimiter(), d.as_bytes()[0]);
        }
        controls.set_enclosure("'").unwrap().set_escape("").unwrap();
        assert_eq!(controls.enclosure(), b'\'');
        assert_eq!(controls.escape(), None);
    }

    #[test]
    fn test_invalid_lengths() {
        let mut controls = ControlCharacters::default();
        assert!(matches!(
            controls.set_delimiter("foo"),
            Err(CsvError::InvalidArgument(_))
        ));
        assert!(controls.set_delimiter("").is_err());
        assert!(controls.set_enclosure("").is_err());
        assert!(controls.set_escape("\\\\").is_err());
        // multibyte characters are more than one byte
        assert!(controls.set_delimiter("é").is_err());
        assert_eq!(controls.delimiter(), b',');
    }

    #[test]
    fn test_display() {
        let controls = ControlCharacters::new(";", "'", "").unwrap();
        assert_eq!(
            controls.to_string(),
            "delimiter=';' enclosure='\\'' escape=none"
        );
    }
}
