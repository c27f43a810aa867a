//! Write-time record validators.

use crate::error::{CsvError, Result};

/// Decides whether a record may be written.
pub trait RecordValidator {
    fn validate(&mut self, record: &[Option<String>]) -> bool;
}

impl<F> RecordValidator for F
where
    F: FnMut(&[Option<String>]) -> bool,
{
    fn validate(&mut self, record: &[Option<String>]) -> bool {
        self(record)
    }
}

/// Requires every record to have the same number of fields.
///
/// A count of `-1` accepts any width. In autodetect mode the width of the
/// first validated record becomes the expected count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnConsistency {
    columns_count: i64,
    detect: bool,
}

impl Default for ColumnConsistency {
    fn default() -> Self {
        Self {
            columns_count: -1,
            detect: false,
        }
    }
}

impl ColumnConsistency {
    pub fn new(columns_count: i64) -> Result<Self> {
        let mut validator = Self::default();
        validator.set_columns_count(columns_count)?;
        Ok(validator)
    }

    /// A validator that locks onto the width of the first record it sees.
    pub fn autodetect() -> Self {
        Self {
            columns_count: -1,
            detect: true,
        }
    }

    pub fn columns_count(&self) -> i64 {
        self.columns_count
    }

    pub fn set_columns_count(&mut self, columns_count: i64) -> Result<&mut Self> {
        if columns_count < -1 {
            return Err(CsvError::InvalidArgument(format!(
                "the column count must be greater than or equal to -1, {columns_count} given"
            )));
        }
        self.detect = false;
        self.columns_count = columns_count;
        Ok(self)
    }

    pub fn autodetect_columns_count(&mut self) -> &mut Self {
        self.detect = true;
        self.columns_count = -1;
        self
    }

    pub fn is_autodetecting(&self) -> bool {
        self.detect
    }
}

impl RecordValidator for ColumnConsistency {
    fn validate(&mut self, record: &[Option<String>]) -> bool {
        if self.detect && self.columns_count == -1 {
            self.columns_count = record.len() as i64;
            return true;
        }
        self.columns_count == -1 || record.len() as i64 == self.columns_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(width: usize) -> Vec<Option<String>> {
        vec![Some("x".to_string()); width]
    }

    #[test]
    fn test_fixed_count() {
        let mut validator = ColumnConsistency::new(2).unwrap();
        assert!(validator.validate(&record(2)));
        assert!(!validator.validate(&record(3)));
        assert!(matches!(
            ColumnConsistency::new(-2),
            Err(CsvError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_unset_accepts_anything() {
        let mut validator = ColumnConsistency::default();
        assert!(validator.validate(&record(1)));
        assert!(validator.validate(&record(7)));
    }

    #[test]
    fn test_autodetect_locks_first_width() {
        let mut validator = ColumnConsistency::autodetect();
        assert_eq!(validator.columns_count(), -1);
        assert!(validator.validate(&record(3)));
        assert_eq!(validator.columns_count(), 3);
        assert!(!validator.validate(&record(2)));
        assert!(validator.validate(&record(3)));
    }

    #[test]
    fn test_closure_validator() {
        let mut no_nulls = |r: &[Option<String>]| r.iter().all(Option::is_some);
        assert!(no_nulls.validate(&record(2)));
        assert!(!no_nulls.validate(&[None]));
    }
}
