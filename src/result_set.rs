//! Output of [`Statement::process`](crate::Statement::process).

use std::fmt;

use crate::error::{CsvError, Result};
use crate::record::{ColumnKey, Record};

pub(crate) type RowIter<'a> = Box<dyn Iterator<Item = Result<(usize, Record)>> + 'a>;

/// Records selected by a statement, together with their column names.
///
/// A result set is consumed by iteration; run the statement again for a
/// second pass.
pub struct ResultSet<'a> {
    rows: RowIter<'a>,
    column_names: Vec<String>,
}

impl<'a> ResultSet<'a> {
    pub(crate) fn new(rows: RowIter<'a>, column_names: Vec<String>) -> Self {
        Self { rows, column_names }
    }

    /// Header applied to the records, empty when they are indexed.
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Records paired with their physical offset in the document.
    pub fn with_offsets(self) -> impl Iterator<Item = Result<(usize, Record)>> + 'a {
        self.rows
    }

    pub fn fetch_all(self) -> Result<Vec<Record>> {
        self.into_iter().collect()
    }

    /// Number of selected records.
    pub fn count(self) -> Result<usize> {
        let mut n = 0;
        for row in self.rows {
            row?;
            n += 1;
        }
        Ok(n)
    }

    /// The `nth` selected record, `None` past the end.
    pub fn fetch_one(self, nth: i64) -> Result<Option<Record>> {
        if nth < 0 {
            return Err(CsvError::OutOfRange(format!(
                "the record offset must be a positive integer or 0, {nth} given"
            )));
        }
        self.into_iter().nth(nth as usize).transpose()
    }

    /// Values of one column. Records lacking a value for it are skipped.
    pub fn fetch_column(
        self,
        key: impl Into<ColumnKey>,
    ) -> Result<impl Iterator<Item = Result<String>> + 'a> {
        let key = self.resolve(key.into())?;
        Ok(self.into_iter().filter_map(move |row| match row {
            Ok(record) => record.value(&key).map(|v| Ok(v.to_string())),
            Err(e) => Some(Err(e)),
        }))
    }

    /// `(key, value)` pairs. Records lacking the key column are skipped.
    pub fn fetch_pairs(
        self,
        key: impl Into<ColumnKey>,
        value: impl Into<ColumnKey>,
    ) -> Result<impl Iterator<Item = Result<(String, Option<String>)>> + 'a> {
        let key = self.resolve(key.into())?;
        let value = self.resolve(value.into())?;
        Ok(self.into_iter().filter_map(move |row| match row {
            Ok(record) => record
                .value(&key)
                .map(|k| Ok((k.to_string(), record.value(&value).map(str::to_string)))),
            Err(e) => Some(Err(e)),
        }))
    }

    /// Validate `key` against the column names and normalize it to a name when they exist.
    fn resolve(&self, key: ColumnKey) -> Result<ColumnKey> {
        if self.column_names.is_empty() {
            return match key {
                ColumnKey::Index(_) => Ok(key),
                ColumnKey::Name(name) => Err(CsvError::InvalidArgument(format!(
                    "column `{name}` cannot be addressed by name without a header"
                ))),
            };
        }
        match key {
            ColumnKey::Index(i) => self
                .column_names
                .get(i)
                .map(|name| ColumnKey::Name(name.clone()))
                .ok_or_else(|| {
                    CsvError::OutOfRange(format!(
                        "column index {i} is out of range for {} columns",
                        self.column_names.len()
                    ))
                }),
            ColumnKey::Name(name) if self.column_names.contains(&name) => Ok(ColumnKey::Name(name)),
            ColumnKey::Name(name) => Err(CsvError::InvalidArgument(format!(
                "the column `{name}` does not exist in the header"
            ))),
        }
    }
}

impl<'a> IntoIterator for ResultSet<'a> {
    type Item = Result<Record>;
    type IntoIter = Box<dyn Iterator<Item = Result<Record>> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.rows.map(|row| row.map(|(_, record)| record)))
    }
}

impl fmt::Debug for ResultSet<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultSet")
            .field("column_names", &self.column_names)
            .finish_non_exhaustive()
    }
}
