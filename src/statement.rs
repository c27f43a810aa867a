//! Immutable query description applied to a [`Reader`].

use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use log::trace;

use crate::error::{CsvError, Result};
use crate::reader::Reader;
use crate::record::Record;
use crate::result_set::{ResultSet, RowIter};

type Predicate = dyn Fn(&Record) -> bool;
type Comparator = dyn Fn(&Record, &Record) -> Ordering;

/// Filter, ordering and pagination over a reader's records.
///
/// Every builder method returns a new statement, so a base query can be
/// reused across variations.
///
/// ```
/// use tabular_csv::{Reader, Statement};
///
/// let mut reader = Reader::from_string("b,2\na,1\nc,3\n");
/// let stmt = Statement::new()
///     .filter(|r| r.get(0) != Some("c"))
///     .order_by(|a, b| a.get(0).cmp(&b.get(0)));
///
/// let firsts: Vec<String> = stmt
///     .process(&mut reader, &[])?
///     .fetch_column(0)?
///     .collect::<Result<_, _>>()?;
/// assert_eq!(firsts, vec!["a", "b"]);
/// # Ok::<(), tabular_csv::CsvError>(())
/// ```
#[derive(Clone, Default)]
pub struct Statement {
    predicates: Vec<Rc<Predicate>>,
    comparators: Vec<Rc<Comparator>>,
    offset: usize,
    limit: Option<usize>,
}

impl Statement {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new statement with `predicate` added; all predicates must hold.
    pub fn filter<F>(&self, predicate: F) -> Self
    where
        F: Fn(&Record) -> bool + 'static,
    {
        let mut stmt = self.clone();
        stmt.predicates.push(Rc::new(predicate));
        stmt
    }

    /// A new statement with `comparator` added as the next sort key.
    pub fn order_by<F>(&self, comparator: F) -> Self
    where
        F: Fn(&Record, &Record) -> Ordering + 'static,
    {
        let mut stmt = self.clone();
        stmt.comparators.push(Rc::new(comparator));
        stmt
    }

    /// A new statement skipping the first `offset` records.
    pub fn offset(&self, offset: i64) -> Result<Self> {
        if offset < 0 {
            return Err(CsvError::OutOfRange(format!(
                "the offset must be a positive integer or 0, {offset} given"
            )));
        }
        let mut stmt = self.clone();
        stmt.offset = offset as usize;
        Ok(stmt)
    }

    /// A new statement yielding at most `limit` records; `-1` removes the bound.
    pub fn limit(&self, limit: i64) -> Result<Self> {
        if limit < -1 {
            return Err(CsvError::OutOfRange(format!(
                "the limit must be greater than or equal to -1, {limit} given"
            )));
        }
        let mut stmt = self.clone();
        stmt.limit = usize::try_from(limit).ok();
        Ok(stmt)
    }

    pub fn current_offset(&self) -> usize {
        self.offset
    }

    /// Current limit, `-1` when unbounded.
    pub fn current_limit(&self) -> i64 {
        self.limit.map_or(-1, |l| l as i64)
    }

    /// Run the statement against `reader`.
    ///
    /// Records are filtered lazily. When an ordering is registered every
    /// matching record is loaded in memory and stably sorted before the
    /// offset and limit are applied.
    pub fn process<'a>(&self, reader: &'a mut Reader, header: &[String]) -> Result<ResultSet<'a>> {
        let records = reader.records_with_header(header)?;
        let column_names = records.column_names();

        let predicates = self.predicates.clone();
        let filtered = records.with_offsets().filter(move |item| match item {
            Ok((_, record)) => predicates.iter().all(|p| p(record)),
            Err(_) => true,
        });

        let rows: RowIter<'a> = if self.comparators.is_empty() {
            Box::new(filtered)
        } else {
            let mut all: Vec<(usize, Record)> = filtered.collect::<Result<_>>()?;
            trace!("sorting {} records over {} keys", all.len(), self.comparators.len());
            all.sort_by(|(_, a), (_, b)| {
                self.comparators
                    .iter()
                    .map(|cmp| cmp(a, b))
                    .find(|o| o.is_ne())
                    .unwrap_or(Ordering::Equal)
            });
            Box::new(all.into_iter().map(Ok))
        };

        let rows = rows.skip(self.offset);
        let rows: RowIter<'a> = match self.limit {
            Some(limit) => Box::new(rows.take(limit)),
            None => Box::new(rows),
        };
        Ok(ResultSet::new(rows, column_names))
    }
}

impl fmt::Debug for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statement")
            .field("predicates", &self.predicates.len())
            .field("comparators", &self.comparators.len())
            .field("offset", &self.offset)
            .field("limit", &self.current_limit())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTENT: &str = "john,doe,john.doe@example.com\njane,doe,jane.doe@example.com\n";

    fn firsts(set: ResultSet<'_>) -> Vec<String> {
        set.fetch_column(0).unwrap().collect::<Result<_>>().unwrap()
    }

    #[test]
    fn test_builder_is_immutable() {
        let base = Statement::new();
        let limited = base.limit(1).unwrap();
        let offset = limited.offset(1).unwrap();
        assert_eq!(base.current_limit(), -1);
        assert_eq!(limited.current_limit(), 1);
        assert_eq!(limited.current_offset(), 0);
        assert_eq!(offset.current_offset(), 1);

        let filtered = base.filter(|_| false);
        assert_eq!(base.predicates.len(), 0);
        assert_eq!(filtered.predicates.len(), 1);
    }

    #[test]
    fn test_invalid_pagination() {
        assert!(matches!(Statement::new().offset(-1), Err(CsvError::OutOfRange(_))));
        assert!(matches!(Statement::new().limit(-4), Err(CsvError::OutOfRange(_))));
        assert!(Statement::new().limit(-1).is_ok());
        assert!(Statement::new().limit(0).is_ok());
    }

    #[test]
    fn test_pagination() {
        let mut reader = Reader::from_string(CONTENT);
        let stmt = Statement::new().offset(1).unwrap().limit(1).unwrap();
        assert_eq!(firsts(stmt.process(&mut reader, &[]).unwrap()), vec!["jane"]);

        let stmt = Statement::new().offset(1).unwrap().limit(10).unwrap();
        assert_eq!(firsts(stmt.process(&mut reader, &[]).unwrap()), vec!["jane"]);

        let stmt = Statement::new().offset(5).unwrap();
        assert!(firsts(stmt.process(&mut reader, &[]).unwrap()).is_empty());

        let stmt = Statement::new().limit(0).unwrap();
        assert!(firsts(stmt.process(&mut reader, &[]).unwrap()).is_empty());
    }

    #[test]
    fn test_filters_are_conjunctive() {
        let mut reader = Reader::from_string("a,1\nb,2\nc,3\nd,4\n");
        let combined = Statement::new()
            .filter(|r| r.get(1).is_some_and(|v| v != "1"))
            .filter(|r| r.get(0) != Some("d"));
        let single = Statement::new().filter(|r| {
            r.get(1).is_some_and(|v| v != "1") && r.get(0) != Some("d")
        });
        let left = firsts(combined.process(&mut reader, &[]).unwrap());
        let right = firsts(single.process(&mut reader, &[]).unwrap());
        assert_eq!(left, vec!["b", "c"]);
        assert_eq!(left, right);
    }

    #[test]
    fn test_multi_key_stable_sort() {
        let mut reader = Reader::from_string("x,2,first\ny,1,second\nz,2,third\nw,1,fourth\n");
        let stmt = Statement::new()
            .order_by(|a, b| a.get(1).cmp(&b.get(1)))
            .order_by(|_, _| Ordering::Equal);
        let names: Vec<String> = stmt
            .process(&mut reader, &[])
            .unwrap()
            .fetch_column(2)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(names, vec!["second", "fourth", "first", "third"]);

        let stmt = Statement::new()
            .order_by(|a, b| a.get(1).cmp(&b.get(1)))
            .order_by(|a, b| b.get(0).cmp(&a.get(0)));
        assert_eq!(
            firsts(stmt.process(&mut reader, &[]).unwrap()),
            vec!["y", "w", "z", "x"]
        );
    }

    #[test]
    fn test_sort_then_paginate() {
        let mut reader = Reader::from_string("c\na\nb\n");
        let stmt = Statement::new()
            .order_by(|a, b| a.get(0).cmp(&b.get(0)))
            .offset(1)
            .unwrap()
            .limit(1)
            .unwrap();
        assert_eq!(firsts(stmt.process(&mut reader, &[]).unwrap()), vec!["b"]);
    }

    #[test]
    fn test_process_with_header() {
        let mut reader = Reader::from_string(CONTENT);
        let header = vec!["first".to_string(), "last".to_string(), "email".to_string()];
        let set = Statement::new()
            .filter(|r| r.get_named("first") == Some("jane"))
            .process(&mut reader, &header)
            .unwrap();
        assert_eq!(set.column_names(), header.as_slice());
        let records = set.fetch_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get_named("email"), Some("jane.doe@example.com"));
    }
}
