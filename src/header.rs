//! Header resolution and BOM normalization of the first record.

use std::sync::Arc;

use foldhash::{HashSet, HashSetExt};

use crate::document::Document;
use crate::encoding::into_text;
use crate::error::{CsvError, Result};
use crate::parser::{RawRecord, RawRecords};
use crate::record::Record;

/// Drop `bom_len` bytes from the first field.
///
/// Parsers tokenize past a leading BOM, so enclosures are already resolved.
/// A record reduced to a single empty field becomes an empty record.
pub fn strip_bom(mut record: RawRecord, bom_len: usize) -> RawRecord {
    if bom_len == 0 {
        return record;
    }
    let Some(first) = record.first_mut() else {
        return record;
    };

    first.drain(..bom_len.min(first.len()));

    if record.len() == 1 && record[0].is_empty() {
        record.clear();
    }
    record
}

/// Read the record at physical `offset` and turn it into a validated header.
pub fn resolve_header(document: &mut Document, offset: usize, bom_len: usize) -> Result<Vec<String>> {
    let mut found = None;
    for item in RawRecords::new(document) {
        let (index, record) = item?;
        if index == offset {
            found = Some(record);
            break;
        }
    }

    let record = match found {
        Some(record) if offset == 0 => strip_bom(record, bom_len),
        Some(record) => record,
        None => {
            return Err(CsvError::Syntax(format!(
                "the header record does not exist or is empty at offset `{offset}`"
            )));
        }
    };
    if record.is_empty() {
        return Err(CsvError::Syntax(format!(
            "the header record does not exist or is empty at offset `{offset}`"
        )));
    }

    let header: Vec<String> = record.into_iter().map(into_text).collect();
    ensure_unique(&header)?;
    Ok(header)
}

/// Fail with a syntax error when `header` holds duplicate names.
pub fn ensure_unique(header: &[String]) -> Result<()> {
    let mut seen = HashSet::with_capacity(header.len());
    for name in header {
        if !seen.insert(name.as_str()) {
            return Err(CsvError::Syntax(format!(
                "the header record must contain unique column names, `{name}` is duplicated"
            )));
        }
    }
    Ok(())
}

/// Pair `fields` with `header` positionally, or keep them indexed without one.
pub fn combine(fields: Vec<String>, header: Option<&Arc<[String]>>) -> Record {
    match header {
        Some(header) if !header.is_empty() => Record::with_header(fields, Arc::clone(header)),
        _ => Record::new(fields),
    }
}
