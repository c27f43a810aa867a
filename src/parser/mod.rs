//! Record extraction from document lines.
//!
//! Two strategies exist. The standard parser delegates tokenizing to the
//! `csv` crate and is selected whenever an escape character is configured.
//! The fallback parser handles the empty-escape mode with its own scanner.

mod fallback;
mod standard;

pub use fallback::FallbackParser;
pub use standard::StandardParser;

use log::trace;

use crate::control::ControlCharacters;
use crate::document::Document;
use crate::encoding::skip_bom;
use crate::error::Result;

/// Raw fields of one record, before any header is applied.
pub type RawRecord = Vec<Vec<u8>>;

/// Record parser selected from the control characters.
#[derive(Debug)]
pub enum RecordParser {
    Standard(StandardParser),
    Fallback(FallbackParser),
}

impl RecordParser {
    /// Pick the parser matching `controls`: fallback when the escape is empty.
    pub fn for_controls(controls: ControlCharacters) -> Self {
        match controls.escape() {
            Some(_) => RecordParser::Standard(StandardParser::new(controls)),
            None => {
                trace!("empty escape, using the lenient record parser");
                RecordParser::Fallback(FallbackParser::new(controls))
            }
        }
    }

    /// Pull the next record from `document`. An empty line yields an empty record.
    pub fn next_record(&mut self, document: &mut Document) -> Result<Option<RawRecord>> {
        match self {
            RecordParser::Standard(parser) => parser.next_record(document),
            RecordParser::Fallback(parser) => parser.next_record(document),
        }
    }
}

/// Iterator over `(offset, fields)` pairs of a document, from its start.
///
/// Offsets count every physical record, empty ones included.
pub struct RawRecords<'a> {
    document: &'a mut Document,
    parser: RecordParser,
    offset: usize,
    done: bool,
}

impl<'a> RawRecords<'a> {
    pub fn new(document: &'a mut Document) -> Self {
        let parser = RecordParser::for_controls(document.controls());
        document.rewind();
        Self {
            document,
            parser,
            offset: 0,
            done: false,
        }
    }
}

impl Iterator for RawRecords<'_> {
    type Item = Result<(usize, RawRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.parser.next_record(self.document) {
            Ok(Some(record)) => {
                let offset = self.offset;
                self.offset += 1;
                Some(Ok((offset, record)))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Length of the BOM opening `line`, zero when there is none.
#[inline]
pub(crate) fn leading_bom(line: &[u8]) -> usize {
    line.len() - skip_bom(line).len()
}

/// True for a line holding nothing but a line terminator.
#[inline]
pub(crate) fn is_blank_line(line: &[u8]) -> bool {
    matches!(line, b"\n" | b"\r\n" | b"\r")
}

/// Strip trailing `\r` and `\n` bytes.
#[inline]
pub(crate) fn trim_line_end(data: &[u8]) -> &[u8] {
    let end = data
        .iter()
        .rposition(|&b| b != b'\r' && b != b'\n')
        .map_or(0, |i| i + 1);
    &data[..end]
}
