//! Write-side facade over a [`Document`].

use std::fmt;
use std::io::{Read, Seek, Write};
use std::path::Path;
use std::str::FromStr;

use csv::{QuoteStyle, Terminator, WriterBuilder};
use log::{debug, trace};

use crate::control::ControlCharacters;
use crate::document::{Document, FilterMode};
use crate::encoding::{ByteSequence, into_text};
use crate::error::{CsvError, InsertionError, Result};
use crate::filter::StreamFilter;
use crate::parser::RecordParser;
use crate::reader::{Reader, output_document};
use crate::record::Record;
use crate::validator::{ColumnConsistency, RecordValidator};

/// Name under which the built-in column count validator reports failures.
pub const COLUMN_CONSISTENCY: &str = "column_consistency";

/// What to do with `None` cells on insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NullHandling {
    /// Refuse the record.
    #[default]
    Exception,
    /// Drop the cell from the record.
    SkipCell,
    /// Write the cell as an empty string.
    Empty,
}

/// Record terminator written after each record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Newline {
    #[default]
    Lf,
    CrLf,
    Cr,
}

impl Newline {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Newline::Lf => "\n",
            Newline::CrLf => "\r\n",
            Newline::Cr => "\r",
        }
    }

    fn terminator(&self) -> Terminator {
        match self {
            Newline::Lf => Terminator::Any(b'\n'),
            Newline::CrLf => Terminator::CRLF,
            Newline::Cr => Terminator::Any(b'\r'),
        }
    }
}

impl FromStr for Newline {
    type Err = CsvError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "\n" => Ok(Newline::Lf),
            "\r\n" => Ok(Newline::CrLf),
            "\r" => Ok(Newline::Cr),
            other => Err(CsvError::InvalidArgument(format!(
                "the newline sequence must be \\n, \\r\\n or \\r, {other:?} given"
            ))),
        }
    }
}

/// A record to insert: separate cells, or a line parsed with the writer's controls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Row {
    Cells(Vec<Option<String>>),
    Line(String),
}

impl From<Vec<Option<String>>> for Row {
    fn from(cells: Vec<Option<String>>) -> Self {
        Row::Cells(cells)
    }
}

impl From<Vec<Option<&str>>> for Row {
    fn from(cells: Vec<Option<&str>>) -> Self {
        Row::Cells(cells.into_iter().map(|c| c.map(str::to_string)).collect())
    }
}

impl From<Vec<String>> for Row {
    fn from(cells: Vec<String>) -> Self {
        Row::Cells(cells.into_iter().map(Some).collect())
    }
}

impl From<Vec<&str>> for Row {
    fn from(cells: Vec<&str>) -> Self {
        Row::Cells(cells.into_iter().map(|c| Some(c.to_string())).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Row {
    fn from(cells: [&str; N]) -> Self {
        Row::Cells(cells.iter().map(|c| Some(c.to_string())).collect())
    }
}

impl From<&[&str]> for Row {
    fn from(cells: &[&str]) -> Self {
        Row::Cells(cells.iter().map(|c| Some(c.to_string())).collect())
    }
}

impl From<&str> for Row {
    fn from(line: &str) -> Self {
        Row::Line(line.to_string())
    }
}

impl From<String> for Row {
    fn from(line: String) -> Self {
        Row::Line(line)
    }
}

impl From<Record> for Row {
    fn from(record: Record) -> Self {
        Row::Cells(record.into_values())
    }
}

impl From<&Record> for Row {
    fn from(record: &Record) -> Self {
        Row::Cells(record.values().to_vec())
    }
}

/// Serializes records into a CSV document.
///
/// ```
/// use tabular_csv::Writer;
///
/// let mut writer = Writer::from_string("");
/// writer
///     .insert_one(["john", "doe", "john.doe@example.com"])?
///     .insert_one("jane,doe,jane.doe@example.com")?;
///
/// assert_eq!(
///     writer.content()?,
///     "john,doe,john.doe@example.com\njane,doe,jane.doe@example.com\n"
/// );
/// # Ok::<(), tabular_csv::CsvError>(())
/// ```
pub struct Writer {
    document: Document,
    null_handling: NullHandling,
    newline: Newline,
    consistency: ColumnConsistency,
    validators: Vec<(String, Box<dyn RecordValidator>)>,
    output_bom: Option<ByteSequence>,
}

impl Writer {
    pub fn from_document(mut document: Document) -> Self {
        document.set_filter_mode(FilterMode::Write);
        Self {
            document,
            null_handling: NullHandling::default(),
            newline: Newline::default(),
            consistency: ColumnConsistency::default(),
            validators: Vec::new(),
            output_bom: None,
        }
    }

    /// Open `path` for writing in `w+` mode: the file is created or truncated.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_path_with_mode(path, "w+")
    }

    pub fn from_path_with_mode<P: AsRef<Path>>(path: P, open_mode: &str) -> Result<Self> {
        Ok(Self::from_document(Document::from_path(path, open_mode)?))
    }

    /// An in-memory writer seeded with `content`; new records are appended.
    pub fn from_string(content: impl Into<String>) -> Self {
        Self::from_document(Document::from_string(content))
    }

    pub fn from_stream<S: Read + Write + Seek + 'static>(stream: S) -> Self {
        Self::from_document(Document::from_stream(stream))
    }

    /// A reader over the same underlying handle, sharing the control characters.
    pub fn reader(&self) -> Reader {
        Reader::from_document(self.document.share(FilterMode::Read))
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn controls(&self) -> ControlCharacters {
        self.document.controls()
    }

    pub fn set_delimiter(&mut self, delimiter: &str) -> Result<&mut Self> {
        self.document.controls_mut().set_delimiter(delimiter)?;
        Ok(self)
    }

    pub fn set_enclosure(&mut self, enclosure: &str) -> Result<&mut Self> {
        self.document.controls_mut().set_enclosure(enclosure)?;
        Ok(self)
    }

    pub fn set_escape(&mut self, escape: &str) -> Result<&mut Self> {
        self.document.controls_mut().set_escape(escape)?;
        Ok(self)
    }

    pub fn null_handling(&self) -> NullHandling {
        self.null_handling
    }

    pub fn set_null_handling(&mut self, mode: NullHandling) -> &mut Self {
        self.null_handling = mode;
        self
    }

    pub fn newline(&self) -> &'static str {
        self.newline.as_str()
    }

    /// Set the record terminator: `"\n"`, `"\r\n"` or `"\r"`.
    pub fn set_newline(&mut self, newline: &str) -> Result<&mut Self> {
        self.newline = newline.parse()?;
        Ok(self)
    }

    pub fn output_bom(&self) -> Option<ByteSequence> {
        self.output_bom
    }

    pub fn set_output_bom(&mut self, bom: Option<ByteSequence>) -> &mut Self {
        self.output_bom = bom;
        self
    }

    /// Add a write filter. Fails once a record has been written.
    pub fn add_stream_filter(&mut self, filter: StreamFilter) -> Result<&mut Self> {
        self.ensure_filters_unlocked()?;
        self.document.add_stream_filter(filter);
        Ok(self)
    }

    pub fn remove_stream_filter(&mut self, name: &str) -> Result<bool> {
        self.ensure_filters_unlocked()?;
        Ok(self.document.remove_stream_filter(name))
    }

    pub fn has_stream_filter(&self, name: &str) -> bool {
        self.document.has_stream_filter(name)
    }

    fn ensure_filters_unlocked(&self) -> Result<()> {
        if self.document.is_write_committed() {
            return Err(CsvError::StreamFilterLocked(format!(
                "{}: filters cannot change once records have been written",
                self.document.source()
            )));
        }
        Ok(())
    }

    // Validation

    /// Register a validator run on every record after the null policy.
    pub fn add_validator<V>(&mut self, validator: V, name: impl Into<String>) -> &mut Self
    where
        V: RecordValidator + 'static,
    {
        self.validators.push((name.into(), Box::new(validator)));
        self
    }

    pub fn columns_count(&self) -> i64 {
        self.consistency.columns_count()
    }

    /// Require every record to have `count` fields; `-1` accepts any width.
    pub fn set_columns_count(&mut self, count: i64) -> Result<&mut Self> {
        self.consistency.set_columns_count(count)?;
        Ok(self)
    }

    /// Lock the expected width to the first record inserted from now on.
    pub fn autodetect_columns_count(&mut self) -> &mut Self {
        self.consistency.autodetect_columns_count();
        self
    }

    // Insertion

    /// Validate, serialize and append one record.
    pub fn insert_one(&mut self, row: impl Into<Row>) -> Result<&mut Self> {
        let cells = match row.into() {
            Row::Cells(cells) => cells,
            Row::Line(line) => self.parse_line(&line)?,
        };
        let cells = self.apply_null_handling(cells)?;

        if !self.consistency.validate(&cells) {
            return Err(InsertionError::from_validator(COLUMN_CONSISTENCY, cells).into());
        }
        for (name, validator) in &mut self.validators {
            if !validator.validate(&cells) {
                debug!("record refused by validator {name}");
                return Err(InsertionError::from_validator(name.clone(), cells).into());
            }
        }

        let bytes = self.serialize(&cells)?;
        trace!("writing {} bytes", bytes.len());
        self.document.write(&bytes)?;
        Ok(self)
    }

    /// Insert every row of `rows`, stopping at the first failure.
    pub fn insert_all<I>(&mut self, rows: I) -> Result<&mut Self>
    where
        I: IntoIterator,
        I::Item: Into<Row>,
    {
        for row in rows {
            self.insert_one(row)?;
        }
        Ok(self)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.document.flush()
    }

    fn parse_line(&self, line: &str) -> Result<Vec<Option<String>>> {
        let mut document = Document::from_string(line);
        *document.controls_mut() = self.controls();
        let mut parser = RecordParser::for_controls(self.controls());
        let fields = parser.next_record(&mut document)?.unwrap_or_default();
        Ok(fields.into_iter().map(|f| Some(into_text(f))).collect())
    }

    fn apply_null_handling(&self, cells: Vec<Option<String>>) -> Result<Vec<Option<String>>> {
        match self.null_handling {
            NullHandling::Exception if cells.iter().any(Option::is_none) => Err(
                InsertionError::from_csv(cells, "the record contains null values").into(),
            ),
            NullHandling::Exception => Ok(cells),
            NullHandling::SkipCell => Ok(cells.into_iter().filter(Option::is_some).collect()),
            NullHandling::Empty => Ok(cells
                .into_iter()
                .map(|c| Some(c.unwrap_or_default()))
                .collect()),
        }
    }

    fn serialize(&self, cells: &[Option<String>]) -> Result<Vec<u8>> {
        let controls = self.controls();
        let mut builder = WriterBuilder::new();
        builder
            .delimiter(controls.delimiter())
            .quote(controls.enclosure())
            .double_quote(true)
            .quote_style(QuoteStyle::Necessary)
            .terminator(self.newline.terminator())
            .flexible(true)
            .has_headers(false);

        let mut wtr = builder.from_writer(Vec::new());
        wtr.write_record(cells.iter().map(|c| c.as_deref().unwrap_or("")))
            .map_err(|e| InsertionError::from_csv(cells.to_vec(), e.to_string()))?;
        let bytes = wtr
            .into_inner()
            .map_err(|e| CsvError::Io(e.into_error()))?;

        match controls.escape().filter(|&e| e != controls.enclosure()) {
            Some(escape) if bytes.contains(&escape) => {
                Ok(unescape_enclosures(&bytes, escape, controls.enclosure()))
            }
            _ => Ok(bytes),
        }
    }

    // Raw access

    pub fn output<W: Write>(&mut self, out: &mut W) -> Result<u64> {
        let input_bom = self.document.input_bom()?;
        output_document(&mut self.document, out, input_bom, self.output_bom)
    }

    pub fn content(&mut self) -> Result<String> {
        let mut out = Vec::new();
        self.output(&mut out)?;
        Ok(into_text(out))
    }
}

/// Undo the enclosure doubling `csv` applies right after an escape byte.
///
/// Inside an enclosed field an escaped enclosure is read back as both bytes,
/// so the serialized form must carry it once.
fn unescape_enclosures(bytes: &[u8], escape: u8, enclosure: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut enclosed = false;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        out.push(b);
        i += 1;
        if !enclosed {
            enclosed = b == enclosure;
            continue;
        }
        if b == escape {
            match bytes.get(i..i + 2) {
                Some(pair) if pair == [enclosure, enclosure] => {
                    out.push(enclosure);
                    i += 2;
                }
                _ => {
                    if let Some(&next) = bytes.get(i) {
                        out.push(next);
                        i += 1;
                    }
                }
            }
        } else if b == enclosure {
            if bytes.get(i) == Some(&enclosure) {
                out.push(enclosure);
                i += 1;
            } else {
                enclosed = false;
            }
        }
    }
    out
}

impl fmt::Debug for Writer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.validators.iter().map(|(n, _)| n.as_str()).collect();
        f.debug_struct("Writer")
            .field("document", &self.document)
            .field("null_handling", &self.null_handling)
            .field("newline", &self.newline)
            .field("consistency", &self.consistency)
            .field("validators", &names)
            .finish()
    }
}
