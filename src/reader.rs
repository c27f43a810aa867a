//! Read-side facade over a [`Document`].

use std::io::{Read, Seek, Write};
use std::path::Path;
use std::sync::Arc;

use log::debug;

use crate::control::ControlCharacters;
use crate::document::{Document, FilterMode};
use crate::encoding::{ByteSequence, into_text};
use crate::error::{CsvError, Result};
use crate::filter::StreamFilter;
use crate::header::{combine, ensure_unique, resolve_header, strip_bom};
use crate::parser::RawRecords;
use crate::record::{ColumnKey, Record};
use crate::statement::Statement;

/// Reads records from a CSV document.
///
/// The header and the record count are resolved lazily and cached. Every
/// configuration change that affects parsing drops both caches.
///
/// # Examples
///
/// ```
/// use tabular_csv::Reader;
///
/// let mut reader = Reader::from_string("firstname,lastname\njohn,doe\njane,doe\n");
/// reader.set_header_offset(Some(0))?;
///
/// assert_eq!(reader.header()?, vec!["firstname", "lastname"]);
/// assert_eq!(reader.count()?, 2);
///
/// let first = reader.records()?.next().unwrap()?;
/// assert_eq!(first.get_named("firstname"), Some("john"));
/// # Ok::<(), tabular_csv::CsvError>(())
/// ```
#[derive(Debug)]
pub struct Reader {
    document: Document,
    header_offset: Option<usize>,
    header: Option<Arc<[String]>>,
    nb_records: Option<usize>,
    include_empty_records: bool,
    include_input_bom: bool,
    output_bom: Option<ByteSequence>,
}

impl Reader {
    /// Build a reader on an already opened document.
    pub fn from_document(mut document: Document) -> Self {
        document.set_filter_mode(FilterMode::Read);
        Self {
            document,
            header_offset: None,
            header: None,
            nb_records: None,
            include_empty_records: false,
            include_input_bom: false,
            output_bom: None,
        }
    }

    /// Open `path` for reading (`r` mode).
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_path_with_mode(path, "r")
    }

    /// Open `path` with an explicit open mode.
    pub fn from_path_with_mode<P: AsRef<Path>>(path: P, open_mode: &str) -> Result<Self> {
        Ok(Self::from_document(Document::from_path(path, open_mode)?))
    }

    pub fn from_string(content: impl Into<String>) -> Self {
        Self::from_document(Document::from_string(content))
    }

    pub fn from_bytes(content: impl Into<Vec<u8>>) -> Self {
        Self::from_document(Document::from_bytes(content))
    }

    pub fn from_stream<S: Read + Write + Seek + 'static>(stream: S) -> Self {
        Self::from_document(Document::from_stream(stream))
    }

    /// Buffer a read-only source into memory and read from it.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(Self::from_document(Document::from_reader(reader)?))
    }

    /// Fetch a remote document over HTTP(S).
    #[cfg(feature = "http")]
    pub fn from_url(url: &str) -> Result<Self> {
        Ok(Self::from_document(crate::http::fetch_document(url)?))
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    fn reset(&mut self) {
        if self.header.is_some() || self.nb_records.is_some() {
            debug!("{}: dropping cached header and record count", self.document.source());
        }
        self.header = None;
        self.nb_records = None;
    }

    // Control characters

    pub fn controls(&self) -> ControlCharacters {
        self.document.controls()
    }

    pub fn delimiter(&self) -> u8 {
        self.document.controls().delimiter()
    }

    pub fn enclosure(&self) -> u8 {
        self.document.controls().enclosure()
    }

    pub fn escape(&self) -> Option<u8> {
        self.document.controls().escape()
    }

    pub fn set_delimiter(&mut self, delimiter: &str) -> Result<&mut Self> {
        self.document.controls_mut().set_delimiter(delimiter)?;
        self.reset();
        Ok(self)
    }

    pub fn set_enclosure(&mut self, enclosure: &str) -> Result<&mut Self> {
        self.document.controls_mut().set_enclosure(enclosure)?;
        self.reset();
        Ok(self)
    }

    /// Set the escape character; the empty string selects the fallback parser.
    pub fn set_escape(&mut self, escape: &str) -> Result<&mut Self> {
        self.document.controls_mut().set_escape(escape)?;
        self.reset();
        Ok(self)
    }

    // Stream filters

    pub fn add_stream_filter(&mut self, filter: StreamFilter) -> &mut Self {
        self.document.add_stream_filter(filter);
        self.reset();
        self
    }

    pub fn remove_stream_filter(&mut self, name: &str) -> bool {
        let removed = self.document.remove_stream_filter(name);
        if removed {
            self.reset();
        }
        removed
    }

    pub fn has_stream_filter(&self, name: &str) -> bool {
        self.document.has_stream_filter(name)
    }

    pub fn clear_stream_filters(&mut self) -> &mut Self {
        self.document.clear_stream_filters();
        self.reset();
        self
    }

    // BOM handling

    /// BOM found at the start of the document.
    pub fn input_bom(&self) -> Result<Option<ByteSequence>> {
        self.document.input_bom()
    }

    /// Keep the input BOM on the first record.
    pub fn include_input_bom(&mut self) -> &mut Self {
        self.include_input_bom = true;
        self.reset();
        self
    }

    /// Strip the input BOM from the first record (default).
    pub fn skip_input_bom(&mut self) -> &mut Self {
        self.include_input_bom = false;
        self.reset();
        self
    }

    pub fn is_input_bom_included(&self) -> bool {
        self.include_input_bom
    }

    pub fn output_bom(&self) -> Option<ByteSequence> {
        self.output_bom
    }

    /// BOM prepended by [`Reader::output`] and [`Reader::content`].
    pub fn set_output_bom(&mut self, bom: Option<ByteSequence>) -> &mut Self {
        self.output_bom = bom;
        self
    }

    // Empty records

    pub fn include_empty_records(&mut self) -> &mut Self {
        if !self.include_empty_records {
            self.include_empty_records = true;
            self.nb_records = None;
        }
        self
    }

    /// Drop records without any field (default).
    pub fn skip_empty_records(&mut self) -> &mut Self {
        if self.include_empty_records {
            self.include_empty_records = false;
            self.nb_records = None;
        }
        self
    }

    pub fn is_empty_records_included(&self) -> bool {
        self.include_empty_records
    }

    // Header

    pub fn header_offset(&self) -> Option<usize> {
        self.header_offset
    }

    /// Select the physical record used as header; `None` clears it.
    pub fn set_header_offset(&mut self, offset: Option<i64>) -> Result<&mut Self> {
        let offset = match offset {
            Some(o) if o < 0 => {
                return Err(CsvError::InvalidArgument(format!(
                    "the header offset must be a positive integer or None, {o} given"
                )));
            }
            Some(o) => Some(o as usize),
            None => None,
        };
        if offset != self.header_offset {
            self.header_offset = offset;
            self.reset();
        }
        Ok(self)
    }

    /// The header, empty when no header offset is set.
    pub fn header(&mut self) -> Result<Vec<String>> {
        Ok(self.shared_header()?.map(|h| h.to_vec()).unwrap_or_default())
    }

    fn shared_header(&mut self) -> Result<Option<Arc<[String]>>> {
        let Some(offset) = self.header_offset else {
            return Ok(None);
        };
        if let Some(header) = &self.header {
            return Ok(Some(Arc::clone(header)));
        }

        let bom_len = self.input_bom()?.map_or(0, |b| b.len());
        let header: Arc<[String]> = resolve_header(&mut self.document, offset, bom_len)?.into();
        debug!("{}: resolved header {:?} at offset {offset}", self.document.source(), header);
        self.header = Some(Arc::clone(&header));
        Ok(Some(header))
    }

    // Records

    /// Iterate over every record, keyed by the document header when one is set.
    pub fn records(&mut self) -> Result<Records<'_>> {
        self.records_with_header(&[])
    }

    /// Iterate over every record, keyed by `header` when it is not empty.
    pub fn records_with_header(&mut self, header: &[String]) -> Result<Records<'_>> {
        let header: Option<Arc<[String]>> = if header.is_empty() {
            self.shared_header()?
        } else {
            ensure_unique(header)?;
            Some(header.into())
        };
        let bom_len = if self.include_input_bom {
            0
        } else {
            self.input_bom()?.map_or(0, |b| b.len())
        };
        Ok(Records {
            raw: RawRecords::new(&mut self.document),
            header,
            header_offset: self.header_offset,
            include_empty_records: self.include_empty_records,
            bom_len,
        })
    }

    /// Number of records, header excluded. Computed once and cached.
    pub fn count(&mut self) -> Result<usize> {
        if let Some(n) = self.nb_records {
            return Ok(n);
        }
        let mut n = 0;
        for record in self.records()? {
            record?;
            n += 1;
        }
        self.nb_records = Some(n);
        Ok(n)
    }

    /// Every record in memory.
    pub fn fetch_all(&mut self) -> Result<Vec<Record>> {
        self.records()?.collect()
    }

    /// The `nth` record, `None` past the end.
    pub fn fetch_one(&mut self, nth: i64) -> Result<Option<Record>> {
        Statement::new().process(self, &[])?.fetch_one(nth)
    }

    /// Values of a single column; records without a value for it are skipped.
    pub fn fetch_column(
        &mut self,
        key: impl Into<ColumnKey>,
    ) -> Result<impl Iterator<Item = Result<String>> + '_> {
        Statement::new().process(self, &[])?.fetch_column(key)
    }

    /// `(key, value)` pairs built from two columns.
    pub fn fetch_pairs(
        &mut self,
        key: impl Into<ColumnKey>,
        value: impl Into<ColumnKey>,
    ) -> Result<impl Iterator<Item = Result<(String, Option<String>)>> + '_> {
        Statement::new().process(self, &[])?.fetch_pairs(key, value)
    }

    // Raw access

    /// Write the document to `out`, honoring the BOM settings. Returns bytes written.
    pub fn output<W: Write>(&mut self, out: &mut W) -> Result<u64> {
        let input_bom = self.input_bom()?;
        output_document(&mut self.document, out, input_bom, self.output_bom)
    }

    /// The document as a string, honoring the BOM settings.
    pub fn content(&mut self) -> Result<String> {
        let mut out = Vec::new();
        self.output(&mut out)?;
        Ok(into_text(out))
    }
}

/// Copy `document` to `out`, replacing its input BOM by `output_bom` when one is set.
pub(crate) fn output_document<W: Write>(
    document: &mut Document,
    out: &mut W,
    input_bom: Option<ByteSequence>,
    output_bom: Option<ByteSequence>,
) -> Result<u64> {
    let mut written = 0;
    let skip = match output_bom {
        Some(bom) => {
            out.write_all(bom.as_bytes())?;
            written += bom.len() as u64;
            input_bom.map_or(0, |b| b.len() as u64)
        }
        None => 0,
    };
    written += document.pass_through(out, skip)?;
    out.flush()?;
    Ok(written)
}

/// Lazy sequence of records produced by [`Reader::records`].
pub struct Records<'a> {
    raw: RawRecords<'a>,
    header: Option<Arc<[String]>>,
    header_offset: Option<usize>,
    include_empty_records: bool,
    bom_len: usize,
}

impl<'a> Records<'a> {
    /// Column names applied to the records, empty when they are indexed.
    pub fn column_names(&self) -> Vec<String> {
        self.header.as_deref().map(<[String]>::to_vec).unwrap_or_default()
    }

    /// Keep the physical record offset next to each record.
    pub fn with_offsets(self) -> OffsetRecords<'a> {
        OffsetRecords { inner: self }
    }

    fn next_with_offset(&mut self) -> Option<Result<(usize, Record)>> {
        loop {
            let (offset, mut fields) = match self.raw.next()? {
                Ok(item) => item,
                Err(e) => return Some(Err(e)),
            };
            if offset == 0 && self.bom_len > 0 {
                fields = strip_bom(fields, self.bom_len);
            }
            if Some(offset) == self.header_offset {
                continue;
            }
            if fields.is_empty() && !self.include_empty_records {
                continue;
            }

            let fields: Vec<String> = fields.into_iter().map(into_text).collect();
            return Some(Ok((offset, combine(fields, self.header.as_ref()))));
        }
    }
}

impl Iterator for Records<'_> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_with_offset().map(|r| r.map(|(_, record)| record))
    }
}

/// Records paired with their physical offset in the document.
pub struct OffsetRecords<'a> {
    inner: Records<'a>,
}

impl Iterator for OffsetRecords<'_> {
    type Item = Result<(usize, Record)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next_with_offset()
    }
}
