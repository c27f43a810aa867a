//! Line and byte access over a file, an in-memory buffer or a generic stream.
//!
//! A [`Document`] owns a read cursor, the control characters used to parse
//! it and a [`TransformChain`]. The underlying handle may be shared between
//! a writer and its companion reader; each `Document` keeps its own read
//! position and writes always land at the end of the handle.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::rc::Rc;
use std::str::FromStr;

use log::{debug, warn};

use crate::control::ControlCharacters;
use crate::encoding::{ByteSequence, bom_match};
use crate::error::{CsvError, Result};
use crate::filter::{StreamFilter, TransformChain};

/// Size of the chunks pulled from the handle on each refill.
const CHUNK_SIZE: usize = 8 * 1024;

/// Longest BOM sequence, in bytes.
const BOM_PEEK_LEN: usize = 4;

/// Anything a document can be backed by.
pub trait Handle: Read + Write + Seek {}

impl<T: Read + Write + Seek> Handle for T {}

type SharedHandle = Rc<RefCell<Box<dyn Handle>>>;

/// Access modes accepted when opening a document from a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenMode {
    /// `r`: read only.
    Read,
    /// `r+`: read and write, no truncation.
    ReadWrite,
    /// `w`: write only, truncate or create.
    Write,
    /// `w+`: read and write, truncate or create.
    WriteRead,
    /// `x`: write only, the file must not exist.
    CreateNew,
    /// `x+`: read and write, the file must not exist.
    CreateNewRead,
    /// `a`: append only, create if missing.
    Append,
    /// `a+`: read and append, create if missing.
    AppendRead,
    /// `c`: write only, create if missing, no truncation.
    Create,
    /// `c+`: read and write, create if missing, no truncation.
    CreateRead,
}

impl OpenMode {
    pub const ALL: [OpenMode; 10] = [
        OpenMode::Read,
        OpenMode::ReadWrite,
        OpenMode::Write,
        OpenMode::WriteRead,
        OpenMode::CreateNew,
        OpenMode::CreateNewRead,
        OpenMode::Append,
        OpenMode::AppendRead,
        OpenMode::Create,
        OpenMode::CreateRead,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            OpenMode::Read => "r",
            OpenMode::ReadWrite => "r+",
            OpenMode::Write => "w",
            OpenMode::WriteRead => "w+",
            OpenMode::CreateNew => "x",
            OpenMode::CreateNewRead => "x+",
            OpenMode::Append => "a",
            OpenMode::AppendRead => "a+",
            OpenMode::Create => "c",
            OpenMode::CreateRead => "c+",
        }
    }

    fn options(&self) -> OpenOptions {
        let mut options = OpenOptions::new();
        match self {
            OpenMode::Read => options.read(true),
            OpenMode::ReadWrite => options.read(true).write(true),
            OpenMode::Write => options.write(true).create(true).truncate(true),
            OpenMode::WriteRead => options.read(true).write(true).create(true).truncate(true),
            OpenMode::CreateNew => options.write(true).create_new(true),
            OpenMode::CreateNewRead => options.read(true).write(true).create_new(true),
            OpenMode::Append => options.append(true).create(true),
            OpenMode::AppendRead => options.read(true).append(true).create(true),
            OpenMode::Create => options.write(true).create(true),
            OpenMode::CreateRead => options.read(true).write(true).create(true),
        };
        options
    }
}

impl FromStr for OpenMode {
    type Err = CsvError;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.to_ascii_lowercase();
        OpenMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == lowered)
            .ok_or_else(|| {
                let available: Vec<&str> = OpenMode::ALL.iter().map(OpenMode::as_str).collect();
                CsvError::InvalidArgument(format!(
                    "invalid open mode {s:?}, available values are: {}",
                    available.join(", ")
                ))
            })
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction the transform chain applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    /// Filters run over every line pulled from the document.
    Read,
    /// Filters run over every byte sequence appended to the document.
    Write,
}

/// A readable and writable byte source with line access.
pub struct Document {
    handle: SharedHandle,
    source: String,
    controls: ControlCharacters,
    filters: TransformChain,
    filter_mode: FilterMode,
    /// Filter names frozen by the first committed write.
    committed_filters: Option<Vec<String>>,
    read_pos: u64,
    buffer: Vec<u8>,
    consumed: usize,
    pending: VecDeque<Vec<u8>>,
    exhausted: bool,
}

impl Document {
    fn new(handle: Box<dyn Handle>, source: String) -> Self {
        debug!("opened document from {source}");
        Self {
            handle: Rc::new(RefCell::new(handle)),
            source,
            controls: ControlCharacters::default(),
            filters: TransformChain::new(),
            filter_mode: FilterMode::Read,
            committed_filters: None,
            read_pos: 0,
            buffer: Vec::new(),
            consumed: 0,
            pending: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Open a document from a filesystem path using a textual open mode
    /// (`r`, `r+`, `w`, `w+`, `x`, `x+`, `a`, `a+`, `c`, `c+`).
    pub fn from_path<P: AsRef<Path>>(path: P, open_mode: &str) -> Result<Self> {
        let mode: OpenMode = open_mode.parse()?;
        let path = path.as_ref();
        let file = mode.options().open(path).map_err(|e| {
            warn!("failed to open {}: {e}", path.display());
            CsvError::StreamUnavailable(format!("`{}`: failed to open stream: {e}", path.display()))
        })?;
        Ok(Self::new(
            Box::new(file),
            format!("{} ({mode})", path.display()),
        ))
    }

    /// Create an in-memory document holding `content`.
    pub fn from_string(content: impl Into<String>) -> Self {
        Self::from_bytes(content.into().into_bytes())
    }

    /// Create an in-memory document holding `content`.
    pub fn from_bytes(content: impl Into<Vec<u8>>) -> Self {
        Self::new(Box::new(Cursor::new(content.into())), "memory".to_string())
    }

    /// Wrap any seekable, writable stream.
    pub fn from_stream<S: Read + Write + Seek + 'static>(stream: S) -> Self {
        Self::new(Box::new(stream), "stream".to_string())
    }

    /// Drain a read-only source into an in-memory document.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut content = Vec::new();
        reader.read_to_end(&mut content)?;
        Ok(Self::from_bytes(content))
    }

    /// A new document over the same handle, with its own cursor and an empty chain.
    pub(crate) fn share(&self, filter_mode: FilterMode) -> Self {
        Self {
            handle: Rc::clone(&self.handle),
            source: self.source.clone(),
            controls: self.controls,
            filters: TransformChain::new(),
            filter_mode,
            committed_filters: None,
            read_pos: 0,
            buffer: Vec::new(),
            consumed: 0,
            pending: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Human readable description of where the bytes come from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn controls(&self) -> ControlCharacters {
        self.controls
    }

    pub fn controls_mut(&mut self) -> &mut ControlCharacters {
        &mut self.controls
    }

    pub fn filter_mode(&self) -> FilterMode {
        self.filter_mode
    }

    pub(crate) fn set_filter_mode(&mut self, mode: FilterMode) {
        self.filter_mode = mode;
    }

    pub fn filters(&self) -> &TransformChain {
        &self.filters
    }

    /// Append a filter to the transform chain.
    pub fn add_stream_filter(&mut self, filter: StreamFilter) {
        debug!("{}: attaching stream filter {}", self.source, filter.name());
        self.filters.push(filter);
    }

    /// Remove every filter registered as `name`.
    pub fn remove_stream_filter(&mut self, name: &str) -> bool {
        let removed = self.filters.remove(name);
        if removed {
            warn!("{}: stream filter {name} removed", self.source);
        }
        removed
    }

    pub fn has_stream_filter(&self, name: &str) -> bool {
        self.filters.contains(name)
    }

    pub fn clear_stream_filters(&mut self) {
        self.filters.clear();
    }

    /// True once a write has committed the transform chain.
    pub fn is_write_committed(&self) -> bool {
        self.committed_filters.is_some()
    }

    /// Reset the read cursor to the start of the document.
    pub fn rewind(&mut self) {
        self.seek_to(0);
    }

    /// Move the read cursor to an absolute byte offset in the raw handle.
    pub(crate) fn seek_to(&mut self, offset: u64) {
        self.read_pos = offset;
        self.buffer.clear();
        self.consumed = 0;
        self.pending.clear();
        self.exhausted = false;
    }

    /// Next logical line, terminator included, with the read chain applied.
    ///
    /// Returns `None` at end of document.
    pub fn next_line(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            if let Some(line) = self.pending.pop_front() {
                return Ok(Some(line));
            }
            if self.exhausted {
                return Ok(None);
            }

            match self.read_raw_line()? {
                None => self.exhausted = true,
                Some(raw) if self.filter_mode == FilterMode::Write || self.filters.is_empty() => {
                    return Ok(Some(raw));
                }
                Some(raw) => {
                    let transformed = self.filters.apply(&raw);
                    split_lines_into(&transformed, &mut self.pending);
                }
            }
        }
    }

    /// BOM found at the very start of the raw handle, if any.
    pub fn input_bom(&self) -> Result<Option<ByteSequence>> {
        let mut head = [0u8; BOM_PEEK_LEN];
        let mut handle = self.handle.borrow_mut();
        handle.seek(SeekFrom::Start(0))?;
        let n = read_full(&mut **handle, &mut head)?;
        Ok(bom_match(&head[..n]))
    }

    /// Append bytes at the end of the document through the write chain.
    ///
    /// The first call freezes the chain; writing after the chain has been
    /// modified fails with [`CsvError::StreamFilterLocked`].
    pub fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        let current = self.filters.names();
        match &self.committed_filters {
            Some(committed) if *committed != current => {
                return Err(CsvError::StreamFilterLocked(format!(
                    "filters {committed:?} were committed by the first write, found {current:?}"
                )));
            }
            Some(_) => {}
            None => self.committed_filters = Some(current),
        }

        let out = if self.filter_mode == FilterMode::Write {
            self.filters.apply(bytes)
        } else {
            bytes.into()
        };
        let mut handle = self.handle.borrow_mut();
        handle.seek(SeekFrom::End(0))?;
        handle.write_all(&out)?;
        Ok(out.len())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.handle.borrow_mut().flush()?;
        Ok(())
    }

    /// Copy the document to `out`, optionally skipping the first `skip` raw bytes.
    ///
    /// The read chain is applied. Returns the number of bytes written.
    pub fn pass_through<W: Write>(&mut self, out: &mut W, skip: u64) -> Result<u64> {
        self.seek_to(skip);
        let mut written = 0u64;
        while let Some(line) = self.next_line()? {
            out.write_all(&line)?;
            written += line.len() as u64;
        }
        self.rewind();
        Ok(written)
    }

    fn read_raw_line(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            if let Some(i) = self.buffer[self.consumed..].iter().position(|&b| b == b'\n') {
                let end = self.consumed + i + 1;
                let line = self.buffer[self.consumed..end].to_vec();
                self.consumed = end;
                return Ok(Some(line));
            }

            if self.fill()? == 0 {
                if self.consumed < self.buffer.len() {
                    let line = self.buffer[self.consumed..].to_vec();
                    self.consumed = self.buffer.len();
                    return Ok(Some(line));
                }
                return Ok(None);
            }
        }
    }

    fn fill(&mut self) -> Result<usize> {
        self.buffer.drain(..self.consumed);
        self.consumed = 0;

        let mut chunk = [0u8; CHUNK_SIZE];
        let n = {
            let mut handle = self.handle.borrow_mut();
            handle.seek(SeekFrom::Start(self.read_pos))?;
            read_full(&mut **handle, &mut chunk)?
        };
        self.read_pos += n as u64;
        self.buffer.extend_from_slice(&chunk[..n]);
        Ok(n)
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("source", &self.source)
            .field("controls", &self.controls)
            .field("filters", &self.filters)
            .field("filter_mode", &self.filter_mode)
            .field("read_pos", &self.read_pos)
            .finish_non_exhaustive()
    }
}

/// Read until `buf` is full or the source is exhausted.
fn read_full(reader: &mut dyn Handle, buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

/// Split transformed bytes back into `\n`-terminated lines.
fn split_lines_into(data: &[u8], out: &mut VecDeque<Vec<u8>>) {
    out.extend(
        data.split_inclusive(|&b| b == b'\n')
            .filter(|line| !line.is_empty())
            .map(<[u8]>::to_vec),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect_lines(doc: &mut Document) -> Vec<Vec<u8>> {
        doc.rewind();
        let mut lines = Vec::new();
        while let Some(line) = doc.next_line().unwrap() {
            lines.push(line);
        }
        lines
    }

    #[test]
    fn test_open_mode_parsing() {
        assert_eq!("r".parse::<OpenMode>().unwrap(), OpenMode::Read);
        assert_eq!("W+".parse::<OpenMode>().unwrap(), OpenMode::WriteRead);
        assert_eq!("c+".parse::<OpenMode>().unwrap(), OpenMode::CreateRead);
        assert!(matches!(
            "rw".parse::<OpenMode>(),
            Err(CsvError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_missing_path_is_unavailable() {
        let result = Document::from_path("/definitely/not/here/foo.csv", "r");
        assert!(matches!(result, Err(CsvError::StreamUnavailable(_))));
    }

    #[test]
    fn test_invalid_mode_rejected_before_opening() {
        let result = Document::from_path("/definitely/not/here/foo.csv", "z");
        assert!(matches!(result, Err(CsvError::InvalidArgument(_))));
    }

    #[test]
    fn test_lines_keep_terminators() {
        let mut doc = Document::from_string("a,b\r\nc,d\ne,f");
        assert_eq!(
            collect_lines(&mut doc),
            vec![b"a,b\r\n".to_vec(), b"c,d\n".to_vec(), b"e,f".to_vec()]
        );
        // a second pass sees the same lines
        assert_eq!(collect_lines(&mut doc).len(), 3);
    }

    #[test]
    fn test_long_lines_cross_chunks() {
        let long = "x".repeat(CHUNK_SIZE * 2 + 17);
        let mut doc = Document::from_string(format!("{long}\nshort\n"));
        let lines = collect_lines(&mut doc);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].len(), long.len() + 1);
        assert_eq!(lines[1], b"short\n");
    }

    #[test]
    fn test_read_filters_apply_per_line() {
        let mut doc = Document::from_string("john,doe\njane,doe\n");
        doc.add_stream_filter(StreamFilter::to_upper());
        assert_eq!(
            collect_lines(&mut doc),
            vec![b"JOHN,DOE\n".to_vec(), b"JANE,DOE\n".to_vec()]
        );

        assert!(doc.remove_stream_filter("string.toupper"));
        assert_eq!(collect_lines(&mut doc)[0], b"john,doe\n");
    }

    #[test]
    fn test_filter_output_is_resplit() {
        let mut doc = Document::from_string("a;b\n");
        doc.add_stream_filter(StreamFilter::replace(";", "\n"));
        assert_eq!(collect_lines(&mut doc), vec![b"a\n".to_vec(), b"b\n".to_vec()]);
    }

    #[test]
    fn test_write_appends_and_freezes_chain() {
        let mut doc = Document::from_string("");
        doc.set_filter_mode(FilterMode::Write);
        doc.add_stream_filter(StreamFilter::to_upper());
        doc.write(b"a,b\n").unwrap();
        assert!(doc.is_write_committed());
        doc.write(b"c,d\n").unwrap();
        assert_eq!(
            collect_lines(&mut doc),
            vec![b"A,B\n".to_vec(), b"C,D\n".to_vec()]
        );

        doc.add_stream_filter(StreamFilter::rot13());
        assert!(matches!(
            doc.write(b"e\n"),
            Err(CsvError::StreamFilterLocked(_))
        ));
    }

    #[test]
    fn test_input_bom_and_pass_through() {
        let mut content = ByteSequence::BOM_UTF8.to_vec();
        content.extend_from_slice(b"a,b\n");
        let mut doc = Document::from_bytes(content.clone());
        assert_eq!(doc.input_bom().unwrap(), Some(ByteSequence::Utf8));

        let mut out = Vec::new();
        assert_eq!(doc.pass_through(&mut out, 0).unwrap(), content.len() as u64);
        assert_eq!(out, content);

        let mut out = Vec::new();
        doc.pass_through(&mut out, 3).unwrap();
        assert_eq!(out, b"a,b\n");
    }

    #[test]
    fn test_shared_handle_has_independent_cursor() {
        let mut writer_doc = Document::from_string("");
        writer_doc.set_filter_mode(FilterMode::Write);
        writer_doc.write(b"one\n").unwrap();

        let mut reader_doc = writer_doc.share(FilterMode::Read);
        assert_eq!(reader_doc.next_line().unwrap(), Some(b"one\n".to_vec()));
        writer_doc.write(b"two\n").unwrap();
        assert_eq!(reader_doc.next_line().unwrap(), Some(b"two\n".to_vec()));
        assert_eq!(reader_doc.next_line().unwrap(), None);
    }
}
