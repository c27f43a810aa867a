//! tabular-csv: CSV documents with a lazy query pipeline
//!
//! Reads and writes delimiter-separated text from files, in-memory strings
//! or arbitrary seekable streams, with configurable delimiter, enclosure and
//! escape characters, optional header rows, byte-order-mark handling and a
//! chain of named byte filters applied while reading or writing.
//!
//! # Quick Start
//!
//! ```
//! use tabular_csv::{Reader, Statement};
//!
//! let mut reader = Reader::from_string(
//!     "firstname,lastname,email\njohn,doe,john@example.com\njane,roe,jane@example.com\n",
//! );
//! reader.set_header_offset(Some(0))?;
//!
//! let stmt = Statement::new()
//!     .filter(|r| r.get_named("lastname") == Some("roe"))
//!     .limit(10)?;
//!
//! for record in stmt.process(&mut reader, &[])? {
//!     let record = record?;
//!     println!("{:?}", record.get_named("email"));
//! }
//! # Ok::<(), tabular_csv::CsvError>(())
//! ```
//!
//! # Writing
//!
//! ```
//! use tabular_csv::{NullHandling, Writer};
//!
//! let mut writer = Writer::from_string("");
//! writer
//!     .set_null_handling(NullHandling::Empty)
//!     .autodetect_columns_count();
//! writer.insert_all(vec![vec![Some("a"), None], vec![Some("c"), Some("d")]])?;
//!
//! assert_eq!(writer.content()?, "a,\nc,d\n");
//! assert_eq!(writer.reader().count()?, 2);
//! # Ok::<(), tabular_csv::CsvError>(())
//! ```
//!
//! # Escape characters
//!
//! With an escape character configured, records are tokenized by the `csv`
//! crate. Setting the escape to the empty string switches to a dedicated
//! scanner that only understands doubled enclosures and reproduces the
//! lenient handling of malformed enclosures found in real-world exports.

mod control;
mod document;
mod encoding;
mod error;
mod filter;
mod header;
#[cfg(feature = "http")]
pub mod http;
mod parser;
mod reader;
mod record;
mod result_set;
mod statement;
mod validator;
mod writer;

pub use control::ControlCharacters;
pub use document::{Document, FilterMode, Handle, OpenMode};
pub use encoding::{ByteSequence, bom_match, is_utf8, skip_bom};
pub use error::{CsvError, InsertionError, Result};
pub use filter::{StreamFilter, TransformChain};
pub use header::{combine, strip_bom};
pub use parser::{FallbackParser, RawRecord, RawRecords, RecordParser, StandardParser};
pub use reader::{OffsetRecords, Reader, Records};
pub use record::{ColumnKey, Record};
pub use result_set::ResultSet;
pub use statement::Statement;
pub use validator::{ColumnConsistency, RecordValidator};
pub use writer::{COLUMN_CONSISTENCY, Newline, NullHandling, Row, Writer};
