//! Record parsing backed by the `csv` crate tokenizer.

use std::borrow::Cow;
use std::collections::VecDeque;

use csv::{ByteRecord, ReaderBuilder, Terminator};

use super::{RawRecord, is_blank_line, leading_bom};
use crate::control::ControlCharacters;
use crate::document::Document;
use crate::error::Result;

/// Tokenizer state carried across physical lines while assembling a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum ScanState {
    #[default]
    FieldStart,
    Unquoted,
    Quoted,
    QuotedEscape,
    QuoteInQuoted,
}

/// Parser used whenever an escape character is configured.
///
/// Physical lines are joined while an enclosure is open, then the logical
/// buffer is handed to `csv` with double-quoting and the escape enabled.
#[derive(Debug)]
pub struct StandardParser {
    controls: ControlCharacters,
    builder: ReaderBuilder,
    queue: VecDeque<RawRecord>,
}

impl StandardParser {
    pub fn new(controls: ControlCharacters) -> Self {
        let mut builder = ReaderBuilder::new();
        builder
            .delimiter(controls.delimiter())
            .quote(controls.enclosure())
            .quoting(true)
            .double_quote(true)
            .escape(controls.escape())
            .terminator(Terminator::CRLF)
            .has_headers(false)
            .flexible(true);

        Self {
            controls,
            builder,
            queue: VecDeque::new(),
        }
    }

    pub fn next_record(&mut self, document: &mut Document) -> Result<Option<RawRecord>> {
        if let Some(record) = self.queue.pop_front() {
            return Ok(Some(record));
        }

        let Some(mut buffer) = document.next_line()? else {
            return Ok(None);
        };
        if is_blank_line(&buffer) {
            return Ok(Some(Vec::new()));
        }

        // The tokenizer never sees a leading BOM; it is glued back onto the
        // first field so BOM normalization stays with the reader.
        let bom = buffer[..leading_bom(&buffer)].to_vec();
        let start = bom.len();

        let mut state = self.scan(ScanState::default(), &buffer[start..]);
        while matches!(state, ScanState::Quoted | ScanState::QuotedEscape) {
            match document.next_line()? {
                Some(line) => {
                    state = self.scan(state, &line);
                    buffer.extend_from_slice(&line);
                }
                None => break,
            }
        }

        let tokens = self.keep_escapes(&buffer[start..]);
        let mut reader = self.builder.from_reader(tokens.as_ref());
        let mut record = ByteRecord::new();
        while reader.read_byte_record(&mut record)? {
            self.queue
                .push_back(record.iter().map(<[u8]>::to_vec).collect());
        }
        if !bom.is_empty()
            && let Some(first) = self.queue.front_mut().and_then(|r| r.first_mut())
        {
            first.splice(0..0, bom);
        }

        Ok(Some(self.queue.pop_front().unwrap_or_default()))
    }

    /// Advance the enclosure state over one physical line.
    fn scan(&self, state: ScanState, line: &[u8]) -> ScanState {
        // Without enclosures the state is trivially known.
        if bytecount::count(line, self.controls.enclosure()) == 0 {
            return match state {
                ScanState::Quoted | ScanState::QuotedEscape => ScanState::Quoted,
                _ => ScanState::FieldStart,
            };
        }
        line.iter().fold(state, |state, &b| self.step(state, b))
    }

    fn step(&self, state: ScanState, b: u8) -> ScanState {
        let enclosure = self.controls.enclosure();
        let delimiter = self.controls.delimiter();
        let escape = self.escape();
        match state {
            ScanState::FieldStart if b == enclosure => ScanState::Quoted,
            ScanState::FieldStart | ScanState::Unquoted
                if b == delimiter || b == b'\n' || b == b'\r' =>
            {
                ScanState::FieldStart
            }
            ScanState::FieldStart | ScanState::Unquoted => ScanState::Unquoted,
            ScanState::Quoted if Some(b) == escape => ScanState::QuotedEscape,
            ScanState::Quoted if b == enclosure => ScanState::QuoteInQuoted,
            ScanState::Quoted | ScanState::QuotedEscape => ScanState::Quoted,
            ScanState::QuoteInQuoted if b == enclosure => ScanState::Quoted,
            ScanState::QuoteInQuoted if b == delimiter || b == b'\n' || b == b'\r' => {
                ScanState::FieldStart
            }
            ScanState::QuoteInQuoted => ScanState::Unquoted,
        }
    }

    fn escape(&self) -> Option<u8> {
        let enclosure = self.controls.enclosure();
        self.controls.escape().filter(|&e| e != enclosure)
    }

    /// Rewrite `buffer` so escape bytes inside enclosed fields survive tokenizing.
    ///
    /// The escape only stops the following byte from closing the field; both
    /// bytes stay in the value. `csv` drops the escape itself, so each one is
    /// doubled and an escaped enclosure is also doubled.
    fn keep_escapes<'b>(&self, buffer: &'b [u8]) -> Cow<'b, [u8]> {
        let enclosure = self.controls.enclosure();
        let Some(escape) = self.escape() else {
            return Cow::Borrowed(buffer);
        };
        if bytecount::count(buffer, escape) == 0 || bytecount::count(buffer, enclosure) == 0 {
            return Cow::Borrowed(buffer);
        }

        let mut out = Vec::with_capacity(buffer.len() + 8);
        let mut state = ScanState::default();
        for &b in buffer {
            match state {
                ScanState::Quoted if b == escape => out.extend_from_slice(&[escape, escape]),
                ScanState::QuotedEscape if b == escape || b == enclosure => {
                    out.extend_from_slice(&[b, b]);
                }
                _ => out.push(b),
            }
            state = self.step(state, b);
        }
        Cow::Owned(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::ByteSequence;

    fn records(content: &str, controls: ControlCharacters) -> Vec<Vec<String>> {
        let mut doc = Document::from_string(content);
        let mut parser = StandardParser::new(controls);
        let mut out = Vec::new();
        while let Some(record) = parser.next_record(&mut doc).unwrap() {
            out.push(
                record
                    .into_iter()
                    .map(|f| String::from_utf8(f).unwrap())
                    .collect(),
            );
        }
        out
    }

    #[test]
    fn test_simple_records() {
        let rows = records("john,doe,john.doe@example.com\njane,doe,jane.doe@example.com\n", ControlCharacters::default());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], vec!["jane", "doe", "jane.doe@example.com"]);
    }

    #[test]
    fn test_multiline_enclosed_field() {
        let content = "1997,Ford,E350,\"ac, abs, moon\",3000.00\n1996,Jeep,Grand Cherokee,\"MUST SELL!\nair, moon roof, loaded\",4799.00\n";
        let rows = records(content, ControlCharacters::default());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][3], "ac, abs, moon");
        assert_eq!(rows[1][3], "MUST SELL!\nair, moon roof, loaded");
        assert_eq!(rows[1][4], "4799.00");
    }

    #[test]
    fn test_doubled_and_escaped_enclosures() {
        let rows = records(
            "\"a \"\"quoted\"\" word\",\"b \\\" c\"\n",
            ControlCharacters::default(),
        );
        assert_eq!(rows, vec![vec!["a \"quoted\" word", "b \\\" c"]]);
    }

    #[test]
    fn test_escape_is_kept_in_enclosed_field() {
        let rows = records(
            "\"C:\\dir,x\",\"a\\\\b\",c\\d\n",
            ControlCharacters::default(),
        );
        assert_eq!(rows, vec![vec!["C:\\dir,x", "a\\\\b", "c\\d"]]);
    }

    #[test]
    fn test_escaped_escape_does_not_escape_enclosure() {
        let rows = records("\"a\\\\\",b\n", ControlCharacters::default());
        assert_eq!(rows, vec![vec!["a\\\\", "b"]]);
    }

    #[test]
    fn test_escaped_enclosure_keeps_field_open_across_lines() {
        let rows = records("\"a\\\"\nb\",c\nd\n", ControlCharacters::default());
        assert_eq!(rows, vec![vec!["a\\\"\nb", "c"], vec!["d"]]);
    }

    #[test]
    fn test_enclosure_inside_unquoted_field_is_literal() {
        let rows = records("Ye\"ar,Make\nnext,row\n", ControlCharacters::default());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec!["Ye\"ar", "Make"]);
    }

    #[test]
    fn test_crlf_and_blank_lines() {
        let rows = records("a,b\r\n\r\nc,d\r\n", ControlCharacters::default());
        assert_eq!(rows, vec![vec!["a", "b"], vec![], vec!["c", "d"]]);
    }

    #[test]
    fn test_custom_controls() {
        let controls = ControlCharacters::new(";", "'", "\\").unwrap();
        let rows = records("'a;b';c\n", controls);
        assert_eq!(rows, vec![vec!["a;b", "c"]]);
    }

    #[test]
    fn test_leading_bom_is_kept_on_first_field() {
        let mut content = ByteSequence::BOM_UTF8.to_vec();
        content.extend_from_slice(b"\"a\nb\",c\n");
        let mut doc = Document::from_bytes(content);
        let mut parser = StandardParser::new(ControlCharacters::default());
        let record = parser.next_record(&mut doc).unwrap().unwrap();
        assert_eq!(record[0], b"\xEF\xBB\xBFa\nb");
        assert_eq!(record[1], b"c");
        assert_eq!(parser.next_record(&mut doc).unwrap(), None);
    }

    #[test]
    fn test_leading_bom_does_not_hide_enclosure() {
        let mut content = ByteSequence::BOM_UTF8.to_vec();
        content.extend_from_slice(b"\"\"\"quoted\"\"\",b\n");
        let mut doc = Document::from_bytes(content);
        let mut parser = StandardParser::new(ControlCharacters::default());
        let record = parser.next_record(&mut doc).unwrap().unwrap();
        assert_eq!(record[0], b"\xEF\xBB\xBF\"quoted\"");
    }

    #[test]
    fn test_unterminated_enclosure_reads_to_end() {
        let rows = records("\"open,field\nstill open\n", ControlCharacters::default());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0], "open,field\nstill open\n");
    }
}
