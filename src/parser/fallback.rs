//! Scanner used when the escape character is empty.
//!
//! Only doubled enclosures are recognized inside an enclosed field. Leading
//! blanks before an opening enclosure are dropped, content found after a
//! closing enclosure is kept, and unenclosed fields are never trimmed.

use super::{RawRecord, is_blank_line, leading_bom, trim_line_end};
use crate::control::ControlCharacters;
use crate::document::Document;
use crate::error::Result;

/// Blanks allowed before an opening enclosure.
const LEADING_BLANKS: &[u8] = b" \t\0\x0B";

#[derive(Debug, Clone)]
pub struct FallbackParser {
    delimiter: u8,
    enclosure: u8,
    trim_mask: Vec<u8>,
}

impl FallbackParser {
    pub fn new(controls: ControlCharacters) -> Self {
        let delimiter = controls.delimiter();
        let enclosure = controls.enclosure();
        let trim_mask = LEADING_BLANKS
            .iter()
            .copied()
            .filter(|&b| b != delimiter && b != enclosure)
            .collect();

        Self {
            delimiter,
            enclosure,
            trim_mask,
        }
    }

    pub fn next_record(&mut self, document: &mut Document) -> Result<Option<RawRecord>> {
        let Some(line) = document.next_line()? else {
            return Ok(None);
        };
        if is_blank_line(&line) {
            return Ok(Some(Vec::new()));
        }

        let bom = line[..leading_bom(&line)].to_vec();
        let mut cursor = LineCursor {
            parser: self,
            document,
            pos: bom.len(),
            line,
            live: true,
        };
        let mut record = Vec::new();
        while cursor.live {
            let rest = cursor.rest();
            let blanks = rest
                .iter()
                .take_while(|b| cursor.parser.trim_mask.contains(b))
                .count();
            if rest.get(blanks) == Some(&cursor.parser.enclosure) {
                cursor.pos += blanks;
                record.push(cursor.enclosed_field()?);
            } else {
                record.push(cursor.plain_field());
            }
        }
        if let Some(first) = record.first_mut() {
            first.splice(0..0, bom);
        }
        Ok(Some(record))
    }
}

/// Position inside the physical line currently being scanned.
///
/// `live` turns false once the record is complete.
struct LineCursor<'p, 'd> {
    parser: &'p FallbackParser,
    document: &'d mut Document,
    line: Vec<u8>,
    pos: usize,
    live: bool,
}

impl LineCursor<'_, '_> {
    fn rest(&self) -> &[u8] {
        &self.line[self.pos..]
    }

    fn at_field_break(&self) -> bool {
        let rest = self.rest();
        rest.is_empty() || is_blank_line(rest)
    }

    /// Content up to the next delimiter, or up to the line end for the last field.
    fn plain_field(&mut self) -> Vec<u8> {
        if self.at_field_break() {
            self.live = false;
            return Vec::new();
        }

        let rest = self.rest();
        match rest.iter().position(|&b| b == self.parser.delimiter) {
            Some(i) => {
                let content = rest[..i].to_vec();
                self.pos += i + 1;
                content
            }
            None => {
                let content = trim_line_end(rest).to_vec();
                self.live = false;
                content
            }
        }
    }

    /// Content of an enclosed field, reading further lines while the enclosure is open.
    fn enclosed_field(&mut self) -> Result<Vec<u8>> {
        let enclosure = self.parser.enclosure;
        let mut content = Vec::new();

        loop {
            if self.rest().first() == Some(&enclosure) {
                self.pos += 1;
            }

            while self.live {
                let rest = self.rest();
                match rest.iter().position(|&b| b == enclosure) {
                    Some(i) => {
                        content.extend_from_slice(&rest[..i]);
                        self.pos += i + 1;
                        break;
                    }
                    None => {
                        content.extend_from_slice(rest);
                        match self.document.next_line()? {
                            Some(line) => {
                                self.line = line;
                                self.pos = 0;
                            }
                            None => self.live = false,
                        }
                    }
                }
            }

            if !self.live || self.at_field_break() {
                self.live = false;
                content.truncate(trim_line_end(&content).len());
                return Ok(content);
            }

            let next = self.rest()[0];
            match next {
                b if b == self.parser.delimiter => {
                    self.pos += 1;
                    return Ok(content);
                }
                // doubled enclosure: keep one and continue the field
                b if b == enclosure => content.push(enclosure),
                _ => {
                    content.extend(self.plain_field());
                    return Ok(content);
                }
            }
        }
    }
}
