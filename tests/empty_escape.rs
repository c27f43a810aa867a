//! Reader behaviour with an empty escape character.
//!
//! These fixtures pin the lenient handling of malformed enclosures.

use tabular_csv::{Reader, Record};

fn lenient(content: &str) -> Reader {
    let mut reader = Reader::from_string(content);
    reader.set_escape("").unwrap();
    reader
}

fn rows(reader: &mut Reader) -> Vec<Vec<String>> {
    reader
        .fetch_all()
        .unwrap()
        .iter()
        .map(|r: &Record| r.iter().map(|v| v.unwrap_or_default().to_string()).collect())
        .collect()
}

#[test]
fn test_empty_lines_are_skipped_by_default() {
    let mut reader = lenient(
        "\"parent name\",\"child name\",\"title\"\n\n\n\"parentA\",\"childA\",\"titleA\"",
    );
    assert_eq!(
        rows(&mut reader),
        vec![
            vec!["parent name", "child name", "title"],
            vec!["parentA", "childA", "titleA"],
        ]
    );

    reader.include_empty_records();
    assert_eq!(reader.count().unwrap(), 4);
}

#[test]
fn test_header_with_lenient_parser() {
    let mut reader = lenient("Year|Make\n1997|'Ford\nMotor'\n");
    reader.set_delimiter("|").unwrap().set_enclosure("'").unwrap();
    reader.set_header_offset(Some(0)).unwrap();

    assert_eq!(reader.header().unwrap(), vec!["Year", "Make"]);
    let record = reader.fetch_one(0).unwrap().unwrap();
    assert_eq!(record.get_named("Make"), Some("Ford\nMotor"));
}

#[test]
fn test_malformed_enclosures() {
    let cases = [
        ("Ye\"ar,Make\",Model,Description,Price", ["Ye\"ar", "Make\"", "Model", "Description", "Price"]),
        ("Year,Make,Model,Description,Price\"", ["Year", "Make", "Model", "Description", "Price\""]),
        ("Year,Make,Model,Description,\"Price", ["Year", "Make", "Model", "Description", "Price"]),
        ("Year,Make,Model,Description,\"Pri\"ce", ["Year", "Make", "Model", "Description", "Price"]),
    ];
    for (content, expected) in cases {
        let mut reader = lenient(content);
        assert_eq!(reader.fetch_one(0).unwrap().unwrap(), expected, "input: {content}");
    }
}

#[test]
fn test_spaces_outside_enclosures() {
    let mut reader = lenient(
        "\"foo\",\"foo bar\",\"boo bar baz\"\n  \"foo\"  , \"foo bar\" ,    \"boo bar baz\"",
    );
    assert_eq!(
        rows(&mut reader),
        vec![
            vec!["foo", "foo bar", "boo bar baz"],
            vec!["foo  ", "foo bar ", "boo bar baz"],
        ]
    );
}

#[test]
fn test_invalid_enclosures_parse_like_standard_parser() {
    let content = "\"foo\"bar\",foo\"bar\r\n\"foo\"\r\nbaz,bar\"";
    let mut standard = Reader::from_string(content);
    let mut fallback = lenient(content);
    let expected = vec![
        vec!["foobar\"", "foo\"bar"],
        vec!["foo"],
        vec!["baz", "bar\""],
    ];
    assert_eq!(rows(&mut fallback), expected);
    assert_eq!(rows(&mut standard), expected);
}

#[test]
fn test_well_formed_input_matches_standard_parser() {
    let content = "\"foo\",bar,\"baz \"\"qux\"\"\"\r\n\"multi\r\nline\",x\r\nlast,\r\n";
    let mut standard = Reader::from_string(content);
    let mut fallback = lenient(content);
    assert_eq!(rows(&mut standard), rows(&mut fallback));
    assert_eq!(rows(&mut fallback)[1][0], "multi\r\nline");
}
