//! tabular-csv CLI - query CSV documents from the command line

use std::cmp::Ordering;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use log::{debug, info};
use regex::Regex;
use tabular_csv::{ColumnKey, CsvError, NullHandling, Reader, Record, Statement, Writer};

/// Filter, sort and paginate CSV documents.
///
/// Records matching every `--where` condition are sorted by the `--order-by`
/// keys, then windowed by `--offset` and `--limit`, and written back as CSV.
#[derive(Parser, Debug)]
#[command(name = "tabular-csv")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input CSV file(s)
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Field delimiter (single character)
    #[arg(short = 'd', long, default_value = ",")]
    delimiter: String,

    /// Field enclosure (single character)
    #[arg(short = 'q', long, default_value = "\"")]
    enclosure: String,

    /// Escape character; pass an empty string to use the lenient parser
    #[arg(short = 'e', long, default_value = "\\")]
    escape: String,

    /// Offset of the header record
    #[arg(short = 'H', long)]
    header: Option<i64>,

    /// Keep records with no fields at all
    #[arg(long)]
    include_empty: bool,

    /// Keep the input BOM on the first field
    #[arg(long)]
    keep_bom: bool,

    /// Condition `COLUMN=REGEX`; COLUMN is a header name or a zero based index
    #[arg(short = 'w', long = "where", value_name = "COLUMN=REGEX")]
    conditions: Vec<String>,

    /// Sort key; prefix with `-` for descending order
    #[arg(short = 'o', long, value_name = "COLUMN")]
    order_by: Vec<String>,

    /// Number of matching records to skip
    #[arg(long, default_value = "0")]
    offset: i64,

    /// Maximum number of records to output (-1 for no limit)
    #[arg(short = 'n', long, default_value = "-1", allow_hyphen_values = true)]
    limit: i64,

    /// Only print the number of matching records
    #[arg(short = 'c', long)]
    count: bool,

    /// Output delimiter (defaults to the input delimiter)
    #[arg(long)]
    out_delimiter: Option<String>,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let mut exit_code = ExitCode::SUCCESS;

    for file in &args.files {
        if let Err(e) = query_file(file, &args) {
            eprintln!("Error processing {}: {}", file.display(), e);
            exit_code = ExitCode::FAILURE;
        }
    }

    exit_code
}

fn query_file(path: &Path, args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut reader = Reader::from_path(path)?;
    reader
        .set_delimiter(&args.delimiter)?
        .set_enclosure(&args.enclosure)?
        .set_escape(&args.escape)?
        .set_header_offset(args.header)?;
    if args.include_empty {
        reader.include_empty_records();
    }
    if args.keep_bom {
        reader.include_input_bom();
    }

    let header = reader.header()?;
    let stmt = build_statement(args, &header)?;
    debug!("{}: {stmt:?}", path.display());

    let set = stmt.process(&mut reader, &[])?;
    if args.count {
        println!("{}", set.count()?);
        return Ok(());
    }

    let mut writer = Writer::from_string("");
    writer
        .set_null_handling(NullHandling::Empty)
        .set_delimiter(args.out_delimiter.as_deref().unwrap_or(args.delimiter.as_str()))?
        .set_enclosure(&args.enclosure)?;
    if !header.is_empty() {
        writer.insert_one(header.clone())?;
    }
    let mut written = 0usize;
    for record in set {
        writer.insert_one(record?)?;
        written += 1;
    }
    info!("{}: {written} records selected", path.display());

    let stdout = io::stdout();
    let mut out = stdout.lock();
    writer.output(&mut out)?;
    out.flush()?;
    Ok(())
}

fn build_statement(args: &Args, header: &[String]) -> Result<Statement, Box<dyn std::error::Error>> {
    let mut stmt = Statement::new();

    for condition in &args.conditions {
        let (column, pattern) = condition.split_once('=').ok_or_else(|| {
            CsvError::InvalidArgument(format!("condition {condition:?} is not COLUMN=REGEX"))
        })?;
        let key = column_key(column, header)?;
        let re = Regex::new(pattern)?;
        stmt = stmt.filter(move |r: &Record| r.value(&key).is_some_and(|v| re.is_match(v)));
    }

    for column in &args.order_by {
        let (column, descending) = match column.strip_prefix('-') {
            Some(rest) => (rest, true),
            None => (column.as_str(), false),
        };
        let key = column_key(column, header)?;
        stmt = stmt.order_by(move |a: &Record, b: &Record| {
            let ordering = compare_values(a.value(&key), b.value(&key));
            if descending { ordering.reverse() } else { ordering }
        });
    }

    Ok(stmt.offset(args.offset)?.limit(args.limit)?)
}

/// Resolve a column given by name or by zero based index.
fn column_key(column: &str, header: &[String]) -> Result<ColumnKey, CsvError> {
    if header.iter().any(|h| h == column) {
        return Ok(ColumnKey::Name(column.to_string()));
    }
    match column.parse::<usize>() {
        Ok(index) if header.is_empty() => Ok(ColumnKey::Index(index)),
        Ok(index) => header
            .get(index)
            .map(|name| ColumnKey::Name(name.clone()))
            .ok_or_else(|| CsvError::OutOfRange(format!("column index {index} is out of range"))),
        Err(_) => Err(CsvError::InvalidArgument(format!("unknown column {column:?}"))),
    }
}

/// Numeric comparison when both values parse as numbers, text comparison otherwise.
fn compare_values(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
            (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => a.cmp(b),
        },
        (a, b) => a.cmp(&b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_key() {
        let header = vec!["name".to_string(), "age".to_string()];
        assert_eq!(column_key("age", &header).unwrap(), ColumnKey::Name("age".into()));
        assert_eq!(column_key("0", &header).unwrap(), ColumnKey::Name("name".into()));
        assert_eq!(column_key("3", &[]).unwrap(), ColumnKey::Index(3));
        assert!(column_key("9", &header).is_err());
        assert!(column_key("zip", &header).is_err());
    }

    #[test]
    fn test_compare_values() {
        assert_eq!(compare_values(Some("10"), Some("9")), Ordering::Greater);
        assert_eq!(compare_values(Some("b"), Some("a")), Ordering::Greater);
        assert_eq!(compare_values(None, Some("a")), Ordering::Less);
    }
}
