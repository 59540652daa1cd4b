//! Payload parsing (Received -> Parsed)
//!
//! Turns raw request bodies into a `Table`. Only structure is checked
//! here; column presence and cell values are the validator's job.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::models::{Cell, Table};

/// Default cap on data rows per request
pub const DEFAULT_MAX_ROWS: usize = 10_000;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("The uploaded file is empty")]
    Empty,
    #[error("The uploaded file is not valid UTF-8")]
    NotUtf8,
    #[error("Invalid CSV format: {0}")]
    Csv(String),
    #[error("The payload has no data rows")]
    NoRows,
    #[error("Duplicate column '{0}'")]
    DuplicateColumn(String),
    #[error("The payload has more than {limit} rows")]
    TooManyRows { limit: usize },
}

/// Parse a CSV document with a header row
pub fn parse_csv(bytes: &[u8], max_rows: usize) -> Result<Table, ParseError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let text = std::str::from_utf8(bytes).map_err(|_| ParseError::NotUtf8)?;
    if text.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ParseError::Csv(e.to_string()))?
        .iter()
        .map(String::from)
        .collect();
    check_unique(&headers)?;

    let mut table = Table::new(headers);
    for record in reader.records() {
        let record = record.map_err(|e| ParseError::Csv(e.to_string()))?;
        if table.row_count() == max_rows {
            return Err(ParseError::TooManyRows { limit: max_rows });
        }
        table.push_row(record.iter().map(Cell::from_raw).collect());
    }

    if table.is_empty() {
        return Err(ParseError::NoRows);
    }
    tracing::debug!("Parsed CSV: {} columns, {} rows", table.columns().len(), table.row_count());
    Ok(table)
}

/// Build a table from JSON objects; a key absent from a row reads as null
pub fn parse_json_rows(rows: &[Map<String, Value>], max_rows: usize) -> Result<Table, ParseError> {
    if rows.is_empty() {
        return Err(ParseError::NoRows);
    }
    if rows.len() > max_rows {
        return Err(ParseError::TooManyRows { limit: max_rows });
    }

    let mut seen = HashSet::new();
    let columns: Vec<String> = rows
        .iter()
        .flat_map(|row| row.keys())
        .filter(|key| seen.insert(key.as_str()))
        .cloned()
        .collect();

    let mut table = Table::new(columns.clone());
    for row in rows {
        table.push_row(
            columns
                .iter()
                .map(|c| row.get(c).map(Cell::from_json).unwrap_or(Cell::Null))
                .collect(),
        );
    }
    Ok(table)
}

fn check_unique(headers: &[String]) -> Result<(), ParseError> {
    let mut seen = HashSet::new();
    for header in headers {
        if !seen.insert(header.as_str()) {
            return Err(ParseError::DuplicateColumn(header.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_csv() {
        let table = parse_csv(b"a,b\n0.1,2\n,x\n", 10).unwrap();
        assert_eq!(table.columns(), &["a".to_string(), "b".to_string()]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.cell(0, 1), Some(&Cell::Number(2.0)));
        assert_eq!(table.cell(1, 0), Some(&Cell::Null));
        assert_eq!(table.cell(1, 1), Some(&Cell::Text("x".to_string())));
    }

    #[test]
    fn test_quoted_header_with_comma() {
        let table = parse_csv(b"\"Net Value, Share\",b\n1,2\n", 10).unwrap();
        assert_eq!(table.column_index("Net Value, Share"), Some(0));
    }

    #[test]
    fn test_bom_and_whitespace_trimmed() {
        let table = parse_csv(b"\xEF\xBB\xBF a , b \n 1 , 2 \n", 10).unwrap();
        assert_eq!(table.column_index("a"), Some(0));
        assert_eq!(table.cell(0, 1), Some(&Cell::Number(2.0)));
    }

    #[test]
    fn test_empty_payloads() {
        assert_eq!(parse_csv(b"", 10).unwrap_err(), ParseError::Empty);
        assert_eq!(parse_csv(b"  \n\n", 10).unwrap_err(), ParseError::Empty);
        assert_eq!(parse_csv(b"a,b\n", 10).unwrap_err(), ParseError::NoRows);
    }

    #[test]
    fn test_malformed_csv() {
        assert!(matches!(parse_csv(b"a,b\n1,2,3\n", 10), Err(ParseError::Csv(_))));
        assert_eq!(parse_csv(&[0xff, 0xfe, 0x00], 10).unwrap_err(), ParseError::NotUtf8);
        assert_eq!(
            parse_csv(b"a,a\n1,2\n", 10).unwrap_err(),
            ParseError::DuplicateColumn("a".to_string())
        );
    }

    #[test]
    fn test_row_limit() {
        assert!(parse_csv(b"a\n1\n2\n", 2).is_ok());
        assert_eq!(parse_csv(b"a\n1\n2\n3\n", 2).unwrap_err(), ParseError::TooManyRows { limit: 2 });
    }

    #[test]
    fn test_parse_json_rows() {
        let rows: Vec<Map<String, Value>> = vec![
            json!({ "a": 0.5, "b": "0.25" }).as_object().cloned().unwrap(),
            json!({ "a": null, "c": 3 }).as_object().cloned().unwrap(),
        ];
        let table = parse_json_rows(&rows, 10).unwrap();

        assert_eq!(table.columns().len(), 3);
        let b = table.column_index("b").unwrap();
        let c = table.column_index("c").unwrap();
        assert_eq!(table.cell(0, b), Some(&Cell::Number(0.25)));
        assert_eq!(table.cell(1, b), Some(&Cell::Null));
        assert_eq!(table.cell(0, c), Some(&Cell::Null));
        assert_eq!(table.cell(1, c), Some(&Cell::Number(3.0)));

        assert_eq!(parse_json_rows(&[], 10).unwrap_err(), ParseError::NoRows);
        assert_eq!(
            parse_json_rows(&rows, 1).unwrap_err(),
            ParseError::TooManyRows { limit: 1 }
        );
    }
}
