//! Raw tabular payload
//!
//! A table is the parsed, not yet validated request body: named columns
//! and rows of loosely-typed cells. The schema validator decides whether a
//! table may become feature vectors.

use serde_json::Value;

/// Tokens read as missing values (same set a spreadsheet export produces)
const NULL_TOKENS: &[&str] = &["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None"];

/// A single cell as received
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Number(f64),
    Text(String),
}

impl Cell {
    /// Classify a raw CSV field
    pub fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim();
        if NULL_TOKENS.contains(&trimmed) {
            return Cell::Null;
        }
        match trimmed.parse::<f64>() {
            Ok(v) if v.is_nan() => Cell::Null,
            Ok(v) => Cell::Number(v),
            Err(_) => Cell::Text(trimmed.to_string()),
        }
    }

    /// Classify a JSON value
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Cell::Null,
            Value::Number(n) => n.as_f64().map(Cell::Number).unwrap_or(Cell::Null),
            Value::String(s) => Cell::from_raw(s),
            other => Cell::Text(other.to_string()),
        }
    }

    /// Float value, if the cell is numeric
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            _ => None,
        }
    }
}

/// Column-named rows of cells
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns, rows: Vec::new() }
    }

    /// Build a table from whole columns of equal length
    pub fn from_columns(columns: Vec<(String, Vec<Cell>)>) -> Self {
        let row_count = columns.iter().map(|(_, c)| c.len()).max().unwrap_or(0);
        let names = columns.iter().map(|(n, _)| n.clone()).collect();
        let mut table = Table::new(names);

        for i in 0..row_count {
            let row = columns
                .iter()
                .map(|(_, cells)| cells.get(i).cloned().unwrap_or(Cell::Null))
                .collect();
            table.push_row(row);
        }
        table
    }

    /// Append a row; short rows are padded with nulls, long rows truncated
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Null);
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell at (row, column index)
    pub fn cell(&self, row: usize, column: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|r| r.get(column))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cell_from_raw() {
        assert_eq!(Cell::from_raw(" 0.5 "), Cell::Number(0.5));
        assert_eq!(Cell::from_raw("1e10"), Cell::Number(1e10));
        assert_eq!(Cell::from_raw(""), Cell::Null);
        assert_eq!(Cell::from_raw("NaN"), Cell::Null);
        assert_eq!(Cell::from_raw("abc"), Cell::Text("abc".to_string()));
        assert_eq!(Cell::from_raw("1,5"), Cell::Text("1,5".to_string()));
    }

    #[test]
    fn test_cell_from_json() {
        assert_eq!(Cell::from_json(&json!(0.1)), Cell::Number(0.1));
        assert_eq!(Cell::from_json(&json!(3)), Cell::Number(3.0));
        assert_eq!(Cell::from_json(&json!(null)), Cell::Null);
        assert_eq!(Cell::from_json(&json!("0.7")), Cell::Number(0.7));
        assert_eq!(Cell::from_json(&json!(true)), Cell::Text("true".to_string()));
    }

    #[test]
    fn test_from_columns() {
        let table = Table::from_columns(vec![
            ("a".to_string(), vec![Cell::Number(1.0), Cell::Number(2.0)]),
            ("b".to_string(), vec![Cell::Number(3.0)]),
        ]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.cell(1, 1), Some(&Cell::Null));
        assert_eq!(table.column_index("b"), Some(1));
    }

    #[test]
    fn test_push_row_pads() {
        let mut table = Table::new(vec!["x".into(), "y".into()]);
        table.push_row(vec![Cell::Number(1.0)]);
        assert_eq!(table.cell(0, 1), Some(&Cell::Null));
    }
}
