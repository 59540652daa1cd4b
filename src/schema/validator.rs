//! Schema validator
//!
//! Validation semantics:
//! - Every rule is evaluated against every row
//! - All violations are collected; nothing stops at the first failure
//! - Per cell, checks run existence -> null -> type -> range, and a cell
//!   failing an earlier check is not re-reported by a later one
//!
//! The validator is a pure function of its inputs and never mutates them.

use serde::Serialize;

use super::rules::{FieldRule, RuleSet};
use crate::models::{Cell, Table};

/// Row indices kept per violation (the count is always exact)
pub const MAX_SAMPLE_ROWS: usize = 20;

/// Kind of rule failure, ordered from most to least fundamental
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ViolationKind {
    #[serde(rename = "SCHEMA_MISSING_COLUMN")]
    MissingColumn,
    #[serde(rename = "SCHEMA_NULL_VALUE")]
    NullValue,
    #[serde(rename = "SCHEMA_TYPE_ERROR")]
    TypeError,
    #[serde(rename = "SCHEMA_RANGE_VIOLATION")]
    RangeViolation,
}

impl ViolationKind {
    /// Machine-readable reason code
    pub fn code(&self) -> &'static str {
        match self {
            ViolationKind::MissingColumn => "SCHEMA_MISSING_COLUMN",
            ViolationKind::NullValue => "SCHEMA_NULL_VALUE",
            ViolationKind::TypeError => "SCHEMA_TYPE_ERROR",
            ViolationKind::RangeViolation => "SCHEMA_RANGE_VIOLATION",
        }
    }
}

/// One failed (rule, reason) pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    pub field: String,
    #[serde(rename = "code")]
    pub kind: ViolationKind,
    /// Number of offending rows (0 for a missing column)
    pub unexpected_count: usize,
    /// Zero-based data row indices, ascending, at most [`MAX_SAMPLE_ROWS`]
    pub sample_rows: Vec<usize>,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub success: bool,
    pub violations: Vec<Violation>,
}

impl ValidationResult {
    fn from_violations(violations: Vec<Violation>) -> Self {
        Self {
            success: violations.is_empty(),
            violations,
        }
    }

    pub fn into_violations(self) -> Vec<Violation> {
        self.violations
    }
}

#[derive(Default)]
struct RowCollector {
    count: usize,
    sample: Vec<usize>,
}

impl RowCollector {
    fn record(&mut self, row: usize) {
        self.count += 1;
        if self.sample.len() < MAX_SAMPLE_ROWS {
            self.sample.push(row);
        }
    }

    fn into_violation(self, rule: &FieldRule, kind: ViolationKind) -> Option<Violation> {
        if self.count == 0 {
            return None;
        }
        let detail = match kind {
            ViolationKind::MissingColumn => format!("column '{}' is missing", rule.name),
            ViolationKind::NullValue => format!("{} null value(s) in '{}'", self.count, rule.name),
            ViolationKind::TypeError => {
                format!("{} non-numeric value(s) in '{}'", self.count, rule.name)
            }
            ViolationKind::RangeViolation => format!(
                "{} value(s) in '{}' outside {}",
                self.count, rule.name, rule.domain
            ),
        };
        Some(Violation {
            field: rule.name.clone(),
            kind,
            unexpected_count: self.count,
            sample_rows: self.sample,
            detail,
        })
    }
}

/// Validate every row of `table` against every rule of `rule_set`
pub fn validate(table: &Table, rule_set: &RuleSet) -> ValidationResult {
    let mut violations = Vec::new();

    for rule in rule_set.rules() {
        let Some(column) = table.column_index(&rule.name) else {
            if rule.required {
                violations.push(Violation {
                    field: rule.name.clone(),
                    kind: ViolationKind::MissingColumn,
                    unexpected_count: 0,
                    sample_rows: Vec::new(),
                    detail: format!("column '{}' is missing", rule.name),
                });
            }
            continue;
        };

        violations.extend(check_column(table, column, rule));
    }

    ValidationResult::from_violations(violations)
}

/// Most fundamental violation kind present
pub fn primary_kind(violations: &[Violation]) -> Option<ViolationKind> {
    violations.iter().map(|v| v.kind).min()
}

fn check_column(table: &Table, column: usize, rule: &FieldRule) -> Vec<Violation> {
    let mut nulls = RowCollector::default();
    let mut types = RowCollector::default();
    let mut ranges = RowCollector::default();

    for row in 0..table.row_count() {
        match table.cell(row, column) {
            None | Some(Cell::Null) => {
                if rule.required {
                    nulls.record(row);
                }
            }
            Some(Cell::Text(_)) => types.record(row),
            Some(Cell::Number(value)) => {
                if !rule.domain.contains(*value) {
                    ranges.record(row);
                }
            }
        }
    }

    [
        nulls.into_violation(rule, ViolationKind::NullValue),
        types.into_violation(rule, ViolationKind::TypeError),
        ranges.into_violation(rule, ViolationKind::RangeViolation),
    ]
    .into_iter()
    .flatten()
    .collect()
}
