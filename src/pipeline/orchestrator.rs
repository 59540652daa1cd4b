//! Per-request inference flow
//!
//! ```text
//! Received -> Parsed -> InputValidated -> Inferred -> OutputValidated -> Completed
//!     |          |             |              |
//!     +----------+-------------+--------------+----> Rejected(stage, reason)
//! ```
//!
//! The model is never called on a table that failed input validation, and
//! nothing is returned to the caller before output validation passes.

use std::time::Instant;

use serde_json::{Map, Value};
use uuid::Uuid;

use super::context::ModelContext;
use super::model::InferenceError;
use super::parse::{parse_csv, parse_json_rows, ParseError, DEFAULT_MAX_ROWS};
use crate::explain::explain;
use crate::models::{
    Attribution, Cell, FeatureVector, Prediction, PredictionBatch, Table, FEATURE_COUNT,
    FEATURE_LAYOUT,
};
use crate::schema::{
    primary_kind, validate, Violation, ViolationKind, PREDICTIONS_FIELD, PROBABILITIES_FIELD,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Parsed,
    InputValidated,
    Inferred,
    OutputValidated,
    Completed,
}

/// Why a request stopped before completion
#[derive(Debug, thiserror::Error)]
pub enum Rejection {
    #[error("{0}")]
    Parse(#[from] ParseError),
    #[error("input failed validation with {} violation(s)", .0.len())]
    InputValidation(Vec<Violation>),
    #[error("inference failed: {0}")]
    Inference(#[from] InferenceError),
    #[error("model output failed validation with {} violation(s)", .0.len())]
    OutputValidation(Vec<Violation>),
}

impl Rejection {
    /// Client faults are reported back in full; the rest stay server side
    pub fn is_client_fault(&self) -> bool {
        matches!(self, Rejection::Parse(_) | Rejection::InputValidation(_))
    }

    pub fn code(&self) -> &'static str {
        match self {
            Rejection::Parse(_) => "PARSE_ERROR",
            Rejection::InputValidation(violations) => primary_kind(violations)
                .unwrap_or(ViolationKind::RangeViolation)
                .code(),
            Rejection::Inference(_) => "INTERNAL_ERROR",
            Rejection::OutputValidation(_) => "OUTPUT_VALIDATION_FAILURE",
        }
    }
}

/// Terminal failure, tagged with the stage that could not be reached
#[derive(Debug, thiserror::Error)]
#[error("rejected at {stage:?}: {reason}")]
pub struct Rejected {
    pub stage: Stage,
    pub reason: Rejection,
}

/// One request's walk through the stages
pub struct Pipeline<'a> {
    ctx: &'a ModelContext,
    request_id: Uuid,
    max_rows: usize,
    stage: Stage,
    started: Instant,
}

impl<'a> Pipeline<'a> {
    pub fn new(ctx: &'a ModelContext, request_id: Uuid) -> Self {
        Self {
            ctx,
            request_id,
            max_rows: DEFAULT_MAX_ROWS,
            stage: Stage::Received,
            started: Instant::now(),
        }
    }

    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    #[cfg(test)]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Run a CSV upload to completion
    pub fn run_csv(mut self, payload: &[u8]) -> Result<PredictionBatch, Rejected> {
        let table = parse_csv(payload, self.max_rows).map_err(|e| self.reject(Stage::Parsed, e.into()))?;
        self.advance(Stage::Parsed);
        self.run_table(table)
    }

    /// Run a batch of JSON rows to completion
    pub fn run_json(mut self, rows: &[Map<String, Value>]) -> Result<PredictionBatch, Rejected> {
        let table = parse_json_rows(rows, self.max_rows).map_err(|e| self.reject(Stage::Parsed, e.into()))?;
        self.advance(Stage::Parsed);
        self.run_table(table)
    }

    /// Continue from an already parsed table
    pub fn run_table(mut self, table: Table) -> Result<PredictionBatch, Rejected> {
        if self.stage == Stage::Received {
            self.advance(Stage::Parsed);
        }

        // Input gate
        let result = validate(&table, self.ctx.input_rules());
        if !result.success {
            return Err(self.reject(
                Stage::InputValidated,
                Rejection::InputValidation(result.into_violations()),
            ));
        }
        self.advance(Stage::InputValidated);

        // Inference + attribution
        let (predictions, attributions) = self
            .infer(&table)
            .map_err(|e| self.reject(Stage::Inferred, e.into()))?;
        self.advance(Stage::Inferred);

        // Output gate
        let output = output_table(&predictions);
        let result = validate(&output, self.ctx.output_rules());
        if !result.success {
            return Err(self.reject(
                Stage::OutputValidated,
                Rejection::OutputValidation(result.into_violations()),
            ));
        }
        self.advance(Stage::OutputValidated);

        let batch = PredictionBatch {
            predictions: predictions.iter().map(|p| p.label).collect(),
            probabilities: predictions.iter().map(|p| p.probability).collect(),
            margins: predictions.iter().map(|p| p.margin).collect(),
            attributions,
            base_value: self.ctx.baseline(),
        };
        self.advance(Stage::Completed);

        tracing::info!(
            request_id = %self.request_id,
            rows = batch.len(),
            elapsed_us = self.started.elapsed().as_micros() as u64,
            "Prediction completed"
        );
        Ok(batch)
    }

    fn infer(&self, table: &Table) -> Result<(Vec<Prediction>, Vec<Attribution>), InferenceError> {
        let rows = feature_vectors(table)?;
        let model = self.ctx.model();

        let predictions = model.predict(&rows)?;
        if predictions.len() != rows.len() {
            return Err(InferenceError::RowCountMismatch {
                expected: rows.len(),
                actual: predictions.len(),
            });
        }
        if let Some(row) = predictions.iter().position(|p| !p.margin.is_finite()) {
            return Err(InferenceError::NonFiniteMargin(row));
        }

        let attributions = rows
            .iter()
            .enumerate()
            .map(|(row, vector)| {
                explain(model.ensemble(), self.ctx.baseline(), vector)
                    .map_err(|source| InferenceError::Attribution { row, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok((predictions, attributions))
    }

    fn advance(&mut self, next: Stage) {
        tracing::debug!(request_id = %self.request_id, from = ?self.stage, to = ?next, "Stage transition");
        self.stage = next;
    }

    fn reject(&self, stage: Stage, reason: Rejection) -> Rejected {
        if reason.is_client_fault() {
            tracing::info!(request_id = %self.request_id, ?stage, code = reason.code(), "Request rejected: {}", reason);
        } else {
            tracing::error!(request_id = %self.request_id, ?stage, code = reason.code(), "Request failed: {:?}", reason);
        }
        Rejected { stage, reason }
    }
}

/// Pull validated rows out of the table in layout order
fn feature_vectors(table: &Table) -> Result<Vec<FeatureVector>, InferenceError> {
    let columns = FEATURE_LAYOUT
        .iter()
        .map(|(name, _)| {
            table.column_index(name).ok_or_else(|| InferenceError::InvalidRow {
                row: 0,
                detail: format!("column '{}' disappeared after validation", name),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    (0..table.row_count())
        .map(|row| -> Result<FeatureVector, InferenceError> {
            let mut values = [0.0; FEATURE_COUNT];
            for (slot, &col) in values.iter_mut().zip(&columns) {
                *slot = table
                    .cell(row, col)
                    .and_then(Cell::as_f64)
                    .ok_or_else(|| InferenceError::InvalidRow {
                        row,
                        detail: format!("'{}' is not numeric", table.columns()[col]),
                    })?;
            }
            Ok(FeatureVector::from_validated(values))
        })
        .collect()
}

fn output_table(predictions: &[Prediction]) -> Table {
    Table::from_columns(vec![
        (
            PREDICTIONS_FIELD.to_string(),
            predictions.iter().map(|p| Cell::Number(f64::from(p.label))).collect(),
        ),
        (
            PROBABILITIES_FIELD.to_string(),
            predictions.iter().map(|p| Cell::Number(p.probability)).collect(),
        ),
    ])
}
