//! Schema Module - Rule-based table validation
//!
//! Used twice per request: on the input table before inference and on
//! the model output before it is returned.

pub mod rules;
pub mod validator;


pub use rules::{
    input_rule_set, output_rule_set, RuleSet, RuleSetError, PREDICTIONS_FIELD, PROBABILITIES_FIELD,
};
pub use validator::{primary_kind, validate, Violation, ViolationKind};
