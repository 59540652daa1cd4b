//! Field rules and rule sets
//!
//! Rule sets are declared statically and checked once when built. A field
//! that was never assigned a value domain cannot make it into a `RuleSet`.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::models::{FeatureGroup, FEATURE_LAYOUT};

pub const PREDICTIONS_FIELD: &str = "predictions";
pub const PROBABILITIES_FIELD: &str = "probabilities";

// ============================================================================
// DOMAINS
// ============================================================================

/// Allowed values of a numeric field
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Domain {
    /// Inclusive range
    Between { min: f64, max: f64 },
    /// Finite value set
    OneOf { values: Vec<f64> },
}

impl Domain {
    pub fn between(min: f64, max: f64) -> Self {
        Domain::Between { min, max }
    }

    pub fn one_of(values: &[f64]) -> Self {
        Domain::OneOf { values: values.to_vec() }
    }

    pub fn contains(&self, value: f64) -> bool {
        match self {
            Domain::Between { min, max } => value >= *min && value <= *max,
            Domain::OneOf { values } => values.iter().any(|v| *v == value),
        }
    }
}

impl From<FeatureGroup> for Domain {
    fn from(group: FeatureGroup) -> Self {
        let (min, max) = group.bounds();
        Domain::between(min, max)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Between { min, max } => write!(f, "[{}, {}]", min, max),
            Domain::OneOf { values } => {
                let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}

// ============================================================================
// RULES
// ============================================================================

/// Validation rule for one float column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldRule {
    pub name: String,
    pub required: bool,
    pub domain: Domain,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuleSetError {
    #[error("rule set '{0}' has no rules")]
    Empty(String),
    #[error("duplicate rule for field '{0}'")]
    DuplicateField(String),
    #[error("field '{0}' is not assigned to a value domain")]
    UnassignedField(String),
    #[error("field '{field}' has invalid bounds [{min}, {max}]")]
    InvalidBounds { field: String, min: f64, max: f64 },
    #[error("field '{0}' has an empty value set")]
    EmptyValueSet(String),
}

/// Named, immutable collection of field rules
#[derive(Debug, Clone, Serialize)]
pub struct RuleSet {
    name: String,
    rules: Vec<FieldRule>,
}

impl RuleSet {
    pub fn builder(name: impl Into<String>) -> RuleSetBuilder {
        RuleSetBuilder {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    /// Rules in declaration order
    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }

    #[cfg(test)]
    pub fn get(&self, field: &str) -> Option<&FieldRule> {
        self.rules.iter().find(|r| r.name == field)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.rules.len()
    }
}

struct RuleEntry {
    name: String,
    required: bool,
    domain: Option<Domain>,
}

pub struct RuleSetBuilder {
    name: String,
    entries: Vec<RuleEntry>,
}

impl RuleSetBuilder {
    /// Declare a required field
    pub fn required(mut self, name: impl Into<String>, domain: Option<Domain>) -> Self {
        self.entries.push(RuleEntry { name: name.into(), required: true, domain });
        self
    }

    /// Declare a field that may be absent or null
    pub fn optional(mut self, name: impl Into<String>, domain: Option<Domain>) -> Self {
        self.entries.push(RuleEntry { name: name.into(), required: false, domain });
        self
    }

    pub fn build(self) -> Result<RuleSet, RuleSetError> {
        if self.entries.is_empty() {
            return Err(RuleSetError::Empty(self.name));
        }

        let mut seen = HashSet::new();
        let mut rules = Vec::with_capacity(self.entries.len());

        for entry in self.entries {
            if !seen.insert(entry.name.clone()) {
                return Err(RuleSetError::DuplicateField(entry.name));
            }

            let domain = entry
                .domain
                .ok_or_else(|| RuleSetError::UnassignedField(entry.name.clone()))?;

            match &domain {
                Domain::Between { min, max } if !(min.is_finite() && max.is_finite() && min <= max) => {
                    return Err(RuleSetError::InvalidBounds {
                        field: entry.name,
                        min: *min,
                        max: *max,
                    });
                }
                Domain::OneOf { values } if values.is_empty() => {
                    return Err(RuleSetError::EmptyValueSet(entry.name));
                }
                _ => {}
            }

            rules.push(FieldRule {
                name: entry.name,
                required: entry.required,
                domain,
            });
        }

        Ok(RuleSet { name: self.name, rules })
    }
}

// ============================================================================
// CONCRETE RULE SETS
// ============================================================================

/// Every model feature: required, float, bounded by its group
pub fn input_rule_set() -> Result<RuleSet, RuleSetError> {
    FEATURE_LAYOUT
        .iter()
        .fold(RuleSet::builder("input"), |builder, (name, group)| {
            builder.required(*name, Some(Domain::from(*group)))
        })
        .build()
}

/// Labels in {0, 1}, probabilities in [0, 1]
pub fn output_rule_set() -> Result<RuleSet, RuleSetError> {
    RuleSet::builder("output")
        .required(PREDICTIONS_FIELD, Some(Domain::one_of(&[0.0, 1.0])))
        .required(PROBABILITIES_FIELD, Some(Domain::between(0.0, 1.0)))
        .build()
}
