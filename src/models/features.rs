//! Feature Layout - Centralized Feature Definition
//!
//! **This file controls the model input schema**
//!
//! ## Rules:
//! 1. Order MUST match the column order the ensemble was trained on
//! 2. Every feature MUST belong to exactly one value group
//! 3. Changing either requires a retrained model

use serde::{Deserialize, Serialize};

// ============================================================================
// VALUE GROUPS
// ============================================================================

/// Upper bound for ratios that are non-negative but otherwise unbounded
pub const UNBOUNDED_RATIO_MAX: f64 = 1e10;

/// Declared numeric range of an input feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureGroup {
    /// Ratio in `[0, 1]`
    Ratio,
    /// Non-negative ratio in `[0, 1e10]`
    UnboundedRatio,
}

impl FeatureGroup {
    /// Inclusive `(min, max)` bounds of this group
    pub fn bounds(&self) -> (f64, f64) {
        match self {
            FeatureGroup::Ratio => (0.0, 1.0),
            FeatureGroup::UnboundedRatio => (0.0, UNBOUNDED_RATIO_MAX),
        }
    }
}

// ============================================================================
// FEATURE LAYOUT (Authoritative source)
// ============================================================================

/// Feature names with their value group, in model column order
pub const FEATURE_LAYOUT: &[(&str, FeatureGroup)] = &[
    ("Quick Ratio", FeatureGroup::UnboundedRatio),                                   // 0
    ("Fixed Assets to Assets", FeatureGroup::UnboundedRatio),                        // 1
    ("Interest-bearing debt interest rate", FeatureGroup::UnboundedRatio),           // 2
    ("Total debt/Total net worth", FeatureGroup::UnboundedRatio),                    // 3
    ("Borrowing dependency", FeatureGroup::Ratio),                                   // 4
    ("ROA(C) before interest and depreciation before interest", FeatureGroup::Ratio), // 5
    ("Continuous Net Profit Growth Rate", FeatureGroup::Ratio),                      // 6
    ("Research and development expense rate", FeatureGroup::UnboundedRatio),         // 7
    ("Allocation rate per person", FeatureGroup::UnboundedRatio),                    // 8
    ("Revenue per person", FeatureGroup::UnboundedRatio),                            // 9
    ("Cash/Current Liability", FeatureGroup::UnboundedRatio),                        // 10
    ("Accounts Receivable Turnover", FeatureGroup::UnboundedRatio),                  // 11
    ("Quick Assets/Total Assets", FeatureGroup::UnboundedRatio),                     // 12
    ("Total income/Total expense", FeatureGroup::UnboundedRatio),                    // 13
    ("Net Value Per Share (B)", FeatureGroup::UnboundedRatio),                       // 14
    ("Cash Flow to Equity", FeatureGroup::UnboundedRatio),                           // 15
    ("Non-industry income and expenditure/revenue", FeatureGroup::UnboundedRatio),   // 16
    ("After-tax Net Profit Growth Rate", FeatureGroup::UnboundedRatio),              // 17
    ("Inventory Turnover Rate (times)", FeatureGroup::UnboundedRatio),               // 18
    ("Total expense/Assets", FeatureGroup::UnboundedRatio),                          // 19
    ("Net Value Growth Rate", FeatureGroup::UnboundedRatio),                         // 20
    ("Operating Expense Rate", FeatureGroup::UnboundedRatio),                        // 21
    ("Total Asset Growth Rate", FeatureGroup::UnboundedRatio),                       // 22
    ("Cash Turnover Rate", FeatureGroup::UnboundedRatio),                            // 23
    ("Current Liabilities/Liability", FeatureGroup::Ratio),                          // 24
    ("Interest Expense Ratio", FeatureGroup::Ratio),                                 // 25
    ("Operating Profit Growth Rate", FeatureGroup::Ratio),                           // 26
    ("Long-term fund suitability ratio (A)", FeatureGroup::Ratio),                   // 27
    ("Cash Flow Per Share", FeatureGroup::Ratio),                                    // 28
    ("Average Collection Days", FeatureGroup::UnboundedRatio),                       // 29
];

/// Total number of features
/// IMPORTANT: Must match FEATURE_LAYOUT.len()!
pub const FEATURE_COUNT: usize = 30;

/// Get feature index by name
pub fn feature_index(name: &str) -> Option<usize> {
    FEATURE_LAYOUT.iter().position(|(n, _)| *n == name)
}

/// All feature names in layout order
pub fn feature_names() -> impl Iterator<Item = &'static str> {
    FEATURE_LAYOUT.iter().map(|(name, _)| *name)
}

/// Check a model's declared feature names against the layout
pub fn matches_layout(names: &[String]) -> bool {
    names.len() == FEATURE_COUNT
        && names.iter().zip(feature_names()).all(|(a, b)| a == b)
}

// ============================================================================
// FEATURE VECTOR
// ============================================================================

/// One validated row of model input, in layout order
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    /// Wrap values that already passed input validation
    pub(crate) fn from_validated(values: [f64; FEATURE_COUNT]) -> Self {
        Self { values }
    }

    /// Vector with every feature set to the same value
    #[cfg(test)]
    pub fn filled(value: f64) -> Self {
        Self { values: [value; FEATURE_COUNT] }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }
}
