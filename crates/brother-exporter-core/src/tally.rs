//! Error code aggregation.
//!
//! The device reports a fixed number of error slots, each a code string with
//! a paired count. The tally keeps the latest count per distinct code: when a
//! code appears in two slots of the same snapshot, the later slot wins.

use std::collections::HashMap;

use crate::labels::LabelSet;
use crate::parser::TypedRow;
use crate::schema::Schema;

/// Error code → latest count for one snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorTally {
    counts: HashMap<String, f64>,
}

impl ErrorTally {
    /// Scans every error slot of the schema once.
    ///
    /// Empty codes are kept as a key unless `skip_empty` is set.
    pub fn from_row(schema: &Schema, raw: &[String], typed: &TypedRow, skip_empty: bool) -> Self {
        let mut counts = HashMap::new();
        for (code_pos, count_pos) in schema.error_pairs() {
            let code = raw.get(code_pos).map(String::as_str).unwrap_or_default();
            if skip_empty && code.is_empty() {
                continue;
            }
            counts.insert(code.to_string(), typed.get(count_pos));
        }
        Self { counts }
    }

    pub fn get(&self, code: &str) -> Option<f64> {
        self.counts.get(code).copied()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// One sample per distinct code; order is unspecified.
    pub fn samples<'a>(&'a self, metric: &'a str, labels: &'a LabelSet) -> Vec<ErrorSample<'a>> {
        self.counts
            .iter()
            .map(|(code, value)| ErrorSample {
                name: metric,
                labels,
                code,
                value: *value,
            })
            .collect()
    }
}

/// Count for one error code, labeled with the identity set plus the code.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorSample<'a> {
    pub name: &'a str,
    pub labels: &'a LabelSet,
    pub code: &'a str,
    pub value: f64,
}
