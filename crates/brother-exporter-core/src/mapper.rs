//! Gauge samples from the typed row.

use crate::labels::LabelSet;
use crate::parser::TypedRow;
use crate::schema::Schema;

/// One labeled point-in-time reading.
#[derive(Debug, Clone, PartialEq)]
pub struct GaugeSample<'a> {
    pub name: &'a str,
    /// Source column of the value.
    pub position: usize,
    pub labels: &'a LabelSet,
    pub value: f64,
}

/// Emits one sample per gauge entry, in schema declaration order.
///
/// No gauge is ever skipped: a coerced `0.0` is emitted like any reading.
pub fn map_gauges<'a>(
    schema: &'a Schema,
    row: &TypedRow,
    labels: &'a LabelSet,
) -> Vec<GaugeSample<'a>> {
    schema
        .gauges()
        .map(|entry| GaugeSample {
            name: &entry.name,
            position: entry.position,
            labels,
            value: row.get(entry.position),
        })
        .collect()
}
