//! Column layout of the device snapshot.
//!
//! The snapshot is a fixed-position CSV row. A [`Schema`] maps each position
//! to its meaning: an identity label, a numeric gauge, or one half of an
//! error-code/error-count pair. The schema is built once at startup, validated,
//! and then shared read-only by every scrape.

use std::collections::HashSet;

/// Label names of the built-in Brother layout, in column order (positions 0..8).
pub const BROTHER_LABELS: [&str; 8] = [
    "nodeName",
    "modelName",
    "location",
    "contact",
    "ipAddress",
    "serialNumber",
    "mainFirmwareVersion",
    "sub1FirmwareVersion",
];

/// Gauge names of the built-in Brother layout, in column order starting at position 8.
pub const BROTHER_GAUGES: [&str; 33] = [
    "brother_memory_size",
    "brother_page_counter",
    "brother_average_coverage",
    "brother_drum_unit_percent_life_remaining",
    "brother_toner_percent_life_remaining",
    "brother_page_counter_a4_letter",
    "brother_page_counter_legal_folio",
    "brother_page_counter_b5_executive",
    "brother_page_counter_envelopes",
    "brother_page_counter_a5",
    "brother_others_01",
    "brother_page_counter_plain_thin_recycled",
    "brother_page_counter_thick_thicker_bond",
    "brother_page_counter_envelopes_env_thic_env_thin",
    "brother_page_counter_label",
    "brother_page_counter_hagaki",
    "brother_page_counter_total",
    "brother_page_counter_total_two_sided",
    "brother_copies",
    "brother_copies_two_sided",
    "brother_prints",
    "brother_prints_two_sided",
    "brother_others_02",
    "brother_others_two_sided",
    "brother_scan",
    "brother_scan_page_counter",
    "brother_toner_replacements",
    "brother_drum_replacements",
    "brother_paper_jams",
    "brother_paper_jam_tray_1",
    "brother_paper_jam_inside",
    "brother_paper_jam_rear",
    "brother_paper_jam_two_sided",
];

const BROTHER_GAUGE_START: usize = 8;
const BROTHER_ERROR_CODE_START: usize = 41;
const BROTHER_ERROR_SLOTS: usize = 10;
const BROTHER_ERROR_COUNT_OFFSET: usize = 10;

/// Name of the error metric in the built-in layout.
pub const BROTHER_ERROR_METRIC: &str = "brother_error_count";

/// Extra label carrying the error code on error samples.
pub const BROTHER_ERROR_LABEL: &str = "error_message";

/// Error type for schema construction failures.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaError {
    pub message: String,
}

impl SchemaError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Schema error: {}", self.message)
    }
}

impl std::error::Error for SchemaError {}

/// What a column holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Identity string attached to every sample.
    Label,
    /// Numeric reading exported as a gauge.
    Gauge,
    /// Error code string; paired with an `ErrorCount` column.
    ErrorCode,
    /// Count for the error code at `position - offset`.
    ErrorCount,
}

/// One column of the layout.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaEntry {
    pub position: usize,
    pub kind: FieldKind,
    pub name: String,
}

/// Validated, immutable column layout.
#[derive(Debug, Clone)]
pub struct Schema {
    entries: Vec<SchemaEntry>,
    label_count: usize,
    error_metric: String,
    error_label: String,
    error_offset: usize,
    width: usize,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// The layout of a Brother printer's `mnt_info.csv`.
    ///
    /// Columns 0–7 are labels, 8–40 gauges, 41–50 error codes and 51–60 the
    /// matching error counts.
    pub fn brother() -> Result<Self, SchemaError> {
        let mut builder = Self::builder().labels(&BROTHER_LABELS);
        for (i, name) in BROTHER_GAUGES.iter().enumerate() {
            builder = builder.gauge(BROTHER_GAUGE_START + i, *name);
        }
        for i in 0..BROTHER_ERROR_SLOTS {
            let code = BROTHER_ERROR_CODE_START + i;
            builder = builder.error_pair(code, code + BROTHER_ERROR_COUNT_OFFSET);
        }
        builder
            .error_metric(BROTHER_ERROR_METRIC, BROTHER_ERROR_LABEL)
            .build()
    }

    /// All entries in declaration order.
    pub fn entries(&self) -> &[SchemaEntry] {
        &self.entries
    }

    /// Gauge entries in declaration order.
    pub fn gauges(&self) -> impl Iterator<Item = &SchemaEntry> {
        self.entries.iter().filter(|e| e.kind == FieldKind::Gauge)
    }

    /// Label names in column order.
    pub fn label_names(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|e| e.kind == FieldKind::Label)
            .map(|e| e.name.as_str())
    }

    /// Number of label columns (they occupy positions `0..label_count`).
    pub fn label_count(&self) -> usize {
        self.label_count
    }

    /// `(code_position, count_position)` for every error slot, in declaration order.
    pub fn error_pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.entries
            .iter()
            .filter(|e| e.kind == FieldKind::ErrorCode)
            .map(|e| (e.position, e.position + self.error_offset))
    }

    pub fn error_metric(&self) -> &str {
        &self.error_metric
    }

    pub fn error_label(&self) -> &str {
        &self.error_label
    }

    /// Minimum number of cells a data row must have.
    pub fn width(&self) -> usize {
        self.width
    }
}

/// Incremental [`Schema`] construction; all invariants are checked in [`SchemaBuilder::build`].
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    labels: Vec<String>,
    gauges: Vec<(usize, String)>,
    error_pairs: Vec<(usize, usize)>,
    error_metric: Option<(String, String)>,
}

impl SchemaBuilder {
    /// Label columns, occupying positions `0..names.len()`.
    pub fn labels(mut self, names: &[&str]) -> Self {
        self.labels = names.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn gauge(mut self, position: usize, name: impl Into<String>) -> Self {
        self.gauges.push((position, name.into()));
        self
    }

    pub fn error_pair(mut self, code_position: usize, count_position: usize) -> Self {
        self.error_pairs.push((code_position, count_position));
        self
    }

    pub fn error_metric(mut self, metric: impl Into<String>, label: impl Into<String>) -> Self {
        self.error_metric = Some((metric.into(), label.into()));
        self
    }

    pub fn build(self) -> Result<Schema, SchemaError> {
        let mut entries = Vec::new();
        let mut positions = HashSet::new();
        let mut claim = |position: usize| -> Result<(), SchemaError> {
            if positions.insert(position) {
                Ok(())
            } else {
                Err(SchemaError::new(format!("position {position} used twice")))
            }
        };

        let mut label_names = HashSet::new();
        for (position, name) in self.labels.iter().enumerate() {
            if !is_valid_label_name(name) {
                return Err(SchemaError::new(format!("invalid label name {name:?}")));
            }
            if !label_names.insert(name.as_str()) {
                return Err(SchemaError::new(format!("label {name:?} declared twice")));
            }
            claim(position)?;
            entries.push(SchemaEntry {
                position,
                kind: FieldKind::Label,
                name: name.clone(),
            });
        }

        let mut gauge_names = HashSet::new();
        for (position, name) in &self.gauges {
            if !is_valid_metric_name(name) {
                return Err(SchemaError::new(format!("invalid metric name {name:?}")));
            }
            if !gauge_names.insert(name.as_str()) {
                return Err(SchemaError::new(format!("gauge {name:?} declared twice")));
            }
            claim(*position)?;
            entries.push(SchemaEntry {
                position: *position,
                kind: FieldKind::Gauge,
                name: name.clone(),
            });
        }

        let mut error_offset = 0;
        if let Some(&(first_code, first_count)) = self.error_pairs.first() {
            if first_count <= first_code {
                return Err(SchemaError::new(format!(
                    "error count position {first_count} must follow code position {first_code}"
                )));
            }
            error_offset = first_count - first_code;
        }
        for (i, &(code, count)) in self.error_pairs.iter().enumerate() {
            if count != code + error_offset {
                return Err(SchemaError::new(format!(
                    "error pair ({code}, {count}) breaks the fixed offset {error_offset}"
                )));
            }
            claim(code)?;
            claim(count)?;
            entries.push(SchemaEntry {
                position: code,
                kind: FieldKind::ErrorCode,
                name: format!("error_code_{i}"),
            });
            entries.push(SchemaEntry {
                position: count,
                kind: FieldKind::ErrorCount,
                name: format!("error_count_{i}"),
            });
        }

        let (error_metric, error_label) = match self.error_metric {
            Some(pair) => pair,
            None if self.error_pairs.is_empty() => (String::new(), String::new()),
            None => {
                return Err(SchemaError::new(
                    "error pairs declared without an error metric",
                ));
            }
        };
        if !self.error_pairs.is_empty() {
            if !is_valid_metric_name(&error_metric) {
                return Err(SchemaError::new(format!(
                    "invalid metric name {error_metric:?}"
                )));
            }
            if gauge_names.contains(error_metric.as_str()) {
                return Err(SchemaError::new(format!(
                    "error metric {error_metric:?} collides with a gauge"
                )));
            }
            if !is_valid_label_name(&error_label) || label_names.contains(error_label.as_str()) {
                return Err(SchemaError::new(format!(
                    "invalid error label {error_label:?}"
                )));
            }
        }

        let width = entries.iter().map(|e| e.position + 1).max().unwrap_or(0);

        Ok(Schema {
            entries,
            label_count: self.labels.len(),
            error_metric,
            error_label,
            error_offset,
            width,
        })
    }
}

fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    !name.starts_with("__") && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
