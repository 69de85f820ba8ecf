//! Decoding of the CSV snapshot into rows.
//!
//! These are pure functions over the response body, easily testable with
//! string inputs. The decoder follows RFC 4180: comma separated, `"`-quoted
//! fields with `""` escapes, quoted fields may span lines. Blank lines are
//! skipped. The header fixes the field count: every later record must match it.

use crate::scrape::ScrapeError;

/// Error type for CSV decoding failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    /// 1-based line of the offending input.
    pub line: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(line: usize, msg: impl Into<String>) -> Self {
        Self {
            line,
            message: msg.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "parse error on line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ParseError {}

/// One decoded record, cells verbatim.
pub type RawRow = Vec<String>;

/// Decodes a CSV body into records.
pub fn parse_records(content: &str) -> Result<Vec<RawRow>, ParseError> {
    let mut records = Vec::new();
    let mut record: RawRow = Vec::new();
    let mut field = String::new();
    let mut chars = content.chars().peekable();
    let mut line = 1;
    let mut record_line = 1;
    // True once the current record has any content, so blank lines can be skipped.
    let mut in_record = false;

    while let Some(c) = chars.next() {
        if !in_record {
            record_line = line;
        }
        match c {
            '"' if field.is_empty() => {
                in_record = true;
                let quote_line = line;
                loop {
                    match chars.next() {
                        Some('"') if chars.peek() == Some(&'"') => {
                            chars.next();
                            field.push('"');
                        }
                        Some('"') => break,
                        Some(c) => {
                            if c == '\n' {
                                line += 1;
                            }
                            field.push(c);
                        }
                        None => {
                            return Err(ParseError::new(
                                quote_line,
                                "unterminated quoted field",
                            ));
                        }
                    }
                }
                match chars.peek() {
                    None | Some(',') | Some('\n') | Some('\r') => {}
                    Some(c) => {
                        return Err(ParseError::new(
                            line,
                            format!("unexpected {c:?} after closing quote"),
                        ));
                    }
                }
            }
            '"' => {
                return Err(ParseError::new(line, "bare '\"' in unquoted field"));
            }
            ',' => {
                in_record = true;
                record.push(std::mem::take(&mut field));
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                if in_record {
                    record.push(std::mem::take(&mut field));
                    push_record(&mut records, std::mem::take(&mut record), record_line)?;
                }
                in_record = false;
                line += 1;
            }
            c => {
                in_record = true;
                field.push(c);
            }
        }
    }

    if in_record {
        record.push(field);
        push_record(&mut records, record, record_line)?;
    }

    Ok(records)
}

fn push_record(records: &mut Vec<RawRow>, record: RawRow, line: usize) -> Result<(), ParseError> {
    if let Some(header) = records.first() {
        if record.len() != header.len() {
            return Err(ParseError::new(
                line,
                format!(
                    "wrong number of fields: expected {}, found {}",
                    header.len(),
                    record.len()
                ),
            ));
        }
    }
    records.push(record);
    Ok(())
}

/// Returns the data row: record 1, after the header.
pub fn data_row(mut records: Vec<RawRow>) -> Result<RawRow, ScrapeError> {
    if records.len() < 2 {
        return Err(ScrapeError::NoData {
            rows: records.len(),
        });
    }
    Ok(records.swap_remove(1))
}

/// Numeric view of a row.
///
/// Every cell is parsed as `f64`; cells that are not numbers (labels, error
/// codes, blanks) read as `0.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedRow {
    values: Vec<f64>,
}

impl TypedRow {
    pub fn from_raw(row: &[String]) -> Self {
        Self {
            values: row.iter().map(|cell| coerce(cell)).collect(),
        }
    }

    /// Value at `position`, `0.0` when out of range.
    pub fn get(&self, position: usize) -> f64 {
        self.values.get(position).copied().unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn coerce(cell: &str) -> f64 {
    cell.parse().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_records_plain() {
        let content = "\
node,model,pages
printer-1,HL-L2350DW,1234
";
        let records = parse_records(content).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0], vec!["node", "model", "pages"]);
        assert_eq!(records[1], vec!["printer-1", "HL-L2350DW", "1234"]);
    }

    #[test]
    fn test_parse_records_quoted() {
        let content = "a,b,c\r\n\"Floor 2, Room \"\"B\"\"\",\"line\nbreak\",\r\n";
        let records = parse_records(content).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[1][0], "Floor 2, Room \"B\"");
        assert_eq!(records[1][1], "line\nbreak");
        assert_eq!(records[1][2], "");
    }

    #[test]
    fn test_parse_records_skips_blank_lines() {
        let content = "\n\nh1,h2\n\nv1,v2";
        let records = parse_records(content).unwrap();

        assert_eq!(records, vec![vec!["h1", "h2"], vec!["v1", "v2"]]);
    }

    #[test]
    fn test_parse_records_field_count_follows_header() {
        let err = parse_records("h1,h2\n\nv1,v2,v3\n").unwrap_err();
        assert_eq!(err.line, 3);
        assert!(err.message.contains("expected 2, found 3"));

        let err = parse_records("h1,h2,h3\nv1,v2").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("expected 3, found 2"));
    }

    #[test]
    fn test_parse_records_multiline_field_counts_once() {
        let records = parse_records("h1,h2\n\"a\nb\",c\n").unwrap();
        assert_eq!(records[1], vec!["a\nb", "c"]);
    }

    #[test]
    fn test_parse_records_unterminated_quote() {
        let err = parse_records("h1,h2\nv1,\"never closed\n").unwrap_err();

        assert_eq!(err.line, 2);
        assert!(err.message.contains("unterminated"));
    }

    #[test]
    fn test_parse_records_bare_quote() {
        let err = parse_records("h1\nab\"c\n").unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_parse_records_garbage_after_quote() {
        let err = parse_records("\"a\"b,c\n").unwrap_err();
        assert!(err.message.contains("after closing quote"));
    }

    #[test]
    fn test_data_row_header_only() {
        let records = parse_records("h1,h2\n").unwrap();
        let err = data_row(records).unwrap_err();

        assert_eq!(err, ScrapeError::NoData { rows: 1 });
        assert!(err.to_string().contains('1'));
    }

    #[test]
    fn test_data_row_takes_second_record() {
        let records = parse_records("h\nfirst\nsecond\n").unwrap();
        assert_eq!(data_row(records).unwrap(), vec!["first"]);
    }

    #[test]
    fn test_typed_row_coercion() {
        let row: Vec<String> = ["12", "3.5", "-1", "HL-L2350DW", "", "1e3"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let typed = TypedRow::from_raw(&row);

        assert_eq!(typed.len(), 6);
        assert_eq!(typed.get(0), 12.0);
        assert_eq!(typed.get(1), 3.5);
        assert_eq!(typed.get(2), -1.0);
        assert_eq!(typed.get(3), 0.0);
        assert_eq!(typed.get(4), 0.0);
        assert_eq!(typed.get(5), 1000.0);
        assert_eq!(typed.get(99), 0.0);
    }
}
