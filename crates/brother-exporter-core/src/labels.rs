//! Identity labels shared by every sample of a scrape.

use crate::scrape::ScrapeError;

/// The identity label values of one scrape, in schema label order.
///
/// Built once per scrape and borrowed by every sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    values: Vec<String>,
}

impl LabelSet {
    /// Takes the first `count` cells of the raw row verbatim.
    pub fn from_row(row: &[String], count: usize) -> Result<Self, ScrapeError> {
        let values = row.get(..count).ok_or(ScrapeError::Shape {
            required: count,
            found: row.len(),
        })?;
        Ok(Self {
            values: values.to_vec(),
        })
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Label values followed by one extra value, for error samples.
    pub fn extended<'a>(&'a self, extra: &'a str) -> Vec<&'a str> {
        self.values
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(extra))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_from_row_takes_prefix_verbatim() {
        let row = row(&["n", "m", " l ", "c", "a", "s", "f1", "f2", "123", "x"]);
        let labels = LabelSet::from_row(&row, 8).unwrap();

        assert_eq!(labels.values(), &row[..8]);
        assert_eq!(labels.values()[2], " l ");
    }

    #[test]
    fn test_from_row_too_short() {
        let err = LabelSet::from_row(&row(&["n", "m"]), 8).unwrap_err();
        assert_eq!(
            err,
            ScrapeError::Shape {
                required: 8,
                found: 2
            }
        );
    }

    #[test]
    fn test_extended() {
        let labels = LabelSet::from_row(&row(&["a", "b"]), 2).unwrap();
        assert_eq!(labels.extended("E1"), vec!["a", "b", "E1"]);
    }
}
