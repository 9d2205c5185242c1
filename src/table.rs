//! Raw delimited tables as read from disk.
//!
//! Cells stay as trimmed strings; typed records are built from a [`Table`]
//! in `models`, so a reload of the same file compares equal cell for cell.

use std::path::Path;

use crate::error::DashboardError;

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn from_path(name: &str, path: &Path) -> Result<Self, DashboardError> {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_path(path)
            .map_err(|source| DashboardError::Csv {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_reader(name, reader).map_err(|source| DashboardError::Csv {
            path: path.to_path_buf(),
            source,
        })
    }

    #[cfg(test)]
    pub fn from_csv_str(name: &str, raw: &str) -> Result<Self, csv::Error> {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(raw.as_bytes());
        Self::from_reader(name, reader)
    }

    fn from_reader<R: std::io::Read>(
        name: &str,
        mut reader: csv::Reader<R>,
    ) -> Result<Self, csv::Error> {
        let headers = reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect::<Vec<_>>();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            row.resize(headers.len(), String::new());
            rows.push(row);
        }

        Ok(Self {
            name: name.to_string(),
            headers,
            rows,
        })
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == column)
    }

    pub fn require_column(&self, column: &str) -> Result<usize, DashboardError> {
        self.column_index(column)
            .ok_or_else(|| DashboardError::MissingColumn {
                dataset: self.name.clone(),
                column: column.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

/// Coercing numeric parse: plain float first, then with currency symbols and
/// thousands separators stripped. Anything else counts as missing.
pub fn parse_number(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(value) = raw.parse::<f64>() {
        return (!value.is_nan()).then_some(value);
    }
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    cleaned.parse::<f64>().ok().filter(|value| !value.is_nan())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_headers_and_pads_short_rows() {
        let table = Table::from_csv_str("t", "a,b,c\n1,2,3\n4,5\n").unwrap();
        assert_eq!(table.headers, vec!["a", "b", "c"]);
        assert_eq!(table.rows[1], vec!["4", "5", ""]);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn strips_byte_order_mark_from_first_header() {
        let table = Table::from_csv_str("t", "\u{feff}metric,value\nx,1\n").unwrap();
        assert_eq!(table.column_index("metric"), Some(0));
    }

    #[test]
    fn missing_column_names_the_dataset() {
        let table = Table::from_csv_str("arpu_monthly", "month\n2023-01\n").unwrap();
        let err = table.require_column("arpu").unwrap_err();
        assert_eq!(
            err.to_string(),
            "dataset 'arpu_monthly' has no column 'arpu'"
        );
    }

    #[test]
    fn numbers_parse_leniently() {
        assert_eq!(parse_number("0.15"), Some(0.15));
        assert_eq!(parse_number("1.2e-05"), Some(1.2e-05));
        assert_eq!(parse_number("₩10,900"), Some(10900.0));
        assert_eq!(parse_number(" -3 "), Some(-3.0));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("n/a"), None);
    }
}
