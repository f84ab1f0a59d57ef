use crate::error::{ForecastError, Result};
use crate::utils::is_total_marker;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    /// Period identifiers that are whole numbers (e.g. a year)
    Integer(i64),
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Integer(v) => Some(*v as f64),
            CellValue::Number(v) => Some(*v),
            CellValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Integer(v) => write!(f, "{}", v),
            CellValue::Number(v) => write!(f, "{}", v),
            CellValue::Text(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    Csv,
    Markdown,
}

/// Rows of model output with a fixed, positional column layout.
///
/// Every row holds exactly `columns().len()` cells. The first
/// `identifier_columns()` cells name the period; an annual-total row carries
/// a total marker ("Totale"/"Total") in one of them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastTable {
    columns: Vec<String>,
    identifier_columns: usize,
    rows: Vec<Vec<CellValue>>,
}

/// Borrowed view of one table row, addressable by column name.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    columns: &'a [String],
    cells: &'a [CellValue],
}

impl<'a> Row<'a> {
    pub fn get(self, column: &str) -> Option<&'a CellValue> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|idx| self.cells.get(idx))
    }

    pub fn cells(self) -> &'a [CellValue] {
        self.cells
    }

    pub fn iter(self) -> impl Iterator<Item = (&'a str, &'a CellValue)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.cells.iter())
    }
}

/// One chart point: a period label and the value of a single column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub label: String,
    pub value: f64,
}

impl ForecastTable {
    pub fn new(
        columns: Vec<String>,
        identifier_columns: usize,
        rows: Vec<Vec<CellValue>>,
    ) -> Result<Self> {
        if columns.is_empty() {
            return Err(ForecastError::Validation(
                "A forecast table needs at least one column".to_string(),
            ));
        }
        if identifier_columns > columns.len() {
            return Err(ForecastError::Validation(format!(
                "{} identifier columns requested but the table only has {} columns",
                identifier_columns,
                columns.len()
            )));
        }

        let mut table = Self {
            columns,
            identifier_columns,
            rows: Vec::with_capacity(rows.len()),
        };
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    pub fn push_row(&mut self, row: Vec<CellValue>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(ForecastError::Validation(format!(
                "Row #{} has {} cells, expected {}",
                self.rows.len(),
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn identifier_columns(&self) -> usize {
        self.identifier_columns
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn row(&self, index: usize) -> Option<Row<'_>> {
        self.rows.get(index).map(|cells| Row {
            columns: &self.columns,
            cells,
        })
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = Row<'_>> + '_ {
        self.rows.iter().map(move |cells| Row {
            columns: &self.columns,
            cells,
        })
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&CellValue> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|cells| cells.get(idx))
    }

    pub fn is_total_row(&self, row: &[CellValue]) -> bool {
        row.iter()
            .take(self.identifier_columns)
            .filter_map(CellValue::as_text)
            .any(is_total_marker)
    }

    /// Rows that are not annual totals.
    pub fn period_rows(&self) -> impl Iterator<Item = Row<'_>> + '_ {
        self.iter_rows().filter(move |row| !self.is_total_row(row.cells()))
    }

    /// Rows carrying an annual-total marker.
    pub fn total_rows(&self) -> impl Iterator<Item = Row<'_>> + '_ {
        self.iter_rows().filter(move |row| self.is_total_row(row.cells()))
    }

    /// Chart series for `column`, skipping annual totals. Labels read
    /// "Mese Anno" (identifier cells in reverse order).
    pub fn series(&self, column: &str) -> Option<Vec<SeriesPoint>> {
        let idx = self.column_index(column)?;
        let points = self
            .period_rows()
            .filter_map(|row| {
                let value = row.cells().get(idx)?.as_f64()?;
                let label = row.cells()[..self.identifier_columns]
                    .iter()
                    .rev()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" ");
                Some(SeriesPoint { label, value })
            })
            .collect();
        Some(points)
    }

    /// Sum of `column` over non-total rows.
    pub fn column_total(&self, column: &str) -> Option<f64> {
        let idx = self.column_index(column)?;
        Some(
            self.period_rows()
                .filter_map(|row| row.cells().get(idx).and_then(CellValue::as_f64))
                .sum(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastResponse {
    pub table: ForecastTable,
    /// Free text the model appended after the table.
    pub explanation: Option<String>,
    pub format: TableFormat,
    /// Rows discarded for a wrong field count or an uncoercible cell.
    pub dropped_rows: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ForecastTable {
        ForecastTable::new(
            vec!["Anno".into(), "Mese".into(), "Ricavi".into()],
            2,
            vec![
                vec![
                    CellValue::Integer(2024),
                    CellValue::Text("Gennaio".into()),
                    CellValue::Number(1000.0),
                ],
                vec![
                    CellValue::Integer(2024),
                    CellValue::Text("Febbraio".into()),
                    CellValue::Number(1100.0),
                ],
                vec![
                    CellValue::Integer(2024),
                    CellValue::Text("Totale".into()),
                    CellValue::Number(2100.0),
                ],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_ragged_rows() {
        let mut table = sample();
        let err = table.push_row(vec![CellValue::Integer(2024)]).unwrap_err();
        assert!(matches!(err, ForecastError::Validation(_)));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_row_lookup_by_name() {
        let table = sample();
        let row = table.row(1).unwrap();
        assert_eq!(row.get("Mese"), Some(&CellValue::Text("Febbraio".into())));
        assert_eq!(row.get("Ricavi").and_then(CellValue::as_f64), Some(1100.0));
        assert_eq!(row.get("Missing"), None);
        assert_eq!(table.get(0, "Anno"), Some(&CellValue::Integer(2024)));
    }

    #[test]
    fn test_total_rows_are_separated() {
        let table = sample();
        assert_eq!(table.period_rows().count(), 2);
        assert_eq!(table.total_rows().count(), 1);
        assert_eq!(table.column_total("Ricavi"), Some(2100.0));
    }

    #[test]
    fn test_series_labels() {
        let series = sample().series("Ricavi").unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].label, "Gennaio 2024");
        assert_eq!(series[1].value, 1100.0);
        assert!(sample().series("Costi").is_none());
    }
}
