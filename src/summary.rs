use crate::error::{ForecastError, Result};
use crate::schema::SUMMARY_SCHEMA;
use crate::table::{CellValue, ForecastTable};
use crate::utils::month_from_name;
use log::{debug, info};
use std::collections::HashMap;

const YEAR: &str = "Anno";
const MONTH: &str = "Mese";
const SALES_TOTAL: &str = "Vendite_Totali";
const COST_TOTAL: &str = "Costi_Totali";

/// Join key for one row. Months compare by number when the cell names a
/// month, otherwise by lowercase text ("Totale" rows still line up).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PeriodKey {
    Month(String, u32),
    Label(String, String),
}

fn year_key(cell: &CellValue) -> String {
    match cell {
        CellValue::Number(v) if v.fract() == 0.0 => format!("{}", *v as i64),
        other => other.to_string().trim().to_string(),
    }
}

fn period_key(year: &CellValue, month: &CellValue) -> PeriodKey {
    let year = year_key(year);
    let month_text = month.to_string();
    match month_from_name(&month_text) {
        Some(m) => PeriodKey::Month(year, m),
        None => PeriodKey::Label(year, month_text.trim().to_lowercase()),
    }
}

fn require_column(table: &ForecastTable, column: &str, which: &str) -> Result<usize> {
    table.column_index(column).ok_or_else(|| {
        ForecastError::Parse(format!(
            "The {} forecast has no '{}' column",
            which, column
        ))
    })
}

/// Financial summary of a sales and a cost forecast: one row per period
/// present in both, in sales order, with `Profitto = Vendite_Totali -
/// Costi_Totali`.
pub fn summarize(sales: &ForecastTable, cost: &ForecastTable) -> Result<ForecastTable> {
    let s_year = require_column(sales, YEAR, "sales")?;
    let s_month = require_column(sales, MONTH, "sales")?;
    let s_total = require_column(sales, SALES_TOTAL, "sales")?;
    let c_year = require_column(cost, YEAR, "cost")?;
    let c_month = require_column(cost, MONTH, "cost")?;
    let c_total = require_column(cost, COST_TOTAL, "cost")?;

    let mut costs: HashMap<PeriodKey, f64> = HashMap::with_capacity(cost.len());
    for row in cost.rows() {
        if let Some(value) = row[c_total].as_f64() {
            // First occurrence wins on duplicated periods.
            costs
                .entry(period_key(&row[c_year], &row[c_month]))
                .or_insert(value);
        }
    }

    let mut rows = Vec::with_capacity(sales.len());
    for row in sales.rows() {
        let Some(revenue) = row[s_total].as_f64() else {
            continue;
        };
        let key = period_key(&row[s_year], &row[s_month]);
        match costs.get(&key) {
            Some(&expense) => rows.push(vec![
                row[s_year].clone(),
                row[s_month].clone(),
                CellValue::Number(revenue),
                CellValue::Number(expense),
                CellValue::Number(revenue - expense),
            ]),
            None => debug!("No cost row for period {:?}", key),
        }
    }

    if rows.is_empty() {
        return Err(ForecastError::EmptyInput(
            "The sales and cost forecasts share no period".to_string(),
        ));
    }

    info!(
        "Summarized {} periods ({} sales rows, {} cost rows)",
        rows.len(),
        sales.len(),
        cost.len()
    );

    ForecastTable::new(
        SUMMARY_SCHEMA.columns.iter().map(|c| c.to_string()).collect(),
        SUMMARY_SCHEMA.identifier_columns,
        rows,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: &[&str], rows: Vec<Vec<CellValue>>) -> ForecastTable {
        ForecastTable::new(columns.iter().map(|c| c.to_string()).collect(), 2, rows).unwrap()
    }

    fn period(year: i64, month: &str) -> [CellValue; 2] {
        [CellValue::Integer(year), CellValue::Text(month.to_string())]
    }

    fn sales() -> ForecastTable {
        let mut rows = Vec::new();
        for (month, value) in [("Gennaio", 1000.0), ("Febbraio", 1200.0), ("Marzo", 900.0)] {
            let mut row = period(2025, month).to_vec();
            row.push(CellValue::Number(value));
            rows.push(row);
        }
        table(&["Anno", "Mese", "Vendite_Totali"], rows)
    }

    #[test]
    fn test_profit_and_sales_order() {
        let cost = table(
            &["Anno", "Mese", "Costi_Totali"],
            vec![
                vec![
                    CellValue::Integer(2025),
                    CellValue::Text("febbraio".into()),
                    CellValue::Number(700.0),
                ],
                vec![
                    CellValue::Integer(2025),
                    CellValue::Text("Gen".into()),
                    CellValue::Number(400.0),
                ],
            ],
        );

        let summary = summarize(&sales(), &cost).unwrap();
        assert_eq!(summary.columns(), SUMMARY_SCHEMA.columns);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary.get(0, "Mese"), Some(&CellValue::Text("Gennaio".into())));
        assert_eq!(summary.get(0, "Profitto"), Some(&CellValue::Number(600.0)));
        assert_eq!(summary.get(1, "Mese"), Some(&CellValue::Text("Febbraio".into())));
        assert_eq!(summary.get(1, "Profitto"), Some(&CellValue::Number(500.0)));
    }

    #[test]
    fn test_total_rows_join_by_label() {
        let sales = table(
            &["Anno", "Mese", "Vendite_Totali"],
            vec![vec![
                CellValue::Integer(2025),
                CellValue::Text("Totale".into()),
                CellValue::Number(3100.0),
            ]],
        );
        let cost = table(
            &["Anno", "Mese", "Costi_Totali"],
            vec![vec![
                CellValue::Number(2025.0),
                CellValue::Text("TOTALE".into()),
                CellValue::Number(2000.0),
            ]],
        );
        let summary = summarize(&sales, &cost).unwrap();
        assert_eq!(summary.get(0, "Profitto"), Some(&CellValue::Number(1100.0)));
        assert_eq!(summary.total_rows().count(), 1);
    }

    #[test]
    fn test_missing_column() {
        let cost = table(&["Anno", "Mese", "Costi"], vec![]);
        let err = summarize(&sales(), &cost).unwrap_err();
        assert!(matches!(err, ForecastError::Parse(msg) if msg.contains("Costi_Totali")));
    }

    #[test]
    fn test_no_shared_period() {
        let cost = table(
            &["Anno", "Mese", "Costi_Totali"],
            vec![vec![
                CellValue::Integer(2026),
                CellValue::Text("Gennaio".into()),
                CellValue::Number(1.0),
            ]],
        );
        let err = summarize(&sales(), &cost).unwrap_err();
        assert!(matches!(err, ForecastError::EmptyInput(_)));
    }
}
