use crate::error::{ForecastError, Result};
use crate::export::{csv_writer, finish_csv};
use crate::schema::ForecastKind;
use crate::table::ForecastTable;
use crate::utils::{italian_month_name, validate_month};
use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Accepted range for any percentage assumption.
pub const MIN_PERCENT: f64 = -100.0;
pub const MAX_PERCENT: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Month { year: i32, month: u32 },
    Date(NaiveDate),
}

impl Period {
    pub fn month(year: i32, month: u32) -> Result<Self> {
        validate_month(month)?;
        Ok(Period::Month { year, month })
    }

    pub fn is_monthly(&self) -> bool {
        matches!(self, Period::Month { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRecord {
    pub period: Period,
    /// Line item name to value
    pub values: BTreeMap<String, f64>,
}

impl HistoricalRecord {
    pub fn new(period: Period) -> Self {
        Self {
            period,
            values: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, line_item: impl Into<String>, value: f64) -> Self {
        self.values.insert(line_item.into(), value);
        self
    }
}

/// Historical data as upstream callers hand it over: either a delimited text
/// block typed or uploaded by the user, or structured records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoricalInput {
    Raw(String),
    Records(Vec<HistoricalRecord>),
}

impl Default for HistoricalInput {
    fn default() -> Self {
        HistoricalInput::Raw(String::new())
    }
}

impl HistoricalInput {
    /// Re-imports a previously exported forecast. Column names are carried
    /// over exactly as exported.
    pub fn from_table(table: &ForecastTable) -> Result<Self> {
        Ok(HistoricalInput::Raw(table.to_csv_string()?))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            HistoricalInput::Raw(text) => text.trim().is_empty(),
            HistoricalInput::Records(records) => records.is_empty(),
        }
    }

    fn validate(&self) -> Result<()> {
        let records = match self {
            HistoricalInput::Raw(_) => return Ok(()),
            HistoricalInput::Records(records) => records,
        };
        let Some(first) = records.first() else {
            return Ok(());
        };

        let line_items: BTreeSet<&String> = first.values.keys().collect();
        for (idx, record) in records.iter().enumerate() {
            if record.period.is_monthly() != first.period.is_monthly() {
                return Err(ForecastError::Validation(format!(
                    "Record #{} mixes monthly and dated periods",
                    idx
                )));
            }
            if let Period::Month { month, .. } = record.period {
                validate_month(month)?;
            }

            let items: BTreeSet<&String> = record.values.keys().collect();
            if items != line_items {
                return Err(ForecastError::Validation(format!(
                    "Record #{} has line items {:?}, expected {:?}",
                    idx, items, line_items
                )));
            }

            if let Some((name, value)) = record.values.iter().find(|(_, v)| !v.is_finite()) {
                return Err(ForecastError::Validation(format!(
                    "Record #{} has a non-finite value {} for '{}'",
                    idx, value, name
                )));
            }
        }
        Ok(())
    }

    /// Text placed in the prompt's historical section. Raw input is passed
    /// through verbatim; records become CSV with sorted line items.
    fn render(&self) -> Result<String> {
        let records = match self {
            HistoricalInput::Raw(text) => return Ok(text.clone()),
            HistoricalInput::Records(records) => records,
        };
        let Some(first) = records.first() else {
            return Ok(String::new());
        };

        let mut writer = csv_writer();

        let mut header: Vec<&str> = if first.period.is_monthly() {
            vec!["Anno", "Mese"]
        } else {
            vec!["Data"]
        };
        header.extend(first.values.keys().map(String::as_str));
        writer.write_record(&header)?;

        for record in records {
            let mut fields = match record.period {
                Period::Month { year, month } => vec![
                    year.to_string(),
                    italian_month_name(month).unwrap_or_default().to_string(),
                ],
                Period::Date(date) => vec![date.format("%Y-%m-%d").to_string()],
            };
            fields.extend(record.values.values().map(|v| v.to_string()));
            writer.write_record(&fields)?;
        }

        finish_csv(writer)
    }
}

/// One qualitative statement attached to a forecast request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Assumption {
    /// Annual growth rate in percent
    Growth { percent: f64 },
    Seasonality { description: String },
    Categories { names: Vec<String> },
    /// Expected change of a KPI in percent
    KpiDelta { kpi: String, percent: f64 },
    Note { text: String },
}

impl Assumption {
    fn rank(&self) -> u8 {
        match self {
            Assumption::Growth { .. } => 0,
            Assumption::Seasonality { .. } => 1,
            Assumption::Categories { .. } => 2,
            Assumption::KpiDelta { .. } => 3,
            Assumption::Note { .. } => 4,
        }
    }

    fn validate(&self) -> Result<()> {
        let (label, percent) = match self {
            Assumption::Growth { percent } => ("growth", *percent),
            Assumption::KpiDelta { kpi, percent } => (kpi.as_str(), *percent),
            _ => return Ok(()),
        };
        if !percent.is_finite() || !(MIN_PERCENT..=MAX_PERCENT).contains(&percent) {
            return Err(ForecastError::Validation(format!(
                "Percentage for {} is {}: must be between {} and {}",
                label, percent, MIN_PERCENT, MAX_PERCENT
            )));
        }
        Ok(())
    }

    fn render(&self, kind: ForecastKind) -> String {
        match self {
            Assumption::Growth { percent } => {
                format!("Crescita {}: {}%", kind.subject(), percent)
            }
            Assumption::Seasonality { description } => {
                format!("Stagionalità: {}", description.trim())
            }
            Assumption::Categories { names } => {
                let names: Vec<&str> = names
                    .iter()
                    .map(|n| n.trim())
                    .filter(|n| !n.is_empty())
                    .collect();
                format!("Categorie di {}: {}", kind.subject(), names.join(", "))
            }
            Assumption::KpiDelta { kpi, percent } => {
                format!("Variazione {}: {}%", kpi.trim(), percent)
            }
            Assumption::Note { text } => text.trim().to_string(),
        }
    }
}

/// Unordered bag of assumptions. Rendering sorts the statements so the same
/// bag always produces the same prompt text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Assumptions {
    items: Vec<Assumption>,
}

impl Assumptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, assumption: Assumption) -> Self {
        self.items.push(assumption);
        self
    }

    pub fn push(&mut self, assumption: Assumption) {
        self.items.push(assumption);
    }

    pub fn items(&self) -> &[Assumption] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        self.items.iter().try_for_each(Assumption::validate)
    }

    pub fn render(&self, kind: ForecastKind) -> Vec<String> {
        let mut lines: Vec<(u8, String)> = self
            .items
            .iter()
            .map(|a| (a.rank(), a.render(kind)))
            .filter(|(_, line)| !line.is_empty())
            .collect();
        lines.sort();
        lines.into_iter().map(|(_, line)| line).collect()
    }
}

impl FromIterator<Assumption> for Assumptions {
    fn from_iter<I: IntoIterator<Item = Assumption>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

/// Everything the prompt builder needs for one forecast. Validated on
/// construction and immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRequest {
    kind: ForecastKind,
    historical: HistoricalInput,
    historical_text: String,
    info: String,
    assumptions: Assumptions,
    horizon: u32,
}

impl ForecastRequest {
    pub fn new(
        kind: ForecastKind,
        historical: HistoricalInput,
        info: impl Into<String>,
        assumptions: Assumptions,
        horizon: u32,
    ) -> Result<Self> {
        ForecastRequestBuilder::new(kind)
            .historical(historical)
            .info(info)
            .assumptions(assumptions)
            .horizon(horizon)
            .build()
    }

    pub fn builder(kind: ForecastKind) -> ForecastRequestBuilder {
        ForecastRequestBuilder::new(kind)
    }

    pub fn kind(&self) -> ForecastKind {
        self.kind
    }

    pub fn historical(&self) -> &HistoricalInput {
        &self.historical
    }

    /// Historical section exactly as it appears in the prompt.
    pub fn historical_text(&self) -> &str {
        &self.historical_text
    }

    pub fn info(&self) -> &str {
        &self.info
    }

    pub fn assumptions(&self) -> &Assumptions {
        &self.assumptions
    }

    pub fn horizon(&self) -> u32 {
        self.horizon
    }
}

#[derive(Debug, Clone)]
pub struct ForecastRequestBuilder {
    kind: ForecastKind,
    historical: HistoricalInput,
    info: String,
    assumptions: Assumptions,
    horizon: u32,
    max_horizon: Option<u32>,
}

impl ForecastRequestBuilder {
    pub fn new(kind: ForecastKind) -> Self {
        Self {
            kind,
            historical: HistoricalInput::default(),
            info: String::new(),
            assumptions: Assumptions::new(),
            horizon: kind.max_horizon(),
            max_horizon: None,
        }
    }

    pub fn historical(mut self, historical: HistoricalInput) -> Self {
        self.historical = historical;
        self
    }

    pub fn info(mut self, info: impl Into<String>) -> Self {
        self.info = info.into();
        self
    }

    pub fn assumptions(mut self, assumptions: Assumptions) -> Self {
        self.assumptions = assumptions;
        self
    }

    pub fn assumption(mut self, assumption: Assumption) -> Self {
        self.assumptions.push(assumption);
        self
    }

    pub fn horizon(mut self, horizon: u32) -> Self {
        self.horizon = horizon;
        self
    }

    /// Tightens the kind's horizon limit (e.g. to
    /// [`crate::schema::MAX_ROLLING_UPDATE_HORIZON`] for rolling updates).
    /// Cannot raise it.
    pub fn max_horizon(mut self, max: u32) -> Self {
        self.max_horizon = Some(max);
        self
    }

    pub fn build(self) -> Result<ForecastRequest> {
        let limit = self
            .max_horizon
            .map_or(self.kind.max_horizon(), |max| max.min(self.kind.max_horizon()));

        if self.horizon == 0 || self.horizon > limit {
            return Err(ForecastError::Validation(format!(
                "Horizon {} out of range for a {} forecast: must be between 1 and {}",
                self.horizon, self.kind, limit
            )));
        }

        self.historical.validate()?;
        self.assumptions.validate()?;
        let historical_text = self.historical.render()?;

        debug!(
            "Built {} forecast request: horizon {}, {} assumptions, {} bytes of history",
            self.kind,
            self.horizon,
            self.assumptions.items().len(),
            historical_text.len()
        );

        Ok(ForecastRequest {
            kind: self.kind,
            historical: self.historical,
            historical_text,
            info: self.info,
            assumptions: self.assumptions,
            horizon: self.horizon,
        })
    }
}
