//! Structured extraction of named figures ("Ricavi, Costi, Utile Netto")
//! from document text. The model answers with JSON, which is decoded and
//! checked against the requested criteria; the answer is never executed.

use crate::error::{ForecastError, Result};
use crate::prompts::EXTRACTION_INSTRUCTIONS;
use crate::schema::normalize_header;
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ExtractedItem {
    #[schemars(description = "The requested figure, spelled exactly as in the request (e.g. 'Ricavi')")]
    pub criterion: String,

    #[schemars(
        description = "Numeric value as a plain number without currency symbols or thousands separators, or null when the document does not state it"
    )]
    pub value: Option<f64>,

    #[serde(default)]
    #[schemars(description = "Fiscal year or reference date of the value (e.g. '2023' or '2023-12-31'), or null")]
    pub period: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ExtractedData {
    #[schemars(description = "Exactly one entry per requested figure")]
    pub items: Vec<ExtractedItem>,
}

impl ExtractedData {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ExtractedData)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::generate_json_schema())
    }

    pub fn get(&self, criterion: &str) -> Option<&ExtractedItem> {
        let wanted = normalize_header(criterion);
        self.items
            .iter()
            .find(|item| normalize_header(&item.criterion) == wanted)
    }

    /// Renders the figures as lines for the info section of a forecast prompt.
    pub fn to_prompt_context(&self) -> String {
        self.items
            .iter()
            .map(|item| {
                let value = item
                    .value
                    .map_or_else(|| "n/d".to_string(), |v| v.to_string());
                match &item.period {
                    Some(period) => format!("{} ({}): {}", item.criterion, period, value),
                    None => format!("{}: {}", item.criterion, value),
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Splits a comma or newline separated list of criteria, dropping blanks and
/// duplicates while keeping the first spelling.
pub fn parse_criteria(criteria: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    criteria
        .split([',', '\n', ';'])
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .filter(|c| seen.insert(normalize_header(c)))
        .map(str::to_string)
        .collect()
}

pub fn build_extraction_prompt(text: &str, criteria: &[String]) -> Result<String> {
    Ok(format!(
        "Estrai i seguenti dati dal testo:\n{}\n\n{}\n\nSchema JSON:\n{}\n\nTesto:\n{}\n",
        criteria.join(", "),
        EXTRACTION_INSTRUCTIONS,
        ExtractedData::schema_as_json()?,
        text.trim()
    ))
}

/// Decodes the model's JSON answer and checks it against `criteria`: every
/// criterion exactly once, nothing else, finite values only.
pub fn parse_extracted_data(raw_text: &str, criteria: &[String]) -> Result<ExtractedData> {
    let json = json_object_slice(raw_text).ok_or_else(|| {
        ForecastError::Parse("No JSON object found in the extraction response".to_string())
    })?;

    let data: ExtractedData = serde_json::from_str(json)
        .map_err(|e| ForecastError::Parse(format!("Extraction response is not valid: {}", e)))?;

    let requested: BTreeSet<String> = criteria.iter().map(|c| normalize_header(c)).collect();
    let mut returned = BTreeSet::new();

    for item in &data.items {
        let key = normalize_header(&item.criterion);
        if !requested.contains(&key) {
            return Err(ForecastError::Parse(format!(
                "Extraction returned unrequested figure '{}'",
                item.criterion
            )));
        }
        if !returned.insert(key) {
            return Err(ForecastError::Parse(format!(
                "Extraction returned '{}' more than once",
                item.criterion
            )));
        }
        if item.value.is_some_and(|v| !v.is_finite()) {
            return Err(ForecastError::Parse(format!(
                "Extraction returned a non-finite value for '{}'",
                item.criterion
            )));
        }
    }

    let missing: Vec<&String> = criteria
        .iter()
        .filter(|c| !returned.contains(&normalize_header(c)))
        .collect();
    if !missing.is_empty() {
        return Err(ForecastError::Parse(format!(
            "Extraction response is missing {:?}",
            missing
        )));
    }

    debug!("Extracted {} figures", data.items.len());
    Ok(data)
}

/// Slice from the first `{` to the last `}`, which also strips code fences
/// and any prose around the object.
fn json_object_slice(raw_text: &str) -> Option<&str> {
    let start = raw_text.find('{')?;
    let end = raw_text.rfind('}')?;
    (end > start).then(|| &raw_text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn criteria() -> Vec<String> {
        parse_criteria("Ricavi, Costi, Utile Netto")
    }

    #[test]
    fn test_parse_criteria() {
        assert_eq!(criteria(), vec!["Ricavi", "Costi", "Utile Netto"]);
        assert_eq!(parse_criteria(" a ,, A\nb;"), vec!["a", "b"]);
    }

    #[test]
    fn test_decodes_fenced_json() {
        let raw = r#"Ecco i dati:
```json
{"items": [
  {"criterion": "Ricavi", "value": 1200000.0, "period": "2023"},
  {"criterion": "Costi", "value": 900000, "period": null},
  {"criterion": "Utile Netto", "value": null}
]}
```"#;
        let data = parse_extracted_data(raw, &criteria()).unwrap();
        assert_eq!(data.items.len(), 3);
        assert_eq!(data.get("ricavi").and_then(|i| i.value), Some(1_200_000.0));
        assert_eq!(data.get("Utile Netto").and_then(|i| i.value), None);
        assert_eq!(
            data.to_prompt_context(),
            "Ricavi (2023): 1200000\nCosti: 900000\nUtile Netto: n/d"
        );
    }

    #[test]
    fn test_rejects_non_json_and_code() {
        for raw in [
            "",
            "{'Ricavi': 1000}",
            "__import__('os').system('rm -rf /')",
            "dict(Ricavi=1000)",
        ] {
            assert!(
                matches!(parse_extracted_data(raw, &criteria()), Err(ForecastError::Parse(_))),
                "{:?} should be rejected",
                raw
            );
        }
    }

    #[test]
    fn test_rejects_unknown_fields_and_criteria() {
        let extra_field = r#"{"items": [], "note": "x"}"#;
        assert!(parse_extracted_data(extra_field, &criteria()).is_err());

        let unknown = r#"{"items": [{"criterion": "EBITDA", "value": 1}]}"#;
        assert!(parse_extracted_data(unknown, &["EBITDA".to_string(), "Ricavi".to_string()]).is_err());
        assert!(parse_extracted_data(unknown, &["Ricavi".to_string()]).is_err());
    }

    #[test]
    fn test_rejects_duplicates() {
        let raw = r#"{"items": [{"criterion": "Ricavi", "value": 1}, {"criterion": "ricavi", "value": 2}]}"#;
        assert!(parse_extracted_data(raw, &["Ricavi".to_string()]).is_err());
    }

    #[test]
    fn test_extraction_prompt_embeds_schema() {
        let prompt = build_extraction_prompt("Ricavi 2023: 1.200.000", &criteria()).unwrap();
        assert!(prompt.contains("Ricavi, Costi, Utile Netto"));
        assert!(prompt.contains("\"items\""));
        assert!(prompt.ends_with("Ricavi 2023: 1.200.000\n"));
    }
}
