use async_trait::async_trait;
use financial_forecast_builder::*;
use std::fs;
use std::sync::Mutex;

const SALES_REPLY: &str = "Ecco il rolling forecast richiesto:

```csv
Anno,Mese,Ricavi_Totali,Unità,Prezzo,Vendite_Totali,Percentuale_Totale
2025,Gennaio,10000,200,50,10000,30.3
2025,Febbraio,11000,220,50,11000,33.3
2025,Marzo,12000,240,50,12000,36.4
2025,Totale,33000,660,50,33000,100
```

La crescita riflette l'apertura del nuovo punto vendita a febbraio.";

const COST_REPLY: &str = "| Anno | Mese | Costi_Totali | Unità | Prezzo | Vendite_Totali | Percentuale_Totale |
|------|------|--------------|-------|--------|----------------|--------------------|
| 2025 | Gennaio | 6000 | 200 | 30 | 10000 | 33.3 |
| 2025 | Febbraio | 6000 | 200 | 30 | 11000 | 33.3 |
| 2025 | Marzo | 6000 | 200 | 30 | 12000 | 33.3 |
| **2025** | **Totale** | **18000** | 600 | 30 | 33000 | 100 |

Costi sostanzialmente stabili.";

fn csv_rows(rows: usize, malformed: usize) -> String {
    let mut raw = String::from("Anno,Mese,Ricavi\n");
    for idx in 0..rows {
        if idx < malformed {
            raw.push_str(&format!("2024,{}\n", idx + 1));
        } else {
            raw.push_str(&format!("2024,{},{}\n", idx + 1, 1000 + idx * 10));
        }
    }
    raw
}

fn markdown_rows(rows: usize, malformed: usize) -> String {
    let mut raw = String::from("| Anno | Mese | Ricavi |\n|------|------|--------|\n");
    for idx in 0..rows {
        if idx < malformed {
            raw.push_str(&format!("| 2024 | {} |\n", idx + 1));
        } else {
            raw.push_str(&format!("| 2024 | {} | {} |\n", idx + 1, 1000 + idx * 10));
        }
    }
    raw.push_str("\nPrevisione indicativa.");
    raw
}

/// Replies from a fixed script, in order, and records every prompt.
struct ScriptedProvider {
    replies: Mutex<Vec<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().rev().map(|r| r.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(&self, prompt: &str, _max: u32, _model: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| ForecastError::ExternalService("script exhausted".to_string()))
    }
}

#[test]
fn test_italian_csv_scenario() {
    let raw = "Anno,Mese,Ricavi\n2024,Gennaio,1000\n2024,Febbraio,1100\n";
    let response = parse_response(raw, &["Anno", "Mese", "Ricavi"]).unwrap();
    let table = &response.table;

    assert_eq!(table.len(), 2);
    assert_eq!(table.columns(), &["Anno", "Mese", "Ricavi"]);
    assert_eq!(table.get(0, "Anno").and_then(CellValue::as_f64), Some(2024.0));
    assert_eq!(table.get(0, "Mese").and_then(CellValue::as_text), Some("Gennaio"));
    assert_eq!(table.get(0, "Ricavi"), Some(&CellValue::Number(1000.0)));
    assert_eq!(table.get(1, "Mese").and_then(CellValue::as_text), Some("Febbraio"));
    assert_eq!(table.get(1, "Ricavi"), Some(&CellValue::Number(1100.0)));
}

#[test]
fn test_markdown_date_scenario() {
    let raw = "| Data | Ricavi |\n|---|---|\n| 2024-01-01 | 100000 |\n";
    let response = parse_response(raw, &["Data", "Ricavi"]).unwrap();

    assert_eq!(response.table.len(), 1);
    assert_eq!(
        response.table.get(0, "Data").and_then(CellValue::as_text),
        Some("2024-01-01")
    );
    assert_eq!(response.table.get(0, "Ricavi"), Some(&CellValue::Number(100000.0)));
}

#[test]
fn test_format_independence() {
    let csv = "Anno,Mese,Ricavi\n2024,Gennaio,1000\n2024,Febbraio,1100.5\n";
    let markdown = "Previsione:\n\n| Anno | Mese | Ricavi |\n| :--- | :--- | ---: |\n\
                    | 2024 | Gennaio | 1000 |\n| 2024 | Febbraio | 1100.5 |\n";
    let columns = ["Anno", "Mese", "Ricavi"];

    let from_csv = parse_response(csv, &columns).unwrap();
    let from_markdown = parse_response(markdown, &columns).unwrap();

    assert_eq!(from_csv.format, TableFormat::Csv);
    assert_eq!(from_markdown.format, TableFormat::Markdown);
    assert_eq!(from_csv.table, from_markdown.table);
}

#[test]
fn test_export_round_trip() {
    let response = parse_forecast(SALES_REPLY, ForecastKind::Sales).unwrap();
    let csv = response.table.to_csv_string().unwrap();

    let reparsed = parse_forecast(&csv, ForecastKind::Sales).unwrap();
    assert_eq!(reparsed.table, response.table);
    assert_eq!(reparsed.table.to_csv_string().unwrap(), csv);
}

#[test]
fn test_export_writes_downloadable_file() {
    let response = parse_forecast(SALES_REPLY, ForecastKind::Sales).unwrap();
    let path = std::env::temp_dir().join("financial_forecast_builder_sales.csv");

    let file = fs::File::create(&path).unwrap();
    response.table.write_csv(file).unwrap();

    let written = fs::read_to_string(&path).unwrap();
    assert!(written.starts_with(
        "Anno,Mese,Ricavi_Totali,Unità,Prezzo,Vendite_Totali,Percentuale_Totale\n"
    ));
    assert_eq!(written.lines().count(), 5);
    fs::remove_file(&path).ok();
}

#[test]
fn test_one_malformed_row_of_ten_is_dropped() {
    let response = parse_response(&csv_rows(10, 1), &["Anno", "Mese", "Ricavi"]).unwrap();
    assert_eq!(response.table.len(), 9);
    assert_eq!(response.dropped_rows, 1);
}

#[test]
fn test_all_rows_malformed_is_parse_error() {
    let err = parse_response(&csv_rows(10, 10), &["Anno", "Mese", "Ricavi"]).unwrap_err();
    assert!(matches!(err, ForecastError::Parse(_)));
}

#[test]
fn test_one_malformed_markdown_row_of_ten_is_dropped() {
    let response = parse_response(&markdown_rows(10, 1), &["Anno", "Mese", "Ricavi"]).unwrap();
    assert_eq!(response.format, TableFormat::Markdown);
    assert_eq!(response.table.len(), 9);
    assert_eq!(response.dropped_rows, 1);
    assert_eq!(response.explanation.as_deref(), Some("Previsione indicativa."));
}

#[test]
fn test_all_markdown_rows_malformed_is_parse_error() {
    let err = parse_response(&markdown_rows(10, 10), &["Anno", "Mese", "Ricavi"]).unwrap_err();
    assert!(matches!(err, ForecastError::Parse(msg) if msg.contains("malformed")));
}

#[test]
fn test_single_column_export_round_trip() {
    let table = ForecastTable::new(
        vec!["Ricavi".to_string()],
        0,
        vec![vec![CellValue::Number(100.0)], vec![CellValue::Number(0.1 + 0.2)]],
    )
    .unwrap();
    let csv = table.to_csv_string().unwrap();
    assert_eq!(csv, "Ricavi\n100\n0.30000000000000004\n");

    let reparsed = parse_response(&csv, &["Ricavi"]).unwrap();
    assert_eq!(reparsed.table, table);
}

#[test]
fn test_two_column_reply_with_comma_preamble() {
    let raw = "Ecco la previsione, come richiesto:\n\n| Data | Ricavi |\n|---|---|\n| 2024-01-01 | 100000 |\n";
    let response = parse_response(raw, &["Data", "Ricavi"]).unwrap();
    assert_eq!(response.table.get(0, "Ricavi"), Some(&CellValue::Number(100000.0)));

    let raw = "Ecco i dati, in CSV:\nData,Ricavi\n2024-01-01,100000\n2024-02-01,110000\n";
    let response = parse_response(raw, &["Data", "Ricavi"]).unwrap();
    assert_eq!(response.table.columns(), &["Data", "Ricavi"]);
    assert_eq!(response.table.len(), 2);
    assert_eq!(response.dropped_rows, 0);
}

#[test]
fn test_empty_and_tableless_input() {
    let columns = ["Anno", "Mese", "Ricavi"];
    assert!(matches!(parse_response("", &columns), Err(ForecastError::Parse(_))));
    assert!(matches!(
        parse_response("Mi dispiace, non posso generare la previsione.", &columns),
        Err(ForecastError::Parse(_))
    ));
    assert!(matches!(
        parse_response("Anno,Mese,Ricavi\n", &columns),
        Err(ForecastError::Parse(_))
    ));
}

#[test]
fn test_prompt_is_deterministic() {
    let request = || {
        ForecastRequest::builder(ForecastKind::Cost)
            .historical(HistoricalInput::Raw("Anno,Mese,Costi\n2024,Dicembre,800".into()))
            .info("Ristorante con 20 coperti")
            .assumption(Assumption::Categories {
                names: vec!["Personale".into(), "Materie prime".into()],
            })
            .assumption(Assumption::Growth { percent: 3.0 })
            .horizon(6)
            .build()
            .unwrap()
    };

    let prompt = build_prompt(&request());
    assert_eq!(prompt, build_prompt(&request()));
    assert!(prompt.contains(&COST_SCHEMA.columns.join(",")));
    assert!(prompt.contains("6 mesi"));
}

#[test]
fn test_forecast_table_reuploads_as_history() {
    let response = parse_forecast(SALES_REPLY, ForecastKind::Sales).unwrap();
    let history = HistoricalInput::from_table(&response.table).unwrap();

    let request = ForecastRequest::builder(ForecastKind::Sales)
        .historical(history)
        .horizon(MAX_ROLLING_UPDATE_HORIZON)
        .max_horizon(MAX_ROLLING_UPDATE_HORIZON)
        .build()
        .unwrap();

    assert!(request
        .historical_text()
        .starts_with(&SALES_SCHEMA.columns.join(",")));
    assert!(build_prompt(&request).contains("2025,Febbraio,11000"));
}

#[test]
fn test_rolling_update_horizon_is_capped() {
    let err = ForecastRequest::builder(ForecastKind::Sales)
        .horizon(MAX_ROLLING_UPDATE_HORIZON + 1)
        .max_horizon(MAX_ROLLING_UPDATE_HORIZON)
        .build()
        .unwrap_err();
    assert!(matches!(err, ForecastError::Validation(_)));
}

#[test]
fn test_summary_of_parsed_forecasts() {
    let sales = parse_forecast(SALES_REPLY, ForecastKind::Sales).unwrap();
    let cost = parse_forecast(COST_REPLY, ForecastKind::Cost).unwrap();
    assert_eq!(cost.format, TableFormat::Markdown);

    let summary = summarize(&sales.table, &cost.table).unwrap();
    assert_eq!(summary.columns(), SUMMARY_SCHEMA.columns);
    assert_eq!(summary.len(), 4);

    let profits: Vec<f64> = summary
        .period_rows()
        .filter_map(|row| row.get("Profitto").and_then(CellValue::as_f64))
        .collect();
    assert_eq!(profits, vec![4000.0, 5000.0, 6000.0]);

    let total = summary.total_rows().next().unwrap();
    assert_eq!(total.get("Profitto"), Some(&CellValue::Number(15000.0)));
    assert_eq!(summary.column_total("Profitto"), Some(15000.0));
}

#[tokio::test]
async fn test_forecaster_end_to_end() -> anyhow::Result<()> {
    let provider = ScriptedProvider::new(&[SALES_REPLY, COST_REPLY, "## Analisi\nMargine in crescita."]);
    let forecaster = Forecaster::new(provider, "test-model", 4000);

    let sales_request = ForecastRequest::builder(ForecastKind::Sales)
        .historical(HistoricalInput::Raw("Anno,Mese,Ricavi\n2024,Dicembre,9500".into()))
        .horizon(3)
        .build()?;
    let cost_request = ForecastRequest::builder(ForecastKind::Cost)
        .historical(HistoricalInput::Raw("Anno,Mese,Costi\n2024,Dicembre,5900".into()))
        .horizon(3)
        .build()?;

    let sales = forecaster.forecast(&sales_request).await?;
    let cost = forecaster.forecast(&cost_request).await?;
    assert_eq!(sales.table.period_rows().count(), 3);
    assert!(sales
        .explanation
        .as_deref()
        .is_some_and(|e| e.contains("nuovo punto vendita")));
    assert_eq!(cost.explanation.as_deref(), Some("Costi sostanzialmente stabili."));

    let analysis = forecaster.analyze(&sales.table, &cost.table, 3).await?;
    assert!(analysis.contains("Margine in crescita"));

    let summary = summarize(&sales.table, &cost.table)?;
    assert_eq!(summary.len(), 4);
    Ok(())
}

#[tokio::test]
async fn test_forecaster_surfaces_unusable_reply() {
    let provider = ScriptedProvider::new(&["Non ho dati sufficienti per rispondere."]);
    let forecaster = Forecaster::new(provider, "test-model", 4000);
    let request = ForecastRequest::builder(ForecastKind::Generic)
        .horizon(12)
        .build()
        .unwrap();

    let err = forecaster.forecast(&request).await.unwrap_err();
    assert!(matches!(err, ForecastError::Parse(_)));
}

#[tokio::test]
async fn test_extraction_flow() {
    let reply = r#"Ecco i dati:
{"items": [
  {"criterion": "Ricavi", "value": 1250000, "period": "2023"},
  {"criterion": "EBITDA", "value": 180000.5, "period": "2023"}
]}"#;
    let provider = ScriptedProvider::new(&[reply]);
    let forecaster = Forecaster::new(provider, "test-model", 4000);

    let data = forecaster
        .extract_figures("Bilancio 2023: ricavi 1.250.000 euro, EBITDA 180.000,50 euro", "Ricavi, EBITDA")
        .await
        .unwrap();
    assert_eq!(data.get("Ricavi").and_then(|i| i.value), Some(1_250_000.0));
    assert_eq!(data.get("EBITDA").and_then(|i| i.value), Some(180_000.5));
}
