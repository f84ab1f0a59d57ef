use dotenv::dotenv;
use financial_forecast_builder::llm::AnthropicClient;
use financial_forecast_builder::{
    summarize, Assumption, ClientConfig, ForecastKind, ForecastRequest, ForecastTable, Forecaster,
    HistoricalInput,
};
use std::error::Error;
use std::fs;
use std::path::Path;

const SAMPLE_SALES: &str = "Anno,Mese,Ricavi\n\
2024,Ottobre,41000\n\
2024,Novembre,45500\n\
2024,Dicembre,58200\n";

const SAMPLE_COSTS: &str = "Anno,Mese,Costi\n\
2024,Ottobre,30100\n\
2024,Novembre,31800\n\
2024,Dicembre,36900\n";

fn print_table(title: &str, table: &ForecastTable) {
    println!("   📋 {}", title);
    println!("      {}", table.columns().join(" | "));
    for row in table.iter_rows() {
        let cells: Vec<String> = row.cells().iter().map(ToString::to_string).collect();
        println!("      {}", cells.join(" | "));
    }
    println!();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();

    println!("🚀 Rolling Forecast Demonstration");
    println!("═══════════════════════════════════════════════════════════════\n");

    // 1. Setup client
    let config = ClientConfig::from_env()?;
    let model = config.model.clone();
    let max_tokens = config.max_output_tokens;
    let client = AnthropicClient::new(config)?;
    let forecaster = Forecaster::new(client, model, max_tokens);

    // 2. Historical data: a CSV path on the command line, or the built-in sample
    let sales_history = match std::env::args().nth(1) {
        Some(path) => fs::read_to_string(path)?,
        None => SAMPLE_SALES.to_string(),
    };

    let sales_request = ForecastRequest::builder(ForecastKind::Sales)
        .historical(HistoricalInput::Raw(sales_history))
        .info("Negozio di articoli sportivi, due punti vendita a Torino")
        .assumption(Assumption::Growth { percent: 6.0 })
        .assumption(Assumption::Seasonality {
            description: "picco a dicembre e a luglio".to_string(),
        })
        .horizon(12)
        .build()?;

    let cost_request = ForecastRequest::builder(ForecastKind::Cost)
        .historical(HistoricalInput::Raw(SAMPLE_COSTS.to_string()))
        .assumption(Assumption::Categories {
            names: vec!["Personale".into(), "Affitti".into(), "Merci".into()],
        })
        .assumption(Assumption::KpiDelta {
            kpi: "Costo del personale".to_string(),
            percent: 2.5,
        })
        .horizon(12)
        .build()?;

    // 3. Forecasts
    println!("📊 Requesting sales and cost forecasts...\n");
    let sales = forecaster.forecast(&sales_request).await?;
    let costs = forecaster.forecast(&cost_request).await?;

    print_table("Previsione ricavi", &sales.table);
    if let Some(explanation) = &sales.explanation {
        println!("   💬 {}\n", explanation);
    }
    print_table("Previsione costi", &costs.table);
    if sales.dropped_rows + costs.dropped_rows > 0 {
        println!(
            "   ⚠️  {} malformed rows were skipped\n",
            sales.dropped_rows + costs.dropped_rows
        );
    }

    // 4. Summary and analysis
    let summary = summarize(&sales.table, &costs.table)?;
    print_table("Riepilogo", &summary);

    let analysis = forecaster.analyze(&sales.table, &costs.table, 12).await?;
    println!("🧠 Analisi\n{}\n", analysis);

    // 5. Export
    let out_dir = Path::new("demos").join("output");
    fs::create_dir_all(&out_dir)?;
    for (name, table) in [
        ("previsione_ricavi.csv", &sales.table),
        ("previsione_costi.csv", &costs.table),
        ("riepilogo.csv", &summary),
    ] {
        let path = out_dir.join(name);
        fs::write(&path, table.to_csv_bytes()?)?;
        println!("   ✅ Saved {}", path.display());
    }

    Ok(())
}
