use crate::error::Result;
use crate::prompts::*;
use crate::request::ForecastRequest;
use crate::table::ForecastTable;

/// Builds the forecast prompt for `request`.
///
/// Sections always appear in the same order: historical data, info,
/// assumptions, horizon, output-format directive, explanation directive. The
/// column list in the directive comes from the request kind's
/// [`crate::schema::ColumnSchema`], the same constant the parser checks
/// responses against.
pub fn build_prompt(request: &ForecastRequest) -> String {
    let kind = request.kind();
    let schema = kind.schema();
    let horizon = request.horizon();

    let mut prompt = format!(
        "{} {} basato sui seguenti dati:\n\n",
        FORECAST_INTRO,
        kind.subject()
    );

    push_section(&mut prompt, SECTION_HISTORICAL, request.historical_text(), EMPTY_HISTORICAL);
    push_section(&mut prompt, SECTION_INFO, request.info(), EMPTY_INFO);

    let assumptions = request.assumptions().render(kind).join("\n");
    push_section(&mut prompt, SECTION_ASSUMPTIONS, &assumptions, EMPTY_ASSUMPTIONS);

    prompt.push_str(&format!(
        "{} prevedi i prossimi {} mesi.\n\n",
        SECTION_HORIZON, horizon
    ));

    prompt.push_str(FORMAT_DIRECTIVE);
    prompt.push('\n');
    prompt.push_str(&schema.columns.join(","));
    prompt.push_str("\n\n");

    if let Some(marker_column) = schema.marker_column() {
        prompt.push_str(&format!(
            "Aggiungi una riga per i totali annuali alla fine di ogni anno, con \"{}\" nella colonna {}.\n",
            schema.total_marker, marker_column
        ));
    }
    prompt.push_str(&format!(
        "Assicurati che il CSV abbia esattamente {} colonne per ogni riga, compresi i totali annuali.\n\n",
        schema.len()
    ));

    prompt.push_str(EXPLANATION_DIRECTIVE);
    prompt.push('\n');
    prompt
}

fn push_section(prompt: &mut String, title: &str, body: &str, placeholder: &str) {
    let body = body.trim_end();
    prompt.push_str(title);
    prompt.push('\n');
    prompt.push_str(if body.trim().is_empty() { placeholder } else { body });
    prompt.push_str("\n\n");
}

/// Prompt asking for a narrative analysis of a sales and a cost forecast.
pub fn build_analysis_prompt(
    sales: &ForecastTable,
    cost: &ForecastTable,
    horizon: u32,
) -> Result<String> {
    Ok(format!(
        "Analizza le seguenti previsioni di vendite e costi per i prossimi {} mesi:\n\n\
         Previsione Vendite:\n{}\n\
         Previsione Costi:\n{}\n\
         {}\n",
        horizon,
        sales.to_csv_string()?,
        cost.to_csv_string()?,
        ANALYSIS_REQUEST
    ))
}
