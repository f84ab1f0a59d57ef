//! # Financial Forecast Builder
//!
//! Turns historical financial figures and business assumptions into a prompt
//! for a language model, and turns the model's reply (a CSV or Markdown
//! table, optionally followed by commentary) back into a typed table.
//!
//! ## Core Concepts
//!
//! - **Column Schema**: the fixed, ordered column list for each forecast kind.
//!   The same schema drives the prompt's format directive and the parser.
//! - **Forecast Request**: kind, historical data, business information,
//!   assumptions and a horizon in months.
//! - **Forecast Table**: positional rows with a fixed width; annual totals are
//!   rows carrying "Totale" in an identifier column.
//! - **Provider**: anything that turns a prompt into text. The `anthropic`
//!   feature ships an HTTP client for the Messages API.
//!
//! ## Example
//!
//! ```rust,ignore
//! use financial_forecast_builder::*;
//!
//! let request = ForecastRequest::builder(ForecastKind::Sales)
//!     .historical(HistoricalInput::Raw("Anno,Mese,Ricavi\n2024,Dicembre,1200".into()))
//!     .info("Negozio di abbigliamento a Milano")
//!     .assumption(Assumption::Growth { percent: 5.0 })
//!     .horizon(12)
//!     .build()?;
//!
//! let prompt = build_prompt(&request);
//! let reply = call_the_model(&prompt);
//! let response = parse_forecast(&reply, ForecastKind::Sales)?;
//!
//! println!("{}", response.table.to_csv_string()?);
//! ```

pub mod builder;
pub mod config;
pub mod error;
pub mod export;
pub mod extraction;
pub mod forecaster;
pub mod parser;
pub mod prompts;
pub mod provider;
pub mod request;
pub mod schema;
pub mod summary;
pub mod table;
pub mod utils;

#[cfg(feature = "documents")]
pub mod documents;

#[cfg(feature = "anthropic")]
pub mod llm;

pub use builder::{build_analysis_prompt, build_prompt};
pub use config::ClientConfig;
pub use error::{ForecastError, Result};
pub use extraction::{
    build_extraction_prompt, parse_criteria, parse_extracted_data, ExtractedData, ExtractedItem,
};
pub use forecaster::Forecaster;
pub use parser::{parse_forecast, parse_response, parse_with_schema};
pub use provider::CompletionProvider;
pub use request::*;
pub use schema::*;
pub use summary::summarize;
pub use table::*;
pub use utils::*;

#[cfg(feature = "documents")]
pub use documents::{extract_text, extract_text_from_path, DocumentFormat};

#[cfg(feature = "anthropic")]
pub use llm::AnthropicClient;
