use serde::{Deserialize, Serialize};
use std::fmt;

/// Column layout shared by the prompt builder and the response parser.
///
/// The prompt's output-format directive is rendered from `columns`, and the
/// parser validates field counts and resolves headers against the same
/// constant, so a schema change lands in both places at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSchema {
    pub columns: &'static [&'static str],
    /// Number of leading period columns (year/month/date). These are never
    /// coerced to floating point.
    pub identifier_columns: usize,
    /// Value placed in the last identifier column of an annual-total row.
    pub total_marker: &'static str,
    /// Header spellings the model is known to emit, mapped to the canonical
    /// column name. Keys are compared after [`normalize_header`].
    pub aliases: &'static [(&'static str, &'static str)],
}

pub const SALES_SCHEMA: ColumnSchema = ColumnSchema {
    columns: &[
        "Anno",
        "Mese",
        "Ricavi_Totali",
        "Unità",
        "Prezzo",
        "Vendite_Totali",
        "Percentuale_Totale",
    ],
    identifier_columns: 2,
    total_marker: "Totale",
    aliases: &[
        ("ricavi", "Ricavi_Totali"),
        ("ricavi_totale", "Ricavi_Totali"),
        ("unita", "Unità"),
        ("quantità", "Unità"),
        ("prezzo_unitario", "Prezzo"),
        ("vendite", "Vendite_Totali"),
        ("percentuale", "Percentuale_Totale"),
        ("percentuale_sul_totale", "Percentuale_Totale"),
    ],
};

pub const COST_SCHEMA: ColumnSchema = ColumnSchema {
    columns: &[
        "Anno",
        "Mese",
        "Costi_Totali",
        "Unità",
        "Prezzo",
        "Vendite_Totali",
        "Percentuale_Totale",
    ],
    identifier_columns: 2,
    total_marker: "Totale",
    aliases: &[
        ("costi", "Costi_Totali"),
        ("costi_totale", "Costi_Totali"),
        ("unita", "Unità"),
        ("quantità", "Unità"),
        ("prezzo_unitario", "Prezzo"),
        ("vendite", "Vendite_Totali"),
        ("percentuale", "Percentuale_Totale"),
        ("percentuale_sul_totale", "Percentuale_Totale"),
    ],
};

pub const GENERIC_SCHEMA: ColumnSchema = ColumnSchema {
    columns: &[
        "Year",
        "Month",
        "Total",
        "Units",
        "Price",
        "Sales_Total",
        "Percent_of_Total",
    ],
    identifier_columns: 2,
    total_marker: "Total",
    aliases: &[
        ("anno", "Year"),
        ("mese", "Month"),
        ("totale", "Total"),
        ("unit", "Units"),
        ("quantity", "Units"),
        ("unit_price", "Price"),
        ("sales", "Sales_Total"),
        ("percent", "Percent_of_Total"),
        ("percentage_of_total", "Percent_of_Total"),
    ],
};

/// Joined sales/cost view produced by [`crate::summary::summarize`].
pub const SUMMARY_SCHEMA: ColumnSchema = ColumnSchema {
    columns: &["Anno", "Mese", "Vendite_Totali", "Costi_Totali", "Profitto"],
    identifier_columns: 2,
    total_marker: "Totale",
    aliases: &[],
};

/// Header names recognised as period identifiers when a caller supplies an
/// ad-hoc column list instead of a registered schema.
pub const IDENTIFIER_NAMES: &[&str] = &[
    "anno", "mese", "year", "month", "data", "date", "periodo", "period",
];

/// Upper bound on monthly sales and cost horizons.
pub const MAX_MONTHLY_HORIZON: u32 = 36;
/// Upper bound on the generic variant's horizon.
pub const MAX_GENERIC_HORIZON: u32 = 12;
/// Cap a caller applies when refreshing an existing rolling forecast.
pub const MAX_ROLLING_UPDATE_HORIZON: u32 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastKind {
    Sales,
    Cost,
    Generic,
}

impl ForecastKind {
    pub fn schema(&self) -> &'static ColumnSchema {
        match self {
            ForecastKind::Sales => &SALES_SCHEMA,
            ForecastKind::Cost => &COST_SCHEMA,
            ForecastKind::Generic => &GENERIC_SCHEMA,
        }
    }

    pub fn max_horizon(&self) -> u32 {
        match self {
            ForecastKind::Sales | ForecastKind::Cost => MAX_MONTHLY_HORIZON,
            ForecastKind::Generic => MAX_GENERIC_HORIZON,
        }
    }

    /// Noun used in the prompt ("per ricavi", "Crescita costi").
    pub fn subject(&self) -> &'static str {
        match self {
            ForecastKind::Sales => "ricavi",
            ForecastKind::Cost => "costi",
            ForecastKind::Generic => "dati finanziari",
        }
    }
}

impl fmt::Display for ForecastKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForecastKind::Sales => write!(f, "sales"),
            ForecastKind::Cost => write!(f, "cost"),
            ForecastKind::Generic => write!(f, "generic"),
        }
    }
}

impl ColumnSchema {
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Column that carries the total marker on annual-total rows.
    pub fn marker_column(&self) -> Option<&'static str> {
        self.identifier_columns
            .checked_sub(1)
            .and_then(|idx| self.columns.get(idx).copied())
    }

    /// Maps a header as written by the model to the canonical column name.
    ///
    /// Exact (normalized) matches win over aliases; unknown names are
    /// returned unchanged.
    pub fn resolve_header(&self, header: &str) -> String {
        resolve_header(header, self.columns, self.aliases)
    }
}

/// Lowercases and folds spaces and hyphens to underscores.
pub fn normalize_header(header: &str) -> String {
    header
        .trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            other => other,
        })
        .collect::<String>()
        .to_lowercase()
}

pub(crate) fn resolve_header<S: AsRef<str>>(
    header: &str,
    columns: &[S],
    aliases: &[(&str, &str)],
) -> String {
    let normalized = normalize_header(header);

    if let Some(column) = columns
        .iter()
        .find(|c| normalize_header(c.as_ref()) == normalized)
    {
        return column.as_ref().to_string();
    }

    aliases
        .iter()
        .find(|(alias, _)| normalize_header(alias) == normalized)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or_else(|| header.trim().to_string())
}

/// Counts leading columns that name a period, at most two. A table with
/// more than one column always has at least one identifier; a lone value
/// column has none.
pub fn infer_identifier_columns<S: AsRef<str>>(columns: &[S]) -> usize {
    let leading = columns
        .iter()
        .take(2)
        .take_while(|c| is_identifier_name(c.as_ref()))
        .count();
    if leading == 0 && columns.len() > 1 {
        1
    } else {
        leading
    }
}

pub fn is_identifier_name(header: &str) -> bool {
    IDENTIFIER_NAMES.contains(&normalize_header(header).as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schemas_have_seven_columns() {
        for kind in [ForecastKind::Sales, ForecastKind::Cost, ForecastKind::Generic] {
            assert_eq!(kind.schema().len(), 7, "{} schema", kind);
            assert_eq!(kind.schema().identifier_columns, 2);
        }
    }

    #[test]
    fn test_resolve_header_prefers_exact_match() {
        assert_eq!(SALES_SCHEMA.resolve_header("ricavi_Totali"), "Ricavi_Totali");
        assert_eq!(SALES_SCHEMA.resolve_header(" ANNO "), "Anno");
        assert_eq!(SALES_SCHEMA.resolve_header("Ricavi"), "Ricavi_Totali");
        assert_eq!(SALES_SCHEMA.resolve_header("Unita"), "Unità");
        assert_eq!(COST_SCHEMA.resolve_header("Costi Totali"), "Costi_Totali");
        assert_eq!(SALES_SCHEMA.resolve_header("Margine"), "Margine");
    }

    #[test]
    fn test_infer_identifier_columns() {
        assert_eq!(infer_identifier_columns(&["Anno", "Mese", "Ricavi"]), 2);
        assert_eq!(infer_identifier_columns(&["Data", "Ricavi"]), 1);
        assert_eq!(infer_identifier_columns(&["Ricavi", "Costi"]), 1);
        assert_eq!(infer_identifier_columns(&["Year", "Month", "Day", "x"]), 2);
        assert_eq!(infer_identifier_columns(&["Ricavi"]), 0);
        assert_eq!(infer_identifier_columns(&["Data"]), 1);
    }

    #[test]
    fn test_marker_column() {
        assert_eq!(SALES_SCHEMA.marker_column(), Some("Mese"));
        assert_eq!(GENERIC_SCHEMA.marker_column(), Some("Month"));
    }

    #[test]
    fn test_max_horizon() {
        assert_eq!(ForecastKind::Sales.max_horizon(), 36);
        assert_eq!(ForecastKind::Cost.max_horizon(), 36);
        assert_eq!(ForecastKind::Generic.max_horizon(), 12);
    }
}
