use crate::error::{ForecastError, Result};

const ITALIAN_MONTHS: [&str; 12] = [
    "Gennaio",
    "Febbraio",
    "Marzo",
    "Aprile",
    "Maggio",
    "Giugno",
    "Luglio",
    "Agosto",
    "Settembre",
    "Ottobre",
    "Novembre",
    "Dicembre",
];

const ENGLISH_MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

pub fn italian_month_name(month: u32) -> Option<&'static str> {
    month
        .checked_sub(1)
        .and_then(|idx| ITALIAN_MONTHS.get(idx as usize).copied())
}

/// Resolves an Italian or English month name (full or three-letter
/// abbreviation) or a numeric month to 1..=12.
pub fn month_from_name(name: &str) -> Option<u32> {
    let trimmed = name.trim();
    if let Ok(number) = trimmed.parse::<u32>() {
        return (1..=12).contains(&number).then_some(number);
    }

    let lowered = trimmed.to_lowercase();
    if lowered.chars().count() < 3 {
        return None;
    }

    ITALIAN_MONTHS
        .iter()
        .zip(ENGLISH_MONTHS.iter())
        .position(|(it, en)| {
            let it = it.to_lowercase();
            let en = en.to_lowercase();
            it == lowered || en == lowered || it.starts_with(&lowered) || en.starts_with(&lowered)
        })
        .map(|idx| idx as u32 + 1)
}

pub fn validate_month(month: u32) -> Result<()> {
    if !(1..=12).contains(&month) {
        return Err(ForecastError::Validation(format!(
            "Invalid month {}: must be between 1 and 12",
            month
        )));
    }
    Ok(())
}

/// Parses a numeric cell the way model output tends to write them: optional
/// surrounding whitespace, a leading currency sign, a trailing percent sign.
/// Non-finite values are rejected.
pub fn parse_numeric_cell(raw: &str) -> Option<f64> {
    let mut cell = raw.trim();
    for prefix in ['€', '$'] {
        if let Some(rest) = cell.strip_prefix(prefix) {
            cell = rest.trim_start();
        }
    }
    if let Some(rest) = cell.strip_suffix('%') {
        cell = rest.trim_end();
    }
    if cell.is_empty() {
        return None;
    }

    cell.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// True when the first word is "Totale" or "Total" ("Totale 2024",
/// "TOTAL:"), case-insensitively.
pub fn is_total_marker(text: &str) -> bool {
    let first_word: String = text
        .trim()
        .chars()
        .take_while(|c| c.is_alphabetic())
        .collect::<String>()
        .to_lowercase();
    matches!(first_word.as_str(), "totale" | "total")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_italian_month_name() {
        assert_eq!(italian_month_name(1), Some("Gennaio"));
        assert_eq!(italian_month_name(12), Some("Dicembre"));
        assert_eq!(italian_month_name(0), None);
        assert_eq!(italian_month_name(13), None);
    }

    #[test]
    fn test_month_from_name() {
        assert_eq!(month_from_name("Febbraio"), Some(2));
        assert_eq!(month_from_name("feb"), Some(2));
        assert_eq!(month_from_name("October"), Some(10));
        assert_eq!(month_from_name("7"), Some(7));
        assert_eq!(month_from_name("13"), None);
        assert_eq!(month_from_name("Ma"), None);
        assert_eq!(month_from_name("Totale"), None);
    }

    #[test]
    fn test_parse_numeric_cell() {
        assert_eq!(parse_numeric_cell(" 1000 "), Some(1000.0));
        assert_eq!(parse_numeric_cell("€ 1200.50"), Some(1200.5));
        assert_eq!(parse_numeric_cell("12.5%"), Some(12.5));
        assert_eq!(parse_numeric_cell("-3"), Some(-3.0));
        assert_eq!(parse_numeric_cell(""), None);
        assert_eq!(parse_numeric_cell("n/d"), None);
        assert_eq!(parse_numeric_cell("NaN"), None);
        assert_eq!(parse_numeric_cell("inf"), None);
    }

    #[test]
    fn test_is_total_marker() {
        assert!(is_total_marker("Totale"));
        assert!(is_total_marker(" TOTAL "));
        assert!(is_total_marker("Totale 2024"));
        assert!(!is_total_marker("Gennaio"));
        assert!(is_total_marker("Total:"));
        assert!(!is_total_marker("Totally revised"));
        assert!(!is_total_marker("Totalizzatore"));
        assert!(!is_total_marker(""));
    }
}
