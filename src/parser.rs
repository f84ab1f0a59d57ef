//! Tolerant parsing of model output back into a [`ForecastTable`].
//!
//! The model is asked for CSV but regularly answers with a Markdown pipe
//! table, wraps the CSV in a code fence, adds a preamble, or emits a few rows
//! with the wrong number of fields. The parser locates the first tabular
//! block, keeps every recoverable row, and only fails when nothing usable is
//! left.

use crate::error::{ForecastError, Result};
use crate::schema::{
    infer_identifier_columns, is_identifier_name, normalize_header, resolve_header, ColumnSchema,
    ForecastKind,
};
use crate::table::{CellValue, ForecastResponse, ForecastTable, TableFormat};
use crate::utils::parse_numeric_cell;
use log::{debug, info, warn};
use std::fmt;

/// Parses a response against an ad-hoc column list. Identifier columns are
/// inferred from the leading column names (see
/// [`crate::schema::IDENTIFIER_NAMES`]).
pub fn parse_response(raw_text: &str, expected_columns: &[&str]) -> Result<ForecastResponse> {
    let layout = Layout {
        columns: expected_columns,
        identifier_columns: infer_identifier_columns(expected_columns),
        aliases: &[],
    };
    layout.parse(raw_text)
}

/// Parses a response against a registered schema, including its alias table.
pub fn parse_with_schema(raw_text: &str, schema: &ColumnSchema) -> Result<ForecastResponse> {
    let layout = Layout {
        columns: schema.columns,
        identifier_columns: schema.identifier_columns,
        aliases: schema.aliases,
    };
    layout.parse(raw_text)
}

/// Parses a forecast returned for a prompt built from a `kind` request.
pub fn parse_forecast(raw_text: &str, kind: ForecastKind) -> Result<ForecastResponse> {
    parse_with_schema(raw_text, kind.schema())
}

struct Layout<'a> {
    columns: &'a [&'a str],
    identifier_columns: usize,
    aliases: &'a [(&'a str, &'a str)],
}

/// A contiguous run of tabular lines in the response.
struct Block {
    format: TableFormat,
    /// Index one past the last line of the block.
    end: usize,
    /// Whether the first row is followed by a Markdown separator row.
    has_separator: bool,
    /// Split rows, separator rows removed. `None` marks a line that could not
    /// be split at all.
    rows: Vec<(usize, Option<Vec<String>>)>,
}

#[derive(Debug)]
enum RowError {
    Unreadable,
    FieldCount { found: usize, expected: usize },
    NotNumeric { column: String, value: String },
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowError::Unreadable => write!(f, "line could not be split into fields"),
            RowError::FieldCount { found, expected } => {
                write!(f, "{} fields, expected {}", found, expected)
            }
            RowError::NotNumeric { column, value } => {
                write!(f, "'{}' in column {} is not a number", value, column)
            }
        }
    }
}

impl Layout<'_> {
    fn parse(&self, raw_text: &str) -> Result<ForecastResponse> {
        let expected = self.columns.len();
        if expected == 0 {
            return Err(ForecastError::Parse(
                "No expected columns were supplied".to_string(),
            ));
        }

        let lines: Vec<&str> = raw_text.lines().collect();
        let mut from = 0;
        let mut first_error = None;

        // The first block with at least one usable row wins.
        while let Some(block) = self.locate_block(&lines, from) {
            debug!(
                "Detected {:?} table with {} candidate rows ending at line {}",
                block.format,
                block.rows.len(),
                block.end
            );
            from = block.end;

            match self.parse_block(&lines, &block) {
                Ok(response) => return Ok(response),
                Err(err) => {
                    debug!("Skipping unusable block ending at line {}: {}", block.end, err);
                    first_error.get_or_insert(err);
                }
            }
        }

        Err(first_error.unwrap_or_else(|| {
            ForecastError::Parse(format!(
                "No CSV or Markdown table with {} columns found in the response",
                expected
            ))
        }))
    }

    fn parse_block(&self, lines: &[&str], block: &Block) -> Result<ForecastResponse> {
        let expected = self.columns.len();
        let header = self.header(block);
        let columns: Vec<String> = match &header {
            Some(names) if names.len() == expected => names
                .iter()
                .map(|name| resolve_header(name, self.columns, self.aliases))
                .collect(),
            _ => self.columns.iter().map(|c| c.to_string()).collect(),
        };

        let data_rows = if header.is_some() {
            &block.rows[1..]
        } else {
            &block.rows[..]
        };

        let mut rows = Vec::with_capacity(data_rows.len());
        let mut candidates = 0usize;
        let mut dropped = 0usize;
        for (line_no, fields) in data_rows {
            if let (Some(fields), Some(header)) = (fields, &header) {
                if is_repeated_header(fields, header) {
                    continue;
                }
            }
            candidates += 1;

            match self.coerce_row(fields.as_deref(), &columns) {
                Ok(row) => rows.push(row),
                Err(err) => {
                    dropped += 1;
                    warn!("Dropping malformed row at line {}: {}", line_no + 1, err);
                }
            }
        }

        if candidates == 0 {
            return Err(ForecastError::Parse(
                "The table has a header but no data rows".to_string(),
            ));
        }
        if rows.is_empty() {
            return Err(ForecastError::Parse(format!(
                "All {} rows of the table are malformed",
                candidates
            )));
        }

        let explanation = explanation_after(lines, block.end);
        info!(
            "Parsed {} rows from {:?} table ({} dropped, explanation: {})",
            rows.len(),
            block.format,
            dropped,
            explanation.as_ref().map_or(0, String::len)
        );

        let table = ForecastTable::new(columns, self.identifier_columns, rows)?;
        Ok(ForecastResponse {
            table,
            explanation,
            format: block.format,
            dropped_rows: dropped,
        })
    }

    /// Finds the first Markdown or CSV block at or after line `from`. A CSV
    /// block starts at a line whose field count equals the expected width and
    /// runs over the following non-blank lines that still look like CSV.
    fn locate_block(&self, lines: &[&str], from: usize) -> Option<Block> {
        let expected = self.columns.len();
        for (start, raw) in lines.iter().enumerate().skip(from) {
            let line = raw.trim();
            if line.is_empty() || is_fence(line) {
                continue;
            }

            if is_markdown_row(line) {
                return Some(markdown_block(lines, start));
            }
            if !is_csv_line(line, expected) {
                continue;
            }

            match csv_fields(line) {
                Some(fields) if fields.len() == expected => {
                    if self.is_prose(&fields) {
                        debug!("Line {} splits into {} fields but reads as prose", start + 1, expected);
                        continue;
                    }
                    return Some(csv_block(lines, start, expected));
                }
                _ => continue,
            }
        }
        None
    }

    /// A sentence with the right number of commas: no numeric field and no
    /// field naming a known column.
    fn is_prose(&self, fields: &[String]) -> bool {
        fields.iter().all(|f| parse_numeric_cell(f).is_none())
            && !fields.iter().any(|f| self.is_known_header(f))
    }

    fn is_known_header(&self, name: &str) -> bool {
        let normalized = normalize_header(name);
        is_identifier_name(name)
            || self
                .columns
                .iter()
                .any(|c| normalize_header(c) == normalized)
            || self
                .aliases
                .iter()
                .any(|(alias, _)| normalize_header(alias) == normalized)
    }

    /// First row is a header when a Markdown separator follows it, or when
    /// none of its fields is numeric.
    fn header(&self, block: &Block) -> Option<Vec<String>> {
        let (_, first) = block.rows.first()?;
        let first = first.as_ref()?;

        if block.has_separator {
            return Some(first.clone());
        }
        let all_text = first.iter().all(|f| parse_numeric_cell(f).is_none());
        (all_text && first.len() == self.columns.len()).then(|| first.clone())
    }

    fn coerce_row(
        &self,
        fields: Option<&[String]>,
        columns: &[String],
    ) -> std::result::Result<Vec<CellValue>, RowError> {
        let fields = fields.ok_or(RowError::Unreadable)?;
        if fields.len() != columns.len() {
            return Err(RowError::FieldCount {
                found: fields.len(),
                expected: columns.len(),
            });
        }

        fields
            .iter()
            .zip(columns)
            .enumerate()
            .map(|(idx, (field, column))| {
                if idx < self.identifier_columns {
                    return Ok(field
                        .parse::<i64>()
                        .map(CellValue::Integer)
                        .unwrap_or_else(|_| CellValue::Text(field.clone())));
                }
                parse_numeric_cell(field)
                    .map(CellValue::Number)
                    .ok_or_else(|| RowError::NotNumeric {
                        column: column.clone(),
                        value: field.clone(),
                    })
            })
            .collect()
    }
}

fn is_fence(line: &str) -> bool {
    line.starts_with("```")
}

fn is_markdown_row(line: &str) -> bool {
    line.len() >= 2 && line.starts_with('|') && line.ends_with('|')
}

fn is_separator_row(cells: &[String]) -> bool {
    !cells.is_empty()
        && cells.iter().all(|cell| {
            cell.contains('-') && cell.chars().all(|c| matches!(c, '-' | ':' | ' '))
        })
}

fn markdown_cells(line: &str) -> Vec<String> {
    let inner = &line[1..line.len() - 1];
    inner.split('|').map(clean_markdown_cell).collect()
}

fn clean_markdown_cell(cell: &str) -> String {
    let mut cell = cell.trim();
    for marker in ["**", "__"] {
        if cell.len() > 2 * marker.len() && cell.starts_with(marker) && cell.ends_with(marker) {
            cell = cell[marker.len()..cell.len() - marker.len()].trim();
        }
    }
    cell.to_string()
}

fn csv_fields(line: &str) -> Option<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(line.as_bytes());
    let record = reader.records().next()?.ok()?;
    Some(record.iter().map(str::to_string).collect())
}

fn is_repeated_header(fields: &[String], header: &[String]) -> bool {
    fields.len() == header.len()
        && fields
            .iter()
            .zip(header)
            .all(|(f, h)| normalize_header(f) == normalize_header(h))
}

fn markdown_block(lines: &[&str], start: usize) -> Block {
    let mut rows = Vec::new();
    let mut has_separator = false;
    let mut end = start;

    for (idx, raw) in lines.iter().enumerate().skip(start) {
        let line = raw.trim();
        if !is_markdown_row(line) {
            break;
        }
        end = idx + 1;

        let cells = markdown_cells(line);
        if is_separator_row(&cells) {
            if rows.len() == 1 {
                has_separator = true;
            }
            continue;
        }
        rows.push((idx, Some(cells)));
    }

    Block {
        format: TableFormat::Markdown,
        end,
        has_separator,
        rows,
    }
}

/// A line that may belong to a CSV block. Single-column CSV has no commas.
fn is_csv_line(line: &str, expected: usize) -> bool {
    !line.is_empty()
        && !is_fence(line)
        && !is_markdown_row(line)
        && (expected == 1 || line.contains(','))
}

fn csv_block(lines: &[&str], start: usize, expected: usize) -> Block {
    let mut rows = Vec::new();
    let mut end = start;

    for (idx, raw) in lines.iter().enumerate().skip(start) {
        let line = raw.trim();
        if !is_csv_line(line, expected) {
            break;
        }
        end = idx + 1;
        rows.push((idx, csv_fields(line)));
    }

    Block {
        format: TableFormat::Csv,
        end,
        has_separator: false,
        rows,
    }
}

/// Text after the block, with fences and surrounding blank lines removed.
fn explanation_after(lines: &[&str], end: usize) -> Option<String> {
    let rest: Vec<&str> = lines[end..]
        .iter()
        .copied()
        .skip_while(|l| l.trim().is_empty() || is_fence(l.trim()))
        .collect();
    let text = rest.join("\n");
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
