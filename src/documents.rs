//! Text extraction from uploaded balance sheets and trial balances.
//!
//! The returned text is opaque to the rest of the crate: it is either fed to
//! the figure-extraction prompt or placed in a forecast prompt as context.

use crate::error::{ForecastError, Result};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::{Cursor, Read};
use std::path::Path;
use zip::ZipArchive;

/// Cap on the decompressed size of `word/document.xml`.
const MAX_DOCX_XML_SIZE: u64 = 64 * 1024 * 1024;

static XML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));
static PARAGRAPH_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</w:p>|<w:br\s*/>|<w:cr\s*/>").expect("valid regex"));
static TAB: Lazy<Regex> = Lazy::new(|| Regex::new(r"<w:tab\s*/>").expect("valid regex"));
static CHAR_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&#(?:[xX]([0-9a-fA-F]+)|([0-9]+));").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Xlsx,
    Xls,
    Text,
}

impl DocumentFormat {
    /// Accepts `pdf`, `.PDF`, `docx`, `xlsx`, `xls`, `txt` and `csv`.
    pub fn from_extension(extension: &str) -> Result<Self> {
        let normalized = extension.trim().trim_start_matches('.').to_lowercase();
        match normalized.as_str() {
            "pdf" => Ok(DocumentFormat::Pdf),
            "docx" => Ok(DocumentFormat::Docx),
            "xlsx" => Ok(DocumentFormat::Xlsx),
            "xls" => Ok(DocumentFormat::Xls),
            "txt" | "csv" => Ok(DocumentFormat::Text),
            _ => Err(ForecastError::UnsupportedFormat(format!(
                "'{}' (supported: pdf, docx, xlsx, xls, txt, csv)",
                extension
            ))),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ForecastError::UnsupportedFormat(format!("{} has no file extension", path.display()))
        })?;
        Self::from_extension(extension)
    }
}

pub fn extract_text(bytes: &[u8], extension: &str) -> Result<String> {
    let format = DocumentFormat::from_extension(extension)?;
    debug!("Extracting text from {} bytes as {:?}", bytes.len(), format);

    let text = match format {
        DocumentFormat::Pdf => pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| ForecastError::Document(format!("PDF: {}", e)))?,
        DocumentFormat::Docx => docx_text(bytes)?,
        DocumentFormat::Xlsx | DocumentFormat::Xls => workbook_text(bytes)?,
        DocumentFormat::Text => String::from_utf8(bytes.to_vec())
            .map_err(|e| ForecastError::Document(format!("text is not valid UTF-8: {}", e)))?,
    };

    info!("Extracted {} characters of text ({:?})", text.len(), format);
    Ok(text)
}

pub fn extract_text_from_path(path: &Path) -> Result<String> {
    let format = DocumentFormat::from_path(path)?;
    let bytes = std::fs::read(path)?;
    let extension = match format {
        DocumentFormat::Pdf => "pdf",
        DocumentFormat::Docx => "docx",
        DocumentFormat::Xlsx => "xlsx",
        DocumentFormat::Xls => "xls",
        DocumentFormat::Text => "txt",
    };
    extract_text(&bytes, extension)
}

fn docx_text(bytes: &[u8]) -> Result<String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ForecastError::Document(format!("DOCX is not a valid archive: {}", e)))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|e| ForecastError::Document(format!("DOCX has no document body: {}", e)))?;

    if entry.size() > MAX_DOCX_XML_SIZE {
        return Err(ForecastError::Document(format!(
            "DOCX body too large: {} MB (max {} MB)",
            entry.size() / (1024 * 1024),
            MAX_DOCX_XML_SIZE / (1024 * 1024)
        )));
    }

    let mut xml = String::new();
    entry.take(MAX_DOCX_XML_SIZE).read_to_string(&mut xml)?;
    Ok(docx_xml_to_text(&xml))
}

fn docx_xml_to_text(xml: &str) -> String {
    let with_breaks = PARAGRAPH_END.replace_all(xml, "\n");
    let with_tabs = TAB.replace_all(&with_breaks, "\t");
    let stripped = XML_TAG.replace_all(&with_tabs, "");
    let text = unescape_xml(&stripped);

    text.lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Named entities and `&#NNN;` / `&#xHH;` references. `&amp;` goes last so
/// an escaped `&amp;#224;` stays literal.
fn unescape_xml(text: &str) -> String {
    let named = text
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'");

    let decoded = CHAR_REF.replace_all(&named, |caps: &regex::Captures| {
        let code = match (caps.get(1), caps.get(2)) {
            (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
            (None, Some(dec)) => dec.as_str().parse::<u32>().ok(),
            (None, None) => None,
        };
        code.and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    });

    decoded.replace("&amp;", "&")
}

/// One line per non-empty row across all sheets, cells joined by a space.
fn workbook_text(bytes: &[u8]) -> Result<String> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| ForecastError::Document(format!("spreadsheet: {}", e)))?;

    let mut text = String::new();
    for sheet in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&sheet)
            .map_err(|e| ForecastError::Document(format!("sheet '{}': {}", sheet, e)))?;

        for row in range.rows() {
            let cells: Vec<String> = row
                .iter()
                .filter(|cell| !matches!(cell, Data::Empty))
                .map(ToString::to_string)
                .collect();
            if !cells.is_empty() {
                text.push_str(&cells.join(" "));
                text.push('\n');
            }
        }
    }
    Ok(text)
}
