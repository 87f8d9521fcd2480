//! Read-only document inspection
//!
//! Extracts document-level metadata and checks whether bytes load as a PDF.

use crate::document;
use crate::error::PdfError;
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};
use lopdf::{Dictionary, Document, Object};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageDimensions {
    pub width: f32,
    pub height: f32,
}

/// Snapshot of a document's metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfMetadata {
    pub page_count: u32,
    pub title: Option<String>,
    pub author: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<DateTime<FixedOffset>>,
    pub modification_date: Option<DateTime<FixedOffset>>,
    /// Size of the first page
    pub dimensions: PageDimensions,
    pub file_size: usize,
}

/// Outcome of [`validate_pdf`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfValidation {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Read metadata and first-page dimensions.
///
/// Fails if the bytes do not load or the document has no pages.
pub fn get_pdf_metadata(bytes: &[u8]) -> Result<PdfMetadata, PdfError> {
    read_metadata(bytes).map_err(|e| PdfError::Metadata(e.to_string()))
}

fn read_metadata(bytes: &[u8]) -> Result<PdfMetadata, PdfError> {
    let doc = document::load(bytes)?;

    let first_page = *document::page_ids(&doc).first().ok_or(PdfError::NoPages)?;
    let size = document::page_size(&doc, first_page)?;

    let info = info_dictionary(&doc);
    let text = |key: &[u8]| info.and_then(|dict| text_field(&doc, dict, key));

    Ok(PdfMetadata {
        page_count: document::page_count(&doc),
        title: text(b"Title"),
        author: text(b"Author"),
        creator: text(b"Creator"),
        producer: text(b"Producer"),
        creation_date: text(b"CreationDate").and_then(|d| parse_pdf_date(&d)),
        modification_date: text(b"ModDate").and_then(|d| parse_pdf_date(&d)),
        dimensions: PageDimensions {
            width: size.width,
            height: size.height,
        },
        file_size: bytes.len(),
    })
}

/// Check whether the bytes load as a PDF; never fails
pub fn validate_pdf(bytes: &[u8]) -> PdfValidation {
    match document::load(bytes) {
        Ok(_) => PdfValidation {
            is_valid: true,
            error: None,
        },
        Err(e) => PdfValidation {
            is_valid: false,
            error: Some(e.to_string()),
        },
    }
}

/// Parse PDF bytes and return the page count
pub fn page_count(bytes: &[u8]) -> Result<u32, PdfError> {
    Ok(document::page_count(&document::load(bytes)?))
}

fn info_dictionary(doc: &Document) -> Option<&Dictionary> {
    match doc.trailer.get(b"Info").ok()? {
        Object::Reference(id) => doc.get_dictionary(*id).ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

fn text_field(doc: &Document, info: &Dictionary, key: &[u8]) -> Option<String> {
    let value = match info.get(key).ok()? {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    let decoded = decode_text_string(value.as_str().ok()?);
    (!decoded.is_empty()).then_some(decoded)
}

/// Decode a PDF text string: UTF-16BE with a byte order mark, UTF-8 with a
/// BOM, otherwise PDFDocEncoding (read as Latin-1)
pub fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(utf8) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(utf8).into_owned();
    }
    bytes.iter().map(|&b| b as char).collect()
}

/// Parse a PDF date string such as `D:20240131120000+05'30'`.
///
/// Only the year is mandatory; missing fields default to the start of the
/// period and a missing offset is treated as UTC.
pub fn parse_pdf_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let s = raw.trim();
    let s = s.strip_prefix("D:").unwrap_or(s);

    let digits_end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, zone) = s.split_at(digits_end);
    if digits.len() < 4 {
        return None;
    }

    let field = |start: usize, len: usize, default: u32| -> Option<u32> {
        match digits.get(start..start + len) {
            Some(part) => part.parse().ok(),
            None => Some(default),
        }
    };

    let year: i32 = digits[0..4].parse().ok()?;
    let naive = NaiveDate::from_ymd_opt(year, field(4, 2, 1)?, field(6, 2, 1)?)?
        .and_hms_opt(field(8, 2, 0)?, field(10, 2, 0)?, field(12, 2, 0)?)?;

    let offset = parse_offset(zone)?;
    offset.from_local_datetime(&naive).single()
}

fn parse_offset(zone: &str) -> Option<FixedOffset> {
    let mut chars = zone.chars();
    let sign = match chars.next() {
        None | Some('Z') => return FixedOffset::east_opt(0),
        Some('+') => 1,
        Some('-') => -1,
        Some(_) => return None,
    };

    let numbers: Vec<i32> = chars
        .as_str()
        .split('\'')
        .filter(|part| !part.is_empty())
        .map(|part| part.parse().ok())
        .collect::<Option<_>>()?;

    let hours = *numbers.first().unwrap_or(&0);
    let minutes = *numbers.get(1).unwrap_or(&0);
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
