//! PDF text and metadata extraction.
//!
//! Page-wise text extraction over `lopdf`, plus the tolerant parser for
//! the legacy PDF date-string format (`D:YYYYMMDDHHmmSSOHH'mm'`) found in
//! document info dictionaries. Pages that cannot be decoded are skipped
//! with a warning; a document with zero readable pages still yields an
//! (empty) result so the caller can apply its own short-circuit rules.

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use lopdf::Object;
use tracing::{debug, warn};

use crate::error::{CollectorError, Result};

/// Everything the Document pipeline derives from raw PDF bytes.
#[derive(Debug, Clone, Default)]
pub struct PdfContent {
    /// Extracted text, one entry per page
    pub pages: Vec<String>,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
}

/// Extract per-page text and info-dictionary dates from raw bytes.
pub fn read_pdf(url: &str, bytes: &[u8]) -> Result<PdfContent> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| CollectorError::Pdf {
        url: url.to_string(),
        message: format!("failed to load PDF: {e}"),
    })?;

    let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
    debug!(url = %url, page_count = page_numbers.len(), "extracting text from PDF");

    let mut pages = Vec::with_capacity(page_numbers.len());
    for page in page_numbers {
        match doc.extract_text(&[page]) {
            Ok(text) => pages.push(text),
            Err(e) => {
                warn!(url = %url, page, error = %e, "failed to extract page text, skipping");
                pages.push(String::new());
            }
        }
    }

    Ok(PdfContent {
        pages,
        created: info_date(&doc, b"CreationDate"),
        modified: info_date(&doc, b"ModDate"),
    })
}

/// Read a date entry from the trailer's Info dictionary.
fn info_date(doc: &lopdf::Document, key: &[u8]) -> Option<DateTime<Utc>> {
    let info = match doc.trailer.get(b"Info").ok()? {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        direct => direct,
    };
    let raw = match info.as_dict().ok()?.get(key).ok()? {
        Object::String(bytes, _) => String::from_utf8_lossy(bytes).into_owned(),
        _ => return None,
    };
    match parse_pdf_date(&raw) {
        Some(parsed) => Some(parsed),
        None => {
            warn!(raw = %raw, "unparsable PDF date string");
            None
        }
    }
}

/// Parse the PDF date-string format `D:YYYYMMDDHHmmSSOHH'mm'`.
///
/// Everything after the year is optional. The offset marker `O` is `+`,
/// `-`, `Z`, or absent; an absent or `Z` offset means UTC.
pub fn parse_pdf_date(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim().strip_prefix("D:").unwrap_or(raw.trim());

    let digits: Vec<u8> = s.bytes().take_while(|b| b.is_ascii_digit()).collect();
    if digits.len() < 4 {
        return None;
    }
    let num = |range: std::ops::Range<usize>, default: u32| -> u32 {
        if digits.len() >= range.end {
            std::str::from_utf8(&digits[range])
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(default)
        } else {
            default
        }
    };

    let year: i32 = std::str::from_utf8(&digits[0..4]).ok()?.parse().ok()?;
    let month = num(4..6, 1).clamp(1, 12);
    let day = num(6..8, 1).clamp(1, 31);
    let hour = num(8..10, 0).min(23);
    let minute = num(10..12, 0).min(59);
    let second = num(12..14, 0).min(59);

    let rest = &s[digits.len().min(s.len())..];
    let offset = parse_offset(rest)?;

    offset
        .with_ymd_and_hms(year, month, day, hour, minute, second)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse the trailing offset part. Empty and `Z` both mean UTC.
fn parse_offset(rest: &str) -> Option<FixedOffset> {
    let utc = FixedOffset::east_opt(0)?;
    let rest = rest.trim_end_matches('\'');
    if rest.is_empty() || rest == "Z" {
        return Some(utc);
    }

    let sign = match rest.as_bytes()[0] {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    let parts: Vec<&str> = rest[1..].split('\'').filter(|p| !p.is_empty()).collect();
    let hours: i32 = parts.first()?.parse().ok()?;
    let minutes: i32 = parts.get(1).and_then(|m| m.parse().ok()).unwrap_or(0);
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_full_date_with_positive_offset() {
        let parsed = parse_pdf_date("D:20240513094512+02'00'").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 5, 13, 7, 45, 12).unwrap());
    }

    #[test]
    fn parses_zulu_and_empty_offset_as_utc() {
        let zulu = parse_pdf_date("D:20240101000000Z").unwrap();
        let bare = parse_pdf_date("D:20240101000000").unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(zulu, expected);
        assert_eq!(bare, expected);
    }

    #[test]
    fn parses_negative_offset() {
        let parsed = parse_pdf_date("D:20231231230000-05'00'").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 1, 1, 4, 0, 0).unwrap());
    }

    #[test]
    fn tolerates_truncated_components() {
        let parsed = parse_pdf_date("D:2024").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_pdf_date("gestern").is_none());
        assert!(parse_pdf_date("D:20@40513").is_none());
        assert!(parse_pdf_date("").is_none());
    }
}
