//! Plain-text extraction for downstream document QA.

use std::collections::BTreeSet;

use lopdf::Document;
use tracing::{debug, warn};

use crate::classify::{is_image_based, SCANNED_TEXT_THRESHOLD};
use crate::error::PdfPrepError;

/// Leading pages [`extract_relevant_pages`] always keeps, keyword hits or
/// not. Financial reports front-load the summary tables QA cares about.
pub const ALWAYS_INCLUDED_PAGES: u32 = 3;

/// Extract the full text of a PDF with per-page markers.
///
/// Tabular lines are linearized into pipe-delimited rows so table structure
/// survives the trip through plain text. Scanned documents yield a notice
/// instead of garbage, and unparseable input yields an empty string.
pub fn extract_text(pdf_bytes: &[u8]) -> String {
    match try_extract_text(pdf_bytes) {
        Ok(text) => text,
        Err(e) => {
            warn!("text extraction failed: {e}");
            String::new()
        }
    }
}

fn try_extract_text(pdf_bytes: &[u8]) -> Result<String, PdfPrepError> {
    let doc =
        Document::load_mem(pdf_bytes).map_err(|e| PdfPrepError::ParseError(e.to_string()))?;

    let mut out = String::new();
    let mut total_chars = 0usize;
    for &page_num in doc.get_pages().keys() {
        let text = doc.extract_text(&[page_num]).unwrap_or_default();
        let text = text.trim();
        total_chars += text.chars().count();
        out.push_str(&format!("--- Page {page_num} ---\n"));
        if text.is_empty() {
            out.push_str("[no extractable text]\n");
        } else {
            out.push_str(&linearize_tabular(text));
            out.push('\n');
        }
    }

    if total_chars < SCANNED_TEXT_THRESHOLD && is_image_based(pdf_bytes) {
        debug!(total_chars, "document looks scanned, emitting notice");
        return Ok(
            "[scanned document: no machine-readable text layer; run OCR before QA]".to_string(),
        );
    }
    Ok(out)
}

/// Build a smaller PDF keeping the first [`ALWAYS_INCLUDED_PAGES`] pages plus
/// every later page whose text matches one of `keywords` (case-insensitive).
///
/// Returns the subset bytes and the kept 1-indexed page numbers. Never
/// fails: unusable input falls back to the full document with an empty page
/// list.
pub fn extract_relevant_pages(pdf_bytes: &[u8], keywords: &[&str]) -> (Vec<u8>, Vec<u32>) {
    match select_pages(pdf_bytes, keywords) {
        Ok(selected) => selected,
        Err(e) => {
            warn!("relevant-page extraction failed, returning full document: {e}");
            (pdf_bytes.to_vec(), Vec::new())
        }
    }
}

fn select_pages(
    pdf_bytes: &[u8],
    keywords: &[&str],
) -> Result<(Vec<u8>, Vec<u32>), PdfPrepError> {
    let doc =
        Document::load_mem(pdf_bytes).map_err(|e| PdfPrepError::ParseError(e.to_string()))?;
    let total_pages = doc.get_pages().len() as u32;

    let keywords: Vec<String> = keywords
        .iter()
        .map(|keyword| keyword.to_lowercase())
        .filter(|keyword| !keyword.is_empty())
        .collect();

    let mut selected: BTreeSet<u32> = (1..=total_pages.min(ALWAYS_INCLUDED_PAGES)).collect();
    for page_num in (ALWAYS_INCLUDED_PAGES + 1)..=total_pages {
        let text = doc
            .extract_text(&[page_num])
            .unwrap_or_default()
            .to_lowercase();
        if keywords.iter().any(|keyword| text.contains(keyword)) {
            selected.insert(page_num);
        }
    }

    if selected.len() as u32 == total_pages {
        return Ok((pdf_bytes.to_vec(), selected.into_iter().collect()));
    }
    debug!(
        total_pages,
        kept = selected.len(),
        "trimming to relevant pages"
    );

    let mut subset = doc.clone();
    // Delete the complement in reverse order so page numbers stay valid.
    let mut pages_to_delete: Vec<u32> = (1..=total_pages)
        .filter(|page_num| !selected.contains(page_num))
        .collect();
    pages_to_delete.reverse();
    for page_num in pages_to_delete {
        subset.delete_pages(&[page_num]);
    }
    subset.prune_objects();
    subset.compress();

    let mut buffer = Vec::new();
    subset
        .save_to(&mut buffer)
        .map_err(|e| PdfPrepError::OperationError(format!("Save failed: {e}")))?;
    Ok((buffer, selected.into_iter().collect()))
}

/// Collapse column-aligned lines into ` | `-delimited rows.
///
/// Extracted table text keeps its column alignment as tabs or runs of
/// spaces; joining cells explicitly stops downstream chunkers from reading
/// one row as several unrelated fragments.
pub(crate) fn linearize_tabular(text: &str) -> String {
    text.lines()
        .map(linearize_line)
        .collect::<Vec<_>>()
        .join("\n")
}

fn linearize_line(line: &str) -> String {
    let cells: Vec<&str> = if line.contains('\t') {
        line.split('\t')
            .map(str::trim)
            .filter(|cell| !cell.is_empty())
            .collect()
    } else {
        split_on_wide_gaps(line)
    };
    if cells.len() >= 2 {
        cells.join(" | ")
    } else {
        line.trim_end().to_string()
    }
}

/// Split a line on runs of two or more spaces.
fn split_on_wide_gaps(line: &str) -> Vec<&str> {
    let mut cells = Vec::new();
    let bytes = line.as_bytes();
    let mut start = 0usize;
    let mut i = 0usize;
    while i < bytes.len() {
        if bytes[i] == b' ' {
            let gap_start = i;
            while i < bytes.len() && bytes[i] == b' ' {
                i += 1;
            }
            if i - gap_start >= 2 {
                let cell = line[start..gap_start].trim();
                if !cell.is_empty() {
                    cells.push(cell);
                }
                start = i;
            }
        } else {
            i += 1;
        }
    }
    let tail = line[start..].trim();
    if !tail.is_empty() {
        cells.push(tail);
    }
    cells
}
