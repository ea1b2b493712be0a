//! Scanned-document detection.
//!
//! A PDF counts as "scanned" when it carries almost no extractable text but
//! does embed at least one raster image. The signal is heuristic: a false
//! verdict sends the document down the standard path, which is always safe.

use lopdf::{Document, Object};
use tracing::{debug, warn};

use crate::error::PdfPrepError;

/// Documents with fewer extractable characters than this (after trimming
/// whitespace) are candidates for the scanned path. Tunable, not validated
/// against a labeled corpus.
pub const SCANNED_TEXT_THRESHOLD: usize = 100;

/// Check whether a PDF is primarily image-based (a scanned document).
///
/// Returns `false` on corrupt or unparseable input so that broken documents
/// fall through to the standard optimization path.
pub fn is_image_based(pdf_bytes: &[u8]) -> bool {
    match analyze(pdf_bytes) {
        Ok((text_chars, images)) => {
            let scanned = text_chars < SCANNED_TEXT_THRESHOLD && images > 0;
            debug!(text_chars, images, scanned, "classified PDF content");
            scanned
        }
        Err(e) => {
            warn!("content classification failed, assuming text PDF: {e}");
            false
        }
    }
}

/// Count trimmed text characters and embedded raster images.
fn analyze(pdf_bytes: &[u8]) -> Result<(usize, usize), PdfPrepError> {
    let doc =
        Document::load_mem(pdf_bytes).map_err(|e| PdfPrepError::ParseError(e.to_string()))?;

    let mut text_chars = 0usize;
    for &page_num in doc.get_pages().keys() {
        // Pages without decodable text contribute nothing.
        let text = doc.extract_text(&[page_num]).unwrap_or_default();
        text_chars += text.trim().chars().count();
    }

    Ok((text_chars, count_image_xobjects(&doc)))
}

/// Number of Image XObject streams anywhere in the document.
pub(crate) fn count_image_xobjects(doc: &Document) -> usize {
    doc.objects
        .values()
        .filter(|object| is_image_stream(object))
        .count()
}

pub(crate) fn is_image_stream(object: &Object) -> bool {
    match object {
        Object::Stream(stream) => matches!(
            stream.dict.get(b"Subtype"),
            Ok(Object::Name(name)) if name == b"Image"
        ),
        _ => false,
    }
}
