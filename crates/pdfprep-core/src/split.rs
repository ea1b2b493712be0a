//! Size-ceiling check and page-contiguous PDF splitting.
//!
//! Splitting is best-effort: chunks are built from fixed page groups, so a
//! chunk can still exceed the ceiling (one giant scanned page, say). That is
//! reported, never raised. Callers can react by recomputing a smaller
//! `pages_per_chunk` with [`calculate_optimal_chunk_size`] and resubmitting.

use std::path::Path;

use lopdf::Document;
use tracing::{info, warn};

use crate::error::PdfPrepError;
use crate::result::{ChunkMeta, PdfChunk, SplitResult};

/// Default payload ceiling accepted by the downstream model API.
pub const DEFAULT_MAX_PAYLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Default page count per chunk when the caller does not override it.
pub const DEFAULT_PAGES_PER_CHUNK: u32 = 20;

/// Caller-supplied splitting policy.
#[derive(Debug, Clone)]
pub struct SplitLimits {
    pub max_payload_bytes: u64,
    pub pages_per_chunk: Option<u32>,
}

impl Default for SplitLimits {
    fn default() -> Self {
        SplitLimits {
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            pages_per_chunk: None,
        }
    }
}

/// Check a PDF against the size ceiling and split it when it exceeds one.
///
/// Never fails: corrupt input or a mid-split error falls back to a single
/// chunk carrying the original bytes and an `error` annotation.
pub fn check_and_split(
    pdf_bytes: &[u8],
    filename: &str,
    limits: &SplitLimits,
) -> (Vec<PdfChunk>, SplitResult) {
    let original_size = pdf_bytes.len() as u64;
    let needs_splitting = original_size > limits.max_payload_bytes;

    let mut result = SplitResult {
        original_filename: filename.to_string(),
        original_size_bytes: original_size,
        max_allowed_size_bytes: limits.max_payload_bytes,
        needs_splitting,
        split_performed: false,
        pages_per_chunk: None,
        chunks: Vec::new(),
        oversized_parts: Vec::new(),
    };

    if !needs_splitting {
        info!(
            filename,
            size = original_size,
            "PDF within size limit, no split needed"
        );
        let chunk = whole_document_chunk(pdf_bytes, filename, None);
        result.chunks.push(chunk.meta.clone());
        return (vec![chunk], result);
    }

    let pages_per_chunk = limits.pages_per_chunk.unwrap_or(DEFAULT_PAGES_PER_CHUNK);
    warn!(
        filename,
        size = original_size,
        ceiling = limits.max_payload_bytes,
        "PDF exceeds size limit, splitting"
    );

    match split_pdf(pdf_bytes, filename, pages_per_chunk) {
        Ok(chunks) => {
            result.split_performed = true;
            result.pages_per_chunk = Some(pages_per_chunk);
            for chunk in &chunks {
                if chunk.meta.size_bytes > limits.max_payload_bytes {
                    warn!(
                        filename = %chunk.meta.filename,
                        size = chunk.meta.size_bytes,
                        "chunk still exceeds the ceiling after splitting"
                    );
                    if let Some(part) = chunk.meta.part_number {
                        result.oversized_parts.push(part);
                    }
                }
                result.chunks.push(chunk.meta.clone());
            }
            (chunks, result)
        }
        Err(e) => {
            warn!("split failed, returning original document: {e}");
            let chunk = whole_document_chunk(pdf_bytes, filename, Some(e.to_string()));
            result.chunks.push(chunk.meta.clone());
            (vec![chunk], result)
        }
    }
}

/// Estimate how many pages per chunk would land near `target_chunk_size_bytes`.
///
/// Pure estimation based on the document's average page size, clamped to
/// `[1, 100]`. Unparseable input falls back to the default.
pub fn calculate_optimal_chunk_size(pdf_bytes: &[u8], target_chunk_size_bytes: u64) -> u32 {
    let total_pages = match Document::load_mem(pdf_bytes) {
        Ok(doc) => doc.get_pages().len() as u64,
        Err(e) => {
            warn!("cannot estimate chunk size: {e}");
            return DEFAULT_PAGES_PER_CHUNK;
        }
    };
    if total_pages == 0 || pdf_bytes.is_empty() {
        return DEFAULT_PAGES_PER_CHUNK;
    }

    let avg_page_bytes = pdf_bytes.len() as u64 / total_pages;
    let optimal = if avg_page_bytes == 0 {
        100
    } else {
        (target_chunk_size_bytes / avg_page_bytes).clamp(1, 100) as u32
    };
    info!(optimal, "calculated optimal pages per chunk");
    optimal
}

/// Partition `[0, total_pages)` into half-open ranges of `pages_per_chunk`.
pub(crate) fn chunk_ranges(total_pages: u32, pages_per_chunk: u32) -> Vec<(u32, u32)> {
    assert!(pages_per_chunk > 0, "pages_per_chunk must be positive");
    let mut ranges = Vec::new();
    let mut start = 0;
    while start < total_pages {
        let end = (start + pages_per_chunk).min(total_pages);
        ranges.push((start, end));
        start = end;
    }
    ranges
}

/// Build a new document containing pages `[start, end)` (0-based) of `doc`.
pub(crate) fn extract_page_range(
    doc: &Document,
    start: u32,
    end: u32,
) -> Result<Vec<u8>, PdfPrepError> {
    let page_count = doc.get_pages().len() as u32;
    if start >= end || end > page_count {
        return Err(PdfPrepError::InvalidRange(format!(
            "range [{start}, {end}) does not fit a {page_count}-page document"
        )));
    }

    let mut new_doc = doc.clone();

    // Delete the complement in reverse order so page numbers stay valid.
    let mut pages_to_delete: Vec<u32> = (1..=page_count)
        .filter(|&p| p <= start || p > end)
        .collect();
    pages_to_delete.reverse();
    for page_num in pages_to_delete {
        new_doc.delete_pages(&[page_num]);
    }

    new_doc.prune_objects();
    new_doc.compress();

    let mut buffer = Vec::new();
    new_doc
        .save_to(&mut buffer)
        .map_err(|e| PdfPrepError::OperationError(format!("Save failed: {e}")))?;
    Ok(buffer)
}

fn split_pdf(
    pdf_bytes: &[u8],
    filename: &str,
    pages_per_chunk: u32,
) -> Result<Vec<PdfChunk>, PdfPrepError> {
    if pages_per_chunk == 0 {
        return Err(PdfPrepError::InvalidConfig(
            "pages_per_chunk must be at least 1".into(),
        ));
    }
    let doc =
        Document::load_mem(pdf_bytes).map_err(|e| PdfPrepError::ParseError(e.to_string()))?;
    let total_pages = doc.get_pages().len() as u32;
    if total_pages == 0 {
        return Err(PdfPrepError::OperationError(
            "document has no pages".into(),
        ));
    }

    let ranges = chunk_ranges(total_pages, pages_per_chunk);
    let total_parts = ranges.len() as u32;
    let (base, ext) = split_filename(filename);

    info!(
        filename,
        total_parts, pages_per_chunk, "splitting PDF into chunks"
    );

    let mut chunks = Vec::with_capacity(ranges.len());
    for (index, &(start, end)) in ranges.iter().enumerate() {
        let content = extract_page_range(&doc, start, end)?;
        let part_number = index as u32 + 1;
        let meta = ChunkMeta {
            filename: format!("{base}_part_{part_number}_of_{total_parts}{ext}"),
            size_bytes: content.len() as u64,
            pages: end - start,
            page_range: Some(format!("{}-{}", start + 1, end)),
            part_number: Some(part_number),
            total_parts: Some(total_parts),
            error: None,
        };
        info!(
            filename = %meta.filename,
            size = meta.size_bytes,
            range = meta.page_range.as_deref().unwrap_or(""),
            "created chunk"
        );
        chunks.push(PdfChunk { content, meta });
    }

    Ok(chunks)
}

fn whole_document_chunk(pdf_bytes: &[u8], filename: &str, error: Option<String>) -> PdfChunk {
    let pages = Document::load_mem(pdf_bytes)
        .map(|doc| doc.get_pages().len() as u32)
        .unwrap_or(0);
    PdfChunk {
        content: pdf_bytes.to_vec(),
        meta: ChunkMeta {
            filename: filename.to_string(),
            size_bytes: pdf_bytes.len() as u64,
            pages,
            page_range: None,
            part_number: None,
            total_parts: None,
            error,
        },
    }
}

fn split_filename(filename: &str) -> (String, String) {
    let path = Path::new(filename);
    let base = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string());
    let ext = path
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_else(|| ".pdf".to_string());
    (base, ext)
}
