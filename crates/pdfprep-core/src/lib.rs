//! PDF size adaptation for a document-QA backend
//!
//! Portfolio-company financial reports routinely exceed the payload ceiling
//! of the upstream model API. This crate shrinks them to fit:
//!
//! - `classify::is_image_based`: scanned-document detection
//! - `optimize::optimize`: multi-strategy size reduction
//! - `split::check_and_split`: page-contiguous splitting for what remains
//! - `pipeline::prepare_for_submission`: the two stages wired together
//!
//! Every operation is best-effort: degraded conditions are reported on the
//! result objects rather than raised, and callers always get usable bytes
//! back.

pub mod classify;
pub mod error;
pub mod external;
pub mod extract;
mod images;
pub mod optimize;
pub mod pipeline;
pub mod report;
pub mod result;
pub mod split;

#[cfg(test)]
pub(crate) mod testsupport;

pub use classify::is_image_based;
pub use error::PdfPrepError;
pub use extract::{extract_relevant_pages, extract_text};
pub use optimize::{optimize, CompressionLevel, OptimizeOptions};
pub use pipeline::{prepare_for_submission, SubmissionOptions};
pub use result::{
    ChunkMeta, OptimizationResult, PdfChunk, ProcessingStep, SplitResult, SubmissionResult,
};
pub use split::{calculate_optimal_chunk_size, check_and_split, SplitLimits};

/// Parse PDF bytes and return page count
pub fn get_page_count(bytes: &[u8]) -> Result<u32, PdfPrepError> {
    let doc =
        lopdf::Document::load_mem(bytes).map_err(|e| PdfPrepError::ParseError(e.to_string()))?;
    Ok(doc.get_pages().len() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testsupport::{create_image_pdf, create_text_pdf};

    #[test]
    fn test_page_count_text_pdf() {
        let pdf = create_text_pdf(5, "Counting", 0);
        assert_eq!(get_page_count(&pdf).unwrap(), 5);
    }

    #[test]
    fn test_page_count_image_pdf() {
        let pdf = create_image_pdf(2);
        assert_eq!(get_page_count(&pdf).unwrap(), 2);
    }

    #[test]
    fn test_page_count_rejects_garbage() {
        assert!(get_page_count(b"garbage").is_err());
    }

    #[test]
    fn full_pipeline_on_an_oversized_text_report() {
        let pdf = create_text_pdf(50, "Consolidated statement of operations", 4 * 1024);
        let opts = SubmissionOptions {
            optimize_options: OptimizeOptions {
                use_ghostscript: false,
                ..Default::default()
            },
            split_limits: SplitLimits {
                max_payload_bytes: 16 * 1024,
                pages_per_chunk: None,
            },
            ..Default::default()
        };
        let result = prepare_for_submission(&pdf, "statement.pdf", &opts);

        assert!(!result.chunks.is_empty());
        for chunk in &result.chunks {
            assert!(chunk.meta.error.is_none());
            assert!(get_page_count(&chunk.content).unwrap() > 0);
        }
    }
}
