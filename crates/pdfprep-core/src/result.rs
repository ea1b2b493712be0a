//! Result and metadata types returned by the pipeline operations.
//!
//! Everything here is a plain value object: created fresh per call, returned
//! to the caller, never retained by the pipeline. All types serialize so the
//! HTTP layer can hand them straight to clients; raw chunk bytes are skipped
//! during serialization.

use serde::Serialize;

/// Outcome of one `optimize` call.
#[derive(Debug, Clone, Serialize)]
pub struct OptimizationResult {
    pub original_size_bytes: u64,
    pub final_size_bytes: u64,
    /// `final / original`; 1.0 when nothing was done.
    pub compression_ratio: f64,
    /// Names of the compression methods applied, in order.
    pub methods: Vec<String>,
    pub total_pages: Option<u32>,
    /// Image XObjects that were actually replaced with a smaller encoding.
    pub images_recompressed: u32,
    pub is_scanned: bool,
    pub target_dpi: Option<u32>,
    pub jpeg_quality: Option<u8>,
    pub ghostscript_level: Option<String>,
    /// Leading pages retained by the text-only fallback, if it ran.
    pub pages_kept: Option<u32>,
    pub error: Option<String>,
}

impl OptimizationResult {
    pub(crate) fn new(original_size_bytes: u64) -> Self {
        OptimizationResult {
            original_size_bytes,
            final_size_bytes: original_size_bytes,
            compression_ratio: 1.0,
            methods: Vec::new(),
            total_pages: None,
            images_recompressed: 0,
            is_scanned: false,
            target_dpi: None,
            jpeg_quality: None,
            ghostscript_level: None,
            pages_kept: None,
            error: None,
        }
    }

    pub(crate) fn finish(&mut self, final_size_bytes: u64) {
        self.final_size_bytes = final_size_bytes;
        self.compression_ratio = if self.original_size_bytes == 0 {
            1.0
        } else {
            final_size_bytes as f64 / self.original_size_bytes as f64
        };
    }
}

/// Metadata for a single chunk produced by `check_and_split`.
///
/// An unsplit document is represented as one chunk with `part_number = None`.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkMeta {
    pub filename: String,
    pub size_bytes: u64,
    pub pages: u32,
    /// Human-facing 1-indexed inclusive range, e.g. `"11-20"`.
    pub page_range: Option<String>,
    pub part_number: Option<u32>,
    pub total_parts: Option<u32>,
    pub error: Option<String>,
}

/// A chunk's bytes plus its metadata.
#[derive(Debug, Clone, Serialize)]
pub struct PdfChunk {
    #[serde(skip)]
    pub content: Vec<u8>,
    #[serde(flatten)]
    pub meta: ChunkMeta,
}

/// Outcome of one `check_and_split` call.
#[derive(Debug, Clone, Serialize)]
pub struct SplitResult {
    pub original_filename: String,
    pub original_size_bytes: u64,
    pub max_allowed_size_bytes: u64,
    /// Pure function of original size vs. the ceiling.
    pub needs_splitting: bool,
    /// Whether the splitting procedure actually ran.
    pub split_performed: bool,
    pub pages_per_chunk: Option<u32>,
    pub chunks: Vec<ChunkMeta>,
    /// Part numbers of chunks still over the ceiling after splitting.
    pub oversized_parts: Vec<u32>,
}

/// One stage of `prepare_for_submission`, in execution order.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum ProcessingStep {
    Optimize(OptimizationResult),
    SplitCheck(SplitResult),
}

/// Composite outcome of `prepare_for_submission`.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionResult {
    pub filename: String,
    pub processing_steps: Vec<ProcessingStep>,
    pub chunks: Vec<PdfChunk>,
    /// True iff every chunk is within the splitter's ceiling.
    pub ready_for_submission: bool,
}
