//! End-to-end coordinator: optimize when oversized, then split what remains.

use tracing::info;

use crate::optimize::{optimize, OptimizeOptions};
use crate::result::{ProcessingStep, SubmissionResult};
use crate::split::{check_and_split, SplitLimits};

/// Policy for one `prepare_for_submission` call.
#[derive(Debug, Clone)]
pub struct SubmissionOptions {
    /// Attempt optimization before splitting. Splitting alone still runs
    /// when disabled.
    pub optimize: bool,
    /// Optimizer policy; its target defaults to the splitter's ceiling.
    pub optimize_options: OptimizeOptions,
    pub split_limits: SplitLimits,
}

impl Default for SubmissionOptions {
    fn default() -> Self {
        SubmissionOptions {
            optimize: true,
            optimize_options: OptimizeOptions::default(),
            split_limits: SplitLimits::default(),
        }
    }
}

/// Prepare a PDF for a size-limited upstream API.
///
/// When enabled, the optimizer always runs first (it no-ops cheaply below
/// its own target, which may differ from the splitter's ceiling); whatever
/// remains over the ceiling is split into page-contiguous chunks. Never
/// fails: degraded outcomes surface in the processing steps, and the chunk
/// list always carries usable bytes.
pub fn prepare_for_submission(
    pdf_bytes: &[u8],
    filename: &str,
    opts: &SubmissionOptions,
) -> SubmissionResult {
    info!(
        filename,
        size = pdf_bytes.len(),
        "preparing document for submission"
    );

    let mut processing_steps = Vec::new();
    let mut current = pdf_bytes.to_vec();

    if opts.optimize {
        let optimize_opts = OptimizeOptions {
            target_size_bytes: opts
                .optimize_options
                .target_size_bytes
                .or(Some(opts.split_limits.max_payload_bytes)),
            ..opts.optimize_options.clone()
        };
        let (bytes, result) = optimize(&current, &optimize_opts);
        processing_steps.push(ProcessingStep::Optimize(result));
        current = bytes;
    }

    let (chunks, split_result) = check_and_split(&current, filename, &opts.split_limits);
    let ready_for_submission = split_result.oversized_parts.is_empty()
        && chunks.iter().all(|chunk| chunk.meta.error.is_none());
    processing_steps.push(ProcessingStep::SplitCheck(split_result));

    info!(
        filename,
        chunks = chunks.len(),
        ready_for_submission,
        "submission preparation finished"
    );
    SubmissionResult {
        filename: filename.to_string(),
        processing_steps,
        chunks,
        ready_for_submission,
    }
}
