//! Human-readable summaries of pipeline results, for logs and operator UIs.

use crate::result::{OptimizationResult, ProcessingStep, SplitResult, SubmissionResult};

/// Render one `optimize` outcome as a short English summary.
pub fn optimization_report(result: &OptimizationResult) -> String {
    let mut lines = vec![format!(
        "Optimization: {} -> {} ({:.1}% of original)",
        format_size(result.original_size_bytes),
        format_size(result.final_size_bytes),
        result.compression_ratio * 100.0
    )];
    if result.methods.is_empty() {
        lines.push("No compression applied (already within target).".to_string());
    } else {
        lines.push(format!("Methods applied: {}", result.methods.join(", ")));
    }
    if result.is_scanned {
        let dpi = result.target_dpi.unwrap_or(0);
        lines.push(format!("Scanned document rebuilt at {dpi} DPI grayscale."));
    }
    if result.images_recompressed > 0 {
        lines.push(format!(
            "{} image(s) re-encoded.",
            result.images_recompressed
        ));
    }
    if let Some(pages_kept) = result.pages_kept {
        lines.push(format!(
            "Text-only fallback kept the first {pages_kept} page(s); formatting was lost."
        ));
    }
    if let Some(error) = &result.error {
        lines.push(format!("Optimization error (original returned): {error}"));
    }
    lines.join("\n")
}

/// Render one `check_and_split` outcome as a short English summary.
pub fn split_report(result: &SplitResult) -> String {
    let mut lines = Vec::new();
    if !result.needs_splitting {
        lines.push(format!(
            "{} is {} and fits the {} ceiling; no split needed.",
            result.original_filename,
            format_size(result.original_size_bytes),
            format_size(result.max_allowed_size_bytes)
        ));
        return lines.join("\n");
    }

    lines.push(format!(
        "{} is {} (ceiling {}); split into {} part(s).",
        result.original_filename,
        format_size(result.original_size_bytes),
        format_size(result.max_allowed_size_bytes),
        result.chunks.len()
    ));
    for chunk in &result.chunks {
        let range = chunk.page_range.as_deref().unwrap_or("-");
        lines.push(format!(
            "  {}: pages {} ({})",
            chunk.filename,
            range,
            format_size(chunk.size_bytes)
        ));
        if let Some(error) = &chunk.error {
            lines.push(format!("    error: {error}"));
        }
    }
    if !result.oversized_parts.is_empty() {
        let parts: Vec<String> = result
            .oversized_parts
            .iter()
            .map(u32::to_string)
            .collect();
        lines.push(format!(
            "Warning: part(s) {} still exceed the ceiling.",
            parts.join(", ")
        ));
    }
    lines.join("\n")
}

/// Render a full `prepare_for_submission` outcome.
pub fn submission_report(result: &SubmissionResult) -> String {
    let mut lines = vec![format!("Submission report for {}:", result.filename)];
    for step in &result.processing_steps {
        let body = match step {
            ProcessingStep::Optimize(optimization) => optimization_report(optimization),
            ProcessingStep::SplitCheck(split) => split_report(split),
        };
        for line in body.lines() {
            lines.push(format!("  {line}"));
        }
    }
    lines.push(if result.ready_for_submission {
        "Ready for submission.".to_string()
    } else {
        "NOT ready for submission; see errors above.".to_string()
    });
    lines.join("\n")
}

fn format_size(bytes: u64) -> String {
    const MIB: f64 = 1024.0 * 1024.0;
    const KIB: f64 = 1024.0;
    let bytes = bytes as f64;
    if bytes >= MIB {
        format!("{:.2} MiB", bytes / MIB)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes / KIB)
    } else {
        format!("{bytes} B")
    }
}
