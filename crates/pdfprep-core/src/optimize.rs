//! Multi-strategy PDF size optimization.
//!
//! Strategy order for text documents: structural image re-encode and stream
//! deflation, then Ghostscript (when the host has it), then the aggressive
//! fallback. Each stage runs only while the result is still over the target,
//! and a stage's output is accepted only when strictly smaller. Scanned
//! documents take a dedicated single-pass page rebuild instead; the
//! structural and text-aware stages have nothing to offer them.
//!
//! Optimization never corrupts the source: any failure returns the original
//! bytes with the error recorded on the [`OptimizationResult`].

use image::imageops::FilterType;
use image::DynamicImage;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::classify::is_image_based;
use crate::error::PdfPrepError;
use crate::external::{compress_with_ghostscript, ghostscript_available};
use crate::extract::linearize_tabular;
use crate::images::{decode_image_stream, encode_jpeg_xobject, recode_image, RecodeSettings};
use crate::result::OptimizationResult;
use crate::split::DEFAULT_MAX_PAYLOAD_BYTES;

const SCANNED_TARGET_DPI: u32 = 150;
const SCANNED_JPEG_QUALITY: u8 = 85;
const STRUCTURAL_MAX_DIMENSION: u32 = 1200;
const STRUCTURAL_JPEG_QUALITY: u8 = 85;
const AGGRESSIVE_IMAGE_SCALE: f32 = 0.25;
const AGGRESSIVE_JPEG_QUALITY: u8 = 30;
/// Safety margin on the page budget of the text-only fallback.
const TEXT_FALLBACK_MARGIN: f64 = 0.8;

const TEXT_PAGE_WIDTH: f32 = 595.0; // A4
const TEXT_PAGE_HEIGHT: f32 = 842.0;
const TEXT_MARGIN: f32 = 40.0;
const TEXT_FONT_SIZE: u32 = 9;
const TEXT_LEADING: f32 = 11.0;
const TEXT_MAX_CHARS_PER_LINE: usize = 100;

/// Ghostscript quality profiles, least to most aggressive: `prepress` keeps
/// the most detail, `ultra_low` forces 36 DPI grayscale output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionLevel {
    Screen,
    #[default]
    Ebook,
    Printer,
    Prepress,
    UltraLow,
}

impl CompressionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionLevel::Screen => "screen",
            CompressionLevel::Ebook => "ebook",
            CompressionLevel::Printer => "printer",
            CompressionLevel::Prepress => "prepress",
            CompressionLevel::UltraLow => "ultra_low",
        }
    }

    /// The `-dPDFSETTINGS` profile. UltraLow rides on `/screen` plus extra
    /// downsampling flags supplied by the invocation itself.
    pub(crate) fn pdfsettings(&self) -> &'static str {
        match self {
            CompressionLevel::Screen | CompressionLevel::UltraLow => "/screen",
            CompressionLevel::Ebook => "/ebook",
            CompressionLevel::Printer => "/printer",
            CompressionLevel::Prepress => "/prepress",
        }
    }
}

/// Caller-supplied optimization policy.
#[derive(Debug, Clone)]
pub struct OptimizeOptions {
    /// Defaults to [`DEFAULT_MAX_PAYLOAD_BYTES`] when unset.
    pub target_size_bytes: Option<u64>,
    pub level: CompressionLevel,
    pub use_ghostscript: bool,
    /// Skip classification and force the scanned-document path.
    pub force_scanned: bool,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        OptimizeOptions {
            target_size_bytes: None,
            level: CompressionLevel::default(),
            use_ghostscript: true,
            force_scanned: false,
        }
    }
}

/// Shrink a PDF toward the target size.
///
/// Never fails: degraded outcomes are reported through the result object and
/// the original bytes are returned untouched when nothing better exists.
pub fn optimize(pdf_bytes: &[u8], opts: &OptimizeOptions) -> (Vec<u8>, OptimizationResult) {
    let original_size = pdf_bytes.len() as u64;
    let target = opts.target_size_bytes.unwrap_or(DEFAULT_MAX_PAYLOAD_BYTES);
    let mut result = OptimizationResult::new(original_size);

    if original_size <= target {
        debug!(original_size, target, "already within target, nothing to do");
        return (pdf_bytes.to_vec(), result);
    }

    match run_pipeline(pdf_bytes, target, opts, &mut result) {
        Ok(bytes) => {
            result.finish(bytes.len() as u64);
            info!(
                original_size,
                final_size = result.final_size_bytes,
                ratio = result.compression_ratio,
                methods = ?result.methods,
                "optimization finished"
            );
            (bytes, result)
        }
        Err(e) => {
            warn!("optimization failed, returning original document: {e}");
            result.error = Some(e.to_string());
            result.finish(original_size);
            (pdf_bytes.to_vec(), result)
        }
    }
}

fn run_pipeline(
    pdf_bytes: &[u8],
    target: u64,
    opts: &OptimizeOptions,
    result: &mut OptimizationResult,
) -> Result<Vec<u8>, PdfPrepError> {
    let total_pages = {
        let doc =
            Document::load_mem(pdf_bytes).map_err(|e| PdfPrepError::ParseError(e.to_string()))?;
        doc.get_pages().len() as u32
    };
    result.total_pages = Some(total_pages);
    if total_pages == 0 {
        debug!("zero-page document, returning unchanged");
        return Ok(pdf_bytes.to_vec());
    }

    if opts.force_scanned || is_image_based(pdf_bytes) {
        info!("taking the scanned-document path");
        result.is_scanned = true;
        let (bytes, pages_rebuilt) = rebuild_scanned(pdf_bytes)?;
        result.methods.push("scanned_rebuild".into());
        result.images_recompressed = pages_rebuilt;
        result.target_dpi = Some(SCANNED_TARGET_DPI);
        result.jpeg_quality = Some(SCANNED_JPEG_QUALITY);
        return Ok(bytes);
    }

    let strategies: [&dyn CompressionStrategy; 3] =
        [&StructuralPass, &GhostscriptPass, &AggressivePass];
    Ok(apply_strategies(&strategies, pdf_bytes, target, opts, result))
}

/// Run the strategy chain until the target is met or the chain is exhausted.
///
/// A strategy's output, and its result metadata, are taken only when the
/// output is strictly smaller than the current best.
fn apply_strategies(
    strategies: &[&dyn CompressionStrategy],
    pdf_bytes: &[u8],
    target: u64,
    opts: &OptimizeOptions,
    result: &mut OptimizationResult,
) -> Vec<u8> {
    let mut best = pdf_bytes.to_vec();
    for strategy in strategies {
        if best.len() as u64 <= target {
            break;
        }
        let attempt = strategy.attempt(&StrategyContext {
            original: pdf_bytes,
            current: &best,
            target,
            level: opts.level,
            use_ghostscript: opts.use_ghostscript,
        });
        match attempt {
            Ok(Some(outcome)) if outcome.bytes.len() < best.len() => {
                debug!(
                    method = %outcome.method,
                    before = best.len(),
                    after = outcome.bytes.len(),
                    "strategy accepted"
                );
                result.methods.push(outcome.method);
                result.images_recompressed += outcome.images_recompressed;
                if outcome.ghostscript_level.is_some() {
                    result.ghostscript_level = outcome.ghostscript_level;
                }
                if outcome.pages_kept.is_some() {
                    result.pages_kept = outcome.pages_kept;
                }
                best = outcome.bytes;
            }
            Ok(Some(outcome)) => {
                debug!(method = %outcome.method, "strategy output not smaller, rejected");
            }
            Ok(None) => {}
            Err(e) => {
                warn!("compression strategy skipped: {e}");
            }
        }
    }

    if best.len() as u64 > target {
        info!(
            size = best.len(),
            target, "document remains over target after all strategies"
        );
    }
    best
}

struct StrategyContext<'a> {
    original: &'a [u8],
    current: &'a [u8],
    target: u64,
    level: CompressionLevel,
    use_ghostscript: bool,
}

/// Candidate bytes plus the result metadata that becomes true only if the
/// candidate is accepted.
struct StrategyOutcome {
    bytes: Vec<u8>,
    method: String,
    images_recompressed: u32,
    ghostscript_level: Option<String>,
    pages_kept: Option<u32>,
}

impl StrategyOutcome {
    fn new(bytes: Vec<u8>, method: &str) -> Self {
        StrategyOutcome {
            bytes,
            method: method.to_string(),
            images_recompressed: 0,
            ghostscript_level: None,
            pages_kept: None,
        }
    }
}

/// One stage of the fallback chain. Returning `Ok(None)` means the stage did
/// not apply; errors are logged by the caller and treated the same way.
trait CompressionStrategy {
    fn attempt(&self, ctx: &StrategyContext<'_>)
        -> Result<Option<StrategyOutcome>, PdfPrepError>;
}

/// Image re-encode at display quality plus object pruning and stream deflation.
struct StructuralPass;

impl CompressionStrategy for StructuralPass {
    fn attempt(
        &self,
        ctx: &StrategyContext<'_>,
    ) -> Result<Option<StrategyOutcome>, PdfPrepError> {
        let settings = RecodeSettings {
            jpeg_quality: STRUCTURAL_JPEG_QUALITY,
            grayscale: false,
            max_dimension: Some(STRUCTURAL_MAX_DIMENSION),
            scale: None,
        };
        let (bytes, replaced) = recompress_images(ctx.current, &settings)?;
        let mut outcome = StrategyOutcome::new(bytes, "structural");
        outcome.images_recompressed = replaced;
        Ok(Some(outcome))
    }
}

struct GhostscriptPass;

impl CompressionStrategy for GhostscriptPass {
    fn attempt(
        &self,
        ctx: &StrategyContext<'_>,
    ) -> Result<Option<StrategyOutcome>, PdfPrepError> {
        if !ctx.use_ghostscript || !ghostscript_available() {
            return Ok(None);
        }
        match compress_with_ghostscript(ctx.current, ctx.level) {
            Some(bytes) => {
                let mut outcome = StrategyOutcome::new(bytes, "ghostscript");
                outcome.ghostscript_level = Some(ctx.level.as_str().to_string());
                Ok(Some(outcome))
            }
            None => Ok(None),
        }
    }
}

/// Last resort: extreme image downsampling for image-heavy documents, or a
/// lossy text-only rebuild of the leading pages for text documents.
struct AggressivePass;

impl CompressionStrategy for AggressivePass {
    fn attempt(
        &self,
        ctx: &StrategyContext<'_>,
    ) -> Result<Option<StrategyOutcome>, PdfPrepError> {
        if is_image_based(ctx.original) {
            let settings = RecodeSettings {
                jpeg_quality: AGGRESSIVE_JPEG_QUALITY,
                grayscale: true,
                max_dimension: None,
                scale: Some(AGGRESSIVE_IMAGE_SCALE),
            };
            let (bytes, replaced) = recompress_images(ctx.original, &settings)?;
            let mut outcome = StrategyOutcome::new(bytes, "aggressive_images");
            outcome.images_recompressed = replaced;
            Ok(Some(outcome))
        } else {
            let (bytes, pages_kept) =
                build_text_document(ctx.original, ctx.current.len() as u64, ctx.target)?;
            warn!(
                pages_kept,
                "text-only fallback: visual formatting and trailing pages were dropped"
            );
            let mut outcome = StrategyOutcome::new(bytes, "aggressive_text");
            outcome.pages_kept = Some(pages_kept);
            Ok(Some(outcome))
        }
    }
}

/// Re-encode every image XObject per `settings`, then prune and deflate.
///
/// Individual images that cannot be decoded (unsupported filter, soft masks,
/// truncated data) are left untouched. Returns the serialized document and
/// the number of images actually replaced.
fn recompress_images(
    pdf_bytes: &[u8],
    settings: &RecodeSettings,
) -> Result<(Vec<u8>, u32), PdfPrepError> {
    settings.validate()?;
    let mut doc =
        Document::load_mem(pdf_bytes).map_err(|e| PdfPrepError::ParseError(e.to_string()))?;

    let image_ids: Vec<ObjectId> = doc
        .objects
        .iter()
        .filter(|(_, object)| crate::classify::is_image_stream(object))
        .map(|(id, _)| *id)
        .collect();

    let mut replaced = 0u32;
    for id in image_ids {
        let stream = match doc.get_object(id) {
            Ok(Object::Stream(stream)) => stream.clone(),
            _ => continue,
        };
        if stream.dict.get(b"SMask").is_ok() {
            // Resizing would desynchronize the soft mask; leave it alone.
            debug!(?id, "skipping image with soft mask");
            continue;
        }
        let img = match decode_image_stream(&doc, &stream) {
            Ok(img) => img,
            Err(e) => {
                debug!(?id, "skipping image: {e}");
                continue;
            }
        };
        let recoded = recode_image(img, settings);
        let new_stream = match encode_jpeg_xobject(&recoded, settings.jpeg_quality, settings.grayscale)
        {
            Ok(stream) => stream,
            Err(e) => {
                debug!(?id, "re-encode failed: {e}");
                continue;
            }
        };
        if new_stream.content.len() < stream.content.len() {
            doc.objects.insert(id, Object::Stream(new_stream));
            replaced += 1;
        }
    }

    doc.prune_objects();
    doc.compress();

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| PdfPrepError::OperationError(format!("Save failed: {e}")))?;
    Ok((buffer, replaced))
}

/// Rebuild every page of a scanned document as one grayscale JPEG at the
/// scanned-path resolution, keeping each page's physical dimensions.
///
/// Pages without a decodable raster image are left untouched. Returns the
/// serialized document and the number of pages rebuilt.
fn rebuild_scanned(pdf_bytes: &[u8]) -> Result<(Vec<u8>, u32), PdfPrepError> {
    let mut doc =
        Document::load_mem(pdf_bytes).map_err(|e| PdfPrepError::ParseError(e.to_string()))?;

    let pages: Vec<(u32, ObjectId)> = doc.get_pages().into_iter().collect();
    let mut pages_rebuilt = 0u32;

    for (page_num, page_id) in pages {
        let (width_pts, height_pts) = page_dimensions(&doc, page_id);

        let mut page_image: Option<DynamicImage> = None;
        for image_id in page_image_ids(&doc, page_id) {
            let stream = match doc.get_object(image_id) {
                Ok(Object::Stream(stream)) => stream.clone(),
                _ => continue,
            };
            match decode_image_stream(&doc, &stream) {
                Ok(img) => {
                    let bigger = page_image.as_ref().map_or(true, |best| {
                        (img.width() as u64 * img.height() as u64)
                            > (best.width() as u64 * best.height() as u64)
                    });
                    if bigger {
                        page_image = Some(img);
                    }
                }
                Err(e) => debug!(page_num, "undecodable page image: {e}"),
            }
        }

        let Some(img) = page_image else {
            debug!(page_num, "no decodable image on page, leaving it untouched");
            continue;
        };

        // Downsample to the 150 DPI equivalent of the page's physical size;
        // never upscale smaller source material.
        let target_w = ((width_pts / 72.0) * SCANNED_TARGET_DPI as f32).round().max(1.0) as u32;
        let target_h = ((height_pts / 72.0) * SCANNED_TARGET_DPI as f32).round().max(1.0) as u32;
        let resized = if target_w < img.width() || target_h < img.height() {
            img.resize_exact(target_w, target_h, FilterType::Lanczos3)
        } else {
            img
        };

        let image_stream = encode_jpeg_xobject(&resized, SCANNED_JPEG_QUALITY, true)?;
        let image_ref = doc.add_object(Object::Stream(image_stream));

        let content = format!("q {width_pts:.2} 0 0 {height_pts:.2} 0 0 cm /Im0 Do Q");
        let content_ref = doc.add_object(Object::Stream(Stream::new(
            Dictionary::new(),
            content.into_bytes(),
        )));

        let mut xobjects = Dictionary::new();
        xobjects.set("Im0", Object::Reference(image_ref));
        let mut resources = Dictionary::new();
        resources.set("XObject", Object::Dictionary(xobjects));

        if let Some(Object::Dictionary(page)) = doc.objects.get_mut(&page_id) {
            page.set("Resources", Object::Dictionary(resources));
            page.set("Contents", Object::Reference(content_ref));
            pages_rebuilt += 1;
        }
    }

    doc.prune_objects();
    doc.compress();

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| PdfPrepError::OperationError(format!("Save failed: {e}")))?;
    Ok((buffer, pages_rebuilt))
}

/// Build a text-only document from the leading pages that fit the target.
///
/// Page budget: `total_pages × target/current × 0.8`, at least one page.
/// Extracted text is laid out on fixed A4 pages in a small Helvetica face;
/// tabular lines are linearized into pipe-delimited rows. Lossy by design.
fn build_text_document(
    pdf_bytes: &[u8],
    current_size: u64,
    target: u64,
) -> Result<(Vec<u8>, u32), PdfPrepError> {
    let source =
        Document::load_mem(pdf_bytes).map_err(|e| PdfPrepError::ParseError(e.to_string()))?;
    let total_pages = source.get_pages().len() as u32;
    if total_pages == 0 {
        return Err(PdfPrepError::OperationError("document has no pages".into()));
    }

    let ratio = target as f64 / current_size.max(1) as f64;
    let pages_to_keep =
        (((total_pages as f64) * ratio * TEXT_FALLBACK_MARGIN) as u32).clamp(1, total_pages);

    let max_lines = ((TEXT_PAGE_HEIGHT - 2.0 * TEXT_MARGIN) / TEXT_LEADING) as usize;

    let mut text_doc = Document::with_version("1.5");
    let pages_id = text_doc.new_object_id();

    let mut font = Dictionary::new();
    font.set("Type", Object::Name(b"Font".to_vec()));
    font.set("Subtype", Object::Name(b"Type1".to_vec()));
    font.set("BaseFont", Object::Name(b"Helvetica".to_vec()));
    let font_id = text_doc.add_object(Object::Dictionary(font));

    let mut kids = Vec::with_capacity(pages_to_keep as usize);
    for page_num in 1..=pages_to_keep {
        let text = source.extract_text(&[page_num]).unwrap_or_default();
        let text = linearize_tabular(&text);
        let mut lines = wrap_text(&text, TEXT_MAX_CHARS_PER_LINE);
        lines.truncate(max_lines);

        let content_id = text_doc.add_object(Object::Stream(Stream::new(
            Dictionary::new(),
            build_text_content(&lines).into_bytes(),
        )));

        let mut fonts = Dictionary::new();
        fonts.set("F1", Object::Reference(font_id));
        let mut resources = Dictionary::new();
        resources.set("Font", Object::Dictionary(fonts));

        let mut page = Dictionary::new();
        page.set("Type", Object::Name(b"Page".to_vec()));
        page.set("Parent", Object::Reference(pages_id));
        page.set(
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(TEXT_PAGE_WIDTH),
                Object::Real(TEXT_PAGE_HEIGHT),
            ]),
        );
        page.set("Contents", Object::Reference(content_id));
        page.set("Resources", Object::Dictionary(resources));
        let page_id = text_doc.add_object(Object::Dictionary(page));
        kids.push(Object::Reference(page_id));
    }

    let mut pages_dict = Dictionary::new();
    pages_dict.set("Type", Object::Name(b"Pages".to_vec()));
    pages_dict.set("Count", Object::Integer(pages_to_keep as i64));
    pages_dict.set("Kids", Object::Array(kids));
    text_doc
        .objects
        .insert(pages_id, Object::Dictionary(pages_dict));

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));
    let catalog_id = text_doc.add_object(Object::Dictionary(catalog));
    text_doc.trailer.set("Root", Object::Reference(catalog_id));

    text_doc.compress();

    let mut buffer = Vec::new();
    text_doc
        .save_to(&mut buffer)
        .map_err(|e| PdfPrepError::OperationError(format!("Save failed: {e}")))?;
    Ok((buffer, pages_to_keep))
}

fn build_text_content(lines: &[String]) -> String {
    let start_y = TEXT_PAGE_HEIGHT - TEXT_MARGIN;
    let mut ops = format!(
        "BT /F1 {TEXT_FONT_SIZE} Tf {TEXT_LEADING} TL {TEXT_MARGIN} {start_y} Td\n"
    );
    for line in lines {
        ops.push('(');
        ops.push_str(&escape_pdf_text(line));
        ops.push_str(") Tj T*\n");
    }
    ops.push_str("ET");
    ops
}

/// Escape a line for a PDF literal string. Characters outside the printable
/// Latin range are replaced, which is acceptable for a lossy fallback.
fn escape_pdf_text(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    for c in line.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            c if c == ' ' || c.is_ascii_graphic() => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}

fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for line in text.lines() {
        if line.chars().count() <= width {
            lines.push(line.to_string());
            continue;
        }
        let mut current = String::new();
        for c in line.chars() {
            current.push(c);
            if current.chars().count() >= width {
                lines.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }
    lines
}

fn page_dimensions(doc: &Document, page_id: ObjectId) -> (f32, f32) {
    let mut current = Some(page_id);
    // MediaBox may be inherited; walk the parent chain a bounded number of
    // steps before falling back to US Letter.
    for _ in 0..8 {
        let Some(id) = current else { break };
        let Ok(Object::Dictionary(dict)) = doc.get_object(id) else {
            break;
        };
        if let Some(dims) = media_box_dimensions(doc, dict) {
            return dims;
        }
        current = dict
            .get(b"Parent")
            .ok()
            .and_then(|parent| parent.as_reference().ok());
    }
    (612.0, 792.0)
}

fn media_box_dimensions(doc: &Document, dict: &Dictionary) -> Option<(f32, f32)> {
    let media_box = dict.get(b"MediaBox").ok()?;
    let entries = match media_box {
        Object::Array(entries) => entries.clone(),
        Object::Reference(id) => match doc.get_object(*id).ok()? {
            Object::Array(entries) => entries.clone(),
            _ => return None,
        },
        _ => return None,
    };
    if entries.len() < 4 {
        return None;
    }
    let num = |object: &Object| -> Option<f32> {
        match object {
            Object::Integer(n) => Some(*n as f32),
            Object::Real(r) => Some(*r),
            _ => None,
        }
    };
    let (x0, y0, x1, y1) = (
        num(&entries[0])?,
        num(&entries[1])?,
        num(&entries[2])?,
        num(&entries[3])?,
    );
    Some(((x1 - x0).abs(), (y1 - y0).abs()))
}

fn page_image_ids(doc: &Document, page_id: ObjectId) -> Vec<ObjectId> {
    let Some(resources) = page_resources(doc, page_id) else {
        return Vec::new();
    };
    let xobjects = match resources.get(b"XObject") {
        Ok(Object::Dictionary(dict)) => dict.clone(),
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Dictionary(dict)) => dict.clone(),
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };
    xobjects
        .iter()
        .filter_map(|(_, value)| value.as_reference().ok())
        .filter(|&id| {
            doc.get_object(id)
                .map(crate::classify::is_image_stream)
                .unwrap_or(false)
        })
        .collect()
}

fn page_resources(doc: &Document, page_id: ObjectId) -> Option<Dictionary> {
    let mut current = Some(page_id);
    for _ in 0..8 {
        let id = current?;
        let Ok(Object::Dictionary(dict)) = doc.get_object(id) else {
            return None;
        };
        match dict.get(b"Resources") {
            Ok(Object::Dictionary(resources)) => return Some(resources.clone()),
            Ok(Object::Reference(resources_id)) => {
                if let Ok(Object::Dictionary(resources)) = doc.get_object(*resources_id) {
                    return Some(resources.clone());
                }
                return None;
            }
            _ => {}
        }
        current = dict
            .get(b"Parent")
            .ok()
            .and_then(|parent| parent.as_reference().ok());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testsupport::{create_image_pdf, create_text_pdf};
    use pretty_assertions::assert_eq;

    fn no_gs(opts: OptimizeOptions) -> OptimizeOptions {
        OptimizeOptions {
            use_ghostscript: false,
            ..opts
        }
    }

    #[test]
    fn below_target_is_a_no_op() {
        let pdf = create_text_pdf(2, "Small report", 0);
        let (bytes, result) = optimize(&pdf, &OptimizeOptions::default());

        assert_eq!(bytes, pdf);
        assert_eq!(result.compression_ratio, 1.0);
        assert!(result.methods.is_empty());
        assert!(result.error.is_none());
    }

    #[test]
    fn corrupt_bytes_return_original_with_error() {
        let bytes = b"not a pdf".to_vec();
        let opts = no_gs(OptimizeOptions {
            target_size_bytes: Some(1),
            ..Default::default()
        });
        let (out, result) = optimize(&bytes, &opts);

        assert_eq!(out, bytes);
        assert!(result.error.is_some());
        assert!(result.methods.is_empty());
    }

    #[test]
    fn force_scanned_rebuilds_every_image_page() {
        let pdf = create_image_pdf(3);
        let opts = no_gs(OptimizeOptions {
            target_size_bytes: Some(1),
            force_scanned: true,
            ..Default::default()
        });
        let (out, result) = optimize(&pdf, &opts);

        assert!(result.is_scanned);
        assert_eq!(result.methods, vec!["scanned_rebuild".to_string()]);
        assert_eq!(result.target_dpi, Some(150));
        assert_eq!(result.jpeg_quality, Some(85));
        assert_eq!(result.images_recompressed, 3);
        assert!(result.error.is_none());

        let doc = Document::load_mem(&out).unwrap();
        assert_eq!(doc.get_pages().len(), 3);
        // Every page image is now a grayscale JPEG.
        for object in doc.objects.values() {
            if let Object::Stream(stream) = object {
                if crate::classify::is_image_stream(object) {
                    assert_eq!(
                        stream.dict.get(b"ColorSpace").unwrap(),
                        &Object::Name(b"DeviceGray".to_vec())
                    );
                }
            }
        }
    }

    #[test]
    fn scanned_path_is_detected_without_forcing() {
        let pdf = create_image_pdf(2);
        let opts = no_gs(OptimizeOptions {
            target_size_bytes: Some(1),
            ..Default::default()
        });
        let (_, result) = optimize(&pdf, &opts);
        assert!(result.is_scanned);
        assert_eq!(result.methods, vec!["scanned_rebuild".to_string()]);
    }

    #[test]
    fn text_document_falls_back_to_text_only_rebuild() {
        let pdf = create_text_pdf(10, "Operating income rose sharply", 4 * 1024);
        let opts = no_gs(OptimizeOptions {
            target_size_bytes: Some(1),
            ..Default::default()
        });
        let (out, result) = optimize(&pdf, &opts);

        assert!(result.methods.contains(&"aggressive_text".to_string()));
        assert_eq!(result.pages_kept, Some(1));
        assert!(result.error.is_none());
        let doc = Document::load_mem(&out).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn final_size_never_exceeds_original_without_error() {
        let pdf = create_text_pdf(20, "Monotonicity", 2 * 1024);
        let opts = no_gs(OptimizeOptions {
            target_size_bytes: Some(1024),
            ..Default::default()
        });
        let (out, result) = optimize(&pdf, &opts);
        assert!(result.error.is_some() || out.len() <= pdf.len());
    }

    #[test]
    fn optimization_is_deterministic() {
        let pdf = create_text_pdf(8, "Determinism", 3 * 1024);
        let opts = no_gs(OptimizeOptions {
            target_size_bytes: Some(2048),
            ..Default::default()
        });
        let (first, first_result) = optimize(&pdf, &opts);
        let (second, second_result) = optimize(&pdf, &opts);
        assert_eq!(first, second);
        assert_eq!(first_result.methods, second_result.methods);
    }

    struct InflatingPass;

    impl CompressionStrategy for InflatingPass {
        fn attempt(
            &self,
            ctx: &StrategyContext<'_>,
        ) -> Result<Option<StrategyOutcome>, PdfPrepError> {
            let mut bytes = ctx.current.to_vec();
            bytes.extend_from_slice(b"%% trailing junk");
            let mut outcome = StrategyOutcome::new(bytes, "inflating");
            outcome.images_recompressed = 7;
            outcome.pages_kept = Some(5);
            Ok(Some(outcome))
        }
    }

    #[test]
    fn rejected_strategy_leaves_no_trace_in_the_result() {
        let pdf = create_text_pdf(1, "Reject", 0);
        let mut result = OptimizationResult::new(pdf.len() as u64);
        let strategies: [&dyn CompressionStrategy; 1] = [&InflatingPass];
        let best = apply_strategies(
            &strategies,
            &pdf,
            1,
            &OptimizeOptions::default(),
            &mut result,
        );

        // Output grew, so neither the bytes nor the metadata are taken.
        assert_eq!(best, pdf);
        assert!(result.methods.is_empty());
        assert_eq!(result.images_recompressed, 0);
        assert_eq!(result.pages_kept, None);
    }

    #[test]
    fn zero_page_document_is_returned_unchanged() {
        let pdf = create_text_pdf(0, "Empty", 0);
        let opts = no_gs(OptimizeOptions {
            target_size_bytes: Some(1),
            ..Default::default()
        });
        let (out, result) = optimize(&pdf, &opts);
        assert_eq!(out, pdf);
        assert_eq!(result.total_pages, Some(0));
        assert!(result.methods.is_empty());
    }

    #[test]
    fn escape_handles_parentheses_and_backslashes() {
        assert_eq!(escape_pdf_text(r"a(b)c\d"), r"a\(b\)c\\d");
        assert_eq!(escape_pdf_text("caf\u{e9}"), "caf?");
    }

    #[test]
    fn wrap_text_splits_long_lines() {
        let lines = wrap_text("abcdefghij", 4);
        assert_eq!(lines, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn compression_level_serializes_snake_case() {
        let json = serde_json::to_string(&CompressionLevel::UltraLow).unwrap();
        assert_eq!(json, "\"ultra_low\"");
        let level: CompressionLevel = serde_json::from_str("\"prepress\"").unwrap();
        assert_eq!(level, CompressionLevel::Prepress);
    }
}
