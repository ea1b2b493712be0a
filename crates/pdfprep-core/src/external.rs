//! External high-ratio compressor stage (Ghostscript).
//!
//! Ghostscript is an optional host capability. Every failure mode (binary
//! missing, non-zero exit, timeout, unreadable output) degrades to "stage
//! skipped" and the optimizer keeps its previous best result.

use std::io::Write;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::optimize::CompressionLevel;

/// Wall-clock bound on one Ghostscript invocation.
pub const GHOSTSCRIPT_TIMEOUT: Duration = Duration::from_secs(30);

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Probe the host for a usable `gs` binary.
pub fn ghostscript_available() -> bool {
    Command::new("gs")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Run Ghostscript over `pdf_bytes` with the profile for `level`.
///
/// Returns `Some(output)` only when the run succeeded within the timeout and
/// produced a strictly smaller file; `None` in every other case.
pub(crate) fn compress_with_ghostscript(
    pdf_bytes: &[u8],
    level: CompressionLevel,
) -> Option<Vec<u8>> {
    match run_ghostscript(pdf_bytes, level) {
        Ok(Some(output)) if output.len() < pdf_bytes.len() => {
            debug!(
                input = pdf_bytes.len(),
                output = output.len(),
                ?level,
                "ghostscript compression accepted"
            );
            Some(output)
        }
        Ok(Some(output)) => {
            debug!(
                input = pdf_bytes.len(),
                output = output.len(),
                "ghostscript output not smaller, keeping previous result"
            );
            None
        }
        Ok(None) => None,
        Err(e) => {
            warn!("ghostscript stage skipped: {e}");
            None
        }
    }
}

fn run_ghostscript(
    pdf_bytes: &[u8],
    level: CompressionLevel,
) -> Result<Option<Vec<u8>>, std::io::Error> {
    let mut input = tempfile::Builder::new()
        .prefix("pdfprep-in-")
        .suffix(".pdf")
        .tempfile()?;
    input.write_all(pdf_bytes)?;
    input.flush()?;

    let output = tempfile::Builder::new()
        .prefix("pdfprep-out-")
        .suffix(".pdf")
        .tempfile()?;

    let mut cmd = Command::new("gs");
    cmd.args([
        "-sDEVICE=pdfwrite",
        "-dCompatibilityLevel=1.4",
        "-dNOPAUSE",
        "-dQUIET",
        "-dBATCH",
        "-dDetectDuplicateImages",
        "-dCompressFonts=true",
        "-dSubsetFonts=true",
    ]);

    if level == CompressionLevel::UltraLow {
        cmd.args([
            "-dPDFSETTINGS=/screen",
            "-dDownsampleColorImages=true",
            "-dDownsampleGrayImages=true",
            "-dDownsampleMonoImages=true",
            "-dColorImageResolution=36",
            "-dGrayImageResolution=36",
            "-dMonoImageResolution=36",
            "-dColorImageDownsampleType=/Bicubic",
            "-dGrayImageDownsampleType=/Bicubic",
            "-dMonoImageDownsampleType=/Subsample",
            "-dJPEGQ=40",
            "-sProcessColorModel=DeviceGray",
            "-sColorConversionStrategy=Gray",
            "-dOverrideICC",
        ]);
    } else {
        cmd.arg(format!("-dPDFSETTINGS={}", level.pdfsettings()));
        cmd.args([
            "-dColorImageDownsampleType=/Bicubic",
            "-dGrayImageDownsampleType=/Bicubic",
            "-dMonoImageDownsampleType=/Bicubic",
        ]);
    }

    cmd.arg(format!("-sOutputFile={}", output.path().display()));
    cmd.arg(input.path());
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::null());

    let mut child = cmd.spawn()?;
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            if !status.success() {
                warn!(?status, "ghostscript exited with an error");
                return Ok(None);
            }
            break;
        }
        if start.elapsed() > GHOSTSCRIPT_TIMEOUT {
            warn!(timeout = ?GHOSTSCRIPT_TIMEOUT, "ghostscript timed out, killing process");
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        std::thread::sleep(POLL_INTERVAL);
    }

    Ok(Some(std::fs::read(output.path())?))
}
