//! Raster image decode and re-encode for PDF Image XObjects.
//!
//! Supported decode paths: DCTDecode (JPEG), FlateDecode over raw
//! RGB/Gray/CMYK samples, and unfiltered raw samples. Anything else is
//! reported as an error and the caller skips that image.

use std::io::Read;

use flate2::read::ZlibDecoder;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, GrayImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Document, Object, Stream};

use crate::error::PdfPrepError;

/// How an image should be re-encoded.
#[derive(Debug, Clone, Copy)]
pub struct RecodeSettings {
    /// Baseline JPEG quality, 1-100.
    pub jpeg_quality: u8,
    pub grayscale: bool,
    /// Proportionally shrink so neither side exceeds this many pixels.
    pub max_dimension: Option<u32>,
    /// Multiply both pixel dimensions by this factor (applied before
    /// `max_dimension`); values >= 1.0 are ignored.
    pub scale: Option<f32>,
}

impl RecodeSettings {
    pub(crate) fn validate(&self) -> Result<(), PdfPrepError> {
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(PdfPrepError::InvalidConfig(format!(
                "JPEG quality must be between 1 and 100, got {}",
                self.jpeg_quality
            )));
        }
        Ok(())
    }
}

/// Decode an Image XObject stream into pixels.
pub(crate) fn decode_image_stream(
    doc: &Document,
    stream: &Stream,
) -> Result<DynamicImage, PdfPrepError> {
    let width = dict_u32(&stream.dict, b"Width")?;
    let height = dict_u32(&stream.dict, b"Height")?;
    let bits = dict_u32(&stream.dict, b"BitsPerComponent").unwrap_or(8);
    let color_space = stream
        .dict
        .get(b"ColorSpace")
        .ok()
        .map(|cs| color_space_name(cs, doc))
        .unwrap_or_else(|| "DeviceRGB".to_string());

    match first_filter(&stream.dict) {
        Some(filter) if filter == b"DCTDecode" => {
            image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg)
                .map_err(|e| PdfPrepError::ImageError(format!("JPEG decode failed: {e}")))
        }
        Some(filter) if filter == b"FlateDecode" => {
            let mut decoder = ZlibDecoder::new(&stream.content[..]);
            let mut raw = Vec::new();
            decoder
                .read_to_end(&mut raw)
                .map_err(|e| PdfPrepError::ImageError(format!("inflate failed: {e}")))?;
            raw_to_image(raw, width, height, &color_space, bits)
        }
        None => raw_to_image(stream.content.clone(), width, height, &color_space, bits),
        Some(other) => Err(PdfPrepError::ImageError(format!(
            "unsupported image filter: {}",
            String::from_utf8_lossy(&other)
        ))),
    }
}

/// Apply the sizing and colour parts of `settings` to decoded pixels.
pub(crate) fn recode_image(img: DynamicImage, settings: &RecodeSettings) -> DynamicImage {
    let mut img = img;

    if let Some(scale) = settings.scale {
        if scale > 0.0 && scale < 1.0 {
            let width = ((img.width() as f32 * scale) as u32).max(1);
            let height = ((img.height() as f32 * scale) as u32).max(1);
            img = img.resize_exact(width, height, FilterType::Lanczos3);
        }
    }

    if let Some(max) = settings.max_dimension {
        if img.width() > max || img.height() > max {
            img = img.resize(max, max, FilterType::Lanczos3);
        }
    }

    if settings.grayscale {
        img = DynamicImage::ImageLuma8(img.to_luma8());
    }

    img
}

/// Encode pixels as a baseline-JPEG Image XObject stream.
pub(crate) fn encode_jpeg_xobject(
    img: &DynamicImage,
    quality: u8,
    grayscale: bool,
) -> Result<Stream, PdfPrepError> {
    let (jpeg_bytes, width, height, color_space) =
        if grayscale || matches!(img, DynamicImage::ImageLuma8(_)) {
            let gray: GrayImage = img.to_luma8();
            let (width, height) = gray.dimensions();
            let mut buf = Vec::new();
            JpegEncoder::new_with_quality(&mut buf, quality)
                .encode(gray.as_raw(), width, height, ExtendedColorType::L8)
                .map_err(|e| PdfPrepError::ImageError(format!("JPEG encode failed: {e}")))?;
            (buf, width, height, b"DeviceGray".to_vec())
        } else {
            let rgb: RgbImage = img.to_rgb8();
            let (width, height) = rgb.dimensions();
            let mut buf = Vec::new();
            JpegEncoder::new_with_quality(&mut buf, quality)
                .encode(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
                .map_err(|e| PdfPrepError::ImageError(format!("JPEG encode failed: {e}")))?;
            (buf, width, height, b"DeviceRGB".to_vec())
        };

    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Image".to_vec()));
    dict.set("Width", Object::Integer(width as i64));
    dict.set("Height", Object::Integer(height as i64));
    dict.set("ColorSpace", Object::Name(color_space));
    dict.set("BitsPerComponent", Object::Integer(8));
    dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));

    Ok(Stream::new(dict, jpeg_bytes))
}

fn raw_to_image(
    raw: Vec<u8>,
    width: u32,
    height: u32,
    color_space: &str,
    bits: u32,
) -> Result<DynamicImage, PdfPrepError> {
    if bits != 8 {
        return Err(PdfPrepError::ImageError(format!(
            "unsupported bit depth: {bits}"
        )));
    }
    let pixels = (width as usize) * (height as usize);

    match color_space {
        "DeviceRGB" | "RGB" | "CalRGB" => {
            let expected = pixels * 3;
            if raw.len() < expected {
                return Err(truncated(color_space, raw.len(), expected));
            }
            RgbImage::from_raw(width, height, raw[..expected].to_vec())
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(|| PdfPrepError::ImageError("RGB buffer construction failed".into()))
        }
        "DeviceGray" | "Gray" | "CalGray" => {
            if raw.len() < pixels {
                return Err(truncated(color_space, raw.len(), pixels));
            }
            GrayImage::from_raw(width, height, raw[..pixels].to_vec())
                .map(DynamicImage::ImageLuma8)
                .ok_or_else(|| PdfPrepError::ImageError("gray buffer construction failed".into()))
        }
        "DeviceCMYK" | "CMYK" => {
            let expected = pixels * 4;
            if raw.len() < expected {
                return Err(truncated(color_space, raw.len(), expected));
            }
            let mut rgb = Vec::with_capacity(pixels * 3);
            for chunk in raw[..expected].chunks_exact(4) {
                let (c, m, y, k) = (
                    chunk[0] as f32 / 255.0,
                    chunk[1] as f32 / 255.0,
                    chunk[2] as f32 / 255.0,
                    chunk[3] as f32 / 255.0,
                );
                rgb.push(((1.0 - c) * (1.0 - k) * 255.0) as u8);
                rgb.push(((1.0 - m) * (1.0 - k) * 255.0) as u8);
                rgb.push(((1.0 - y) * (1.0 - k) * 255.0) as u8);
            }
            RgbImage::from_raw(width, height, rgb)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(|| PdfPrepError::ImageError("CMYK conversion failed".into()))
        }
        // ICCBased and friends: guess from the sample count.
        _ => {
            if raw.len() >= pixels * 3 {
                RgbImage::from_raw(width, height, raw[..pixels * 3].to_vec())
                    .map(DynamicImage::ImageRgb8)
                    .ok_or_else(|| {
                        PdfPrepError::ImageError("RGB buffer construction failed".into())
                    })
            } else if raw.len() >= pixels {
                GrayImage::from_raw(width, height, raw[..pixels].to_vec())
                    .map(DynamicImage::ImageLuma8)
                    .ok_or_else(|| {
                        PdfPrepError::ImageError("gray buffer construction failed".into())
                    })
            } else {
                Err(PdfPrepError::ImageError(format!(
                    "cannot infer sample layout for color space {color_space}"
                )))
            }
        }
    }
}

fn truncated(color_space: &str, got: usize, expected: usize) -> PdfPrepError {
    PdfPrepError::ImageError(format!(
        "{color_space} sample data truncated: {got} bytes, expected {expected}"
    ))
}

fn dict_u32(dict: &Dictionary, key: &[u8]) -> Result<u32, PdfPrepError> {
    match dict.get(key) {
        Ok(Object::Integer(n)) if *n > 0 => Ok(*n as u32),
        _ => Err(PdfPrepError::ImageError(format!(
            "missing or invalid {}",
            String::from_utf8_lossy(key)
        ))),
    }
}

fn first_filter(dict: &Dictionary) -> Option<Vec<u8>> {
    match dict.get(b"Filter").ok()? {
        Object::Name(name) => Some(name.clone()),
        Object::Array(filters) => filters.first().and_then(|f| match f {
            Object::Name(name) => Some(name.clone()),
            _ => None,
        }),
        _ => None,
    }
}

fn color_space_name(object: &Object, doc: &Document) -> String {
    match object {
        Object::Name(name) => String::from_utf8_lossy(name).to_string(),
        Object::Array(entries) => match entries.first() {
            Some(Object::Name(name)) => String::from_utf8_lossy(name).to_string(),
            _ => "Unknown".to_string(),
        },
        Object::Reference(id) => match doc.get_object(*id) {
            Ok(resolved) => color_space_name(resolved, doc),
            Err(_) => "Unknown".to_string(),
        },
        _ => "Unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> DynamicImage {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn max_dimension_preserves_aspect_ratio() {
        let img = gradient(400, 200);
        let settings = RecodeSettings {
            jpeg_quality: 85,
            grayscale: false,
            max_dimension: Some(100),
            scale: None,
        };
        let out = recode_image(img, &settings);
        assert_eq!(out.width(), 100);
        assert_eq!(out.height(), 50);
    }

    #[test]
    fn scale_quarters_dimensions() {
        let img = gradient(80, 40);
        let settings = RecodeSettings {
            jpeg_quality: 30,
            grayscale: true,
            max_dimension: None,
            scale: Some(0.25),
        };
        let out = recode_image(img, &settings);
        assert_eq!(out.width(), 20);
        assert_eq!(out.height(), 10);
        assert!(matches!(out, DynamicImage::ImageLuma8(_)));
    }

    #[test]
    fn jpeg_xobject_roundtrips_through_decoder() {
        let img = gradient(64, 64);
        let stream = encode_jpeg_xobject(&img, 85, false).unwrap();
        assert_eq!(
            stream.dict.get(b"Filter").unwrap(),
            &Object::Name(b"DCTDecode".to_vec())
        );

        let doc = Document::with_version("1.5");
        let decoded = decode_image_stream(&doc, &stream).unwrap();
        assert_eq!(decoded.width(), 64);
        assert_eq!(decoded.height(), 64);
    }

    #[test]
    fn grayscale_encode_uses_devicegray() {
        let img = gradient(16, 16);
        let stream = encode_jpeg_xobject(&img, 85, true).unwrap();
        assert_eq!(
            stream.dict.get(b"ColorSpace").unwrap(),
            &Object::Name(b"DeviceGray".to_vec())
        );
    }

    #[test]
    fn zero_quality_is_rejected() {
        let settings = RecodeSettings {
            jpeg_quality: 0,
            grayscale: false,
            max_dimension: None,
            scale: None,
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn undersized_raw_data_is_an_error() {
        let result = raw_to_image(vec![0u8; 10], 100, 100, "DeviceRGB", 8);
        assert!(result.is_err());
    }
}
