//! Synthetic PDF builders shared by the unit tests.

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageBuffer, Rgb};
use lopdf::{Dictionary, Document, Object, Stream};

/// Build a text PDF with `num_pages` pages. Each page carries a heading of
/// `"{text} - page N"` plus `pad_bytes` of incompressible filler text, so
/// callers can inflate the raw file size past a chosen ceiling.
pub fn create_text_pdf(num_pages: u32, text: &str, pad_bytes: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut font = Dictionary::new();
    font.set("Type", Object::Name(b"Font".to_vec()));
    font.set("Subtype", Object::Name(b"Type1".to_vec()));
    font.set("BaseFont", Object::Name(b"Helvetica".to_vec()));
    let font_id = doc.add_object(Object::Dictionary(font));

    let mut kids = Vec::new();
    for page_num in 1..=num_pages {
        let mut content = format!(
            "BT /F1 12 Tf 14 TL 50 700 Td ({text} - page {page_num}) Tj T*\n"
        );
        for line in pad_lines(page_num, pad_bytes) {
            content.push('(');
            content.push_str(&line);
            content.push_str(") Tj T*\n");
        }
        content.push_str("ET");

        let content_id = doc.add_object(Object::Stream(Stream::new(
            Dictionary::new(),
            content.into_bytes(),
        )));

        let mut fonts = Dictionary::new();
        fonts.set("F1", Object::Reference(font_id));
        let mut resources = Dictionary::new();
        resources.set("Font", Object::Dictionary(fonts));

        let mut page = Dictionary::new();
        page.set("Type", Object::Name(b"Page".to_vec()));
        page.set("Parent", Object::Reference(pages_id));
        page.set("MediaBox", media_box(612, 792));
        page.set("Contents", Object::Reference(content_id));
        page.set("Resources", Object::Dictionary(resources));
        kids.push(Object::Reference(doc.add_object(Object::Dictionary(page))));
    }

    finish_document(doc, pages_id, kids)
}

/// Build a PDF whose pages each consist of a single full-page JPEG XObject
/// and no text. Classifies as scanned.
pub fn create_image_pdf(num_pages: u32) -> Vec<u8> {
    let jpeg = gradient_jpeg(64, 64);

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids = Vec::new();
    for _ in 0..num_pages {
        let mut image_dict = Dictionary::new();
        image_dict.set("Type", Object::Name(b"XObject".to_vec()));
        image_dict.set("Subtype", Object::Name(b"Image".to_vec()));
        image_dict.set("Width", Object::Integer(64));
        image_dict.set("Height", Object::Integer(64));
        image_dict.set("ColorSpace", Object::Name(b"DeviceRGB".to_vec()));
        image_dict.set("BitsPerComponent", Object::Integer(8));
        image_dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));
        let image_id = doc.add_object(Object::Stream(Stream::new(image_dict, jpeg.clone())));

        let content = "q 612 0 0 792 0 0 cm /Im0 Do Q".to_string();
        let content_id = doc.add_object(Object::Stream(Stream::new(
            Dictionary::new(),
            content.into_bytes(),
        )));

        let mut xobjects = Dictionary::new();
        xobjects.set("Im0", Object::Reference(image_id));
        let mut resources = Dictionary::new();
        resources.set("XObject", Object::Dictionary(xobjects));

        let mut page = Dictionary::new();
        page.set("Type", Object::Name(b"Page".to_vec()));
        page.set("Parent", Object::Reference(pages_id));
        page.set("MediaBox", media_box(612, 792));
        page.set("Contents", Object::Reference(content_id));
        page.set("Resources", Object::Dictionary(resources));
        kids.push(Object::Reference(doc.add_object(Object::Dictionary(page))));
    }

    finish_document(doc, pages_id, kids)
}

fn finish_document(
    mut doc: Document,
    pages_id: lopdf::ObjectId,
    kids: Vec<Object>,
) -> Vec<u8> {
    let count = kids.len() as i64;
    let mut pages = Dictionary::new();
    pages.set("Type", Object::Name(b"Pages".to_vec()));
    pages.set("Count", Object::Integer(count));
    pages.set("Kids", Object::Array(kids));
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));
    let catalog_id = doc.add_object(Object::Dictionary(catalog));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).expect("synthetic PDF must save");
    buffer
}

fn media_box(width: i64, height: i64) -> Object {
    Object::Array(vec![
        Object::Integer(0),
        Object::Integer(0),
        Object::Integer(width),
        Object::Integer(height),
    ])
}

/// Pseudo-random alphanumeric filler, roughly `pad_bytes` long, seeded per
/// page so deflate cannot collapse it across pages.
fn pad_lines(seed: u32, pad_bytes: usize) -> Vec<String> {
    const LINE_LEN: usize = 80;
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

    let mut state = u64::from(seed).wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    let mut lines = Vec::new();
    let mut emitted = 0usize;
    while emitted < pad_bytes {
        let mut line = String::with_capacity(LINE_LEN);
        for _ in 0..LINE_LEN.min(pad_bytes - emitted) {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let idx = (state >> 33) as usize % CHARSET.len();
            line.push(CHARSET[idx] as char);
        }
        emitted += line.len();
        lines.push(line);
    }
    lines
}

fn gradient_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    });
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, 85)
        .encode(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .expect("JPEG encoding of a gradient must succeed");
    jpeg
}
