//! Image encoding: decoded `DynamicImage` → PNG bytes for the sink.
//!
//! pdfium hands back decoded bitmaps whatever the original filter was
//! (DCT, Flate, JBIG2, …). PNG is lossless and readable everywhere, so every
//! extracted image is stored as PNG.

use crate::backend::RawImage;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

pub const PNG_MIME: &str = "image/png";
pub const PNG_EXTENSION: &str = "png";

/// Encode an extracted image as PNG.
pub fn encode_png(img: &DynamicImage) -> Result<RawImage, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    debug!(
        "Encoded {}x{} image → {} bytes PNG",
        img.width(),
        img.height(),
        buf.len()
    );

    Ok(RawImage {
        bytes: buf,
        mime_type: PNG_MIME.to_string(),
        extension: PNG_EXTENSION.to_string(),
    })
}
