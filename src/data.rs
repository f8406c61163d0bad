use anyhow::{Context, Result};
use std::path::Path;

pub const PNG_MIME: &str = "image/png";
pub const JPEG_MIME: &str = "image/jpeg";
pub const GIF_MIME: &str = "image/gif";
pub const WEBP_MIME: &str = "image/webp";
pub const BMP_MIME: &str = "image/bmp";
pub const TIFF_MIME: &str = "image/tiff";
pub const PDF_MIME: &str = "application/pdf";

pub fn mime_from_image_format(format: image::ImageFormat) -> Option<&'static str> {
    match format {
        image::ImageFormat::Png => Some(PNG_MIME),
        image::ImageFormat::Jpeg => Some(JPEG_MIME),
        image::ImageFormat::Gif => Some(GIF_MIME),
        image::ImageFormat::WebP => Some(WEBP_MIME),
        image::ImageFormat::Bmp => Some(BMP_MIME),
        image::ImageFormat::Tiff => Some(TIFF_MIME),
        _ => None,
    }
}

pub fn extension_from_mime(mime: &str) -> Option<&'static str> {
    match mime {
        PNG_MIME => Some("png"),
        JPEG_MIME => Some("jpg"),
        GIF_MIME => Some("gif"),
        WEBP_MIME => Some("webp"),
        BMP_MIME => Some("bmp"),
        TIFF_MIME => Some("tiff"),
        PDF_MIME => Some("pdf"),
        _ => None,
    }
}

/// Reads one of the render inputs (template, dataset or field list) from disk.
pub fn read_input(path: &Path, what: &str) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("failed to read {}: {}", what, path.display()))
}
