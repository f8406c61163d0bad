use image::GenericImageView;
use std::io::Cursor;

use crate::data;
use crate::error::RenderError;

const METERS_PER_INCH: f64 = 0.0254;
const CM_PER_INCH: f64 = 2.54;

/// Horizontal and vertical resolution in dots per inch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dpi {
    pub x: f64,
    pub y: f64,
}

/// Decoded template image. Immutable once loaded; compositing works on a
/// copy embedded in the render scene.
#[derive(Debug, Clone)]
pub struct Template {
    bytes: Vec<u8>,
    mime: &'static str,
    width: u32,
    height: u32,
    dpi: Option<Dpi>,
}

impl Template {
    pub fn decode(bytes: Vec<u8>) -> Result<Self, RenderError> {
        let format = image::guess_format(&bytes)
            .map_err(|err| RenderError::TemplateDecode(format!("unknown image format: {}", err)))?;
        let mime = data::mime_from_image_format(format).ok_or_else(|| {
            RenderError::TemplateDecode(format!("unsupported template format: {:?}", format))
        })?;
        let image = image::load_from_memory_with_format(&bytes, format)
            .map_err(|err| RenderError::TemplateDecode(format!("failed to decode template: {}", err)))?;
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(RenderError::TemplateDecode("template has no pixels".to_string()));
        }

        let dpi = match format {
            image::ImageFormat::Png => png_dpi(&bytes),
            image::ImageFormat::Jpeg => jfif_dpi(&bytes),
            _ => None,
        };

        // The scene rasterizer only reads PNG, JPEG and GIF reliably.
        let (bytes, mime) = if matches!(mime, data::PNG_MIME | data::JPEG_MIME | data::GIF_MIME) {
            (bytes, mime)
        } else {
            let mut png = Vec::new();
            image
                .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
                .map_err(|err| {
                    RenderError::TemplateDecode(format!("failed to normalize template: {}", err))
                })?;
            (png, data::PNG_MIME)
        };

        Ok(Self {
            bytes,
            mime,
            width,
            height,
            dpi,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Resolution from the file metadata, if it carries any.
    pub fn dpi(&self) -> Option<Dpi> {
        self.dpi
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime(&self) -> &'static str {
        self.mime
    }
}

fn png_dpi(bytes: &[u8]) -> Option<Dpi> {
    let decoder = png::Decoder::new(Cursor::new(bytes));
    let reader = decoder.read_info().ok()?;
    let dims = reader.info().pixel_dims?;
    if dims.unit != png::Unit::Meter || dims.xppu == 0 || dims.yppu == 0 {
        return None;
    }
    Some(Dpi {
        x: dims.xppu as f64 * METERS_PER_INCH,
        y: dims.yppu as f64 * METERS_PER_INCH,
    })
}

/// Reads the density from a JFIF APP0 segment.
fn jfif_dpi(bytes: &[u8]) -> Option<Dpi> {
    if bytes.len() < 4 || bytes[0] != 0xFF || bytes[1] != 0xD8 {
        return None;
    }
    let mut pos = 2;
    while pos + 4 <= bytes.len() {
        if bytes[pos] != 0xFF {
            return None;
        }
        let marker = bytes[pos + 1];
        let len = u16::from_be_bytes([bytes[pos + 2], bytes[pos + 3]]) as usize;
        let body_start = pos + 4;
        let body_end = pos + 2 + len;
        if len < 2 || body_end > bytes.len() {
            return None;
        }
        if marker == 0xE0 {
            let body = &bytes[body_start..body_end];
            if body.len() >= 12 && &body[..5] == b"JFIF\0" {
                let units = body[7];
                let x = u16::from_be_bytes([body[8], body[9]]) as f64;
                let y = u16::from_be_bytes([body[10], body[11]]) as f64;
                if x == 0.0 || y == 0.0 {
                    return None;
                }
                return match units {
                    1 => Some(Dpi { x, y }),
                    2 => Some(Dpi {
                        x: x * CM_PER_INCH,
                        y: y * CM_PER_INCH,
                    }),
                    _ => None,
                };
            }
        }
        // Start of scan: metadata segments are over.
        if marker == 0xDA {
            return None;
        }
        pos = body_end;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{blank_png, blank_png_with_dpi};

    #[test]
    fn decodes_dimensions_and_png_resolution() {
        let template = Template::decode(blank_png_with_dpi(40, 30, 150)).expect("decode");
        assert_eq!((template.width(), template.height()), (40, 30));
        let dpi = template.dpi().expect("dpi");
        assert!((dpi.x - 150.0).abs() < 0.5, "dpi.x = {}", dpi.x);
        assert_eq!(template.mime(), data::PNG_MIME);
    }

    #[test]
    fn png_without_phys_has_no_resolution() {
        let template = Template::decode(blank_png(8, 8)).expect("decode");
        assert!(template.dpi().is_none());
    }

    #[test]
    fn reads_jfif_density() {
        let image = image::RgbImage::from_pixel(16, 16, image::Rgb([255, 255, 255]));
        let mut jpeg = Vec::new();
        image::DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut jpeg), image::ImageFormat::Jpeg)
            .expect("encode jpeg");
        // Patch the encoder's JFIF header to 72 dpi.
        let app0 = jpeg
            .windows(5)
            .position(|window| window == b"JFIF\0")
            .expect("jfif header");
        jpeg[app0 + 7] = 1;
        jpeg[app0 + 8..app0 + 10].copy_from_slice(&72u16.to_be_bytes());
        jpeg[app0 + 10..app0 + 12].copy_from_slice(&72u16.to_be_bytes());

        let template = Template::decode(jpeg).expect("decode");
        assert_eq!(template.dpi(), Some(Dpi { x: 72.0, y: 72.0 }));
    }

    #[test]
    fn garbage_is_template_decode_error() {
        let err = Template::decode(b"not an image".to_vec()).unwrap_err();
        assert_eq!(err.kind(), "template_decode_error");
    }

    #[test]
    fn truncated_png_is_template_decode_error() {
        let mut bytes = blank_png(32, 32);
        bytes.truncate(bytes.len() / 2);
        let err = Template::decode(bytes).unwrap_err();
        assert_eq!(err.kind(), "template_decode_error");
    }
}
