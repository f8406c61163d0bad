use anyhow::{anyhow, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use serde::Serialize;
use tiny_skia::{Color, Pixmap, PixmapPaint, Transform};

use super::geom::REFERENCE_DPI;
use crate::data;
use crate::error::RenderError;

const METERS_PER_INCH: f64 = 0.0254;
const MM_PER_INCH: f32 = 25.4;
/// DCT quality for the document image; text edges stay clean at this level.
const JPEG_QUALITY: u8 = 92;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Raster,
    Document,
}

impl OutputFormat {
    /// Maps the caller's mode token. An absent token means raster.
    pub fn from_mode(mode: Option<&str>) -> Result<Self, RenderError> {
        let token = mode.map(|value| value.trim().to_ascii_lowercase()).unwrap_or_default();
        match token.as_str() {
            "" | "preview" | "default" | "png" | "raster" => Ok(OutputFormat::Raster),
            "pdf" | "document" => Ok(OutputFormat::Document),
            _ => Err(RenderError::UnsupportedFormat(token)),
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            OutputFormat::Raster => data::PNG_MIME,
            OutputFormat::Document => data::PDF_MIME,
        }
    }

    pub fn extension(self) -> &'static str {
        data::extension_from_mime(self.content_type()).unwrap_or("bin")
    }
}

/// Serializes the composited image. The whole output is buffered.
pub fn export(pixmap: &Pixmap, format: OutputFormat) -> Result<Vec<u8>> {
    match format {
        OutputFormat::Raster => encode_png(pixmap),
        OutputFormat::Document => encode_pdf(pixmap),
    }
}

fn encode_png(pixmap: &Pixmap) -> Result<Vec<u8>> {
    let mut rgba = Vec::with_capacity(pixmap.data().len());
    for pixel in pixmap.pixels() {
        let color = pixel.demultiply();
        rgba.extend_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
    }

    let ppm = (REFERENCE_DPI / METERS_PER_INCH).round() as u32;
    let mut bytes = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut bytes, pixmap.width(), pixmap.height());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_pixel_dims(Some(png::PixelDimensions {
            xppu: ppm,
            yppu: ppm,
            unit: png::Unit::Meter,
        }));
        let mut writer = encoder
            .write_header()
            .with_context(|| "failed to write png header")?;
        writer
            .write_image_data(&rgba)
            .with_context(|| "failed to encode png")?;
        writer.finish().with_context(|| "failed to finish png")?;
    }
    Ok(bytes)
}

fn encode_pdf(pixmap: &Pixmap) -> Result<Vec<u8>> {
    use printpdf::{
        ColorBits, ColorSpace, Image, ImageFilter, ImageTransform, ImageXObject, Mm, PdfDocument,
        Px,
    };

    // Documents carry no alpha: flatten onto white first.
    let mut flat = Pixmap::new(pixmap.width(), pixmap.height())
        .ok_or_else(|| anyhow!("failed to allocate document canvas"))?;
    flat.fill(Color::WHITE);
    flat.draw_pixmap(
        0,
        0,
        pixmap.as_ref(),
        &PixmapPaint::default(),
        Transform::identity(),
        None,
    );
    let mut rgb = Vec::with_capacity(flat.pixels().len() * 3);
    for pixel in flat.pixels() {
        rgb.extend_from_slice(&[pixel.red(), pixel.green(), pixel.blue()]);
    }

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
        .encode(&rgb, flat.width(), flat.height(), ExtendedColorType::Rgb8)
        .with_context(|| "failed to encode certificate image")?;

    let width_mm = px_to_mm(pixmap.width());
    let height_mm = px_to_mm(pixmap.height());
    let (doc, page, layer) =
        PdfDocument::new("certificate", Mm(width_mm), Mm(height_mm), "Layer 1");
    let current_layer = doc.get_page(page).get_layer(layer);
    let pdf_image = Image::from(ImageXObject {
        width: Px(flat.width() as usize),
        height: Px(flat.height() as usize),
        color_space: ColorSpace::Rgb,
        bits_per_component: ColorBits::Bit8,
        interpolate: true,
        image_data: jpeg,
        image_filter: Some(ImageFilter::DCT),
        clipping_bbox: None,
    });
    let transform = ImageTransform {
        translate_x: Some(Mm(0.0)),
        translate_y: Some(Mm(0.0)),
        rotate: None,
        scale_x: Some(1.0),
        scale_y: Some(1.0),
        dpi: Some(REFERENCE_DPI as f32),
    };
    pdf_image.add_to_layer(current_layer, transform);

    let mut buffer = Vec::new();
    {
        let mut writer = std::io::BufWriter::new(&mut buffer);
        doc.save(&mut writer).with_context(|| "failed to write pdf")?;
    }
    Ok(buffer)
}

fn px_to_mm(px: u32) -> f32 {
    let inches = px as f32 / REFERENCE_DPI as f32;
    inches * MM_PER_INCH
}
