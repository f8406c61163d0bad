use serde::Serialize;

use crate::fields::FieldSpec;
use crate::template::{Dpi, Template};

/// Width and height of the canvas field positions are authored against.
pub const REFERENCE_SIZE: f64 = 1000.0;
/// Resolution of the reference canvas, also embedded in every export.
pub const REFERENCE_DPI: f64 = 300.0;

/// Pixel geometry of the template a field is scaled onto.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
    pub dpi: Dpi,
}

impl Canvas {
    /// A missing or zero resolution counts as the reference resolution.
    pub fn new(width: u32, height: u32, dpi: Option<Dpi>) -> Self {
        let dpi = dpi
            .filter(|dpi| dpi.x > 0.0 && dpi.y > 0.0)
            .unwrap_or(Dpi {
                x: REFERENCE_DPI,
                y: REFERENCE_DPI,
            });
        Self { width, height, dpi }
    }

    pub fn of(template: &Template) -> Self {
        Self::new(template.width(), template.height(), template.dpi())
    }

    pub fn size_factor(&self) -> f64 {
        self.width.min(self.height) as f64 / REFERENCE_SIZE
    }

    pub fn dpi_scale(&self) -> f64 {
        REFERENCE_DPI / self.dpi.x
    }
}

/// Field position and font size in template pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScaledField {
    pub x: u32,
    pub y: u32,
    pub font_size: u32,
}

pub fn scale_field(field: &FieldSpec, canvas: &Canvas) -> ScaledField {
    let x = (field.x as f64 * canvas.width as f64 / REFERENCE_SIZE).round();
    let y = (field.y as f64 * canvas.height as f64 / REFERENCE_SIZE).round();
    let font_size =
        (field.font_size as f64 * canvas.size_factor() * canvas.dpi_scale()).round().max(1.0);
    ScaledField {
        x: x as u32,
        y: y as u32,
        font_size: font_size as u32,
    }
}
