#![allow(dead_code)]

use std::io::Cursor;

use certificate_renderer::{FieldSpec, FontRegistry, Renderer};

pub const ROSTER: &str = "\
roll_no,name,course,score
101,Asha Rao,Physics,91.5
102,Vikram Das,Chemistry,85
103,Meera Iyer,,NA
";

pub const FIELDS_JSON: &str = r##"[
  {"field_name": "Name", "csv_column": "name", "x": 500, "y": 500, "font_size": 40, "font_color": "#1a1a1a", "font_family": "Great Vibes"},
  {"field_name": "Course", "source_column": "course", "x": 500, "y": 620, "font_size": 20, "font_color": null, "font_family": null},
  {"field_name": "Mentor", "source_column": "mentor", "x": 500, "y": 800, "font_size": 16}
]"##;

pub fn fields() -> Vec<FieldSpec> {
    certificate_renderer::parse_fields(FIELDS_JSON.as_bytes()).expect("fields fixture")
}

/// Renderer with no font sources, so every field uses the builtin face.
pub fn offline_renderer() -> Renderer {
    Renderer::new(FontRegistry::new())
}

pub fn white_png(width: u32, height: u32) -> Vec<u8> {
    let pixels = vec![255u8; (width * height * 3) as usize];
    let mut bytes = Vec::new();
    {
        let mut encoder = png::Encoder::new(Cursor::new(&mut bytes), width, height);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().expect("png header");
        writer.write_image_data(&pixels).expect("png data");
    }
    bytes
}

const DEJAVU_DIR: &str = "/usr/share/fonts/truetype/dejavu";

/// Path of an installed DejaVu face, when the host has the package.
pub fn dejavu_path(file: &str) -> Option<std::path::PathBuf> {
    let path = std::path::Path::new(DEJAVU_DIR).join(file);
    path.is_file().then_some(path)
}
