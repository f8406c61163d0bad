use anyhow::{anyhow, Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use resvg::render;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tiny_skia::Pixmap;
use usvg::{Options, Tree, fontdb};

use super::bitmap;
use super::color::TextColor;
use super::font::{FontFace, FontHandle};
use super::geom::ScaledField;
use crate::template::Template;

/// Where a field's text ended up, in template pixels. The text box is
/// centered on (`x`, `y`). `font_size` is the scaled size the field asked
/// for; `glyph_size` is what the chosen face actually drew at.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Placement {
    pub field: String,
    pub text: String,
    pub x: u32,
    pub y: u32,
    pub font_size: f32,
    pub glyph_size: f32,
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
    pub font: String,
    pub color: String,
}

struct SceneItem {
    placement: Placement,
    font: FontHandle,
    color: TextColor,
    baseline: f32,
}

/// Working copy of a template with text drawn over it, in draw order.
pub struct Scene<'a> {
    template: &'a Template,
    items: Vec<SceneItem>,
}

impl<'a> Scene<'a> {
    pub fn new(template: &'a Template) -> Self {
        Self {
            template,
            items: Vec::new(),
        }
    }

    pub fn draw(
        &mut self,
        field: &str,
        text: String,
        at: ScaledField,
        font: FontHandle,
        color: TextColor,
    ) -> &Placement {
        let width = font.text_width(&text);
        let (ascent, descent) = font.vertical_extent();
        let height = ascent + descent;
        let left = at.x as f32 - width / 2.0;
        let top = at.y as f32 - height / 2.0;
        let placement = Placement {
            field: field.to_string(),
            text,
            x: at.x,
            y: at.y,
            font_size: at.font_size as f32,
            glyph_size: font.size(),
            left,
            top,
            width,
            height,
            font: font.family().unwrap_or("builtin").to_string(),
            color: color.to_hex(),
        };
        self.items.push(SceneItem {
            placement,
            font,
            color,
            baseline: top + ascent,
        });
        &self.items[self.items.len() - 1].placement
    }

    pub fn placements(&self) -> Vec<Placement> {
        self.items.iter().map(|item| item.placement.clone()).collect()
    }

    pub fn to_svg(&self) -> String {
        let width = self.template.width();
        let height = self.template.height();
        let encoded = BASE64.encode(self.template.bytes());
        let data_uri = format!("data:{};base64,{}", self.template.mime(), encoded);

        let mut svg = String::new();
        svg.push_str(&format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = width,
            h = height
        ));
        svg.push_str(&format!(
            r#"<image href="{uri}" xlink:href="{uri}" x="0" y="0" width="{w}" height="{h}" preserveAspectRatio="none"/>"#,
            uri = data_uri,
            w = width,
            h = height
        ));

        for item in &self.items {
            let placement = &item.placement;
            let fill = item.color.to_hex();
            let opacity = item.color.opacity();
            match item.font.face() {
                FontFace::Outline(metrics) => {
                    svg.push_str(&format!(
                        r#"<text x="{x}" y="{y}" font-size="{size}" font-family="{family}" font-weight="{weight}" font-style="{style}" font-stretch="{stretch}" fill="{fill}" fill-opacity="{opacity}" text-anchor="middle" xml:space="preserve">{text}</text>"#,
                        x = placement.x,
                        y = item.baseline,
                        size = placement.glyph_size,
                        family = escape_xml(metrics.family()),
                        weight = metrics.weight(),
                        style = metrics.svg_style(),
                        stretch = metrics.svg_stretch(),
                        fill = fill,
                        opacity = opacity,
                        text = escape_xml(&placement.text)
                    ));
                }
                FontFace::Bitmap => {
                    let path = bitmap::path_data(&placement.text, placement.left, placement.top);
                    if path.is_empty() {
                        continue;
                    }
                    svg.push_str(&format!(
                        r#"<path d="{d}" fill="{fill}" fill-opacity="{opacity}"/>"#,
                        d = path,
                        fill = fill,
                        opacity = opacity
                    ));
                }
            }
        }

        svg.push_str("</svg>");
        svg
    }

    pub fn rasterize(&self) -> Result<Pixmap> {
        let mut db = fontdb::Database::new();
        let mut loaded = HashSet::new();
        for item in &self.items {
            if let FontFace::Outline(metrics) = item.font.face() {
                // Same-family variants are distinct faces; key by data, not name.
                if loaded.insert(metrics.face_key()) {
                    db.load_font_source(fontdb::Source::Binary(metrics.shared_data()));
                }
            }
        }
        let options = Options {
            fontdb: Arc::new(db),
            ..Options::default()
        };
        let svg = self.to_svg();
        let tree = Tree::from_str(&svg, &options).with_context(|| "failed to parse render scene")?;
        let mut pixmap = Pixmap::new(self.template.width(), self.template.height())
            .ok_or_else(|| anyhow!("failed to allocate canvas"))?;
        let mut pixmap_mut = pixmap.as_mut();
        render(&tree, tiny_skia::Transform::identity(), &mut pixmap_mut);
        Ok(pixmap)
    }
}

/// Characters allowed in XML 1.0 documents.
pub fn is_xml_char(ch: char) -> bool {
    matches!(ch, '\t' | '\n' | '\r')
        || ('\u{20}'..='\u{D7FF}').contains(&ch)
        || ('\u{E000}'..='\u{FFFD}').contains(&ch)
        || ch >= '\u{10000}'
}

fn escape_xml(value: &str) -> String {
    value
        .chars()
        .filter(|ch| is_xml_char(*ch))
        .collect::<String>()
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
