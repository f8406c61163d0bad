use serde::Serialize;
use tracing::{debug, info, warn};

use crate::dataset::{Dataset, Row};
use crate::error::{FieldWarning, RenderError};
use crate::fields::FieldSpec;
use crate::render::{
    self, Canvas, FontRegistry, FontResolver, OutputFormat, Placement, ScaledField, Scene,
    TextColor,
};
use crate::settings::Settings;
use crate::template::Template;

/// Which dataset row a render is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySelector {
    Value(String),
    /// The first row, used for previews.
    First,
}

#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub certificate_id: String,
    pub template: Vec<u8>,
    pub dataset: Vec<u8>,
    pub fields: Vec<FieldSpec>,
    pub key_column: String,
    pub key: KeySelector,
    pub output_format: OutputFormat,
}

#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub filename: String,
    pub key_value: String,
    pub warnings: Vec<FieldWarning>,
    pub placements: Vec<Placement>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CertificateDetails {
    pub certificate_id: String,
    pub key_column: String,
    pub key_value: String,
    pub template: TemplateInfo,
    pub fields: Vec<FieldDetails>,
    pub warnings: Vec<FieldWarning>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateInfo {
    pub width: u32,
    pub height: u32,
    pub dpi: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldDetails {
    pub field_name: String,
    pub source_column: String,
    pub value: String,
    pub x: u32,
    pub y: u32,
    pub font_size: u32,
    pub font_color: String,
    pub font_family: String,
    pub scaled: ScaledField,
}

/// Decoded inputs shared by every row rendered from one certificate.
#[derive(Debug)]
pub(crate) struct PreparedCertificate {
    pub(crate) certificate_id: String,
    pub(crate) template: Template,
    pub(crate) dataset: Dataset,
    pub(crate) fields: Vec<FieldSpec>,
    pub(crate) key_column: String,
    pub(crate) output_format: OutputFormat,
}

impl PreparedCertificate {
    pub(crate) fn decode(
        certificate_id: String,
        template: Vec<u8>,
        dataset: &[u8],
        fields: Vec<FieldSpec>,
        key_column: String,
        output_format: OutputFormat,
    ) -> Result<Self, RenderError> {
        let template = Template::decode(template)?;
        let dataset = Dataset::parse(dataset)?;
        debug!(
            width = template.width(),
            height = template.height(),
            rows = dataset.len(),
            columns = %dataset.columns().join(","),
            "decoded certificate inputs"
        );
        Ok(Self {
            certificate_id,
            template,
            dataset,
            fields,
            key_column,
            output_format,
        })
    }

    fn select_row(&self, key: &KeySelector) -> Result<Row<'_>, RenderError> {
        let row = match key {
            KeySelector::Value(value) => self.dataset.lookup(&self.key_column, value),
            KeySelector::First => {
                if !self.dataset.has_column(&self.key_column) {
                    return Err(RenderError::Dataset(format!(
                        "key column '{}' not found in dataset",
                        self.key_column
                    )));
                }
                self.dataset.first_row().ok_or_else(|| RenderError::NotFound {
                    key_column: self.key_column.clone(),
                    key_value: "<first row>".to_string(),
                })
            }
        };
        match &row {
            Ok(row) => debug!(key_column = %self.key_column, ?key, row = row.index(), "matched row"),
            Err(err) if err.is_not_found() => debug!(
                key_column = %self.key_column,
                key_type = ?self.dataset.column_type(&self.key_column),
                ?key,
                "no matching row"
            ),
            Err(_) => {}
        }
        row
    }

    /// The caller's key when one was given, else the row's own key cell.
    fn key_value(&self, row: &Row<'_>, key: &KeySelector) -> String {
        match key {
            KeySelector::Value(value) => value.trim().to_string(),
            KeySelector::First => row
                .get(&self.key_column)
                .map(ToString::to_string)
                .unwrap_or_default(),
        }
    }
}

/// Stateless renderer. Holds only the font registry and its read-through
/// cache, so one instance can serve concurrent renders.
pub struct Renderer {
    fonts: FontResolver,
    fallback_color: TextColor,
}

impl Renderer {
    pub fn new(registry: FontRegistry) -> Self {
        Self {
            fonts: FontResolver::new(registry),
            fallback_color: TextColor::BLACK,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let fallback_color = render::parse_color(&settings.fallback_color).unwrap_or_else(|| {
            warn!(color = %settings.fallback_color, "invalid fallback color, using black");
            TextColor::BLACK
        });
        Self {
            fonts: FontResolver::new(FontRegistry::from_settings(settings)),
            fallback_color,
        }
    }

    pub fn render(&self, request: RenderRequest) -> Result<RenderOutput, RenderError> {
        let prepared = PreparedCertificate::decode(
            request.certificate_id,
            request.template,
            &request.dataset,
            request.fields,
            request.key_column,
            request.output_format,
        )?;
        self.render_prepared(&prepared, &request.key)
    }

    pub(crate) fn render_prepared(
        &self,
        prepared: &PreparedCertificate,
        key: &KeySelector,
    ) -> Result<RenderOutput, RenderError> {
        let row = prepared.select_row(key)?;
        let key_value = prepared.key_value(&row, key);

        let (scene, warnings) = self.compose(&prepared.template, &row, &prepared.fields);
        let pixmap = scene
            .rasterize()
            .map_err(|err| RenderError::Export(format!("{:#}", err)))?;
        let bytes = render::export(&pixmap, prepared.output_format)
            .map_err(|err| RenderError::Export(format!("{:#}", err)))?;

        let filename = output_filename(
            &prepared.certificate_id,
            &key_value,
            prepared.output_format,
        );
        info!(
            certificate = %prepared.certificate_id,
            key = %key_value,
            format = ?prepared.output_format,
            bytes = bytes.len(),
            warnings = warnings.len(),
            "rendered certificate"
        );
        Ok(RenderOutput {
            bytes,
            content_type: prepared.output_format.content_type(),
            filename,
            key_value,
            warnings,
            placements: scene.placements(),
        })
    }

    /// Draws every field in list order. Per-field problems become warnings.
    fn compose<'a>(
        &self,
        template: &'a Template,
        row: &Row<'_>,
        fields: &[FieldSpec],
    ) -> (Scene<'a>, Vec<FieldWarning>) {
        let canvas = Canvas::of(template);
        let mut scene = Scene::new(template);
        let mut warnings = Vec::new();

        for field in fields {
            let Some(text) = field_text(row, field, &mut warnings) else {
                continue;
            };
            let scaled = render::scale_field(field, &canvas);
            let font = self.fonts.resolve(&field.font_family, scaled.font_size);
            if let Some(fallback) = font.fallback() {
                warnings.push(FieldWarning::FontFallbackUsed {
                    field: field.field_name.clone(),
                    family: field.font_family.clone(),
                    fallback,
                });
            }
            let color = self.field_color(field, &mut warnings);
            let placement = scene.draw(&field.field_name, text, scaled, font, color);
            debug!(
                field = %placement.field,
                x = placement.x,
                y = placement.y,
                size = placement.font_size,
                font = %placement.font,
                "drew field"
            );
        }
        for warning in &warnings {
            warn!(field = warning.field(), "{}", warning);
        }
        (scene, warnings)
    }

    fn field_color(&self, field: &FieldSpec, warnings: &mut Vec<FieldWarning>) -> TextColor {
        if field.font_color.trim().is_empty() {
            return self.fallback_color;
        }
        render::parse_color(&field.font_color).unwrap_or_else(|| {
            warnings.push(FieldWarning::InvalidColor {
                field: field.field_name.clone(),
                color: field.font_color.clone(),
            });
            self.fallback_color
        })
    }

    /// Resolves a recipient's field values and geometry without drawing.
    pub fn describe(&self, request: RenderRequest) -> Result<CertificateDetails, RenderError> {
        let prepared = PreparedCertificate::decode(
            request.certificate_id,
            request.template,
            &request.dataset,
            request.fields,
            request.key_column,
            request.output_format,
        )?;
        let row = prepared.select_row(&request.key)?;
        let canvas = Canvas::of(&prepared.template);

        let mut warnings = Vec::new();
        let mut fields = Vec::new();
        for field in &prepared.fields {
            let Some(value) = field_text(&row, field, &mut warnings) else {
                continue;
            };
            fields.push(FieldDetails {
                field_name: field.field_name.clone(),
                source_column: field.source_column.clone(),
                value,
                x: field.x,
                y: field.y,
                font_size: field.font_size,
                font_color: field.font_color.clone(),
                font_family: field.font_family.clone(),
                scaled: render::scale_field(field, &canvas),
            });
        }

        Ok(CertificateDetails {
            key_value: prepared.key_value(&row, &request.key),
            certificate_id: prepared.certificate_id,
            key_column: prepared.key_column,
            template: TemplateInfo {
                width: prepared.template.width(),
                height: prepared.template.height(),
                dpi: prepared.template.dpi().map(|dpi| dpi.x),
            },
            fields,
            warnings,
        })
    }
}

fn field_text(row: &Row<'_>, field: &FieldSpec, warnings: &mut Vec<FieldWarning>) -> Option<String> {
    let Some(value) = row.get(&field.source_column) else {
        warnings.push(FieldWarning::ColumnMissing {
            field: field.field_name.clone(),
            column: field.source_column.clone(),
        });
        return None;
    };
    let raw = value.to_string();
    let text: String = raw.chars().filter(|ch| render::is_xml_char(*ch)).collect();
    let removed = raw.chars().count() - text.chars().count();
    if removed > 0 {
        warnings.push(FieldWarning::InvalidCharactersRemoved {
            field: field.field_name.clone(),
            column: field.source_column.clone(),
            removed,
        });
    }
    if value.is_empty() || text.trim().is_empty() {
        warnings.push(FieldWarning::EmptyValue {
            field: field.field_name.clone(),
            column: field.source_column.clone(),
        });
        return None;
    }
    Some(text)
}

/// `certificate_<id>_<key>.<ext>`, with path-hostile characters replaced.
pub fn output_filename(certificate_id: &str, key_value: &str, format: OutputFormat) -> String {
    format!(
        "certificate_{}_{}.{}",
        sanitize_component(certificate_id),
        sanitize_component(key_value),
        format.extension()
    )
}

fn sanitize_component(value: &str) -> String {
    value
        .trim()
        .chars()
        .map(|ch| {
            if ch.is_alphanumeric() || matches!(ch, '-' | '_' | '.') {
                ch
            } else {
                '_'
            }
        })
        .collect()
}
