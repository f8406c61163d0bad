use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};

/// Placement and style of one dataset column on the certificate, authored
/// against the reference canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Display label only; never used for lookup.
    pub field_name: String,
    #[serde(alias = "csv_column")]
    pub source_column: String,
    pub x: u32,
    pub y: u32,
    pub font_size: u32,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub font_color: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub font_family: String,
}

impl FieldSpec {
    pub fn new(field_name: &str, source_column: &str, x: u32, y: u32, font_size: u32) -> Self {
        Self {
            field_name: field_name.to_string(),
            source_column: source_column.to_string(),
            x,
            y,
            font_size,
            font_color: String::new(),
            font_family: String::new(),
        }
    }

    pub fn with_color(mut self, color: &str) -> Self {
        self.font_color = color.to_string();
        self
    }

    pub fn with_family(mut self, family: &str) -> Self {
        self.font_family = family.to_string();
        self
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parses the JSON array of field definitions that accompanies a template.
pub fn parse_fields(json: &[u8]) -> Result<Vec<FieldSpec>> {
    serde_json::from_slice(json).with_context(|| "failed to parse field definitions")
}
