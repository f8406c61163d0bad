use serde::Serialize;
use thiserror::Error;

/// Terminal failure of a render. A failed render never carries image bytes.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no row where {key_column} = {key_value}")]
    NotFound {
        key_column: String,
        key_value: String,
    },
    #[error("dataset error: {0}")]
    Dataset(String),
    #[error("template decode error: {0}")]
    TemplateDecode(String),
    #[error("unsupported output format '{0}'")]
    UnsupportedFormat(String),
    #[error("export error: {0}")]
    Export(String),
}

impl RenderError {
    pub fn kind(&self) -> &'static str {
        match self {
            RenderError::NotFound { .. } => "not_found",
            RenderError::Dataset(_) => "dataset_error",
            RenderError::TemplateDecode(_) => "template_decode_error",
            RenderError::UnsupportedFormat(_) => "unsupported_format",
            RenderError::Export(_) => "export_error",
        }
    }

    /// Status code the HTTP layer is expected to answer with.
    pub fn status_hint(&self) -> u16 {
        match self {
            RenderError::NotFound { .. } => 404,
            RenderError::Dataset(_)
            | RenderError::TemplateDecode(_)
            | RenderError::UnsupportedFormat(_) => 400,
            RenderError::Export(_) => 500,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RenderError::NotFound { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FontFallback {
    DefaultFace,
    BuiltinBitmap,
}

/// Degraded per-field condition. The field was skipped or drawn with a
/// substitute font; the render itself still succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldWarning {
    FontFallbackUsed {
        field: String,
        family: String,
        fallback: FontFallback,
    },
    ColumnMissing {
        field: String,
        column: String,
    },
    EmptyValue {
        field: String,
        column: String,
    },
    InvalidColor {
        field: String,
        color: String,
    },
    /// Characters that cannot appear in the scene (C0 controls other than
    /// tab and newlines, U+FFFE, U+FFFF) were dropped from the value.
    InvalidCharactersRemoved {
        field: String,
        column: String,
        removed: usize,
    },
}

impl FieldWarning {
    pub fn field(&self) -> &str {
        match self {
            FieldWarning::FontFallbackUsed { field, .. }
            | FieldWarning::ColumnMissing { field, .. }
            | FieldWarning::EmptyValue { field, .. }
            | FieldWarning::InvalidColor { field, .. }
            | FieldWarning::InvalidCharactersRemoved { field, .. } => field,
        }
    }
}

impl std::fmt::Display for FieldWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldWarning::FontFallbackUsed {
                field,
                family,
                fallback,
            } => {
                let used = match fallback {
                    FontFallback::DefaultFace => "default face",
                    FontFallback::BuiltinBitmap => "builtin bitmap font",
                };
                write!(f, "field '{}': font '{}' unavailable, used {}", field, family, used)
            }
            FieldWarning::ColumnMissing { field, column } => {
                write!(f, "field '{}': column '{}' not in dataset, skipped", field, column)
            }
            FieldWarning::EmptyValue { field, column } => {
                write!(f, "field '{}': column '{}' is empty for this row, skipped", field, column)
            }
            FieldWarning::InvalidColor { field, color } => {
                write!(f, "field '{}': color '{}' not recognized, used fallback", field, color)
            }
            FieldWarning::InvalidCharactersRemoved {
                field,
                column,
                removed,
            } => write!(
                f,
                "field '{}': removed {} invalid character(s) from column '{}'",
                field, removed, column
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_distinct_from_input_errors() {
        let miss = RenderError::NotFound {
            key_column: "roll_no".to_string(),
            key_value: "9999".to_string(),
        };
        assert!(miss.is_not_found());
        assert_eq!(miss.kind(), "not_found");
        assert_eq!(miss.status_hint(), 404);

        let bad = RenderError::Dataset("ragged row".to_string());
        assert!(!bad.is_not_found());
        assert_eq!(bad.status_hint(), 400);
        assert_eq!(RenderError::Export("x".to_string()).status_hint(), 500);
    }

    #[test]
    fn warnings_serialize_with_kind_tag() {
        let warning = FieldWarning::FontFallbackUsed {
            field: "Name".to_string(),
            family: "Great Vibes".to_string(),
            fallback: FontFallback::BuiltinBitmap,
        };
        let value = serde_json::to_value(&warning).expect("serialize");
        assert_eq!(value["kind"], "font_fallback_used");
        assert_eq!(value["fallback"], "builtin_bitmap");
        assert_eq!(warning.field(), "Name");
    }
}
