use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub mod batch;
pub mod data;
pub mod dataset;
pub mod error;
pub mod fields;
pub mod logging;
pub mod render;
pub mod renderer;
pub mod settings;
pub mod template;
#[cfg(test)]
mod test_util;

pub use batch::{render_all, BatchItem, BatchRequest};
pub use dataset::{ColumnType, Dataset, Row, Value};
pub use error::{FieldWarning, FontFallback, RenderError};
pub use fields::{parse_fields, FieldSpec};
pub use render::{FontRegistry, FontSource, OutputFormat, Placement};
pub use renderer::{
    CertificateDetails, KeySelector, RenderOutput, RenderRequest, Renderer,
};
pub use template::{Dpi, Template};

#[derive(Debug, Clone)]
pub struct Config {
    pub template: String,
    pub data: String,
    pub fields: String,
    pub key_column: String,
    pub key: Option<String>,
    pub first: bool,
    pub all: bool,
    pub mode: Option<String>,
    pub certificate_id: String,
    pub output: Option<String>,
    pub details: bool,
    pub settings_path: Option<String>,
}

pub async fn run(config: Config) -> Result<String> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;

    let selector = key_selector(&config)?;
    let output_format = OutputFormat::from_mode(config.mode.as_deref())?;
    let template = data::read_input(Path::new(&config.template), "template")?;
    let dataset = data::read_input(Path::new(&config.data), "dataset")?;
    let fields_json = data::read_input(Path::new(&config.fields), "fields")?;
    let fields = parse_fields(&fields_json)?;

    let renderer = Arc::new(Renderer::from_settings(&settings));
    let output_dir = config
        .output
        .clone()
        .unwrap_or_else(|| settings.output_dir.clone());

    let Some(selector) = selector else {
        let request = BatchRequest {
            certificate_id: config.certificate_id,
            template,
            dataset,
            fields,
            key_column: config.key_column,
            output_format,
            threads: settings.effective_batch_threads(),
        };
        let items = render_all(renderer, request).await?;
        return write_batch(&items, Path::new(&output_dir));
    };

    let request = RenderRequest {
        certificate_id: config.certificate_id,
        template,
        dataset,
        fields,
        key_column: config.key_column,
        key: selector,
        output_format,
    };

    if config.details {
        let details = renderer.describe(request)?;
        return Ok(serde_json::to_string_pretty(&details)?);
    }

    let output = renderer.render(request)?;
    let path = single_output_path(config.output.as_deref(), &settings.output_dir, &output.filename);
    write_output(&path, &output.bytes)?;

    let mut lines = vec![format!(
        "{}\t{}\t{} bytes",
        path.display(),
        output.content_type,
        output.bytes.len()
    )];
    lines.extend(output.warnings.iter().map(|warning| format!("warning: {}", warning)));
    Ok(lines.join("\n"))
}

fn key_selector(config: &Config) -> Result<Option<KeySelector>> {
    let key = config
        .key
        .as_deref()
        .map(str::trim)
        .filter(|key| !key.is_empty());
    match (key, config.first, config.all) {
        (Some(key), false, false) => Ok(Some(KeySelector::Value(key.to_string()))),
        (None, true, false) => Ok(Some(KeySelector::First)),
        (None, false, true) => {
            if config.details {
                return Err(anyhow!("--details cannot be combined with --all"));
            }
            Ok(None)
        }
        _ => Err(anyhow!("exactly one of --key, --first or --all is required")),
    }
}

/// `--output` naming an existing directory (or ending in a separator) is
/// used as the directory for the generated filename.
fn single_output_path(output: Option<&str>, default_dir: &str, filename: &str) -> PathBuf {
    match output {
        Some(path) if path.ends_with('/') || Path::new(path).is_dir() => {
            Path::new(path).join(filename)
        }
        Some(path) => PathBuf::from(path),
        None => Path::new(default_dir).join(filename),
    }
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory: {}", parent.display()))?;
    }
    fs::write(path, bytes).with_context(|| format!("failed to write output: {}", path.display()))
}

fn write_batch(items: &[BatchItem], dir: &Path) -> Result<String> {
    let mut lines = Vec::new();
    let mut failed = 0usize;
    for item in items {
        match &item.result {
            Ok(output) => {
                let path = dir.join(&output.filename);
                write_output(&path, &output.bytes)?;
                lines.push(format!("{}\t{}", item.key_value, path.display()));
                lines.extend(
                    output
                        .warnings
                        .iter()
                        .map(|warning| format!("{}\twarning: {}", item.key_value, warning)),
                );
            }
            Err(err) => {
                failed += 1;
                lines.push(format!("{}\terror[{}]: {}", item.key_value, err.kind(), err));
            }
        }
    }
    lines.push(format!(
        "rendered {} of {} certificates",
        items.len() - failed,
        items.len()
    ));
    Ok(lines.join("\n"))
}
