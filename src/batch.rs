use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::error::RenderError;
use crate::fields::FieldSpec;
use crate::render::OutputFormat;
use crate::renderer::{KeySelector, PreparedCertificate, RenderOutput, Renderer};

/// Every recipient of one certificate, rendered from the same inputs.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub certificate_id: String,
    pub template: Vec<u8>,
    pub dataset: Vec<u8>,
    pub fields: Vec<FieldSpec>,
    pub key_column: String,
    pub output_format: OutputFormat,
    pub threads: usize,
}

#[derive(Debug)]
pub struct BatchItem {
    pub key_value: String,
    pub result: Result<RenderOutput, RenderError>,
}

/// Renders one certificate per distinct key value, in dataset order.
///
/// Template and dataset are decoded once; a failure there aborts the whole
/// batch. Per-row failures are reported on the matching item.
pub async fn render_all(
    renderer: Arc<Renderer>,
    request: BatchRequest,
) -> Result<Vec<BatchItem>, RenderError> {
    let prepared = Arc::new(PreparedCertificate::decode(
        request.certificate_id,
        request.template,
        &request.dataset,
        request.fields,
        request.key_column,
        request.output_format,
    )?);
    let keys = prepared.dataset.key_values(&prepared.key_column)?;
    if prepared.dataset.is_empty() {
        warn!(certificate = %prepared.certificate_id, "dataset has no rows, nothing to render");
    }
    let concurrency = request.threads.max(1);
    info!(
        certificate = %prepared.certificate_id,
        rows = keys.len(),
        concurrency,
        "starting batch render"
    );

    let mut items: Vec<(usize, BatchItem)> = stream::iter(keys.into_iter().enumerate())
        .map(|(idx, key_value)| {
            let renderer = Arc::clone(&renderer);
            let prepared = Arc::clone(&prepared);
            async move {
                let selector = KeySelector::Value(key_value.clone());
                let result = tokio::task::spawn_blocking(move || {
                    renderer.render_prepared(&prepared, &selector)
                })
                .await
                .unwrap_or_else(|err| Err(RenderError::Export(format!("render task failed: {}", err))));
                if let Err(err) = &result {
                    warn!(key = %key_value, error = %err, "batch row failed");
                }
                (idx, BatchItem { key_value, result })
            }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    items.sort_by_key(|(idx, _)| *idx);
    Ok(items.into_iter().map(|(_, item)| item).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::FontRegistry;
    use crate::test_util::blank_png;

    fn request(dataset: &str, threads: usize) -> BatchRequest {
        BatchRequest {
            certificate_id: "3".to_string(),
            template: blank_png(200, 100),
            dataset: dataset.as_bytes().to_vec(),
            fields: vec![FieldSpec::new("Name", "name", 500, 500, 30)],
            key_column: "roll_no".to_string(),
            output_format: OutputFormat::Raster,
            threads,
        }
    }

    #[tokio::test]
    async fn renders_each_distinct_key_in_order() {
        let renderer = Arc::new(Renderer::new(FontRegistry::new()));
        let items = render_all(
            renderer,
            request("roll_no,name\n5,Eve\n3,Cy\n5,Dup\n9,\n", 4),
        )
        .await
        .expect("batch");

        let keys: Vec<&str> = items.iter().map(|item| item.key_value.as_str()).collect();
        assert_eq!(keys, vec!["5", "3", "9"]);
        let first = items[0].result.as_ref().expect("first row");
        assert_eq!(first.filename, "certificate_3_5.png");
        assert_eq!(first.placements[0].text, "Eve");
        let empty = items[2].result.as_ref().expect("empty name still renders");
        assert!(empty.placements.is_empty());
        assert_eq!(empty.warnings.len(), 1);
    }

    #[tokio::test]
    async fn unknown_key_column_aborts_batch() {
        let renderer = Arc::new(Renderer::new(FontRegistry::new()));
        let mut bad = request("id,name\n1,Ann\n", 1);
        bad.key_column = "roll_no".to_string();
        let err = render_all(renderer, bad).await.expect_err("no key column");
        assert_eq!(err.kind(), "dataset_error");
    }
}
