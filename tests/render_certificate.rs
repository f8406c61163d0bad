mod common;

use std::io::Cursor;
use std::sync::Arc;

use certificate_renderer::{
    BatchRequest, FieldWarning, FontFallback, FontRegistry, FontSource, KeySelector, OutputFormat,
    RenderRequest, Renderer,
};
use common::{dejavu_path, fields, offline_renderer, white_png, ROSTER};

fn request(template: Vec<u8>, key: &str, output_format: OutputFormat) -> RenderRequest {
    RenderRequest {
        certificate_id: "42".to_string(),
        template,
        dataset: ROSTER.as_bytes().to_vec(),
        fields: fields(),
        key_column: "roll_no".to_string(),
        key: KeySelector::Value(key.to_string()),
        output_format,
    }
}

#[test]
fn name_is_centered_on_scaled_reference_point() {
    let renderer = offline_renderer();
    let output = renderer
        .render(request(white_png(2000, 1500), "101", OutputFormat::Raster))
        .expect("render");

    let name = &output.placements[0];
    assert_eq!(name.text, "Asha Rao");
    assert_eq!((name.x, name.y), (1000, 750));
    assert_eq!(name.font_size, 60.0);
    assert_eq!(name.font, "builtin");
    assert!((name.left + name.width / 2.0 - 1000.0).abs() < 0.5);
    assert!((name.top + name.height / 2.0 - 750.0).abs() < 0.5);
    assert_eq!(name.color, "#1a1a1a");

    assert!(output.warnings.contains(&FieldWarning::FontFallbackUsed {
        field: "Name".to_string(),
        family: "Great Vibes".to_string(),
        fallback: FontFallback::BuiltinBitmap,
    }));
    assert!(output.warnings.contains(&FieldWarning::ColumnMissing {
        field: "Mentor".to_string(),
        column: "mentor".to_string(),
    }));
}

#[test]
fn raster_output_keeps_template_size_and_marks_300_dpi() {
    let renderer = offline_renderer();
    let output = renderer
        .render(request(white_png(400, 300), "102", OutputFormat::Raster))
        .expect("render");
    assert_eq!(output.content_type, "image/png");
    assert_eq!(output.filename, "certificate_42_102.png");

    let decoder = png::Decoder::new(Cursor::new(&output.bytes));
    let mut reader = decoder.read_info().expect("png info");
    let dims = reader.info().pixel_dims.expect("pHYs chunk");
    assert_eq!(dims.xppu, 11811);
    assert_eq!((reader.info().width, reader.info().height), (400, 300));

    let mut buf = vec![0; reader.output_buffer_size()];
    let frame = reader.next_frame(&mut buf).expect("frame");
    let pixels = &buf[..frame.buffer_size()];
    assert!(
        pixels.iter().any(|channel| *channel < 128),
        "expected text to darken some pixels"
    );
}

#[test]
fn document_output_is_a_pdf() {
    let renderer = offline_renderer();
    let output = renderer
        .render(request(white_png(400, 300), "101", OutputFormat::Document))
        .expect("render");
    assert_eq!(output.content_type, "application/pdf");
    assert_eq!(output.filename, "certificate_42_101.pdf");
    assert!(output.bytes.starts_with(b"%PDF"));

    let doc = printpdf::lopdf::Document::load_mem(&output.bytes).expect("parse pdf");
    let pages = doc.get_pages();
    assert_eq!(pages.len(), 1);
    let page_id = *pages.values().next().expect("page");
    let media_box: Vec<f32> = doc
        .get_object(page_id)
        .and_then(|page| page.as_dict())
        .and_then(|page| page.get(b"MediaBox"))
        .and_then(|media_box| media_box.as_array())
        .expect("media box")
        .iter()
        .map(|value| value.as_float().expect("number"))
        .collect();
    // 400 x 300 px at 300 DPI, in points.
    assert!((media_box[2] - 96.0).abs() < 0.01, "{:?}", media_box);
    assert!((media_box[3] - 72.0).abs() < 0.01, "{:?}", media_box);
    assert!(output.bytes.windows(9).any(|window| window == b"DCTDecode"));
}

#[test]
fn registered_outline_font_draws_at_scaled_size() {
    let Some(path) = dejavu_path("DejaVuSans.ttf") else {
        eprintln!("DejaVu fonts not installed; skipping outline check");
        return;
    };
    let renderer =
        Renderer::new(FontRegistry::new().with_family("Great Vibes", FontSource::Path(path)));
    let output = renderer
        .render(request(white_png(2000, 1500), "101", OutputFormat::Raster))
        .expect("render");

    let name = &output.placements[0];
    assert_eq!(name.font, "DejaVu Sans");
    assert_eq!((name.x, name.y), (1000, 750));
    assert_eq!(name.font_size, 60.0);
    assert_eq!(name.glyph_size, 60.0);
    assert!((name.left + name.width / 2.0 - 1000.0).abs() < 0.5);
    assert!(!output
        .warnings
        .iter()
        .any(|warning| warning.field() == "Name"));

    let image = image::load_from_memory(&output.bytes).expect("png").to_rgb8();
    let top = name.top.max(0.0) as u32;
    let bottom = (name.top + name.height) as u32;
    let ink = (top..bottom)
        .flat_map(|y| (0..image.width()).map(move |x| (x, y)))
        .filter(|&(x, y)| image.get_pixel(x, y).0[0] < 128)
        .count();
    assert!(ink > 100, "only {} dark pixels in the name box", ink);
}

#[test]
fn unknown_key_is_not_found() {
    let renderer = offline_renderer();
    let err = renderer
        .render(request(white_png(400, 300), "9999", OutputFormat::Raster))
        .expect_err("missing row");
    assert!(err.is_not_found());
    assert_eq!(err.status_hint(), 404);
}

#[test]
fn empty_cells_skip_the_field() {
    let renderer = offline_renderer();
    let output = renderer
        .render(request(white_png(400, 300), "103", OutputFormat::Raster))
        .expect("render");
    let drawn: Vec<&str> = output.placements.iter().map(|p| p.field.as_str()).collect();
    assert_eq!(drawn, vec!["Name"]);
    assert!(output.warnings.contains(&FieldWarning::EmptyValue {
        field: "Course".to_string(),
        column: "course".to_string(),
    }));
}

#[test]
fn unsupported_mode_is_rejected() {
    let err = OutputFormat::from_mode(Some("tiff")).expect_err("unsupported");
    assert_eq!(err.kind(), "unsupported_format");
}

#[test]
fn details_snapshot() {
    let renderer = offline_renderer();
    let details = renderer
        .describe(request(white_png(2000, 1500), "101", OutputFormat::Raster))
        .expect("details");
    let details_json = serde_json::to_string_pretty(&details).expect("json");
    insta::assert_snapshot!(details_json);
}

#[tokio::test]
async fn batch_renders_every_recipient() {
    let renderer = Arc::new(offline_renderer());
    let items = certificate_renderer::render_all(
        renderer,
        BatchRequest {
            certificate_id: "42".to_string(),
            template: white_png(200, 150),
            dataset: ROSTER.as_bytes().to_vec(),
            fields: fields(),
            key_column: "roll_no".to_string(),
            output_format: OutputFormat::Raster,
            threads: 2,
        },
    )
    .await
    .expect("batch");

    let names: Vec<String> = items
        .iter()
        .map(|item| item.result.as_ref().expect("row").filename.clone())
        .collect();
    assert_eq!(
        names,
        vec![
            "certificate_42_101.png",
            "certificate_42_102.png",
            "certificate_42_103.png"
        ]
    );
}
