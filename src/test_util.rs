use std::io::Cursor;

pub(crate) fn with_temp_home<F, R>(func: F) -> R
where
    F: FnOnce(&std::path::Path) -> R,
{
    static HOME_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
    let _guard = HOME_MUTEX
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let dir = tempfile::tempdir().expect("tempdir");
    let old_home = std::env::var("HOME").ok();
    // SAFETY: HOME is only mutated while HOME_MUTEX is held.
    unsafe { std::env::set_var("HOME", dir.path()) };
    let result = func(dir.path());
    match old_home {
        Some(old) => unsafe { std::env::set_var("HOME", old) },
        None => unsafe { std::env::remove_var("HOME") },
    }
    result
}

/// Opaque white PNG without resolution metadata.
pub(crate) fn blank_png(width: u32, height: u32) -> Vec<u8> {
    encode_white_png(width, height, None)
}

/// Opaque white PNG carrying a pHYs chunk for `dpi`.
pub(crate) fn blank_png_with_dpi(width: u32, height: u32, dpi: u32) -> Vec<u8> {
    let ppm = (dpi as f64 / 0.0254).round() as u32;
    encode_white_png(
        width,
        height,
        Some(png::PixelDimensions {
            xppu: ppm,
            yppu: ppm,
            unit: png::Unit::Meter,
        }),
    )
}

fn encode_white_png(width: u32, height: u32, dims: Option<png::PixelDimensions>) -> Vec<u8> {
    let pixels = vec![255u8; (width * height * 4) as usize];
    let mut bytes = Vec::new();
    {
        let mut encoder = png::Encoder::new(Cursor::new(&mut bytes), width, height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_pixel_dims(dims);
        let mut writer = encoder.write_header().expect("png header");
        writer.write_image_data(&pixels).expect("png data");
    }
    bytes
}

const DEJAVU_DIR: &str = "/usr/share/fonts/truetype/dejavu";

/// Bytes of an installed DejaVu face, when the host has the package.
pub(crate) fn dejavu(file: &str) -> Option<std::sync::Arc<Vec<u8>>> {
    std::fs::read(std::path::Path::new(DEJAVU_DIR).join(file))
        .ok()
        .map(std::sync::Arc::new)
}
