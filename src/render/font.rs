use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use tracing::{debug, warn};
use ttf_parser::name_id;
use ttf_parser::Face;
use usvg::fontdb;

use super::bitmap;
use crate::error::FontFallback;
use crate::settings::Settings;

const FONT_EXTENSIONS: &[&str] = &["ttf", "otf", "ttc"];
const DEFAULT_CACHE_KEY: &str = "\0default";

#[derive(Clone)]
pub struct FontMetrics {
    data: Arc<Vec<u8>>,
    units_per_em: u16,
    ascender: i16,
    descender: i16,
    space_advance: u16,
    family: String,
    face_index: u32,
    weight: u16,
    style: FaceStyle,
    stretch: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceStyle {
    Normal,
    Italic,
    Oblique,
}

impl std::fmt::Debug for FontMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontMetrics")
            .field("family", &self.family)
            .field("face_index", &self.face_index)
            .field("weight", &self.weight)
            .field("style", &self.style)
            .field("units_per_em", &self.units_per_em)
            .finish_non_exhaustive()
    }
}

impl FontMetrics {
    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    /// Shared font bytes, for handing to the scene's font database.
    pub(crate) fn shared_data(&self) -> Arc<Vec<u8>> {
        Arc::clone(&self.data)
    }

    /// Identifies the loaded face independently of its family name.
    pub(crate) fn face_key(&self) -> (usize, u32) {
        (Arc::as_ptr(&self.data) as usize, self.face_index)
    }

    pub fn weight(&self) -> u16 {
        self.weight
    }

    pub fn style(&self) -> FaceStyle {
        self.style
    }

    pub fn svg_style(&self) -> &'static str {
        match self.style {
            FaceStyle::Normal => "normal",
            FaceStyle::Italic => "italic",
            FaceStyle::Oblique => "oblique",
        }
    }

    /// `font-stretch` keyword for the OS/2 width class.
    pub fn svg_stretch(&self) -> &'static str {
        match self.stretch {
            1 => "ultra-condensed",
            2 => "extra-condensed",
            3 => "condensed",
            4 => "semi-condensed",
            6 => "semi-expanded",
            7 => "expanded",
            8 => "extra-expanded",
            9 => "ultra-expanded",
            _ => "normal",
        }
    }

    fn scale(&self, font_size: f32) -> f32 {
        font_size / self.units_per_em.max(1) as f32
    }

    pub fn ascent_px(&self, font_size: f32) -> f32 {
        self.ascender as f32 * self.scale(font_size)
    }

    /// Distance below the baseline, positive.
    pub fn descent_px(&self, font_size: f32) -> f32 {
        -(self.descender as f32) * self.scale(font_size)
    }

    pub fn text_width_px(&self, text: &str, font_size: f32) -> f32 {
        let Ok(face) = Face::parse(&self.data, self.face_index) else {
            return estimate_text_width_units(text) * font_size;
        };
        let mut advance = 0u32;
        for ch in text.chars() {
            if ch == '\n' {
                continue;
            }
            if ch == ' ' {
                advance = advance.saturating_add(self.space_advance as u32);
                continue;
            }
            let glyph_advance = face
                .glyph_index(ch)
                .and_then(|glyph| face.glyph_hor_advance(glyph))
                .unwrap_or(self.space_advance);
            advance = advance.saturating_add(glyph_advance as u32);
        }
        advance as f32 * self.scale(font_size)
    }
}

/// Where a font's bytes come from.
#[derive(Debug, Clone)]
pub enum FontSource {
    Path(PathBuf),
    Data(Arc<Vec<u8>>),
}

impl FontSource {
    fn load(&self) -> Result<FontMetrics> {
        match self {
            FontSource::Path(path) => load_font_metrics(path),
            FontSource::Data(data) => load_font_metrics_from_data(data.to_vec(), None),
        }
    }
}

/// Injectable mapping from logical family names to font resources.
#[derive(Debug, Clone, Default)]
pub struct FontRegistry {
    families: HashMap<String, FontSource>,
    dirs: Vec<PathBuf>,
    default_face: Option<FontSource>,
    system_fonts: bool,
}

impl FontRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let mut registry = Self::new().with_system_fonts(settings.system_fonts);
        for (family, path) in &settings.font_families {
            registry = registry.with_family(family, FontSource::Path(PathBuf::from(path)));
        }
        for dir in &settings.font_dirs {
            registry = registry.with_dir(dir);
        }
        if let Some(path) = settings.default_font_path.as_deref() {
            registry = registry.with_default_face(FontSource::Path(PathBuf::from(path)));
        }
        registry
    }

    pub fn with_family(mut self, family: &str, source: FontSource) -> Self {
        self.families.insert(normalize_family(family), source);
        self
    }

    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dirs.push(dir.into());
        self
    }

    pub fn with_default_face(mut self, source: FontSource) -> Self {
        self.default_face = Some(source);
        self
    }

    pub fn with_system_fonts(mut self, enabled: bool) -> Self {
        self.system_fonts = enabled;
        self
    }

    fn find_in_dirs(&self, family: &str) -> Option<PathBuf> {
        let compact: String = family.chars().filter(|ch| !ch.is_whitespace()).collect();
        let stems = [family.to_string(), compact];
        for dir in &self.dirs {
            for stem in &stems {
                for ext in FONT_EXTENSIONS {
                    let path = dir.join(format!("{}.{}", stem, ext));
                    if path.is_file() {
                        return Some(path);
                    }
                }
            }
        }
        None
    }
}

#[derive(Debug, Clone)]
pub enum FontFace {
    Outline(FontMetrics),
    Bitmap,
}

/// A usable face at a concrete pixel size.
#[derive(Debug, Clone)]
pub struct FontHandle {
    face: FontFace,
    size: f32,
    fallback: Option<FontFallback>,
}

impl FontHandle {
    pub fn bitmap(fallback: Option<FontFallback>) -> Self {
        Self {
            face: FontFace::Bitmap,
            size: bitmap::GLYPH_HEIGHT,
            fallback,
        }
    }

    pub fn face(&self) -> &FontFace {
        &self.face
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    /// Set when the requested family could not be used.
    pub fn fallback(&self) -> Option<FontFallback> {
        self.fallback
    }

    pub fn is_bitmap(&self) -> bool {
        matches!(self.face, FontFace::Bitmap)
    }

    pub fn family(&self) -> Option<&str> {
        match &self.face {
            FontFace::Outline(metrics) => Some(metrics.family()),
            FontFace::Bitmap => None,
        }
    }

    pub fn text_width(&self, text: &str) -> f32 {
        match &self.face {
            FontFace::Outline(metrics) => metrics.text_width_px(text, self.size),
            FontFace::Bitmap => bitmap::text_width(text),
        }
    }

    /// Ascent above and descent below the baseline.
    pub fn vertical_extent(&self) -> (f32, f32) {
        match &self.face {
            FontFace::Outline(metrics) => {
                (metrics.ascent_px(self.size), metrics.descent_px(self.size))
            }
            FontFace::Bitmap => (bitmap::GLYPH_HEIGHT, 0.0),
        }
    }
}

/// Resolves family names to faces through the registry, the default face
/// and finally the builtin bitmap font. Parsed faces are cached by family;
/// concurrent first lookups may load the same face twice.
pub struct FontResolver {
    registry: FontRegistry,
    cache: RwLock<HashMap<String, Option<FontMetrics>>>,
    system: OnceLock<fontdb::Database>,
}

impl FontResolver {
    pub fn new(registry: FontRegistry) -> Self {
        Self {
            registry,
            cache: RwLock::new(HashMap::new()),
            system: OnceLock::new(),
        }
    }

    pub fn resolve(&self, font_family: &str, size: u32) -> FontHandle {
        let size = size.max(1) as f32;
        let family = font_family.trim();
        let requested = !family.is_empty();

        if requested {
            if let Some(metrics) = self.cached(&normalize_family(family), || self.load_family(family))
            {
                return FontHandle {
                    face: FontFace::Outline(metrics),
                    size,
                    fallback: None,
                };
            }
        }

        if let Some(metrics) = self.cached(DEFAULT_CACHE_KEY, || self.load_default()) {
            return FontHandle {
                face: FontFace::Outline(metrics),
                size,
                fallback: requested.then_some(FontFallback::DefaultFace),
            };
        }

        warn!(family, "no outline font available, using builtin bitmap font");
        FontHandle::bitmap(Some(FontFallback::BuiltinBitmap))
    }

    fn cached<F>(&self, key: &str, load: F) -> Option<FontMetrics>
    where
        F: FnOnce() -> Result<FontMetrics>,
    {
        {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = cache.get(key) {
                return entry.clone();
            }
        }
        let loaded = match load() {
            Ok(metrics) => Some(metrics),
            Err(err) => {
                debug!(key, error = %err, "font load failed");
                None
            }
        };
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        cache.entry(key.to_string()).or_insert(loaded).clone()
    }

    fn load_family(&self, family: &str) -> Result<FontMetrics> {
        if let Some(source) = self.registry.families.get(&normalize_family(family)) {
            return source.load();
        }
        if let Some(path) = self.registry.find_in_dirs(family) {
            return load_font_metrics(&path);
        }
        if self.registry.system_fonts {
            return load_font_metrics_from_family(self.system_db(), fontdb::Family::Name(family));
        }
        Err(anyhow!("font family not registered: {}", family))
    }

    fn load_default(&self) -> Result<FontMetrics> {
        if let Some(source) = self.registry.default_face.as_ref() {
            match source.load() {
                Ok(metrics) => return Ok(metrics),
                Err(err) if self.registry.system_fonts => {
                    debug!(error = %err, "default face unavailable, trying system sans-serif");
                }
                Err(err) => return Err(err),
            }
        }
        if self.registry.system_fonts {
            return load_font_metrics_from_family(self.system_db(), fontdb::Family::SansSerif);
        }
        Err(anyhow!("no default font face configured"))
    }

    fn system_db(&self) -> &fontdb::Database {
        self.system.get_or_init(|| {
            let mut db = fontdb::Database::new();
            db.load_system_fonts();
            db
        })
    }
}

fn normalize_family(family: &str) -> String {
    family.trim().to_lowercase()
}

pub fn load_font_metrics(path: &Path) -> Result<FontMetrics> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read font: {}", path.display()))?;
    load_font_metrics_from_data(data, None)
        .map_err(|err| anyhow!("failed to parse font: {} ({})", path.display(), err))
}

fn estimate_char_units_for_width(ch: char) -> f32 {
    if ch.is_whitespace() {
        0.25
    } else if ch.is_ascii_alphanumeric() {
        0.55
    } else if ch.is_ascii() {
        0.35
    } else {
        0.9
    }
}

fn estimate_text_width_units(text: &str) -> f32 {
    text.chars().map(estimate_char_units_for_width).sum()
}

fn load_font_metrics_from_data(data: Vec<u8>, preferred_family: Option<&str>) -> Result<FontMetrics> {
    let data = Arc::new(data);
    let mut fallback = None;
    let count = ttf_parser::fonts_in_collection(&data).unwrap_or(1);
    for index in 0..count {
        let Ok(face) = Face::parse(&data, index) else {
            continue;
        };
        // Unnamed faces cannot be addressed by the scene rasterizer.
        let Some(family) = extract_family_name(&face) else {
            continue;
        };
        let units_per_em = face.units_per_em().max(1);
        let space_advance = face
            .glyph_index(' ')
            .and_then(|id| face.glyph_hor_advance(id))
            .unwrap_or(units_per_em / 2);
        let matches_preferred =
            preferred_family.is_some_and(|preferred| family.eq_ignore_ascii_case(preferred));
        let style = if face.is_italic() {
            FaceStyle::Italic
        } else if face.is_oblique() {
            FaceStyle::Oblique
        } else {
            FaceStyle::Normal
        };
        let metrics = FontMetrics {
            data: Arc::clone(&data),
            units_per_em,
            ascender: face.ascender(),
            descender: face.descender(),
            space_advance,
            family,
            face_index: index,
            weight: face.weight().to_number(),
            style,
            stretch: face.width().to_number(),
        };
        if matches_preferred {
            return Ok(metrics);
        }
        if fallback.is_none() {
            fallback = Some(metrics);
        }
    }
    fallback.ok_or_else(|| anyhow!("failed to parse font data"))
}

fn load_font_metrics_from_family(
    db: &fontdb::Database,
    family: fontdb::Family<'_>,
) -> Result<FontMetrics> {
    let preferred = match family {
        fontdb::Family::Name(name) => Some(name),
        _ => None,
    };
    let label = preferred.unwrap_or("sans-serif").to_string();
    let families = [family];
    let query = fontdb::Query {
        families: &families,
        ..Default::default()
    };
    let id = db
        .query(&query)
        .ok_or_else(|| anyhow!("font not found: {}", label))?;
    let data = db
        .with_face_data(id, |data, _index| data.to_vec())
        .ok_or_else(|| anyhow!("failed to load font data: {}", label))?;
    load_font_metrics_from_data(data, preferred)
}

fn extract_family_name(face: &Face<'_>) -> Option<String> {
    let mut fallback = None;
    for name in face.names() {
        if name.name_id == name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        } else if name.name_id == name_id::FAMILY && fallback.is_none() {
            fallback = name.to_string();
        }
    }
    fallback
}
