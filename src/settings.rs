use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");
const DEFAULT_FONT_PATH: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf";

#[derive(Debug, Clone)]
pub struct Settings {
    pub default_font_path: Option<String>,
    pub font_dirs: Vec<String>,
    pub font_families: BTreeMap<String, String>,
    pub system_fonts: bool,
    pub fallback_color: String,
    pub batch_threads: usize,
    pub output_dir: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_font_path: Some(DEFAULT_FONT_PATH.to_string()),
            font_dirs: Vec::new(),
            font_families: BTreeMap::new(),
            system_fonts: false,
            fallback_color: "black".to_string(),
            batch_threads: 0,
            output_dir: ".".to_string(),
        }
    }
}

impl Settings {
    /// Worker count for batch renders; 0 means one per CPU.
    pub fn effective_batch_threads(&self) -> usize {
        if self.batch_threads == 0 {
            num_cpus::get().max(1)
        } else {
            self.batch_threads
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    fonts: Option<FontSettings>,
    render: Option<RenderSettings>,
    batch: Option<BatchSettings>,
    output: Option<OutputSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct FontSettings {
    default_path: Option<String>,
    dirs: Option<Vec<String>>,
    system_fonts: Option<bool>,
    families: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Default, Deserialize)]
struct RenderSettings {
    fallback_color: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BatchSettings {
    threads: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct OutputSettings {
    dir: Option<String>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    ensure_home_settings_file()?;

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            settings.merge_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
        }
    }

    Ok(settings)
}

impl Settings {
    pub fn merge_str(&mut self, content: &str) -> Result<()> {
        let parsed: SettingsFile = toml::from_str(content)?;
        self.merge(parsed);
        Ok(())
    }

    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(fonts) = incoming.fonts {
            if let Some(path) = fonts.default_path {
                // An empty path disables the default face.
                self.default_font_path = if path.trim().is_empty() {
                    None
                } else {
                    Some(path)
                };
            }
            if let Some(dirs) = fonts.dirs {
                self.font_dirs = dirs
                    .into_iter()
                    .filter(|dir| !dir.trim().is_empty())
                    .collect();
            }
            if let Some(enabled) = fonts.system_fonts {
                self.system_fonts = enabled;
            }
            if let Some(families) = fonts.families {
                for (family, path) in families {
                    if !family.trim().is_empty() && !path.trim().is_empty() {
                        self.font_families.insert(family, path);
                    }
                }
            }
        }
        if let Some(render) = incoming.render {
            if let Some(color) = render.fallback_color {
                if !color.trim().is_empty() {
                    self.fallback_color = color;
                }
            }
        }
        if let Some(batch) = incoming.batch {
            if let Some(threads) = batch.threads {
                self.batch_threads = threads;
            }
        }
        if let Some(output) = incoming.output {
            if let Some(dir) = output.dir {
                if !dir.trim().is_empty() {
                    self.output_dir = dir;
                }
            }
        }
    }
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".certificate-renderer"))
        }
    })
}
