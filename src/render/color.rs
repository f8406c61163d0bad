#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl TextColor {
    pub const BLACK: TextColor = TextColor::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn opacity(self) -> f32 {
        self.a as f32 / 255.0
    }
}

const NAMED: &[(&str, TextColor)] = &[
    ("black", TextColor::rgb(0, 0, 0)),
    ("white", TextColor::rgb(255, 255, 255)),
    ("red", TextColor::rgb(255, 0, 0)),
    ("green", TextColor::rgb(0, 128, 0)),
    ("blue", TextColor::rgb(0, 0, 255)),
    ("yellow", TextColor::rgb(255, 255, 0)),
    ("orange", TextColor::rgb(255, 165, 0)),
    ("purple", TextColor::rgb(128, 0, 128)),
    ("gray", TextColor::rgb(128, 128, 128)),
    ("grey", TextColor::rgb(128, 128, 128)),
    ("darkgray", TextColor::rgb(169, 169, 169)),
    ("darkgrey", TextColor::rgb(169, 169, 169)),
    ("lightgray", TextColor::rgb(211, 211, 211)),
    ("silver", TextColor::rgb(192, 192, 192)),
    ("maroon", TextColor::rgb(128, 0, 0)),
    ("navy", TextColor::rgb(0, 0, 128)),
    ("teal", TextColor::rgb(0, 128, 128)),
    ("olive", TextColor::rgb(128, 128, 0)),
    ("lime", TextColor::rgb(0, 255, 0)),
    ("aqua", TextColor::rgb(0, 255, 255)),
    ("cyan", TextColor::rgb(0, 255, 255)),
    ("fuchsia", TextColor::rgb(255, 0, 255)),
    ("magenta", TextColor::rgb(255, 0, 255)),
    ("brown", TextColor::rgb(165, 42, 42)),
    ("gold", TextColor::rgb(255, 215, 0)),
    ("goldenrod", TextColor::rgb(218, 165, 32)),
    ("darkblue", TextColor::rgb(0, 0, 139)),
    ("darkred", TextColor::rgb(139, 0, 0)),
    ("darkgreen", TextColor::rgb(0, 100, 0)),
    ("indigo", TextColor::rgb(75, 0, 130)),
    ("crimson", TextColor::rgb(220, 20, 60)),
    ("royalblue", TextColor::rgb(65, 105, 225)),
    ("midnightblue", TextColor::rgb(25, 25, 112)),
    ("darkslategray", TextColor::rgb(47, 79, 79)),
];

/// Accepts `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb(..)`/`rgba(..)` and common
/// CSS color names.
pub fn parse_color(raw: &str) -> Option<TextColor> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Some(hex) = s.strip_prefix('#') {
        return parse_hex(hex);
    }
    let lower = s.to_ascii_lowercase();
    if let Some((_, color)) = NAMED.iter().find(|(name, _)| *name == lower) {
        return Some(*color);
    }
    if lower.starts_with("rgb(") || lower.starts_with("rgba(") {
        let inner = lower
            .trim_start_matches("rgba(")
            .trim_start_matches("rgb(")
            .strip_suffix(')')?;
        let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
        if parts.len() != 3 && parts.len() != 4 {
            return None;
        }
        let channel = |part: &str| part.parse::<u8>().ok();
        let a = match parts.get(3) {
            Some(alpha) => {
                let alpha = alpha.parse::<f32>().ok()?.clamp(0.0, 1.0);
                (alpha * 255.0).round() as u8
            }
            None => 255,
        };
        return Some(TextColor {
            r: channel(parts[0])?,
            g: channel(parts[1])?,
            b: channel(parts[2])?,
            a,
        });
    }
    None
}

fn parse_hex(hex: &str) -> Option<TextColor> {
    if !hex.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return None;
    }
    let expanded: String = match hex.len() {
        3 | 4 => hex.chars().flat_map(|ch| [ch, ch]).collect(),
        6 | 8 => hex.to_string(),
        _ => return None,
    };
    let channel = |idx: usize| u8::from_str_radix(&expanded[idx..idx + 2], 16).ok();
    Some(TextColor {
        r: channel(0)?,
        g: channel(2)?,
        b: channel(4)?,
        a: if expanded.len() == 8 { channel(6)? } else { 255 },
    })
}
