use serde::{Deserialize, Serialize};

/// Ambient page style the labels are drawn against. Captured once per tile
/// render and passed in explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub font_family: String,
    pub background: String,
    pub text_color: String,
}

impl Theme {
    pub fn light() -> Self {
        Self {
            font_family: "sans-serif".to_string(),
            background: "#FFFFFF".to_string(),
            text_color: "#333333".to_string(),
        }
    }

    pub fn dark() -> Self {
        Self {
            font_family: "sans-serif".to_string(),
            background: "#1C2430".to_string(),
            text_color: "#E8ECF2".to_string(),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::light()
    }
}

/// Turn a CSS color into `rgba(r,g,b,alpha)`. Accepts `#rgb`, `#rrggbb`,
/// `rgb(...)` and `rgba(...)`; anything else falls back to white.
pub fn halo_color(background: &str, alpha: f32) -> String {
    let (r, g, b) = parse_rgb(background).unwrap_or((255, 255, 255));
    format!("rgba({r},{g},{b},{alpha})")
}

fn parse_rgb(color: &str) -> Option<(u8, u8, u8)> {
    let color = color.trim();
    if let Some(hex) = color.strip_prefix('#') {
        return parse_hex(hex);
    }
    let lower = color.to_ascii_lowercase();
    let inner = lower
        .strip_prefix("rgba(")
        .or_else(|| lower.strip_prefix("rgb("))?
        .strip_suffix(')')?;
    let mut parts = inner.split(',').map(|part| part.trim());
    let mut channel = || -> Option<u8> {
        let value: f32 = parts.next()?.parse().ok()?;
        Some(value.round().clamp(0.0, 255.0) as u8)
    };
    Some((channel()?, channel()?, channel()?))
}

fn parse_hex(hex: &str) -> Option<(u8, u8, u8)> {
    if !hex.is_ascii() {
        return None;
    }
    match hex.len() {
        3 => {
            let digit = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
            Some((digit(0)?, digit(1)?, digit(2)?))
        }
        6 | 8 => {
            let pair = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
            Some((pair(0)?, pair(2)?, pair(4)?))
        }
        _ => None,
    }
}
