use crate::error::{LabelError, Result};
use fontdb::{Database, Family, Query, Stretch, Style, Weight};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::Mutex;
use ttf_parser::Face;

static TEXT_MEASURER: Lazy<Mutex<TextMeasurer>> = Lazy::new(|| Mutex::new(TextMeasurer::new()));

/// Font used for a label, in CSS terms.
#[derive(Debug, Clone, PartialEq)]
pub struct FontSpec {
    pub size: f32,
    pub family: String,
}

impl FontSpec {
    pub fn new(size: f32, family: impl Into<String>) -> Self {
        Self {
            size,
            family: family.into(),
        }
    }

    /// CSS shorthand, e.g. `11px sans-serif`.
    pub fn css(&self) -> String {
        format!("{}px {}", self.size, self.family)
    }
}

pub trait TextMeasure {
    /// Advance width of `text` in pixels.
    fn measure(&self, font: &FontSpec, text: &str) -> Result<f64>;
}

/// Measures with real font faces found through the system font database.
/// Families with no installed face are estimated from the character table.
#[derive(Debug, Clone, Copy, Default)]
pub struct FontMeasurer;

impl TextMeasure for FontMeasurer {
    fn measure(&self, font: &FontSpec, text: &str) -> Result<f64> {
        if text.is_empty() || font.size <= 0.0 {
            return Ok(0.0);
        }
        let mut guard = TEXT_MEASURER.lock().map_err(|_| LabelError::Measure {
            font: font.css(),
            text: text.to_string(),
        })?;
        match guard.measure(text, font.size, &font.family) {
            Some(width) => Ok(width as f64),
            None => {
                log::debug!("no face for {:?}, estimating width", font.family);
                Ok(estimate_width(text, font.size))
            }
        }
    }
}

/// Deterministic measurer backed by a per-character width table.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharWidthMeasurer;

impl TextMeasure for CharWidthMeasurer {
    fn measure(&self, font: &FontSpec, text: &str) -> Result<f64> {
        if font.size <= 0.0 {
            return Ok(0.0);
        }
        Ok(estimate_width(text, font.size))
    }
}

pub fn estimate_width(text: &str, font_size: f32) -> f64 {
    let em: f32 = text
        .chars()
        .filter(|ch| *ch != '\n')
        .map(char_width_factor)
        .sum();
    (em * font_size) as f64
}

fn char_width_factor(ch: char) -> f32 {
    // Widths in em for a typical sans-serif face.
    match ch {
        ' ' => 0.306,
        '\\' | '.' | ',' | ':' | ';' | '|' | '!' | '(' | ')' | '[' | ']' | '{' | '}' => 0.321,
        '\t' => 0.306 * 4.0,
        'A' | 'B' | 'K' | 'X' | 'Y' => 0.65,
        'C' | 'D' | 'G' | 'H' | 'N' | 'O' | 'Q' | 'U' => 0.745,
        'E' | 'F' | 'L' | 'P' | 'R' | 'S' | 'T' | 'Z' => 0.6,
        'I' => 0.272,
        'J' => 0.557,
        'M' => 0.903,
        'V' => 0.661,
        'W' => 0.958,
        'f' | 'r' | 't' => 0.34,
        'i' | 'j' | 'l' => 0.235,
        'm' => 0.867,
        'w' => 0.811,
        'a'..='z' => 0.57,
        '1' => 0.396,
        '0'..='9' => 0.6,
        '@' | '#' | '%' | '&' => 0.946,
        '-' | '–' => 0.4,
        _ => 0.568,
    }
}

struct TextMeasurer {
    db: Database,
    loaded_system_fonts: bool,
    cache: HashMap<String, Option<FontFace>>,
}

impl TextMeasurer {
    fn new() -> Self {
        Self {
            db: Database::new(),
            loaded_system_fonts: false,
            cache: HashMap::new(),
        }
    }

    fn measure(&mut self, text: &str, font_size: f32, font_family: &str) -> Option<f32> {
        let family_key = normalize_family_key(font_family);
        if !self.cache.contains_key(&family_key) {
            let face = self.load_face(font_family);
            self.cache.insert(family_key.clone(), face);
        }
        let face = self.cache.get_mut(&family_key).and_then(|face| face.as_mut())?;
        let normalized = text.replace('\t', "    ");
        face.measure_width(&normalized, font_size)
    }

    fn load_face(&mut self, font_family: &str) -> Option<FontFace> {
        let family_key = normalize_family_key(font_family);
        if let Some(face) = load_cached_face(&family_key) {
            return Some(face);
        }
        #[derive(Clone, Copy)]
        enum FamilyToken {
            Generic(fontdb::Family<'static>),
            Name(usize),
        }

        let mut names: Vec<String> = Vec::new();
        let mut order: Vec<FamilyToken> = Vec::new();
        for part in font_family.split(',') {
            let raw = part.trim().trim_matches('"').trim_matches('\'');
            if raw.is_empty() {
                continue;
            }
            match raw.to_ascii_lowercase().as_str() {
                "serif" => order.push(FamilyToken::Generic(Family::Serif)),
                "sans-serif" | "system-ui" | "-apple-system" | "ui-sans-serif" => {
                    order.push(FamilyToken::Generic(Family::SansSerif))
                }
                "monospace" | "ui-monospace" => order.push(FamilyToken::Generic(Family::Monospace)),
                _ => {
                    let idx = names.len();
                    names.push(raw.to_string());
                    order.push(FamilyToken::Name(idx));
                }
            }
        }
        if order.is_empty() {
            order.push(FamilyToken::Generic(Family::SansSerif));
        }

        let families: Vec<Family<'_>> = order
            .into_iter()
            .map(|token| match token {
                FamilyToken::Generic(family) => family,
                FamilyToken::Name(idx) => Family::Name(names[idx].as_str()),
            })
            .collect();

        if !self.loaded_system_fonts {
            self.db.load_system_fonts();
            self.loaded_system_fonts = true;
        }

        let query = Query {
            families: &families,
            weight: Weight::NORMAL,
            stretch: Stretch::Normal,
            style: Style::Normal,
        };
        let id = self.db.query(&query)?;
        let mut loaded: Option<FontFace> = None;
        self.db.with_face_data(id, |data, index| {
            let bytes = data.to_vec();
            if let Ok(face) = Face::parse(&bytes, index) {
                let units_per_em = face.units_per_em().max(1);
                if let Some((font_path, meta_path)) = cache_paths(&family_key)
                    && !font_path.exists()
                {
                    if let Some(parent) = font_path.parent() {
                        let _ = fs::create_dir_all(parent);
                    }
                    let _ = fs::write(&font_path, &bytes);
                    let _ = fs::write(&meta_path, index.to_string());
                }
                loaded = Some(FontFace::new(bytes, index, units_per_em));
            }
        });
        loaded
    }
}

struct FontFace {
    data: Vec<u8>,
    index: u32,
    units_per_em: u16,
    advance_cache: HashMap<char, Option<u16>>,
}

impl FontFace {
    fn new(data: Vec<u8>, index: u32, units_per_em: u16) -> Self {
        Self {
            data,
            index,
            units_per_em,
            advance_cache: HashMap::new(),
        }
    }

    fn measure_width(&mut self, text: &str, font_size: f32) -> Option<f32> {
        let scale = font_size / self.units_per_em as f32;
        let fallback = font_size * 0.56;
        let mut face: Option<Face<'_>> = None;
        let mut width = 0.0f32;

        for ch in text.chars() {
            if ch == '\n' {
                continue;
            }
            let advance = match self.advance_cache.get(&ch) {
                Some(cached) => *cached,
                None => {
                    if face.is_none() {
                        face = Some(Face::parse(&self.data, self.index).ok()?);
                    }
                    let parsed = face.as_ref()?;
                    let value = parsed
                        .glyph_index(ch)
                        .map(|glyph| parsed.glyph_hor_advance(glyph).unwrap_or(0));
                    self.advance_cache.insert(ch, value);
                    value
                }
            };
            match advance {
                Some(value) if value > 0 => width += value as f32 * scale,
                _ => width += fallback,
            }
        }

        Some(width.max(0.0))
    }
}

fn normalize_family_key(font_family: &str) -> String {
    let trimmed = font_family.trim();
    if trimmed.is_empty() {
        "sans-serif".to_string()
    } else {
        trimmed.to_string()
    }
}

fn cache_paths(family_key: &str) -> Option<(PathBuf, PathBuf)> {
    let base = std::env::var_os("XDG_CACHE_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".cache")))?;
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    family_key.hash(&mut hasher);
    let hash = hasher.finish();
    let dir = base.join("mlr").join("font-cache");
    let font_path = dir.join(format!("{hash:x}.font"));
    let meta_path = dir.join(format!("{hash:x}.meta"));
    Some((font_path, meta_path))
}

fn load_cached_face(family_key: &str) -> Option<FontFace> {
    let (font_path, meta_path) = cache_paths(family_key)?;
    if !font_path.exists() || !meta_path.exists() {
        return None;
    }
    let bytes = fs::read(font_path).ok()?;
    let index: u32 = fs::read_to_string(meta_path).ok()?.trim().parse().ok()?;
    let units_per_em = Face::parse(&bytes, index).ok()?.units_per_em().max(1);
    Some(FontFace::new(bytes, index, units_per_em))
}
