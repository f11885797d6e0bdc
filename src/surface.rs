use crate::placement::{HAlign, VAlign};
use crate::text_metrics::FontSpec;

/// Minimal 2D text drawing context a tile is rendered into. Style setters
/// affect every following draw call, like a canvas context.
pub trait DrawingSurface {
    fn set_font(&mut self, font: &FontSpec);
    fn set_text_align(&mut self, align: HAlign);
    fn set_text_baseline(&mut self, baseline: VAlign);
    fn set_fill_style(&mut self, color: &str);
    fn set_stroke_style(&mut self, color: &str);
    fn set_line_width(&mut self, width: f32);
    fn set_miter_limit(&mut self, limit: f32);
    fn stroke_text(&mut self, text: &str, x: f64, y: f64);
    fn fill_text(&mut self, text: &str, x: f64, y: f64);
}

/// Renders a tile as a standalone SVG document.
pub struct SvgSurface {
    size: u32,
    body: String,
    font: FontSpec,
    align: HAlign,
    baseline: VAlign,
    fill: String,
    stroke: String,
    line_width: f32,
    miter_limit: f32,
    draws: usize,
}

impl SvgSurface {
    pub fn new(size: u32) -> Self {
        Self {
            size,
            body: String::new(),
            font: FontSpec::new(10.0, "sans-serif"),
            align: HAlign::Left,
            baseline: VAlign::Middle,
            fill: "#000000".to_string(),
            stroke: "none".to_string(),
            line_width: 1.0,
            miter_limit: 10.0,
            draws: 0,
        }
    }

    /// Number of `stroke_text`/`fill_text` calls so far.
    pub fn draw_count(&self) -> usize {
        self.draws
    }

    pub fn finish(self) -> String {
        let size = self.size;
        format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{size}\" height=\"{size}\" viewBox=\"0 0 {size} {size}\">{}</svg>",
            self.body
        )
    }

    fn text_attrs(&self, x: f64, y: f64) -> String {
        format!(
            "x=\"{x:.2}\" y=\"{y:.2}\" font-family=\"{}\" font-size=\"{}\" text-anchor=\"{}\" dominant-baseline=\"{}\"",
            escape_xml(&self.font.family),
            self.font.size,
            text_anchor(self.align),
            dominant_baseline(self.baseline),
        )
    }
}

impl DrawingSurface for SvgSurface {
    fn set_font(&mut self, font: &FontSpec) {
        self.font = font.clone();
    }

    fn set_text_align(&mut self, align: HAlign) {
        self.align = align;
    }

    fn set_text_baseline(&mut self, baseline: VAlign) {
        self.baseline = baseline;
    }

    fn set_fill_style(&mut self, color: &str) {
        self.fill = color.to_string();
    }

    fn set_stroke_style(&mut self, color: &str) {
        self.stroke = color.to_string();
    }

    fn set_line_width(&mut self, width: f32) {
        self.line_width = width;
    }

    fn set_miter_limit(&mut self, limit: f32) {
        self.miter_limit = limit;
    }

    fn stroke_text(&mut self, text: &str, x: f64, y: f64) {
        self.body.push_str(&format!(
            "<text {} fill=\"none\" stroke=\"{}\" stroke-width=\"{}\" stroke-linejoin=\"miter\" stroke-miterlimit=\"{}\">{}</text>",
            self.text_attrs(x, y),
            escape_xml(&self.stroke),
            self.line_width,
            self.miter_limit,
            escape_xml(text)
        ));
        self.draws += 1;
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64) {
        self.body.push_str(&format!(
            "<text {} fill=\"{}\">{}</text>",
            self.text_attrs(x, y),
            escape_xml(&self.fill),
            escape_xml(text)
        ));
        self.draws += 1;
    }
}

fn text_anchor(align: HAlign) -> &'static str {
    match align {
        HAlign::Left => "start",
        HAlign::Center => "middle",
        HAlign::Right => "end",
    }
}

fn dominant_baseline(baseline: VAlign) -> &'static str {
    match baseline {
        VAlign::Top => "text-before-edge",
        VAlign::Middle => "central",
        VAlign::Bottom => "ideographic",
    }
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
