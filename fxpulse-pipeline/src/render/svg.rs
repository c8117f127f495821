//! Minimal SVG document builder.
//!
//! Coordinates are printed with two decimals so identical inputs always give
//! identical bytes.

use std::fmt::Write;

pub const FONT: &str = "Helvetica, Arial, sans-serif";

pub const RED: &str = "#d62728";
pub const GREEN: &str = "#2ca02c";
pub const GREY: &str = "#9e9e9e";
pub const INK: &str = "#222222";
pub const MUTED: &str = "#666666";

/// Line colours, cycled.
pub const PALETTE: [&str; 10] = [
    "#636efa", "#ef553b", "#00cc96", "#ab63fa", "#ffa15a", "#19d3f3", "#ff6692", "#b6e880",
    "#ff97ff", "#fecb52",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Start,
    Middle,
    End,
}

impl Anchor {
    fn as_str(self) -> &'static str {
        match self {
            Anchor::Start => "start",
            Anchor::Middle => "middle",
            Anchor::End => "end",
        }
    }
}

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn n(v: f64) -> String {
    let v = if v.is_finite() { v } else { 0.0 };
    // Avoid "-0.00"
    let s = format!("{v:.2}");
    if s == "-0.00" {
        "0.00".into()
    } else {
        s
    }
}

pub struct Svg {
    width: f64,
    height: f64,
    body: String,
}

impl Svg {
    pub fn new(width: f64, height: f64) -> Self {
        let mut svg = Self {
            width,
            height,
            body: String::new(),
        };
        svg.rect(0.0, 0.0, width, height, "#ffffff", None);
        svg
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    /// Filled rectangle with an optional hover tooltip.
    pub fn rect(&mut self, x: f64, y: f64, w: f64, h: f64, fill: &str, tooltip: Option<&str>) {
        let _ = write!(
            self.body,
            r##"<rect x="{}" y="{}" width="{}" height="{}" fill="{}" stroke="#ffffff" stroke-width="1""##,
            n(x),
            n(y),
            n(w.max(0.0)),
            n(h.max(0.0)),
            fill
        );
        match tooltip {
            Some(t) => {
                let _ = writeln!(self.body, "><title>{}</title></rect>", escape(t));
            }
            None => self.body.push_str("/>\n"),
        }
    }

    pub fn text(&mut self, x: f64, y: f64, content: &str, size: f64, anchor: Anchor, fill: &str) {
        let _ = writeln!(
            self.body,
            r#"<text x="{}" y="{}" font-family="{font}" font-size="{}" text-anchor="{}" fill="{}">{}</text>"#,
            n(x),
            n(y),
            n(size),
            anchor.as_str(),
            fill,
            escape(content),
            font = FONT,
        );
    }

    /// Text rotated 90° counter-clockwise around its anchor point.
    pub fn vertical_text(&mut self, x: f64, y: f64, content: &str, size: f64, fill: &str) {
        let _ = writeln!(
            self.body,
            r#"<text x="{x}" y="{y}" font-family="{font}" font-size="{}" text-anchor="middle" fill="{}" transform="rotate(-90 {x} {y})">{}</text>"#,
            n(size),
            fill,
            escape(content),
            x = n(x),
            y = n(y),
            font = FONT,
        );
    }

    pub fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, stroke: &str, width: f64) {
        let _ = writeln!(
            self.body,
            r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="{}"/>"#,
            n(x1),
            n(y1),
            n(x2),
            n(y2),
            stroke,
            n(width)
        );
    }

    pub fn polyline(&mut self, points: &[(f64, f64)], stroke: &str, width: f64) {
        if points.is_empty() {
            return;
        }
        let coords: Vec<String> = points
            .iter()
            .map(|(x, y)| format!("{},{}", n(*x), n(*y)))
            .collect();
        let _ = writeln!(
            self.body,
            r#"<polyline points="{}" fill="none" stroke="{}" stroke-width="{}" stroke-linejoin="round"/>"#,
            coords.join(" "),
            stroke,
            n(width)
        );
    }

    /// Centered grey message for charts with nothing to draw.
    pub fn placeholder(&mut self, message: &str) {
        let (w, h) = (self.width, self.height);
        self.text(w / 2.0, h / 2.0, message, 16.0, Anchor::Middle, MUTED);
    }

    pub fn finish(self) -> String {
        format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">\n{}</svg>\n",
            self.body,
            w = n(self.width),
            h = n(self.height),
        )
    }
}

/// Blue (−1) through white (0) to red (+1).
pub fn diverging(value: f64) -> String {
    let v = if value.is_finite() { value.clamp(-1.0, 1.0) } else { 0.0 };
    let (r, g, b) = if v >= 0.0 {
        let t = v;
        (255.0, 255.0 - 141.0 * t, 255.0 - 151.0 * t)
    } else {
        let t = -v;
        (255.0 - 202.0 * t, 255.0 - 121.0 * t, 255.0 - 25.0 * t)
    };
    format!("#{:02x}{:02x}{:02x}", r.round() as u8, g.round() as u8, b.round() as u8)
}
