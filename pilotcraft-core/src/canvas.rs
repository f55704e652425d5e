//! # Turtle canvas
//!
//! An imperative pen-and-canvas surface with the classic turtle API. The
//! turtle starts at the origin facing east; angles are degrees and positive
//! turns are counter-clockwise. Drawn strokes are kept as line segments and
//! can be rendered to SVG.

use pilotcraft_error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Write as _;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// RGB pen color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    fn from_hex(hex: &str) -> Option<Self> {
        let digits: Vec<u8> = hex
            .chars()
            .map(|c| c.to_digit(16).map(|d| d as u8))
            .collect::<Option<_>>()?;
        match digits.as_slice() {
            [r, g, b] => Some(Color::rgb(r * 17, g * 17, b * 17)),
            [r1, r2, g1, g2, b1, b2] => Some(Color::rgb(r1 * 16 + r2, g1 * 16 + g2, b1 * 16 + b2)),
            _ => None,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Named colors accepted by `set_pen_color` (Tk names, lowercase, no spaces)
const NAMED_COLORS: &[(&str, Color)] = &[
    ("black", Color::rgb(0, 0, 0)),
    ("white", Color::rgb(255, 255, 255)),
    ("red", Color::rgb(255, 0, 0)),
    ("green", Color::rgb(0, 128, 0)),
    ("blue", Color::rgb(0, 0, 255)),
    ("yellow", Color::rgb(255, 255, 0)),
    ("orange", Color::rgb(255, 165, 0)),
    ("purple", Color::rgb(128, 0, 128)),
    ("pink", Color::rgb(255, 192, 203)),
    ("brown", Color::rgb(165, 42, 42)),
    ("gray", Color::rgb(128, 128, 128)),
    ("grey", Color::rgb(128, 128, 128)),
    ("cyan", Color::rgb(0, 255, 255)),
    ("magenta", Color::rgb(255, 0, 255)),
    ("navy", Color::rgb(0, 0, 128)),
    ("maroon", Color::rgb(128, 0, 0)),
    ("olive", Color::rgb(128, 128, 0)),
    ("teal", Color::rgb(0, 128, 128)),
    ("lime", Color::rgb(0, 255, 0)),
    ("gold", Color::rgb(255, 215, 0)),
    ("silver", Color::rgb(192, 192, 192)),
    ("violet", Color::rgb(238, 130, 238)),
    ("indigo", Color::rgb(75, 0, 130)),
    ("turquoise", Color::rgb(64, 224, 208)),
    ("coral", Color::rgb(255, 127, 80)),
    ("salmon", Color::rgb(250, 128, 114)),
    ("tan", Color::rgb(210, 180, 140)),
    ("beige", Color::rgb(245, 245, 220)),
    ("khaki", Color::rgb(240, 230, 140)),
    ("crimson", Color::rgb(220, 20, 60)),
    ("darkred", Color::rgb(139, 0, 0)),
    ("darkgreen", Color::rgb(0, 100, 0)),
    ("darkblue", Color::rgb(0, 0, 139)),
    ("darkorange", Color::rgb(255, 140, 0)),
    ("darkgray", Color::rgb(169, 169, 169)),
    ("darkgrey", Color::rgb(169, 169, 169)),
    ("lightblue", Color::rgb(173, 216, 230)),
    ("lightgreen", Color::rgb(144, 238, 144)),
    ("lightgray", Color::rgb(211, 211, 211)),
    ("lightgrey", Color::rgb(211, 211, 211)),
    ("skyblue", Color::rgb(135, 206, 235)),
    ("forestgreen", Color::rgb(34, 139, 34)),
    ("hotpink", Color::rgb(255, 105, 180)),
];

impl FromStr for Color {
    type Err = Error;

    /// Accepts a color name ("red", "light blue") or `#rgb` / `#rrggbb`
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let parsed = match trimmed.strip_prefix('#') {
            Some(hex) => Color::from_hex(hex),
            None => {
                let key: String = trimmed
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .map(|c| c.to_ascii_lowercase())
                    .collect();
                NAMED_COLORS
                    .iter()
                    .find(|(name, _)| *name == key)
                    .map(|(_, color)| *color)
            }
        };
        parsed.ok_or_else(|| Error::invalid_color(s))
    }
}

/// One straight stroke
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub from: Point,
    pub to: Point,
    pub color: Color,
    pub width: f64,
}

/// The turtle and everything it has drawn
#[derive(Debug, Clone)]
pub struct TurtleCanvas {
    title: String,
    position: Point,
    heading_deg: f64,
    pen_down: bool,
    color: Color,
    width: f64,
    segments: Vec<Segment>,
}

impl Default for TurtleCanvas {
    fn default() -> Self {
        Self::new("Agent-Controlled Turtle")
    }
}

impl TurtleCanvas {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            position: Point::default(),
            heading_deg: 0.0,
            pen_down: true,
            color: Color::BLACK,
            width: 1.0,
            segments: Vec::new(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn position(&self) -> Point {
        self.position
    }

    /// Heading in `[0, 360)`
    pub fn heading(&self) -> f64 {
        self.heading_deg
    }

    pub fn is_pen_down(&self) -> bool {
        self.pen_down
    }

    pub fn pen_color(&self) -> Color {
        self.color
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn forward(&mut self, distance: f64) {
        let radians = self.heading_deg.to_radians();
        let to = Point {
            x: self.position.x + distance * radians.cos(),
            y: self.position.y + distance * radians.sin(),
        };
        if self.pen_down && distance != 0.0 {
            self.segments.push(Segment {
                from: self.position,
                to,
                color: self.color,
                width: self.width,
            });
        }
        self.position = to;
    }

    pub fn backward(&mut self, distance: f64) {
        self.forward(-distance);
    }

    pub fn left(&mut self, angle_deg: f64) {
        self.heading_deg = (self.heading_deg + angle_deg).rem_euclid(360.0);
    }

    pub fn right(&mut self, angle_deg: f64) {
        self.left(-angle_deg);
    }

    /// Draw a full circle. The center is `radius` units to the turtle's
    /// left; a negative radius goes clockwise. The turtle ends where it
    /// started, with the same heading.
    pub fn circle(&mut self, radius: f64) {
        if radius == 0.0 {
            return;
        }
        let steps = 1 + (11.0 + radius.abs() / 6.0).min(59.0) as usize;
        let mut turn = 360.0 / steps as f64;
        let chord = 2.0 * radius.abs() * (turn / 2.0).to_radians().sin();
        if radius < 0.0 {
            turn = -turn;
        }

        self.left(turn / 2.0);
        for _ in 0..steps {
            self.forward(chord);
            self.left(turn);
        }
        self.left(-turn / 2.0);
    }

    pub fn pen_up(&mut self) {
        self.pen_down = false;
    }

    pub fn pen_down(&mut self) {
        self.pen_down = true;
    }

    pub fn set_pen_color(&mut self, color: &str) -> Result<Color> {
        let color: Color = color.parse()?;
        self.color = color;
        Ok(color)
    }

    pub fn set_pen_width(&mut self, width: f64) -> Result<()> {
        if !(width.is_finite() && width > 0.0) {
            return Err(Error::invalid_argument(format!("pen width must be positive, got {}", width)));
        }
        self.width = width;
        Ok(())
    }

    /// Render the drawing as a standalone SVG document (y axis up)
    pub fn to_svg(&self) -> String {
        const MARGIN: f64 = 20.0;

        let points = self
            .segments
            .iter()
            .flat_map(|s| [s.from, s.to])
            .chain(std::iter::once(self.position));
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (0.0f64, 0.0f64, 0.0f64, 0.0f64);
        for p in points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }

        let width = (max_x - min_x) + 2.0 * MARGIN;
        let height = (max_y - min_y) + 2.0 * MARGIN;
        let tx = |x: f64| x - min_x + MARGIN;
        let ty = |y: f64| max_y - y + MARGIN;

        let mut svg = String::new();
        let _ = writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{:.0}" height="{:.0}" viewBox="0 0 {:.2} {:.2}">"#,
            width.ceil(),
            height.ceil(),
            width,
            height
        );
        let _ = writeln!(svg, "  <title>{}</title>", escape_xml(&self.title));
        for s in &self.segments {
            let _ = writeln!(
                svg,
                r#"  <line x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}" stroke="{}" stroke-width="{}" stroke-linecap="round"/>"#,
                tx(s.from.x),
                ty(s.from.y),
                tx(s.to.x),
                ty(s.to.y),
                s.color,
                s.width
            );
        }
        svg.push_str("</svg>\n");
        svg
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pilotcraft_error::ErrorKind;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_square_returns_home() {
        let mut t = TurtleCanvas::default();
        for _ in 0..4 {
            t.forward(100.0);
            t.left(90.0);
        }
        assert!(close(t.position().x, 0.0) && close(t.position().y, 0.0));
        assert!(close(t.heading(), 0.0));
        assert_eq!(t.segments().len(), 4);
        assert!(close(t.segments()[1].to.y, 100.0));
    }

    #[test]
    fn test_pen_up_moves_without_drawing() {
        let mut t = TurtleCanvas::default();
        t.pen_up();
        t.forward(50.0);
        assert!(t.segments().is_empty());
        assert!(close(t.position().x, 50.0));

        t.pen_down();
        t.right(90.0);
        t.forward(10.0);
        assert_eq!(t.segments().len(), 1);
        assert!(close(t.position().y, -10.0));
        assert!(close(t.heading(), 270.0));
    }

    #[test]
    fn test_circle_is_closed_and_to_the_left() {
        let mut t = TurtleCanvas::default();
        t.circle(50.0);
        assert!(close(t.position().x, 0.0) && close(t.position().y, 0.0));
        assert!(close(t.heading(), 0.0));
        // 1 + min(11 + 50/6, 59) = 20 steps
        assert_eq!(t.segments().len(), 20);
        let top = t.segments().iter().map(|s| s.to.y).fold(f64::MIN, f64::max);
        assert!(top > 99.0 && top <= 100.0 + 1e-6);
    }

    #[test]
    fn test_negative_circle_goes_right() {
        let mut t = TurtleCanvas::default();
        t.circle(-30.0);
        let bottom = t.segments().iter().map(|s| s.to.y).fold(f64::MAX, f64::min);
        assert!(bottom < -59.0);
        assert!(close(t.position().x, 0.0) && close(t.position().y, 0.0));
    }

    #[test]
    fn test_colors() {
        assert_eq!("red".parse::<Color>().unwrap(), Color::rgb(255, 0, 0));
        assert_eq!("Light Blue".parse::<Color>().unwrap(), Color::rgb(173, 216, 230));
        assert_eq!("#0f0".parse::<Color>().unwrap(), Color::rgb(0, 255, 0));
        assert_eq!("#1e90ff".parse::<Color>().unwrap().to_hex(), "#1e90ff");

        let err = "blurple".parse::<Color>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidColor);
        assert!("#12345".parse::<Color>().is_err());
    }

    #[test]
    fn test_invalid_color_keeps_previous() {
        let mut t = TurtleCanvas::default();
        t.set_pen_color("blue").unwrap();
        assert!(t.set_pen_color("not-a-color").is_err());
        assert_eq!(t.pen_color(), Color::rgb(0, 0, 255));
    }

    #[test]
    fn test_svg_output() {
        let mut t = TurtleCanvas::new("a <b> & c");
        t.set_pen_color("red").unwrap();
        t.forward(100.0);
        let svg = t.to_svg();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("<title>a &lt;b&gt; &amp; c</title>"));
        assert!(svg.contains(r##"stroke="#ff0000""##));
        assert_eq!(svg.matches("<line").count(), 1);
    }
}
