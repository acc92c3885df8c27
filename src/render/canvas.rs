use std::io::{self, Write};

use super::surface::{PixelBuffer, Point, RasterSurface, RenderError, Rgba, Stroke, TextStyle};

/// A text label kept by the [`Canvas`] instead of rasterizing glyphs.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLabel {
    pub text: String,
    pub at: Point,
    pub style: TextStyle,
}

/// In-memory RGBA surface.
///
/// Lines and circles are composited source-over with anti-aliasing left out:
/// a pixel is covered when its center lies inside the shape.
#[derive(Debug, Clone)]
pub struct Canvas {
    width: usize,
    height: usize,
    pixels: Vec<Rgba>,
    labels: Vec<TextLabel>,
}

impl Canvas {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![Rgba::TRANSPARENT; width * height],
            labels: Vec::new(),
        }
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<Rgba> {
        (x < self.width && y < self.height).then(|| self.pixels[y * self.width + x])
    }

    pub fn labels(&self) -> &[TextLabel] {
        &self.labels
    }

    /// Binary PPM (P6) of the surface composited over white.
    pub fn encode_ppm(&self) -> Vec<u8> {
        let header = format!("P6\n{} {}\n255\n", self.width, self.height);
        let mut out = Vec::with_capacity(header.len() + self.pixels.len() * 3);
        out.extend_from_slice(header.as_bytes());

        for px in &self.pixels {
            let a = u32::from(px.a);
            let over_white = |c: u8| ((u32::from(c) * a + 255 * (255 - a) + 127) / 255) as u8;
            out.extend_from_slice(&[over_white(px.r), over_white(px.g), over_white(px.b)]);
        }
        out
    }

    /// # Errors
    /// Propagates any error of `writer`.
    pub fn write_ppm<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(&self.encode_ppm())?;
        writer.flush()
    }

    /// Calls `paint` for every pixel center inside the clipped bounding box.
    fn cover<P>(&mut self, min: Point, max: Point, mut paint: P)
    where
        P: FnMut(Point) -> Option<Rgba>,
    {
        let x0 = min.x.floor().max(0.0) as usize;
        let y0 = min.y.floor().max(0.0) as usize;
        let x1 = (max.x.ceil().max(0.0) as usize).min(self.width);
        let y1 = (max.y.ceil().max(0.0) as usize).min(self.height);

        for y in y0..y1 {
            for x in x0..x1 {
                let center = Point::new(x as f64 + 0.5, y as f64 + 0.5);
                if let Some(color) = paint(center) {
                    let dst = &mut self.pixels[y * self.width + x];
                    *dst = blend(color, *dst);
                }
            }
        }
    }
}

impl RasterSurface for Canvas {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn clear(&mut self) {
        self.pixels.fill(Rgba::TRANSPARENT);
        self.labels.clear();
    }

    fn write_pixel_buffer(&mut self, buffer: &PixelBuffer) -> Result<(), RenderError> {
        if (buffer.width(), buffer.height()) != (self.width, self.height) {
            return Err(RenderError::BufferSize {
                expected: (self.width, self.height),
                got: (buffer.width(), buffer.height()),
            });
        }

        for (dst, px) in self.pixels.iter_mut().zip(buffer.as_bytes().chunks_exact(4)) {
            *dst = Rgba::new(px[0], px[1], px[2], px[3]);
        }
        Ok(())
    }

    fn draw_line(&mut self, from: Point, to: Point, stroke: Stroke) {
        let half = stroke.width / 2.0;
        let min = Point::new(from.x.min(to.x) - half, from.y.min(to.y) - half);
        let max = Point::new(from.x.max(to.x) + half, from.y.max(to.y) + half);

        self.cover(min, max, |p| {
            (segment_distance(p, from, to) <= half).then_some(stroke.color)
        });
    }

    fn draw_circle(&mut self, center: Point, radius: f64, fill: Option<Rgba>, outline: Option<Stroke>) {
        let reach = radius + outline.map_or(0.0, |s| s.width / 2.0);
        let min = Point::new(center.x - reach, center.y - reach);
        let max = Point::new(center.x + reach, center.y + reach);

        if let Some(color) = fill {
            self.cover(min, max, |p| (distance(p, center) <= radius).then_some(color));
        }
        if let Some(stroke) = outline {
            let half = stroke.width / 2.0;
            self.cover(min, max, |p| {
                ((distance(p, center) - radius).abs() <= half).then_some(stroke.color)
            });
        }
    }

    fn draw_text(&mut self, text: &str, at: Point, style: TextStyle) {
        self.labels.push(TextLabel {
            text: text.to_string(),
            at,
            style,
        });
    }
}

/// Source-over compositing of straight (non premultiplied) colors.
fn blend(src: Rgba, dst: Rgba) -> Rgba {
    let sa = f64::from(src.a) / 255.0;
    let da = f64::from(dst.a) / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return Rgba::TRANSPARENT;
    }

    let channel = |s: u8, d: u8| {
        let c = (f64::from(s) * sa + f64::from(d) * da * (1.0 - sa)) / out_a;
        c.round().clamp(0.0, 255.0) as u8
    };

    Rgba::new(
        channel(src.r, dst.r),
        channel(src.g, dst.g),
        channel(src.b, dst.b),
        (out_a * 255.0).round() as u8,
    )
}

fn distance(a: Point, b: Point) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}

fn segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len2 = dx * dx + dy * dy;
    if len2 == 0.0 {
        return distance(p, a);
    }

    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len2).clamp(0.0, 1.0);
    distance(p, Point::new(a.x + t * dx, a.y + t * dy))
}
