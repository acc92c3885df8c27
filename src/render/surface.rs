use std::{error::Error, fmt};

use ml_core::MlError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);
    pub const BLACK: Self = Self::new(0, 0, 0, 255);
    pub const WHITE: Self = Self::new(255, 255, 255, 255);
    pub const RED: Self = Self::new(255, 0, 0, 255);
    pub const BLUE: Self = Self::new(0, 0, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub color: Rgba,
    pub width: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    Left,
    #[default]
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub color: Rgba,
    /// Font size in pixels.
    pub size: f64,
    pub align: TextAlign,
    /// Clockwise rotation in radians around the anchor point.
    pub rotation: f64,
}

/// A full-surface RGBA raster, one byte per channel, row major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Creates a fully transparent buffer.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height * 4],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn get(&self, x: usize, y: usize) -> Option<Rgba> {
        let i = self.offset(x, y)?;
        let px = &self.data[i..i + 4];
        Some(Rgba::new(px[0], px[1], px[2], px[3]))
    }

    /// Sets one pixel; out of bounds writes are ignored.
    pub fn set(&mut self, x: usize, y: usize, color: Rgba) {
        if let Some(i) = self.offset(x, y) {
            self.data[i..i + 4].copy_from_slice(&[color.r, color.g, color.b, color.a]);
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    fn offset(&self, x: usize, y: usize) -> Option<usize> {
        (x < self.width && y < self.height).then(|| (y * self.width + x) * 4)
    }
}

#[derive(Debug)]
pub enum RenderError {
    /// The model failed while sampling the decision surface.
    Prediction(MlError),
    /// A pixel buffer does not cover the surface exactly.
    BufferSize {
        expected: (usize, usize),
        got: (usize, usize),
    },
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prediction(e) => write!(f, "cannot sample the model: {e}"),
            Self::BufferSize { expected, got } => write!(
                f,
                "pixel buffer is {}x{}, surface is {}x{}",
                got.0, got.1, expected.0, expected.1
            ),
        }
    }
}

impl Error for RenderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Prediction(e) => Some(e),
            Self::BufferSize { .. } => None,
        }
    }
}

impl From<MlError> for RenderError {
    fn from(e: MlError) -> Self {
        Self::Prediction(e)
    }
}

/// The drawing capability the visualizer paints through.
pub trait RasterSurface {
    fn width(&self) -> usize;

    fn height(&self) -> usize;

    /// Erases everything, leaving a transparent surface.
    fn clear(&mut self);

    /// Replaces every pixel at once, without blending.
    ///
    /// # Errors
    /// Returns `RenderError::BufferSize` unless the buffer matches the surface.
    fn write_pixel_buffer(&mut self, buffer: &PixelBuffer) -> Result<(), RenderError>;

    fn draw_line(&mut self, from: Point, to: Point, stroke: Stroke);

    /// Fills and then outlines a circle; either part may be omitted.
    fn draw_circle(&mut self, center: Point, radius: f64, fill: Option<Rgba>, outline: Option<Stroke>);

    fn draw_text(&mut self, text: &str, at: Point, style: TextStyle);
}
