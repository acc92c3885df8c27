use std::f64::consts::FRAC_PI_2;

use ml_core::{MlError, Model, SampleSet};

use super::surface::{
    PixelBuffer, Point, RasterSurface, RenderError, Rgba, Stroke, TextAlign, TextStyle,
};

/// Everything about a decision boundary drawing that is not data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderStyle {
    /// Number of reference grid cells along each axis.
    pub grid_cells: usize,
    pub grid: Stroke,
    pub marker_radius: f64,
    pub marker_outline: Stroke,
    /// Lowest alpha a sampled pixel can get.
    pub alpha_floor: f64,
    /// Alpha of a pixel predicted with full confidence.
    pub alpha_scale: f64,
    pub label_size: f64,
    pub label_color: Rgba,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            grid_cells: 10,
            grid: Stroke {
                color: Rgba::new(0xdd, 0xdd, 0xdd, 0xff),
                width: 1.0,
            },
            marker_radius: 8.0,
            marker_outline: Stroke {
                color: Rgba::WHITE,
                width: 2.0,
            },
            alpha_floor: 30.0,
            alpha_scale: 200.0,
            label_size: 12.0,
            label_color: Rgba::BLACK,
        }
    }
}

impl RenderStyle {
    /// Colour of a pixel whose prediction is `output`: red below the 0.5
    /// threshold, blue from it on, more opaque the further from 0.5.
    pub fn confidence_color(&self, output: f64) -> Rgba {
        let (color, confidence) = if output < 0.5 {
            (Rgba::RED, 1.0 - 2.0 * output)
        } else {
            (Rgba::BLUE, 2.0 * (output - 0.5))
        };

        let alpha = (self.alpha_scale * confidence)
            .round()
            .max(self.alpha_floor)
            .min(255.0);
        color.with_alpha(alpha as u8)
    }
}

/// Paints a model's decision surface with the labeled samples on top.
#[derive(Debug, Clone, Default)]
pub struct Visualizer {
    style: RenderStyle,
}

impl Visualizer {
    /// Samples `model` once per pixel, mapping pixel `(x, y)` to the input
    /// `(x / width, y / height)`.
    ///
    /// # Errors
    /// Returns the first prediction failure.
    pub fn decision_buffer<M: Model + ?Sized>(
        &self,
        model: &M,
        width: usize,
        height: usize,
    ) -> Result<PixelBuffer, MlError> {
        let mut buffer = PixelBuffer::new(width, height);

        for y in 0..height {
            for x in 0..width {
                let inputs = [x as f64 / width as f64, y as f64 / height as f64];
                let output = model.predict(&inputs)?;
                let first = output.first().copied().ok_or(MlError::ShapeMismatch {
                    what: "outputs",
                    got: 0,
                    expected: 1,
                })?;
                buffer.set(x, y, self.style.confidence_color(first));
            }
        }

        Ok(buffer)
    }

    /// Redraws `surface` from scratch.
    ///
    /// The model is sampled before anything is erased, so a failing
    /// prediction leaves the previous frame untouched.
    ///
    /// # Args
    /// * `surface` - Where to draw.
    /// * `model` - The live model; without one only the grid, samples and
    ///   labels are drawn.
    /// * `samples` - Points overlaid as markers.
    ///
    /// # Errors
    /// Returns `RenderError::Prediction` if the model fails to predict.
    pub fn render<S, M>(
        &self,
        surface: &mut S,
        model: Option<&M>,
        samples: Option<&SampleSet>,
    ) -> Result<(), RenderError>
    where
        S: RasterSurface + ?Sized,
        M: Model + ?Sized,
    {
        let (width, height) = (surface.width(), surface.height());
        let buffer = model
            .map(|model| self.decision_buffer(model, width, height))
            .transpose()?;

        surface.clear();
        self.draw_grid(surface);

        if let Some(buffer) = &buffer {
            surface.write_pixel_buffer(buffer)?;
        }

        if let Some(samples) = samples {
            self.draw_samples(surface, samples);
        }

        self.draw_labels(surface);
        Ok(())
    }

    fn draw_grid<S: RasterSurface + ?Sized>(&self, surface: &mut S) {
        let (w, h) = (surface.width() as f64, surface.height() as f64);
        let cells = self.style.grid_cells.max(1);

        for i in 0..=cells {
            let t = i as f64 / cells as f64;
            let (x, y) = (t * w, t * h);
            surface.draw_line(Point::new(x, 0.0), Point::new(x, h), self.style.grid);
            surface.draw_line(Point::new(0.0, y), Point::new(w, y), self.style.grid);
        }
    }

    fn draw_samples<S: RasterSurface + ?Sized>(&self, surface: &mut S, samples: &SampleSet) {
        let (w, h) = (surface.width() as f64, surface.height() as f64);

        for sample in samples {
            let (Some(&x), Some(&y)) = (sample.inputs.first(), sample.inputs.get(1)) else {
                continue;
            };
            let fill = if sample.targets.first() == Some(&0.0) {
                Rgba::RED
            } else {
                Rgba::BLUE
            };

            surface.draw_circle(
                Point::new(x * w, y * h),
                self.style.marker_radius,
                Some(fill),
                Some(self.style.marker_outline),
            );
        }
    }

    fn draw_labels<S: RasterSurface + ?Sized>(&self, surface: &mut S) {
        let (w, h) = (surface.width() as f64, surface.height() as f64);
        let text = |align, rotation| TextStyle {
            color: self.style.label_color,
            size: self.style.label_size,
            align,
            rotation,
        };

        let centered = text(TextAlign::Center, 0.0);
        surface.draw_text("0", Point::new(10.0, h - 5.0), centered);
        surface.draw_text("1", Point::new(w - 10.0, h - 5.0), centered);
        surface.draw_text("Input 1", Point::new(w / 2.0, h - 5.0), centered);

        let right = text(TextAlign::Right, 0.0);
        surface.draw_text("0", Point::new(15.0, h - 10.0), right);
        surface.draw_text("1", Point::new(15.0, 15.0), right);
        surface.draw_text("Input 2", Point::new(15.0, h / 2.0), text(TextAlign::Right, -FRAC_PI_2));
    }
}
