mod canvas;
mod surface;
mod visualizer;

pub use canvas::{Canvas, TextLabel};
pub use surface::{
    PixelBuffer, Point, RasterSurface, RenderError, Rgba, Stroke, TextAlign, TextStyle,
};
pub use visualizer::{RenderStyle, Visualizer};
