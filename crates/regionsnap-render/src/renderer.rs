//! Software rasterizer for overlay frames.
//!
//! Pixels are `0xAARRGGBB`. Every frame starts fully transparent; visible
//! shades are filled with the dim color and the selection border is drawn
//! on top according to the model's [`VisualStyle`].

use kurbo::Rect;
use peniko::Color;
use regionsnap_core::geometry::{RenderModel, VisualStyle};
use regionsnap_core::state::Region;
use thiserror::Error;

/// Marching-ants dash period in pixels.
pub const DASH_PERIOD: i64 = 8;
/// Number of dark pixels in each dash period.
pub const DASH_ON: i64 = 4;

const TRANSPARENT: u32 = 0x0000_0000;

/// Renderer errors.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("Invalid frame size: {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
    #[error("Surface error: {0}")]
    Surface(String),
}

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RendererError>;

/// Pack a color as `0xAARRGGBB`.
pub fn argb(color: Color) -> u32 {
    let rgba = color.to_rgba8();
    (rgba.a as u32) << 24 | (rgba.r as u32) << 16 | (rgba.g as u32) << 8 | rgba.b as u32
}

/// Colors used to draw the overlay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayPalette {
    /// Fill for the shades around the selection.
    pub dim: Color,
    /// Thin border while drawing.
    pub drawing_border: Color,
    /// Bold border of a confirmed or moving selection.
    pub bold_border: Color,
    /// Dashes running along the bold border.
    pub ants: Color,
}

impl Default for OverlayPalette {
    fn default() -> Self {
        Self {
            dim: Color::from_rgba8(0, 0, 0, 128),
            drawing_border: Color::from_rgba8(255, 255, 255, 255),
            bold_border: Color::from_rgba8(255, 255, 0, 255),
            ants: Color::from_rgba8(0, 0, 0, 255),
        }
    }
}

impl OverlayPalette {
    /// Set the shade color.
    pub fn with_dim(mut self, color: Color) -> Self {
        self.dim = color;
        self
    }
}

/// Row-major view over a pixel buffer with clipped drawing primitives.
struct Canvas<'a> {
    pixels: &'a mut [u32],
    width: usize,
    height: usize,
}

impl Canvas<'_> {
    fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width as f64, self.height as f64)
    }

    fn fill(&mut self, rect: Rect, color: u32) {
        let clipped = rect.intersect(self.bounds());
        if clipped.width() <= 0.0 || clipped.height() <= 0.0 {
            return;
        }
        let (x0, x1) = (clipped.x0 as usize, clipped.x1 as usize);
        for y in clipped.y0 as usize..clipped.y1 as usize {
            let row = y * self.width;
            self.pixels[row + x0..row + x1].fill(color);
        }
    }

    fn put(&mut self, x: i64, y: i64, color: u32) {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return;
        }
        self.pixels[y as usize * self.width + x as usize] = color;
    }

    /// One-pixel outline along the inside edge of `rect`.
    fn ring(&mut self, rect: Rect, color: u32) {
        if rect.width() <= 0.0 || rect.height() <= 0.0 {
            return;
        }
        let Rect { x0, y0, x1, y1 } = rect;
        self.fill(Rect::new(x0, y0, x1, y0 + 1.0), color);
        self.fill(Rect::new(x0, y1 - 1.0, x1, y1), color);
        self.fill(Rect::new(x0, y0, x0 + 1.0, y1), color);
        self.fill(Rect::new(x1 - 1.0, y0, x1, y1), color);
    }

    /// Dashes along the outline of `rect`, running clockwise as `phase` grows.
    fn ants(&mut self, rect: Rect, phase: i64, color: u32) {
        if rect.width() <= 0.0 || rect.height() <= 0.0 {
            return;
        }
        let (x0, y0) = (rect.x0 as i64, rect.y0 as i64);
        let (x1, y1) = (rect.x1 as i64 - 1, rect.y1 as i64 - 1);
        let on = |t: i64| (t + phase).rem_euclid(DASH_PERIOD) < DASH_ON;

        let (cx0, cx1) = (x0.max(0), x1.min(self.width as i64 - 1));
        for x in cx0..=cx1 {
            if on(x - x0) {
                self.put(x, y0, color);
            }
            if on(x1 - x) {
                self.put(x, y1, color);
            }
        }

        let (cy0, cy1) = (y0.max(0), y1.min(self.height as i64 - 1));
        for y in cy0..=cy1 {
            if on(y - y0) {
                self.put(x1, y, color);
            }
            if on(y1 - y) {
                self.put(x0, y, color);
            }
        }
    }
}

/// Snap a region to whole pixels.
fn pixel_rect(region: Region) -> Rect {
    region.to_rect().abs().round()
}

/// Rasterizes [`RenderModel`]s.
#[derive(Debug, Clone, Default)]
pub struct PixelRenderer {
    palette: OverlayPalette,
    /// Animation counter for the marching ants.
    animation_frame: u32,
}

impl PixelRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom palette.
    pub fn with_palette(mut self, palette: OverlayPalette) -> Self {
        self.palette = palette;
        self
    }

    /// Move the marching ants one pixel along.
    pub fn advance_animation(&mut self) {
        self.animation_frame = self.animation_frame.wrapping_add(1);
    }

    /// Draw `model` into a raw row-major buffer of `width * height` pixels.
    pub fn rasterize(
        &self,
        model: &RenderModel,
        pixels: &mut [u32],
        width: u32,
        height: u32,
    ) -> RenderResult<()> {
        if width == 0 || height == 0 {
            return Err(RendererError::InvalidSize { width, height });
        }
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(RendererError::Surface(format!(
                "buffer holds {} pixels, expected {}",
                pixels.len(),
                expected
            )));
        }

        pixels.fill(TRANSPARENT);
        if model.suppress_all {
            return Ok(());
        }

        let mut canvas = Canvas {
            pixels,
            width: width as usize,
            height: height as usize,
        };

        let dim = argb(self.palette.dim);
        for shade in model.shades().iter().filter(|s| s.visible) {
            canvas.fill(pixel_rect(shade.rect), dim);
        }

        let Some(selection) = model.selection_box else {
            return Ok(());
        };
        let rect = pixel_rect(selection);
        if rect.width() <= 0.0 || rect.height() <= 0.0 {
            return Ok(());
        }

        match model.style {
            VisualStyle::None => {}
            VisualStyle::Drawing => canvas.ring(rect, argb(self.palette.drawing_border)),
            VisualStyle::ConfirmedOrMoving => {
                let bold = argb(self.palette.bold_border);
                canvas.ring(rect, bold);
                canvas.ring(rect.inflate(1.0, 1.0), bold);
                canvas.ants(rect, self.animation_frame as i64, argb(self.palette.ants));
            }
        }
        Ok(())
    }
}
