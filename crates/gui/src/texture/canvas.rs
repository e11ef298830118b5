//! Minimal 2D drawing surface for procedural page textures.

use ab_glyph::{Font, FontRef, PxScale, ScaleFont};
use image::{Rgba, RgbaImage};

use crate::error::{Result, ViewerError};

/// RGBA color, straight (non-premultiplied) alpha
pub type Color = [u8; 4];

/// Pixel buffer plus a monospace face for text
pub struct Canvas {
    pixels: RgbaImage,
    font: FontRef<'static>,
}

impl Canvas {
    /// Canvas using the bundled Hack monospace face
    pub fn new(width: u32, height: u32) -> Result<Self> {
        Self::with_font(width, height, epaint_default_fonts::HACK_REGULAR)
    }

    pub fn with_font(width: u32, height: u32, font_data: &'static [u8]) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(ViewerError::Canvas(format!(
                "zero-sized canvas {width}x{height}"
            )));
        }
        let font = FontRef::try_from_slice(font_data)
            .map_err(|e| ViewerError::Canvas(format!("font unavailable: {e}")))?;
        Ok(Self {
            pixels: RgbaImage::new(width, height),
            font,
        })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn fill(&mut self, color: Color) {
        for p in self.pixels.pixels_mut() {
            *p = Rgba(color);
        }
    }

    /// 1px horizontal rule across the full width
    pub fn hline(&mut self, y: u32, color: Color) {
        if y >= self.height() {
            return;
        }
        for x in 0..self.width() {
            self.blend(x, y, color, 1.0);
        }
    }

    /// 1px vertical rule across the full height
    pub fn vline(&mut self, x: u32, color: Color) {
        if x >= self.width() {
            return;
        }
        for y in 0..self.height() {
            self.blend(x, y, color, 1.0);
        }
    }

    /// Draw `text` with its alphabetic baseline at `baseline`
    pub fn fill_text(&mut self, text: &str, x: f32, baseline: f32, size_px: f32, color: Color) {
        // CSS pixels are 3/4 of a point
        let scale = self
            .font
            .pt_to_px_scale(size_px * 0.75)
            .unwrap_or(PxScale::from(size_px));
        let scaled = self.font.as_scaled(scale);

        let mut caret = x;
        let mut outlines = Vec::new();
        for c in text.chars() {
            let id = scaled.glyph_id(c);
            let glyph = id.with_scale_and_position(scale, ab_glyph::point(caret, baseline));
            caret += scaled.h_advance(id);
            if let Some(outlined) = self.font.outline_glyph(glyph) {
                outlines.push(outlined);
            }
        }

        for outlined in outlines {
            let bounds = outlined.px_bounds();
            let (ox, oy) = (bounds.min.x as i64, bounds.min.y as i64);
            outlined.draw(|gx, gy, coverage| {
                let px = ox + gx as i64;
                let py = oy + gy as i64;
                if px >= 0 && py >= 0 {
                    self.blend(px as u32, py as u32, color, coverage);
                }
            });
        }
    }

    fn blend(&mut self, x: u32, y: u32, color: Color, coverage: f32) {
        if x >= self.width() || y >= self.height() {
            return;
        }
        let a = (color[3] as f32 / 255.0) * coverage.clamp(0.0, 1.0);
        let dst = self.pixels.get_pixel_mut(x, y);
        for i in 0..3 {
            let mixed = color[i] as f32 * a + dst.0[i] as f32 * (1.0 - a);
            dst.0[i] = mixed.round() as u8;
        }
        let out_a = a + (dst.0[3] as f32 / 255.0) * (1.0 - a);
        dst.0[3] = (out_a * 255.0).round() as u8;
    }

    pub fn into_image(self) -> RgbaImage {
        self.pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Color = [255, 255, 255, 255];
    const BLACK: Color = [0, 0, 0, 255];

    #[test]
    fn test_zero_size_rejected() {
        assert!(Canvas::new(0, 10).is_err());
    }

    #[test]
    fn test_bad_font_rejected() {
        static GARBAGE: [u8; 4] = [1, 2, 3, 4];
        assert!(matches!(
            Canvas::with_font(8, 8, &GARBAGE),
            Err(ViewerError::Canvas(_))
        ));
    }

    #[test]
    fn test_hline_touches_single_row() {
        let mut c = Canvas::new(4, 4).unwrap();
        c.fill(WHITE);
        c.hline(2, BLACK);
        let img = c.into_image();
        assert_eq!(img.get_pixel(0, 2).0, BLACK);
        assert_eq!(img.get_pixel(3, 2).0, BLACK);
        assert_eq!(img.get_pixel(0, 1).0, WHITE);
        assert_eq!(img.get_pixel(0, 3).0, WHITE);
    }

    #[test]
    fn test_translucent_vline_blends() {
        let mut c = Canvas::new(4, 4).unwrap();
        c.fill(WHITE);
        c.vline(1, [255, 0, 0, 51]);
        let p = c.into_image().get_pixel(1, 0).0;
        assert_eq!(p[0], 255);
        assert!(p[1] < 255 && p[1] > 200);
        assert_eq!(p[3], 255);
    }

    #[test]
    fn test_fill_text_marks_pixels() {
        let mut c = Canvas::new(64, 32).unwrap();
        c.fill(WHITE);
        c.fill_text("Hi", 2.0, 20.0, 14.0, BLACK);
        let img = c.into_image();
        assert!(img.pixels().any(|p| p.0[0] < 128));
    }

    #[test]
    fn test_out_of_bounds_lines_ignored() {
        let mut c = Canvas::new(4, 4).unwrap();
        c.fill(WHITE);
        c.hline(10, BLACK);
        c.vline(10, BLACK);
        assert!(c.into_image().pixels().all(|p| p.0 == WHITE));
    }
}
