//! # Pixel Buffers
//!
//! Monochrome pixel storage shared by the glyph cache, hotspots and the viewport.
//! Each pixel is one byte of luminance: `0x00` is off and `0xFF` is full
//! intensity. Panel drivers pack this down to whatever depth the controller wants
//! (4-bit gray for the SSD1322).
//!
//! [`PixelBuffer`] implements `embedded-graphics`' [`DrawTarget`] so fonts and
//! primitives can be drawn straight into it.

use core::convert::Infallible;
use embedded_graphics::{pixelcolor::BinaryColor, prelude::*};

/// Luminance of a lit pixel.
pub const PIXEL_ON: u8 = 0xFF;
/// Luminance of a dark pixel.
pub const PIXEL_OFF: u8 = 0x00;

/// A `width × height` grid of luminance bytes, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl PixelBuffer {
    /// Allocate a dark buffer.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![PIXEL_OFF; (width * height) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw row-major luminance bytes.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Reset every pixel to dark.
    pub fn clear(&mut self) {
        self.pixels.fill(PIXEL_OFF);
    }

    /// Luminance at `(x, y)`, or dark when outside the buffer.
    pub fn get(&self, x: u32, y: u32) -> u8 {
        if x >= self.width || y >= self.height {
            return PIXEL_OFF;
        }
        self.pixels[(y * self.width + x) as usize]
    }

    /// Set a pixel; writes outside the buffer are clipped.
    pub fn set(&mut self, x: i32, y: i32, value: u8) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let index = (y as u32 * self.width + x as u32) as usize;
        self.pixels[index] = value;
    }

    pub fn is_lit(&self, x: u32, y: u32) -> bool {
        self.get(x, y) != PIXEL_OFF
    }

    /// Number of non-dark pixels.
    pub fn lit_count(&self) -> usize {
        self.pixels.iter().filter(|&&p| p != PIXEL_OFF).count()
    }

    /// Copy `src` into this buffer with its top-left corner at `(x, y)`.
    ///
    /// Every source pixel replaces the destination, dark ones included, so a
    /// blit fully repaints the covered region.
    pub fn blit(&mut self, src: &PixelBuffer, x: i32, y: i32) {
        self.overlay(src, x, y, false);
    }

    /// Paint the lit pixels of `src` at `(x, y)`, leaving the background untouched.
    pub fn draw_bitmap(&mut self, src: &PixelBuffer, x: i32, y: i32) {
        self.overlay(src, x, y, true);
    }

    fn overlay(&mut self, src: &PixelBuffer, x: i32, y: i32, transparent: bool) {
        for sy in 0..src.height {
            for sx in 0..src.width {
                let value = src.pixels[(sy * src.width + sx) as usize];
                if transparent && value == PIXEL_OFF {
                    continue;
                }
                self.set(x + sx as i32, y + sy as i32, value);
            }
        }
    }
}

impl OriginDimensions for PixelBuffer {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for PixelBuffer {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            let value = if color.is_on() { PIXEL_ON } else { PIXEL_OFF };
            self.set(point.x, point.y, value);
        }
        Ok(())
    }
}
