//! # Display Context
//!
//! Everything a drawing routine needs besides its own data: the font set, the
//! shared glyph cache and a wall clock. One context is built in `main` and
//! handed to the composer as an `Rc`, so hotspots built for each layout share
//! a single cache instead of reaching for process-wide globals.

use crate::glyph_cache::{Bitmap, EvictionPolicy, FontFace, GlyphBitmapCache, MonoRasterizer};
use chrono::{Local, NaiveTime};
use embedded_graphics::mono_font::ascii::{FONT_5X8, FONT_6X10, FONT_6X9, FONT_8X13_BOLD};
use std::cell::RefCell;
use std::rc::Rc;

/// Source of local wall-clock time for the clock row and operating hours.
pub trait WallClock {
    fn local_time(&self) -> NaiveTime;
}

/// The system's local time zone.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalClock;

impl WallClock for LocalClock {
    fn local_time(&self) -> NaiveTime {
        Local::now().time()
    }
}

/// A clock frozen at one instant. Useful for previews and tests.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub NaiveTime);

impl WallClock for FixedClock {
    fn local_time(&self) -> NaiveTime {
        self.0
    }
}

/// The four faces used on the board.
#[derive(Clone, Copy, Debug)]
pub struct FontSet {
    /// Route labels and minute counts
    pub regular: FontFace,
    /// Station names and the welcome banner
    pub title: FontFace,
    /// Clock seconds
    pub tall: FontFace,
    /// Clock hours and minutes
    pub large: FontFace,
}

impl Default for FontSet {
    fn default() -> Self {
        FontSet {
            regular: FontFace {
                family: "dot-matrix",
                size: 8,
                bold: false,
                glyphs: &FONT_5X8,
            },
            title: FontFace {
                family: "dot-matrix",
                size: 10,
                bold: false,
                glyphs: &FONT_6X10,
            },
            tall: FontFace {
                family: "dot-matrix-tall",
                size: 9,
                bold: false,
                glyphs: &FONT_6X9,
            },
            large: FontFace {
                family: "dot-matrix",
                size: 13,
                bold: true,
                glyphs: &FONT_8X13_BOLD,
            },
        }
    }
}

/// Fonts, glyph cache and clock shared by every hotspot.
pub struct DisplayContext {
    fonts: FontSet,
    glyphs: RefCell<GlyphBitmapCache>,
    clock: Box<dyn WallClock>,
}

impl DisplayContext {
    pub fn new<C: WallClock + 'static>(fonts: FontSet, glyphs: GlyphBitmapCache, clock: C) -> Self {
        Self {
            fonts,
            glyphs: RefCell::new(glyphs),
            clock: Box::new(clock),
        }
    }

    /// Default fonts, an unbounded mono-font cache and the local clock.
    pub fn with_defaults() -> Self {
        Self::new(
            FontSet::default(),
            GlyphBitmapCache::new(MonoRasterizer, EvictionPolicy::Never),
            LocalClock,
        )
    }

    pub fn fonts(&self) -> &FontSet {
        &self.fonts
    }

    /// Cached bitmap for `text` in `font`.
    pub fn bitmap(&self, text: &str, font: &FontFace) -> Rc<Bitmap> {
        self.glyphs.borrow_mut().get_bitmap(text, font)
    }

    /// Rendered width of `text` in pixels.
    pub fn text_width(&self, text: &str, font: &FontFace) -> u32 {
        self.glyphs.borrow().measure(text, font).width
    }

    pub fn local_time(&self) -> NaiveTime {
        self.clock.local_time()
    }

    /// Number of distinct bitmaps currently cached.
    pub fn cached_glyphs(&self) -> usize {
        self.glyphs.borrow().len()
    }
}

impl std::fmt::Debug for DisplayContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisplayContext")
            .field("fonts", &self.fonts)
            .field("glyphs", &self.glyphs)
            .finish_non_exhaustive()
    }
}
