//! # Glyph Bitmap Cache
//!
//! Text on the board comes from a small, slowly changing vocabulary: station
//! names, route labels, "Due", two-digit minute counts and the clock digits.
//! Rasterizing the same strings ten times a second would waste most of a Pi
//! Zero's CPU, so every `(text, font)` pair is rendered once into a [`Bitmap`]
//! and reused from then on.
//!
//! ## Font/metric service
//! Measuring and rasterizing go through the [`TextRasterizer`] trait. The
//! production implementation, [`MonoRasterizer`], uses the monospaced bitmap
//! fonts bundled with `embedded-graphics`; tests plug in counting wrappers.
//!
//! ## Eviction
//! The default [`EvictionPolicy::Never`] keeps entries for the life of the
//! process. [`EvictionPolicy::MaxEntries`] bounds memory by dropping the oldest
//! entry first, for deployments that show many distinct stations.

use crate::canvas::PixelBuffer;
use embedded_graphics::{
    mono_font::{MonoFont, MonoTextStyle},
    pixelcolor::BinaryColor,
    prelude::*,
    text::{renderer::TextRenderer, Baseline, Text},
};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::rc::Rc;

/// A rendered run of text: lit glyph pixels on a dark background.
pub type Bitmap = PixelBuffer;

/// Identity of a typeface at a given size and style.
#[derive(Clone, Copy)]
pub struct FontFace {
    pub family: &'static str,
    pub size: u32,
    pub bold: bool,
    pub glyphs: &'static MonoFont<'static>,
}

impl FontFace {
    /// Stable identity string used as a cache-key component.
    ///
    /// Includes the glyph cell size so two faces sharing a family and size but
    /// backed by different glyph tables never share cache entries.
    pub fn identity(&self) -> String {
        let cell = self.glyphs.character_size;
        let style = if self.bold { "-bold" } else { "" };
        format!(
            "{}-{}-{}x{}{}",
            self.family, self.size, cell.width, cell.height, style
        )
    }
}

impl fmt::Debug for FontFace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FontFace").field(&self.identity()).finish()
    }
}

/// Font metric and rasterization service.
pub trait TextRasterizer {
    /// Bounding box of `text` when drawn with its top-left corner at the origin.
    fn measure(&self, text: &str, font: &FontFace) -> Size;

    /// Render `text` at full intensity into a bitmap sized to its bounding box.
    fn rasterize(&self, text: &str, font: &FontFace) -> Bitmap;
}

/// [`TextRasterizer`] backed by `embedded-graphics` mono fonts.
#[derive(Clone, Copy, Debug, Default)]
pub struct MonoRasterizer;

impl TextRasterizer for MonoRasterizer {
    fn measure(&self, text: &str, font: &FontFace) -> Size {
        let style = MonoTextStyle::new(font.glyphs, BinaryColor::On);
        style
            .measure_string(text, Point::zero(), Baseline::Top)
            .bounding_box
            .size
    }

    fn rasterize(&self, text: &str, font: &FontFace) -> Bitmap {
        let size = self.measure(text, font);
        let mut bitmap = Bitmap::new(size.width, size.height);
        let style = MonoTextStyle::new(font.glyphs, BinaryColor::On);
        Text::with_baseline(text, Point::zero(), style, Baseline::Top)
            .draw(&mut bitmap)
            .ok();
        bitmap
    }
}

/// When cached bitmaps are dropped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EvictionPolicy {
    /// Keep every entry for the life of the cache.
    #[default]
    Never,
    /// Keep at most this many entries, evicting the oldest first.
    MaxEntries(usize),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct GlyphKey {
    text: String,
    font: String,
}

/// Memoizes `(text, font) → bitmap` conversions.
pub struct GlyphBitmapCache {
    rasterizer: Box<dyn TextRasterizer>,
    policy: EvictionPolicy,
    entries: HashMap<GlyphKey, Rc<Bitmap>>,
    insertion_order: VecDeque<GlyphKey>,
}

impl GlyphBitmapCache {
    pub fn new<R: TextRasterizer + 'static>(rasterizer: R, policy: EvictionPolicy) -> Self {
        Self {
            rasterizer: Box::new(rasterizer),
            policy,
            entries: HashMap::new(),
            insertion_order: VecDeque::new(),
        }
    }

    /// Return the bitmap for `text` in `font`, rasterizing it on first use.
    ///
    /// Repeated calls for the same key hand back the same shared bitmap.
    pub fn get_bitmap(&mut self, text: &str, font: &FontFace) -> Rc<Bitmap> {
        let key = GlyphKey {
            text: text.to_owned(),
            font: font.identity(),
        };
        if let Some(bitmap) = self.entries.get(&key) {
            return Rc::clone(bitmap);
        }

        let bitmap = Rc::new(self.rasterizer.rasterize(text, font));
        self.make_room();
        self.insertion_order.push_back(key.clone());
        self.entries.insert(key, Rc::clone(&bitmap));
        bitmap
    }

    /// Measure `text` without caching anything.
    pub fn measure(&self, text: &str, font: &FontFace) -> Size {
        self.rasterizer.measure(text, font)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn make_room(&mut self) {
        let EvictionPolicy::MaxEntries(limit) = self.policy else {
            return;
        };
        while self.entries.len() >= limit.max(1) {
            match self.insertion_order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }
}

impl Default for GlyphBitmapCache {
    fn default() -> Self {
        Self::new(MonoRasterizer, EvictionPolicy::Never)
    }
}

impl fmt::Debug for GlyphBitmapCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlyphBitmapCache")
            .field("policy", &self.policy)
            .field("entries", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::mono_font::ascii::{FONT_5X8, FONT_6X10};
    use std::cell::Cell;

    const SMALL: FontFace = FontFace {
        family: "mono",
        size: 8,
        bold: false,
        glyphs: &FONT_5X8,
    };
    const LARGE: FontFace = FontFace {
        family: "mono",
        size: 10,
        bold: false,
        glyphs: &FONT_6X10,
    };

    /// Wraps the real rasterizer and counts how often it renders.
    struct CountingRasterizer {
        calls: Rc<Cell<usize>>,
    }

    impl TextRasterizer for CountingRasterizer {
        fn measure(&self, text: &str, font: &FontFace) -> Size {
            MonoRasterizer.measure(text, font)
        }

        fn rasterize(&self, text: &str, font: &FontFace) -> Bitmap {
            self.calls.set(self.calls.get() + 1);
            MonoRasterizer.rasterize(text, font)
        }
    }

    fn counting_cache(policy: EvictionPolicy) -> (GlyphBitmapCache, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        let cache = GlyphBitmapCache::new(
            CountingRasterizer {
                calls: Rc::clone(&calls),
            },
            policy,
        );
        (cache, calls)
    }

    #[test]
    fn test_cache_hit_reuses_bitmap() {
        let (mut cache, calls) = counting_cache(EvictionPolicy::Never);

        let first = cache.get_bitmap("Due", &SMALL);
        let second = cache.get_bitmap("Due", &SMALL);

        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(*first, *second);
        assert_eq!(calls.get(), 1, "rasterizer should run once per key");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_font_identity_is_part_of_key() {
        let (mut cache, calls) = counting_cache(EvictionPolicy::Never);

        let small = cache.get_bitmap("12 min", &SMALL);
        let large = cache.get_bitmap("12 min", &LARGE);

        assert_eq!(calls.get(), 2);
        assert!(large.width() > small.width());
    }

    #[test]
    fn test_identity_distinguishes_style() {
        let bold = FontFace { bold: true, ..SMALL };
        assert_ne!(SMALL.identity(), bold.identity());
        assert_eq!(SMALL.identity(), "mono-8-5x8");
        assert_eq!(bold.identity(), "mono-8-5x8-bold");
    }

    #[test]
    fn test_identity_distinguishes_glyph_tables() {
        let other_table = FontFace {
            size: 8,
            ..LARGE
        };
        assert_eq!(other_table.identity(), "mono-8-6x10");
        assert_ne!(SMALL.identity(), other_table.identity());

        let (mut cache, calls) = counting_cache(EvictionPolicy::Never);
        cache.get_bitmap("Due", &SMALL);
        cache.get_bitmap("Due", &other_table);
        assert_eq!(calls.get(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_bitmap_matches_measured_box() {
        let cache = GlyphBitmapCache::default();
        let size = cache.measure("Brixton", &SMALL);
        let bitmap = MonoRasterizer.rasterize("Brixton", &SMALL);

        assert_eq!(size.width, 7 * 5);
        assert_eq!(bitmap.width(), size.width);
        assert_eq!(bitmap.height(), size.height);
        assert!(bitmap.lit_count() > 0);
    }

    #[test]
    fn test_max_entries_evicts_oldest() {
        let (mut cache, calls) = counting_cache(EvictionPolicy::MaxEntries(2));

        cache.get_bitmap("1 min", &SMALL);
        cache.get_bitmap("2 min", &SMALL);
        cache.get_bitmap("3 min", &SMALL);
        assert_eq!(cache.len(), 2);

        // "1 min" was evicted and must be rasterized again
        cache.get_bitmap("1 min", &SMALL);
        assert_eq!(calls.get(), 4);
        // "3 min" survived
        cache.get_bitmap("3 min", &SMALL);
        assert_eq!(calls.get(), 4);
    }
}
