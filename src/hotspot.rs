//! # Hotspots
//!
//! A hotspot is a rectangular piece of the frame with its own redraw cadence.
//! The clock row redraws ten times a second while station and route rows only
//! redraw every `refresh_time`; between redraws the hotspot hands back the
//! canvas it rendered last.

use crate::canvas::PixelBuffer;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors raised while drawing a hotspot. Always fatal to the render loop.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("failed to draw {widget}: {reason}")]
    Draw { widget: String, reason: String },
}

/// Content that knows how to paint itself onto a hotspot canvas.
///
/// Implementations capture everything they need when they are built; a
/// layout swap throws them away and builds new ones.
pub trait Drawable {
    fn draw(&self, canvas: &mut PixelBuffer, width: u32, height: u32) -> Result<(), RenderError>;
}

/// An independently refreshed region of the frame.
pub struct Hotspot {
    interval: Duration,
    drawable: Box<dyn Drawable>,
    last_rendered_at: Option<Instant>,
    canvas: PixelBuffer,
}

impl Hotspot {
    pub fn new<D: Drawable + 'static>(
        width: u32,
        height: u32,
        interval: Duration,
        drawable: D,
    ) -> Self {
        Self {
            interval,
            drawable: Box::new(drawable),
            last_rendered_at: None,
            canvas: PixelBuffer::new(width, height),
        }
    }

    pub fn width(&self) -> u32 {
        self.canvas.width()
    }

    pub fn height(&self) -> u32 {
        self.canvas.height()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// True if the hotspot has never rendered or its interval has elapsed.
    pub fn should_redraw(&self, now: Instant) -> bool {
        match self.last_rendered_at {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        }
    }

    /// Redraw onto a blank canvas when due, otherwise return the cached one.
    pub fn render(&mut self, now: Instant) -> Result<&PixelBuffer, RenderError> {
        if self.should_redraw(now) {
            self.canvas.clear();
            let (width, height) = (self.canvas.width(), self.canvas.height());
            self.drawable.draw(&mut self.canvas, width, height)?;
            self.last_rendered_at = Some(now);
        }
        Ok(&self.canvas)
    }

    /// Canvas from the most recent render.
    pub fn canvas(&self) -> &PixelBuffer {
        &self.canvas
    }
}

impl std::fmt::Debug for Hotspot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hotspot")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("interval", &self.interval)
            .field("last_rendered_at", &self.last_rendered_at)
            .finish_non_exhaustive()
    }
}
