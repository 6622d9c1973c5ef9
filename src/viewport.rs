//! # Viewport
//!
//! The viewport owns every hotspot of one layout and composes them into a
//! single frame. Layouts are rebuilt from scratch on each station switch, so a
//! viewport is never edited after the composer hands it over.

use crate::canvas::PixelBuffer;
use crate::display::{DisplaySink, SinkError};
use crate::hotspot::{Hotspot, RenderError};
use embedded_graphics::prelude::Point;
use std::time::Instant;
use thiserror::Error;

/// A hotspot placement that breaks the layout contract.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum LayoutError {
    #[error("{width}x{height} hotspot at ({x}, {y}) falls outside the {viewport_width}x{viewport_height} viewport")]
    OutOfBounds {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        viewport_width: u32,
        viewport_height: u32,
    },

    #[error("hotspot at ({x}, {y}) overlaps hotspot #{other}")]
    Overlap { x: i32, y: i32, other: usize },
}

/// Failure while producing or emitting a frame.
#[derive(Error, Debug)]
pub enum RefreshError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

#[derive(Debug)]
struct Placement {
    hotspot: Hotspot,
    position: Point,
}

impl Placement {
    fn overlaps(&self, other_position: Point, other_width: u32, other_height: u32) -> bool {
        let (ax, ay) = (self.position.x, self.position.y);
        let (aw, ah) = (self.hotspot.width() as i32, self.hotspot.height() as i32);
        let (bx, by) = (other_position.x, other_position.y);
        let (bw, bh) = (other_width as i32, other_height as i32);
        ax < bx + bw && bx < ax + aw && ay < by + bh && by < ay + ah
    }
}

/// Ordered set of hotspots composed into one frame buffer.
#[derive(Debug)]
pub struct Viewport {
    hotspots: Vec<Placement>,
    frame: PixelBuffer,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            hotspots: Vec::new(),
            frame: PixelBuffer::new(width, height),
        }
    }

    pub fn width(&self) -> u32 {
        self.frame.width()
    }

    pub fn height(&self) -> u32 {
        self.frame.height()
    }

    pub fn hotspot_count(&self) -> usize {
        self.hotspots.len()
    }

    /// Register a hotspot at a fixed offset.
    ///
    /// The region must lie inside the viewport and must not overlap any
    /// hotspot already registered.
    pub fn add_hotspot(&mut self, hotspot: Hotspot, position: Point) -> Result<(), LayoutError> {
        let (width, height) = (hotspot.width(), hotspot.height());
        let fits = position.x >= 0
            && position.y >= 0
            && position.x as u32 + width <= self.width()
            && position.y as u32 + height <= self.height();
        if !fits {
            return Err(LayoutError::OutOfBounds {
                x: position.x,
                y: position.y,
                width,
                height,
                viewport_width: self.width(),
                viewport_height: self.height(),
            });
        }

        if let Some(other) = self
            .hotspots
            .iter()
            .position(|placed| placed.overlaps(position, width, height))
        {
            return Err(LayoutError::Overlap {
                x: position.x,
                y: position.y,
                other,
            });
        }

        self.hotspots.push(Placement { hotspot, position });
        Ok(())
    }

    /// Render every hotspot that is due, compose the frame and push it to `sink`.
    pub fn refresh<D: DisplaySink + ?Sized>(
        &mut self,
        now: Instant,
        sink: &mut D,
    ) -> Result<&PixelBuffer, RefreshError> {
        for placed in self.hotspots.iter_mut() {
            let canvas = placed.hotspot.render(now)?;
            self.frame.blit(canvas, placed.position.x, placed.position.y);
        }
        sink.push_frame(&self.frame)?;
        Ok(&self.frame)
    }

    /// Most recently composed frame.
    pub fn frame(&self) -> &PixelBuffer {
        &self.frame
    }
}
