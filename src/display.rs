//! # Display Sinks
//!
//! A sink is wherever composed frames end up. Three are provided:
//! - [`NullSink`]: headless operation, frames are counted and dropped
//! - [`TerminalSink`]: development mode, frames are printed as ASCII art
//! - `Ssd1322` (feature `hardware`): the real OLED panel over SPI
//!
//! The panel geometry and the 4-bit packing shared by hardware drivers also
//! live here so they can be tested on any host.

use crate::canvas::PixelBuffer;
use std::io::Write;
use thiserror::Error;

/// SSD1322 panel width in pixels.
pub const PANEL_WIDTH: u32 = 256;
/// SSD1322 panel height in pixels.
pub const PANEL_HEIGHT: u32 = 64;

/// Errors raised while pushing frames to a sink.
#[derive(Error, Debug)]
pub enum SinkError {
    /// SPI or GPIO transfer failed
    #[error("display bus error: {0}")]
    Bus(String),

    /// Frame does not match the panel geometry
    #[error("frame is {width}x{height}, panel expects {expected_width}x{expected_height}")]
    FrameSize {
        width: u32,
        height: u32,
        expected_width: u32,
        expected_height: u32,
    },

    /// Writing the terminal preview failed
    #[error("terminal output: {0}")]
    Io(#[from] std::io::Error),
}

/// Destination for composed frames.
pub trait DisplaySink {
    /// Show a fully composed frame.
    fn push_frame(&mut self, frame: &PixelBuffer) -> Result<(), SinkError>;

    /// Blank the panel ahead of a layout swap.
    fn clear(&mut self) -> Result<(), SinkError>;
}

impl<T: DisplaySink + ?Sized> DisplaySink for Box<T> {
    fn push_frame(&mut self, frame: &PixelBuffer) -> Result<(), SinkError> {
        (**self).push_frame(frame)
    }

    fn clear(&mut self) -> Result<(), SinkError> {
        (**self).clear()
    }
}

/// Panel orientation. Only the two landscape orientations fit a 256×64 layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Rotation {
    #[default]
    Normal,
    UpsideDown,
}

impl Rotation {
    /// Map the configured quarter-turn count (0–3) to a supported rotation.
    pub fn from_quarter_turns(turns: u8) -> Option<Self> {
        match turns {
            0 => Some(Rotation::Normal),
            2 => Some(Rotation::UpsideDown),
            _ => None,
        }
    }
}

/// Pack a frame into 4-bit grayscale, two pixels per byte, left pixel in the
/// high nibble. `UpsideDown` reverses pixel order to turn the image 180°.
pub fn pack_gray4(frame: &PixelBuffer, rotation: Rotation) -> Vec<u8> {
    let pixels = frame.pixels();
    let level = |index: usize| -> u8 {
        let index = match rotation {
            Rotation::Normal => index,
            Rotation::UpsideDown => pixels.len() - 1 - index,
        };
        pixels[index] >> 4
    };

    let mut packed = Vec::with_capacity(pixels.len().div_ceil(2));
    for pair in (0..pixels.len()).step_by(2) {
        let high = level(pair);
        let low = if pair + 1 < pixels.len() {
            level(pair + 1)
        } else {
            0
        };
        packed.push((high << 4) | low);
    }
    packed
}

/// Check a frame against the panel geometry.
pub fn check_frame_size(frame: &PixelBuffer) -> Result<(), SinkError> {
    if frame.width() != PANEL_WIDTH || frame.height() != PANEL_HEIGHT {
        return Err(SinkError::FrameSize {
            width: frame.width(),
            height: frame.height(),
            expected_width: PANEL_WIDTH,
            expected_height: PANEL_HEIGHT,
        });
    }
    Ok(())
}

/// Headless sink: frames go nowhere.
#[derive(Debug, Default)]
pub struct NullSink {
    frames_pushed: u64,
    clears: u64,
}

impl NullSink {
    pub fn frames_pushed(&self) -> u64 {
        self.frames_pushed
    }

    pub fn clears(&self) -> u64 {
        self.clears
    }
}

impl DisplaySink for NullSink {
    fn push_frame(&mut self, _frame: &PixelBuffer) -> Result<(), SinkError> {
        self.frames_pushed += 1;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), SinkError> {
        self.clears += 1;
        Ok(())
    }
}

/// Development sink that prints each distinct frame as ASCII art.
///
/// Frames identical to the previous one are skipped so the clock's sub-second
/// refresh doesn't flood the terminal.
pub struct TerminalSink<W: Write> {
    out: W,
    last_frame: Option<PixelBuffer>,
}

impl<W: Write> TerminalSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            last_frame: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> DisplaySink for TerminalSink<W> {
    fn push_frame(&mut self, frame: &PixelBuffer) -> Result<(), SinkError> {
        if self.last_frame.as_ref() == Some(frame) {
            return Ok(());
        }
        self.out.write_all(render_ascii(frame).as_bytes())?;
        self.out.flush()?;
        self.last_frame = Some(frame.clone());
        Ok(())
    }

    fn clear(&mut self) -> Result<(), SinkError> {
        self.last_frame = None;
        Ok(())
    }
}

/// Render a frame as text: `█` for lit pixels, a space otherwise, framed by a border.
pub fn render_ascii(frame: &PixelBuffer) -> String {
    let border = format!("+{}+\n", "-".repeat(frame.width() as usize));
    let mut text = String::with_capacity(border.len() * (frame.height() as usize + 2) * 3);
    text.push_str(&border);
    for y in 0..frame.height() {
        text.push('|');
        for x in 0..frame.width() {
            text.push(if frame.is_lit(x, y) { '█' } else { ' ' });
        }
        text.push_str("|\n");
    }
    text.push_str(&border);
    text
}
