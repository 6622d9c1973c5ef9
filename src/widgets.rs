//! Board widgets: the [`Drawable`] content of each hotspot.
//!
//! Every widget holds the data it shows plus a handle to the shared
//! [`DisplayContext`], and draws from cached bitmaps.

use crate::canvas::PixelBuffer;
use crate::context::DisplayContext;
use crate::departures::ArrivalTime;
use crate::hotspot::{Drawable, RenderError};
use chrono::Timelike;
use std::rc::Rc;

/// Vertical offset of the clock's seconds, which sit lower than the hours.
pub const SECONDS_Y_OFFSET: i32 = 5;

/// Reference string for centering the clock; digits are fixed-width.
const SECONDS_TEMPLATE: &str = ":00";

/// Station name or banner text in the title face at a fixed horizontal offset.
pub struct StationLabel {
    ctx: Rc<DisplayContext>,
    text: String,
    x_offset: i32,
}

impl StationLabel {
    /// Label centered within `width` pixels. Text wider than the row starts at 0.
    pub fn centered(ctx: Rc<DisplayContext>, text: impl Into<String>, width: u32) -> Self {
        let text = text.into();
        let text_width = ctx.text_width(&text, &ctx.fonts().title);
        let x_offset = (width.saturating_sub(text_width) / 2) as i32;
        Self {
            ctx,
            text,
            x_offset,
        }
    }

    pub fn x_offset(&self) -> i32 {
        self.x_offset
    }
}

impl Drawable for StationLabel {
    fn draw(&self, canvas: &mut PixelBuffer, _width: u32, _height: u32) -> Result<(), RenderError> {
        let bitmap = self.ctx.bitmap(&self.text, &self.ctx.fonts().title);
        canvas.draw_bitmap(&bitmap, self.x_offset, 0);
        Ok(())
    }
}

/// Left-aligned route or destination text; clipped by the hotspot width.
pub struct RouteLabel {
    ctx: Rc<DisplayContext>,
    route: String,
}

impl RouteLabel {
    pub fn new(ctx: Rc<DisplayContext>, route: impl Into<String>) -> Self {
        Self {
            ctx,
            route: route.into(),
        }
    }
}

impl Drawable for RouteLabel {
    fn draw(&self, canvas: &mut PixelBuffer, _width: u32, _height: u32) -> Result<(), RenderError> {
        let bitmap = self.ctx.bitmap(&self.route, &self.ctx.fonts().regular);
        canvas.draw_bitmap(&bitmap, 0, 0);
        Ok(())
    }
}

/// Right-aligned "Due", "`N` min" or "N/A".
pub struct MinutesLabel {
    ctx: Rc<DisplayContext>,
    arrival: ArrivalTime,
}

impl MinutesLabel {
    pub fn new(ctx: Rc<DisplayContext>, arrival: ArrivalTime) -> Self {
        Self { ctx, arrival }
    }
}

impl Drawable for MinutesLabel {
    fn draw(&self, canvas: &mut PixelBuffer, width: u32, _height: u32) -> Result<(), RenderError> {
        let text = self.arrival.to_string();
        let bitmap = self.ctx.bitmap(&text, &self.ctx.fonts().regular);
        let x = width.saturating_sub(bitmap.width()) as i32;
        canvas.draw_bitmap(&bitmap, x, 0);
        Ok(())
    }
}

/// Live clock: `H:MM` in the large face followed by `:SS` in the tall face.
pub struct ClockLabel {
    ctx: Rc<DisplayContext>,
}

impl ClockLabel {
    pub fn new(ctx: Rc<DisplayContext>) -> Self {
        Self { ctx }
    }
}

impl Drawable for ClockLabel {
    fn draw(&self, canvas: &mut PixelBuffer, width: u32, _height: u32) -> Result<(), RenderError> {
        let now = self.ctx.local_time();
        let fonts = self.ctx.fonts();

        let hours_minutes = self
            .ctx
            .bitmap(&format!("{}:{:02}", now.hour(), now.minute()), &fonts.large);
        let seconds_width = self.ctx.bitmap(SECONDS_TEMPLATE, &fonts.tall).width();
        let seconds = self
            .ctx
            .bitmap(&format!(":{:02}", now.second()), &fonts.tall);

        let x = (width.saturating_sub(hours_minutes.width() + seconds_width) / 2) as i32;
        canvas.draw_bitmap(&hours_minutes, x, 0);
        canvas.draw_bitmap(&seconds, x + hours_minutes.width() as i32, SECONDS_Y_OFFSET);
        Ok(())
    }
}
