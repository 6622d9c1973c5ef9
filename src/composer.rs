//! # Signage Composer
//!
//! Builds the two screens the board can show, as fresh [`Viewport`]s:
//!
//! ```text
//! Blank layout                       Departures layout
//! ┌──────────────────────────────┐   ┌──────────────────────────────┐
//! │          Welcome to          │   │        Clapham North         │ y=0
//! │        Clapham North         │   │ Morden               Due     │ y=12
//! │                              │   │ Morden via Bank       4 min  │ y=24
//! │                              │   │ Kennington            9 min  │ y=36
//! │           9:05:07            │   │           9:05:07            │ y=50
//! └──────────────────────────────┘   └──────────────────────────────┘
//! ```
//!
//! Text rows redraw every `refresh_time`; the clock redraws every 100 ms so
//! the seconds tick smoothly. Each departure row is split into a route hotspot
//! and a minutes hotspot so the two can be cached and redrawn independently.

use crate::context::DisplayContext;
use crate::departures::{Departure, DeparturesSnapshot};
use crate::hotspot::Hotspot;
use crate::viewport::{LayoutError, Viewport};
use crate::widgets::{ClockLabel, MinutesLabel, RouteLabel, StationLabel};
use embedded_graphics::prelude::Point;
use std::rc::Rc;
use std::time::Duration;

/// Redraw interval of the clock row.
pub const CLOCK_REFRESH: Duration = Duration::from_millis(100);
/// Departure rows shown below the station name.
pub const MAX_DEPARTURE_ROWS: usize = 3;

const WELCOME_TEXT: &str = "Welcome to";
const ROW_HEIGHT: u32 = 10;
const ROW_PITCH: i32 = 12;
const CLOCK_ROW_Y: i32 = 50;
const CLOCK_ROW_HEIGHT: u32 = 14;
/// Widest minutes label the column must fit.
const MINUTES_TEMPLATE: &str = "88 min";
const MINUTES_GAP: u32 = 5;

/// Which screen a layout shows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayoutKind {
    /// Welcome banner, station name and clock
    Blank,
    /// Station name, `rows` departure rows and clock
    Departures { rows: usize },
}

/// A built layout together with what it shows.
#[derive(Debug)]
pub struct Signage {
    pub kind: LayoutKind,
    /// Station name in the title row
    pub title: String,
    pub viewport: Viewport,
}

/// Builds blank and departures layouts for a fixed-size panel.
#[derive(Debug)]
pub struct SignageComposer {
    ctx: Rc<DisplayContext>,
    width: u32,
    height: u32,
    refresh_interval: Duration,
    fallback_name: String,
}

impl SignageComposer {
    pub fn new(
        ctx: Rc<DisplayContext>,
        width: u32,
        height: u32,
        refresh_interval: Duration,
        fallback_name: impl Into<String>,
    ) -> Self {
        Self {
            ctx,
            width,
            height,
            refresh_interval,
            fallback_name: fallback_name.into(),
        }
    }

    pub fn context(&self) -> &Rc<DisplayContext> {
        &self.ctx
    }

    /// Name shown when there is nothing to display.
    pub fn fallback_name(&self) -> &str {
        &self.fallback_name
    }

    /// Decide which screen `station` gets.
    ///
    /// `data` is `None` when the fetch failed or the board is out of hours.
    pub fn select_layout(data: Option<&DeparturesSnapshot>, station: &str) -> LayoutKind {
        match data.and_then(|snapshot| snapshot.departures(station)) {
            Some(departures) if !departures.is_empty() => LayoutKind::Departures {
                rows: departures.len().min(MAX_DEPARTURE_ROWS),
            },
            _ => LayoutKind::Blank,
        }
    }

    /// Build whichever layout [`select_layout`](Self::select_layout) picks.
    pub fn build_layout(
        &self,
        data: Option<&DeparturesSnapshot>,
        station: &str,
    ) -> Result<Signage, LayoutError> {
        match data {
            Some(snapshot) => self.build_departures_layout(snapshot, station),
            None => self.build_blank_layout(&self.fallback_name),
        }
    }

    /// Welcome screen for `station_name`.
    pub fn build_blank_layout(&self, station_name: &str) -> Result<Signage, LayoutError> {
        let mut viewport = Viewport::new(self.width, self.height);
        viewport.add_hotspot(self.title_row(WELCOME_TEXT), Point::new(0, 0))?;
        viewport.add_hotspot(self.title_row(station_name), Point::new(0, ROW_PITCH))?;
        viewport.add_hotspot(self.clock_row(), Point::new(0, CLOCK_ROW_Y))?;

        Ok(Signage {
            kind: LayoutKind::Blank,
            title: station_name.to_owned(),
            viewport,
        })
    }

    /// Departure board for `station_name`, or the fallback welcome screen when
    /// the snapshot has nothing for it.
    pub fn build_departures_layout(
        &self,
        snapshot: &DeparturesSnapshot,
        station_name: &str,
    ) -> Result<Signage, LayoutError> {
        let departures = match snapshot.departures(station_name) {
            Some(departures) if !departures.is_empty() => departures,
            _ => return self.build_blank_layout(&self.fallback_name),
        };
        let shown = &departures[..departures.len().min(MAX_DEPARTURE_ROWS)];

        let mut viewport = Viewport::new(self.width, self.height);
        viewport.add_hotspot(self.title_row(station_name), Point::new(0, 0))?;

        let minutes_width = self
            .ctx
            .text_width(MINUTES_TEMPLATE, &self.ctx.fonts().regular);
        let route_width = self.width.saturating_sub(minutes_width + MINUTES_GAP);
        let minutes_x = self.width.saturating_sub(minutes_width) as i32;
        for (index, departure) in shown.iter().enumerate() {
            let y = ROW_PITCH + index as i32 * ROW_PITCH;
            let (route, minutes) = self.departure_row(departure, route_width, minutes_width);
            viewport.add_hotspot(route, Point::new(0, y))?;
            viewport.add_hotspot(minutes, Point::new(minutes_x, y))?;
        }

        viewport.add_hotspot(self.clock_row(), Point::new(0, CLOCK_ROW_Y))?;

        Ok(Signage {
            kind: LayoutKind::Departures { rows: shown.len() },
            title: station_name.to_owned(),
            viewport,
        })
    }

    fn title_row(&self, text: &str) -> Hotspot {
        Hotspot::new(
            self.width,
            ROW_HEIGHT,
            self.refresh_interval,
            StationLabel::centered(Rc::clone(&self.ctx), text, self.width),
        )
    }

    fn departure_row(
        &self,
        departure: &Departure,
        route_width: u32,
        minutes_width: u32,
    ) -> (Hotspot, Hotspot) {
        let route = Hotspot::new(
            route_width,
            ROW_HEIGHT,
            self.refresh_interval,
            RouteLabel::new(Rc::clone(&self.ctx), departure.route.clone()),
        );
        let minutes = Hotspot::new(
            minutes_width,
            ROW_HEIGHT,
            self.refresh_interval,
            MinutesLabel::new(Rc::clone(&self.ctx), departure.arrival),
        );
        (route, minutes)
    }

    fn clock_row(&self) -> Hotspot {
        Hotspot::new(
            self.width,
            CLOCK_ROW_HEIGHT,
            CLOCK_REFRESH,
            ClockLabel::new(Rc::clone(&self.ctx)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{FixedClock, FontSet};
    use crate::departures::ArrivalTime;
    use crate::display::{NullSink, PANEL_HEIGHT, PANEL_WIDTH};
    use crate::glyph_cache::GlyphBitmapCache;
    use chrono::NaiveTime;
    use std::time::Instant;

    fn composer() -> SignageComposer {
        let ctx = Rc::new(DisplayContext::new(
            FontSet::default(),
            GlyphBitmapCache::default(),
            FixedClock(NaiveTime::from_hms_opt(9, 5, 7).unwrap()),
        ));
        SignageComposer::new(
            ctx,
            PANEL_WIDTH,
            PANEL_HEIGHT,
            Duration::from_secs(1),
            "Out of Hours",
        )
    }

    fn snapshot_with(station: &str, count: u32) -> DeparturesSnapshot {
        let mut snapshot = DeparturesSnapshot::new(10);
        snapshot.merge_station(
            station,
            (1..=count).map(|m| Departure::new(format!("Route {m}"), ArrivalTime::Minutes(m))),
        );
        snapshot
    }

    #[test]
    fn test_select_layout_combinations() {
        let with_data = snapshot_with("A", 2);
        let mut empty_board = DeparturesSnapshot::new(3);
        empty_board.merge_station("A", Vec::new());

        assert_eq!(SignageComposer::select_layout(None, "A"), LayoutKind::Blank);
        assert_eq!(
            SignageComposer::select_layout(Some(&with_data), "B"),
            LayoutKind::Blank
        );
        assert_eq!(
            SignageComposer::select_layout(Some(&empty_board), "A"),
            LayoutKind::Blank
        );
        assert_eq!(
            SignageComposer::select_layout(Some(&with_data), "A"),
            LayoutKind::Departures { rows: 2 }
        );
    }

    #[test]
    fn test_build_layout_matches_selection() {
        let composer = composer();
        let with_data = snapshot_with("A", 1);
        let cases: [(Option<&DeparturesSnapshot>, &str); 3] =
            [(None, "A"), (Some(&with_data), "B"), (Some(&with_data), "A")];

        for (data, station) in cases {
            let signage = composer.build_layout(data, station).unwrap();
            assert_eq!(signage.kind, SignageComposer::select_layout(data, station));
            if signage.kind == LayoutKind::Blank {
                assert_eq!(signage.title, "Out of Hours");
            } else {
                assert_eq!(signage.title, station);
            }
        }
    }

    #[test]
    fn test_blank_layout_rows() {
        let signage = composer().build_blank_layout("Clapham North").unwrap();
        assert_eq!(signage.kind, LayoutKind::Blank);
        assert_eq!(signage.viewport.hotspot_count(), 3);
    }

    #[test]
    fn test_departures_layout_caps_rows_at_three() {
        let composer = composer();
        let snapshot = snapshot_with("A", 5);
        let signage = composer.build_departures_layout(&snapshot, "A").unwrap();

        assert_eq!(signage.kind, LayoutKind::Departures { rows: 3 });
        // title + 3 × (route, minutes) + clock
        assert_eq!(signage.viewport.hotspot_count(), 1 + 3 * 2 + 1);
    }

    #[test]
    fn test_departures_layout_with_one_row() {
        let composer = composer();
        let snapshot = snapshot_with("A", 1);
        let signage = composer.build_departures_layout(&snapshot, "A").unwrap();
        assert_eq!(signage.viewport.hotspot_count(), 1 + 2 + 1);
    }

    #[test]
    fn test_departures_layout_renders_rows() {
        let composer = composer();
        let snapshot = snapshot_with("A", 3);
        let mut signage = composer.build_departures_layout(&snapshot, "A").unwrap();

        let mut sink = NullSink::default();
        let frame = signage.viewport.refresh(Instant::now(), &mut sink).unwrap();

        // Something lit in the title, each departure row and the clock row
        for y_range in [0..10, 12..22, 24..34, 36..46, 50..64] {
            let lit = y_range
                .clone()
                .any(|y| (0..PANEL_WIDTH).any(|x| frame.is_lit(x, y)));
            assert!(lit, "expected text in rows {y_range:?}");
        }
        assert_eq!(sink.frames_pushed(), 1);
    }

    #[test]
    fn test_departures_layout_for_missing_station_is_blank() {
        let composer = composer();
        let snapshot = snapshot_with("A", 2);
        let signage = composer.build_departures_layout(&snapshot, "Z").unwrap();
        assert_eq!(signage.kind, LayoutKind::Blank);
        assert_eq!(signage.title, "Out of Hours");
    }
}
