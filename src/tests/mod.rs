//! Integration tests for the departure board binary.
//!
//! These exercise the library the way `main` wires it: a data source, the
//! composer and a sink behind the refresh scheduler.


use chrono::NaiveTime;
use departure_board_lib::context::{DisplayContext, FixedClock, FontSet};
use departure_board_lib::glyph_cache::GlyphBitmapCache;
use departure_board_lib::{DepartureSource, DeparturesSnapshot, FetchError};
use std::collections::VecDeque;
use std::rc::Rc;

/// Data source returning queued results in order, then empty snapshots.
#[derive(Default)]
pub struct ScriptedSource {
    results: VecDeque<Result<DeparturesSnapshot, FetchError>>,
}

impl ScriptedSource {
    pub fn new(results: Vec<Result<DeparturesSnapshot, FetchError>>) -> Self {
        Self {
            results: results.into(),
        }
    }
}

impl DepartureSource for ScriptedSource {
    async fn fetch_departures(&mut self) -> Result<DeparturesSnapshot, FetchError> {
        self.results
            .pop_front()
            .unwrap_or_else(|| Ok(DeparturesSnapshot::new(3)))
    }
}

/// Display context frozen at 09:05:07.
pub fn fixed_context() -> Rc<DisplayContext> {
    Rc::new(DisplayContext::new(
        FontSet::default(),
        GlyphBitmapCache::default(),
        FixedClock(NaiveTime::from_hms_opt(9, 5, 7).unwrap()),
    ))
}
