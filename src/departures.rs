//! # Departure Data Model
//!
//! Normalized departure data as the board consumes it, independent of where it
//! came from. A [`DeparturesSnapshot`] maps station names (in the order they
//! were first seen) to a short, sorted list of upcoming [`Departure`]s.
//!
//! ## Ordering
//! [`ArrivalTime`] orders `Due` first, then minute counts ascending, then
//! `Unavailable` ("N/A") last, so sorting a board is a plain stable sort.
//!
//! ## Data sources
//! Anything implementing [`DepartureSource`] can feed the scheduler. A fetch
//! that fails is an `Err`; a fetch that worked but found nothing is an `Ok`
//! snapshot without departures. The board shows the fallback screen for both,
//! but logs them differently.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// When a service is expected at the stop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ArrivalTime {
    /// Arriving now (rounds to zero minutes)
    Due,
    /// Whole minutes until arrival
    Minutes(u32),
    /// No usable prediction ("N/A")
    Unavailable,
}

impl ArrivalTime {
    /// Convert a prediction in seconds to an arrival time.
    ///
    /// Minutes are rounded half-to-even; zero minutes is `Due`. Negative
    /// predictions are handled according to `policy`, which may drop them.
    pub fn from_seconds(seconds: i64, policy: NegativeArrivals) -> Option<Self> {
        if seconds < 0 {
            return match policy {
                NegativeArrivals::Unavailable => Some(ArrivalTime::Unavailable),
                NegativeArrivals::Discard => None,
                NegativeArrivals::Due => Some(ArrivalTime::Due),
            };
        }
        let minutes = (seconds as f64 / 60.0).round_ties_even() as u32;
        if minutes == 0 {
            Some(ArrivalTime::Due)
        } else {
            Some(ArrivalTime::Minutes(minutes))
        }
    }
}

impl fmt::Display for ArrivalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArrivalTime::Due => write!(f, "Due"),
            ArrivalTime::Minutes(minutes) => write!(f, "{} min", minutes),
            ArrivalTime::Unavailable => write!(f, "N/A"),
        }
    }
}

/// How predictions with a negative time-to-station are treated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NegativeArrivals {
    /// Show as "N/A", sorted after every real prediction
    #[default]
    Unavailable,
    /// Drop the prediction entirely
    Discard,
    /// Treat the service as arriving now
    Due,
}

/// One upcoming service at a station.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Departure {
    /// Destination or route text shown on the left of the row
    pub route: String,
    pub arrival: ArrivalTime,
}

impl Departure {
    pub fn new(route: impl Into<String>, arrival: ArrivalTime) -> Self {
        Self {
            route: route.into(),
            arrival,
        }
    }
}

/// Departures for a single station, sorted by arrival.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationBoard {
    pub station: String,
    pub departures: Vec<Departure>,
}

/// Latest normalized departures for every monitored station.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeparturesSnapshot {
    boards: Vec<StationBoard>,
    max_per_station: usize,
}

impl DeparturesSnapshot {
    /// Empty snapshot keeping at most `max_per_station` departures per board.
    pub fn new(max_per_station: usize) -> Self {
        Self {
            boards: Vec::new(),
            max_per_station,
        }
    }

    /// Add departures to a station's board, creating it if needed.
    ///
    /// The merged board is re-sorted and truncated, so several stops feeding
    /// the same station name end up as one list.
    pub fn merge_station(&mut self, station: &str, departures: impl IntoIterator<Item = Departure>) {
        let index = match self.boards.iter().position(|b| b.station == station) {
            Some(index) => index,
            None => {
                self.boards.push(StationBoard {
                    station: station.to_owned(),
                    departures: Vec::new(),
                });
                self.boards.len() - 1
            }
        };
        let board = &mut self.boards[index];
        board.departures.extend(departures);
        sort_departures(&mut board.departures);
        board.departures.truncate(self.max_per_station);
    }

    /// Departures for `station`, if it was fetched at all.
    pub fn departures(&self, station: &str) -> Option<&[Departure]> {
        self.boards
            .iter()
            .find(|b| b.station == station)
            .map(|b| b.departures.as_slice())
    }

    /// Station names in first-seen order.
    pub fn stations(&self) -> impl Iterator<Item = &str> {
        self.boards.iter().map(|b| b.station.as_str())
    }

    pub fn boards(&self) -> &[StationBoard] {
        &self.boards
    }

    /// True if any station has at least one departure.
    pub fn has_departures(&self) -> bool {
        self.boards.iter().any(|b| !b.departures.is_empty())
    }

    /// True if no station was fetched.
    pub fn is_empty(&self) -> bool {
        self.boards.is_empty()
    }
}

/// Stable sort: `Due` first, minutes ascending, `N/A` last.
pub fn sort_departures(departures: &mut [Departure]) {
    departures.sort_by_key(|d| d.arrival);
}

/// Errors that can occur while fetching departures.
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request failed (network, TLS or body decoding)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Every configured stop answered with a non-success status
    #[error("all {stops} stops returned an error status")]
    AllStopsFailed { stops: usize },
}

/// Provider of fresh departure snapshots.
#[allow(async_fn_in_trait)]
pub trait DepartureSource {
    async fn fetch_departures(&mut self) -> Result<DeparturesSnapshot, FetchError>;
}
