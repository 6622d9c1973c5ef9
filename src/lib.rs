//! # Departure Board Core Library
//!
//! This library drives a 256×64 dot-matrix style departure board: it fetches
//! live predictions from the TfL Unified API, composes them into a layout of
//! independently refreshed regions and pushes the composed frames to a display.
//! It targets small boards like the Raspberry Pi Zero 2 W driving an SSD1322
//! OLED, but everything except the panel driver runs on any host.
//!
//! ## Design Philosophy
//!
//! ### Redraw only what changes
//! - **Hotspots**: each row of the board is a [`hotspot::Hotspot`] with its own
//!   refresh interval. The clock redraws ten times a second, station and route
//!   rows once per `refresh_time`.
//! - **Glyph cache**: rendered text is cached per `(text, font)` in a
//!   [`glyph_cache::GlyphBitmapCache`], so a row that redraws the same text
//!   costs a copy, not a rasterization.
//!
//! ### One thread, no globals
//! The render loop runs on a single-threaded tokio runtime. Fonts, the glyph
//! cache and the wall clock live in one [`context::DisplayContext`] built at
//! startup and shared by reference count with every widget.
//!
//! ### Data Flow
//! 1. **Fetch**: every 10 seconds the [`tfl::TflClient`] returns a
//!    [`departures::DeparturesSnapshot`], or an error
//! 2. **Compose**: the [`composer::SignageComposer`] builds a departures layout
//!    for the next station, or the welcome screen when there is nothing to show
//! 3. **Refresh**: every frame the [`viewport::Viewport`] re-renders due
//!    hotspots and hands the frame to a [`display::DisplaySink`]
//!
//! ## Core Types
//! - [`scheduler::RefreshScheduler`]: the render loop
//! - [`composer::SignageComposer`]: layout construction and selection
//! - [`departures::ArrivalTime`]: "Due", "`N` min" or "N/A", in board order

pub mod canvas;
pub mod composer;
pub mod config;
pub mod context;
pub mod departures;
pub mod display;
pub mod glyph_cache;
pub mod hotspot;
pub mod scheduler;
pub mod tfl;
pub mod viewport;
pub mod widgets;

#[cfg(feature = "hardware")]
pub mod ssd1322;

pub use canvas::PixelBuffer;
pub use composer::{LayoutKind, Signage, SignageComposer};
pub use config::Config;
pub use context::DisplayContext;
pub use departures::{ArrivalTime, Departure, DepartureSource, DeparturesSnapshot, FetchError};
pub use display::DisplaySink;
pub use scheduler::{RefreshScheduler, SchedulerError};
