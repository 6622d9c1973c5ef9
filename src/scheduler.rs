//! # Refresh Scheduler
//!
//! The render loop. Every frame interval it:
//!
//! 1. waits for the [`FrameRegulator`];
//! 2. every [`ROTATION_INTERVAL`], fetches fresh departures and swaps in a
//!    newly composed layout, rotating through the configured stations;
//! 3. refreshes the active viewport and pushes the frame to the sink.
//!
//! ## Rotation
//! The station index only moves when a fetch succeeds with at least one
//! departure somewhere. It then advances by exactly one over the configured
//! roster, even if the station it lands on has nothing to show; that slot gets
//! the fallback welcome screen. Fetch failures, empty snapshots and out of
//! hours periods all show the fallback screen and leave the index alone.
//!
//! ## Shutdown
//! [`RefreshScheduler::run`] only looks at its shutdown future while waiting
//! for the next frame, so a frame is never abandoned half way through.

use crate::composer::{Signage, SignageComposer};
use crate::config::OperatingHours;
use crate::departures::DepartureSource;
use crate::display::{DisplaySink, SinkError};
use crate::viewport::{LayoutError, RefreshError};
use log::{debug, info, warn};
use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::{interval, Interval, MissedTickBehavior};

/// Time each station stays on screen, and the data refresh period.
pub const ROTATION_INTERVAL: Duration = Duration::from_secs(10);

/// Errors that stop the render loop.
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("layout error: {0}")]
    Layout(#[from] LayoutError),

    #[error("refresh error: {0}")]
    Refresh(#[from] RefreshError),

    #[error("display error: {0}")]
    Sink(#[from] SinkError),

    #[error("no stations configured")]
    NoStations,
}

/// Lifecycle of the render loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoopStatus {
    /// Built, no frame rendered yet
    #[default]
    Idle,
    Running,
    /// Stopped cleanly after a shutdown request
    Terminated,
}

/// Paces the loop at a fixed frame rate.
///
/// A tick that is late pushes the following ones back instead of bursting.
pub struct FrameRegulator {
    interval: Interval,
}

impl FrameRegulator {
    pub fn new(period: Duration) -> Self {
        let mut interval = interval(period.max(Duration::from_millis(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }

    /// Wait for the next frame slot.
    pub async fn wait(&mut self) -> Instant {
        self.interval.tick().await.into_std()
    }
}

/// Mutable bookkeeping of the render loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchedulerState {
    /// Position in the station roster
    pub station_index: usize,
    pub last_rotation: Option<Instant>,
    pub last_frame: Option<Instant>,
    pub frame_interval: Duration,
    pub rotation_interval: Duration,
}

impl SchedulerState {
    fn new(frame_interval: Duration) -> Self {
        Self {
            station_index: 0,
            last_rotation: None,
            last_frame: None,
            frame_interval,
            rotation_interval: ROTATION_INTERVAL,
        }
    }

    /// True on the first tick and whenever the rotation interval has elapsed.
    pub fn rotation_due(&self, now: Instant) -> bool {
        match self.last_rotation {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.rotation_interval,
        }
    }
}

/// Drives data fetches, layout swaps and frame output.
pub struct RefreshScheduler<S, D> {
    source: S,
    sink: D,
    composer: SignageComposer,
    stations: Vec<String>,
    operating_hours: Option<OperatingHours>,
    state: SchedulerState,
    status: LoopStatus,
    active: Option<Signage>,
}

impl<S: DepartureSource, D: DisplaySink> RefreshScheduler<S, D> {
    /// Scheduler rotating over `stations`, which must not be empty.
    pub fn new(
        source: S,
        sink: D,
        composer: SignageComposer,
        stations: Vec<String>,
        frame_interval: Duration,
    ) -> Result<Self, SchedulerError> {
        if stations.is_empty() {
            return Err(SchedulerError::NoStations);
        }
        Ok(Self {
            source,
            sink,
            composer,
            stations,
            operating_hours: None,
            state: SchedulerState::new(frame_interval),
            status: LoopStatus::Idle,
            active: None,
        })
    }

    /// Only fetch inside `hours`; outside them the welcome screen stays up.
    pub fn with_operating_hours(mut self, hours: Option<OperatingHours>) -> Self {
        self.operating_hours = hours;
        self
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    pub fn status(&self) -> LoopStatus {
        self.status
    }

    /// Layout currently on screen, once the first tick has run.
    pub fn active_layout(&self) -> Option<&Signage> {
        self.active.as_ref()
    }

    pub fn sink(&self) -> &D {
        &self.sink
    }

    /// Tear down the scheduler and hand back its sink.
    pub fn into_sink(self) -> D {
        self.sink
    }

    /// Run until `shutdown` completes.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<(), SchedulerError>
    where
        F: Future<Output = ()>,
    {
        let mut regulator = FrameRegulator::new(self.state.frame_interval);
        tokio::pin!(shutdown);
        self.status = LoopStatus::Running;

        info!(
            "Render loop started: {} stations, frame every {:?}",
            self.stations.len(),
            self.state.frame_interval
        );

        loop {
            let now = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping render loop");
                    self.status = LoopStatus::Terminated;
                    return Ok(());
                }
                now = regulator.wait() => now,
            };
            self.tick(now).await?;
        }
    }

    /// One iteration of the loop at time `now`.
    pub async fn tick(&mut self, now: Instant) -> Result<(), SchedulerError> {
        if self.active.is_none() || self.state.rotation_due(now) {
            let signage = self.next_layout().await?;
            self.sink.clear()?;
            debug!("Showing {:?} layout for {}", signage.kind, signage.title);
            self.active = Some(signage);
            self.state.last_rotation = Some(now);
        }

        if let Some(signage) = self.active.as_mut() {
            signage.viewport.refresh(now, &mut self.sink)?;
        }
        self.state.last_frame = Some(now);
        Ok(())
    }

    async fn next_layout(&mut self) -> Result<Signage, SchedulerError> {
        let fallback = self.composer.fallback_name().to_owned();

        if let Some(hours) = self.operating_hours {
            let time = self.composer.context().local_time();
            if !hours.contains(time) {
                debug!("Outside operating hours at {}, skipping fetch", time);
                return Ok(self.composer.build_blank_layout(&fallback)?);
            }
        }

        let snapshot = match self.source.fetch_departures().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Failed to fetch departures: {}", e);
                return Ok(self.composer.build_blank_layout(&fallback)?);
            }
        };

        if !snapshot.has_departures() {
            info!("No departures for any station");
            return Ok(self.composer.build_blank_layout(&fallback)?);
        }

        self.state.station_index = (self.state.station_index + 1) % self.stations.len();
        let station = &self.stations[self.state.station_index];
        Ok(self.composer.build_layout(Some(&snapshot), station)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composer::LayoutKind;
    use crate::context::{DisplayContext, FixedClock, FontSet};
    use crate::departures::{ArrivalTime, Departure, DeparturesSnapshot, FetchError};
    use crate::display::{NullSink, PANEL_HEIGHT, PANEL_WIDTH};
    use crate::glyph_cache::GlyphBitmapCache;
    use chrono::NaiveTime;
    use std::collections::VecDeque;
    use std::rc::Rc;

    /// Replays queued results, then reports empty snapshots.
    #[derive(Default)]
    struct Replay {
        results: VecDeque<Result<DeparturesSnapshot, FetchError>>,
        calls: usize,
    }

    impl DepartureSource for Replay {
        async fn fetch_departures(&mut self) -> Result<DeparturesSnapshot, FetchError> {
            self.calls += 1;
            self.results
                .pop_front()
                .unwrap_or_else(|| Ok(DeparturesSnapshot::new(3)))
        }
    }

    fn board(station: &str) -> DeparturesSnapshot {
        let mut snapshot = DeparturesSnapshot::new(3);
        snapshot.merge_station(station, vec![Departure::new("Morden", ArrivalTime::Due)]);
        snapshot
    }

    fn scheduler_at(
        results: Vec<Result<DeparturesSnapshot, FetchError>>,
        time: NaiveTime,
    ) -> RefreshScheduler<Replay, NullSink> {
        let ctx = Rc::new(DisplayContext::new(
            FontSet::default(),
            GlyphBitmapCache::default(),
            FixedClock(time),
        ));
        let composer = SignageComposer::new(
            ctx,
            PANEL_WIDTH,
            PANEL_HEIGHT,
            Duration::from_secs(1),
            "Fallback",
        );
        let source = Replay {
            results: results.into(),
            calls: 0,
        };
        RefreshScheduler::new(
            source,
            NullSink::default(),
            composer,
            vec!["A".to_string(), "B".to_string(), "C".to_string()],
            Duration::from_millis(100),
        )
        .unwrap()
    }

    fn scheduler(results: Vec<Result<DeparturesSnapshot, FetchError>>) -> RefreshScheduler<Replay, NullSink> {
        scheduler_at(results, NaiveTime::from_hms_opt(12, 0, 0).unwrap())
    }

    #[test]
    fn test_requires_stations() {
        let ctx = Rc::new(DisplayContext::with_defaults());
        let composer = SignageComposer::new(ctx, 256, 64, Duration::from_secs(1), "Fallback");
        let result = RefreshScheduler::new(
            Replay::default(),
            NullSink::default(),
            composer,
            Vec::new(),
            Duration::from_millis(100),
        );
        assert!(matches!(result, Err(SchedulerError::NoStations)));
    }

    #[test]
    fn test_rotation_due() {
        let mut state = SchedulerState::new(Duration::from_millis(100));
        let t0 = Instant::now();
        assert!(state.rotation_due(t0));

        state.last_rotation = Some(t0);
        assert!(!state.rotation_due(t0 + Duration::from_millis(9_999)));
        assert!(state.rotation_due(t0 + ROTATION_INTERVAL));
    }

    #[tokio::test]
    async fn test_index_advances_by_one_on_success() {
        let mut scheduler = scheduler(vec![Ok(board("B")), Ok(board("C"))]);
        let t0 = Instant::now();

        scheduler.tick(t0).await.unwrap();
        assert_eq!(scheduler.state().station_index, 1);
        let active = scheduler.active_layout().unwrap();
        assert_eq!(active.kind, LayoutKind::Departures { rows: 1 });
        assert_eq!(active.title, "B");

        scheduler.tick(t0 + ROTATION_INTERVAL).await.unwrap();
        assert_eq!(scheduler.state().station_index, 2);
        assert_eq!(scheduler.active_layout().unwrap().title, "C");
    }

    #[tokio::test]
    async fn test_index_wraps_around() {
        let mut scheduler = scheduler((0..3).map(|_| Ok(board("A"))).collect());
        let t0 = Instant::now();
        for i in 0..3 {
            scheduler.tick(t0 + ROTATION_INTERVAL * i).await.unwrap();
        }
        assert_eq!(scheduler.state().station_index, 0);
        assert_eq!(scheduler.active_layout().unwrap().title, "A");
    }

    #[tokio::test]
    async fn test_failure_keeps_index_and_shows_fallback() {
        let mut scheduler = scheduler(vec![
            Ok(board("B")),
            Err(FetchError::AllStopsFailed { stops: 3 }),
        ]);
        let t0 = Instant::now();

        scheduler.tick(t0).await.unwrap();
        scheduler.tick(t0 + ROTATION_INTERVAL).await.unwrap();

        assert_eq!(scheduler.state().station_index, 1);
        let active = scheduler.active_layout().unwrap();
        assert_eq!(active.kind, LayoutKind::Blank);
        assert_eq!(active.title, "Fallback");
    }

    #[tokio::test]
    async fn test_fetches_only_at_rotation_boundaries() {
        let mut scheduler = scheduler(Vec::new());
        let t0 = Instant::now();

        for ms in (0..10_000).step_by(100) {
            scheduler.tick(t0 + Duration::from_millis(ms)).await.unwrap();
        }
        assert_eq!(scheduler.source.calls, 1);
        assert_eq!(scheduler.sink().frames_pushed(), 100);
        assert_eq!(scheduler.sink().clears(), 1);

        scheduler.tick(t0 + ROTATION_INTERVAL).await.unwrap();
        assert_eq!(scheduler.source.calls, 2);
        assert_eq!(scheduler.sink().clears(), 2);
        assert_eq!(scheduler.state().last_frame, Some(t0 + ROTATION_INTERVAL));
    }

    #[tokio::test]
    async fn test_out_of_hours_skips_fetch() {
        let hours = OperatingHours {
            start: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(23, 0, 0).unwrap(),
        };
        let mut scheduler = scheduler_at(vec![Ok(board("B"))], NaiveTime::from_hms_opt(3, 0, 0).unwrap())
            .with_operating_hours(Some(hours));

        scheduler.tick(Instant::now()).await.unwrap();

        assert_eq!(scheduler.source.calls, 0);
        assert_eq!(scheduler.state().station_index, 0);
        assert_eq!(scheduler.active_layout().unwrap().kind, LayoutKind::Blank);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_at_shutdown() {
        let mut scheduler = scheduler(Vec::new());
        let shutdown = tokio::time::sleep(Duration::from_millis(250));

        assert_eq!(scheduler.status(), LoopStatus::Idle);
        scheduler.run(shutdown).await.unwrap();
        assert_eq!(scheduler.status(), LoopStatus::Terminated);

        // Frames at 0, 100 and 200 ms
        assert_eq!(scheduler.sink().frames_pushed(), 3);
        assert_eq!(scheduler.source.calls, 1);
    }
}
