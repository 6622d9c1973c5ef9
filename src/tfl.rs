//! # TfL Arrivals Client
//!
//! Fetches live predictions from the TfL Unified API and normalizes them into
//! a [`DeparturesSnapshot`].
//!
//! ## Request forms
//! - Stop with a NaPTAN id: `GET {base}/Line/{line}/Arrivals/{stop_id}?direction={direction}`
//! - Stop without one (bus stops identified by name):
//!   `GET {base}/Line/{line}/Arrivals`, keeping only predictions whose
//!   `stationName` and `direction` match the configured stop.
//!
//! Every request carries `Cache-Control: no-cache` and the `app_key` header.
//!
//! ## Failure handling
//! A stop answering with a non-success status is logged and skipped, so its
//! station is simply absent from the snapshot. Only when every stop fails does
//! the fetch as a whole fail (see [`collect_snapshot`]). Transport errors
//! (DNS, TLS, timeouts, bad JSON) abort the fetch immediately.

use crate::config::{ApiConfig, JourneyConfig, StopConfig};
use crate::departures::{
    ArrivalTime, Departure, DepartureSource, DeparturesSnapshot, FetchError, NegativeArrivals,
};
use log::{debug, info, warn};
use reqwest::header::CACHE_CONTROL;
use serde::Deserialize;
use std::time::Duration;

/// One entry of the `Arrivals` response. Fields the board ignores are skipped.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Prediction {
    pub station_name: String,
    pub direction: String,
    pub towards: String,
    /// Seconds until the vehicle reaches the stop
    pub time_to_station: i64,
}

/// HTTP client for the configured stops.
pub struct TflClient {
    http: reqwest::Client,
    base_url: String,
    app_key: String,
    stops: Vec<StopConfig>,
    max_departures: usize,
    negative_arrivals: NegativeArrivals,
}

impl TflClient {
    pub fn new(api: &ApiConfig, journey: &JourneyConfig) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(api.timeout_secs))
            .build()?;

        if api.app_key.is_empty() {
            warn!("No TfL app_key configured; requests will be rate limited");
        }

        Ok(Self {
            http,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            app_key: api.app_key.clone(),
            stops: api.stops.clone(),
            max_departures: journey.max_departures,
            negative_arrivals: journey.negative_arrivals,
        })
    }

    /// Request URL for one stop.
    pub fn arrivals_url(&self, stop: &StopConfig) -> String {
        match &stop.stop_id {
            Some(stop_id) => format!(
                "{}/Line/{}/Arrivals/{}?direction={}",
                self.base_url, stop.line, stop_id, stop.direction
            ),
            None => format!("{}/Line/{}/Arrivals", self.base_url, stop.line),
        }
    }

    /// Predictions for one stop, or `None` if the API refused the request.
    async fn fetch_stop(&self, stop: &StopConfig) -> Result<Option<Vec<Prediction>>, FetchError> {
        let url = self.arrivals_url(stop);
        debug!("GET {}", url);

        let response = self
            .http
            .get(&url)
            .header(CACHE_CONTROL, "no-cache")
            .header("app_key", &self.app_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                "Received status code {} for {} line {}",
                status.as_u16(),
                stop.station,
                stop.line
            );
            return Ok(None);
        }

        Ok(Some(response.json::<Vec<Prediction>>().await?))
    }
}

impl DepartureSource for TflClient {
    async fn fetch_departures(&mut self) -> Result<DeparturesSnapshot, FetchError> {
        let mut responses = Vec::with_capacity(self.stops.len());
        for stop in &self.stops {
            responses.push((stop, self.fetch_stop(stop).await?));
        }

        let snapshot = collect_snapshot(responses, self.max_departures, self.negative_arrivals)?;
        info!("Fetched departures for {} stations", snapshot.boards().len());
        Ok(snapshot)
    }
}

/// Merge per-stop responses into one snapshot.
///
/// `None` marks a stop the API refused; its station is left out. The fetch
/// fails only when every stop was refused. An empty prediction list is a
/// successful answer and still yields a (possibly empty) board.
pub fn collect_snapshot<'a>(
    responses: impl IntoIterator<Item = (&'a StopConfig, Option<Vec<Prediction>>)>,
    max_departures: usize,
    policy: NegativeArrivals,
) -> Result<DeparturesSnapshot, FetchError> {
    let mut snapshot = DeparturesSnapshot::new(max_departures);
    let mut stops = 0;
    let mut failed = 0;

    for (stop, predictions) in responses {
        stops += 1;
        match predictions {
            Some(predictions) => {
                let departures = departures_for_stop(stop, &predictions, policy);
                debug!(
                    "{} line {}: {} departures",
                    stop.station,
                    stop.line,
                    departures.len()
                );
                snapshot.merge_station(&stop.station, departures);
            }
            None => failed += 1,
        }
    }

    if stops > 0 && failed == stops {
        return Err(FetchError::AllStopsFailed { stops: failed });
    }
    if failed > 0 {
        warn!("{} of {} stops failed", failed, stops);
    }
    Ok(snapshot)
}

/// Turn raw predictions for `stop` into board rows.
///
/// Line-wide responses (no `stop_id`) are filtered down to the stop's station
/// and direction first. The result is unsorted; merging sorts it.
pub fn departures_for_stop(
    stop: &StopConfig,
    predictions: &[Prediction],
    policy: NegativeArrivals,
) -> Vec<Departure> {
    predictions
        .iter()
        .filter(|p| {
            stop.stop_id.is_some() || (p.station_name == stop.station && p.direction == stop.direction)
        })
        .filter_map(|p| {
            let arrival = ArrivalTime::from_seconds(p.time_to_station, policy)?;
            let route = stop.label.clone().unwrap_or_else(|| p.towards.clone());
            Some(Departure::new(route, arrival))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const NORTHERN_JSON: &str = r#"[
        {"id": "1", "stationName": "Clapham North Underground Station", "direction": "outbound",
         "towards": "Morden", "timeToStation": 245, "lineId": "northern"},
        {"id": "2", "stationName": "Clapham North Underground Station", "direction": "outbound",
         "towards": "Morden via Bank", "timeToStation": 20},
        {"id": "3", "stationName": "Clapham North Underground Station", "direction": "outbound",
         "towards": "Morden", "timeToStation": -12}
    ]"#;

    const BUS_JSON: &str = r#"[
        {"stationName": "Bedford Road", "direction": "inbound", "towards": "Clapham Junction", "timeToStation": 600},
        {"stationName": "Bedford Road", "direction": "outbound", "towards": "Putney", "timeToStation": 120},
        {"stationName": "Clapham Common", "direction": "inbound", "towards": "Clapham Junction", "timeToStation": 60},
        {"stationName": "Bedford Road", "direction": "inbound", "towards": "Clapham Junction"}
    ]"#;

    fn tube_stop() -> StopConfig {
        StopConfig {
            station: "Clapham North".to_string(),
            line: "northern".to_string(),
            stop_id: Some("940GZZLUCPN".to_string()),
            direction: "outbound".to_string(),
            label: None,
        }
    }

    fn bus_stop() -> StopConfig {
        StopConfig {
            station: "Bedford Road".to_string(),
            line: "37".to_string(),
            stop_id: None,
            direction: "inbound".to_string(),
            label: Some("37  Clapham Junction".to_string()),
        }
    }

    fn client() -> TflClient {
        let api = ApiConfig {
            base_url: "https://api.example.test/".to_string(),
            ..ApiConfig::default()
        };
        TflClient::new(&api, &JourneyConfig::default()).unwrap()
    }

    #[test]
    fn test_parse_predictions() {
        let predictions: Vec<Prediction> = serde_json::from_str(NORTHERN_JSON).unwrap();
        assert_eq!(predictions.len(), 3);
        assert_eq!(predictions[0].towards, "Morden");
        assert_eq!(predictions[0].time_to_station, 245);
    }

    #[test]
    fn test_missing_time_to_station_defaults_to_zero() {
        let predictions: Vec<Prediction> = serde_json::from_str(BUS_JSON).unwrap();
        assert_eq!(predictions[3].time_to_station, 0);
    }

    #[test]
    fn test_stop_departures_use_destination() {
        let predictions: Vec<Prediction> = serde_json::from_str(NORTHERN_JSON).unwrap();
        let departures =
            departures_for_stop(&tube_stop(), &predictions, NegativeArrivals::Unavailable);

        assert_eq!(
            departures,
            vec![
                Departure::new("Morden", ArrivalTime::Minutes(4)),
                Departure::new("Morden via Bank", ArrivalTime::Due),
                Departure::new("Morden", ArrivalTime::Unavailable),
            ]
        );
    }

    #[test]
    fn test_negative_prediction_can_be_discarded() {
        let predictions: Vec<Prediction> = serde_json::from_str(NORTHERN_JSON).unwrap();
        let departures = departures_for_stop(&tube_stop(), &predictions, NegativeArrivals::Discard);
        assert_eq!(departures.len(), 2);
    }

    #[test]
    fn test_line_wide_response_is_filtered() {
        let predictions: Vec<Prediction> = serde_json::from_str(BUS_JSON).unwrap();
        let departures =
            departures_for_stop(&bus_stop(), &predictions, NegativeArrivals::Unavailable);

        assert_eq!(
            departures,
            vec![
                Departure::new("37  Clapham Junction", ArrivalTime::Minutes(10)),
                Departure::new("37  Clapham Junction", ArrivalTime::Due),
            ]
        );
    }

    #[test]
    fn test_merged_stops_share_a_board() {
        let predictions: Vec<Prediction> = serde_json::from_str(BUS_JSON).unwrap();
        let mut other = bus_stop();
        other.line = "35".to_string();
        other.label = Some("35  Clapham Junction".to_string());

        let mut snapshot = DeparturesSnapshot::new(3);
        for stop in [bus_stop(), other] {
            let departures = departures_for_stop(&stop, &predictions, NegativeArrivals::Unavailable);
            snapshot.merge_station(&stop.station, departures);
        }

        let board = snapshot.departures("Bedford Road").unwrap();
        assert_eq!(board.len(), 3);
        assert_eq!(board[0].arrival, ArrivalTime::Due);
        assert_eq!(board[2].arrival, ArrivalTime::Minutes(10));
    }

    #[test]
    fn test_arrivals_urls() {
        let client = client();
        assert_eq!(
            client.arrivals_url(&tube_stop()),
            "https://api.example.test/Line/northern/Arrivals/940GZZLUCPN?direction=outbound"
        );
        assert_eq!(
            client.arrivals_url(&bus_stop()),
            "https://api.example.test/Line/37/Arrivals"
        );
    }

    #[test]
    fn test_every_stop_refused_fails_the_fetch() {
        let stops = [tube_stop(), bus_stop(), bus_stop()];
        let result = collect_snapshot(
            stops.iter().map(|stop| (stop, None)),
            3,
            NegativeArrivals::Unavailable,
        );
        assert!(matches!(result, Err(FetchError::AllStopsFailed { stops: 3 })));
    }

    #[test]
    fn test_refused_stops_are_left_out() {
        let predictions: Vec<Prediction> = serde_json::from_str(BUS_JSON).unwrap();
        let (tube, bus, other) = (tube_stop(), bus_stop(), bus_stop());
        let snapshot = collect_snapshot(
            [(&tube, None), (&bus, Some(predictions)), (&other, None)],
            3,
            NegativeArrivals::Unavailable,
        )
        .unwrap();

        let stations: Vec<_> = snapshot.stations().collect();
        assert_eq!(stations, vec!["Bedford Road"]);
        assert_eq!(snapshot.departures("Clapham North"), None);
    }

    #[test]
    fn test_empty_answer_is_an_empty_board() {
        let (tube, bus) = (tube_stop(), bus_stop());
        let snapshot = collect_snapshot(
            [(&tube, None), (&bus, Some(Vec::new()))],
            3,
            NegativeArrivals::Unavailable,
        )
        .unwrap();

        assert!(!snapshot.has_departures());
        assert_eq!(snapshot.departures("Bedford Road"), Some(&[][..]));
    }
}
