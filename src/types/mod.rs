use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Parse an ISO-8601 timestamp; values without an offset are taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// WGS84 position in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub lat: f64,
    pub lon: f64,
}

impl Coord {
    pub fn new(lat: f64, lon: f64) -> Self {
        Coord { lat, lon }
    }

    /// True when both components agree within `tolerance_deg`.
    pub fn coincides_with(&self, other: &Coord, tolerance_deg: f64) -> bool {
        (self.lat - other.lat).abs() <= tolerance_deg && (self.lon - other.lon).abs() <= tolerance_deg
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleOrigin {
    /// Recorded by the device
    Observed,
    /// Synthesised from a routing provider path across a gap
    Reconstructed,
}

/// A single timestamped position.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
    pub accuracy: Option<f64>,
    pub origin: SampleOrigin,
}

impl Sample {
    pub fn observed(latitude: f64, longitude: f64, timestamp: DateTime<Utc>) -> Self {
        Sample {
            latitude,
            longitude,
            timestamp,
            accuracy: None,
            origin: SampleOrigin::Observed,
        }
    }

    pub fn reconstructed(coord: Coord, timestamp: DateTime<Utc>) -> Self {
        Sample {
            latitude: coord.lat,
            longitude: coord.lon,
            timestamp,
            accuracy: None,
            origin: SampleOrigin::Reconstructed,
        }
    }

    pub fn with_accuracy(mut self, accuracy: Option<f64>) -> Self {
        self.accuracy = accuracy;
        self
    }

    pub fn coord(&self) -> Coord {
        Coord::new(self.latitude, self.longitude)
    }

    pub fn is_observed(&self) -> bool {
        self.origin == SampleOrigin::Observed
    }
}

/// Discontinuity between two consecutive observed samples.
///
/// `start_index`/`end_index` point into the track's observed sample list and
/// always satisfy `start_index + 1 == end_index`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Gap {
    pub id: u32,
    pub start_index: usize,
    pub end_index: usize,
    pub start_sample: Sample,
    pub end_sample: Sample,
    pub elapsed_seconds: f64,
    pub straight_line_distance_km: f64,
}

/// Why a gap was left unfilled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FillFailure {
    Timeout,
    HttpError(u16),
    Unavailable(String),
    CircuitOpen,
    NotConfigured,
}

impl Display for FillFailure {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            FillFailure::Timeout => write!(f, "Provider timeout"),
            FillFailure::HttpError(code) => write!(f, "HTTP error: {}", code),
            FillFailure::Unavailable(msg) => write!(f, "Provider unavailable: {}", msg),
            FillFailure::CircuitOpen => write!(f, "Circuit breaker open"),
            FillFailure::NotConfigured => write!(f, "Routing provider not configured"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillOutcome {
    Filled,
    Unfilled,
}

/// Outcome of one fill attempt, produced exactly once per gap.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FillResult {
    pub gap_id: u32,
    pub outcome: FillOutcome,
    pub points: Vec<Sample>,
    pub failure: Option<FillFailure>,
}

impl FillResult {
    pub fn filled(gap_id: u32, points: Vec<Sample>) -> Self {
        FillResult {
            gap_id,
            outcome: FillOutcome::Filled,
            points,
            failure: None,
        }
    }

    pub fn unfilled(gap_id: u32, reason: FillFailure) -> Self {
        FillResult {
            gap_id,
            outcome: FillOutcome::Unfilled,
            points: Vec::new(),
            failure: Some(reason),
        }
    }

    pub fn is_filled(&self) -> bool {
        self.outcome == FillOutcome::Filled
    }
}
