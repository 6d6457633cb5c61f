use crate::config::GapConfig;
use crate::error::{GapFillError, Result};
use crate::gap_detector::{haversine_km, GapDetector};
use crate::types::{Coord, Gap, Sample, SampleOrigin};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

static TRACK_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackState {
    /// Accepting samples
    Recording,
    /// Closed; ready for reconstruction
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl Bounds {
    pub fn center(&self) -> Coord {
        Coord::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackStats {
    pub point_count: usize,
    pub gap_count: usize,
    pub distance_km: f64,
    pub bounds: Option<Bounds>,
    pub center: Option<Coord>,
}

/// One recording: the observed samples plus the gaps found while ingesting them.
///
/// Gaps are classified inline as each sample arrives, so `gaps` is always
/// ordered by position and only ever grows.
#[derive(Debug, Clone, Serialize)]
pub struct Track {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub state: TrackState,
    samples: Vec<Sample>,
    gaps: Vec<Gap>,
    distance_km: f64,
    #[serde(skip)]
    detector: GapDetector,
}

impl Track {
    pub fn new(config: &GapConfig) -> Self {
        let now = Utc::now();
        let n = TRACK_COUNTER.fetch_add(1, Ordering::Relaxed);
        Track {
            id: format!("track_{}_{}", now.timestamp_millis(), n),
            started_at: now,
            finished_at: None,
            state: TrackState::Recording,
            samples: Vec::new(),
            gaps: Vec::new(),
            distance_km: 0.0,
            detector: GapDetector::new(config),
        }
    }

    /// Append an observed sample, returning the gap it closes, if any.
    pub fn push_sample(&mut self, sample: Sample) -> Result<Option<Gap>> {
        if self.state == TrackState::Finished {
            return Err(GapFillError::TrackFinished);
        }
        validate(&sample)?;

        let gap = match self.samples.last() {
            Some(previous) => {
                self.distance_km += haversine_km(
                    previous.latitude,
                    previous.longitude,
                    sample.latitude,
                    sample.longitude,
                );
                self.detector.classify(
                    self.gaps.len() as u32,
                    self.samples.len(),
                    previous,
                    &sample,
                )
            }
            None => None,
        };

        if let Some(gap) = &gap {
            log::debug!(
                "Track {}: gap {} between samples {} and {} ({:.0}s, {:.3} km)",
                self.id,
                gap.id,
                gap.start_index,
                gap.end_index,
                gap.elapsed_seconds,
                gap.straight_line_distance_km
            );
            self.gaps.push(gap.clone());
        }
        self.samples.push(sample);
        Ok(gap)
    }

    /// Transition Recording → Finished
    pub fn finish(&mut self) -> Result<()> {
        match self.state {
            TrackState::Recording => {
                self.state = TrackState::Finished;
                self.finished_at = Some(Utc::now());
                Ok(())
            }
            TrackState::Finished => Err(GapFillError::TrackFinished),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state == TrackState::Finished
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn detected_gaps(&self) -> &[Gap] {
        &self.gaps
    }

    pub fn stats(&self) -> TrackStats {
        let bounds = self.samples.first().map(|first| {
            self.samples.iter().fold(
                Bounds {
                    min_lat: first.latitude,
                    min_lon: first.longitude,
                    max_lat: first.latitude,
                    max_lon: first.longitude,
                },
                |b, s| Bounds {
                    min_lat: b.min_lat.min(s.latitude),
                    min_lon: b.min_lon.min(s.longitude),
                    max_lat: b.max_lat.max(s.latitude),
                    max_lon: b.max_lon.max(s.longitude),
                },
            )
        });

        TrackStats {
            point_count: self.samples.len(),
            gap_count: self.gaps.len(),
            distance_km: self.distance_km,
            bounds,
            center: bounds.map(|b| b.center()),
        }
    }
}

impl Default for Track {
    fn default() -> Self {
        Self::new(&GapConfig::default())
    }
}

fn validate(sample: &Sample) -> Result<()> {
    if sample.origin != SampleOrigin::Observed {
        return Err(GapFillError::InvalidSample(
            "only observed samples can be ingested".to_string(),
        ));
    }
    if !sample.latitude.is_finite() || !(-90.0..=90.0).contains(&sample.latitude) {
        return Err(GapFillError::InvalidSample(format!(
            "latitude out of range: {}",
            sample.latitude
        )));
    }
    if !sample.longitude.is_finite() || !(-180.0..=180.0).contains(&sample.longitude) {
        return Err(GapFillError::InvalidSample(format!(
            "longitude out of range: {}",
            sample.longitude
        )));
    }
    if let Some(accuracy) = sample.accuracy {
        if !accuracy.is_finite() || accuracy < 0.0 {
            return Err(GapFillError::InvalidSample(format!(
                "invalid accuracy: {}",
                accuracy
            )));
        }
    }
    Ok(())
}
