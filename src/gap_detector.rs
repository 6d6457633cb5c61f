use crate::config::GapConfig;
use crate::types::{Gap, Sample};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in kilometres.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).max(0.0).sqrt());
    EARTH_RADIUS_KM * c
}

/// Seconds between two samples, negative if `current` precedes `previous`
pub fn elapsed_seconds(previous: &Sample, current: &Sample) -> f64 {
    current
        .timestamp
        .signed_duration_since(previous.timestamp)
        .num_milliseconds() as f64
        / 1000.0
}

/// Classifies consecutive sample pairs as continuous or as a gap.
///
/// A pair is a gap when the elapsed time exceeds `time_threshold_secs` or the
/// straight-line distance exceeds `distance_threshold_km`. Classification is
/// stateless; callers supply the index and id bookkeeping.
#[derive(Clone, Debug)]
pub struct GapDetector {
    time_threshold_secs: f64,
    distance_threshold_km: f64,
}

impl GapDetector {
    pub fn new(config: &GapConfig) -> Self {
        GapDetector {
            time_threshold_secs: config.time_threshold_secs,
            distance_threshold_km: config.distance_threshold_km,
        }
    }

    /// Classify the pair ending at `end_index`.
    ///
    /// Index 0 has no predecessor and never closes a gap.
    pub fn classify(
        &self,
        gap_id: u32,
        end_index: usize,
        previous: &Sample,
        current: &Sample,
    ) -> Option<Gap> {
        if end_index == 0 {
            return None;
        }

        let elapsed = elapsed_seconds(previous, current);
        let distance = haversine_km(
            previous.latitude,
            previous.longitude,
            current.latitude,
            current.longitude,
        );

        if elapsed > self.time_threshold_secs || distance > self.distance_threshold_km {
            Some(Gap {
                id: gap_id,
                start_index: end_index - 1,
                end_index,
                start_sample: previous.clone(),
                end_sample: current.clone(),
                elapsed_seconds: elapsed,
                straight_line_distance_km: distance,
            })
        } else {
            None
        }
    }

    /// Classify every consecutive pair of an already-recorded sequence.
    #[cfg(test)]
    pub(crate) fn detect_all(&self, samples: &[Sample]) -> Vec<Gap> {
        let mut gaps = Vec::new();
        for (end_index, pair) in samples.windows(2).enumerate().map(|(i, w)| (i + 1, w)) {
            if let Some(gap) = self.classify(gaps.len() as u32, end_index, &pair[0], &pair[1]) {
                gaps.push(gap);
            }
        }
        gaps
    }
}

impl Default for GapDetector {
    fn default() -> Self {
        Self::new(&GapConfig::default())
    }
}
