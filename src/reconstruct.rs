use crate::error::{GapFillError, Result};
use crate::orchestrator::GapFiller;
use crate::path_merger;
use crate::route_fill::RouteFillClient;
use crate::track::Track;
use crate::types::{FillResult, Gap, Sample};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FillSummary {
    pub total_gaps: usize,
    pub filled_count: usize,
    pub unfilled_count: usize,
}

/// Exported route: observed samples with reconstructed points spliced in
#[derive(Debug, Clone, Serialize)]
pub struct RouteReconstruction {
    pub track_id: String,
    pub samples: Vec<Sample>,
    pub gaps: Vec<Gap>,
    /// Per-gap outcomes, ordered by gap id
    pub results: BTreeMap<u32, FillResult>,
    pub summary: FillSummary,
}

/// Run one fill pass over a finished `track`'s gaps and merge the outcome.
///
/// Provider failures never surface here; they only lower `filled_count`.
pub async fn reconstruct_route<C: RouteFillClient>(
    track: &Track,
    filler: &GapFiller<C>,
) -> Result<RouteReconstruction> {
    if !track.is_finished() {
        return Err(GapFillError::TrackNotFinished(track.id.clone()));
    }
    if track.samples().is_empty() {
        return Err(GapFillError::EmptyTrack);
    }

    let gaps = track.detected_gaps();
    let results = filler.fill_all(gaps).await;
    let samples = path_merger::merge(track.samples(), gaps, &results);

    let filled_count = results.values().filter(|r| r.is_filled()).count();
    let summary = FillSummary {
        total_gaps: gaps.len(),
        filled_count,
        unfilled_count: gaps.len() - filled_count,
    };
    log::info!(
        "Track {}: reconstructed {}/{} gap(s), {} -> {} points",
        track.id,
        summary.filled_count,
        summary.total_gaps,
        track.samples().len(),
        samples.len()
    );

    Ok(RouteReconstruction {
        track_id: track.id.clone(),
        samples,
        gaps: gaps.to_vec(),
        results: results.into_iter().collect(),
        summary,
    })
}
