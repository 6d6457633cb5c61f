use crate::types::{FillResult, Gap, Sample};
use std::collections::HashMap;

/// Provider points within this many degrees of a gap endpoint are treated as
/// the endpoint itself (about 10 cm at the equator).
const COINCIDENT_TOLERANCE_DEG: f64 = 1e-6;

/// Splice reconstructed points into the observed sequence.
///
/// For each gap whose result is filled, the provider path minus any point
/// coincident with the gap's endpoints is inserted directly before
/// `samples[gap.end_index]`. Reconstructed points take the timestamp of the
/// sample preceding the gap; no time is interpolated.
///
/// Observed samples keep their order and content, so dropping every
/// reconstructed sample from the output yields `samples` again.
pub fn merge(
    samples: &[Sample],
    gaps: &[Gap],
    results: &HashMap<u32, FillResult>,
) -> Vec<Sample> {
    let splices: HashMap<usize, &Gap> = gaps
        .iter()
        .filter(|gap| results.get(&gap.id).is_some_and(FillResult::is_filled))
        .map(|gap| (gap.end_index, gap))
        .collect();

    let extra: usize = splices
        .values()
        .filter_map(|gap| results.get(&gap.id))
        .map(|r| r.points.len())
        .sum();
    let mut merged = Vec::with_capacity(samples.len() + extra);

    for (index, sample) in samples.iter().enumerate() {
        if let Some(gap) = splices.get(&index) {
            if let (Some(result), Some(previous)) = (results.get(&gap.id), index.checked_sub(1)) {
                let neighbour = &samples[previous];
                merged.extend(reconstructed_points(gap, result, neighbour));
            }
        }
        merged.push(sample.clone());
    }

    merged
}

fn reconstructed_points<'a>(
    gap: &'a Gap,
    result: &'a FillResult,
    neighbour: &'a Sample,
) -> impl Iterator<Item = Sample> + 'a {
    let start = gap.start_sample.coord();
    let end = gap.end_sample.coord();
    result
        .points
        .iter()
        .map(Sample::coord)
        .filter(move |c| {
            !c.coincides_with(&start, COINCIDENT_TOLERANCE_DEG)
                && !c.coincides_with(&end, COINCIDENT_TOLERANCE_DEG)
        })
        .map(move |c| Sample::reconstructed(c, neighbour.timestamp))
}
