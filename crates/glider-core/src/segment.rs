use polars::prelude::*;

use crate::error::Result;

/// Direction convention: +1 = descending, -1 = ascending. Odd profile
/// indices are descents, even are ascents.
pub const DIRECTION_DESCENDING: i64 = 1;
pub const DIRECTION_ASCENDING: i64 = -1;

/// Derives `profile_index` and `profile_direction` columns for one batch of
/// time-ordered samples.
///
/// Each dive's apex (deepest pressure) and each inter-apex inflection
/// (shallowest pressure between two apexes) becomes a segment boundary; the
/// boundary sample starts the new segment. Indices count up from 1 in time
/// order. Dives whose pressure is entirely missing fall back to the span
/// midpoint, so segmentation always completes even through sensor dropouts.
pub fn assign_profiles(df: &DataFrame) -> Result<DataFrame> {
    let height = df.height();
    if height == 0 {
        return Ok(df.clone());
    }

    let pressure: Vec<Option<f64>> = df
        .column("pressure")?
        .as_materialized_series()
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .collect();
    let dive_nums: Vec<Option<i64>> = df
        .column("dive_num")?
        .as_materialized_series()
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .map(|value| value.map(|v| v.round() as i64))
        .collect();

    let apexes = dive_apexes(&pressure, &dive_nums);
    let boundaries = segment_boundaries(&pressure, &apexes);

    let mut profile_index = Vec::with_capacity(height);
    let mut profile_direction = Vec::with_capacity(height);
    let mut next_boundary = 0;
    let mut index: i64 = 1;
    for i in 0..height {
        while next_boundary < boundaries.len() && boundaries[next_boundary] <= i {
            index += 1;
            next_boundary += 1;
        }
        profile_index.push(index);
        profile_direction.push(if index % 2 == 1 {
            DIRECTION_DESCENDING
        } else {
            DIRECTION_ASCENDING
        });
    }

    let mut out = df.clone();
    out.with_column(Series::new("profile_index".into(), profile_index))?;
    out.with_column(Series::new("profile_direction".into(), profile_direction))?;
    Ok(out)
}

/// Apex sample index of each maximal contiguous run of equal dive numbers,
/// in time order. Samples with a missing dive number join the current run.
fn dive_apexes(pressure: &[Option<f64>], dive_nums: &[Option<i64>]) -> Vec<usize> {
    let mut runs: Vec<(usize, usize)> = Vec::new();
    let mut run_start = 0;
    let mut run_value: Option<i64> = None;
    for (i, value) in dive_nums.iter().enumerate() {
        match (run_value, value) {
            (None, Some(v)) => run_value = Some(*v),
            (Some(current), Some(v)) if *v != current => {
                runs.push((run_start, i));
                run_start = i;
                run_value = Some(*v);
            }
            _ => {}
        }
    }
    runs.push((run_start, dive_nums.len()));

    runs.iter()
        .map(|&(start, end)| deepest_index(pressure, start, end))
        .collect()
}

/// Boundaries for profile numbering: each apex, with the shallowest point
/// between consecutive apexes interleaved.
fn segment_boundaries(pressure: &[Option<f64>], apexes: &[usize]) -> Vec<usize> {
    let mut boundaries = Vec::with_capacity(apexes.len() * 2);
    for (i, &apex) in apexes.iter().enumerate() {
        boundaries.push(apex);
        if let Some(&next_apex) = apexes.get(i + 1) {
            boundaries.push(shallowest_index(pressure, apex, next_apex));
        }
    }
    boundaries
}

/// Deepest sample of the span `[start, end)`; span midpoint when every
/// pressure is missing.
fn deepest_index(pressure: &[Option<f64>], start: usize, end: usize) -> usize {
    extreme_index(pressure, start, end, |candidate, best| candidate > best)
        .unwrap_or(start + (end - start) / 2)
}

/// Shallowest sample strictly between two apexes; midpoint of the closed
/// inter-apex span when every pressure in between is missing, clamped past
/// the apex so the boundary never collapses onto the apex itself.
fn shallowest_index(pressure: &[Option<f64>], apex: usize, next_apex: usize) -> usize {
    extreme_index(pressure, apex + 1, next_apex, |candidate, best| {
        candidate < best
    })
    .unwrap_or((apex + (next_apex - apex) / 2).max(apex + 1))
}

fn extreme_index(
    pressure: &[Option<f64>],
    start: usize,
    end: usize,
    better: impl Fn(f64, f64) -> bool,
) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for i in start..end.min(pressure.len()) {
        if let Some(value) = pressure[i] {
            if value.is_nan() {
                continue;
            }
            match best {
                Some((_, best_value)) if !better(value, best_value) => {}
                _ => best = Some((i, value)),
            }
        }
    }
    best.map(|(i, _)| i)
}
