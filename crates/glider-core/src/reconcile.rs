use polars::prelude::*;
use tracing::info;

use crate::error::Result;

/// Renumbers a concatenation of independently-numbered batch profile
/// sequences into one non-decreasing sequence.
///
/// Batch-local numbering restarts near 1 at every batch boundary, so the
/// concatenated column decreases there. Whenever a value drops below its
/// predecessor, the running maximum seen so far becomes the new cumulative
/// offset for the rest of the array. Zero and missing values mean "no
/// profile assigned" and pass through untouched.
///
/// Single forward pass; already-monotonic input comes back unchanged.
pub fn bump_up(values: &mut [Option<f64>]) {
    let mut offset = 0.0;
    let mut previous: Option<f64> = None;
    let mut run_max = f64::NEG_INFINITY;
    let mut resets = 0u32;
    for slot in values.iter_mut() {
        let Some(raw) = *slot else { continue };
        if raw == 0.0 || raw.is_nan() {
            continue;
        }
        let mut adjusted = raw + offset;
        if let Some(prev) = previous {
            if adjusted < prev {
                offset = run_max;
                adjusted = raw + offset;
                resets += 1;
            }
        }
        run_max = run_max.max(adjusted);
        previous = Some(adjusted);
        *slot = Some(adjusted);
    }
    if resets > 0 {
        info!("bumped profile numbers across {resets} batch boundaries");
    }
}

/// Applies [`bump_up`] to the named profile/dive-numbering column of a
/// dataset, preserving the column's dtype. Each dataset carrying its own
/// numbering (the time series, the per-profile aggregate) must be fixed
/// independently since their index spaces differ.
pub fn fix_profile_numbers(df: &mut DataFrame, var_name: &str) -> Result<()> {
    let column = df.column(var_name)?.as_materialized_series();
    let dtype = column.dtype().clone();
    let mut values: Vec<Option<f64>> = column
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .collect();
    bump_up(&mut values);
    let fixed = Series::new(var_name.into(), values).cast(&dtype)?;
    df.with_column(fixed)?;
    Ok(())
}
