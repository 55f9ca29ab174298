use polars::df;
use polars::prelude::*;

use glider_core::reconcile::{bump_up, fix_profile_numbers};

#[test]
fn already_monotonic_input_is_unchanged() {
    let original: Vec<Option<f64>> = [1.0, 1.0, 2.0, 2.0, 3.0].map(Some).to_vec();
    let mut values = original.clone();
    bump_up(&mut values);
    assert_eq!(values, original);

    // Idempotence: a second application changes nothing either.
    bump_up(&mut values);
    assert_eq!(values, original);
}

#[test]
fn two_batches_stitch_into_one_monotonic_sequence() {
    let batch: Vec<Option<f64>> = [1.0, 1.0, 2.0, 2.0, 3.0, 3.0, 4.0, 4.0, 4.0]
        .map(Some)
        .to_vec();
    let mut values = batch.clone();
    values.extend(batch.clone());
    bump_up(&mut values);

    let expected: Vec<Option<f64>> = [
        1.0, 1.0, 2.0, 2.0, 3.0, 3.0, 4.0, 4.0, 4.0, // first batch untouched
        5.0, 5.0, 6.0, 6.0, 7.0, 7.0, 8.0, 8.0, 8.0, // second bumped by 4
    ]
    .map(Some)
    .to_vec();
    assert_eq!(values, expected);
}

#[test]
fn number_of_resets_is_bounded_by_batch_count() {
    let mut values = Vec::new();
    for _ in 0..4 {
        values.extend([1.0, 2.0, 3.0].map(Some));
    }
    bump_up(&mut values);
    let flat: Vec<f64> = values.iter().map(|v| v.unwrap()).collect();
    assert_eq!(
        flat,
        vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0]
    );
}

#[test]
fn sentinel_values_pass_through_untouched() {
    let mut values = vec![Some(1.0), Some(0.0), None, Some(2.0), Some(1.0)];
    bump_up(&mut values);
    assert_eq!(values, vec![Some(1.0), Some(0.0), None, Some(2.0), Some(3.0)]);
}

#[test]
fn uneven_batches_stay_continuous() {
    // A short batch followed by a longer one; the offset is the running
    // maximum before the reset, not a single global constant.
    let mut values: Vec<Option<f64>> = [1.0, 2.0, 1.0, 2.0, 3.0, 4.0, 5.0].map(Some).to_vec();
    bump_up(&mut values);
    let flat: Vec<f64> = values.iter().map(|v| v.unwrap()).collect();
    assert_eq!(flat, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
}

#[test]
fn fix_profile_numbers_preserves_dtype_and_other_columns() -> PolarsResult<()> {
    let mut frame = df![
        "time" => [0.0, 1.0, 2.0, 3.0],
        "profile_index" => [1i64, 2, 1, 2],
        "profile_direction" => [1i64, -1, 1, -1],
    ]?;
    fix_profile_numbers(&mut frame, "profile_index").unwrap();

    let index: Vec<i64> = frame
        .column("profile_index")?
        .as_materialized_series()
        .i64()?
        .into_iter()
        .flatten()
        .collect();
    assert_eq!(index, vec![1, 2, 3, 4]);

    // The direction column keeps each batch's internal alternation.
    let direction: Vec<i64> = frame
        .column("profile_direction")?
        .as_materialized_series()
        .i64()?
        .into_iter()
        .flatten()
        .collect();
    assert_eq!(direction, vec![1, -1, 1, -1]);
    Ok(())
}
