use std::cmp::Ordering;
use std::collections::HashSet;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};

/// Parses the cycle id embedded in a raw input file name: the last
/// dot-separated token if it is an integer, otherwise the second-to-last
/// (covers compressed names like `sea045.12.gz`). Anything else is a fatal
/// input error.
pub fn parse_cycle_id(filename: &str) -> Result<u64> {
    let parts: Vec<&str> = filename.split('.').collect();
    for part in parts.iter().rev().take(2) {
        if let Ok(id) = part.parse::<u64>() {
            return Ok(id);
        }
    }
    Err(PipelineError::CycleId {
        file: filename.to_string(),
    })
}

#[derive(PartialEq, Eq, PartialOrd, Ord)]
enum SortToken {
    Number(u64),
    Text(String),
}

fn natural_key(name: &str) -> Vec<SortToken> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_digits = false;
    for ch in name.chars() {
        if ch.is_ascii_digit() != in_digits && !current.is_empty() {
            tokens.push(finish_token(&current, in_digits));
            current.clear();
        }
        in_digits = ch.is_ascii_digit();
        current.push(ch);
    }
    if !current.is_empty() {
        tokens.push(finish_token(&current, in_digits));
    }
    tokens
}

fn finish_token(text: &str, in_digits: bool) -> SortToken {
    if in_digits {
        if let Ok(value) = text.parse::<u64>() {
            return SortToken::Number(value);
        }
    }
    SortToken::Text(text.to_lowercase())
}

/// Numeric-aware sort, so `file.2` orders before `file.10`.
pub fn natural_sort(files: &mut [String]) {
    files.sort_by(|a, b| match natural_key(a).cmp(&natural_key(b)) {
        Ordering::Equal => a.cmp(b),
        other => other,
    });
}

/// Keeps only the files whose cycle id appears in both series, preserving
/// the incoming order of each series. An empty intersection means the
/// mission has no processable input and is fatal.
pub fn match_input_files(
    nav_files: Vec<String>,
    pld_files: Vec<String>,
    input_dir: &Path,
) -> Result<(Vec<String>, Vec<String>)> {
    let nav_ids = cycle_ids(&nav_files)?;
    let pld_ids = cycle_ids(&pld_files)?;

    let nav_set: HashSet<u64> = nav_ids.iter().copied().collect();
    let pld_set: HashSet<u64> = pld_ids.iter().copied().collect();
    let good_cycles: HashSet<u64> = nav_set.intersection(&pld_set).copied().collect();

    let good_nav = keep_matched(nav_files, &nav_ids, &good_cycles);
    let good_pld = keep_matched(pld_files, &pld_ids, &good_cycles);

    if good_nav.is_empty() || good_pld.is_empty() {
        return Err(PipelineError::NoPairedInputs {
            dir: input_dir.to_path_buf(),
        });
    }
    Ok((good_nav, good_pld))
}

fn cycle_ids(files: &[String]) -> Result<Vec<u64>> {
    files.iter().map(|f| parse_cycle_id(f)).collect()
}

fn keep_matched(files: Vec<String>, ids: &[u64], good: &HashSet<u64>) -> Vec<String> {
    files
        .into_iter()
        .zip(ids)
        .filter(|(_, id)| good.contains(id))
        .map(|(file, _)| file)
        .collect()
}

/// Splits `num_files` into contiguous chunks of `batch_size`. A final chunk
/// of `min_final_batch_files` files or fewer is merged into the previous
/// chunk rather than left as a degenerate tiny batch.
pub fn plan_batches(
    num_files: usize,
    batch_size: usize,
    min_final_batch_files: usize,
) -> Vec<Range<usize>> {
    if num_files == 0 {
        return Vec::new();
    }
    let batch_size = batch_size.max(1);
    let mut ranges: Vec<Range<usize>> = (0..num_files)
        .step_by(batch_size)
        .map(|start| start..(start + batch_size).min(num_files))
        .collect();
    if ranges.len() > 1 {
        let last = ranges.last().cloned().unwrap_or(0..0);
        if last.len() <= min_final_batch_files {
            ranges.pop();
            if let Some(prev) = ranges.last_mut() {
                prev.end = last.end;
            }
        }
    }
    ranges
}

/// Copies one batch's navigation and payload files into its staging
/// directory, creating it if needed.
pub fn stage_batch(staging_dir: &Path, nav_files: &[String], pld_files: &[String]) -> Result<()> {
    fs::create_dir_all(staging_dir)?;
    for file in nav_files.iter().chain(pld_files) {
        let source = PathBuf::from(file);
        let name = source.file_name().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("input path {file} has no file name"),
            )
        })?;
        fs::copy(&source, staging_dir.join(name))?;
    }
    Ok(())
}
