use std::collections::HashSet;
use std::path::Path;

use anyhow::Result;

use crate::coords::{ct_code_of, CoordRecord};

/// Codes already present in the progress file. A missing file means nothing was done yet.
pub fn load_processed<P: AsRef<Path>>(progress_file: P) -> Result<HashSet<String>> {
    let path = progress_file.as_ref();
    if !path.exists() {
        return Ok(HashSet::new());
    }
    let content = fs_err::read_to_string(path)?;
    Ok(content
        .lines()
        .filter_map(ct_code_of)
        .map(String::from)
        .collect())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressStats {
    pub total_processed: usize,
    pub unique_codes: usize,
    pub coordinates_found: usize,
}

/// Returns `None` when the progress file does not exist.
pub fn check_progress<P: AsRef<Path>>(progress_file: P) -> Result<Option<ProgressStats>> {
    let path = progress_file.as_ref();
    if !path.exists() {
        return Ok(None);
    }

    let content = fs_err::read_to_string(path)?;
    let mut stats = ProgressStats::default();
    let mut unique = HashSet::new();
    for line in content.lines() {
        if !line.contains('-') {
            continue;
        }
        let Some(code) = ct_code_of(line) else {
            continue;
        };
        stats.total_processed += 1;
        unique.insert(code);
        if CoordRecord::parse_line(line).is_some() {
            stats.coordinates_found += 1;
        }
    }
    stats.unique_codes = unique.len();

    Ok(Some(stats))
}
