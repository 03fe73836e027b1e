use std::collections::BTreeMap;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::coords::CoordRecord;

/// A file managed by `reset_files`, with a label used in reports.
#[derive(Debug, Clone)]
pub struct TrackedFile {
    pub path: PathBuf,
    pub kind: &'static str,
}

impl TrackedFile {
    pub fn new<P: Into<PathBuf>>(path: P, kind: &'static str) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetMode {
    Backup,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetOutcome {
    BackedUp {
        kind: &'static str,
        from: PathBuf,
        to: PathBuf,
    },
    Deleted {
        kind: &'static str,
        path: PathBuf,
    },
    Missing {
        kind: &'static str,
        path: PathBuf,
    },
}

/// `dir/name.txt` becomes `dir/name_<stamp>.txt`.
pub fn backup_path(path: &Path, stamp: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    path.with_file_name(format!("{stem}_{stamp}{ext}"))
}

pub fn reset_files(files: &[TrackedFile], mode: ResetMode) -> Result<Vec<ResetOutcome>> {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();

    let mut outcomes = Vec::with_capacity(files.len());
    for TrackedFile { path, kind } in files {
        let kind = *kind;
        if !path.exists() {
            outcomes.push(ResetOutcome::Missing {
                kind,
                path: path.clone(),
            });
            continue;
        }
        match mode {
            ResetMode::Backup => {
                let to = backup_path(path, &stamp);
                fs_err::rename(path, &to)?;
                log::info!("Backed up {kind} file {} to {}", path.display(), to.display());
                outcomes.push(ResetOutcome::BackedUp {
                    kind,
                    from: path.clone(),
                    to,
                });
            }
            ResetMode::Delete => {
                fs_err::remove_file(path)?;
                log::info!("Deleted {kind} file {}", path.display());
                outcomes.push(ResetOutcome::Deleted {
                    kind,
                    path: path.clone(),
                });
            }
        }
    }

    Ok(outcomes)
}

/// Merges result files into `output`, one line per code sorted by code.
///
/// The first occurrence of a code wins, across files and within a file.
/// Returns the number of unique codes written.
pub fn merge_results<P: AsRef<Path>>(inputs: &[P], output: &Path) -> Result<usize> {
    let mut merged = BTreeMap::new();

    for input in inputs {
        let input = input.as_ref();
        if !input.exists() {
            log::warn!("Skipping missing result file {}", input.display());
            continue;
        }
        let content = fs_err::read_to_string(input)?;
        for line in content.lines() {
            let Some((code, rest)) = line.split_once('-') else {
                continue;
            };
            let code = code.trim();
            if code.is_empty() {
                continue;
            }
            merged
                .entry(code.to_string())
                .or_insert_with(|| rest.trim().to_string());
        }
    }

    let mut out = BufWriter::new(fs_err::File::create(output)?);
    for (code, rest) in &merged {
        writeln!(out, "{code}-{rest}")?;
    }
    out.flush()?;

    Ok(merged.len())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordRow {
    pub ct_code: String,
    pub latitude: String,
    pub longitude: String,
    pub google_maps_url: String,
}

impl From<CoordRecord> for CoordRow {
    fn from(r: CoordRecord) -> Self {
        Self {
            ct_code: r.ct_code,
            latitude: r.latitude,
            longitude: r.longitude,
            google_maps_url: r.url,
        }
    }
}

/// Writes the parseable lines of `input` as a CSV. Nothing is written when
/// no line parses; the returned count is then zero.
pub fn export_csv(input: &Path, output: &Path) -> Result<usize> {
    if !input.exists() {
        bail!("Input file not found: {}", input.display());
    }

    let content = fs_err::read_to_string(input)?;
    let rows = content
        .lines()
        .filter_map(CoordRecord::parse_line)
        .map(CoordRow::from)
        .collect::<Vec<_>>();

    if rows.is_empty() {
        return Ok(0);
    }

    let mut wtr = csv::Writer::from_writer(fs_err::File::create(output)?);
    for row in &rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;

    Ok(rows.len())
}
