use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::coords::CoordRecord;
use crate::failed::FailedRecord;

/// Local time, ISO-8601 with microseconds.
pub fn timestamp_now() -> String {
    chrono::Local::now()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}

/// Append-only sink for the files a crawl produces.
#[derive(Debug, Clone)]
pub struct ResultStore {
    output_file: PathBuf,
    progress_file: PathBuf,
    failed_file: PathBuf,
}

impl ResultStore {
    pub fn new<P: Into<PathBuf>>(output_file: P, progress_file: P, failed_file: P) -> Self {
        Self {
            output_file: output_file.into(),
            progress_file: progress_file.into(),
            failed_file: failed_file.into(),
        }
    }

    pub fn output_file(&self) -> &Path {
        &self.output_file
    }

    pub fn progress_file(&self) -> &Path {
        &self.progress_file
    }

    pub fn failed_file(&self) -> &Path {
        &self.failed_file
    }

    /// Records a success in both the output and the progress file.
    pub fn append_success(&self, record: &CoordRecord) -> Result<()> {
        let line = record.to_string();
        append_line(&self.output_file, &line)?;
        append_line(&self.progress_file, &line)?;
        Ok(())
    }

    pub fn append_failure(&self, ct_code: &str, error: &str) -> Result<FailedRecord> {
        let record = FailedRecord::new(ct_code, error, timestamp_now());
        append_line(&self.failed_file, &record.to_string())?;
        Ok(record)
    }

    /// Moves the failure log aside to `<file>.bak`, replacing any previous backup.
    pub fn archive_failed(&self) -> Result<Option<PathBuf>> {
        if !self.failed_file.exists() {
            return Ok(None);
        }
        let mut bak = self.failed_file.clone().into_os_string();
        bak.push(".bak");
        let bak = PathBuf::from(bak);
        fs_err::rename(&self.failed_file, &bak)?;
        Ok(Some(bak))
    }
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs_err::create_dir_all(parent)?;
        }
    }
    let mut file = fs_err::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(file, "{line}")?;
    Ok(())
}
