use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use anyhow::Result;

/// One entry of the failure log, stored as `CODE|ERROR|TIMESTAMP`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedRecord {
    pub ct_code: String,
    pub error: String,
    pub timestamp: String,
}

impl FailedRecord {
    pub fn new(ct_code: &str, error: &str, timestamp: String) -> Self {
        Self {
            ct_code: ct_code.trim().to_string(),
            error: sanitize(error),
            timestamp,
        }
    }

    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        let (ct_code, rest) = line.split_once('|')?;
        let (error, timestamp) = rest.rsplit_once('|')?;
        let ct_code = ct_code.trim();
        if ct_code.is_empty() {
            return None;
        }
        Some(Self {
            ct_code: ct_code.to_string(),
            error: error.trim().to_string(),
            timestamp: timestamp.trim().to_string(),
        })
    }
}

impl fmt::Display for FailedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.ct_code, self.error, self.timestamp)
    }
}

// Keeps every entry on a single, unambiguous line.
fn sanitize(error: &str) -> String {
    error
        .chars()
        .map(|c| if c == '|' || c == '\n' || c == '\r' { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

/// All parseable entries of the failure log, in file order.
pub fn load_failed<P: AsRef<Path>>(failed_file: P) -> Result<Vec<FailedRecord>> {
    let path = failed_file.as_ref();
    if !path.exists() {
        return Ok(vec![]);
    }
    let content = fs_err::read_to_string(path)?;
    Ok(content.lines().filter_map(FailedRecord::parse_line).collect())
}

/// Unique failed codes in first-seen order.
pub fn failed_codes<P: AsRef<Path>>(failed_file: P) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    Ok(load_failed(failed_file)?
        .into_iter()
        .map(|r| r.ct_code)
        .filter(|code| seen.insert(code.clone()))
        .collect())
}
