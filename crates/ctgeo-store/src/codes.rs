use std::collections::HashSet;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{anyhow, Result};

pub const DEFAULT_CODE_COLUMN: &str = "CLAVE CT";

/// Reads a newline-delimited code list, skipping blank lines.
pub fn read_codes<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let content = fs_err::read_to_string(path.as_ref())?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(String::from)
        .collect())
}

pub fn write_codes<P: AsRef<Path>>(path: P, codes: &[String]) -> Result<()> {
    let mut out = BufWriter::new(fs_err::File::create(path.as_ref())?);
    for code in codes {
        writeln!(out, "{code}")?;
    }
    out.flush()?;
    Ok(())
}

/// Drops repeated codes, keeping the first occurrence and the original order.
pub fn dedup_codes<I>(codes: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    codes
        .into_iter()
        .filter(|code| seen.insert(code.clone()))
        .collect()
}

// Spreadsheet exports often start with a byte order mark.
fn header_name(raw: &str) -> &str {
    raw.trim_start_matches('\u{feff}').trim()
}

/// Collects the non-empty values of `column` from a metadata CSV.
///
/// Header names are trimmed (BOM included) before matching and non UTF-8
/// bytes are decoded lossily, since exports of the metadata table are often
/// latin1.
pub fn extract_codes<P: AsRef<Path>>(csv_path: P, column: &str) -> Result<Vec<String>> {
    let file = fs_err::File::open(csv_path.as_ref())?;
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(file);

    let idx = rdr
        .byte_headers()?
        .iter()
        .position(|h| header_name(&String::from_utf8_lossy(h)) == column)
        .ok_or_else(|| {
            anyhow!(
                "Column {column:?} not found in {}",
                csv_path.as_ref().display()
            )
        })?;

    let mut codes = vec![];
    for record in rdr.byte_records() {
        let record = record?;
        if let Some(value) = record.get(idx) {
            let value = String::from_utf8_lossy(value);
            let value = value.trim();
            if !value.is_empty() {
                codes.push(value.to_string());
            }
        }
    }

    log::info!(
        "Extracted {} codes from {}",
        codes.len(),
        csv_path.as_ref().display()
    );
    Ok(codes)
}
