use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

static MAPS_PLACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"place/(-?\d+\.\d+),(-?\d+\.\d+)").unwrap());

static COORD_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^-]+)-(-?\d+\.?\d*),(-?\d+\.?\d*)(?:-(.*))?$").unwrap());

/// One recovered location, stored as `CODE-LAT,LNG-URL`.
///
/// Latitude and longitude keep the exact decimal text they were parsed from
/// so that rewriting a file never changes its precision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordRecord {
    pub ct_code: String,
    pub latitude: String,
    pub longitude: String,
    pub url: String,
}

impl CoordRecord {
    /// Builds a record from a maps link such as `.../maps/place/19.43,-99.13/...`.
    pub fn from_maps_link(ct_code: &str, href: &str) -> Option<Self> {
        let caps = MAPS_PLACE.captures(href)?;
        Some(Self {
            ct_code: ct_code.trim().to_string(),
            latitude: caps[1].to_string(),
            longitude: caps[2].to_string(),
            url: href.to_string(),
        })
    }

    /// Parses an output/progress line, rejecting anything without a `lat,lng` pair.
    pub fn parse_line(line: &str) -> Option<Self> {
        let caps = COORD_LINE.captures(line.trim())?;
        let ct_code = caps[1].trim();
        if ct_code.is_empty() {
            return None;
        }
        Some(Self {
            ct_code: ct_code.to_string(),
            latitude: caps[2].to_string(),
            longitude: caps[3].to_string(),
            url: caps
                .get(4)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default(),
        })
    }

    pub fn coords(&self) -> String {
        format!("{},{}", self.latitude, self.longitude)
    }
}

impl fmt::Display for CoordRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.ct_code, self.coords())?;
        if !self.url.is_empty() {
            write!(f, "-{}", self.url)?;
        }
        Ok(())
    }
}

/// The CT code a progress line belongs to: everything before the first `-`.
pub fn ct_code_of(line: &str) -> Option<&str> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    line.split('-')
        .next()
        .map(str::trim)
        .filter(|code| !code.is_empty())
}
