use std::path::PathBuf;
use std::time::Duration;

use anyhow::{ensure, Result};
use ctgeo_store::{ResultStore, TrackedFile};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Upper bound for every delay and timeout setting, in seconds.
pub const MAX_SECONDS: f64 = 86_400.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlerConfig {
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    /// Codes per batch, defaults to `max_concurrent_requests`
    #[serde(default)]
    pub batch_size: Option<usize>,

    #[serde(default = "default_batch_delay_min")]
    pub batch_delay_min: f64,

    #[serde(default = "default_batch_delay_max")]
    pub batch_delay_max: f64,

    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,

    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay: f64,

    #[serde(default = "default_retry_max_delay")]
    pub retry_max_delay: f64,

    #[serde(default = "default_request_jitter_min")]
    pub request_jitter_min: f64,

    #[serde(default = "default_request_jitter_max")]
    pub request_jitter_max: f64,

    /// Upper bound in seconds for a single fetch attempt
    #[serde(default = "default_attempt_timeout")]
    pub attempt_timeout: f64,

    #[serde(default = "default_handle_sigint")]
    pub handle_sigint: bool,

    #[serde(default = "default_codes_file")]
    pub codes_file: PathBuf,

    #[serde(default = "default_output_file")]
    pub output_file: PathBuf,

    #[serde(default = "default_progress_file")]
    pub progress_file: PathBuf,

    #[serde(default = "default_failed_codes_file")]
    pub failed_codes_file: PathBuf,

    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: default_max_concurrent_requests(),
            batch_size: None,
            batch_delay_min: default_batch_delay_min(),
            batch_delay_max: default_batch_delay_max(),
            retry_max_attempts: default_retry_max_attempts(),
            retry_base_delay: default_retry_base_delay(),
            retry_max_delay: default_retry_max_delay(),
            request_jitter_min: default_request_jitter_min(),
            request_jitter_max: default_request_jitter_max(),
            attempt_timeout: default_attempt_timeout(),
            handle_sigint: default_handle_sigint(),
            codes_file: default_codes_file(),
            output_file: default_output_file(),
            progress_file: default_progress_file(),
            failed_codes_file: default_failed_codes_file(),
            log_file: default_log_file(),
        }
    }
}

fn default_max_concurrent_requests() -> usize {
    3
}

fn default_batch_delay_min() -> f64 {
    1.0
}

fn default_batch_delay_max() -> f64 {
    2.0
}

fn default_retry_max_attempts() -> u32 {
    3
}

fn default_retry_base_delay() -> f64 {
    1.0
}

fn default_retry_max_delay() -> f64 {
    60.0
}

fn default_request_jitter_min() -> f64 {
    0.1
}

fn default_request_jitter_max() -> f64 {
    0.5
}

fn default_attempt_timeout() -> f64 {
    90.0
}

fn default_handle_sigint() -> bool {
    true
}

fn default_codes_file() -> PathBuf {
    PathBuf::from("clave_ct_list_federal_primaria.txt")
}

fn default_output_file() -> PathBuf {
    PathBuf::from("ct_codes_coords_googlelinks_federal_primaria.txt")
}

fn default_progress_file() -> PathBuf {
    PathBuf::from("scraper_progress_federal_primaria.txt")
}

fn default_failed_codes_file() -> PathBuf {
    PathBuf::from("failed_ct_codes_federal_primaria.txt")
}

fn default_log_file() -> PathBuf {
    PathBuf::from("scraper_log.txt")
}

impl CrawlerConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.max_concurrent_requests > 0,
            "maxConcurrentRequests must be at least 1"
        );
        ensure!(self.batch_size != Some(0), "batchSize must be at least 1");
        ensure!(
            self.retry_max_attempts > 0,
            "retryMaxAttempts must be at least 1"
        );
        for (name, value) in [
            ("batchDelayMin", self.batch_delay_min),
            ("batchDelayMax", self.batch_delay_max),
            ("retryBaseDelay", self.retry_base_delay),
            ("retryMaxDelay", self.retry_max_delay),
            ("requestJitterMin", self.request_jitter_min),
            ("requestJitterMax", self.request_jitter_max),
            ("attemptTimeout", self.attempt_timeout),
        ] {
            ensure!(
                value.is_finite() && value >= 0.0,
                "{name} must be a non-negative number of seconds, got {value}"
            );
            ensure!(
                value <= MAX_SECONDS,
                "{name} must be at most {MAX_SECONDS} seconds, got {value}"
            );
        }
        ensure!(
            self.batch_delay_min <= self.batch_delay_max,
            "batchDelayMin ({}) is greater than batchDelayMax ({})",
            self.batch_delay_min,
            self.batch_delay_max
        );
        ensure!(
            self.request_jitter_min <= self.request_jitter_max,
            "requestJitterMin ({}) is greater than requestJitterMax ({})",
            self.request_jitter_min,
            self.request_jitter_max
        );
        ensure!(
            self.retry_base_delay <= self.retry_max_delay,
            "retryBaseDelay ({}) is greater than retryMaxDelay ({})",
            self.retry_base_delay,
            self.retry_max_delay
        );
        Ok(())
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
            .unwrap_or(self.max_concurrent_requests)
            .max(1)
    }

    pub fn attempt_timeout(&self) -> Duration {
        secs(self.attempt_timeout)
    }

    pub fn request_jitter(&self) -> Duration {
        uniform_secs(self.request_jitter_min, self.request_jitter_max)
    }

    pub fn batch_delay(&self) -> Duration {
        uniform_secs(self.batch_delay_min, self.batch_delay_max)
    }

    pub fn store(&self) -> ResultStore {
        ResultStore::new(
            &self.output_file,
            &self.progress_file,
            &self.failed_codes_file,
        )
    }

    /// Every file a crawl writes, in the order `reset` reports them.
    pub fn tracked_files(&self) -> Vec<TrackedFile> {
        vec![
            TrackedFile::new(&self.progress_file, "progress"),
            TrackedFile::new(&self.output_file, "output"),
            TrackedFile::new(&self.failed_codes_file, "failed"),
            TrackedFile::new(&self.log_file, "log"),
        ]
    }
}

/// Seconds to a `Duration`, clamped to `0..=MAX_SECONDS`. NaN becomes zero.
pub(crate) fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.clamp(0.0, MAX_SECONDS)).unwrap_or(Duration::ZERO)
}

pub(crate) fn uniform_secs(min: f64, max: f64) -> Duration {
    let (min, max) = (min.clamp(0.0, MAX_SECONDS), max.clamp(0.0, MAX_SECONDS));
    if min.is_nan() || max.is_nan() || max <= min {
        return secs(min);
    }
    secs(rand::thread_rng().gen_range(min..=max))
}
