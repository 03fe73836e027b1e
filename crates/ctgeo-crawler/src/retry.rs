use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::time::{sleep, timeout};

use crate::config::{secs, uniform_secs, CrawlerConfig};
use crate::fetchable::{FetchError, SchoolData, SchoolFetcher};
use crate::limiter::ConcurrencyLimiter;
use crate::stop::StopSignal;

/// Outcome of fetching one code with retries.
#[derive(Debug, Clone)]
pub struct ScrapeResult {
    pub ct_code: String,
    /// Only set on success
    pub school_data: Option<SchoolData>,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub timestamp: DateTime<Local>,
}

impl ScrapeResult {
    fn new(ct_code: &str) -> Self {
        Self {
            ct_code: ct_code.to_string(),
            school_data: None,
            attempts: 0,
            last_error: None,
            timestamp: Local::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.school_data.as_ref().is_some_and(|d| d.success)
    }
}

/// Delay before retrying after `attempt` (1-based): `base * 2^(attempt-1)`, capped.
pub fn backoff_delay(config: &CrawlerConfig, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(1023) as i32;
    let delay = config.retry_base_delay * 2f64.powi(exponent);
    secs(delay.min(config.retry_max_delay))
}

/// Adds up to 10% of `delay` on top of it.
pub fn jittered(delay: Duration) -> Duration {
    delay + uniform_secs(0.0, delay.as_secs_f64() * 0.1)
}

/// Wraps a fetcher with a shared concurrency limit, per-request jitter and
/// exponential backoff between attempts.
#[derive(Debug)]
pub struct RateLimitedFetcher<F> {
    config: CrawlerConfig,
    limiter: ConcurrencyLimiter,
    fetcher: F,
    stop: StopSignal,
}

impl<F> RateLimitedFetcher<F>
where
    F: SchoolFetcher,
{
    pub fn new(config: CrawlerConfig, fetcher: F) -> Self {
        let limiter = ConcurrencyLimiter::new(config.max_concurrent_requests);
        Self {
            config,
            limiter,
            fetcher,
            stop: StopSignal::default(),
        }
    }

    /// No retry is started once `stop` is raised.
    pub fn with_stop(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub async fn fetch_with_retry(&self, ct_code: &str) -> ScrapeResult {
        let max_attempts = self.config.retry_max_attempts.max(1);
        let mut result = ScrapeResult::new(ct_code);

        for attempt in 1..=max_attempts {
            if attempt > 1 && self.stop.is_stopped() {
                log::warn!("Interrupted, not retrying {ct_code}");
                break;
            }
            result.attempts = attempt;

            sleep(self.config.request_jitter()).await;

            match self.attempt(ct_code, attempt, max_attempts).await {
                Ok(data) => {
                    log::info!("Successfully fetched {ct_code} on attempt {attempt}");
                    result.school_data = Some(data);
                    result.last_error = None;
                    result.timestamp = Local::now();
                    return result;
                }
                Err(e) => result.last_error = Some(e),
            }

            if attempt < max_attempts && !self.stop.is_stopped() {
                let delay = jittered(backoff_delay(&self.config, attempt));
                log::info!(
                    "Retrying {ct_code} in {:.2} seconds...",
                    delay.as_secs_f64()
                );
                sleep(delay).await;
            }
        }

        log::error!(
            "Failed to fetch {ct_code} after {} attempts",
            result.attempts
        );
        result.timestamp = Local::now();
        result
    }

    async fn attempt(&self, ct_code: &str, attempt: u32, of: u32) -> Result<SchoolData, String> {
        let _permit = self.limiter.acquire().await.map_err(|e| e.to_string())?;
        log::info!("Attempt {attempt}/{of} for {ct_code}");

        match timeout(self.config.attempt_timeout(), self.fetcher.fetch(ct_code)).await {
            Ok(data) if data.success => Ok(data),
            Ok(data) => {
                let err = data
                    .error_message
                    .unwrap_or_else(|| String::from("Unknown error"));
                log::warn!("Failed to fetch {ct_code}: {err}");
                Err(err)
            }
            Err(elapsed) => {
                log::error!("Timeout for {ct_code} on attempt {attempt}");
                Err(FetchError::Timeout(elapsed.to_string()).to_string())
            }
        }
    }
}
