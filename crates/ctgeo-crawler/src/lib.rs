mod config;
mod crawler;
mod fetchable;
mod limiter;
mod progress;
mod retry;
mod stop;

pub use config::{CrawlerConfig, MAX_SECONDS};
pub use crawler::{crawl_codes, crawl_pending, retry_failed, CrawlSummary, ItemOutcome};
pub use fetchable::{FetchError, SchoolData, SchoolFetcher};
pub use limiter::ConcurrencyLimiter;
pub use progress::{NullProgress, Progress};
pub use retry::{backoff_delay, jittered, RateLimitedFetcher, ScrapeResult};
pub use stop::StopSignal;
