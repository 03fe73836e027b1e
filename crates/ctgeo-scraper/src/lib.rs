mod config;
mod fetcher;
mod page;

pub use config::FetcherConfig;
pub use fetcher::HttpFetcher;
pub use page::{parse_school_page, parse_selector};
