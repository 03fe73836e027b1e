use anyhow::Result;
use ctgeo_crawler::{FetchError, SchoolData, SchoolFetcher};
use reqwest::ClientBuilder;
use sws_scraper::Selector;

use crate::config::FetcherConfig;
use crate::page::{parse_school_page, parse_selector};

/// Downloads `baseUrl + code` and looks for the configured element.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    config: FetcherConfig,
    selector: Selector,
}

impl HttpFetcher {
    pub fn new(config: FetcherConfig) -> Result<Self> {
        config.validate()?;
        let selector = parse_selector(&config.selector)?;
        let client = ClientBuilder::new()
            .user_agent(&config.user_agent)
            .timeout(config.timeout())
            .gzip(true)
            .deflate(true)
            .build()?;
        Ok(Self {
            client,
            config,
            selector,
        })
    }

    async fn download(&self, url: &str) -> Result<String, FetchError> {
        let resp = self.client.get(url).send().await.map_err(classify)?;

        let status = resp.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(FetchError::Http {
                status: status.as_u16(),
                url: resp.url().to_string(),
            });
        }
        log::debug!("Page loaded, final URL: {}", resp.url());

        resp.text().await.map_err(classify)
    }
}

fn classify(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout(e.to_string())
    } else {
        FetchError::Request(e.to_string())
    }
}

impl SchoolFetcher for HttpFetcher {
    async fn fetch(&self, ct_code: &str) -> SchoolData {
        let url = self.config.page_url(ct_code);
        log::info!("Fetching {ct_code} from {url}");

        match self.download(&url).await {
            Ok(page) => {
                let data = parse_school_page(ct_code, &page, &self.selector);
                if data.success {
                    log::info!("Found element for {ct_code}");
                } else {
                    log::warn!("Target element not found for {ct_code}");
                }
                data
            }
            Err(e) => {
                log::error!("Fetching {ct_code} failed: {e}");
                SchoolData::failed(ct_code, &e)
            }
        }
    }
}
