use std::time::Duration;

use anyhow::{ensure, Result};
use ctgeo_crawler::MAX_SECONDS;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetcherConfig {
    /// The CT code is appended to this URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// CSS selector of the element holding the location link
    #[serde(default = "default_selector")]
    pub selector: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: f64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            selector: default_selector(),
            user_agent: default_user_agent(),
            timeout: default_timeout(),
        }
    }
}

fn default_base_url() -> String {
    String::from("https://escuelasmex.com/directorio/")
}

// Same element as /html/body/div/div[5]/div[1]/div/a
fn default_selector() -> String {
    String::from("html > body > div > div:nth-of-type(5) > div:nth-of-type(1) > div > a")
}

fn default_user_agent() -> String {
    String::from(
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    )
}

fn default_timeout() -> f64 {
    45.0
}

impl FetcherConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.base_url.trim().is_empty(), "baseUrl must not be empty");
        ensure!(!self.selector.trim().is_empty(), "selector must not be empty");
        ensure!(
            self.timeout.is_finite() && self.timeout > 0.0 && self.timeout <= MAX_SECONDS,
            "timeout must be within (0, {MAX_SECONDS}] seconds, got {}",
            self.timeout
        );
        Ok(())
    }

    pub fn page_url(&self, ct_code: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), ct_code.trim())
    }

    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout.clamp(0.0, MAX_SECONDS))
            .unwrap_or(Duration::ZERO)
    }
}
