use std::future::Future;

use thiserror::Error;

/// What a page fetch recovered for one CT code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchoolData {
    pub ct_code: String,
    pub text: Option<String>,
    pub href: Option<String>,
    pub title: Option<String>,
    pub success: bool,
    pub error_message: Option<String>,
}

impl SchoolData {
    pub fn found(
        ct_code: &str,
        text: Option<String>,
        href: Option<String>,
        title: Option<String>,
    ) -> Self {
        Self {
            ct_code: ct_code.to_string(),
            text,
            href,
            title,
            success: true,
            error_message: None,
        }
    }

    pub fn failed(ct_code: &str, error: &FetchError) -> Self {
        Self {
            ct_code: ct_code.to_string(),
            success: false,
            error_message: Some(error.to_string()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Timeout: {0}")]
    Timeout(String),
    #[error("Target element not found")]
    ElementNotFound,
    #[error("HTTP error: {status} for URL: {url}")]
    Http { status: u16, url: String },
    #[error("Request error: {0}")]
    Request(String),
    #[error("Invalid selector {0:?}")]
    Selector(String),
}

/// Retrieves the page of a single CT code.
///
/// Implementations never fail hard: every problem is reported through a
/// `SchoolData` with `success == false` and an error message.
pub trait SchoolFetcher {
    fn fetch(&self, ct_code: &str) -> impl Future<Output = SchoolData>;
}

impl<T: SchoolFetcher> SchoolFetcher for &T {
    fn fetch(&self, ct_code: &str) -> impl Future<Output = SchoolData> {
        (**self).fetch(ct_code)
    }
}
