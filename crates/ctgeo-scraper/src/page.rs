use anyhow::anyhow;
use ctgeo_crawler::{FetchError, SchoolData};
use sws_scraper::{Html, Selector};

pub fn parse_selector(css: &str) -> anyhow::Result<Selector> {
    Selector::parse(css)
        .map_err(|e| anyhow!(FetchError::Selector(format!("{css} ({e:?})"))))
}

/// Extracts text, `href` and `title` of the first element matching `selector`.
pub fn parse_school_page(ct_code: &str, page: &str, selector: &Selector) -> SchoolData {
    let document = Html::parse_document(page);

    let Some(element) = document.select(selector.clone()).next() else {
        return SchoolData::failed(ct_code, &FetchError::ElementNotFound);
    };

    let text = element.inner_text();
    let text = text.trim();
    let (href, title) = element
        .map_value(|el| {
            (
                el.attr("href").map(String::from),
                el.attr("title").map(String::from),
            )
        })
        .unwrap_or_default();

    SchoolData::found(
        ct_code,
        (!text.is_empty()).then(|| text.to_string()),
        href,
        title,
    )
}
