use anyhow::{Context, Result};
use ctgeo_store::{dedup_codes, failed_codes, load_processed, read_codes, CoordRecord, ResultStore};
use futures::future;
use tokio::time::sleep;

use crate::config::CrawlerConfig;
use crate::fetchable::SchoolFetcher;
use crate::progress::Progress;
use crate::retry::{RateLimitedFetcher, ScrapeResult};
use crate::stop::{SigintWatch, StopSignal};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    /// Size of the code list for this run
    pub total: usize,
    pub previously_processed: usize,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub interrupted: bool,
}

impl CrawlSummary {
    pub fn done(&self) -> usize {
        self.previously_processed + self.attempted
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Saved(CoordRecord),
    Failed { ct_code: String, error: String },
}

impl ItemOutcome {
    pub fn ct_code(&self) -> &str {
        match self {
            Self::Saved(record) => &record.ct_code,
            Self::Failed { ct_code, .. } => ct_code,
        }
    }
}

/// Fetches every code of `config.codes_file` that is not yet in the progress file.
pub async fn crawl_pending<F>(
    config: &CrawlerConfig,
    fetcher: F,
    progress: &mut dyn Progress,
) -> Result<CrawlSummary>
where
    F: SchoolFetcher,
{
    config.validate()?;

    let all_codes = dedup_codes(read_codes(&config.codes_file).with_context(|| {
        format!("Couldn't read code list {}", config.codes_file.display())
    })?);

    let mut summary = CrawlSummary {
        total: all_codes.len(),
        ..Default::default()
    };

    if all_codes.is_empty() {
        log::warn!("No codes found in {}", config.codes_file.display());
        progress.finish(&summary);
        return Ok(summary);
    }

    let processed = load_processed(&config.progress_file)?;
    let pending = all_codes
        .into_iter()
        .filter(|code| !processed.contains(code))
        .collect::<Vec<_>>();
    summary.previously_processed = summary.total - pending.len();

    if pending.is_empty() {
        log::info!(
            "All {} codes already processed, see {}",
            summary.total,
            config.output_file.display()
        );
        progress.finish(&summary);
        return Ok(summary);
    }

    log::info!(
        "Processing {} codes (skipping {} already done)",
        pending.len(),
        summary.previously_processed
    );

    let sigint = SigintWatch::new(config.handle_sigint);
    crawl_codes(config, fetcher, pending, summary, sigint.signal(), progress).await
}

/// Fetches again every code of the failure log.
///
/// The log is moved to `<file>.bak` first; codes that still fail are
/// appended to a fresh log.
pub async fn retry_failed<F>(
    config: &CrawlerConfig,
    fetcher: F,
    progress: &mut dyn Progress,
) -> Result<CrawlSummary>
where
    F: SchoolFetcher,
{
    config.validate()?;

    let store = config.store();
    if !store.failed_file().exists() {
        log::warn!(
            "No failed codes file found: {}",
            store.failed_file().display()
        );
        return Ok(CrawlSummary::default());
    }

    let codes = failed_codes(store.failed_file())?;
    if codes.is_empty() {
        log::info!("No failed codes to retry");
        return Ok(CrawlSummary::default());
    }

    if let Some(bak) = store.archive_failed()? {
        log::info!("Moved previous failures to {}", bak.display());
    }
    log::info!("Retrying {} failed codes", codes.len());

    let summary = CrawlSummary {
        total: codes.len(),
        ..Default::default()
    };
    let sigint = SigintWatch::new(config.handle_sigint);
    crawl_codes(config, fetcher, codes, summary, sigint.signal(), progress).await
}

/// Fetches `codes` in fixed-size batches and persists each result as soon as
/// its batch completes.
///
/// Once `stop` is raised the running batch finishes without starting new
/// retries, later batches are skipped and the summary is marked interrupted.
pub async fn crawl_codes<F>(
    config: &CrawlerConfig,
    fetcher: F,
    codes: Vec<String>,
    mut summary: CrawlSummary,
    stop: &StopSignal,
    progress: &mut dyn Progress,
) -> Result<CrawlSummary>
where
    F: SchoolFetcher,
{
    let store = config.store();
    let fetcher = RateLimitedFetcher::new(config.clone(), fetcher).with_stop(stop.clone());

    let batch_size = config.batch_size();
    let total_batches = codes.len().div_ceil(batch_size);

    progress.begin(summary.total, summary.previously_processed);

    for (i, batch) in codes.chunks(batch_size).enumerate() {
        let batch_num = i + 1;
        if stop.is_stopped() {
            log::warn!("Interrupted before batch {batch_num}/{total_batches}");
            summary.interrupted = true;
            break;
        }

        log::info!(
            "Processing batch {batch_num}/{total_batches} ({} codes)",
            batch.len()
        );
        progress.batch(batch_num, total_batches, batch.len());

        let results =
            future::join_all(batch.iter().map(|code| fetcher.fetch_with_retry(code))).await;

        for result in results {
            let outcome = persist(&store, result)?;
            summary.attempted += 1;
            match outcome {
                ItemOutcome::Saved(_) => summary.succeeded += 1,
                ItemOutcome::Failed { .. } => summary.failed += 1,
            }
            progress.item(&outcome, &summary);
        }

        if batch_num < total_batches && !stop.is_stopped() {
            let delay = config.batch_delay();
            log::info!(
                "Waiting {:.2}s before next batch...",
                delay.as_secs_f64()
            );
            progress.waiting(delay);
            sleep(delay).await;
        }
    }

    log::info!(
        "Processing complete. Success: {}, Failed: {}",
        summary.succeeded,
        summary.failed
    );
    progress.finish(&summary);

    Ok(summary)
}

fn persist(store: &ResultStore, result: ScrapeResult) -> Result<ItemOutcome> {
    let ScrapeResult {
        ct_code,
        school_data,
        last_error,
        ..
    } = result;

    let href = school_data.and_then(|data| data.href);
    let record = href
        .as_deref()
        .and_then(|href| CoordRecord::from_maps_link(&ct_code, href));

    if let Some(record) = record {
        store.append_success(&record)?;
        log::info!("Saved result for {ct_code}: {}", record.coords());
        return Ok(ItemOutcome::Saved(record));
    }

    let error = last_error
        .or_else(|| href.map(|href| format!("No coordinates in link: {href}")))
        .unwrap_or_else(|| String::from("Unknown error"));
    let failed = store.append_failure(&ct_code, &error)?;

    Ok(ItemOutcome::Failed {
        ct_code: failed.ct_code,
        error: failed.error,
    })
}
