use std::time::Duration;

use crate::crawler::{CrawlSummary, ItemOutcome};

/// Receives crawl events so that frontends can show status to users.
pub trait Progress {
    /// Called once with the size of the code list and how many of them were
    /// already done by a previous run.
    fn begin(&mut self, _total: usize, _already_done: usize) {}

    fn batch(&mut self, _num: usize, _of: usize, _size: usize) {}

    /// Called after each code is persisted. `summary` holds the running counts.
    fn item(&mut self, _outcome: &ItemOutcome, _summary: &CrawlSummary) {}

    fn waiting(&mut self, _delay: Duration) {}

    fn finish(&mut self, _summary: &CrawlSummary) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl Progress for NullProgress {}
