use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use ctgeo_crawler::{
    crawl_codes, crawl_pending, retry_failed, CrawlSummary, CrawlerConfig, FetchError,
    ItemOutcome, NullProgress, Progress, RateLimitedFetcher, SchoolData, SchoolFetcher,
    StopSignal,
};
use tempfile::tempdir;
use tokio::time::{sleep, Instant};

const LINK: &str = "https://www.google.com/maps/place/19.4326,-99.1332";

#[derive(Debug, Clone)]
enum Reply {
    Link(&'static str),
    Missing,
    Hang,
}

#[derive(Default)]
struct ScriptedFetcher {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    fallback: Option<Reply>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedFetcher {
    fn new(replies: &[(&str, &[Reply])]) -> Self {
        Self {
            replies: Mutex::new(
                replies
                    .iter()
                    .map(|(code, r)| (code.to_string(), r.iter().cloned().collect()))
                    .collect(),
            ),
            ..Default::default()
        }
    }

    fn always(reply: Reply) -> Self {
        Self {
            fallback: Some(reply),
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl SchoolFetcher for ScriptedFetcher {
    async fn fetch(&self, ct_code: &str) -> SchoolData {
        self.calls.lock().unwrap().push(ct_code.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let reply = self
            .replies
            .lock()
            .unwrap()
            .get_mut(ct_code)
            .and_then(VecDeque::pop_front)
            .or_else(|| self.fallback.clone())
            .unwrap_or(Reply::Missing);

        sleep(Duration::from_millis(200)).await;

        match reply {
            Reply::Link(href) => SchoolData::found(
                ct_code,
                Some("Ver mapa".into()),
                Some(href.into()),
                Some("Ubicación".into()),
            ),
            Reply::Missing => SchoolData::failed(ct_code, &FetchError::ElementNotFound),
            Reply::Hang => {
                sleep(Duration::from_secs(3600)).await;
                SchoolData::failed(ct_code, &FetchError::ElementNotFound)
            }
        }
    }
}

fn config(dir: &Path) -> CrawlerConfig {
    CrawlerConfig {
        codes_file: dir.join("codes.txt"),
        output_file: dir.join("out.txt"),
        progress_file: dir.join("progress.txt"),
        failed_codes_file: dir.join("failed.txt"),
        log_file: dir.join("log.txt"),
        handle_sigint: false,
        retry_max_attempts: 2,
        ..Default::default()
    }
}

#[tokio::test(start_paused = true)]
async fn retries_until_success() {
    let conf = CrawlerConfig {
        retry_max_attempts: 3,
        ..Default::default()
    };
    let fetcher = ScriptedFetcher::new(&[(
        "AAA",
        &[Reply::Missing, Reply::Missing, Reply::Link(LINK)],
    )]);
    let limited = RateLimitedFetcher::new(conf, &fetcher);

    let start = Instant::now();
    let result = limited.fetch_with_retry("AAA").await;

    assert!(result.is_success());
    assert_eq!(result.attempts, 3);
    assert_eq!(result.last_error, None);
    assert_eq!(
        Some(LINK),
        result.school_data.as_ref().and_then(|d| d.href.as_deref())
    );
    // 1s then 2s of backoff, at least
    assert!(start.elapsed() >= Duration::from_secs(3));
    assert_eq!(fetcher.calls().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn gives_up_after_max_attempts() {
    let conf = CrawlerConfig {
        retry_max_attempts: 4,
        ..Default::default()
    };
    let fetcher = ScriptedFetcher::always(Reply::Missing);
    let limited = RateLimitedFetcher::new(conf, &fetcher);

    let result = limited.fetch_with_retry("BBB").await;

    assert!(!result.is_success());
    assert_eq!(result.attempts, 4);
    assert_eq!(result.school_data, None);
    assert_eq!(result.last_error.as_deref(), Some("Target element not found"));
    assert_eq!(fetcher.calls(), vec!["BBB"; 4]);
}

#[tokio::test(start_paused = true)]
async fn timeouts_are_retried_and_reported() {
    let conf = CrawlerConfig {
        retry_max_attempts: 2,
        attempt_timeout: 5.0,
        ..Default::default()
    };
    let fetcher = ScriptedFetcher::always(Reply::Hang);
    let limited = RateLimitedFetcher::new(conf, &fetcher);

    let result = limited.fetch_with_retry("CCC").await;

    assert_eq!(result.attempts, 2);
    let err = result.last_error.unwrap();
    assert!(err.starts_with("Timeout: "), "{err}");
    assert_eq!(fetcher.in_flight.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn limiter_bounds_in_flight_fetches() {
    let dir = tempdir().unwrap();
    let conf = CrawlerConfig {
        max_concurrent_requests: 2,
        batch_size: Some(6),
        ..config(dir.path())
    };
    fs::write(&conf.codes_file, "A1\nA2\nA3\nA4\nA5\nA6\n").unwrap();
    let fetcher = ScriptedFetcher::always(Reply::Link(LINK));

    let summary = crawl_pending(&conf, &fetcher, &mut NullProgress).await.unwrap();

    assert_eq!(summary.succeeded, 6);
    assert!(fetcher.max_in_flight.load(Ordering::SeqCst) <= 2);
    assert!(fetcher.max_in_flight.load(Ordering::SeqCst) >= 1);
}

#[tokio::test(start_paused = true)]
async fn rerun_skips_processed_codes() {
    let dir = tempdir().unwrap();
    let conf = config(dir.path());
    fs::write(&conf.codes_file, "AAA\nBBB\nCCC\nBBB\n").unwrap();
    fs::write(&conf.progress_file, format!("AAA-19.4326,-99.1332-{LINK}\n")).unwrap();

    let fetcher = ScriptedFetcher::new(&[("BBB", &[Reply::Link(LINK)])]);
    let summary = crawl_pending(&conf, &fetcher, &mut NullProgress).await.unwrap();

    assert_eq!(
        summary,
        CrawlSummary {
            total: 3,
            previously_processed: 1,
            attempted: 2,
            succeeded: 1,
            failed: 1,
            interrupted: false,
        }
    );
    assert!(!fetcher.calls().contains(&"AAA".to_string()));
    assert_eq!(
        format!("BBB-19.4326,-99.1332-{LINK}\n"),
        fs::read_to_string(&conf.output_file).unwrap()
    );
    let failed = fs::read_to_string(&conf.failed_codes_file).unwrap();
    assert!(failed.starts_with("CCC|Target element not found|"), "{failed}");

    // Second run only sees CCC
    let fetcher = ScriptedFetcher::always(Reply::Link(LINK));
    let summary = crawl_pending(&conf, &fetcher, &mut NullProgress).await.unwrap();
    assert_eq!(fetcher.calls(), vec!["CCC"]);
    assert_eq!(summary.previously_processed, 2);
    assert_eq!(summary.succeeded, 1);

    // Nothing left
    let fetcher = ScriptedFetcher::always(Reply::Link(LINK));
    let summary = crawl_pending(&conf, &fetcher, &mut NullProgress).await.unwrap();
    assert!(fetcher.calls().is_empty());
    assert_eq!(summary.previously_processed, 3);
    assert_eq!(summary.attempted, 0);
}

#[tokio::test(start_paused = true)]
async fn link_without_coordinates_is_a_failure() {
    let dir = tempdir().unwrap();
    let conf = config(dir.path());
    fs::write(&conf.codes_file, "AAA\n").unwrap();

    let fetcher = ScriptedFetcher::always(Reply::Link("https://www.google.com/maps/search/escuela"));
    let summary = crawl_pending(&conf, &fetcher, &mut NullProgress).await.unwrap();

    assert_eq!(summary.failed, 1);
    assert!(!conf.output_file.exists());
    assert!(!conf.progress_file.exists());
    let failed = fs::read_to_string(&conf.failed_codes_file).unwrap();
    assert!(
        failed.starts_with("AAA|No coordinates in link: https://www.google.com/maps/search/escuela|"),
        "{failed}"
    );
}

#[tokio::test(start_paused = true)]
async fn empty_code_list_does_nothing() {
    let dir = tempdir().unwrap();
    let conf = config(dir.path());
    fs::write(&conf.codes_file, "\n\n").unwrap();

    let fetcher = ScriptedFetcher::always(Reply::Link(LINK));
    let summary = crawl_pending(&conf, &fetcher, &mut NullProgress).await.unwrap();

    assert_eq!(summary, CrawlSummary::default());
    assert!(fetcher.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn missing_code_list_is_an_error() {
    let dir = tempdir().unwrap();
    let conf = config(dir.path());

    let fetcher = ScriptedFetcher::always(Reply::Link(LINK));
    assert!(crawl_pending(&conf, &fetcher, &mut NullProgress).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn retry_failed_archives_log_and_keeps_only_new_failures() {
    let dir = tempdir().unwrap();
    let conf = config(dir.path());
    let original = "AAA|Target element not found|2024-05-01T10:00:00.000000\n\
                    BBB|Timeout: deadline has elapsed|2024-05-01T10:00:01.000000\n\
                    AAA|Target element not found|2024-05-01T10:00:02.000000\n";
    fs::write(&conf.failed_codes_file, original).unwrap();

    let fetcher = ScriptedFetcher::new(&[("AAA", &[Reply::Link(LINK)])]);
    let summary = retry_failed(&conf, &fetcher, &mut NullProgress).await.unwrap();

    assert_eq!(summary.total, 2);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(fetcher.calls().iter().filter(|c| *c == "AAA").count(), 1);

    let bak = dir.path().join("failed.txt.bak");
    assert_eq!(original, fs::read_to_string(bak).unwrap());

    let failed = fs::read_to_string(&conf.failed_codes_file).unwrap();
    assert_eq!(failed.lines().count(), 1);
    assert!(failed.starts_with("BBB|Target element not found|"), "{failed}");
    assert!(fs::read_to_string(&conf.output_file)
        .unwrap()
        .starts_with("AAA-19.4326,-99.1332-"));
}

#[tokio::test(start_paused = true)]
async fn retry_failed_without_log_is_a_no_op() {
    let dir = tempdir().unwrap();
    let conf = config(dir.path());

    let fetcher = ScriptedFetcher::always(Reply::Link(LINK));
    let summary = retry_failed(&conf, &fetcher, &mut NullProgress).await.unwrap();

    assert_eq!(summary, CrawlSummary::default());
    assert!(fetcher.calls().is_empty());
}

#[derive(Default)]
struct Recorder {
    begin: Option<(usize, usize)>,
    batches: Vec<(usize, usize, usize)>,
    items: Vec<(String, bool, usize)>,
    waits: usize,
    finished: Option<CrawlSummary>,
}

impl Progress for Recorder {
    fn begin(&mut self, total: usize, already_done: usize) {
        self.begin = Some((total, already_done));
    }

    fn batch(&mut self, num: usize, of: usize, size: usize) {
        self.batches.push((num, of, size));
    }

    fn item(&mut self, outcome: &ItemOutcome, summary: &CrawlSummary) {
        self.items.push((
            outcome.ct_code().to_string(),
            matches!(outcome, ItemOutcome::Saved(_)),
            summary.done(),
        ));
    }

    fn waiting(&mut self, _delay: Duration) {
        self.waits += 1;
    }

    fn finish(&mut self, summary: &CrawlSummary) {
        self.finished = Some(*summary);
    }
}

#[tokio::test(start_paused = true)]
async fn progress_sees_batches_in_input_order() {
    let dir = tempdir().unwrap();
    let conf = CrawlerConfig {
        max_concurrent_requests: 2,
        ..config(dir.path())
    };
    fs::write(&conf.codes_file, "P0\nP1\nP2\nP3\nP4\n").unwrap();
    fs::write(&conf.progress_file, format!("P0-19.4326,-99.1332-{LINK}\n")).unwrap();

    let fetcher = ScriptedFetcher::new(&[
        ("P1", &[Reply::Link(LINK)]),
        ("P2", &[Reply::Missing, Reply::Link(LINK)]),
        ("P4", &[Reply::Link(LINK)]),
    ]);
    let mut recorder = Recorder::default();
    let summary = crawl_pending(&conf, &fetcher, &mut recorder).await.unwrap();

    assert_eq!(recorder.begin, Some((5, 1)));
    assert_eq!(recorder.batches, vec![(1, 2, 2), (2, 2, 2)]);
    assert_eq!(
        recorder.items,
        vec![
            ("P1".to_string(), true, 2),
            ("P2".to_string(), true, 3),
            ("P3".to_string(), false, 4),
            ("P4".to_string(), true, 5),
        ]
    );
    assert_eq!(recorder.waits, 1);
    assert_eq!(recorder.finished, Some(summary));
}

#[tokio::test(start_paused = true)]
async fn no_retry_starts_after_stop() {
    let conf = CrawlerConfig {
        retry_max_attempts: 3,
        ..Default::default()
    };
    let fetcher = ScriptedFetcher::always(Reply::Missing);
    let stop = StopSignal::new();
    stop.stop();
    let limited = RateLimitedFetcher::new(conf, &fetcher).with_stop(stop);

    let result = limited.fetch_with_retry("AAA").await;

    assert_eq!(result.attempts, 1);
    assert_eq!(result.last_error.as_deref(), Some("Target element not found"));
    assert_eq!(fetcher.calls(), vec!["AAA"]);
}

/// Raises the stop signal as soon as the first batch starts.
struct StopOnFirstBatch {
    stop: StopSignal,
    batches: Vec<usize>,
}

impl Progress for StopOnFirstBatch {
    fn batch(&mut self, num: usize, _of: usize, _size: usize) {
        self.batches.push(num);
        self.stop.stop();
    }
}

#[tokio::test(start_paused = true)]
async fn stop_finishes_running_batch_then_skips_the_rest() {
    let dir = tempdir().unwrap();
    let conf = CrawlerConfig {
        max_concurrent_requests: 3,
        retry_max_attempts: 3,
        ..config(dir.path())
    };
    let codes = ["S1", "S2", "S3", "S4", "S5"]
        .map(String::from)
        .to_vec();
    let fetcher = ScriptedFetcher::new(&[
        ("S1", &[Reply::Link(LINK)]),
        ("S2", &[Reply::Missing, Reply::Link(LINK)]),
        ("S3", &[Reply::Link(LINK)]),
        ("S4", &[Reply::Link(LINK)]),
        ("S5", &[Reply::Link(LINK)]),
    ]);
    let stop = StopSignal::new();
    let mut progress = StopOnFirstBatch {
        stop: stop.clone(),
        batches: vec![],
    };
    let start = CrawlSummary {
        total: codes.len(),
        ..Default::default()
    };

    let summary = crawl_codes(&conf, &fetcher, codes, start, &stop, &mut progress)
        .await
        .unwrap();

    assert_eq!(
        summary,
        CrawlSummary {
            total: 5,
            previously_processed: 0,
            attempted: 3,
            succeeded: 2,
            failed: 1,
            interrupted: true,
        }
    );
    assert_eq!(progress.batches, vec![1]);

    let mut calls = fetcher.calls();
    calls.sort();
    assert_eq!(calls, vec!["S1", "S2", "S3"]);

    let output = fs::read_to_string(&conf.output_file).unwrap();
    assert_eq!(
        output,
        format!("S1-19.4326,-99.1332-{LINK}\nS3-19.4326,-99.1332-{LINK}\n")
    );
    let failed = fs::read_to_string(&conf.failed_codes_file).unwrap();
    assert!(failed.starts_with("S2|Target element not found|"), "{failed}");
}
