use std::io::{self, IsTerminal, Write};
use std::time::Duration;

use ctgeo_crawler::{CrawlSummary, ItemOutcome, Progress, SchoolData};

const BAR_WIDTH: usize = 50;

pub fn progress_bar(done: usize, total: usize, ok: usize, failed: usize) -> String {
    let ratio = if total > 0 {
        (done as f64 / total as f64).min(1.0)
    } else {
        0.0
    };
    let filled = (ratio * BAR_WIDTH as f64) as usize;
    format!(
        "[{}{}] {:.1}% | {done}/{total} | ✅ {ok} | ❌ {failed}",
        "█".repeat(filled),
        "░".repeat(BAR_WIDTH - filled),
        ratio * 100.0,
    )
}

/// Terminal frontend: one line per code and a progress bar redrawn in place
/// when stdout is a terminal.
#[derive(Debug)]
pub struct TermProgress {
    tty: bool,
    bar_shown: bool,
}

impl Default for TermProgress {
    fn default() -> Self {
        Self {
            tty: io::stdout().is_terminal(),
            bar_shown: false,
        }
    }
}

impl TermProgress {
    fn line(&mut self, msg: &str) {
        if self.bar_shown {
            print!("\r\x1b[2K");
            self.bar_shown = false;
        }
        println!("{msg}");
    }
}

impl Progress for TermProgress {
    fn begin(&mut self, total: usize, already_done: usize) {
        self.line(&format!(
            "Found {total} total codes, {already_done} already processed"
        ));
        self.line(&format!(
            "Processing {} remaining codes...",
            total.saturating_sub(already_done)
        ));
    }

    fn batch(&mut self, num: usize, of: usize, size: usize) {
        self.line(&format!("\n📦 Batch {num}/{of} ({size} codes)"));
    }

    fn item(&mut self, outcome: &ItemOutcome, summary: &CrawlSummary) {
        match outcome {
            ItemOutcome::Saved(record) => {
                self.line(&format!("  ✅ {} - Saved {}", record.ct_code, record.coords()))
            }
            ItemOutcome::Failed { ct_code, error } => {
                self.line(&format!("  ❌ {ct_code} - Failed: {error}"))
            }
        }

        let bar = progress_bar(
            summary.done(),
            summary.total,
            summary.previously_processed + summary.succeeded,
            summary.failed,
        );
        if self.tty {
            print!("{bar}");
            io::stdout().flush().ok();
            self.bar_shown = true;
        } else {
            println!("{bar}");
        }
    }

    fn waiting(&mut self, delay: Duration) {
        self.line(&format!(
            "⏳ Waiting {:.2}s before next batch...",
            delay.as_secs_f64()
        ));
    }

    fn finish(&mut self, _summary: &CrawlSummary) {
        if self.bar_shown {
            println!();
            self.bar_shown = false;
        }
    }
}

pub fn print_summary(summary: &CrawlSummary, output: &str, failed: &str, progress: &str) {
    let rule = "=".repeat(60);
    println!("\n{rule}");
    println!("📊 FINAL SUMMARY");
    println!("{rule}");
    println!("✅ Successfully processed: {} new codes", summary.succeeded);
    println!("📝 Previously processed: {} codes", summary.previously_processed);
    println!(
        "✅ Total successful: {}/{}",
        summary.succeeded + summary.previously_processed,
        summary.total
    );
    println!("❌ Failed: {} codes", summary.failed);
    if summary.interrupted {
        println!("⚠️  Interrupted, run again to resume");
    }
    println!("📁 Results saved to: {output}");
    println!("📋 Failed codes logged to: {failed}");
    println!("📊 Progress tracked in: {progress}");
    println!("{rule}");
}

pub fn print_school_data(data: &SchoolData) {
    let rule = "=".repeat(50);
    println!("{rule}");
    println!("CT Code: {}", data.ct_code);
    println!("Success: {}", data.success);
    if data.success {
        println!("Text: {}", data.text.as_deref().unwrap_or("-"));
        println!("Href: {}", data.href.as_deref().unwrap_or("-"));
        println!("Title: {}", data.title.as_deref().unwrap_or("-"));
    } else {
        println!(
            "Error: {}",
            data.error_message.as_deref().unwrap_or("Unknown error")
        );
    }
    println!("{rule}");
}

/// Cuts `s` to at most `max` characters.
pub fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_fills_proportionally() {
        let bar = progress_bar(5, 10, 4, 1);
        assert!(bar.starts_with(&format!("[{}{}]", "█".repeat(25), "░".repeat(25))));
        assert!(bar.ends_with("50.0% | 5/10 | ✅ 4 | ❌ 1"));
        assert!(progress_bar(0, 0, 0, 0).contains("0.0% | 0/0"));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("Ubicación no encontrada", 8), "Ubicació");
        assert_eq!(truncate("short", 50), "short");
    }
}
