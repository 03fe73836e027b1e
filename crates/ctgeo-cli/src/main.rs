use anyhow::Result;
use clap::Parser;
use ctgeo::config::{AppConfig, ConfigArgs};
use ctgeo::logging;
use ctgeo::report::{print_summary, TermProgress};
use ctgeo_crawler::{crawl_pending, retry_failed};
use ctgeo_scraper::HttpFetcher;
use tokio::runtime;

/// Fetch school locations for a list of CT codes, resuming where the last run stopped
#[derive(Debug, Parser)]
#[command(version)]
pub struct Args {
    /// Retry the codes of the failed codes file instead of the code list
    #[arg(long)]
    pub retry_failed: bool,
    #[command(flatten)]
    pub config: ConfigArgs,
    /// Override the maximum number of concurrent requests
    #[arg(long)]
    pub max_concurrent: Option<usize>,
    /// Override the number of attempts per code
    #[arg(long)]
    pub max_attempts: Option<u32>,
    /// Override the URL the CT code is appended to
    #[arg(long)]
    pub base_url: Option<String>,
    /// Override the user agent
    #[arg(long)]
    pub user_agent: Option<String>,
    /// No SIGINT handling, Ctrl-C stops immediately
    #[arg(long)]
    pub no_sigint: bool,
    /// When quiet only warnings and errors are logged
    #[arg(long, short)]
    pub quiet: bool,
}

impl TryFrom<&Args> for AppConfig {
    type Error = anyhow::Error;

    fn try_from(args: &Args) -> Result<Self, Self::Error> {
        let mut conf = AppConfig::try_from(&args.config)?;
        if let Some(max_concurrent) = args.max_concurrent {
            conf.crawler.max_concurrent_requests = max_concurrent;
        }
        if let Some(max_attempts) = args.max_attempts {
            conf.crawler.retry_max_attempts = max_attempts;
        }
        if let Some(base_url) = &args.base_url {
            conf.fetcher.base_url = base_url.to_string();
        }
        if let Some(user_agent) = &args.user_agent {
            conf.fetcher.user_agent = user_agent.to_string();
        }
        if args.no_sigint {
            conf.crawler.handle_sigint = false;
        }
        conf.crawler.validate()?;
        conf.fetcher.validate()?;
        Ok(conf)
    }
}

async fn run(conf: AppConfig, retry: bool) -> Result<()> {
    let crawler = &conf.crawler;
    let fetcher = HttpFetcher::new(conf.fetcher.clone())?;
    let mut progress = TermProgress::default();

    println!("🚀 Advanced School Scraper");
    println!("{}", "=".repeat(60));

    log::info!(
        "Starting {} run, fetching from {}",
        if retry { "retry" } else { "scrape" },
        conf.fetcher.base_url
    );

    if retry {
        let summary = retry_failed(crawler, &fetcher, &mut progress).await?;
        if summary.total == 0 {
            println!(
                "No failed codes to retry in {}",
                crawler.failed_codes_file.display()
            );
        } else {
            println!("\n📊 Retry Summary:");
            println!(
                "✅ Successfully recovered: {}/{}",
                summary.succeeded, summary.total
            );
            println!("❌ Still failing: {}", summary.failed);
        }
    } else {
        println!("Configuration:");
        println!("  - Max concurrent requests: {}", crawler.max_concurrent_requests);
        println!("  - Retry attempts: {}", crawler.retry_max_attempts);
        println!(
            "  - Batch delay: {}-{}s",
            crawler.batch_delay_min, crawler.batch_delay_max
        );
        println!("  - Output file: {}", crawler.output_file.display());
        println!("  - Progress tracking: {}", crawler.progress_file.display());
        println!("  - Failed codes log: {}\n", crawler.failed_codes_file.display());

        let summary = crawl_pending(crawler, &fetcher, &mut progress).await?;
        if summary.total > 0 && summary.attempted == 0 && !summary.interrupted {
            println!("All {} codes have already been processed.", summary.total);
        } else {
            print_summary(
                &summary,
                &crawler.output_file.display().to_string(),
                &crawler.failed_codes_file.display().to_string(),
                &crawler.progress_file.display().to_string(),
            );
        }
    }

    log::info!("Run finished");
    println!("\n✨ All operations completed!");
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let conf = AppConfig::try_from(&args)?;
    logging::init(args.quiet, Some(conf.crawler.log_file.as_path()))?;

    let rt = runtime::Builder::new_multi_thread().enable_all().build()?;
    rt.block_on(run(conf, args.retry_failed))
}
