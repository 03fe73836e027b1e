use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::{generate, Shell};
use ctgeo::config::{AppConfig, ConfigArgs};
use ctgeo::logging;
use ctgeo::report::{print_school_data, truncate};
use ctgeo_crawler::{CrawlerConfig, SchoolFetcher};
use ctgeo_scraper::{parse_school_page, parse_selector, HttpFetcher};
use ctgeo_store::{
    check_progress, export_csv, extract_codes, load_failed, merge_results, reset_files,
    write_codes, ResetMode, ResetOutcome, DEFAULT_CODE_COLUMN,
};
use tokio::runtime;

/// Inspect and maintain the files written by ctgeo
#[derive(Debug, Parser)]
#[command(version)]
pub struct Args {
    #[command(flatten)]
    pub config: ConfigArgs,
    #[command(subcommand)]
    pub cmd: SubCommand,
}

#[derive(Debug, clap::Subcommand)]
pub enum SubCommand {
    /// Check current scraping progress
    Progress,
    /// List failed CT codes
    Failed {
        /// How many entries to show
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Reset all progress, keeping timestamped backups
    Reset,
    /// Reset all progress without backups
    ResetHard,
    /// Merge result files, keeping the first line seen for each code
    Merge {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long, short, default_value = "merged_results.txt")]
        output: PathBuf,
    },
    /// Export coordinates to CSV
    Csv {
        /// Defaults to the configured results file
        #[arg(long, short)]
        input: Option<PathBuf>,
        #[arg(long, short, default_value = "coordinates.csv")]
        output: PathBuf,
    },
    /// Extract the CT codes of a metadata CSV into a code list
    Extract {
        csv: PathBuf,
        /// Defaults to the configured code list file
        #[arg(long, short)]
        output: Option<PathBuf>,
        #[arg(long, default_value = DEFAULT_CODE_COLUMN)]
        column: String,
    },
    /// Fetch a single CT code and print what was found
    Fetch {
        code: String,
        /// A local html page to parse instead of downloading
        #[arg(long)]
        file: Option<PathBuf>,
    },
    #[command(hide = true)]
    Completion,
}

fn progress(conf: &CrawlerConfig) -> Result<()> {
    match check_progress(&conf.progress_file)? {
        Some(stats) => {
            println!("\n📊 Scraping Progress:");
            println!("  Total processed: {}", stats.total_processed);
            println!("  Unique codes: {}", stats.unique_codes);
            println!("  Coordinates found: {}", stats.coordinates_found);
        }
        None => println!("Progress file not found: {}", conf.progress_file.display()),
    }
    Ok(())
}

fn failed(conf: &CrawlerConfig, limit: usize) -> Result<()> {
    let failed = load_failed(&conf.failed_codes_file)?;
    if failed.is_empty() {
        println!("✅ No failed codes found!");
        return Ok(());
    }

    println!("\n❌ Failed Codes ({} total):", failed.len());
    for rec in failed.iter().take(limit) {
        println!(
            "  {}: {}... [{}]",
            rec.ct_code,
            truncate(&rec.error, 50),
            truncate(&rec.timestamp, 19)
        );
    }
    if failed.len() > limit {
        println!("  ... and {} more", failed.len() - limit);
    }
    Ok(())
}

fn reset(conf: &CrawlerConfig, mode: ResetMode) -> Result<()> {
    for outcome in reset_files(&conf.tracked_files(), mode)? {
        match outcome {
            ResetOutcome::BackedUp { kind, to, .. } => {
                println!("✅ Backed up {kind} to: {}", to.display())
            }
            ResetOutcome::Deleted { kind, path } => {
                println!("✅ Deleted {kind}: {}", path.display())
            }
            ResetOutcome::Missing { kind, path } => {
                println!("ℹ️ {kind} file not found: {}", path.display())
            }
        }
    }
    println!("\n✨ Progress reset complete!");
    Ok(())
}

fn fetch(conf: &AppConfig, code: &str, file: Option<PathBuf>) -> Result<()> {
    let data = match file {
        Some(path) => {
            let page = fs_err::read_to_string(path)?;
            let selector = parse_selector(&conf.fetcher.selector)?;
            parse_school_page(code, &page, &selector)
        }
        None => {
            let fetcher = HttpFetcher::new(conf.fetcher.clone())?;
            let rt = runtime::Builder::new_current_thread().enable_all().build()?;
            rt.block_on(fetcher.fetch(code))
        }
    };
    print_school_data(&data);
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(false, None)?;

    let conf = AppConfig::try_from(&args.config)?;
    let crawler = &conf.crawler;

    match args.cmd {
        SubCommand::Progress => progress(crawler),
        SubCommand::Failed { limit } => failed(crawler, limit),
        SubCommand::Reset => reset(crawler, ResetMode::Backup),
        SubCommand::ResetHard => reset(crawler, ResetMode::Delete),
        SubCommand::Merge { files, output } => {
            let count = merge_results(&files, &output)?;
            println!("✅ Merged {count} unique results to: {}", output.display());
            Ok(())
        }
        SubCommand::Csv { input, output } => {
            let input = input.unwrap_or_else(|| crawler.output_file.clone());
            match export_csv(&input, &output)? {
                0 => println!("No coordinates found to export."),
                n => println!("✅ Exported {n} coordinates to: {}", output.display()),
            }
            Ok(())
        }
        SubCommand::Extract {
            csv,
            output,
            column,
        } => {
            let output = output.unwrap_or_else(|| crawler.codes_file.clone());
            let codes = extract_codes(&csv, &column)?;
            write_codes(&output, &codes)?;
            println!(
                "Extracted {} {column} values to {}",
                codes.len(),
                output.display()
            );
            Ok(())
        }
        SubCommand::Fetch { code, file } => fetch(&conf, &code, file),
        SubCommand::Completion => {
            generate(Shell::Bash, &mut Args::command(), "ctgeo-utils", &mut io::stdout());
            Ok(())
        }
    }
}
