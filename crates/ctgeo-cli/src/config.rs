use std::path::{Path, PathBuf};

use anyhow::Result;
use ctgeo_crawler::CrawlerConfig;
use ctgeo_scraper::FetcherConfig;
use serde::{Deserialize, Serialize};

/// Content of the yaml configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
}

impl AppConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Ok(serde_yaml::from_reader(fs_err::File::open(path)?)?),
            None => Ok(Self::default()),
        }
    }
}

#[derive(Debug, clap::Args)]
pub struct ConfigArgs {
    /// Optional yaml configuration file with `crawler` and `fetcher` sections
    #[arg(env = "CTGEO_CONFIG", long)]
    pub config: Option<PathBuf>,
    /// Override the code list file
    #[arg(long)]
    pub codes_file: Option<PathBuf>,
    /// Override the results file
    #[arg(long)]
    pub output_file: Option<PathBuf>,
    /// Override the progress file
    #[arg(long)]
    pub progress_file: Option<PathBuf>,
    /// Override the failed codes file
    #[arg(long)]
    pub failed_file: Option<PathBuf>,
    /// Override the log file
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl TryFrom<&ConfigArgs> for AppConfig {
    type Error = anyhow::Error;

    fn try_from(args: &ConfigArgs) -> Result<Self, Self::Error> {
        let mut conf = AppConfig::load(args.config.as_deref())?;
        let crawler = &mut conf.crawler;
        if let Some(path) = &args.codes_file {
            crawler.codes_file = path.clone();
        }
        if let Some(path) = &args.output_file {
            crawler.output_file = path.clone();
        }
        if let Some(path) = &args.progress_file {
            crawler.progress_file = path.clone();
        }
        if let Some(path) = &args.failed_file {
            crawler.failed_codes_file = path.clone();
        }
        if let Some(path) = &args.log_file {
            crawler.log_file = path.clone();
        }
        Ok(conf)
    }
}
