use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use netwatch::adapters::{self, SPIDER_NAMES};
use netwatch::{Config, Spider};

#[derive(Debug, Parser)]
#[command(name = "netwatch")]
#[command(about = "Maps affiliate networks and their offers from aggregator sites")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the names of the bundled spiders
    List,
    /// Crawl the given sites, or every bundled one when none is given
    Crawl(CrawlArgs),
}

#[derive(Debug, clap::Args)]
struct CrawlArgs {
    /// Spiders to run
    spiders: Vec<String>,
    /// Directory the feeds are written to
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
    /// Seconds to wait between requests to the same site
    #[arg(long, default_value = "1.0")]
    download_delay: f32,
    /// Number of requests in flight at once
    #[arg(long, default_value = "1")]
    concurrent_requests: u32,
    /// Don't fetch or obey robots.txt
    #[arg(long)]
    ignore_robots: bool,
    /// Download offer images next to the feeds
    #[arg(long)]
    download_media: bool,
    /// Also write each network as its own record
    #[arg(long)]
    export_networks: bool,
    /// Alternative AffPlus API host
    #[arg(long)]
    affplus_url: Option<String>,
    /// Alternative OfferVault API host
    #[arg(long)]
    offervault_url: Option<String>,
}

impl CrawlArgs {
    fn config(&self) -> Config {
        Config {
            concurrent_requests: self.concurrent_requests,
            concurrent_requests_per_domain: self.concurrent_requests.min(1),
            download_delay: self.download_delay,
            robotstxt_obey: !self.ignore_robots,
            output_dir: self.output_dir.clone(),
            export_networks: self.export_networks,
            download_media: self.download_media,
            ..Default::default()
        }
    }

    fn spiders(&self) -> Result<Vec<Box<dyn Spider + Send + Sync>>, Box<dyn Error>> {
        let names: Vec<&str> = if self.spiders.is_empty() {
            SPIDER_NAMES.to_vec()
        } else {
            self.spiders.iter().map(String::as_str).collect()
        };

        let mut spiders = vec![];
        for name in names {
            let base_url = match name {
                adapters::affplus::NAME => self.affplus_url.as_deref(),
                adapters::offervault::NAME => self.offervault_url.as_deref(),
                _ => None,
            };
            match adapters::spider_by_name(name, base_url) {
                Some(spider) => spiders.push(spider),
                None => {
                    return Err(format!(
                        "unknown spider {:?}, expected one of: {}",
                        name,
                        SPIDER_NAMES.join(", ")
                    )
                    .into())
                }
            }
        }
        Ok(spiders)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::List => {
            for name in SPIDER_NAMES {
                println!("{}", name);
            }
        }
        Commands::Crawl(args) => {
            let spiders = args.spiders()?;
            let summary = netwatch::engine_with_config(args.config(), spiders)
                .start()
                .await?;
            println!(
                "crawl complete: pages={} networks={} offers={} faults={}",
                summary.pages_crawled,
                summary.networks_discovered,
                summary.offers_exported,
                summary.faults
            );
        }
    }

    Ok(())
}
