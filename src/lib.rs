mod config;
mod downloader;
mod engine;
mod feed;
mod media;
mod spider;
mod stats;
mod util;

pub mod adapters;
pub mod error;
pub mod item;
pub mod pagination;
pub mod request;
pub mod scheduler;

// (Re) Exports
pub use config::Config;
pub use downloader::{Downloader, Fetch};
pub use engine::Engine;
pub use feed::FeedExporter;
pub use scheduler::{Scheduler, SchedulerItem};
pub use spider::{json_list, OfferMapper, OfferPage, Spider};
pub use stats::CrawlSummary;

use scheduler::mempq::MempqScheduler;

pub fn engine_with_config(
    config: Config,
    spiders: Vec<Box<dyn Spider + Send + Sync>>,
) -> Engine<MempqScheduler> {
    Engine::new(config, MempqScheduler::new(), spiders)
}
