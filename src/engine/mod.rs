use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{Local, NaiveDate};
use tokio::sync::broadcast;

mod downloader_pool;
mod guard_robot;
mod processing_task;
mod reporting_task;
mod thread_state;

use crate::Config;
use crate::error::EngineError;
use crate::feed::FeedExporter;
use crate::item::Item;
use crate::media::MediaPipeline;
use crate::request::Request;
use crate::scheduler::{DEFAULT_PRIORITY, Scheduler, SchedulerItem};
use crate::spider::Spider;
use crate::stats::{CrawlSummary, Stats};
use crate::util;

use downloader_pool::DownloaderPool;
use guard_robot::GuardRobot;
use processing_task::start_processing_thread;
use reporting_task::start_reporting_thread;
use thread_state::ThreadState;

type SharedSpider = Arc<dyn Spider + Send + Sync>;

// Note that since `config`, `spiders`, and the downloaders are read-only after
// initialization, they don't need to be protected by mutex.
struct EngineState<Sched>
where
    Sched: Scheduler + Send,
{
    config: Arc<Config>,
    scheduler: Mutex<Sched>,
    spiders: HashMap<String, SharedSpider>,
    allowed_domains: HashMap<String, Vec<String>>,
    downloader_pool: DownloaderPool,
    guard_robot: GuardRobot,
    thread_state: ThreadState,
    feeds: HashMap<String, Mutex<FeedExporter>>,
    media: HashMap<String, MediaPipeline>,

    stats: Stats,
}

impl<Sched> EngineState<Sched>
where
    Sched: Scheduler + Send,
{
    fn new(
        config: Config,
        scheduler: Sched,
        spiders: Vec<Box<dyn Spider + Send + Sync>>,
        run_date: NaiveDate,
    ) -> Result<Self, EngineError> {
        let config = Arc::new(config);
        let mut spiders_: HashMap<String, SharedSpider> = HashMap::new();
        let mut allowed_domains = HashMap::new();
        let mut feeds = HashMap::new();
        let mut media = HashMap::new();
        for spider in spiders {
            let name = spider.name();
            if spiders_.contains_key(&name) {
                return Err(EngineError::DuplicateSpider(name));
            }

            let feed = FeedExporter::open(&config.output_dir, &name, run_date)?;
            log::info!("[{}] writing items to {}", name, feed.path().display());
            feeds.insert(name.clone(), Mutex::new(feed));

            if config.download_media {
                let store = config.output_dir.join(format!("{}-images", name));
                let pipeline = MediaPipeline::new(
                    store,
                    &config.bot_name,
                    Duration::from_secs(config.download_timeout),
                )?;
                log::info!("[{}] storing images in {}", name, pipeline.store().display());
                media.insert(name.clone(), pipeline);
            }

            allowed_domains.insert(name.clone(), spider.allowed_domains());
            spiders_.insert(name, Arc::from(spider));
        }
        Ok(Self {
            config: config.clone(),
            scheduler: Mutex::new(scheduler),
            spiders: spiders_,
            allowed_domains,
            downloader_pool: DownloaderPool::new(config.clone()),
            guard_robot: GuardRobot::new(config.clone()),
            thread_state: ThreadState::new(config.concurrent_requests as usize),
            feeds,
            media,
            stats: Stats::new(),
        })
    }

    /// Queues a request unless it is off-site, forbidden by robots.txt or a
    /// duplicate. Returns whether it was queued.
    fn schedule(&self, spider_name: &str, request: Request, priority: u8) -> bool {
        let domains = self
            .allowed_domains
            .get(spider_name)
            .map(Vec::as_slice)
            .unwrap_or_default();
        if util::is_offsite(&request.url, domains) {
            log::warn!("[{}] filtered offsite request to {}", spider_name, request.url);
            return false;
        }
        if !self.guard_robot.is_allowed(&request.url) {
            log::warn!("[{}] forbidden by robots.txt: {}", spider_name, request.url);
            return false;
        }

        let item = SchedulerItem {
            spider_name: spider_name.to_owned(),
            request,
            priority,
        };
        self.scheduler.lock().unwrap().enqueue_item(spider_name, item)
    }

    fn export(&self, spider_name: &str, item: &Item) {
        let Some(feed) = self.feeds.get(spider_name) else {
            return;
        };
        let mut feed = feed.lock().unwrap();
        match feed.export(item) {
            Ok(()) => {
                if let Item::Offer(_) = item {
                    self.stats.incr_total_processed();
                }
            }
            Err(e) => {
                self.stats.incr_total_faults();
                log::error!(
                    "[{}] cannot write to {}: {}",
                    spider_name,
                    feed.path().display(),
                    e
                );
            }
        }
    }

    fn flush_feeds(&self) -> Result<(), EngineError> {
        for (name, feed) in self.feeds.iter() {
            let mut feed = feed.lock().unwrap();
            feed.flush()?;
            log::info!("[{}] {} items written to {}", name, feed.exported(), feed.path().display());
        }
        Ok(())
    }
}

/// Polite crawl driver.
///
/// Requests go through a single queue and are fetched by
/// `concurrent_requests` workers, each waiting `download_delay` between
/// requests to the same downloader.
pub struct Engine<Sched>
where
    Sched: Scheduler + Send,
{
    config: Config,
    scheduler: Sched,
    spiders: Vec<Box<dyn Spider + Send + Sync>>,
}

impl<Sched> Engine<Sched>
where
    Sched: 'static + Scheduler + Send,
{
    pub fn new(
        config: Config,
        scheduler: Sched,
        spiders: Vec<Box<dyn Spider + Send + Sync>>,
    ) -> Self {
        Self { config, scheduler, spiders }
    }

    /// Runs the crawl to completion (or until Ctrl-C) and returns its totals.
    /// Items written before a stop stay in the feeds.
    pub async fn start(self) -> Result<CrawlSummary, EngineError> {
        self.start_on(Local::now().date_naive()).await
    }

    /// Like [`Engine::start`], naming the feeds after `run_date`.
    pub async fn start_on(self, run_date: NaiveDate) -> Result<CrawlSummary, EngineError> {
        self.config.sanity_check()?;
        if self.spiders.is_empty() {
            return Err(EngineError::NoSpiders);
        }
        let num_workers = self.config.concurrent_requests;
        let state = Arc::new(EngineState::new(
            self.config,
            self.scheduler,
            self.spiders,
            run_date,
        )?);

        let (stop_tx, _) = broadcast::channel::<()>(32);
        let tx = stop_tx.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            log::info!("Stopping, waiting for in-flight requests");
            let _ = tx.send(());
        }) {
            log::warn!("Ctrl-C handler not installed: {}", e);
        }

        let downloader_handles = state.downloader_pool.start(stop_tx.clone());

        // Spiders stay on their bootstrap host, so its robots.txt is all the
        // workers need.
        for spider in state.spiders.values() {
            state.guard_robot.prefetch(&spider.network_request().url).await;
        }

        // Puts each spider's bootstrap request to scheduler
        for (name, spider) in state.spiders.iter() {
            if !state.schedule(name, spider.network_request(), DEFAULT_PRIORITY) {
                state.stats.incr_total_faults();
                log::error!("[{}] bootstrap request was not scheduled", name);
            }
        }

        let reporting_handle = start_reporting_thread(state.clone(), stop_tx.clone());

        let mut worker_handles = vec![];
        for i in 0..num_workers {
            worker_handles.push(start_processing_thread(
                i + 1,
                state.clone(),
                stop_tx.clone(),
            ));
        }
        for h in worker_handles {
            h.await?;
        }

        // Workers are done; release the downloaders and the reporter.
        let _ = stop_tx.send(());
        for h in downloader_handles {
            h.await?;
        }
        reporting_handle.await?;

        state.flush_feeds()?;
        let summary = state.stats.summary();
        log::info!(
            "Exit gracefully: {} pages, {} networks, {} offers, {} faults",
            summary.pages_crawled,
            summary.networks_discovered,
            summary.offers_exported,
            summary.faults,
        );
        Ok(summary)
    }
}
