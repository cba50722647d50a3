use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};

/// Totals reported at the end of a crawl.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub pages_crawled: u64,
    pub networks_discovered: u64,
    pub offers_exported: u64,
    pub faults: u64,
}

pub struct Stats {
    total_crawled: AtomicU64,
    total_networks: AtomicU64,
    total_processed: AtomicU64,
    total_faults: AtomicU64,
    start_time: DateTime<Utc>,
}

impl Stats {
    pub fn new() -> Self {
        Self {
            total_crawled: AtomicU64::new(0),
            total_networks: AtomicU64::new(0),
            total_processed: AtomicU64::new(0),
            total_faults: AtomicU64::new(0),
            start_time: Utc::now(),
        }
    }

    pub fn incr_total_crawled(&self) {
        self.total_crawled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_total_networks(&self, value: u64) {
        self.total_networks.fetch_add(value, Ordering::Relaxed);
    }

    pub fn incr_total_processed(&self) {
        self.total_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_total_faults(&self) {
        self.total_faults.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_crawled(&self) -> u64 {
        self.total_crawled.load(Ordering::Relaxed)
    }

    pub fn total_processed(&self) -> u64 {
        self.total_processed.load(Ordering::Relaxed)
    }

    pub fn crawled_per_minute(&self) -> u64 {
        per_minute(self.total_crawled(), self.elapsed_time())
    }

    pub fn processed_per_minute(&self) -> u64 {
        per_minute(self.total_processed(), self.elapsed_time())
    }

    /// Elapsed time for this crawl in seconds
    pub fn elapsed_time(&self) -> i64 {
        (Utc::now() - self.start_time).num_seconds()
    }

    pub fn summary(&self) -> CrawlSummary {
        CrawlSummary {
            pages_crawled: self.total_crawled(),
            networks_discovered: self.total_networks.load(Ordering::Relaxed),
            offers_exported: self.total_processed(),
            faults: self.total_faults.load(Ordering::Relaxed),
        }
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

fn per_minute(count: u64, elapsed_secs: i64) -> u64 {
    let elapsed = (elapsed_secs / 60) as u64;
    if elapsed > 0 {
        count / elapsed
    } else {
        0
    }
}
