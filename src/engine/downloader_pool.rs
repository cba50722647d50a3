use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use fasthash::FastHash;
use fasthash::xx::Hash64;
use rand::{RngCore, SeedableRng};
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::{Config, util};
use crate::downloader::Downloader;

/// Spreads requests over the downloaders while pinning each host to
/// `concurrent_requests_per_domain` of them, so per-host politeness holds
/// whatever the global concurrency.
#[derive(Clone)]
pub struct DownloaderPool {
    config: Arc<Config>,
    inner: Arc<Mutex<DownloaderPoolInner>>,
}

struct DownloaderPoolInner {
    downloaders: Vec<Arc<Downloader>>,
    domain_downloaders: HashMap<String, Vec<usize>>,
}

impl DownloaderPool {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            inner: Arc::new(Mutex::new(DownloaderPoolInner {
                downloaders: vec![],
                domain_downloaders: HashMap::new(),
            }))
        }
    }

    pub fn start(&self, stop_tx: broadcast::Sender<()>) -> Vec<JoinHandle<()>> {
        let mut join_handles = vec![];
        let mut inner = self.inner.lock().unwrap();
        log::debug!("concurrent requests: {}", self.config.concurrent_requests);
        for _ in 0..self.config.concurrent_requests {
            let mut downloader = Downloader::new(self.config.clone());
            join_handles.append(&mut downloader.start(stop_tx.clone()));
            inner.downloaders.push(Arc::new(downloader));
        }
        join_handles
    }

    /// Returns `None` until the pool is started.
    pub fn get_downloader(&self, url: &str) -> Option<Arc<Downloader>> {
        let mut rng = rand::thread_rng();
        let mut inner = self.inner.lock().unwrap();
        if inner.downloaders.is_empty() {
            return None;
        }

        let host = match util::get_host(url) {
            Some(host) if self.config.concurrent_requests_per_domain > 0 => host,
            // Concurrent requests per domain is disabled, simply choose from
            // all downloaders
            _ => return inner.downloaders.choose(&mut rng).cloned(),
        };

        if !inner.domain_downloaders.contains_key(&host) {
            let indices = pick_indices(
                &host,
                self.config.concurrent_requests_per_domain as usize,
                inner.downloaders.len(),
            );
            inner.domain_downloaders.insert(host.clone(), indices);
        }

        let idx = *inner.domain_downloaders.get(&host)?.choose(&mut rng)?;
        inner.downloaders.get(idx).cloned()
    }
}

/// Deterministically picks `count` distinct downloader indices for a host.
fn pick_indices(host: &str, count: usize, num_downloaders: usize) -> Vec<usize> {
    let count = count.min(num_downloaders);
    let seed = Hash64::hash(host.as_bytes());
    let mut cha_rng = ChaCha8Rng::seed_from_u64(seed);
    let mut indices = vec![];
    while indices.len() < count {
        let idx = cha_rng.next_u32() as usize % num_downloaders;
        if !indices.contains(&idx) {
            indices.push(idx);
        }
    }
    indices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_are_stable_and_distinct() {
        let a = pick_indices("offervault.com", 3, 8);
        assert_eq!(a, pick_indices("offervault.com", 3, 8));
        assert_eq!(a.len(), 3);
        let mut sorted = a.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), 3);
        assert!(a.iter().all(|i| *i < 8));
    }

    #[test]
    fn never_asks_for_more_than_available() {
        assert_eq!(pick_indices("affplus.com", 4, 2).len(), 2);
    }

    #[tokio::test]
    async fn host_is_pinned_to_one_downloader() {
        let config = Config {
            concurrent_requests: 4,
            concurrent_requests_per_domain: 1,
            ..Default::default()
        };
        let pool = DownloaderPool::new(Arc::new(config));
        assert!(pool.get_downloader("https://affplus.com/_search").is_none());

        let (stop_tx, _) = broadcast::channel(1);
        let handles = pool.start(stop_tx.clone());
        assert_eq!(handles.len(), 4);

        let first = pool.get_downloader("https://affplus.com/_search").unwrap();
        for _ in 0..10 {
            let same_host = pool.get_downloader("https://affplus.com/x").unwrap();
            assert!(Arc::ptr_eq(&first, &same_host));
        }

        stop_tx.send(()).unwrap();
        for h in handles {
            h.await.unwrap();
        }
    }
}
