use std::sync::Arc;

use crate::item::Network;

/// Offers per page on both aggregator sites.
pub const PAGE_SIZE: u64 = 20;

/// Key a site uses to filter offer searches by network.
pub type NetworkKey = crate::item::RecordId;

/// A network found during discovery, with the offer count the site reports.
#[derive(Debug, Clone)]
pub struct DiscoveredNetwork {
    pub key: NetworkKey,
    pub network: Arc<Network>,
    pub num_offers: u64,
}

/// One page of offers to fetch for a network.
#[derive(Debug, Clone, PartialEq)]
pub struct PageTask {
    pub key: NetworkKey,
    pub network: Arc<Network>,
    /// 1-based page index.
    pub page: u64,
    pub num_pages: u64,
    pub num_offers: u64,
}

/// Number of pages to request for `total` items.
///
/// Always one more than the number of full pages, so an exact multiple of
/// `page_size` ends with an empty page and an empty network still gets one
/// request.
pub fn page_count(total: u64, page_size: u64) -> u64 {
    assert!(page_size > 0, "page_size must be positive");
    total / page_size + 1
}

/// Lazily yields a `PageTask` for every page of a discovered network.
pub fn plan_pages(discovered: &DiscoveredNetwork, page_size: u64) -> PagePlan {
    PagePlan {
        key: discovered.key.clone(),
        network: discovered.network.clone(),
        num_offers: discovered.num_offers,
        num_pages: page_count(discovered.num_offers, page_size),
        next_page: 1,
    }
}

#[derive(Debug, Clone)]
pub struct PagePlan {
    key: NetworkKey,
    network: Arc<Network>,
    num_offers: u64,
    num_pages: u64,
    next_page: u64,
}

impl PagePlan {
    pub fn num_pages(&self) -> u64 {
        self.num_pages
    }
}

impl Iterator for PagePlan {
    type Item = PageTask;

    fn next(&mut self) -> Option<PageTask> {
        if self.next_page > self.num_pages {
            return None;
        }
        let page = self.next_page;
        self.next_page += 1;
        Some(PageTask {
            key: self.key.clone(),
            network: self.network.clone(),
            page,
            num_pages: self.num_pages,
            num_offers: self.num_offers,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.num_pages + 1 - self.next_page) as usize;
        (left, Some(left))
    }
}

impl ExactSizeIterator for PagePlan {}
