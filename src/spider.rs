use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::downloader::Fetch;
use crate::error::{CrawlError, ExtractError};
use crate::item::{Network, Offer};
use crate::pagination::{self, DiscoveredNetwork, PagePlan, PageTask, PAGE_SIZE};
use crate::request::Request;

/// Maps one raw offer object of a site onto the common record.
pub type OfferMapper = fn(Value, &Arc<Network>) -> Result<Offer, ExtractError>;

/// Spider interface
///
/// A spider speaks one aggregator site's API: it lists the site's networks,
/// plans one request per page of each network's offers and maps the raw
/// offer objects onto [`Offer`]. Adding a site means adding a spider; the
/// engine never looks at site-specific shapes.
#[async_trait]
pub trait Spider: Send + Sync {
    /// Get spider name.
    ///
    /// This is used to route response to the correct spider and to name the
    /// output feed, so make sure that it's unique for each spider.
    fn name(&self) -> String;

    /// Domains this spider may send requests to. Subdomains are included.
    fn allowed_domains(&self) -> Vec<String>;

    /// Bootstrap request listing the site's networks.
    fn network_request(&self) -> Request;

    /// Extracts the networks, with their offer counts, from the bootstrap
    /// response.
    fn parse_networks(&self, body: &[u8]) -> Result<Vec<DiscoveredNetwork>, ExtractError>;

    /// Request for one page of a network's offers.
    fn page_request(&self, task: &PageTask) -> Request;

    /// Parses a page response into a lazy sequence of offers.
    fn parse_offers(&self, task: &PageTask, body: &[u8]) -> Result<OfferPage, ExtractError>;

    /// Fetches and parses the bootstrap request.
    async fn discover_networks(
        &self,
        fetcher: &dyn Fetch,
    ) -> Result<Vec<DiscoveredNetwork>, CrawlError> {
        let body = fetcher.fetch(&self.network_request()).await?;
        Ok(self.parse_networks(&body)?)
    }

    fn plan_pages(&self, network: &DiscoveredNetwork) -> PagePlan {
        pagination::plan_pages(network, PAGE_SIZE)
    }

    /// Fetches one page and returns its offers.
    async fn fetch_and_extract(
        &self,
        fetcher: &dyn Fetch,
        task: &PageTask,
    ) -> Result<OfferPage, CrawlError> {
        let body = fetcher.fetch(&self.page_request(task)).await?;
        Ok(self.parse_offers(task, &body)?)
    }
}

/// Decodes a response body and pulls out the array stored under `key`.
pub fn json_list(body: &[u8], key: &'static str) -> Result<Vec<Value>, ExtractError> {
    let mut doc: Value = serde_json::from_slice(body).map_err(ExtractError::Decode)?;
    let list = doc.get_mut(key).map(Value::take).unwrap_or(Value::Null);
    serde_json::from_value(list).map_err(|e| ExtractError::shape(key, None, e))
}

/// Offers of one page, mapped as they are pulled. A malformed offer yields
/// an error for that offer only.
pub struct OfferPage {
    raw: std::vec::IntoIter<Value>,
    network: Arc<Network>,
    map: OfferMapper,
}

impl OfferPage {
    pub fn new(raw: Vec<Value>, network: Arc<Network>, map: OfferMapper) -> Self {
        Self {
            raw: raw.into_iter(),
            network,
            map,
        }
    }
}

impl Iterator for OfferPage {
    type Item = Result<Offer, ExtractError>;

    fn next(&mut self) -> Option<Self::Item> {
        let raw = self.raw.next()?;
        Some((self.map)(raw, &self.network))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.raw.size_hint()
    }
}

impl ExactSizeIterator for OfferPage {}

/// Best-effort id of a raw object, for error reports.
pub(crate) fn raw_id(raw: &Value) -> Option<String> {
    raw_field(raw, "id")
}

/// Scalar `field` of a raw object rendered as text.
pub(crate) fn raw_field(raw: &Value, field: &str) -> Option<String> {
    match raw.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
