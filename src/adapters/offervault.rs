//! OfferVault.com spider.
//!
//! OfferVault has a dedicated network listing carrying contact details and
//! payment terms, and an offer search filtered by numeric network id.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ExtractError;
use crate::item::{Network, Offer, Payout, RecordId};
use crate::pagination::{DiscoveredNetwork, PageTask};
use crate::request::{Callback, Request};
use crate::spider::{json_list, raw_id, OfferPage, Spider};
use crate::util;

use super::{trim_base_url, TextOrNumber};

pub const NAME: &str = "offervault";
pub const BASE_URL: &str = "https://offervault.com";

const OFFER_URL: &str = "https://offervault.com/offer";
const IMAGE_URL: &str = "https://d2m96w2vdeemru.cloudfront.net";

// NOTE Order is relevant
const HEADERS: &[(&str, &str)] = &[
    ("authority", "offervault.com"),
    ("pragma", "no-cache"),
    ("cache-control", "no-cache"),
    ("accept", "application/json, text/plain, */*"),
    ("dnt", "1"),
    ("site-identifier", "offervault"),
    ("sec-ch-ua-mobile", "?0"),
    ("content-type", "application/json;charset=UTF-8"),
    ("origin", "https://offervault.com"),
    ("sec-fetch-site", "same-origin"),
    ("sec-fetch-mode", "cors"),
    ("sec-fetch-dest", "empty"),
    ("referer", "https://offervault.com/?selectedTab=topOffers&search=&page=1"),
    ("accept-language", "en-US,en;q=0.9"),
];

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OfferSearch<'a> {
    query: &'a str,
    page: u64,
    sort_by: &'a str,
    sort_desc: bool,
    networks: Vec<&'a RecordId>,
    countries: Vec<String>,
    categories: Vec<String>,
    ppc: bool,
    mobile: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNetwork {
    id: RecordId,
    name: Option<String>,
    offer_count: u64,
    description: Option<String>,
    url: Option<String>,
    email_string: Option<String>,
    phone_numbers_string: Option<String>,
    minimum_payment: Option<Value>,
    commission_types: Option<Value>,
    payment_frequencies: Option<Value>,
    payment_methods: Option<Value>,
}

impl RawNetwork {
    fn into_network(self) -> Network {
        Network {
            id: Some(self.id),
            name: self.name,
            description: self.description,
            url: self.url,
            min_payout: self.minimum_payment,
            commission_type: self.commission_types,
            payment_frequency: self.payment_frequencies,
            payment_method: self.payment_methods,
            email: self.email_string,
            phone: self.phone_numbers_string,
            rating: None,
            tracker: None,
        }
    }
}

#[derive(Deserialize)]
struct RawOffer {
    id: RecordId,
    slug: String,
    title: String,
    description: Option<String>,
    #[serde(rename = "usdAmount")]
    usd_amount: Option<TextOrNumber>,
    #[serde(rename = "payoutType")]
    payout_type: Option<String>,
    categories: Option<Vec<String>>,
    countries: Option<Vec<String>>,
    #[serde(rename = "previewUrl")]
    preview_url: Option<String>,
    created_at: Option<String>,
    updated_at: Option<String>,
}

pub struct OfferVault {
    base_url: String,
}

impl OfferVault {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        Self { base_url: trim_base_url(base_url) }
    }
}

impl Default for OfferVault {
    fn default() -> Self {
        Self::new()
    }
}

impl Spider for OfferVault {
    fn name(&self) -> String {
        NAME.to_owned()
    }

    fn allowed_domains(&self) -> Vec<String> {
        util::get_host(&self.base_url).into_iter().collect()
    }

    fn network_request(&self) -> Request {
        let url = format!("{}/api/networks?site={}", self.base_url, NAME);
        Request::get(url, Callback::Networks).with_headers(HEADERS)
    }

    fn parse_networks(&self, body: &[u8]) -> Result<Vec<DiscoveredNetwork>, ExtractError> {
        let networks = json_list(body, "networks")?;
        log::debug!("Found {} affiliate networks", networks.len());

        let mut discovered = vec![];
        for raw in networks {
            let id = raw_id(&raw);
            let network: RawNetwork = match serde_json::from_value(raw) {
                Ok(network) => network,
                Err(e) => {
                    log::warn!("[{}] skipping network: {}", NAME, ExtractError::shape("network", id, e));
                    continue;
                }
            };
            log::debug!(
                "Found affiliate network {} with {} offers",
                network.id,
                network.offer_count
            );
            discovered.push(DiscoveredNetwork {
                key: network.id.clone(),
                num_offers: network.offer_count,
                network: Arc::new(network.into_network()),
            });
        }
        Ok(discovered)
    }

    fn page_request(&self, task: &PageTask) -> Request {
        let search = OfferSearch {
            query: "",
            page: task.page,
            sort_by: "",
            sort_desc: false,
            networks: vec![&task.key],
            countries: vec![],
            categories: vec![],
            ppc: false,
            mobile: false,
        };
        let body = serde_json::to_string(&search).expect("search body is always serializable");
        let url = format!("{}/api/offers/search", self.base_url);
        Request::post(url, body, Callback::Offers(task.clone())).with_headers(HEADERS)
    }

    fn parse_offers(&self, task: &PageTask, body: &[u8]) -> Result<OfferPage, ExtractError> {
        let offers = json_list(body, "offers")?;
        log::debug!(
            "Found {} offers on page {} of {}",
            offers.len(),
            task.page,
            task.num_pages
        );
        Ok(OfferPage::new(offers, task.network.clone(), map_offer))
    }
}

fn map_offer(raw: Value, network: &Arc<Network>) -> Result<Offer, ExtractError> {
    let id = raw_id(&raw);
    let raw: RawOffer =
        serde_json::from_value(raw).map_err(|e| ExtractError::shape("offer", id, e))?;

    Ok(Offer {
        offer_url: format!("{}/{}/{}", OFFER_URL, raw.id, raw.slug),
        file_urls: vec![format!("{}/{}/large.jpeg", IMAGE_URL, raw.id)],
        id: raw.id,
        name: raw.title,
        description: raw.description,
        network: network.clone(),
        payout: raw.usd_amount.map(TextOrNumber::into_payout),
        categories: raw.categories,
        payout_type: raw.payout_type,
        countries: raw.countries,
        landing_page_url: raw.preview_url,
        files: vec![],
        last_updated: raw.updated_at,
        created_at: raw.created_at,
    })
}
