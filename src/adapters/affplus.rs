//! AffPlus.com spider.
//!
//! AffPlus serves networks and offers from one search endpoint. The
//! bootstrap search returns the network facet (`networks[].key` and
//! `doc_count`), and each page search filters on a single network key.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ExtractError;
use crate::item::{Network, Offer, Payout, RecordId};
use crate::pagination::{DiscoveredNetwork, PageTask};
use crate::request::{Callback, Request};
use crate::spider::{json_list, raw_field, raw_id, OfferPage, Spider};
use crate::util;

use super::{trim_base_url, TextOrNumber};

pub const NAME: &str = "affplus";
pub const BASE_URL: &str = "https://affplus.com";

const OFFER_URL: &str = "https://affplus.com/o";
const IMAGE_URL: &str = "https://apimg.net/offers/l";

// NOTE Order is relevant
const HEADERS: &[(&str, &str)] = &[
    ("authority", "www.affplus.com"),
    ("pragma", "no-cache"),
    ("cache-control", "no-cache"),
    ("sec-ch-ua", "\" Not;A Brand\";v=\"99\", \"Google Chrome\";v=\"91\", \"Chromium\";v=\"91\""),
    ("accept", "application/json, text/plain, */*"),
    ("dnt", "1"),
    ("sec-ch-ua-mobile", "?0"),
    ("user-agent", "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.114 Safari/537.36"),
    ("content-type", "application/json;charset=UTF-8"),
    ("origin", "https://www.affplus.com"),
    ("sec-fetch-site", "same-origin"),
    ("sec-fetch-mode", "cors"),
    ("sec-fetch-dest", "empty"),
    ("referer", "https://www.affplus.com/"),
    ("accept-language", "en-US,en;q=0.9"),
];

/// Search body. Field order is the order the site's own client sends.
#[derive(Serialize)]
struct Search<'a> {
    query: &'a str,
    page: u64,
    networks: Vec<String>,
    countries: Vec<String>,
    verticals: Vec<String>,
    sort: &'a str,
}

impl<'a> Search<'a> {
    fn page(page: u64, networks: Vec<String>) -> Self {
        Self {
            query: "",
            page,
            networks,
            countries: vec![],
            verticals: vec![],
            sort: "relevance",
        }
    }

    fn to_body(&self) -> String {
        serde_json::to_string(self).expect("search body is always serializable")
    }
}

#[derive(Deserialize)]
struct NetworkBucket {
    key: RecordId,
    doc_count: u64,
}

impl NetworkBucket {
    fn from_raw(raw: Value) -> Result<Self, ExtractError> {
        let key = raw_field(&raw, "key");
        serde_json::from_value(raw).map_err(|e| ExtractError::shape("network", key, e))
    }
}

#[derive(Deserialize)]
struct RawOffer {
    id: RecordId,
    slug: String,
    thumbnail_token: String,
    title: String,
    description: Option<String>,
    price: TextOrNumber,
    currency: String,
    payout_type: Option<String>,
    ocates: Option<Vec<String>>,
    ocountries: Option<Vec<String>>,
    preview_url: Option<String>,
    created_at: Option<String>,
    updated_at: Option<String>,
}

pub struct AffPlus {
    base_url: String,
}

impl AffPlus {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        Self { base_url: trim_base_url(base_url) }
    }

    fn search_url(&self) -> String {
        format!("{}/_search", self.base_url)
    }
}

impl Default for AffPlus {
    fn default() -> Self {
        Self::new()
    }
}

impl Spider for AffPlus {
    fn name(&self) -> String {
        NAME.to_owned()
    }

    fn allowed_domains(&self) -> Vec<String> {
        util::get_host(&self.base_url).into_iter().collect()
    }

    fn network_request(&self) -> Request {
        let body = Search::page(1, vec![]).to_body();
        Request::post(self.search_url(), body, Callback::Networks).with_headers(HEADERS)
    }

    fn parse_networks(&self, body: &[u8]) -> Result<Vec<DiscoveredNetwork>, ExtractError> {
        let mut discovered = vec![];
        for raw in json_list(body, "networks")? {
            let bucket = match NetworkBucket::from_raw(raw) {
                Ok(bucket) => bucket,
                Err(e) => {
                    log::warn!("[{}] skipping network: {}", NAME, e);
                    continue;
                }
            };
            log::debug!(
                "Found affiliate network {} with {} offers",
                bucket.key,
                bucket.doc_count
            );
            // The facet only exposes the key; everything else stays unset.
            let network = Network {
                name: Some(bucket.key.to_string()),
                ..Default::default()
            };
            discovered.push(DiscoveredNetwork {
                key: bucket.key,
                network: Arc::new(network),
                num_offers: bucket.doc_count,
            });
        }
        Ok(discovered)
    }

    fn page_request(&self, task: &PageTask) -> Request {
        let body = Search::page(task.page, vec![task.key.to_string()]).to_body();
        Request::post(self.search_url(), body, Callback::Offers(task.clone())).with_headers(HEADERS)
    }

    fn parse_offers(&self, task: &PageTask, body: &[u8]) -> Result<OfferPage, ExtractError> {
        let hits = json_list(body, "hits")?;
        log::debug!(
            "Found {} offers on page {} of {}",
            hits.len(),
            task.page,
            task.num_pages
        );
        Ok(OfferPage::new(hits, task.network.clone(), map_offer))
    }
}

fn map_offer(raw: Value, network: &Arc<Network>) -> Result<Offer, ExtractError> {
    let id = raw_id(&raw);
    let raw: RawOffer =
        serde_json::from_value(raw).map_err(|e| ExtractError::shape("offer", id, e))?;

    Ok(Offer {
        offer_url: format!("{}/{}", OFFER_URL, raw.slug),
        file_urls: vec![format!("{}/{}.jpg", IMAGE_URL, raw.thumbnail_token)],
        id: raw.id,
        name: raw.title,
        description: raw.description,
        network: network.clone(),
        payout: Some(Payout::Text(format!("{}{}", raw.price, raw.currency))),
        categories: raw.ocates,
        payout_type: raw.payout_type,
        countries: raw.ocountries,
        landing_page_url: raw.preview_url,
        files: vec![],
        last_updated: raw.updated_at,
        created_at: raw.created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const OFFER: &str = r#"{
        "id": "ab12",
        "slug": "keto-trial",
        "thumbnail_token": "tok9",
        "title": "Keto Trial",
        "description": "Diet offer",
        "price": "35.00",
        "currency": "USD",
        "payout_type": "CPA",
        "ocates": ["Health"],
        "ocountries": ["US", "CA"],
        "preview_url": "http://lp.test/keto",
        "created_at": "2021-05-01 10:00:00",
        "updated_at": "2021-06-01 10:00:00"
    }"#;

    fn task() -> PageTask {
        PageTask {
            key: RecordId::from("MaxBounty"),
            network: Arc::new(Network {
                name: Some("MaxBounty".to_owned()),
                ..Default::default()
            }),
            page: 2,
            num_pages: 3,
            num_offers: 45,
        }
    }

    #[test]
    fn bootstrap_body_matches_site_client() {
        let request = AffPlus::new().network_request();
        assert_eq!(request.url, "https://affplus.com/_search");
        assert_eq!(request.method, crate::request::Method::Post);
        assert_eq!(
            request.body.as_deref(),
            Some(r#"{"query":"","page":1,"networks":[],"countries":[],"verticals":[],"sort":"relevance"}"#)
        );
        assert_eq!(request.headers[0], ("authority".to_owned(), "www.affplus.com".to_owned()));
        assert_eq!(request.callback, Callback::Networks);
    }

    #[test]
    fn page_body_filters_by_network_key() {
        let request = AffPlus::new().page_request(&task());
        assert_eq!(
            request.body.as_deref(),
            Some(r#"{"query":"","page":2,"networks":["MaxBounty"],"countries":[],"verticals":[],"sort":"relevance"}"#)
        );
        assert_eq!(request.callback, Callback::Offers(task()));
    }

    #[test]
    fn networks_come_from_the_facet() {
        let body = br#"{"networks":[{"key":"MaxBounty","doc_count":45},{"key":"CPAlead","doc_count":0}]}"#;
        let networks = AffPlus::new().parse_networks(body).unwrap();
        assert_eq!(networks.len(), 2);
        assert_eq!(networks[0].key, RecordId::from("MaxBounty"));
        assert_eq!(networks[0].num_offers, 45);
        assert_eq!(networks[0].network.name.as_deref(), Some("MaxBounty"));
        assert_eq!(networks[0].network.id, None);
        assert_eq!(networks[0].network.email, None);
        assert_eq!(networks[1].num_offers, 0);
    }

    #[test]
    fn malformed_network_bucket_is_skipped() {
        let body = br#"{"networks":[{"key":"A"},{"key":"B","doc_count":3}]}"#;
        let networks = AffPlus::new().parse_networks(body).unwrap();
        assert_eq!(networks.len(), 1);
        assert_eq!(networks[0].key, RecordId::from("B"));

        let err = NetworkBucket::from_raw(serde_json::json!({"key": "A"})).err().unwrap();
        assert!(matches!(
            &err,
            ExtractError::Shape { what: "network", id: Some(id), .. } if id == "A"
        ));
        assert!(err.to_string().contains("(id A)"));
    }

    #[test]
    fn maps_hit_onto_offer() {
        let body = format!(r#"{{"hits":[{}]}}"#, OFFER);
        let task = task();
        let offers: Vec<Offer> = AffPlus::new()
            .parse_offers(&task, body.as_bytes())
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(offers.len(), 1);
        let offer = &offers[0];
        assert_eq!(offer.id, RecordId::from("ab12"));
        assert_eq!(offer.name, "Keto Trial");
        assert_eq!(offer.payout, Some(Payout::Text("35.00USD".to_owned())));
        assert_eq!(offer.payout_type.as_deref(), Some("CPA"));
        assert_eq!(offer.categories, Some(vec!["Health".to_owned()]));
        assert_eq!(offer.countries, Some(vec!["US".to_owned(), "CA".to_owned()]));
        assert_eq!(offer.landing_page_url.as_deref(), Some("http://lp.test/keto"));
        assert_eq!(offer.offer_url, "https://affplus.com/o/keto-trial");
        assert_eq!(offer.file_urls, vec!["https://apimg.net/offers/l/tok9.jpg"]);
        assert_eq!(offer.created_at.as_deref(), Some("2021-05-01 10:00:00"));
        assert_eq!(offer.last_updated.as_deref(), Some("2021-06-01 10:00:00"));
        assert!(Arc::ptr_eq(&offer.network, &task.network));
    }

    #[test]
    fn numeric_price_is_concatenated_too() {
        let raw = serde_json::json!({
            "id": 5, "slug": "s", "thumbnail_token": "t", "title": "x",
            "price": 2.5, "currency": "EUR"
        });
        let offer = map_offer(raw, &Arc::new(Network::default())).unwrap();
        assert_eq!(offer.payout, Some(Payout::Text("2.5EUR".to_owned())));
        assert_eq!(offer.categories, None);
        assert_eq!(offer.countries, None);
        let value = serde_json::to_value(&offer).unwrap();
        assert!(value.get("categories").is_none());
    }

    #[test]
    fn offer_without_thumbnail_is_a_shape_fault() {
        let raw = serde_json::json!({
            "id": 5, "slug": "s", "title": "x", "price": "1", "currency": "USD"
        });
        let err = map_offer(raw, &Arc::new(Network::default())).unwrap_err();
        match err {
            ExtractError::Shape { what, id, .. } => {
                assert_eq!(what, "offer");
                assert_eq!(id.as_deref(), Some("5"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
