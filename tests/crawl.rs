//! End-to-end crawls against mock aggregator APIs.
//!
//! Each test points the bundled spiders at a wiremock server, runs the
//! engine without delays and reads back the feeds it wrote.

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use netwatch::adapters::{AffPlus, OfferVault};
use netwatch::{Config, CrawlSummary, Spider};

fn run_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

fn test_config(dir: &Path) -> Config {
    Config {
        concurrent_requests: 2,
        concurrent_requests_per_domain: 1,
        download_delay: 0.0,
        randomize_download_delay: false,
        download_timeout: 5,
        robotstxt_obey: false,
        output_dir: dir.to_owned(),
        ..Default::default()
    }
}

async fn crawl(config: Config, spiders: Vec<Box<dyn Spider + Send + Sync>>) -> CrawlSummary {
    netwatch::engine_with_config(config, spiders)
        .start_on(run_date())
        .await
        .unwrap()
}

fn read_feed(dir: &Path, spider: &str) -> Vec<Value> {
    let text = fs::read_to_string(dir.join(format!("{}-20261019.json", spider))).unwrap();
    text.lines().map(|line| serde_json::from_str(line).unwrap()).collect()
}

fn ov_offer(id: u64) -> Value {
    json!({
        "id": id,
        "slug": format!("offer-{}", id),
        "title": format!("Offer {}", id),
        "usdAmount": 2.5,
        "payoutType": "CPA",
        "categories": ["finance"],
        "countries": ["US"],
    })
}

fn ov_networks() -> Value {
    json!({"networks": [
        {"id": 12, "name": "Acme Ads", "offerCount": 21, "emailString": "ops@acme.test"},
        {"id": 13, "name": "Quiet", "offerCount": 0},
    ]})
}

async fn mount_ov_networks(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/networks"))
        .and(query_param("site", "offervault"))
        .and(header("site-identifier", "offervault"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ov_networks()))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_ov_page(server: &MockServer, network: u64, page: u64, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/api/offers/search"))
        .and(body_partial_json(json!({"networks": [network], "page": page})))
        .respond_with(response)
        .expect(1)
        .mount(server)
        .await;
}

fn offers(list: Vec<Value>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "offers": list }))
}

#[tokio::test(flavor = "multi_thread")]
async fn offervault_crawl_writes_every_offer_once() {
    let server = MockServer::start().await;
    mount_ov_networks(&server).await;
    mount_ov_page(&server, 12, 1, offers(vec![ov_offer(1), ov_offer(2)])).await;
    mount_ov_page(&server, 12, 2, offers(vec![ov_offer(3)])).await;
    mount_ov_page(&server, 13, 1, offers(vec![])).await;

    let dir = TempDir::new().unwrap();
    let spiders: Vec<Box<dyn Spider + Send + Sync>> =
        vec![Box::new(OfferVault::with_base_url(&server.uri()))];
    let summary = crawl(test_config(dir.path()), spiders).await;

    assert_eq!(
        summary,
        CrawlSummary {
            pages_crawled: 4,
            networks_discovered: 2,
            offers_exported: 3,
            faults: 0,
        }
    );

    let mut feed = read_feed(dir.path(), "offervault");
    feed.sort_by_key(|offer| offer["id"].as_u64());
    let ids: Vec<u64> = feed.iter().filter_map(|offer| offer["id"].as_u64()).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    for offer in &feed {
        assert_eq!(offer["network"]["id"], 12);
        assert_eq!(offer["network"]["name"], "Acme Ads");
        assert_eq!(offer["network"]["email"], "ops@acme.test");
        assert_eq!(offer["payout"], 2.5);
        assert_eq!(offer["type"], "CPA");
    }
    assert_eq!(feed[0]["offer_url"], "https://offervault.com/offer/1/offer-1");
}

#[tokio::test(flavor = "multi_thread")]
async fn broken_page_only_loses_itself() {
    let server = MockServer::start().await;
    mount_ov_networks(&server).await;
    mount_ov_page(
        &server,
        12,
        1,
        ResponseTemplate::new(200).set_body_string("<html>try again later</html>"),
    )
    .await;
    // One malformed offer next to a good one.
    mount_ov_page(&server, 12, 2, offers(vec![json!({"id": 9, "slug": "x"}), ov_offer(3)])).await;
    mount_ov_page(&server, 13, 1, ResponseTemplate::new(503)).await;

    let dir = TempDir::new().unwrap();
    let spiders: Vec<Box<dyn Spider + Send + Sync>> =
        vec![Box::new(OfferVault::with_base_url(&server.uri()))];
    let summary = crawl(test_config(dir.path()), spiders).await;

    assert_eq!(summary.offers_exported, 1);
    assert_eq!(summary.faults, 3);
    assert_eq!(summary.pages_crawled, 2);

    let feed = read_feed(dir.path(), "offervault");
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0]["id"], 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_discovery_stops_only_that_spider() {
    let affplus = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/_search"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&affplus)
        .await;

    let offervault = MockServer::start().await;
    mount_ov_networks(&offervault).await;
    mount_ov_page(&offervault, 12, 1, offers(vec![ov_offer(1)])).await;
    mount_ov_page(&offervault, 12, 2, offers(vec![])).await;
    mount_ov_page(&offervault, 13, 1, offers(vec![])).await;

    let dir = TempDir::new().unwrap();
    let spiders: Vec<Box<dyn Spider + Send + Sync>> = vec![
        Box::new(AffPlus::with_base_url(&affplus.uri())),
        Box::new(OfferVault::with_base_url(&offervault.uri())),
    ];
    let summary = crawl(test_config(dir.path()), spiders).await;

    assert_eq!(summary.faults, 1);
    assert_eq!(summary.offers_exported, 1);
    assert!(read_feed(dir.path(), "affplus").is_empty());
    assert_eq!(read_feed(dir.path(), "offervault").len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn affplus_crawl_pages_each_network_facet() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/_search"))
        .and(body_string(
            r#"{"query":"","page":1,"networks":[],"countries":[],"verticals":[],"sort":"relevance"}"#,
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hits": [],
            "networks": [{"key": "Acme", "doc_count": 1}],
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/_search"))
        .and(body_partial_json(json!({"networks": ["Acme"], "page": 1})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"hits": [{
            "id": "a1",
            "slug": "acme-offer",
            "thumbnail_token": "tok",
            "title": "Acme Offer",
            "price": "2.50",
            "currency": "$",
            "payout_type": "CPS",
            "ocates": ["retail"],
            "ocountries": ["DE"],
        }]})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = Config {
        export_networks: true,
        ..test_config(dir.path())
    };
    let spiders: Vec<Box<dyn Spider + Send + Sync>> =
        vec![Box::new(AffPlus::with_base_url(&server.uri()))];
    let summary = crawl(config, spiders).await;

    assert_eq!(summary.pages_crawled, 2);
    assert_eq!(summary.networks_discovered, 1);
    assert_eq!(summary.offers_exported, 1);
    assert_eq!(summary.faults, 0);

    let feed = read_feed(dir.path(), "affplus");
    assert_eq!(feed.len(), 2);
    assert_eq!(feed[0], json!({"name": "Acme"}));
    let offer = &feed[1];
    assert_eq!(offer["id"], "a1");
    assert_eq!(offer["payout"], "2.50$");
    assert_eq!(offer["offer_url"], "https://affplus.com/o/acme-offer");
    assert_eq!(offer["file_urls"], json!(["https://apimg.net/offers/l/tok.jpg"]));
    assert_eq!(offer["network"], json!({"name": "Acme"}));
}

#[tokio::test(flavor = "multi_thread")]
async fn robots_txt_keeps_pages_out_of_the_queue() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /api/offers/\n"),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_ov_networks(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/offers/search"))
        .respond_with(offers(vec![ov_offer(1)]))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = Config {
        robotstxt_obey: true,
        ..test_config(dir.path())
    };
    let spiders: Vec<Box<dyn Spider + Send + Sync>> =
        vec![Box::new(OfferVault::with_base_url(&server.uri()))];
    let summary = crawl(config, spiders).await;

    assert_eq!(summary.pages_crawled, 1);
    assert_eq!(summary.networks_discovered, 2);
    assert_eq!(summary.offers_exported, 0);
    assert!(read_feed(dir.path(), "offervault").is_empty());
}

#[tokio::test]
async fn rejects_invalid_config_before_crawling() {
    let dir = TempDir::new().unwrap();
    let config = Config {
        concurrent_requests: 0,
        ..test_config(dir.path())
    };
    let spiders: Vec<Box<dyn Spider + Send + Sync>> = vec![Box::new(OfferVault::new())];
    let err = netwatch::engine_with_config(config, spiders)
        .start_on(run_date())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        netwatch::error::EngineError::Config(netwatch::error::ConfigError::NoConcurrency)
    ));
}
