//! Site-specific spiders.
//!
//! Each module holds one aggregator site's request shapes and its mapping
//! from raw API objects onto the shared [`Offer`](crate::item::Offer) and
//! [`Network`](crate::item::Network) records.

pub mod affplus;
pub mod offervault;

use serde::Deserialize;

pub use affplus::AffPlus;
pub use offervault::OfferVault;

use crate::item::Payout;
use crate::Spider;

/// Names of the bundled spiders.
pub const SPIDER_NAMES: &[&str] = &[affplus::NAME, offervault::NAME];

/// Builds a bundled spider by name, optionally against another API host.
pub fn spider_by_name(
    name: &str,
    base_url: Option<&str>,
) -> Option<Box<dyn Spider + Send + Sync>> {
    match name {
        affplus::NAME => {
            let spider = match base_url {
                Some(url) => AffPlus::with_base_url(url),
                None => AffPlus::new(),
            };
            Some(Box::new(spider))
        }
        offervault::NAME => {
            let spider = match base_url {
                Some(url) => OfferVault::with_base_url(url),
                None => OfferVault::new(),
            };
            Some(Box::new(spider))
        }
        _ => None,
    }
}

/// A JSON scalar that may come as text or as a number.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum TextOrNumber {
    Text(String),
    Number(serde_json::Number),
}

impl std::fmt::Display for TextOrNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextOrNumber::Text(s) => f.write_str(s),
            TextOrNumber::Number(n) => write!(f, "{}", n),
        }
    }
}

impl TextOrNumber {
    /// Numbers stay amounts, text is kept as the site wrote it.
    pub(crate) fn into_payout(self) -> Payout {
        match self {
            TextOrNumber::Text(s) => Payout::Text(s),
            TextOrNumber::Number(n) => match n.as_f64() {
                Some(amount) => Payout::Amount(amount),
                None => Payout::Text(n.to_string()),
            },
        }
    }
}

fn trim_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_owned()
}
