use fasthash::FastHash;
use fasthash::xx::Hash64;

use crate::pagination::PageTask;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// What the response of a request feeds into.
#[derive(Debug, Clone, PartialEq)]
pub enum Callback {
    Networks,
    Offers(PageTask),
}

/// An HTTP request built by a spider.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    /// Sent in this order.
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub callback: Callback,
}

impl Request {
    pub fn get(url: impl Into<String>, callback: Callback) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: vec![],
            body: None,
            callback,
        }
    }

    pub fn post(url: impl Into<String>, body: String, callback: Callback) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            headers: vec![],
            body: Some(body),
            callback,
        }
    }

    pub fn with_headers(mut self, headers: &[(&str, &str)]) -> Self {
        self.headers = headers
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Identifies the request for duplicate filtering. Offer searches share
    /// a URL, so the body is part of the identity.
    pub fn fingerprint(&self) -> u64 {
        let mut key = Vec::with_capacity(self.url.len() + 16);
        key.extend_from_slice(self.method.as_str().as_bytes());
        key.push(b' ');
        key.extend_from_slice(self.url.as_bytes());
        if let Some(body) = &self.body {
            key.push(b'\n');
            key.extend_from_slice(body.as_bytes());
        }
        Hash64::hash(&key)
    }
}
