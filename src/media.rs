use std::path::{Path, PathBuf};
use std::time::Duration;

use fasthash::FastHash;
use fasthash::xx::Hash64;
use reqwest::Url;

use crate::error::MediaError;
use crate::item::{FileRecord, Offer};

/// Downloads offer images into a store directory and records them on the
/// offer before it is exported.
pub struct MediaPipeline {
    client: reqwest::Client,
    store: PathBuf,
}

impl MediaPipeline {
    pub fn new(
        store: PathBuf,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client, store })
    }

    pub fn store(&self) -> &Path {
        &self.store
    }

    /// Fills `offer.files` with every image that could be downloaded.
    pub async fn process(&self, offer: &mut Offer) {
        for url in &offer.file_urls {
            match self.download(url).await {
                Ok(record) => offer.files.push(record),
                Err(e) => log::warn!("offer {}: {}", offer.id, e),
            }
        }
    }

    async fn download(&self, url: &str) -> Result<FileRecord, MediaError> {
        let request_err = |source| MediaError::Request { url: url.to_owned(), source };
        let io_err = |source| MediaError::Io { url: url.to_owned(), source };

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(request_err)?;
        let mut body = vec![];
        while let Some(chunk) = response.chunk().await.map_err(request_err)? {
            body.extend_from_slice(&chunk);
        }

        let path = file_path(url);
        let full_path = self.store.join(&path);
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        tokio::fs::write(&full_path, &body).await.map_err(io_err)?;

        Ok(FileRecord {
            url: url.to_owned(),
            path,
            checksum: format!("{:016x}", Hash64::hash(&body)),
        })
    }
}

/// Store-relative path of an image: `full/<hash of url>.<ext>`.
fn file_path(url: &str) -> String {
    let ext = Url::parse(url)
        .ok()
        .and_then(|u| {
            let name = u.path_segments()?.last()?.to_owned();
            let (_, ext) = name.rsplit_once('.')?;
            Some(format!(".{}", ext))
        })
        .unwrap_or_default();
    format!("full/{:016x}{}", Hash64::hash(url.as_bytes()), ext)
}
