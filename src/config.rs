use std::path::PathBuf;

use crate::error::ConfigError;

pub struct Config {
    /// Bot name matched against robots.txt user-agent groups
    pub bot_name: String,
    /// User agents rotated over requests that don't set their own
    pub user_agents: Vec<String>,
    /// The maximum number of concurrent requests that will be performed by
    /// the downloader
    pub concurrent_requests: u32,
    /// The maximum number of concurrent requests that will be performed to
    /// any single domain. A value of 0 means that this setting will be
    /// ignored.
    pub concurrent_requests_per_domain: u32,
    /// The amount of time (in secs) that the downloader should wait before
    /// downloading consecutive pages from the same website.
    pub download_delay: f32,
    /// Wait a random 0.5x to 1.5x of `download_delay` instead of the exact
    /// value.
    pub randomize_download_delay: bool,
    /// Request timeout in secs.
    pub download_timeout: u64,
    /// If enabled, robots.txt policies are respected.
    pub robotstxt_obey: bool,
    /// Directory feeds (and media stores) are written to.
    pub output_dir: PathBuf,
    /// Also write each discovered network as a standalone record.
    pub export_networks: bool,
    /// Download offer images into `<output_dir>/<spider>-images/`.
    pub download_media: bool,
}

impl Config {
    pub fn sanity_check(&self) -> Result<(), ConfigError> {
        if self.concurrent_requests == 0 {
            return Err(ConfigError::NoConcurrency);
        }
        if self.concurrent_requests_per_domain > self.concurrent_requests {
            return Err(ConfigError::PerDomainExceedsTotal);
        }
        if self.download_delay < 0.0 {
            return Err(ConfigError::NegativeDelay);
        }
        if self.user_agents.is_empty() {
            return Err(ConfigError::NoUserAgents);
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot_name: "netwatch".to_owned(),
            user_agents: DEFAULT_USER_AGENTS.iter().map(|x| (*x).to_owned()).collect(),
            concurrent_requests: 1,
            concurrent_requests_per_domain: 1,
            download_delay: 1.0,
            randomize_download_delay: true,
            download_timeout: 180,
            robotstxt_obey: true,
            output_dir: PathBuf::from("."),
            export_networks: false,
            download_media: false,
        }
    }
}

const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/90.0.4430.212 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.114 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:89.0) Gecko/20100101 Firefox/89.0",
];
