use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use rand::seq::SliceRandom;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::Config;
use crate::error::FetchError;
use crate::request::Request;

/// Something that can turn a request into a response body.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Vec<u8>, FetchError>;
}

#[derive(Debug)]
enum DownloaderRequestIpc {
    Fetch { request: Request, tx: mpsc::Sender<DownloaderResponseIpc> },
}

#[derive(Debug)]
enum DownloaderResponseIpc {
    Fetch(Result<Vec<u8>, FetchError>),
}

/// Serializes requests through a single background task that keeps
/// `download_delay` between consecutive fetches.
#[derive(Clone)]
pub struct Downloader {
    config: Arc<Config>,
    request_tx: Option<mpsc::Sender<DownloaderRequestIpc>>,
}

impl Downloader {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            request_tx: None,
        }
    }

    pub fn start(
        &mut self,
        stop_tx: broadcast::Sender<()>
    ) -> Vec<JoinHandle<()>> {
        let (request_tx, request_rx) = mpsc::channel::<DownloaderRequestIpc>(32);
        self.request_tx = Some(request_tx);

        vec![start_processing_thread(self.config.clone(), request_rx, stop_tx)]
    }
}

#[async_trait]
impl Fetch for Downloader {
    // Note this is thread-safe since it doesn't modify any underlying data.
    async fn fetch(&self, request: &Request) -> Result<Vec<u8>, FetchError> {
        let request_tx = self.request_tx.as_ref().ok_or(FetchError::Killed)?;

        let (response_tx, mut response_rx) =
            mpsc::channel::<DownloaderResponseIpc>(1);
        let req = DownloaderRequestIpc::Fetch {
            request: request.clone(),
            tx: response_tx,
        };
        request_tx.send(req).await.map_err(|_| FetchError::Killed)?;

        match response_rx.recv().await {
            Some(DownloaderResponseIpc::Fetch(resp)) => resp,
            None => Err(FetchError::Killed),
        }
    }
}

fn start_processing_thread(
    config: Arc<Config>,
    mut rx: mpsc::Receiver<DownloaderRequestIpc>,
    stop_tx: broadcast::Sender<()>,
) -> JoinHandle<()> {
    let agent = ureq::AgentBuilder::new()
        .timeout(Duration::from_secs(config.download_timeout))
        .build();
    let mut stop_rx = stop_tx.subscribe();
    tokio::spawn(async move {
        // Timestamp since epoch in millis
        let mut last_fetch = 0;

        'run: loop {
            tokio::select! {
                _ = stop_rx.recv() => {
                    break 'run;
                }
                msg = rx.recv() => {
                    let Some(msg) = msg else {
                        break 'run;
                    };

                    let now = Utc::now().timestamp_millis();
                    let ready_at = last_fetch + next_delay_millis(&config);
                    if now < ready_at {
                        let wait = (ready_at - now) as u64;
                        tokio::time::sleep(Duration::from_millis(wait)).await;
                    }
                    last_fetch = Utc::now().timestamp_millis();

                    match msg {
                        DownloaderRequestIpc::Fetch { request, tx } => {
                            let user_agent = pick_user_agent(&config, &request);
                            let agent = agent.clone();
                            let url = request.url.clone();
                            let response = tokio::task::spawn_blocking(move || {
                                execute(&agent, &request, user_agent)
                            })
                            .await
                            .unwrap_or_else(|e| Err(FetchError::Transport {
                                url,
                                message: e.to_string(),
                            }));
                            if let Err(e) = &response {
                                log::error!("{}", e);
                            }
                            // The caller may have gone away (e.g. on shutdown).
                            let _ = tx.send(DownloaderResponseIpc::Fetch(response)).await;
                        }
                    }
                }
            }
        }
    })
}

fn next_delay_millis(config: &Config) -> i64 {
    let delay = config.download_delay * 1000.0;
    if config.randomize_download_delay && delay > 0.0 {
        (rand::thread_rng().gen_range(0.5..1.5) * delay) as i64
    } else {
        delay as i64
    }
}

fn pick_user_agent(config: &Config, request: &Request) -> Option<String> {
    if request.header("user-agent").is_some() {
        return None;
    }
    config.user_agents.choose(&mut rand::thread_rng()).cloned()
}

fn execute(
    agent: &ureq::Agent,
    request: &Request,
    user_agent: Option<String>,
) -> Result<Vec<u8>, FetchError> {
    let mut req = agent.request(request.method.as_str(), &request.url);
    for (name, value) in &request.headers {
        req = req.set(name, value);
    }
    if let Some(user_agent) = user_agent {
        req = req.set("user-agent", &user_agent);
    }

    let response = match &request.body {
        Some(body) => req.send_string(body),
        None => req.call(),
    };
    let response = response.map_err(|e| match e {
        ureq::Error::Status(status, _) => FetchError::Status {
            url: request.url.clone(),
            status,
        },
        ureq::Error::Transport(t) => FetchError::Transport {
            url: request.url.clone(),
            message: t.to_string(),
        },
    })?;

    let mut body = vec![];
    response
        .into_reader()
        .read_to_end(&mut body)
        .map_err(|source| FetchError::Body {
            url: request.url.clone(),
            source,
        })?;
    Ok(body)
}
