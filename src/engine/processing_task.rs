use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::downloader::Fetch;
use crate::item::Item;
use crate::pagination::PageTask;
use crate::request::Callback;
use crate::scheduler::{Scheduler, SchedulerItem};

use super::{EngineState, SharedSpider};
use super::thread_state::ThreadStatus;

const IDLE_POLL: Duration = Duration::from_millis(10);

pub(super) fn start_processing_thread<Sched>(
    thread_id: u32,
    state: Arc<EngineState<Sched>>,
    stop_tx: broadcast::Sender<()>,
) -> JoinHandle<()>
where
    Sched: 'static + Scheduler + Send,
{
    log::debug!("[thread-{}] start", thread_id);
    let mut stop_rx = stop_tx.subscribe();
    tokio::spawn(async move {
        'run: loop {
            if stop_rx.try_recv().is_ok() {
                break 'run;
            }

            // Busy/idle is updated under the scheduler lock so that an empty
            // queue plus all-idle workers really means nothing is left.
            let (item, finished) = {
                let mut spider_names: Vec<&String> = state.spiders.keys().collect();
                spider_names.shuffle(&mut rand::thread_rng());

                let mut scheduler = state.scheduler.lock().unwrap();
                let item = spider_names
                    .iter()
                    .find_map(|name| scheduler.next_item(name));
                if item.is_some() {
                    state.thread_state.set_thread_status(thread_id, ThreadStatus::Busy);
                    (item, false)
                } else {
                    state.thread_state.set_thread_status(thread_id, ThreadStatus::Idle);
                    (None, state.thread_state.is_all_idle())
                }
            };

            match item {
                Some(item) => process_item(thread_id, &state, item).await,
                None if finished => {
                    // Crawl finished, exit.
                    let _res = stop_tx.send(());
                    break 'run;
                }
                None => tokio::time::sleep(IDLE_POLL).await,
            }
        }
    })
}

async fn process_item<Sched>(
    thread_id: u32,
    state: &EngineState<Sched>,
    item: SchedulerItem,
)
where
    Sched: Scheduler + Send,
{
    let request = &item.request;
    log::info!("[thread-{}] {} {}", thread_id, request.method.as_str(), request.url);

    let Some(spider) = state.spiders.get(&item.spider_name).cloned() else {
        log::error!("[thread-{}] no spider named {}", thread_id, item.spider_name);
        return;
    };
    let Some(downloader) = state.downloader_pool.get_downloader(&request.url) else {
        log::error!("[thread-{}] downloaders are not running", thread_id);
        return;
    };

    match &request.callback {
        Callback::Networks => {
            handle_networks(state, &item, &spider, downloader.as_ref()).await
        }
        Callback::Offers(task) => {
            handle_offers(state, &item.spider_name, &spider, downloader.as_ref(), task).await
        }
    }

    state.scheduler.lock().unwrap().mark_visited(request.fingerprint());
}

/// Discovery failure ends the crawl for this spider: nothing can be paged
/// without the network list.
async fn handle_networks<Sched>(
    state: &EngineState<Sched>,
    item: &SchedulerItem,
    spider: &SharedSpider,
    fetcher: &dyn Fetch,
)
where
    Sched: Scheduler + Send,
{
    let name = &item.spider_name;
    let networks = match spider.discover_networks(fetcher).await {
        Ok(networks) => networks,
        Err(e) => {
            state.stats.incr_total_faults();
            log::error!("[{}] network discovery failed, spider stops: {}", name, e);
            return;
        }
    };
    state.stats.incr_total_crawled();
    state.stats.add_total_networks(networks.len() as u64);
    log::info!("[{}] found {} affiliate networks", name, networks.len());

    for discovered in networks {
        let plan = spider.plan_pages(&discovered);
        log::debug!(
            "[{}] network {} has {} offers on {} pages",
            name,
            discovered.key,
            discovered.num_offers,
            plan.num_pages()
        );
        if state.config.export_networks {
            state.export(name, &Item::Network(discovered.network.clone()));
        }
        for task in plan {
            state.schedule(name, spider.page_request(&task), item.priority);
        }
    }
}

/// A failed page loses that page only; a malformed offer loses that offer
/// only.
async fn handle_offers<Sched>(
    state: &EngineState<Sched>,
    name: &str,
    spider: &SharedSpider,
    fetcher: &dyn Fetch,
    task: &PageTask,
)
where
    Sched: Scheduler + Send,
{
    let offers = match spider.fetch_and_extract(fetcher, task).await {
        Ok(offers) => offers,
        Err(e) => {
            state.stats.incr_total_faults();
            log::error!(
                "[{}] network {} page {}/{} dropped: {}",
                name,
                task.key,
                task.page,
                task.num_pages,
                e
            );
            return;
        }
    };
    state.stats.incr_total_crawled();

    for offer in offers {
        match offer {
            Ok(mut offer) => {
                if let Some(media) = state.media.get(name) {
                    media.process(&mut offer).await;
                }
                state.export(name, &Item::Offer(offer));
            }
            Err(e) => {
                state.stats.incr_total_faults();
                log::warn!(
                    "[{}] network {} page {}/{}: skipping offer: {}",
                    name,
                    task.key,
                    task.page,
                    task.num_pages,
                    e
                );
            }
        }
    }
}
