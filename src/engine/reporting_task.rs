use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::engine::EngineState;
use crate::scheduler::Scheduler;

const REPORT_INTERVAL_SECS: u64 = 60;

pub(super) fn start_reporting_thread<Sched>(
    state: Arc<EngineState<Sched>>,
    stop_tx: broadcast::Sender<()>,
) -> JoinHandle<()>
where
    Sched: 'static + Scheduler + Send,
{
    let mut stop_rx = stop_tx.subscribe();
    tokio::spawn(async move {
        'run: loop {
            let sleep = tokio::time::sleep(std::time::Duration::from_secs(REPORT_INTERVAL_SECS));
            tokio::pin!(sleep);

            tokio::select! {
                _ = stop_rx.recv() => {
                    break 'run;
                }
                _ = &mut sleep => {
                    log::info!("{}", progress(&state));
                }
            }
        }
    })
}

fn progress<Sched>(state: &EngineState<Sched>) -> String
where
    Sched: Scheduler + Send,
{
    let summary = state.stats.summary();
    let (queued, top_priority) = {
        let scheduler = state.scheduler.lock().unwrap();
        (scheduler.size(), scheduler.max_priority())
    };
    format!(
        "{} pages crawled at {} pages/minute, {} offers at {} offers/minute, {} faults, {} requests queued (top priority {})",
        summary.pages_crawled,
        state.stats.crawled_per_minute(),
        summary.offers_exported,
        state.stats.processed_per_minute(),
        summary.faults,
        queued,
        top_priority,
    )
}
