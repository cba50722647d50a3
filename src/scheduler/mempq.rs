use std::collections::{HashMap, HashSet, VecDeque};

use super::{Scheduler, SchedulerItem};

/// In-memory priority-queue based scheduler.
///
/// Schedules higher priority items first. A request whose fingerprint was
/// already enqueued or fetched during this run is dropped.
//
// Nothing is persisted between runs.
#[derive(Default)]
pub struct MempqScheduler {
    current_priority: HashMap<String, u8>,

    queues: HashMap<String, HashMap<u8, VecDeque<SchedulerItem>>>,
    // Number of items enqueued
    num_items: usize,

    added_requests: HashSet<u64>,
    visited_requests: HashSet<u64>,
}

impl MempqScheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Scheduler for MempqScheduler {
    fn next_item(&mut self, spider_name: &str) -> Option<SchedulerItem> {
        let queues = self.queues.entry(spider_name.to_owned()).or_default();
        let current_priority = self
            .current_priority
            .entry(spider_name.to_owned())
            .or_insert(0);

        // Update current priority
        while *current_priority > 0 {
            match queues.get(current_priority) {
                Some(q) if !q.is_empty() => break,
                _ => *current_priority -= 1,
            }
        }

        let res = queues
            .get_mut(current_priority)
            .and_then(|queue| queue.pop_front());

        if res.is_some() {
            self.num_items -= 1;
        }

        res
    }

    fn enqueue_item(&mut self, spider_name: &str, item: SchedulerItem) -> bool {
        let fingerprint = item.request.fingerprint();
        if self.added_requests.contains(&fingerprint)
            || self.visited_requests.contains(&fingerprint)
        {
            return false;
        }

        let current_priority = self
            .current_priority
            .entry(spider_name.to_owned())
            .or_insert(0);
        if item.priority > *current_priority {
            *current_priority = item.priority;
        }

        self.queues
            .entry(spider_name.to_owned())
            .or_default()
            .entry(item.priority)
            .or_default()
            .push_back(item);
        self.added_requests.insert(fingerprint);
        self.num_items += 1;
        true
    }

    fn mark_visited(&mut self, fingerprint: u64) {
        self.added_requests.remove(&fingerprint);
        self.visited_requests.insert(fingerprint);
    }

    fn size(&self) -> usize {
        self.num_items
    }

    fn max_priority(&self) -> u8 {
        self.current_priority.values().copied().max().unwrap_or(0)
    }
}
