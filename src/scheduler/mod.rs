use crate::request::Request;

pub mod mempq;

pub const DEFAULT_PRIORITY: u8 = 10;

pub struct SchedulerItem {
    pub spider_name: String,
    pub request: Request,
    pub priority: u8,
}

pub trait Scheduler {
    fn next_item(&mut self, spider_name: &str) -> Option<SchedulerItem>;

    /// Enqueue item to be scheduled later.
    ///
    /// Returns whether the item is enqueued.
    fn enqueue_item(&mut self, spider_name: &str, item: SchedulerItem) -> bool;

    fn mark_visited(&mut self, fingerprint: u64);

    /// Returns the number of items enqueued in the scheduler.
    fn size(&self) -> usize;

    /// Returns the maximum priority of items enqueued.
    fn max_priority(&self) -> u8;
}
