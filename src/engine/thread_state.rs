use std::sync::{Arc, Mutex};

use var_bitmap::Bitmap;

/// Tracks which workers are idle.
///
/// Worker ids run from 1 to the number of workers. A fresh tracker counts
/// every worker as busy, so the crawl can't be declared finished before
/// each worker has looked at the queue at least once.
#[derive(Clone)]
pub struct ThreadState {
    inner: Arc<Mutex<Bitmap>>,
}

pub enum ThreadStatus {
    Idle,
    Busy,
}

impl ThreadState {
    pub fn new(num_threads: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Bitmap::with_size(num_threads))),
        }
    }

    pub fn set_thread_status(&self, thread_id: u32, status: ThreadStatus) {
        let mut idle_map = self.inner.lock().unwrap();
        let idx = (thread_id - 1) as usize;
        idle_map.set(idx, matches!(status, ThreadStatus::Idle));
    }

    pub fn is_all_idle(&self) -> bool {
        let idle_map = self.inner.lock().unwrap();
        (0..idle_map.size()).all(|idx| idle_map.get(idx))
    }
}
