//! Live view of the pending list.
//!
//! A feed receives the full pending list once on subscribe and again after
//! every write that changes the inventory. Dropping the feed unsubscribes;
//! subscribing again starts over from a fresh snapshot.

use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::Duration;

use super::TrackedFile;

pub struct PendingFeed {
    rx: Receiver<Vec<TrackedFile>>,
}

impl PendingFeed {
    pub(crate) fn new(rx: Receiver<Vec<TrackedFile>>) -> Self {
        PendingFeed { rx }
    }

    /// Next update if one is already waiting.
    pub fn try_next(&self) -> Option<Vec<TrackedFile>> {
        match self.rx.try_recv() {
            Ok(pending) => Some(pending),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    pub fn next_timeout(&self, timeout: Duration) -> Option<Vec<TrackedFile>> {
        match self.rx.recv_timeout(timeout) {
            Ok(pending) => Some(pending),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Drains queued updates and keeps only the newest.
    pub fn latest(&self) -> Option<Vec<TrackedFile>> {
        let mut newest = None;
        while let Some(pending) = self.try_next() {
            newest = Some(pending);
        }
        newest
    }

    pub fn cancel(self) {}
}

/// Blocks for the next update; ends when the inventory is dropped.
impl Iterator for PendingFeed {
    type Item = Vec<TrackedFile>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rx.recv().ok()
    }
}
