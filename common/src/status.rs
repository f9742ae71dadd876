//! Status indicator shared by all operations of a page.
//!
use std::sync::Arc;

use tokio::sync::watch;

use crate::protocol::Status;

/// Holds exactly one current [`Status`]. Every transition overwrites the previous one and
/// subscribers only ever observe the latest value.
#[derive(Clone)]
pub struct StatusIndicator {
    tx: Arc<watch::Sender<Status>>,
}

impl StatusIndicator {
    pub fn new(initial: Status) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn set(&self, status: Status) {
        log::debug!("Status [{}] {}", status.kind.as_str(), &status.message);
        self.tx.send_replace(status);
    }

    pub fn current(&self) -> Status {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Status> {
        self.tx.subscribe()
    }
}

impl Default for StatusIndicator {
    fn default() -> Self {
        Self::new(Status::loading("Loading..."))
    }
}
