// Single-slot handoff between the admin channel reader and a waiting step.
//
// The waiter arms the bridge with `prepare()` before it sends the request
// that triggers the reply, then waits on the returned token. Anything
// delivered after `prepare()` is observed, including a reply that lands
// before `wait()` starts.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

/// Outcome of one bounded wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exchange {
    Delivered(String),
    TimedOut,
}

/// Most-recent-message slot shared by a deliverer and a waiter.
///
/// Cloning yields another handle to the same slot. Deliveries overwrite
/// the slot, so only the latest message before a wait is observable.
#[derive(Debug, Clone)]
pub struct MessageBridge {
    slot: Arc<watch::Sender<Option<String>>>,
}

impl Default for MessageBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBridge {
    pub fn new() -> Self {
        let (slot, _) = watch::channel(None);
        Self { slot: Arc::new(slot) }
    }

    /// Clear the slot and arm a wait for the next delivery.
    pub fn prepare(&self) -> PreparedWait {
        self.slot.send_replace(None);
        PreparedWait { slot: Arc::clone(&self.slot), receiver: self.slot.subscribe() }
    }

    /// Store `message` and wake every armed waiter. Never blocks on the waiter.
    pub fn deliver(&self, message: impl Into<String>) {
        self.slot.send_replace(Some(message.into()));
    }

    /// Message currently held in the slot, if any.
    pub fn pending(&self) -> Option<String> {
        (*self.slot.borrow()).clone()
    }
}

/// A wait armed by [`MessageBridge::prepare`].
#[must_use = "a prepared wait does nothing until `wait` is called"]
#[derive(Debug)]
pub struct PreparedWait {
    // Keeps the channel open for the lifetime of the wait.
    slot: Arc<watch::Sender<Option<String>>>,
    receiver: watch::Receiver<Option<String>>,
}

impl PreparedWait {
    /// Suspend until a message is delivered or `timeout` elapses.
    pub async fn wait(mut self, timeout: Duration) -> Exchange {
        match tokio::time::timeout(timeout, self.receiver.wait_for(Option::is_some)).await {
            Ok(Ok(message)) => match (*message).clone() {
                Some(message) => Exchange::Delivered(message),
                None => Exchange::TimedOut,
            },
            Ok(Err(_)) | Err(_) => Exchange::TimedOut,
        }
    }
}
