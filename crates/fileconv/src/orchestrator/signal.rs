use std::sync::Arc;

use tokio::sync::watch;

/// One-way flag that can be awaited: starts unset, can only be set.
///
/// Used for cancellation requests and for batch completion.
#[derive(Debug, Clone)]
pub struct Signal {
    sender: Arc<watch::Sender<bool>>,
}

impl Signal {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Sets the flag. Setting it again has no further effect.
    pub fn set(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_set(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolves once the flag is set, immediately if it already is.
    pub async fn wait(&self) {
        let mut receiver = self.sender.subscribe();
        // The sender lives in `self`, so this only returns once set.
        let _ = receiver.wait_for(|set| *set).await;
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}
