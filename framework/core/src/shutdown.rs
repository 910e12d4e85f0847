use std::sync::Arc;

use tokio::sync::watch::{Receiver, Sender};

/// A latched stop signal for a load engine.
///
/// Engines hold one of these and implement [crate::prelude::LoadEngine::stop_run] by calling
/// [StopHandle::stop]. Once stopped the signal stays set, so listeners created afterwards still
/// see it and repeated stop requests are harmless.
#[derive(Debug, Clone)]
pub struct StopHandle {
    sender: Arc<Sender<bool>>,
}

impl Default for StopHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl StopHandle {
    pub fn new() -> Self {
        Self {
            sender: Arc::new(tokio::sync::watch::channel(false).0),
        }
    }

    /// Request a stop. Returns `true` if this call is the one that set the signal.
    pub fn stop(&self) -> bool {
        let changed = self.sender.send_if_modified(|stopped| {
            if *stopped {
                false
            } else {
                *stopped = true;
                true
            }
        });

        if !changed {
            log::debug!("Stop already requested, ignoring repeated request");
        }

        changed
    }

    pub fn is_stopped(&self) -> bool {
        *self.sender.borrow()
    }

    pub fn new_listener(&self) -> StopListener {
        StopListener {
            receiver: self.sender.subscribe(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StopListener {
    receiver: Receiver<bool>,
}

impl StopListener {
    /// Point in time check if a stop has been requested.
    pub fn should_stop(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Wait until a stop has been requested. Returns immediately if it already has been.
    ///
    /// It is safe to race this with another future so that the stop signal can be used to cancel
    /// other work in progress.
    pub async fn wait_for_stop(&mut self) {
        // The sender lives as long as any handle, an error here means every handle is gone and no
        // stop can ever arrive, which is treated as stopped.
        if self.receiver.wait_for(|stopped| *stopped).await.is_err() {
            log::debug!("Stop handle dropped, treating as stopped");
        }
    }
}

#[derive(derive_more::Error, derive_more::Display, Debug)]
pub struct StopSignalError {
    msg: String,
}

impl Default for StopSignalError {
    fn default() -> Self {
        Self {
            msg: "Execution cancelled by stop signal".to_string(),
        }
    }
}
