use tokio::sync::watch;
use tracing::info;

/// Pending requests to reload every module.
///
/// Backed by a watch channel carrying a request counter, so several signals
/// arriving between two polls collapse into one reload.
pub struct ReloadRequests {
    rx: watch::Receiver<u64>,
}

impl ReloadRequests {
    /// A request source driven by the returned sender
    pub fn channel() -> (watch::Sender<u64>, Self) {
        let (tx, rx) = watch::channel(0);
        (tx, Self { rx })
    }

    /// True once per batch of requests received since the last call
    pub fn take(&mut self) -> bool {
        match self.rx.has_changed() {
            Ok(true) => {
                let count = *self.rx.borrow_and_update();
                info!(target: "modules", "Reload requested (request #{})", count);
                true
            }
            _ => false,
        }
    }
}

/// Reload every module when the process receives SIGUSR2.
///
/// Must be called from within a tokio runtime.
#[cfg(unix)]
pub fn listen_for_sigusr2() -> ReloadRequests {
    let (tx, requests) = ReloadRequests::channel();

    tokio::spawn(async move {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigusr2 = match signal(SignalKind::user_defined2()) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(target: "modules", "Failed to register SIGUSR2 handler: {}", e);
                return;
            }
        };

        while sigusr2.recv().await.is_some() {
            info!(target: "modules", "Received SIGUSR2");
            tx.send_modify(|count| *count += 1);
            if tx.is_closed() {
                break;
            }
        }
    });

    requests
}

/// Non-Unix platforms have no SIGUSR2; the returned source never fires
#[cfg(not(unix))]
pub fn listen_for_sigusr2() -> ReloadRequests {
    let (tx, requests) = ReloadRequests::channel();
    tracing::warn!(target: "modules", "SIGUSR2 reload not supported on this platform");
    // Keep the sender alive but never send signals
    std::mem::forget(tx);
    requests
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requests_collapse() {
        let (tx, mut requests) = ReloadRequests::channel();
        assert!(!requests.take());

        tx.send_modify(|c| *c += 1);
        tx.send_modify(|c| *c += 1);
        assert!(requests.take());
        assert!(!requests.take());

        tx.send_modify(|c| *c += 1);
        assert!(requests.take());
    }

    #[test]
    fn test_closed_sender_never_fires() {
        let (tx, mut requests) = ReloadRequests::channel();
        drop(tx);
        assert!(!requests.take());
    }
}
