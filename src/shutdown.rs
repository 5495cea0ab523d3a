// src/shutdown.rs
use std::future::Future;
use std::io;
use tokio::sync::watch;

/// Fires the shutdown signal for every cloned [`Shutdown`].
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

/// Cooperative cancellation signal for a serving session and the tool calls
/// it makes. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

impl Shutdown {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Shutdown { rx }
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the trigger fires. Pends forever if the trigger is
    /// dropped without firing.
    pub async fn triggered(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Awaits an OS signal listener such as `tokio::signal::ctrl_c()`. A
/// listener that fails to install is logged and never resolves, so it cannot
/// be mistaken for the signal itself.
pub async fn signal_or_pending<F>(listener: F, name: &str)
where
    F: Future<Output = io::Result<()>>,
{
    if let Err(e) = listener.await {
        tracing::warn!(signal = name, error = %e, "Failed to install signal handler");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn trigger_wakes_every_clone() {
        let (trigger, shutdown) = channel();
        let other = shutdown.clone();
        assert!(!shutdown.is_triggered());

        let waiter = tokio::spawn(async move { other.triggered().await });
        trigger.trigger();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("clone was not woken")
            .unwrap();
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn already_fired_signal_resolves_immediately() {
        let (trigger, shutdown) = channel();
        trigger.trigger();
        drop(trigger);

        tokio::time::timeout(Duration::from_millis(100), shutdown.triggered())
            .await
            .expect("fired signal should resolve");
    }

    #[tokio::test]
    async fn delivered_signal_resolves() {
        tokio::time::timeout(
            Duration::from_millis(100),
            signal_or_pending(async { Ok::<(), io::Error>(()) }, "test"),
        )
        .await
        .expect("a delivered signal should resolve");
    }

    #[tokio::test]
    async fn failed_listener_never_resolves() {
        let failed = async { Err::<(), _>(io::Error::new(io::ErrorKind::Other, "no signal driver")) };
        let waited =
            tokio::time::timeout(Duration::from_millis(50), signal_or_pending(failed, "test")).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn never_does_not_fire() {
        let shutdown = Shutdown::never();
        let waited = tokio::time::timeout(Duration::from_millis(50), shutdown.triggered()).await;
        assert!(waited.is_err());
        assert!(!shutdown.is_triggered());
    }
}
