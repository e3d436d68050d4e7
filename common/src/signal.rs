use tokio::sync::Notify;

/// One-slot wake flag between a producer task and a single consumer.
///
/// Raising while a wake is already pending is a no-op: the consumer runs once
/// for any number of raises it has not yet observed, so it always works on
/// the latest value rather than a backlog.
#[derive(Debug, Default)]
pub struct WakeSignal {
    notify: Notify,
}

impl WakeSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        // `notify_one` stores at most one permit when nobody is waiting.
        self.notify.notify_one();
    }

    /// Waits, without timeout, until the signal is raised and consumes it.
    pub async fn wait(&self) {
        self.notify.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;

    const SETTLE: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn raise_before_wait_is_not_lost() {
        let signal = WakeSignal::new();
        signal.raise();

        tokio::time::timeout(SETTLE, signal.wait())
            .await
            .expect("pending raise should wake the consumer");
    }

    #[tokio::test]
    async fn repeated_raises_coalesce_into_one_wake() {
        let signal = WakeSignal::new();
        signal.raise();
        signal.raise();
        signal.raise();

        signal.wait().await;
        assert!(tokio::time::timeout(SETTLE, signal.wait()).await.is_err());
    }

    #[tokio::test]
    async fn wakes_a_blocked_consumer() {
        let signal = Arc::new(WakeSignal::new());
        let consumer = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.wait().await })
        };

        tokio::task::yield_now().await;
        signal.raise();

        tokio::time::timeout(SETTLE, consumer)
            .await
            .expect("consumer should be woken")
            .unwrap();
    }
}
