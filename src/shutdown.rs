use tokio::sync::broadcast;

/// Signals background handlers (progress sync, console printer) to stop.
///
/// ```no_run
/// use casepilot::shutdown::ShutdownCoordinator;
///
/// # async fn example(events: casepilot::events::EventBus) {
/// let coordinator = ShutdownCoordinator::new();
/// let mut shutdown_rx = coordinator.subscribe();
/// let mut event_rx = events.subscribe();
///
/// loop {
///     tokio::select! {
///         _ = event_rx.recv() => { /* handle event */ }
///         _ = shutdown_rx.recv() => break,
///     }
/// }
///
/// coordinator.shutdown();
/// # }
/// ```
#[derive(Clone)]
pub struct ShutdownCoordinator {
    shutdown_tx: broadcast::Sender<()>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(4);
        Self { shutdown_tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Every current subscriber receives one signal.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    pub fn has_subscribers(&self) -> bool {
        self.shutdown_tx.receiver_count() > 0
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_handlers_stop_on_signal() {
        let coordinator = ShutdownCoordinator::new();
        let mut sync_rx = coordinator.subscribe();
        let mut console_rx = coordinator.subscribe();
        assert!(coordinator.has_subscribers());

        let sync_task = tokio::spawn(async move { sync_rx.recv().await.is_ok() });

        coordinator.clone().shutdown();

        let stopped = timeout(Duration::from_millis(100), sync_task).await;
        assert!(stopped.unwrap().unwrap());
        assert!(console_rx.try_recv().is_ok());
    }

    #[test]
    fn test_shutdown_without_subscribers_is_noop() {
        let coordinator = ShutdownCoordinator::default();
        assert!(!coordinator.has_subscribers());
        coordinator.shutdown();
    }
}
