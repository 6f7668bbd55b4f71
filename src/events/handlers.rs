use super::{AppEvent, EventBus};
use crate::logging::{log_error, log_info, log_warn};
use crate::shutdown::ShutdownCoordinator;
use crate::sync::ModuleProgressSync;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Handler that re-fetches module/stat summaries when the bus asks for it
pub struct ProgressSyncHandler {
    event_bus: EventBus,
    sync: ModuleProgressSync,
    shutdown: ShutdownCoordinator,
}

impl ProgressSyncHandler {
    pub fn new(event_bus: EventBus, sync: ModuleProgressSync, shutdown: ShutdownCoordinator) -> Self {
        Self {
            event_bus,
            sync,
            shutdown,
        }
    }

    /// Subscribes before spawning so no event published after `start`
    /// returns is missed.
    pub fn start(self) -> JoinHandle<()> {
        let mut rx = self.event_bus.subscribe();
        let mut shutdown_rx = self.shutdown.subscribe();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = rx.recv() => {
                        match result {
                            Ok(event) => self.handle_event(&event).await,
                            Err(broadcast::error::RecvError::Closed) => {
                                log_info("events", "Progress sync handler stopped (event bus closed)").unwrap_or_default();
                                break;
                            }
                            Err(broadcast::error::RecvError::Lagged(n)) => {
                                // Missed triggers collapse into one refresh
                                log_warn("events", &format!("Progress sync handler lagged {} events", n))
                                    .unwrap_or_default();
                                self.refresh().await;
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        log_info("events", "Progress sync handler gracefully shutting down").unwrap_or_default();
                        break;
                    }
                }
            }
        })
    }

    async fn handle_event(&self, event: &AppEvent) {
        if event.triggers_refresh() {
            self.refresh().await;
        }
    }

    async fn refresh(&self) {
        if let Err(e) = self.sync.refresh().await {
            log_error("sync", &format!("Module refresh failed: {}", e)).unwrap_or_default();
        }
    }
}
