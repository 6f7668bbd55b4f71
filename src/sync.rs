//! Module progress synchronisation.
//!
//! Holds the last fetched module summaries and project stats for the active
//! project and refreshes them whenever an upload completes, a case is
//! submitted, or the view returns to the module list.

use crate::api::{CaseBackend, ModuleSummary, ProjectStats};
use crate::context::ProjectContext;
use crate::error::Result;
use crate::events::{EventBus, ProgressSyncHandler};
use crate::logging::log_debug;
use crate::shutdown::ShutdownCoordinator;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressSnapshot {
    pub project: Option<String>,
    /// Incomplete modules first, then by name
    pub modules: Vec<ModuleSummary>,
    pub stats: ProjectStats,
    pub refreshed_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct SyncState {
    snapshot: ProgressSnapshot,
    last_error: Option<String>,
}

#[derive(Clone)]
pub struct ModuleProgressSync {
    backend: Arc<dyn CaseBackend>,
    project: ProjectContext,
    events: EventBus,
    state: Arc<Mutex<SyncState>>,
}

impl ModuleProgressSync {
    pub fn new(backend: Arc<dyn CaseBackend>, project: ProjectContext, events: EventBus) -> Self {
        Self {
            backend,
            project,
            events,
            state: Arc::new(Mutex::new(SyncState::default())),
        }
    }

    /// Fetch modules and stats for the active project.
    ///
    /// Without an active project the snapshot is emptied and nothing is
    /// requested.
    pub async fn refresh(&self) -> Result<ProgressSnapshot> {
        let Some(project) = self.project.current() else {
            let snapshot = ProgressSnapshot::default();
            self.store(Ok(snapshot.clone()))?;
            return Ok(snapshot);
        };

        let fetched = self.fetch(&project).await;
        self.store(fetched)
    }

    async fn fetch(&self, project: &str) -> Result<ProgressSnapshot> {
        let mut modules = self.backend.list_modules(project).await?;
        let stats = self.backend.project_stats(project).await?;
        sort_modules(&mut modules);

        log_debug(
            "sync",
            &format!("Refreshed {} modules for {}", modules.len(), project),
        )
        .unwrap_or_default();

        Ok(ProgressSnapshot {
            project: Some(project.to_string()),
            modules,
            stats,
            refreshed_at: Some(Utc::now()),
        })
    }

    fn store(&self, fetched: Result<ProgressSnapshot>) -> Result<ProgressSnapshot> {
        let mut state = self.state.lock()?;
        match fetched {
            Ok(snapshot) => {
                state.snapshot = snapshot.clone();
                state.last_error = None;
                Ok(snapshot)
            }
            Err(e) => {
                state.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.state
            .lock()
            .map(|state| state.snapshot.clone())
            .unwrap_or_default()
    }

    pub fn last_error(&self) -> Option<String> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.last_error.clone())
    }

    /// Refresh on every bus event that asks for it until shutdown.
    pub fn start(&self, shutdown: &ShutdownCoordinator) -> JoinHandle<()> {
        ProgressSyncHandler::new(self.events.clone(), self.clone(), shutdown.clone()).start()
    }
}

fn sort_modules(modules: &mut [ModuleSummary]) {
    modules.sort_by(|a, b| match (a.is_complete(), b.is_complete()) {
        (false, true) => Ordering::Less,
        (true, false) => Ordering::Greater,
        _ => a.name.cmp(&b.name),
    });
}
