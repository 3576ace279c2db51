//! One CLI invocation: task file → in-memory store → controller → task file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use taskflow_core::Snapshot;
use taskflow_store::{Identity, MemoryStore, Scope, read_snapshot, write_snapshot};
use taskflow_sync::{EventRx, SyncConfig, SyncController, SyncEvent};
use tokio::sync::broadcast::error::TryRecvError;
use tracing::debug;

use crate::output;

/// Identity from `TASKFLOW_TENANT` and `TASKFLOW_PRINCIPAL` (falling back to `USER`).
pub fn identity_from_env() -> Identity {
    let tenant = std::env::var("TASKFLOW_TENANT").unwrap_or_else(|_| "local".to_string());
    let principal = std::env::var("TASKFLOW_PRINCIPAL")
        .or_else(|_| std::env::var("USER"))
        .unwrap_or_else(|_| "local".to_string());
    Identity::new(principal, tenant)
}

pub async fn init_file(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists; pass --force to overwrite",
            path.display()
        );
    }
    write_snapshot(path, &Snapshot::default())
        .await
        .with_context(|| format!("writing {}", path.display()))
}

pub struct Session {
    path: PathBuf,
    store: Arc<MemoryStore>,
    scope: Scope,
    controller: SyncController,
    events: EventRx,
}

impl Session {
    pub async fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!(
                "no task file at {}; run `taskflow init` first",
                path.display()
            );
        }
        let snapshot = read_snapshot(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;

        let scope = identity_from_env().scope();
        let store = Arc::new(MemoryStore::new());
        store.load(&scope, snapshot).await;

        let controller = SyncController::start(store.clone(), scope.clone(), SyncConfig::from_env());
        let events = controller.subscribe();
        controller.load().await?;
        debug!(path = %path.display(), scope = %scope, "session opened");

        Ok(Self {
            path: path.to_path_buf(),
            store,
            scope,
            controller,
            events,
        })
    }

    pub fn controller(&self) -> &SyncController {
        &self.controller
    }

    /// Waits until every change reached the store, then writes the store back
    /// to the task file.
    pub async fn save(mut self) -> Result<()> {
        let spinner = output::spinner("Saving");
        self.controller.settled().await;

        let failures = self.failures();
        if !failures.is_empty() {
            spinner.finish_and_clear();
            bail!("{}", failures.join("; "));
        }

        let snapshot = self.store.snapshot(&self.scope).await;
        write_snapshot(&self.path, &snapshot)
            .await
            .with_context(|| format!("writing {}", self.path.display()))?;
        spinner.finish_and_clear();
        self.controller.shutdown();
        Ok(())
    }

    /// Ends a read-only session without touching the task file.
    pub fn close(self) {
        self.controller.shutdown();
    }

    fn failures(&mut self) -> Vec<String> {
        let mut failures = Vec::new();
        loop {
            match self.events.try_recv() {
                Ok(SyncEvent::SaveFailed { message, error, .. }) => {
                    failures.push(format!("{message} ({error})"));
                }
                Ok(SyncEvent::ReconcileFailed { error, .. }) => failures.push(error),
                Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => return failures,
            }
        }
    }
}
