//! Configuration file watcher for hot reload.
//!
//! # Data Flow
//! ```text
//! notify event (modify / create)
//!     → load_config (parse + validate)
//!     → skipped if identical to the last loaded document
//!     → mpsc channel → forward_updates → RuntimeConfigProvider::publish
//! ```
//!
//! # Design Decisions
//! - Editors emit several events per save; identical reloads are dropped here
//! - A document that fails to load is logged and the current config stays live

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::loader::load_config;
use crate::config::provider::RuntimeConfigProvider;
use crate::config::schema::RuntimeConfig;

/// Watches one configuration file and emits every distinct valid version.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<RuntimeConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and the receiving end of its reload feed.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<RuntimeConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            update_tx,
        };
        (watcher, update_rx)
    }

    /// Start watching the file. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let ConfigWatcher { path, update_tx } = self;
        let watched = path.clone();
        let mut last_loaded: Option<RuntimeConfig> = None;

        let handler = move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(path = %watched.display(), error = %e, "Config watch error");
                    return;
                }
            };
            if !(event.kind.is_modify() || event.kind.is_create()) {
                return;
            }

            match load_config(&watched) {
                Ok(config) if last_loaded.as_ref() == Some(&config) => {
                    tracing::debug!(path = %watched.display(), "Config file touched without changes");
                }
                Ok(config) => {
                    tracing::info!(path = %watched.display(), "Config file changed, reloading");
                    last_loaded = Some(config.clone());
                    let _ = update_tx.send(config);
                }
                Err(e) => {
                    tracing::error!(
                        path = %watched.display(),
                        error = %e,
                        "Config reload failed, keeping current configuration"
                    );
                }
            }
        };

        let mut watcher =
            RecommendedWatcher::new(handler, Config::default().with_poll_interval(Duration::from_secs(2)))?;
        watcher.watch(&path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %path.display(), "Config watcher started");
        Ok(watcher)
    }
}

/// Forward loaded configurations into the provider until the channel closes.
pub fn forward_updates(
    mut updates: mpsc::UnboundedReceiver<RuntimeConfig>,
    provider: Arc<RuntimeConfigProvider>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(config) = updates.recv().await {
            if let Err(e) = provider.publish(config) {
                tracing::error!(error = %e, "Rejected reloaded configuration");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn forwarded_updates_reach_provider() {
        let provider = Arc::new(RuntimeConfigProvider::new(RuntimeConfig::default()));
        let (tx, forwarded) = mpsc::unbounded_channel();

        let mut sub = provider.on_runtime_config_change();
        let task = forward_updates(forwarded, Arc::clone(&provider));

        let mut next = RuntimeConfig::default();
        next.http.port = 7070;
        tx.send(next).unwrap();

        let received = sub.recv().await.unwrap();
        assert_eq!(received.http.port, 7070);

        drop(tx);
        task.await.unwrap();
    }
}
