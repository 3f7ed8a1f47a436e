//! Live runtime configuration.
//!
//! Holds the current [`RuntimeConfig`] behind an `ArcSwap` so readers never
//! block, and publishes every accepted change on a broadcast channel.
//! Subscribers consume changes on their own task instead of registering
//! callbacks.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::broadcast;

use crate::config::loader::ConfigError;
use crate::config::schema::RuntimeConfig;
use crate::config::validation::validate_config;

const CHANGE_CHANNEL_CAPACITY: usize = 16;

/// Read-only snapshot source plus change notifications.
pub struct RuntimeConfigProvider {
    current: ArcSwap<RuntimeConfig>,
    changes: broadcast::Sender<Arc<RuntimeConfig>>,
}

impl RuntimeConfigProvider {
    /// Create a provider seeded with an already-validated configuration.
    pub fn new(initial: RuntimeConfig) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            current: ArcSwap::from_pointee(initial),
            changes,
        }
    }

    /// Current configuration snapshot.
    pub fn get_runtime_config(&self) -> Arc<RuntimeConfig> {
        self.current.load_full()
    }

    /// Subscribe to configuration changes. Dropping the subscription unsubscribes.
    pub fn on_runtime_config_change(&self) -> ConfigSubscription {
        ConfigSubscription {
            rx: self.changes.subscribe(),
            latest: self.current.load_full(),
        }
    }

    /// Validate and swap in a new configuration, notifying subscribers.
    ///
    /// An invalid configuration is rejected and the current one is kept.
    pub fn publish(&self, config: RuntimeConfig) -> Result<(), ConfigError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let config = Arc::new(config);
        self.current.store(Arc::clone(&config));
        let receivers = self.changes.send(config).unwrap_or(0);

        tracing::info!(subscribers = receivers, "Runtime configuration updated");
        Ok(())
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.changes.receiver_count()
    }
}

/// A live subscription to configuration changes.
pub struct ConfigSubscription {
    rx: broadcast::Receiver<Arc<RuntimeConfig>>,
    latest: Arc<RuntimeConfig>,
}

impl ConfigSubscription {
    /// Wait for the next configuration. Returns `None` once the provider is gone.
    ///
    /// If the subscriber fell behind, intermediate versions are skipped and
    /// the newest one is returned.
    pub async fn recv(&mut self) -> Option<Arc<RuntimeConfig>> {
        loop {
            match self.rx.recv().await {
                Ok(config) => {
                    self.latest = Arc::clone(&config);
                    return Some(config);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Config subscriber lagged, skipping to newest");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Last configuration seen by this subscription.
    pub fn latest(&self) -> Arc<RuntimeConfig> {
        Arc::clone(&self.latest)
    }

    /// Stop receiving changes.
    pub fn unsubscribe(self) {}
}
