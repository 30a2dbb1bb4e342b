//! Config file watcher feeding node table reloads.
//!
//! The parent directory is watched rather than the file itself, so editors
//! that save by writing a new file and renaming it over the old one are seen.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::ProxyConfig;

/// Publishes every valid version of one config file.
#[derive(Debug)]
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<ProxyConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and the receiving end of its updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<ProxyConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            update_tx,
        };
        (watcher, update_rx)
    }

    /// Start watching. Updates stop when the returned handle is dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let shown = self.path.display().to_string();

        let mut watcher = RecommendedWatcher::new(
            move |result: notify::Result<Event>| self.on_event(result),
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %shown, "Config watcher started");
        Ok(watcher)
    }

    fn on_event(&self, result: notify::Result<Event>) {
        let event = match result {
            Ok(event) => event,
            Err(e) => {
                tracing::error!(error = %e, "Config watch error");
                return;
            }
        };
        if !(event.kind.is_modify() || event.kind.is_create()) {
            return;
        }
        if event.paths.iter().any(|p| p.file_name() == self.path.file_name()) {
            self.reload();
        }
    }

    /// Load the file and publish it if it is valid.
    ///
    /// Returns `true` if a new config was sent.
    pub fn reload(&self) -> bool {
        let path = self.path.display();
        match load_config(&self.path) {
            Ok(config) => {
                tracing::info!(%path, nodes = config.nodes.len(), "Config reloaded");
                self.update_tx.send(config).is_ok()
            }
            Err(e) => {
                tracing::error!(%path, error = %e, "Config reload rejected, keeping current node table");
                false
            }
        }
    }
}
