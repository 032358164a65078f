//! Optional engine configuration: a JSON settings document with named profiles
//! and a polling file watcher which emits per-path change events on reload.

use crate::{diff, DataflowOrder, EngineOptions, Error, ErrorKind, Value};
use crossbeam_channel::{unbounded, Receiver, Sender};
use filetime::FileTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    pub name: String,
    pub profile: String,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            name: "graft".to_string(),
            profile: "default".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceSection {
    /// `alphabetical` or `insertion`.
    pub dataflow_order: String,
    pub depth_first: bool,
}

impl Default for PerformanceSection {
    fn default() -> Self {
        Self {
            dataflow_order: "alphabetical".to_string(),
            depth_first: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub shards: usize,
    pub capacity: usize,
    pub ttl_seconds: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            shards: 16,
            capacity: 4096,
            ttl_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencySection {
    pub workers: usize,
    pub queue_size: usize,
    pub rate_limit: Option<u32>,
}

impl Default for ConcurrencySection {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_size: 64,
            rate_limit: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemorySection {
    pub max_document_depth: usize,
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            max_document_depth: 4096,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoSection {
    pub vault_timeout_seconds: u64,
}

impl Default for IoSection {
    fn default() -> Self {
        Self {
            vault_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

/// The whole settings document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub engine: EngineSection,
    pub performance: PerformanceSection,
    pub cache: CacheSection,
    pub concurrency: ConcurrencySection,
    pub memory: MemorySection,
    pub io: IoSection,
    pub logging: LoggingSection,
    /// Named feature flags.
    pub features: HashMap<String, bool>,
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(|err| {
            Error::new(
                ErrorKind::Configuration,
                format!("cannot read config {}: {}", path.display(), err),
            )
        })?;
        serde_json::from_str(&text).map_err(|err| {
            Error::new(
                ErrorKind::Configuration,
                format!("invalid config {}: {}", path.display(), err),
            )
        })
    }

    /// A named preset; `None` for an unknown profile name.
    pub fn profile(name: &str) -> Option<Self> {
        let mut config = EngineConfig::default();
        config.engine.profile = name.to_string();
        match name {
            "default" => {}
            "small_docs" => {
                config.cache.capacity = 256;
                config.cache.shards = 4;
                config.concurrency.workers = 2;
            }
            "large_docs" => {
                config.cache.capacity = 16384;
                config.concurrency.workers = 8;
                config.concurrency.queue_size = 256;
            }
            "high_concurrency" => {
                config.concurrency.workers = 16;
                config.concurrency.queue_size = 512;
                config.cache.shards = 64;
            }
            "low_memory" => {
                config.cache.capacity = 64;
                config.cache.shards = 2;
                config.concurrency.workers = 1;
                config.concurrency.queue_size = 8;
                config.memory.max_document_depth = 256;
            }
            _ => return None,
        }
        Some(config)
    }

    /// Fold the settings into engine options.
    pub fn engine_options(&self) -> EngineOptions {
        let mut opts = EngineOptions::default();
        opts.dataflow_order = match self.performance.dataflow_order.as_str() {
            "insertion" => DataflowOrder::Insertion,
            _ => DataflowOrder::Alphabetical,
        };
        opts.depth_first = self.performance.depth_first;
        opts.workers = self.concurrency.workers.max(1);
        opts.queue_size = self.concurrency.queue_size.max(1);
        opts.rate_limit = self.concurrency.rate_limit;
        opts
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// One changed setting, by dotted path.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub path: String,
    pub kind: ChangeKind,
}

/// Polls the config file's mtime and emits change events on reload.
pub struct ConfigWatcher {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ConfigWatcher {
    pub fn spawn(path: PathBuf, interval: Duration) -> (Self, Receiver<Vec<ChangeEvent>>) {
        let (tx, rx) = unbounded();
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let handle = std::thread::Builder::new()
            .name("config-watcher".to_string())
            .spawn(move || watch(path, interval, flag, tx))
            .expect("spawn config watcher");
        (
            Self {
                stop,
                handle: Some(handle),
            },
            rx,
        )
    }

    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ConfigWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn watch(path: PathBuf, interval: Duration, stop: Arc<AtomicBool>, tx: Sender<Vec<ChangeEvent>>) {
    let mut last_mtime = mtime_of(&path);
    let mut current = EngineConfig::load(&path).ok();

    while !stop.load(Ordering::SeqCst) {
        std::thread::sleep(interval);
        let mtime = mtime_of(&path);
        if mtime == last_mtime {
            continue;
        }
        last_mtime = mtime;

        let reloaded = match EngineConfig::load(&path) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("config reload failed: {}", err);
                continue;
            }
        };
        let events = change_events(current.as_ref(), &reloaded);
        current = Some(reloaded);
        if !events.is_empty() && tx.send(events).is_err() {
            break;
        }
    }
}

fn mtime_of(path: &Path) -> Option<FileTime> {
    std::fs::metadata(path)
        .map(|meta| FileTime::from_last_modification_time(&meta))
        .ok()
}

/// Per-dotted-path add/modify/delete events between two configs.
pub fn change_events(before: Option<&EngineConfig>, after: &EngineConfig) -> Vec<ChangeEvent> {
    let left = before
        .and_then(|config| serde_json::to_value(config).ok())
        .map(Value::from)
        .unwrap_or(Value::Null);
    let right = serde_json::to_value(after).map(Value::from).unwrap_or(Value::Null);

    diff::diff(&left, &right)
        .into_iter()
        .map(|entry| ChangeEvent {
            path: entry.path,
            kind: match entry.kind {
                diff::DiffKind::Added => ChangeKind::Added,
                diff::DiffKind::Removed => ChangeKind::Removed,
                diff::DiffKind::Changed => ChangeKind::Modified,
            },
        })
        .collect()
}
