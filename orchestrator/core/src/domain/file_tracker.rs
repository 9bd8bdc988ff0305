//! File change tracker
//!
//! Records `created`/`modified`/`deleted` per path across a session
//! (component E). A session-lifetime, mutex-guarded append log plus a
//! dedup map of latest operation per path.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileOp {
    Created,
    Modified,
    Deleted,
}

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub op: FileOp,
    pub tool: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    history: Vec<FileChange>,
    latest: HashMap<String, FileOp>,
}

#[derive(Default)]
pub struct FileChangeTracker {
    inner: Mutex<Inner>,
}

impl FileChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, path: impl Into<String>, op: FileOp, tool: impl Into<String>) {
        let path = path.into();
        let mut guard = self.inner.lock();
        guard.latest.insert(path.clone(), op);
        guard.history.push(FileChange { path, op, tool: tool.into(), timestamp: Utc::now() });
    }

    pub fn history(&self) -> Vec<FileChange> {
        self.inner.lock().history.clone()
    }

    pub fn latest_op(&self, path: &str) -> Option<FileOp> {
        self.inner.lock().latest.get(path).copied()
    }
}
