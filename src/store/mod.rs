//! Persistence substrate and the report lifecycle store.
//!
//! The hosting application supplies a flat namespaced key→value map (its
//! settings service); the engine defines the trait boundary here and ships an
//! in-memory implementation for embedding and tests. All engine state that
//! must survive restarts — wallet blob, per-period status, id indices — lives
//! behind this trait.

use std::collections::HashMap;
use std::sync::RwLock;

pub mod lifecycle;

pub use lifecycle::{PeriodStatusRecord, ReportLifecycleStore};

/// Flat namespaced settings map. Keys are scoped by a `(context, scope)` pair
/// to avoid collisions with unrelated subsystems of the hosting application.
///
/// Implementations must make each individual `get`/`set` atomic; the engine
/// layers its own per-record serialization on top.
pub trait SettingsStore: Send + Sync + 'static {
    fn get(&self, context: &str, scope: &str, key: &str) -> Option<String>;
    fn set(&self, context: &str, scope: &str, key: &str, value: &str);
    fn remove(&self, context: &str, scope: &str, key: &str);
}

/// Process-local settings map.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    inner: RwLock<HashMap<(String, String, String), String>>,
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self, context: &str, scope: &str, key: &str) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(context.to_string(), scope.to_string(), key.to_string()))
            .cloned()
    }

    fn set(&self, context: &str, scope: &str, key: &str, value: &str) {
        self.inner
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert((context.to_string(), scope.to_string(), key.to_string()), value.to_string());
    }

    fn remove(&self, context: &str, scope: &str, key: &str) {
        self.inner
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&(context.to_string(), scope.to_string(), key.to_string()));
    }
}
