use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;

/// A probe result viewed as a flat mapping while it moves through the hook
/// pipeline.
pub type HookRecord = Map<String, Value>;

/// Keys every hook output must keep. A hook that drops one of these has its
/// output discarded and the pre-hook record passed along instead.
pub const REQUIRED_RECORD_KEYS: [&str; 3] = ["target", "status_code", "content_type"];

#[derive(Debug, Error)]
#[error("{message}")]
pub struct HookError {
    pub message: String,
}

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// One extension registered with the engine. All three methods default to
/// passthrough so a hook only implements the stages it cares about.
pub trait ScanHook: Send + Sync {
    fn name(&self) -> &str;

    /// Invoked once before target generation; the returned snapshot becomes
    /// the effective configuration for the session.
    fn pre_scan(&self, config: Value) -> Result<Value, HookError> {
        Ok(config)
    }

    /// Invoked once per completed probe, cache hits included.
    fn on_result(&self, record: HookRecord) -> Result<HookRecord, HookError> {
        Ok(record)
    }

    /// Invoked once after all batches complete.
    fn post_scan(&self, records: Vec<HookRecord>) -> Result<Vec<HookRecord>, HookError> {
        Ok(records)
    }
}

fn has_required_keys(record: &HookRecord) -> bool {
    REQUIRED_RECORD_KEYS.iter().all(|key| record.contains_key(*key))
}

/// Ordered set of statically registered extensions. A faulty hook is logged
/// and skipped; its input value flows unchanged to the next hook, so one bad
/// extension can never abort the pipeline.
#[derive(Clone, Default)]
pub struct HookPipeline {
    hooks: Vec<Arc<dyn ScanHook>>,
}

impl HookPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, hook: Arc<dyn ScanHook>) {
        self.hooks.push(hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn pre_scan(&self, config: Value) -> Value {
        let mut current = config;
        for hook in &self.hooks {
            match hook.pre_scan(current.clone()) {
                Ok(next) => current = next,
                Err(err) => {
                    tracing::warn!(hook = hook.name(), error = %err, "pre_scan hook failed");
                }
            }
        }
        current
    }

    pub fn on_result(&self, record: HookRecord) -> HookRecord {
        let mut current = record;
        for hook in &self.hooks {
            match hook.on_result(current.clone()) {
                Ok(next) if has_required_keys(&next) => current = next,
                Ok(_) => {
                    tracing::warn!(
                        hook = hook.name(),
                        "on_result hook dropped a required key, output discarded"
                    );
                }
                Err(err) => {
                    tracing::warn!(hook = hook.name(), error = %err, "on_result hook failed");
                }
            }
        }
        current
    }

    pub fn post_scan(&self, records: Vec<HookRecord>) -> Vec<HookRecord> {
        let mut current = records;
        for hook in &self.hooks {
            match hook.post_scan(current.clone()) {
                Ok(next) => current = next,
                Err(err) => {
                    tracing::warn!(hook = hook.name(), error = %err, "post_scan hook failed");
                }
            }
        }
        current
    }
}
