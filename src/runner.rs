use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tokio::time::Instant;

use crate::history::{HistoryStore, ScanSession};
use crate::hooks::{HookPipeline, HookRecord};
use crate::prober::{ProbeExecutor, ProbeResult};
use crate::targets::{ProbeMode, TargetGenerator};

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:95.0) Gecko/20100101 Firefox/95.0";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WordlistSource {
    FilePath(String),
    Inline(Vec<String>),
}

impl WordlistSource {
    /// Human-readable label stored in the session record.
    pub fn label(&self) -> String {
        match self {
            WordlistSource::FilePath(path) => path.clone(),
            WordlistSource::Inline(words) => format!("<inline:{} words>", words.len()),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub period_seconds: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Options {
    pub base_url: String,
    pub wordlist: WordlistSource,
    pub mode: ProbeMode,
    pub threads: usize,
    pub timeout_seconds: u64,
    pub user_agent: String,
    pub delay_ms: u64,
    pub verify_ssl: bool,
    pub auth: Option<Credentials>,
    pub proxy: Option<String>,
    pub retries: u32,
    pub batch_size: usize,
    pub rate_limit: Option<RateLimitConfig>,
    pub cache_size: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            wordlist: WordlistSource::Inline(Vec::new()),
            mode: ProbeMode::Directory,
            threads: 10,
            timeout_seconds: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            delay_ms: 0,
            verify_ssl: true,
            auth: None,
            proxy: None,
            retries: 2,
            batch_size: 100,
            rate_limit: None,
            cache_size: 1000,
        }
    }
}

/// Fatal configuration and resource errors. Per-target network failures are
/// never surfaced here; they come back as `ProbeResult`s with status 0.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid base URL: {url}")]
    InvalidUrl { url: String },

    #[error("unsupported scheme '{scheme}', expected http or https")]
    UnsupportedScheme { scheme: String },

    #[error("base URL has no host: {url}")]
    MissingHost { url: String },

    #[error("invalid thread count {value}, expected at least 1")]
    InvalidThreads { value: usize },

    #[error("invalid batch size {value}, expected at least 1")]
    InvalidBatchSize { value: usize },

    #[error("failed to open wordlist: {path}: {source}")]
    WordlistOpen {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read wordlist: {path}: {source}")]
    WordlistRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("wordlist is empty after filtering")]
    EmptyWordlist,

    #[error("failed to build HTTP client: {source}")]
    HttpClientBuild {
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to setup proxy: {proxy}: {source}")]
    ProxySetup {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to open history store '{path}': {source}")]
    HistoryOpen {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Cooperative cancellation flag shared between the caller (usually a signal
/// handler) and the scheduler. Setting it is idempotent; it stops new work
/// from being scheduled but never aborts an in-flight request.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug)]
pub struct ScanOutcome {
    /// Probe results whose status fell in the accepted set.
    pub matches: Vec<ProbeResult>,
    /// Hook-transformed records for the matches, post_scan applied.
    pub records: Vec<HookRecord>,
    /// HTTP requests actually issued, retries included.
    pub total_requests: u64,
    pub elapsed: Duration,
    /// Id assigned by the history store, if one was attached and the write
    /// succeeded.
    pub session_id: Option<u64>,
    pub cancelled: bool,
}

/// The probing engine. Validates its options up front, then drives the
/// batch-scheduled worker pool over the generated targets.
pub struct Bruteforcer {
    options: Options,
    hooks: HookPipeline,
    history: Option<HistoryStore>,
    progress: ProgressBar,
}

impl Bruteforcer {
    pub fn new(options: Options) -> Result<Self, EngineError> {
        if options.threads == 0 {
            return Err(EngineError::InvalidThreads {
                value: options.threads,
            });
        }
        if options.batch_size == 0 {
            return Err(EngineError::InvalidBatchSize {
                value: options.batch_size,
            });
        }
        // Fail on a bad base URL before any probing starts.
        TargetGenerator::new(&options.base_url, options.mode)?;
        Ok(Self {
            options,
            hooks: HookPipeline::new(),
            history: None,
            progress: ProgressBar::hidden(),
        })
    }

    pub fn with_hooks(mut self, hooks: HookPipeline) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_history(mut self, history: HistoryStore) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub async fn run(&self, cancel: CancelFlag) -> Result<ScanOutcome, EngineError> {
        let started_wall = Utc::now();
        let started = Instant::now();

        // pre_scan hooks see the serialized option snapshot; their output
        // becomes the effective configuration for this session.
        let snapshot = serde_json::to_value(&self.options).unwrap_or(Value::Null);
        let effective = self.hooks.pre_scan(snapshot.clone());
        let options: Options = if effective == snapshot {
            self.options.clone()
        } else {
            match serde_json::from_value::<Options>(effective) {
                // Hook output has to satisfy the same constraints the
                // constructor enforces; a snapshot it would reject is
                // discarded whole.
                Ok(options) if options.threads == 0 || options.batch_size == 0 => {
                    tracing::warn!(
                        threads = options.threads,
                        batch_size = options.batch_size,
                        "pre_scan output fails validation, keeping original config"
                    );
                    self.options.clone()
                }
                Ok(options) => options,
                Err(err) => {
                    tracing::warn!(error = %err, "pre_scan output is not a valid config, keeping original");
                    self.options.clone()
                }
            }
        };
        let threads = options.threads;
        let batch_size = options.batch_size;

        let generator = TargetGenerator::new(&options.base_url, options.mode)?;
        let words = load_words(&options.wordlist).await?;
        // Each distinct target is scheduled at most once per session, no
        // matter how often its word repeats in the list.
        let mut seen: HashSet<String> = HashSet::new();
        let targets: Vec<String> = generator
            .targets(&words)
            .filter(|target| seen.insert(target.clone()))
            .collect();
        let target_count = targets.len() as u64;
        if target_count == 0 {
            return Err(EngineError::EmptyWordlist);
        }
        self.progress.set_length(target_count);

        let executor = Arc::new(ProbeExecutor::new(&options)?);

        tracing::info!(
            url = %generator.base(),
            mode = %options.mode,
            targets = target_count,
            threads,
            batch_size,
            "scan started"
        );

        let mut matches: Vec<ProbeResult> = Vec::new();
        let mut records: Vec<HookRecord> = Vec::new();
        let mut cancelled = false;

        let mut pending = targets.into_iter();
        loop {
            let mut batch: Vec<String> = Vec::with_capacity(batch_size);
            while batch.len() < batch_size {
                match pending.next() {
                    Some(target) => batch.push(target),
                    None => break,
                }
            }
            if batch.is_empty() {
                break;
            }
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            // A bounded pool per batch; the next batch starts only after
            // every submission in this one has completed.
            let mut completions = futures::stream::iter(batch.into_iter().map(|target| {
                let executor = executor.clone();
                let cancel = cancel.clone();
                async move {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    Some(executor.probe(&target).await)
                }
            }))
            .buffer_unordered(threads);

            while let Some(completed) = completions.next().await {
                let Some(result) = completed else {
                    continue;
                };
                self.progress.inc(1);
                if cancel.is_cancelled() {
                    // In-flight requests drain, but nothing new is recorded.
                    cancelled = true;
                    continue;
                }
                let record = self.hooks.on_result(result.to_record());
                if result.found {
                    tracing::info!(target = %result.target, status = result.status, "target found");
                    matches.push(result);
                    records.push(record);
                }
            }
            if cancelled {
                break;
            }
        }

        let records = self.hooks.post_scan(records);
        let total_requests = executor.requests_issued();
        let elapsed = started.elapsed();

        tracing::info!(
            total_requests,
            found = matches.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            cancelled,
            "scan finished"
        );

        // An interrupted run still persists whatever was collected. A failed
        // write is logged and never fails the scan itself.
        let session_id = match &self.history {
            Some(history) => {
                let session = ScanSession {
                    id: 0,
                    url: generator.base().to_string(),
                    mode: options.mode.to_string(),
                    wordlist: options.wordlist.label(),
                    start_time: started_wall,
                    end_time: Utc::now(),
                    total_requests,
                    found_count: matches.len() as u64,
                    config: serde_json::to_value(&options).unwrap_or(Value::Null),
                    results: records.iter().cloned().map(Value::Object).collect(),
                };
                match history.record(session).await {
                    Ok(id) => Some(id),
                    Err(err) => {
                        tracing::warn!(error = %err, "failed to persist scan session");
                        None
                    }
                }
            }
            None => None,
        };

        Ok(ScanOutcome {
            matches,
            records,
            total_requests,
            elapsed,
            session_id,
            cancelled,
        })
    }
}

async fn load_words(source: &WordlistSource) -> Result<Vec<String>, EngineError> {
    match source {
        WordlistSource::Inline(values) => Ok(values
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect()),
        WordlistSource::FilePath(path) => {
            let path = crate::config::expand_tilde_string(path.as_str());
            let handle = File::open(&path).await.map_err(|e| EngineError::WordlistOpen {
                path: path.clone(),
                source: e,
            })?;
            let mut out = Vec::new();
            let mut lines = BufReader::new(handle).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        out.push(line.to_string());
                    }
                    Ok(None) => break,
                    Err(e) => {
                        return Err(EngineError::WordlistRead {
                            path,
                            source: e,
                        })
                    }
                }
            }
            Ok(out)
        }
    }
}
