use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::history::HistoryStore;
use crate::hooks::{HookError, HookPipeline, HookRecord, ScanHook};
use crate::prober::ProbeExecutor;
use crate::runner::{Bruteforcer, CancelFlag, EngineError, Options, WordlistSource};
use crate::targets::ProbeMode;

enum FixtureBehavior {
    /// 200 for the listed paths, 404 for everything else.
    Routes(HashSet<String>),
    /// 200 for every path.
    AlwaysOk,
    /// Accept and immediately close the connection, before any response.
    DropConnections,
}

struct HttpFixture {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl HttpFixture {
    fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn spawn_fixture(behavior: FixtureBehavior) -> HttpFixture {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let behavior = Arc::new(behavior);
    let fixture_hits = hits.clone();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            hits.fetch_add(1, Ordering::SeqCst);
            let behavior = behavior.clone();
            tokio::spawn(async move {
                if matches!(*behavior, FixtureBehavior::DropConnections) {
                    return;
                }
                let mut buf = vec![0u8; 4096];
                let mut read = 0usize;
                loop {
                    match socket.read(&mut buf[read..]).await {
                        Ok(0) => break,
                        Ok(n) => {
                            read += n;
                            if buf[..read].windows(4).any(|w| w == b"\r\n\r\n")
                                || read == buf.len()
                            {
                                break;
                            }
                        }
                        Err(_) => return,
                    }
                }
                let request = String::from_utf8_lossy(&buf[..read]).to_string();
                let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();
                let ok = match &*behavior {
                    FixtureBehavior::Routes(routes) => routes.contains(&path),
                    FixtureBehavior::AlwaysOk => true,
                    FixtureBehavior::DropConnections => false,
                };
                let response = if ok {
                    "HTTP/1.1 200 OK\r\ncontent-type: text/html\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
                } else {
                    "HTTP/1.1 404 Not Found\r\ncontent-type: text/plain\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
                };
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    HttpFixture {
        addr,
        hits: fixture_hits,
    }
}

fn engine_options(base_url: String, words: &[&str]) -> Options {
    Options {
        base_url,
        wordlist: WordlistSource::Inline(words.iter().map(|w| w.to_string()).collect()),
        threads: 4,
        timeout_seconds: 5,
        ..Default::default()
    }
}

#[tokio::test]
async fn directory_scan_reports_only_found_targets() {
    let fixture = spawn_fixture(FixtureBehavior::Routes(HashSet::from([
        "/admin".to_string()
    ])))
    .await;
    let options = engine_options(fixture.base_url(), &["admin", "xyz123"]);
    let engine = Bruteforcer::new(options).unwrap();
    let outcome = engine.run(CancelFlag::new()).await.unwrap();

    assert_eq!(outcome.matches.len(), 1);
    let hit = &outcome.matches[0];
    assert_eq!(hit.target, format!("{}/admin", fixture.base_url()));
    assert_eq!(hit.status, 200);
    assert!(hit.found);
    assert_eq!(hit.content_type, "text/html");
    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.records[0]["status_code"], 200);
    assert_eq!(outcome.total_requests, 2);
}

#[tokio::test]
async fn invalid_words_never_reach_the_wire() {
    let fixture = spawn_fixture(FixtureBehavior::AlwaysOk).await;
    let options = engine_options(fixture.base_url(), &["bad word!", "admin"]);
    let engine = Bruteforcer::new(options).unwrap();
    let outcome = engine.run(CancelFlag::new()).await.unwrap();

    assert_eq!(outcome.matches.len(), 1);
    assert_eq!(fixture.hits(), 1);
    assert_eq!(outcome.total_requests, 1);
}

#[tokio::test]
async fn wordlist_with_no_valid_words_is_fatal_before_probing() {
    let fixture = spawn_fixture(FixtureBehavior::AlwaysOk).await;
    let options = engine_options(fixture.base_url(), &["bad word!", "no/slash"]);
    let engine = Bruteforcer::new(options).unwrap();
    let err = engine.run(CancelFlag::new()).await.unwrap_err();

    assert!(matches!(err, EngineError::EmptyWordlist));
    assert_eq!(fixture.hits(), 0);
}

#[tokio::test]
async fn cache_short_circuits_repeat_probes() {
    let fixture = spawn_fixture(FixtureBehavior::AlwaysOk).await;
    let options = engine_options(fixture.base_url(), &[]);
    let executor = ProbeExecutor::new(&options).unwrap();

    let target = format!("{}/admin", fixture.base_url());
    let first = executor.probe(&target).await;
    let second = executor.probe(&target).await;

    assert_eq!(fixture.hits(), 1);
    assert_eq!(executor.requests_issued(), 1);
    assert_eq!(first, second);
}

#[tokio::test]
async fn disabled_cache_probes_every_time() {
    let fixture = spawn_fixture(FixtureBehavior::AlwaysOk).await;
    let mut options = engine_options(fixture.base_url(), &[]);
    options.cache_size = 0;
    let executor = ProbeExecutor::new(&options).unwrap();

    let target = format!("{}/admin", fixture.base_url());
    let first = executor.probe(&target).await;
    let second = executor.probe(&target).await;

    assert_eq!(fixture.hits(), 2);
    assert_eq!(first.status, second.status);
}

#[tokio::test]
async fn transient_failures_retry_then_downgrade_to_result() {
    let fixture = spawn_fixture(FixtureBehavior::DropConnections).await;
    let mut options = engine_options(fixture.base_url(), &[]);
    options.retries = 2;
    let executor = ProbeExecutor::new(&options).unwrap();

    let target = format!("{}/admin", fixture.base_url());
    let result = executor.probe(&target).await;

    // retries + 1 attempts, then a failure result instead of an error.
    assert_eq!(fixture.hits(), 3);
    assert_eq!(executor.requests_issued(), 3);
    assert_eq!(result.status, 0);
    assert!(!result.found);
}

#[tokio::test]
async fn every_target_is_probed_exactly_once_across_batches() {
    let fixture = spawn_fixture(FixtureBehavior::AlwaysOk).await;
    let words: Vec<String> = (0..10).map(|i| format!("dir{i}")).collect();
    let word_refs: Vec<&str> = words.iter().map(|s| s.as_str()).collect();
    let mut options = engine_options(fixture.base_url(), &word_refs);
    options.batch_size = 3;
    options.threads = 2;
    let engine = Bruteforcer::new(options).unwrap();
    let outcome = engine.run(CancelFlag::new()).await.unwrap();

    assert_eq!(outcome.matches.len(), 10);
    assert_eq!(fixture.hits(), 10);
    let unique: HashSet<&str> = outcome.matches.iter().map(|r| r.target.as_str()).collect();
    assert_eq!(unique.len(), 10);
}

#[tokio::test]
async fn duplicate_words_probe_each_target_once() {
    let fixture = spawn_fixture(FixtureBehavior::AlwaysOk).await;
    let mut options = engine_options(fixture.base_url(), &["admin", "admin", "login"]);
    options.batch_size = 1;
    options.threads = 1;
    let engine = Bruteforcer::new(options).unwrap();
    let outcome = engine.run(CancelFlag::new()).await.unwrap();

    // The repeated word collapses to one scheduled target, so the session
    // never reports more findings than requests.
    assert_eq!(fixture.hits(), 2);
    assert_eq!(outcome.total_requests, 2);
    assert_eq!(outcome.matches.len(), 2);
    assert!(outcome.total_requests >= outcome.matches.len() as u64);
}

#[tokio::test]
async fn preset_cancellation_issues_no_requests() {
    let fixture = spawn_fixture(FixtureBehavior::AlwaysOk).await;
    let options = engine_options(fixture.base_url(), &["admin", "login"]);
    let engine = Bruteforcer::new(options).unwrap();

    let cancel = CancelFlag::new();
    cancel.cancel();
    let outcome = engine.run(cancel).await.unwrap();

    assert!(outcome.cancelled);
    assert!(outcome.matches.is_empty());
    assert_eq!(outcome.total_requests, 0);
    assert_eq!(fixture.hits(), 0);
}

struct CountingEnricher {
    calls: Arc<AtomicUsize>,
}

impl ScanHook for CountingEnricher {
    fn name(&self) -> &str {
        "counting-enricher"
    }

    fn on_result(&self, mut record: HookRecord) -> Result<HookRecord, HookError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        record.insert("note".to_string(), json!("enriched"));
        Ok(record)
    }
}

#[tokio::test]
async fn result_hooks_run_for_every_probe_and_enrich_matches() {
    let fixture = spawn_fixture(FixtureBehavior::Routes(HashSet::from([
        "/admin".to_string()
    ])))
    .await;
    let calls = Arc::new(AtomicUsize::new(0));
    let mut hooks = HookPipeline::new();
    hooks.register(Arc::new(CountingEnricher {
        calls: calls.clone(),
    }));

    let options = engine_options(fixture.base_url(), &["admin", "missing"]);
    let engine = Bruteforcer::new(options).unwrap().with_hooks(hooks);
    let outcome = engine.run(CancelFlag::new()).await.unwrap();

    // on_result fires for found and not-found targets alike.
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(outcome.matches.len(), 1);
    assert_eq!(outcome.records[0]["note"], "enriched");
}

struct RetriesOverride;

impl ScanHook for RetriesOverride {
    fn name(&self) -> &str {
        "retries-override"
    }

    fn pre_scan(&self, mut config: Value) -> Result<Value, HookError> {
        if let Some(obj) = config.as_object_mut() {
            obj.insert("retries".to_string(), json!(0));
        }
        Ok(config)
    }
}

#[tokio::test]
async fn pre_scan_output_becomes_the_effective_config() {
    let fixture = spawn_fixture(FixtureBehavior::DropConnections).await;
    let mut hooks = HookPipeline::new();
    hooks.register(Arc::new(RetriesOverride));

    let mut options = engine_options(fixture.base_url(), &["admin"]);
    options.retries = 5;
    let engine = Bruteforcer::new(options).unwrap().with_hooks(hooks);
    let outcome = engine.run(CancelFlag::new()).await.unwrap();

    // With retries forced to 0, exactly one attempt reaches the fixture.
    assert_eq!(fixture.hits(), 1);
    assert_eq!(outcome.total_requests, 1);
    assert!(outcome.matches.is_empty());
}

struct ZeroThreads;

impl ScanHook for ZeroThreads {
    fn name(&self) -> &str {
        "zero-threads"
    }

    fn pre_scan(&self, mut config: Value) -> Result<Value, HookError> {
        if let Some(obj) = config.as_object_mut() {
            obj.insert("threads".to_string(), json!(0));
            obj.insert("retries".to_string(), json!(0));
        }
        Ok(config)
    }
}

#[tokio::test]
async fn pre_scan_output_failing_validation_is_discarded_whole() {
    let fixture = spawn_fixture(FixtureBehavior::DropConnections).await;
    let mut hooks = HookPipeline::new();
    hooks.register(Arc::new(ZeroThreads));

    let mut options = engine_options(fixture.base_url(), &["admin"]);
    options.retries = 1;
    let engine = Bruteforcer::new(options).unwrap().with_hooks(hooks);
    let outcome = engine.run(CancelFlag::new()).await.unwrap();

    // threads=0 fails the same validation the constructor applies, so the
    // whole snapshot is rejected: retries stays 1 and two attempts go out.
    assert_eq!(fixture.hits(), 2);
    assert_eq!(outcome.total_requests, 2);
    assert!(outcome.matches.is_empty());
}

#[tokio::test]
async fn completed_sessions_are_persisted_to_history() {
    let fixture = spawn_fixture(FixtureBehavior::AlwaysOk).await;
    let dir = tempfile::tempdir().unwrap();
    let history_path = dir.path().join("history.json");

    let options = engine_options(fixture.base_url(), &["admin", "login"]);
    let engine = Bruteforcer::new(options)
        .unwrap()
        .with_history(HistoryStore::open(&history_path).unwrap());
    let outcome = engine.run(CancelFlag::new()).await.unwrap();

    assert_eq!(outcome.session_id, Some(1));

    let store = HistoryStore::open(&history_path).unwrap();
    let sessions = store.list(5).await.unwrap();
    assert_eq!(sessions.len(), 1);
    let session = &sessions[0];
    assert_eq!(session.url, fixture.base_url());
    assert_eq!(session.mode, "directory");
    assert_eq!(session.total_requests, 2);
    assert_eq!(session.found_count, 2);
    assert_eq!(session.results.len(), 2);
}

#[tokio::test]
async fn history_write_failure_does_not_fail_the_scan() {
    let fixture = spawn_fixture(FixtureBehavior::AlwaysOk).await;
    // A directory as the history file makes the write fail.
    let dir = tempfile::tempdir().unwrap();

    let options = engine_options(fixture.base_url(), &["admin"]);
    let engine = Bruteforcer::new(options)
        .unwrap()
        .with_history(HistoryStore::open(dir.path()).unwrap());
    let outcome = engine.run(CancelFlag::new()).await.unwrap();

    assert_eq!(outcome.session_id, None);
    assert_eq!(outcome.matches.len(), 1);
}

#[tokio::test]
async fn subdomain_mode_builds_label_targets() {
    // No network here; subdomain targets point at synthetic hosts.
    let options = Options {
        base_url: "example.com".to_string(),
        wordlist: WordlistSource::Inline(vec!["api".to_string()]),
        mode: ProbeMode::Subdomain,
        ..Default::default()
    };
    let engine = Bruteforcer::new(options).unwrap();
    assert_eq!(engine.options().base_url, "example.com");
}
