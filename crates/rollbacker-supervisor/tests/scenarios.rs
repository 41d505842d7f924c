//! End-to-end supervisor scenarios.
//!
//! The stack under test: `Supervisor` → `HttpProber` → TCP → `MockHealthServer`,
//! with container operations recorded by `RecordingRuntime` and good images
//! persisted to a real state file in a temp directory.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rollbacker_core::{ContainerIdentity, ImageReference, PortMapping, SupervisorConfig};
use rollbacker_health::HttpProber;
use rollbacker_runtime::{
    ContainerHandle, ContainerRuntime, RunSpec, RuntimeError, RuntimeFuture,
};
use rollbacker_state::GoodImageStore;
use rollbacker_supervisor::{CycleOutcome, Supervisor};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

// ── MockHealthServer ─────────────────────────────────────────────────

/// Answers every request with a fixed status and counts requests.
struct MockHealthServer {
    url: String,
    hits: Arc<AtomicUsize>,
}

impl MockHealthServer {
    async fn start(status_line: &'static str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = hits.clone();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let _ = stream.read(&mut buf).await;
                    let response = format!("HTTP/1.1 {status_line}\r\ncontent-length: 0\r\n\r\n");
                    let _ = stream.write_all(response.as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
            }
        });

        Self {
            url: format!("http://{addr}/health"),
            hits,
        }
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// An endpoint nobody listens on.
const REFUSED_URL: &str = "http://127.0.0.1:1/health";

// ── RecordingRuntime ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum Op {
    Find,
    Stop(String),
    Run(RunSpec),
    ImageTag(String),
}

#[derive(Default)]
struct RecordingRuntime {
    container: Option<ContainerHandle>,
    tag: Option<ImageReference>,
    fail_stop: bool,
    ops: Mutex<Vec<Op>>,
}

impl RecordingRuntime {
    fn empty() -> Self {
        Self::default()
    }

    fn with_container(tag: Option<&str>) -> Self {
        Self {
            container: Some(ContainerHandle {
                id: "4f1d2c".into(),
                name: ContainerIdentity::new("my_app"),
                image_id: Some("sha256:deadbeef".into()),
                auto_remove: false,
            }),
            tag: tag.map(ImageReference::new),
            ..Default::default()
        }
    }

    fn ops(&self) -> Vec<Op> {
        self.ops.lock().unwrap().clone()
    }

    fn mutating_ops(&self) -> Vec<Op> {
        self.ops()
            .into_iter()
            .filter(|op| matches!(op, Op::Stop(_) | Op::Run(_)))
            .collect()
    }

    fn record(&self, op: Op) {
        self.ops.lock().unwrap().push(op);
    }
}

impl ContainerRuntime for RecordingRuntime {
    fn find<'a>(
        &'a self,
        identity: &'a ContainerIdentity,
    ) -> RuntimeFuture<'a, Option<ContainerHandle>> {
        Box::pin(async move {
            self.record(Op::Find);
            Ok(self.container.clone().filter(|c| &c.name == identity))
        })
    }

    fn stop<'a>(&'a self, handle: &'a ContainerHandle) -> RuntimeFuture<'a, ()> {
        Box::pin(async move {
            self.record(Op::Stop(handle.id.clone()));
            if self.fail_stop {
                return Err(RuntimeError::Stop {
                    container: handle.name.to_string(),
                    message: "timeout waiting for container to stop".into(),
                });
            }
            Ok(())
        })
    }

    fn run_detached<'a>(&'a self, spec: &'a RunSpec) -> RuntimeFuture<'a, String> {
        Box::pin(async move {
            self.record(Op::Run(spec.clone()));
            Ok("9a8b7c".to_string())
        })
    }

    fn current_image_tag<'a>(
        &'a self,
        handle: &'a ContainerHandle,
    ) -> RuntimeFuture<'a, Option<ImageReference>> {
        Box::pin(async move {
            self.record(Op::ImageTag(handle.id.clone()));
            Ok(self.tag.clone())
        })
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

fn config(dir: &tempfile::TempDir, health_url: &str) -> SupervisorConfig {
    SupervisorConfig {
        health_url: health_url.to_string(),
        state_file: dir.path().join("good_images.json"),
        check_interval: Duration::from_millis(10),
        ..Default::default()
    }
}

fn supervisor(config: &SupervisorConfig, runtime: Arc<RecordingRuntime>) -> Supervisor {
    Supervisor::new(config, runtime, Arc::new(HttpProber::from_config(config)))
}

fn my_app() -> ContainerIdentity {
    ContainerIdentity::new("my_app")
}

// ── Scenarios ────────────────────────────────────────────────────────

#[tokio::test]
async fn scenario_a_absent_container_takes_no_action() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockHealthServer::start("200 OK").await;
    let cfg = config(&dir, &server.url);
    let runtime = Arc::new(RecordingRuntime::empty());

    let outcome = supervisor(&cfg, runtime.clone()).run_once().await;

    assert_eq!(outcome, CycleOutcome::ContainerMissing);
    assert_eq!(runtime.ops(), vec![Op::Find]);
    assert_eq!(server.hits(), 0, "probe must not run without a container");
    assert!(!cfg.state_file.exists());
}

#[tokio::test]
async fn scenario_b_healthy_tagged_container_is_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockHealthServer::start("200 OK").await;
    let cfg = config(&dir, &server.url);
    let runtime = Arc::new(RecordingRuntime::with_container(Some("myapp:v3")));

    let outcome = supervisor(&cfg, runtime.clone()).run_once().await;

    assert_eq!(
        outcome,
        CycleOutcome::RecordedGood(ImageReference::new("myapp:v3"))
    );
    assert_eq!(server.hits(), 1);
    assert!(runtime.mutating_ops().is_empty());

    let store = GoodImageStore::open(&cfg.state_file);
    assert_eq!(
        store.get(&my_app()).unwrap(),
        Some(ImageReference::new("myapp:v3"))
    );
}

#[tokio::test]
async fn scenario_b_healthy_overwrites_older_good_image() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockHealthServer::start("200 OK").await;
    let cfg = config(&dir, &server.url);
    let store = GoodImageStore::open(&cfg.state_file);
    store.save(&my_app(), &ImageReference::new("myapp:v2")).unwrap();
    store
        .save(&ContainerIdentity::new("other"), &ImageReference::new("other:v9"))
        .unwrap();

    let runtime = Arc::new(RecordingRuntime::with_container(Some("myapp:v3")));
    supervisor(&cfg, runtime).run_once().await;

    let record = store.load().unwrap();
    assert_eq!(record[&my_app()], ImageReference::new("myapp:v3"));
    assert_eq!(
        record[&ContainerIdentity::new("other")],
        ImageReference::new("other:v9")
    );
}

#[tokio::test]
async fn scenario_c_unhealthy_rolls_back_to_good_image() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockHealthServer::start("500 Internal Server Error").await;
    let cfg = config(&dir, &server.url);
    GoodImageStore::open(&cfg.state_file)
        .save(&my_app(), &ImageReference::new("myapp:v2"))
        .unwrap();
    let runtime = Arc::new(RecordingRuntime::with_container(Some("myapp:v3")));

    let outcome = supervisor(&cfg, runtime.clone()).run_once().await;

    assert_eq!(
        outcome,
        CycleOutcome::RolledBack(ImageReference::new("myapp:v2"))
    );
    assert_eq!(
        runtime.mutating_ops(),
        vec![
            Op::Stop("4f1d2c".into()),
            Op::Run(RunSpec {
                image: ImageReference::new("myapp:v2"),
                name: my_app(),
                ports: PortMapping::new(5000, 5000),
                auto_remove: true,
            }),
        ]
    );

    // A rollback does not rewrite the record.
    assert_eq!(
        GoodImageStore::open(&cfg.state_file).get(&my_app()).unwrap(),
        Some(ImageReference::new("myapp:v2"))
    );
}

#[tokio::test]
async fn scenario_c_failed_stop_is_not_recorded_and_never_runs() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockHealthServer::start("503 Service Unavailable").await;
    let cfg = config(&dir, &server.url);
    GoodImageStore::open(&cfg.state_file)
        .save(&my_app(), &ImageReference::new("myapp:v2"))
        .unwrap();
    let runtime = Arc::new(RecordingRuntime {
        fail_stop: true,
        ..RecordingRuntime::with_container(Some("myapp:v3"))
    });

    let outcome = supervisor(&cfg, runtime.clone()).run_once().await;

    assert_eq!(outcome, CycleOutcome::RollbackFailed);
    assert_eq!(runtime.mutating_ops(), vec![Op::Stop("4f1d2c".into())]);
    assert_eq!(
        GoodImageStore::open(&cfg.state_file).get(&my_app()).unwrap(),
        Some(ImageReference::new("myapp:v2"))
    );
}

#[tokio::test]
async fn scenario_d_refused_probe_without_good_image_leaves_container() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(&dir, REFUSED_URL);
    let runtime = Arc::new(RecordingRuntime::with_container(Some("myapp:v3")));

    let outcome = supervisor(&cfg, runtime.clone()).run_once().await;

    assert_eq!(outcome, CycleOutcome::RollbackSkipped);
    assert!(runtime.mutating_ops().is_empty());
    assert!(!cfg.state_file.exists());
}

#[tokio::test]
async fn recovery_after_rollback_records_the_restored_image() {
    let dir = tempfile::tempdir().unwrap();
    let failing = MockHealthServer::start("500 Internal Server Error").await;
    let healthy = MockHealthServer::start("200 OK").await;

    let cfg = config(&dir, &failing.url);
    GoodImageStore::open(&cfg.state_file)
        .save(&my_app(), &ImageReference::new("myapp:v2"))
        .unwrap();

    let broken = Arc::new(RecordingRuntime::with_container(Some("myapp:v3")));
    assert_eq!(
        supervisor(&cfg, broken).run_once().await,
        CycleOutcome::RolledBack(ImageReference::new("myapp:v2"))
    );

    // Next cycle sees the restored container answering 200.
    let cfg = config(&dir, &healthy.url);
    let restored = Arc::new(RecordingRuntime::with_container(Some("myapp:v2")));
    assert_eq!(
        supervisor(&cfg, restored).run_once().await,
        CycleOutcome::RecordedGood(ImageReference::new("myapp:v2"))
    );
}
