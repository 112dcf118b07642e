//! End-to-end search over the in-process cluster transport.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tilesolve_core::{
    Board, DepthBoundedSolver, Heartbeat, Leave, LivenessAck, OutcomeReport, Register, Solver,
    SolverConfig, WorkReply, WorkRequest, WorkUnit, WorkerId,
};
use tilesolve_coordinator::{cluster, Coordinator, CoordinatorConfig, SearchEvent};
use tilesolve_transport::cluster::ClusterBus;
use tilesolve_transport::{CoordinatorLink, TransportError};
use tilesolve_worker::{Worker, WorkerConfig};

/// Link wrapper that drops the first few outcome submissions.
struct FlakyReports {
    inner: Arc<dyn CoordinatorLink>,
    failures_left: AtomicU32,
}

#[async_trait]
impl CoordinatorLink for FlakyReports {
    async fn register(&self, msg: Register) -> Result<(), TransportError> {
        self.inner.register(msg).await
    }

    async fn request_work(&self, msg: WorkRequest) -> Result<WorkReply, TransportError> {
        self.inner.request_work(msg).await
    }

    async fn submit_outcome(&self, msg: OutcomeReport) -> Result<(), TransportError> {
        if self.failures_left.load(Ordering::SeqCst) > 0 {
            self.failures_left.fetch_sub(1, Ordering::SeqCst);
            return Err(TransportError::Unreachable("injected outage".into()));
        }
        self.inner.submit_outcome(msg).await
    }

    async fn heartbeat(&self, msg: Heartbeat) -> Result<LivenessAck, TransportError> {
        self.inner.heartbeat(msg).await
    }

    async fn leave(&self, msg: Leave) -> Result<(), TransportError> {
        self.inner.leave(msg).await
    }
}

fn fast_worker_config(name: &str) -> WorkerConfig {
    WorkerConfig {
        worker_id: WorkerId::new(name),
        address: format!("cluster://{name}"),
        poll_interval: Duration::from_millis(10),
        heartbeat_interval: Duration::from_millis(100),
        send_retries: 3,
        retry_backoff: Duration::from_millis(20),
    }
}

fn test_coordinator() -> Arc<Coordinator> {
    Arc::new(Coordinator::new(CoordinatorConfig {
        heartbeat_timeout_secs: 30,
        sweep_interval_secs: 1,
        max_strikes: 2,
        fanout: 4,
        unit_budget: 30,
    }))
}

fn replay(root: &Board, path: &[tilesolve_core::Move]) -> Board {
    let mut b = root.clone();
    for &mv in path {
        b = b.apply(mv).expect("replayable path");
    }
    b
}

#[tokio::test]
async fn test_two_workers_find_a_solution() {
    let coordinator = test_coordinator();
    let board = Board::scrambled(3, 8, 3).unwrap();
    let mut events = coordinator.subscribe();
    coordinator.seed(&board).await;

    let (bus, inbox) = ClusterBus::new(64);
    let serve = cluster::spawn(coordinator.clone(), inbox);

    let solver: Arc<dyn Solver> = Arc::new(DepthBoundedSolver::default());
    let mut workers = Vec::new();
    for name in ["w1", "w2"] {
        let link: Arc<dyn CoordinatorLink> = Arc::new(bus.link());
        let worker = Worker::new(fast_worker_config(name), link, solver.clone());
        workers.push(tokio::spawn(worker.run()));
    }

    let path = tokio::time::timeout(Duration::from_secs(60), async {
        loop {
            match events.recv().await.expect("event stream open") {
                SearchEvent::Solved { path } => break path,
                SearchEvent::Progress { .. } => continue,
                SearchEvent::Exhausted => panic!("solvable board exhausted"),
            }
        }
    })
    .await
    .expect("search finishes");

    assert!(replay(&board, &path).is_goal());
    assert!(coordinator.is_terminated().await);

    // Workers drain gracefully once the search is over.
    for handle in workers {
        tokio::time::timeout(Duration::from_secs(10), handle)
            .await
            .expect("worker drains")
            .expect("worker task completes")
            .expect("worker run succeeds");
    }

    drop(bus);
    serve.await.unwrap();
}

#[tokio::test]
async fn test_undeliverable_report_releases_the_unit() {
    let coordinator = test_coordinator();
    let mut events = coordinator.subscribe();
    let board = Board::scrambled(3, 6, 11).unwrap();
    coordinator
        .seed_units(vec![WorkUnit::root(board.clone(), 30)])
        .await;

    let (bus, inbox) = ClusterBus::new(64);
    let serve = cluster::spawn(coordinator.clone(), inbox);

    // The whole first delivery cycle fails (initial send plus 3 retries).
    // The worker must leave, rejoin, pick the requeued unit back up, and
    // get the second report through.
    let link: Arc<dyn CoordinatorLink> = Arc::new(FlakyReports {
        inner: Arc::new(bus.link()),
        failures_left: AtomicU32::new(4),
    });
    let solver: Arc<dyn Solver> = Arc::new(DepthBoundedSolver::default());
    let worker = tokio::spawn(Worker::new(fast_worker_config("w1"), link, solver).run());

    let path = tokio::time::timeout(Duration::from_secs(60), async {
        loop {
            match events.recv().await.expect("event stream open") {
                SearchEvent::Solved { path } => break path,
                SearchEvent::Progress { .. } => continue,
                SearchEvent::Exhausted => panic!("solvable board exhausted"),
            }
        }
    })
    .await
    .expect("search finishes despite the dropped reports");

    assert!(replay(&board, &path).is_goal());

    tokio::time::timeout(Duration::from_secs(10), worker)
        .await
        .expect("worker drains")
        .expect("worker task completes")
        .expect("worker run succeeds");

    drop(bus);
    serve.await.unwrap();
}

#[tokio::test]
async fn test_budget_too_small_exhausts_without_solution() {
    let coordinator = test_coordinator();
    let mut events = coordinator.subscribe();

    // Far from the goal with a 3-ply budget: exhaustion is certain.
    let board = Board::scrambled(4, 80, 11).unwrap();
    coordinator
        .seed_units(vec![WorkUnit::root(board, 3)])
        .await;

    let (bus, inbox) = ClusterBus::new(64);
    let serve = cluster::spawn(coordinator.clone(), inbox);

    let solver: Arc<dyn Solver> = Arc::new(DepthBoundedSolver::new(SolverConfig {
        horizon: 10,
        node_cap: 2_000_000,
    }));
    let link: Arc<dyn CoordinatorLink> = Arc::new(bus.link());
    let worker = tokio::spawn(Worker::new(fast_worker_config("w1"), link, solver).run());

    tokio::time::timeout(Duration::from_secs(60), async {
        loop {
            match events.recv().await.expect("event stream open") {
                SearchEvent::Exhausted => break,
                SearchEvent::Progress { .. } => continue,
                SearchEvent::Solved { .. } => panic!("3 plies cannot solve this board"),
            }
        }
    })
    .await
    .expect("search finishes");

    assert!(coordinator.is_terminated().await);
    assert_eq!(coordinator.solution().await, None);

    tokio::time::timeout(Duration::from_secs(10), worker)
        .await
        .expect("worker drains")
        .expect("worker task completes")
        .expect("worker run succeeds");

    drop(bus);
    serve.await.unwrap();
}
