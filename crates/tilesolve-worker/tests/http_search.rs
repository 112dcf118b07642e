//! End-to-end search over the HTTP remote-call transport.

use std::sync::Arc;
use std::time::Duration;

use tilesolve_core::{Board, DepthBoundedSolver, Register, Solver, WorkerId};
use tilesolve_coordinator::{http, Coordinator, CoordinatorConfig, SearchEvent};
use tilesolve_transport::http::HttpLink;
use tilesolve_transport::{CoordinatorLink, TransportError};
use tilesolve_worker::{Worker, WorkerConfig};

async fn serve_coordinator(coordinator: Arc<Coordinator>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    let app = http::router(coordinator);
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn test_worker_solves_over_http() {
    let coordinator = Arc::new(Coordinator::new(CoordinatorConfig {
        fanout: 4,
        unit_budget: 30,
        ..Default::default()
    }));
    let board = Board::scrambled(3, 8, 5).unwrap();
    let mut events = coordinator.subscribe();
    coordinator.seed(&board).await;

    let base_url = serve_coordinator(coordinator.clone()).await;

    let link: Arc<dyn CoordinatorLink> = Arc::new(HttpLink::new(&base_url));
    let config = WorkerConfig {
        worker_id: WorkerId::new("http-w1"),
        address: base_url.clone(),
        poll_interval: Duration::from_millis(10),
        heartbeat_interval: Duration::from_millis(100),
        send_retries: 3,
        retry_backoff: Duration::from_millis(20),
    };
    let solver: Arc<dyn Solver> = Arc::new(DepthBoundedSolver::default());
    let worker = tokio::spawn(Worker::new(config, link, solver).run());

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

    let mut b = board.clone();
    for &mv in &path {
        b = b.apply(mv).expect("replayable path");
    }
    assert!(b.is_goal());

    tokio::time::timeout(Duration::from_secs(10), worker)
        .await
        .expect("worker drains")
        .expect("worker task completes")
        .expect("worker run succeeds");

    // The protocol error taxonomy survives the HTTP round trip.
    let late = HttpLink::new(&base_url);
    let err = late
        .register(Register {
            worker_id: WorkerId::new("late"),
            address: "late".into(),
        })
        .await
        .expect_err("terminated search refuses joins");
    assert!(matches!(
        err,
        TransportError::Remote(tilesolve_core::RemoteError::Terminated)
    ));
}
