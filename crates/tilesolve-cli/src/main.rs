//! Tilesolve CLI - run coordinators, workers, and local searches.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tilesolve_coordinator::{http, Coordinator, CoordinatorConfig, SearchEvent, StatusSnapshot};
use tilesolve_core::{Board, DepthBoundedSolver, Move, Solver, SolverConfig, WorkerId};
use tilesolve_transport::cluster::ClusterBus;
use tilesolve_transport::http::HttpLink;
use tilesolve_transport::CoordinatorLink;
use tilesolve_worker::{Worker, WorkerConfig};

/// Tilesolve - distributed sliding-tile puzzle search
#[derive(Parser)]
#[command(name = "tilesolve")]
#[command(about = "Distributed sliding-tile puzzle solver", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a coordinator serving the HTTP transport
    Coordinator {
        /// Bind address for the HTTP endpoint
        #[arg(long, default_value = "127.0.0.1:7070")]
        bind: String,

        /// Board side length
        #[arg(long, default_value_t = 4)]
        size: u8,

        /// Scramble walk length
        #[arg(long, default_value_t = 80)]
        scramble: u32,

        /// Scramble seed
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Minimum number of initial work units
        #[arg(long, default_value_t = 8)]
        fanout: usize,

        /// Expansion budget per unit
        #[arg(long, default_value_t = 60)]
        budget: u32,

        /// Heartbeat silence before a worker is unreachable (seconds)
        #[arg(long, default_value_t = 45)]
        heartbeat_timeout: u64,
    },

    /// Run a worker against a remote coordinator
    Worker {
        /// Coordinator base URL
        #[arg(long, default_value = "http://127.0.0.1:7070")]
        coordinator: String,

        /// Worker ID (generated when omitted)
        #[arg(long)]
        id: Option<String>,

        /// Poll delay when no work is available (milliseconds)
        #[arg(long, default_value_t = 500)]
        poll_ms: u64,

        /// Heartbeat interval (seconds)
        #[arg(long, default_value_t = 15)]
        heartbeat_secs: u64,

        /// Search depth per expansion
        #[arg(long, default_value_t = 10)]
        horizon: u32,
    },

    /// Solve locally: coordinator plus workers over the cluster transport
    Solve {
        /// Board side length
        #[arg(long, default_value_t = 3)]
        size: u8,

        /// Scramble walk length
        #[arg(long, default_value_t = 20)]
        scramble: u32,

        /// Scramble seed
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Number of worker instances
        #[arg(long, default_value_t = 4)]
        workers: usize,

        /// Minimum number of initial work units
        #[arg(long, default_value_t = 8)]
        fanout: usize,

        /// Expansion budget per unit
        #[arg(long, default_value_t = 60)]
        budget: u32,

        /// Search depth per expansion
        #[arg(long, default_value_t = 10)]
        horizon: u32,
    },

    /// Query a remote coordinator's status
    Status {
        /// Coordinator base URL
        #[arg(long, default_value = "http://127.0.0.1:7070")]
        coordinator: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Coordinator {
            bind,
            size,
            scramble,
            seed,
            fanout,
            budget,
            heartbeat_timeout,
        } => {
            run_coordinator(bind, size, scramble, seed, fanout, budget, heartbeat_timeout).await?;
        }
        Commands::Worker {
            coordinator,
            id,
            poll_ms,
            heartbeat_secs,
            horizon,
        } => {
            run_worker(coordinator, id, poll_ms, heartbeat_secs, horizon).await?;
        }
        Commands::Solve {
            size,
            scramble,
            seed,
            workers,
            fanout,
            budget,
            horizon,
        } => {
            run_solve(size, scramble, seed, workers, fanout, budget, horizon).await?;
        }
        Commands::Status { coordinator } => {
            run_status(coordinator).await?;
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_coordinator(
    bind: String,
    size: u8,
    scramble: u32,
    seed: u64,
    fanout: usize,
    budget: u32,
    heartbeat_timeout: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let coordinator = Arc::new(Coordinator::new(CoordinatorConfig {
        heartbeat_timeout_secs: heartbeat_timeout,
        fanout,
        unit_budget: budget,
        ..Default::default()
    }));
    let mut events = coordinator.subscribe();

    let board = Board::scrambled(size, scramble, seed)?;
    println!("Initial board ({size}x{size}, {scramble} scramble steps, seed {seed}):\n{board}\n");
    coordinator.seed(&board).await;

    let sweeper = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.run_sweeper().await })
    };

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!(bind = %bind, "Coordinator listening");
    let app = http::router(coordinator.clone());
    let server = tokio::spawn(async move { axum::serve(listener, app).await });

    let outcome = wait_for_outcome(&mut events).await;
    print_outcome(&board, outcome);

    // Grace period so polling workers see the drain before the endpoint
    // goes away.
    tokio::time::sleep(Duration::from_secs(2)).await;
    server.abort();
    sweeper.abort();
    Ok(())
}

async fn run_worker(
    coordinator: String,
    id: Option<String>,
    poll_ms: u64,
    heartbeat_secs: u64,
    horizon: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = WorkerConfig {
        worker_id: id.map(WorkerId::new).unwrap_or_else(WorkerId::generate),
        address: coordinator.clone(),
        poll_interval: Duration::from_millis(poll_ms),
        heartbeat_interval: Duration::from_secs(heartbeat_secs),
        ..Default::default()
    };
    info!(worker_id = %config.worker_id, coordinator = %coordinator, "Starting worker");

    let link: Arc<dyn CoordinatorLink> = Arc::new(HttpLink::new(&coordinator));
    let solver: Arc<dyn Solver> = Arc::new(DepthBoundedSolver::new(SolverConfig {
        horizon,
        ..Default::default()
    }));
    Worker::new(config, link, solver).run().await?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_solve(
    size: u8,
    scramble: u32,
    seed: u64,
    workers: usize,
    fanout: usize,
    budget: u32,
    horizon: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let coordinator = Arc::new(Coordinator::new(CoordinatorConfig {
        fanout,
        unit_budget: budget,
        ..Default::default()
    }));
    let mut events = coordinator.subscribe();

    let board = Board::scrambled(size, scramble, seed)?;
    println!("Initial board ({size}x{size}, {scramble} scramble steps, seed {seed}):\n{board}\n");
    coordinator.seed(&board).await;

    let (bus, inbox) = ClusterBus::new(64);
    let serve = tilesolve_coordinator::cluster::spawn(coordinator.clone(), inbox);

    let solver: Arc<dyn Solver> = Arc::new(DepthBoundedSolver::new(SolverConfig {
        horizon,
        ..Default::default()
    }));
    let mut handles = Vec::new();
    for i in 0..workers.max(1) {
        let config = WorkerConfig {
            worker_id: WorkerId::new(format!("local-{i}")),
            address: format!("cluster://local-{i}"),
            poll_interval: Duration::from_millis(50),
            heartbeat_interval: Duration::from_secs(5),
            ..Default::default()
        };
        let link: Arc<dyn CoordinatorLink> = Arc::new(bus.link());
        handles.push(tokio::spawn(Worker::new(config, link, solver.clone()).run()));
    }

    let outcome = wait_for_outcome(&mut events).await;
    print_outcome(&board, outcome);

    for handle in handles {
        let _ = handle.await;
    }
    drop(bus);
    let _ = serve.await;
    Ok(())
}

async fn run_status(coordinator: String) -> Result<(), Box<dyn std::error::Error>> {
    let url = format!("{}/v1/status", coordinator.trim_end_matches('/'));
    let snapshot: StatusSnapshot = reqwest::get(&url).await?.json().await?;

    println!("Search:");
    println!("  Pending:    {}", snapshot.units_pending);
    println!("  In flight:  {}", snapshot.units_in_flight);
    println!("  Merged:     {}", snapshot.units_merged);
    println!("  Created:    {}", snapshot.units_created);
    println!("  Terminated: {}", snapshot.terminated);
    if let Some(path) = &snapshot.solution {
        println!("  Solution:   {} moves: {}", path.len(), render_path(path));
    }

    println!("\nWorkers ({}):", snapshot.workers.len());
    println!("{:<36}  {:<12}  {:<8}  {}", "ID", "STATE", "STRIKES", "LAST HEARTBEAT");
    println!("{}", "-".repeat(80));
    for worker in &snapshot.workers {
        println!(
            "{:<36}  {:<12}  {:<8}  {}",
            worker.worker_id,
            format!("{:?}", worker.state).to_uppercase(),
            worker.strikes,
            worker.last_heartbeat.format("%Y-%m-%d %H:%M:%S"),
        );
    }
    Ok(())
}

/// Drain events until the search reaches a terminal state.
async fn wait_for_outcome(events: &mut broadcast::Receiver<SearchEvent>) -> Option<Vec<Move>> {
    loop {
        match events.recv().await {
            Ok(SearchEvent::Progress {
                units_pending,
                units_in_flight,
            }) => {
                info!(pending = units_pending, in_flight = units_in_flight, "Progress");
            }
            Ok(SearchEvent::Solved { path }) => return Some(path),
            Ok(SearchEvent::Exhausted) => return None,
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

fn print_outcome(board: &Board, outcome: Option<Vec<Move>>) {
    match outcome {
        Some(path) => {
            println!("Solved in {} moves: {}", path.len(), render_path(&path));
            let mut b = board.clone();
            for &mv in &path {
                if let Some(next) = b.apply(mv) {
                    b = next;
                }
            }
            println!("\nFinal board:\n{b}");
        }
        None => println!("No solution found within the configured budgets."),
    }
}

fn render_path(path: &[Move]) -> String {
    path.iter().map(|m| m.to_string()).collect()
}
