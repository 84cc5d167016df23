//! Demo: an HTTP app and an admin server under one supervisor.
//!
//! - `SIGINT` / `SIGTERM` drain in-flight requests and exit (a second signal forces it).
//! - `SIGHUP` (or `POST /upgrade` on the admin server) starts the same binary as
//!   the next generation on the same sockets; this process drains and exits once
//!   the successor is ready.
//!
//! On startup a line `ready generation=N pid=P http=ADDR admin=ADDR` is printed
//! to stdout. Logs go to stderr (`RUST_LOG` controls the filter).

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use gracevisor::{Config, HttpServer, ListenerInfo, Reloader, Subscribe, Supervisor};

#[derive(Debug, Parser)]
#[command(name = "gracevisor-demo", about = "HTTP demo with zero-downtime restarts")]
struct Args {
    /// Address of the application server.
    #[arg(long, env = "GRACEVISOR_HTTP_ADDR", default_value = "127.0.0.1:8080")]
    http_addr: String,

    /// Address of the admin server.
    #[arg(long, env = "GRACEVISOR_ADMIN_ADDR", default_value = "127.0.0.1:8081")]
    admin_addr: String,

    /// Graceful shutdown deadline per server (0 = unbounded).
    #[arg(long, default_value_t = 15)]
    shutdown_timeout_secs: u64,

    /// Deadline for a successor to become ready (0 = unbounded).
    #[arg(long, default_value_t = 60)]
    upgrade_timeout_secs: u64,

    /// Response delay of `GET /slow`, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    slow_ms: u64,

    /// Fail before becoming ready when started as this generation.
    #[arg(long, hide = true)]
    exit_at_generation: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cfg = Config {
        shutdown_timeout: Duration::from_secs(args.shutdown_timeout_secs),
        upgrade_timeout: Duration::from_secs(args.upgrade_timeout_secs),
        ..Config::default()
    };

    #[cfg(feature = "logging")]
    let subscribers: Vec<Arc<dyn Subscribe>> = vec![Arc::new(gracevisor::LogWriter::default())];
    #[cfg(not(feature = "logging"))]
    let subscribers: Vec<Arc<dyn Subscribe>> = Vec::new();

    let mut sup = Supervisor::builder(cfg)
        .with_subscribers(subscribers)
        .build()?;
    let reloader = Arc::clone(sup.reloader());
    if args.exit_at_generation == Some(reloader.generation()) {
        anyhow::bail!("refusing to start generation {}", reloader.generation());
    }

    let http = sup.listen("tcp", &args.http_addr)?;
    let admin = sup.listen("tcp", &args.admin_addr)?;
    let (http_at, admin_at) = (http.address(), admin.address());

    let app = HttpServer::new(app_router(
        reloader.generation(),
        Duration::from_millis(args.slow_ms),
    ));
    sup.serve("http", app.into_handle(), http)?;
    sup.serve(
        "admin",
        HttpServer::new(admin_router(Arc::clone(&reloader))).into_handle(),
        admin,
    )?;

    if reloader.has_parent() {
        let watcher = Arc::clone(&reloader);
        tokio::spawn(async move {
            match watcher.wait_for_parent().await {
                Ok(()) => info!("previous generation exited"),
                Err(err) => warn!(error = %err, "lost track of previous generation"),
            }
        });
    }

    println!(
        "ready generation={} pid={} http={} admin={}",
        reloader.generation(),
        std::process::id(),
        http_at,
        admin_at
    );

    sup.run().await?;
    Ok(())
}

fn app_router(generation: u64, slow: Duration) -> Router {
    let pid = std::process::id();
    Router::new()
        .route(
            "/",
            get(move || async move { format!("hello from generation {generation} (pid {pid})\n") }),
        )
        .route(
            "/slow",
            get(move || async move {
                tokio::time::sleep(slow).await;
                format!("slow done by generation {generation}\n")
            }),
        )
}

fn admin_router(reloader: Arc<Reloader>) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok\n" }))
        .route("/state", get(state))
        .route("/listeners", get(listeners))
        .route("/upgrade", post(upgrade))
        .with_state(reloader)
}

async fn state(State(reloader): State<Arc<Reloader>>) -> String {
    format!("{}\n", reloader.state())
}

async fn listeners(State(reloader): State<Arc<Reloader>>) -> Json<Vec<ListenerInfo>> {
    Json(reloader.listeners())
}

async fn upgrade(State(reloader): State<Arc<Reloader>>) -> (StatusCode, String) {
    match reloader.upgrade().await {
        Ok(()) => (StatusCode::OK, "upgraded\n".to_string()),
        Err(err) => (StatusCode::CONFLICT, format!("{err}\n")),
    }
}
