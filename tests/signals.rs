//! Termination signals delivered to the test process itself.
//!
//! Signal dispositions are process-wide, so every test here runs serially.
#![cfg(all(unix, feature = "http"))]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::routing::get;
use axum::Router;
use nix::sys::signal::{raise, Signal};
use serial_test::serial;
use tokio_util::sync::CancellationToken;

use gracevisor::{
    Config, GracefulServer, HttpServer, Listener, Server, ServerError, ServerHandle, Supervisor,
};

fn config(shutdown_timeout: Duration) -> Config {
    Config {
        shutdown_timeout,
        reload_on_hangup: false,
        ..Config::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn sigterm_drains_in_flight_requests() {
    let mut sup = Supervisor::builder(config(Duration::from_secs(5)))
        .build()
        .unwrap();

    let listener = sup.listen("tcp", "127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.address());
    let router = Router::new().route(
        "/slow",
        get(|| async {
            tokio::time::sleep(Duration::from_millis(400)).await;
            "drained"
        }),
    );
    sup.serve("http", HttpServer::new(router).into_handle(), listener)
        .unwrap();

    let running = tokio::spawn(sup.run());

    let slow = tokio::spawn(async move {
        reqwest::get(format!("{url}/slow")).await?.text().await
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    raise(Signal::SIGTERM).unwrap();

    assert_eq!(slow.await.unwrap().unwrap(), "drained");
    let result = tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .expect("supervisor did not stop")
        .unwrap();
    assert_eq!(result, Ok(()));
}

/// Graceful server whose shutdown never finishes.
#[derive(Default)]
struct Stuck {
    closed: CancellationToken,
}

#[async_trait]
impl Server for Stuck {
    async fn serve(&self, _listener: Listener) -> Result<(), ServerError> {
        self.closed.cancelled().await;
        Err(ServerError::Closed)
    }

    async fn close(&self) -> Result<(), ServerError> {
        self.closed.cancel();
        Ok(())
    }
}

#[async_trait]
impl GracefulServer for Stuck {
    async fn shutdown(&self) -> Result<(), ServerError> {
        std::future::pending().await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn second_signal_forces_a_stuck_shutdown() {
    // No deadline: only the repeated signal can end the graceful phase.
    let mut sup = Supervisor::builder(config(Duration::ZERO))
        .build()
        .unwrap();

    let stuck = Arc::new(Stuck::default());
    let listener = sup.listen("tcp", "127.0.0.1:0").unwrap();
    sup.serve("stuck", ServerHandle::Graceful(stuck.clone()), listener)
        .unwrap();
    let force = sup.force_token();

    let running = tokio::spawn(sup.run());
    tokio::time::sleep(Duration::from_millis(50)).await;

    raise(Signal::SIGINT).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!running.is_finished(), "shutdown should still be pending");
    assert!(!force.is_cancelled());

    raise(Signal::SIGINT).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .expect("forced shutdown did not finish")
        .unwrap();

    assert_eq!(result, Ok(()));
    assert!(force.is_cancelled());
    assert!(stuck.closed.is_cancelled());
}
