//! # HTTP servers backed by axum.
//!
//! [`HttpServer`] serves an [`axum::Router`] on a reloader [`Listener`] and supports
//! graceful shutdown: `shutdown` stops accepting and waits for in-flight requests,
//! `close` drops every connection.
//!
//! ```text
//! serve(listener) ── axum::serve(..).with_graceful_shutdown(graceful)
//!                         │
//! shutdown() ── graceful.cancel() ──► stop accepting, drain ──► finished
//! close()    ── force.cancel()    ──► serve future dropped  ──► finished
//! ```
//!
//! An `HttpServer` serves once; build a new one per [`ServerRunner`](crate::ServerRunner).

use std::future::IntoFuture;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use axum::Router;
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::error::ServerError;
use crate::reloader::Listener;
use crate::runner::{GracefulServer, Server, ServerHandle};

/// Graceful HTTP server for an axum router.
pub struct HttpServer {
    router: Router,
    started: AtomicBool,
    graceful: CancellationToken,
    force: CancellationToken,
    finished: CancellationToken,
}

impl HttpServer {
    /// Creates a server for `router`; it serves one listener, once.
    pub fn new(router: Router) -> Self {
        Self {
            router,
            started: AtomicBool::new(false),
            graceful: CancellationToken::new(),
            force: CancellationToken::new(),
            finished: CancellationToken::new(),
        }
    }

    /// Wraps the server as a [`ServerHandle::Graceful`].
    pub fn into_handle(self) -> ServerHandle {
        ServerHandle::graceful(self)
    }
}

#[async_trait]
impl Server for HttpServer {
    async fn serve(&self, listener: Listener) -> Result<(), ServerError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ServerError::Other("http server already served".into()));
        }

        let graceful = self.graceful.clone().cancelled_owned();
        let serving: BoxFuture<'static, std::io::Result<()>> = match listener {
            Listener::Tcp(l) => axum::serve(l, self.router.clone())
                .with_graceful_shutdown(graceful)
                .into_future()
                .boxed(),
            #[cfg(unix)]
            Listener::Unix(l) => axum::serve(l, self.router.clone())
                .with_graceful_shutdown(graceful)
                .into_future()
                .boxed(),
        };

        let result = tokio::select! {
            res = serving => res.map_err(ServerError::from),
            _ = self.force.cancelled() => Err(ServerError::Closed),
        };
        self.finished.cancel();

        match result {
            Ok(()) => Err(ServerError::Closed),
            err => err,
        }
    }

    async fn close(&self) -> Result<(), ServerError> {
        self.graceful.cancel();
        self.force.cancel();
        Ok(())
    }
}

#[async_trait]
impl GracefulServer for HttpServer {
    async fn shutdown(&self) -> Result<(), ServerError> {
        self.graceful.cancel();
        if !self.started.load(Ordering::SeqCst) {
            return Ok(());
        }

        tokio::select! {
            _ = self.finished.cancelled() => Ok(()),
            _ = self.force.cancelled() => Err(ServerError::ShutdownAborted),
        }
    }
}
