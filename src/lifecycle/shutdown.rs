//! Signal-driven, bounded shutdown.
//!
//! `Running → DrainRequested → Draining → (Drained | DrainTimedOut) → Stopped`
//!
//! The listener drains first, bounded by the grace period. Only then is the
//! background tracker closed and waited on, without a bound, so work spawned
//! by a request that was still draining is covered too. A drain that overruns
//! is reported as [`ShutdownError::DrainTimeout`], but only after the
//! background tasks have finished as well.

use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::tasks::BackgroundTasks;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Running,
    DrainRequested,
    Draining,
    Drained,
    DrainTimedOut,
    Stopped,
}

#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("listener drain exceeded the {0:?} grace window")]
    DrainTimeout(Duration),

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),

    #[error("server task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Owns the cancellation token every long-running task listens on and the
/// tracker for background work. Clones share state.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    tasks: BackgroundTasks,
    grace: Duration,
    phase: Arc<watch::Sender<Phase>>,
}

impl ShutdownCoordinator {
    pub fn new(grace: Duration) -> Self {
        let (phase, _) = watch::channel(Phase::Running);
        Self {
            token: CancellationToken::new(),
            tasks: BackgroundTasks::new(),
            grace,
            phase: Arc::new(phase),
        }
    }

    /// Cancelled once shutdown has been requested
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn tasks(&self) -> BackgroundTasks {
        self.tasks.clone()
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    /// Request shutdown. Idempotent.
    pub fn trigger(&self) {
        let requested = self.phase.send_if_modified(|phase| {
            if *phase == Phase::Running {
                *phase = Phase::DrainRequested;
                true
            } else {
                false
            }
        });
        if requested {
            info!("shutdown requested");
        }
        self.token.cancel();
    }

    fn enter(&self, next: Phase) {
        self.phase.send_replace(next);
        info!(phase = ?next, "shutdown phase");
    }

    /// Serve `app` on `listener` until shutdown is triggered, then drain.
    pub async fn serve(&self, listener: TcpListener, app: Router) -> Result<(), ShutdownError> {
        let addr = listener.local_addr()?;
        info!(%addr, "starting server");

        let token = self.token.clone();
        let mut server = tokio::spawn(async move {
            axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await
        });

        tokio::select! {
            result = &mut server => {
                // The server stopped on its own; still let background work finish.
                error!("server exited before shutdown was requested");
                self.trigger();
                self.tasks.close_and_wait().await;
                self.enter(Phase::Stopped);
                return result
                    .map_err(ShutdownError::from)
                    .and_then(|served| served.map_err(ShutdownError::from));
            }
            _ = self.token.cancelled() => {}
        }

        self.enter(Phase::Draining);

        let grace = self.grace;
        let drained = match tokio::time::timeout(grace, &mut server).await {
            Ok(joined) => {
                self.enter(Phase::Drained);
                joined
                    .map_err(ShutdownError::from)
                    .and_then(|served| served.map_err(ShutdownError::from))
            }
            Err(_) => {
                warn!(grace_secs = grace.as_secs_f64(), "drain grace window expired, aborting listener");
                server.abort();
                self.enter(Phase::DrainTimedOut);
                Err(ShutdownError::DrainTimeout(grace))
            }
        };

        let pending = self.tasks.len();
        if pending > 0 {
            info!(pending, "waiting for background tasks");
        }
        self.tasks.close_and_wait().await;

        self.enter(Phase::Stopped);
        info!("stopped server");
        drained
    }
}
