//! Runs long-lived service processes side by side and shuts them down together.
//!
//! - Every registered process gets the same cancellation token
//! - The first failure, or SIGINT/SIGTERM, cancels the rest
//! - Closers run afterwards, bounded by a timeout, whatever the outcome
//!
//! # Example
//!
//! ```no_run
//! use parcel_runner::Runner;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Runner::new()
//!         .with_named_process("ticker", |ctx| async move {
//!             loop {
//!                 tokio::select! {
//!                     _ = ctx.cancelled() => break,
//!                     _ = tokio::time::sleep(Duration::from_secs(1)) => {
//!                         tracing::info!("tick");
//!                     }
//!                 }
//!             }
//!             Ok(())
//!         })
//!         .with_closer("pool", || async move { Ok(()) })
//!         .with_closer_timeout(Duration::from_secs(5))
//!         .run()
//!         .await
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type BoxedResultFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// A long-running process. Receives the shared cancellation token.
pub type AppProcess = Box<dyn FnOnce(CancellationToken) -> BoxedResultFuture + Send>;

/// Cleanup executed once every process has stopped
pub type Closer = Box<dyn FnOnce() -> BoxedResultFuture + Send>;

struct Named<T> {
    name: String,
    inner: T,
}

pub struct Runner {
    app_processes: Vec<Named<AppProcess>>,
    closers: Vec<Named<Closer>>,
    closer_timeout: Duration,
    cancellation_token: CancellationToken,
    handle_signals: bool,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    /// No processes, no closers, a 10 second closer timeout and signal handling on
    pub fn new() -> Self {
        Self {
            app_processes: Vec::new(),
            closers: Vec::new(),
            closer_timeout: Duration::from_secs(10),
            cancellation_token: CancellationToken::new(),
            handle_signals: true,
        }
    }

    /// Register a process. If it returns an error every other process is cancelled.
    pub fn with_named_process<F, Fut>(mut self, name: impl Into<String>, process: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.app_processes.push(Named {
            name: name.into(),
            inner: Box::new(|token| Box::pin(process(token))),
        });
        self
    }

    /// Register a closer. All closers run even if some of them fail.
    pub fn with_closer<F, Fut>(mut self, name: impl Into<String>, closer: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.closers.push(Named {
            name: name.into(),
            inner: Box::new(|| Box::pin(closer())),
        });
        self
    }

    pub fn with_closer_timeout(mut self, timeout: Duration) -> Self {
        self.closer_timeout = timeout;
        self
    }

    /// Use an externally owned token, e.g. to stop the runner from a test
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Disable SIGINT/SIGTERM listeners
    pub fn without_signal_handlers(mut self) -> Self {
        self.handle_signals = false;
        self
    }

    /// Run until a process fails, all processes finish, or a shutdown signal
    /// arrives. Returns the first process error, after closers have run.
    pub async fn run(self) -> anyhow::Result<()> {
        let token = self.cancellation_token;
        let mut join_set = JoinSet::new();

        for process in self.app_processes {
            let process_token = token.clone();
            let name = process.name;
            info!(process = %name, "starting process");
            join_set.spawn(async move { (name, (process.inner)(process_token).await) });
        }

        if self.handle_signals {
            spawn_signal_listeners(token.clone());
        }

        let mut first_error = None;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((name, Ok(()))) => {
                    debug!(process = %name, "process completed");
                }
                Ok((name, Err(err))) => {
                    if token.is_cancelled() {
                        warn!(process = %name, error = %format!("{:#}", err), "process failed during shutdown");
                    } else {
                        error!(process = %name, error = %format!("{:#}", err), "process failed");
                        first_error = Some(err.context(format!("process {} failed", name)));
                        token.cancel();
                    }
                }
                Err(err) => {
                    error!(error = %err, "process panicked");
                    if first_error.is_none() && !token.is_cancelled() {
                        first_error = Some(anyhow::anyhow!("process panicked: {}", err));
                    }
                    token.cancel();
                }
            }

            if token.is_cancelled() {
                break;
            }
        }

        // Give the remaining processes the chance to observe cancellation
        while let Some(joined) = join_set.join_next().await {
            if let Ok((name, Err(err))) = joined {
                warn!(process = %name, error = %format!("{:#}", err), "process failed during shutdown");
            }
        }

        if !self.closers.is_empty() {
            info!(timeout = ?self.closer_timeout, "running closers");
            match tokio::time::timeout(self.closer_timeout, run_closers(self.closers)).await {
                Ok(()) => info!("all closers completed"),
                Err(_) => error!(timeout = ?self.closer_timeout, "closers timed out"),
            }
        }

        match first_error {
            Some(err) => {
                error!(error = %format!("{:#}", err), "runner exiting with error");
                Err(err)
            }
            None => {
                info!("runner exiting normally");
                Ok(())
            }
        }
    }
}

fn spawn_signal_listeners(token: CancellationToken) {
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received SIGINT");
                ctrl_c_token.cancel();
            }
            Err(err) => error!(error = %err, "failed to listen for SIGINT"),
        }
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("received SIGTERM");
                token.cancel();
            }
            Err(err) => error!(error = %err, "failed to listen for SIGTERM"),
        }
    });
}

async fn run_closers(closers: Vec<Named<Closer>>) {
    let mut closer_set = JoinSet::new();
    for closer in closers {
        closer_set.spawn(async move { (closer.name, (closer.inner)().await) });
    }

    while let Some(joined) = closer_set.join_next().await {
        match joined {
            Ok((name, Ok(()))) => debug!(closer = %name, "closer completed"),
            Ok((name, Err(err))) => error!(closer = %name, error = %format!("{:#}", err), "closer failed"),
            Err(err) => error!(error = %err, "closer panicked"),
        }
    }
}
