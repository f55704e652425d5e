//! # Sync-over-async bridge
//!
//! Tools are plain synchronous functions, but the vehicle client is async.
//! The bridge owns one background thread running a single-threaded tokio
//! runtime; every vehicle future is submitted to it through a queue and the
//! calling thread blocks until the result comes back.
//!
//! ## Guarantees
//! - One runtime for the whole session, so the vehicle connection and all
//!   later commands live on the same executor.
//! - The worker is the only consumer of the queue and awaits each job to
//!   completion before taking the next one. Calls are serialized no matter
//!   how many threads submit.
//! - Errors and panics inside a bridged future come back as `Err`.
//! - `shutdown` (or dropping the bridge) stops the worker and joins the
//!   thread. In-flight work is abandoned, so shutdown does not wait on a
//!   hung vehicle call.

use pilotcraft_error::{Error, Result};
use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard};
use std::thread::{JoinHandle, ThreadId};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Configuration for the bridge worker
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Name of the background thread
    pub thread_name: String,
    /// Deadline for a single bridged call; `None` waits forever
    pub call_timeout: Option<Duration>,
    /// How long runtime shutdown may wait for abandoned tasks
    pub shutdown_grace: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            thread_name: "pilotcraft-bridge".to_string(),
            call_timeout: Some(Duration::from_secs(60)),
            shutdown_grace: Duration::from_secs(2),
        }
    }
}

impl BridgeConfig {
    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }
}

/// Background runtime plus blocking submit-and-wait
pub struct Bridge {
    jobs: Mutex<Option<flume::Sender<Job>>>,
    stop: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
    config: BridgeConfig,
}

impl Bridge {
    /// Start the worker thread and its runtime
    pub fn new(config: BridgeConfig) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::from(e).with_operation("bridge::new"))?;

        let (jobs_tx, jobs_rx) = flume::unbounded::<Job>();
        let (stop_tx, stop_rx) = watch::channel(false);
        let grace = config.shutdown_grace;

        let worker = std::thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || worker_loop(runtime, jobs_rx, stop_rx, grace))
            .map_err(|e| Error::from(e).with_operation("bridge::new"))?;

        let worker_id = worker.thread().id();
        info!(thread = %config.thread_name, "bridge worker started");

        Ok(Self {
            jobs: Mutex::new(Some(jobs_tx)),
            stop: stop_tx,
            worker: Mutex::new(Some(worker)),
            worker_id,
            config,
        })
    }

    /// Start a bridge with default settings
    pub fn start() -> Result<Self> {
        Self::new(BridgeConfig::default())
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Run `future` on the background runtime and block until it finishes.
    ///
    /// The future's own error is returned unchanged. Bridge failures use
    /// `BridgeClosed`, `BridgeTimeout` and `BridgePanicked`.
    pub fn run<F, T>(&self, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        if std::thread::current().id() == self.worker_id {
            return Err(Error::unexpected("bridge called from its own worker thread")
                .with_operation("bridge::run"));
        }

        let jobs = lock(&self.jobs)
            .clone()
            .ok_or_else(|| Error::bridge_closed().with_operation("bridge::run"))?;

        let (reply_tx, reply_rx) = flume::bounded::<Result<T>>(1);
        let timeout = self.config.call_timeout;

        let job: Job = Box::pin(async move {
            let mut handle = tokio::spawn(future);
            let joined = match timeout {
                Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        handle.abort();
                        warn!(timeout_ms = limit.as_millis() as u64, "bridged call timed out");
                        let _ = reply_tx.send(Err(Error::bridge_timeout(limit)));
                        return;
                    }
                },
                None => handle.await,
            };

            let result = match joined {
                Ok(result) => result,
                Err(err) if err.is_panic() => {
                    let message = panic_message(err.into_panic());
                    warn!(%message, "bridged call panicked");
                    Err(Error::bridge_panicked(message))
                }
                Err(err) => Err(Error::bridge_closed().set_source(err)),
            };
            let _ = reply_tx.send(result);
        });

        jobs.send(job)
            .map_err(|_| Error::bridge_closed().with_operation("bridge::run"))?;

        reply_rx
            .recv()
            .map_err(|_| Error::bridge_closed().with_operation("bridge::run"))?
    }

    /// Whether the worker thread is still accepting work
    pub fn is_running(&self) -> bool {
        lock(&self.jobs).is_some()
            && lock(&self.worker)
                .as_ref()
                .is_some_and(|worker| !worker.is_finished())
    }

    /// Stop the worker and join its thread. Safe to call more than once.
    pub fn shutdown(&self) -> Result<()> {
        drop(lock(&self.jobs).take());
        self.stop.send_replace(true);

        let Some(worker) = lock(&self.worker).take() else {
            return Ok(());
        };

        if std::thread::current().id() == self.worker_id {
            warn!("bridge shutdown requested from its own worker, not joining");
            return Ok(());
        }

        worker.join().map_err(|payload| {
            Error::bridge_panicked(panic_message(payload)).with_operation("bridge::shutdown")
        })?;
        info!(thread = %self.config.thread_name, "bridge worker stopped");
        Ok(())
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            warn!(error = %err, "bridge shutdown failed");
        }
    }
}

fn worker_loop(
    runtime: tokio::runtime::Runtime,
    jobs: flume::Receiver<Job>,
    mut stop: watch::Receiver<bool>,
    grace: Duration,
) {
    runtime.block_on(async {
        loop {
            let job = tokio::select! {
                biased;
                _ = stop.wait_for(|stopped| *stopped) => break,
                job = jobs.recv_async() => match job {
                    Ok(job) => job,
                    Err(_) => break,
                },
            };

            tokio::select! {
                biased;
                _ = stop.wait_for(|stopped| *stopped) => {
                    warn!("abandoning in-flight bridged call");
                    break;
                }
                _ = job => {}
            }
        }
        debug!("bridge worker loop exited");
    });

    runtime.shutdown_timeout(grace);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "bridged call panicked".to_string()
    }
}
