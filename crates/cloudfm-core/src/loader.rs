//! Shared external SDK loader
//!
//! Some providers need an expensive, process-wide bootstrap before their
//! first request (for Google Drive: discovering the OAuth endpoints). The
//! [`SdkLoader`] runs that bootstrap once no matter how many provider
//! instances ask for it:
//!
//! - the first caller flips `loading_started` and runs the bootstrap;
//! - callers arriving meanwhile queue a waiter;
//! - on completion every waiter is fired exactly once with the result.
//!
//! The flag check-and-set happens under a synchronous lock that is never
//! held across an `.await`. A failed bootstrap clears `loading_started` so
//! a later call retries.
//!
//! The loader is an ordinary value: create one, wrap it in an `Arc`, and
//! hand it to every provider that shares the SDK.

use std::future::Future;
use std::sync::{Mutex, MutexGuard};

use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Errors returned to callers of [`SdkLoader::load`]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SdkLoadError {
    /// The bootstrap ran and failed
    #[error("SDK bootstrap failed: {0}")]
    Failed(String),

    /// The caller running the bootstrap was cancelled before it finished
    #[error("SDK bootstrap was abandoned before completing")]
    Abandoned,
}

type Waiter<T> = oneshot::Sender<Result<T, String>>;

struct LoaderState<T> {
    loading_started: bool,
    loaded: Option<T>,
    waiters: Vec<Waiter<T>>,
}

/// Runs a shared bootstrap once and fans the result out to all callers
pub struct SdkLoader<T> {
    name: String,
    state: Mutex<LoaderState<T>>,
}

impl<T: Clone + Send + 'static> SdkLoader<T> {
    /// Creates an idle loader; `name` only appears in logs
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(LoaderState {
                loading_started: false,
                loaded: None,
                waiters: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LoaderState<T>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// True once a bootstrap has been started and not yet failed
    pub fn loading_started(&self) -> bool {
        self.lock().loading_started
    }

    /// True once a bootstrap succeeded
    pub fn is_loaded(&self) -> bool {
        self.lock().loaded.is_some()
    }

    /// Number of callers currently waiting for a running bootstrap
    pub fn pending_waiters(&self) -> usize {
        self.lock().waiters.len()
    }

    /// Returns the loaded SDK, running `bootstrap` if nobody has yet
    ///
    /// `bootstrap` is only invoked by the caller that starts the load; every
    /// other concurrent caller waits for that result.
    pub async fn load<F, Fut>(&self, bootstrap: F) -> Result<T, SdkLoadError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, String>>,
    {
        let (rx, runs_bootstrap) = {
            let mut state = self.lock();
            if let Some(loaded) = &state.loaded {
                return Ok(loaded.clone());
            }
            let (tx, rx) = oneshot::channel();
            state.waiters.push(tx);
            let runs_bootstrap = !state.loading_started;
            state.loading_started = true;
            (rx, runs_bootstrap)
        };

        if runs_bootstrap {
            debug!(sdk = %self.name, "Starting SDK bootstrap");
            let mut guard = AbandonGuard {
                loader: self,
                armed: true,
            };
            let result = bootstrap().await;
            guard.armed = false;
            self.complete(result);
        } else {
            debug!(sdk = %self.name, "Waiting for SDK bootstrap in progress");
        }

        rx.await
            .map_err(|_| SdkLoadError::Abandoned)?
            .map_err(SdkLoadError::Failed)
    }

    fn complete(&self, result: Result<T, String>) {
        let waiters = {
            let mut state = self.lock();
            match &result {
                Ok(loaded) => state.loaded = Some(loaded.clone()),
                Err(_) => state.loading_started = false,
            }
            std::mem::take(&mut state.waiters)
        };

        match &result {
            Ok(_) => info!(sdk = %self.name, waiters = waiters.len(), "SDK loaded"),
            Err(e) => warn!(sdk = %self.name, error = %e, "SDK bootstrap failed"),
        }

        for waiter in waiters {
            let _ = waiter.send(result.clone());
        }
    }

    fn abandon(&self) {
        let waiters = {
            let mut state = self.lock();
            state.loading_started = false;
            std::mem::take(&mut state.waiters)
        };
        warn!(sdk = %self.name, waiters = waiters.len(), "SDK bootstrap abandoned");
        // Dropping the senders wakes every waiter with `Abandoned`.
        drop(waiters);
    }
}

/// Releases waiters if the bootstrapping future is dropped mid-flight
struct AbandonGuard<'a, T: Clone + Send + 'static> {
    loader: &'a SdkLoader<T>,
    armed: bool,
}

impl<T: Clone + Send + 'static> Drop for AbandonGuard<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            self.loader.abandon();
        }
    }
}
