// Start/stop bookkeeping for a single long-lived background loop

use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Default)]
struct LoopState {
    cancel: Option<CancellationToken>,
    handle: Option<JoinHandle<()>>,
}

impl LoopState {
    fn is_running(&self) -> bool {
        let scope_alive = self.cancel.as_ref().is_some_and(|c| !c.is_cancelled());
        let task_alive = self.handle.as_ref().is_some_and(|h| !h.is_finished());
        scope_alive && task_alive
    }
}

/// At most one running loop; running flag and cancel handle share one lock
pub(crate) struct BackgroundLoop {
    name: &'static str,
    state: Mutex<LoopState>,
}

impl BackgroundLoop {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Mutex::new(LoopState::default()),
        }
    }

    /// Spawn `body` in a child scope of `parent`. Returns false if a loop is
    /// already running.
    pub(crate) async fn start<F, Fut>(&self, parent: &CancellationToken, body: F) -> bool
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut state = self.state.lock().await;
        if state.is_running() {
            warn!(task = self.name, "Already running, start ignored");
            return false;
        }

        let scope = parent.child_token();
        state.handle = Some(tokio::spawn(body(scope.clone())));
        state.cancel = Some(scope);
        info!(task = self.name, "Started");
        true
    }

    /// Cancel the running loop without waiting for it. Returns false if
    /// nothing was running.
    pub(crate) async fn stop(&self) -> bool {
        let mut state = self.state.lock().await;
        if !state.is_running() {
            warn!(task = self.name, "Not running, stop ignored");
            return false;
        }

        if let Some(cancel) = state.cancel.take() {
            cancel.cancel();
        }
        info!(task = self.name, "Stop requested");
        true
    }

    pub(crate) async fn is_running(&self) -> bool {
        self.state.lock().await.is_running()
    }

    /// Wait up to `timeout` for the last spawned loop to exit.
    ///
    /// Returns true if it exited (or nothing was spawned).
    pub(crate) async fn join(&self, timeout: Duration) -> bool {
        let handle = self.state.lock().await.handle.take();
        let Some(handle) = handle else {
            return true;
        };

        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(task = self.name, error = %e, "Loop ended abnormally");
                true
            }
            Err(_) => {
                warn!(task = self.name, timeout_ms = timeout.as_millis() as u64, "Loop did not exit in time");
                false
            }
        }
    }
}
