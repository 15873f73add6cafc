//! Completion tracking for background puts
//!
//! A `TaskStatus` is handed out as soon as a put has been spawned. Callers
//! can poll it, wait on it with a timeout, or attach callbacks that run once
//! the put finishes.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;

use crate::error::{ControlError, Result};

type Callback = Box<dyn FnOnce(&TaskStatus) + Send + 'static>;

#[derive(Default)]
struct State {
    outcome: Option<Result<()>>,
    callbacks: Vec<Callback>,
}

struct Inner {
    label: String,
    state: Mutex<State>,
    done: watch::Sender<bool>,
}

/// Handle on a spawned control layer task
#[derive(Clone)]
pub struct TaskStatus {
    inner: Arc<Inner>,
}

impl TaskStatus {
    fn with_label(label: String) -> Self {
        let (done, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                label,
                state: Mutex::new(State::default()),
                done,
            }),
        }
    }

    /// Spawn `task` on the current runtime and track it
    ///
    /// A panic inside the task is reported as `ControlError::TaskFailed`.
    pub fn spawn<F>(label: impl Into<String>, task: F) -> Self
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let status = Self::with_label(label.into());
        let tracker = status.clone();
        tokio::spawn(async move {
            let outcome = match tokio::spawn(task).await {
                Ok(outcome) => outcome,
                Err(e) => Err(ControlError::TaskFailed(e.to_string())),
            };
            tracker.finish(outcome);
        });
        status
    }

    /// Status that is already finished with `outcome`
    pub fn completed(label: impl Into<String>, outcome: Result<()>) -> Self {
        let status = Self::with_label(label.into());
        status.finish(outcome);
        status
    }

    fn finish(&self, outcome: Result<()>) {
        let callbacks = {
            let mut state = self.inner.state.lock();
            if state.outcome.is_some() {
                return;
            }
            if let Err(e) = &outcome {
                debug!("{} failed: {}", self.inner.label, e);
            }
            state.outcome = Some(outcome);
            std::mem::take(&mut state.callbacks)
        };
        for callback in callbacks {
            callback(self);
        }
        self.inner.done.send_replace(true);
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn is_done(&self) -> bool {
        self.inner.state.lock().outcome.is_some()
    }

    /// Finished without error
    pub fn success(&self) -> bool {
        matches!(self.inner.state.lock().outcome, Some(Ok(())))
    }

    /// Error of a finished task; `None` while running or on success
    pub fn error(&self) -> Option<ControlError> {
        match &self.inner.state.lock().outcome {
            Some(Err(e)) => Some(e.clone()),
            _ => None,
        }
    }

    /// Wait for the task and return its outcome
    ///
    /// With a timeout, `ControlError::Timeout` is returned if the task is
    /// still running when it elapses; the task itself keeps going.
    pub async fn wait(&self, timeout: Option<Duration>) -> Result<()> {
        let mut rx = self.inner.done.subscribe();
        let finished = rx.wait_for(|done| *done);
        match timeout {
            Some(limit) => {
                if tokio::time::timeout(limit, finished).await.is_err() {
                    return Err(ControlError::Timeout {
                        address: self.inner.label.clone(),
                        timeout: limit,
                    });
                }
            },
            None => {
                let _ = finished.await;
            },
        }
        self.inner
            .state
            .lock()
            .outcome
            .clone()
            .unwrap_or_else(|| Err(ControlError::TaskFailed("status dropped".to_string())))
    }

    /// Run `callback` once the task finishes, or right away if it already has
    pub fn add_callback<F>(&self, callback: F)
    where
        F: FnOnce(&TaskStatus) + Send + 'static,
    {
        {
            let mut state = self.inner.state.lock();
            if state.outcome.is_none() {
                state.callbacks.push(Box::new(callback));
                return;
            }
        }
        callback(self);
    }
}

impl fmt::Debug for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.inner.state.lock().outcome {
            None => "pending".to_string(),
            Some(Ok(())) => "done".to_string(),
            Some(Err(e)) => format!("errored: {}", e),
        };
        write!(f, "<TaskStatus {}, {}>", self.inner.label, state)
    }
}
