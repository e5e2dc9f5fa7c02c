//! Compute units
//!
//! Each unit owns one [`ComputeModule`] on a dedicated worker thread. Calls
//! reach the worker as messages and results come back on a reply channel, so
//! the module never shares memory with its callers.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, unbounded, Sender};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::analysis::ComputeModule;
use crate::error::{Error, Result};
use crate::output::AnalysisOutput;

/// Lifecycle status of a compute unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitStatus {
    Idle,
    Processing,
    Error,
}

/// Point-in-time view of a unit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitInfo {
    pub module: String,
    pub status: UnitStatus,
    pub created_at: DateTime<Utc>,
    /// Time since the unit was last resolved or finished a call
    pub idle_for: Duration,
    /// Calls that reached the module (cache hits excluded)
    pub executions: u64,
}

struct Request {
    method: String,
    params: Value,
    reply: Sender<Result<AnalysisOutput>>,
}

#[derive(Debug)]
struct UnitState {
    /// Calls begun and not yet finished
    pending: usize,
    /// Set by a failed call, cleared only by an explicit reset
    failed: bool,
    last_used_at: Instant,
}

/// An isolated worker hosting one compute module
pub struct ComputeUnit {
    module: String,
    created_at: DateTime<Utc>,
    state: Mutex<UnitState>,
    executions: AtomicU64,
    sender: Mutex<Option<Sender<Request>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for ComputeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputeUnit")
            .field("module", &self.module)
            .field("created_at", &self.created_at)
            .field("executions", &self.executions.load(Ordering::SeqCst))
            .finish()
    }
}

impl ComputeUnit {
    /// Starts the worker thread for `module`
    pub(crate) fn spawn(mut module: Box<dyn ComputeModule>) -> Result<Self> {
        let name = module.name().to_string();
        let (sender, receiver) = unbounded::<Request>();

        let worker = thread::Builder::new()
            .name(format!("statsuite-unit-{}", name))
            .spawn(move || {
                for request in receiver.iter() {
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                        module.call(&request.method, &request.params)
                    }));
                    let result = outcome.unwrap_or_else(|payload| {
                        let reason = payload
                            .downcast_ref::<&str>()
                            .map(|s| s.to_string())
                            .or_else(|| payload.downcast_ref::<String>().cloned())
                            .unwrap_or_else(|| "unknown panic".to_string());
                        Err(Error::ComputationError(format!(
                            "{}.{} panicked: {}",
                            module.name(),
                            request.method,
                            reason
                        )))
                    });
                    // the caller may have gone away; nothing to deliver to
                    let _ = request.reply.send(result);
                }
            })?;

        log::info!("Created compute unit '{}'", name);
        Ok(ComputeUnit {
            module: name,
            created_at: Utc::now(),
            state: Mutex::new(UnitState {
                pending: 0,
                failed: false,
                last_used_at: Instant::now(),
            }),
            executions: AtomicU64::new(0),
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        })
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn executions(&self) -> u64 {
        self.executions.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> Result<UnitStatus> {
        let state = self.state.lock()?;
        Ok(Self::status_of(&state))
    }

    fn status_of(state: &UnitState) -> UnitStatus {
        if state.pending > 0 {
            UnitStatus::Processing
        } else if state.failed {
            UnitStatus::Error
        } else {
            UnitStatus::Idle
        }
    }

    pub fn info(&self) -> Result<UnitInfo> {
        let state = self.state.lock()?;
        Ok(UnitInfo {
            module: self.module.clone(),
            status: Self::status_of(&state),
            created_at: self.created_at,
            idle_for: state.last_used_at.elapsed(),
            executions: self.executions(),
        })
    }

    /// Records a resolution
    pub(crate) fn touch(&self) -> Result<()> {
        self.state.lock()?.last_used_at = Instant::now();
        Ok(())
    }

    /// Marks one call as in flight
    pub(crate) fn begin(&self) -> Result<()> {
        let mut state = self.state.lock()?;
        state.pending += 1;
        state.last_used_at = Instant::now();
        Ok(())
    }

    /// Completes a call started with [`ComputeUnit::begin`]
    pub(crate) fn finish(&self, failed: bool) -> Result<()> {
        let mut state = self.state.lock()?;
        state.pending = state.pending.saturating_sub(1);
        state.last_used_at = Instant::now();
        if failed {
            state.failed = true;
        }
        Ok(())
    }

    /// Clears the error flag
    pub(crate) fn reset(&self) -> Result<()> {
        self.state.lock()?.failed = false;
        Ok(())
    }

    /// Idle and unused for longer than `max_idle`
    pub(crate) fn is_reclaimable(&self, max_idle: Duration) -> Result<bool> {
        let state = self.state.lock()?;
        Ok(Self::status_of(&state) == UnitStatus::Idle && state.last_used_at.elapsed() > max_idle)
    }

    /// Sends a call to the worker and waits for its reply
    pub(crate) fn execute(&self, method: &str, params: &Value) -> Result<AnalysisOutput> {
        let sender = self
            .sender
            .lock()?
            .clone()
            .ok_or_else(|| Error::UnitTerminated(self.module.clone()))?;

        let (reply, response) = bounded(1);
        sender
            .send(Request {
                method: method.to_string(),
                params: params.clone(),
                reply,
            })
            .map_err(|_| Error::UnitTerminated(self.module.clone()))?;
        self.executions.fetch_add(1, Ordering::SeqCst);

        response
            .recv()
            .map_err(|_| Error::UnitTerminated(self.module.clone()))?
    }

    /// Stops the worker
    ///
    /// The worker drains calls already queued and exits. It is joined only when
    /// no call is in flight; otherwise it is left to finish on its own.
    pub(crate) fn terminate(&self) -> Result<()> {
        self.sender.lock()?.take();
        let busy = self.state.lock()?.pending > 0;
        let worker = self.worker.lock()?.take();
        match worker {
            Some(handle) if !busy => {
                if handle.join().is_err() {
                    log::warn!("Worker of compute unit '{}' exited abnormally", self.module);
                }
                log::info!("Terminated compute unit '{}'", self.module);
            }
            Some(_) => {
                log::info!("Detached busy compute unit '{}'", self.module);
            }
            None => {}
        }
        Ok(())
    }
}
