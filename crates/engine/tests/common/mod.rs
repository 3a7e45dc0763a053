#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use jobwatch_core::{JobKind, RemoteLogEntry};
use jobwatch_engine::{ControllerConfig, JobController};
use jobwatch_remote::{JobService, RemoteError, StatusResponse};
use tokio::sync::Notify;

/// Poll interval used by the tests (matches the production default).
pub const POLL: Duration = Duration::from_secs(2);

/// Scripted reply for a start or stop call.
#[derive(Debug, Clone)]
pub enum Reply {
    Ok(String),
    Reject(u16, String),
}

/// Scripted reply for a status call.
#[derive(Debug, Clone)]
pub enum StatusReply {
    Ok(StatusResponse),
    Malformed,
}

/// In-memory [`JobService`] that replays scripted responses and counts
/// calls.  When the status script runs dry, `fallback_status` is served.
///
/// A status reply is picked when the call arrives; the call can then be
/// held open (see [`hold_next_status`](Self::hold_next_status)) or slowed
/// down (see [`set_status_delay`](Self::set_status_delay)).
pub struct ScriptedService {
    start_reply: Mutex<Reply>,
    stop_reply: Mutex<Reply>,
    statuses: Mutex<VecDeque<StatusReply>>,
    fallback_status: Mutex<StatusResponse>,
    status_gate: Mutex<Option<Arc<Notify>>>,
    status_delay: Mutex<Option<Duration>>,
    pub start_calls: AtomicUsize,
    pub stop_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    status_in_flight: AtomicUsize,
    peak_status_in_flight: AtomicUsize,
}

impl ScriptedService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            start_reply: Mutex::new(Reply::Ok("Job queued".to_string())),
            stop_reply: Mutex::new(Reply::Ok("Stop requested".to_string())),
            statuses: Mutex::new(VecDeque::new()),
            fallback_status: Mutex::new(StatusResponse::running(Vec::new())),
            status_gate: Mutex::new(None),
            status_delay: Mutex::new(None),
            start_calls: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            status_in_flight: AtomicUsize::new(0),
            peak_status_in_flight: AtomicUsize::new(0),
        })
    }

    pub fn set_start_reply(&self, reply: Reply) {
        *self.start_reply.lock().unwrap() = reply;
    }

    pub fn set_stop_reply(&self, reply: Reply) {
        *self.stop_reply.lock().unwrap() = reply;
    }

    pub fn push_status(&self, reply: StatusReply) {
        self.statuses.lock().unwrap().push_back(reply);
    }

    pub fn set_fallback_status(&self, status: StatusResponse) {
        *self.fallback_status.lock().unwrap() = status;
    }

    /// Hold the next status call open until the returned handle is
    /// notified.
    pub fn hold_next_status(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.status_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// Make every status call take `delay`.
    pub fn set_status_delay(&self, delay: Duration) {
        *self.status_delay.lock().unwrap() = Some(delay);
    }

    /// Highest number of status calls observed in flight at once.
    pub fn peak_status_in_flight(&self) -> usize {
        self.peak_status_in_flight.load(Ordering::SeqCst)
    }

    pub fn starts(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    fn reply(reply: &Mutex<Reply>) -> Result<String, RemoteError> {
        match reply.lock().unwrap().clone() {
            Reply::Ok(message) => Ok(message),
            Reply::Reject(status, message) => Err(RemoteError::Rejected { status, message }),
        }
    }
}

#[async_trait]
impl JobService for ScriptedService {
    async fn start(
        &self,
        _kind: JobKind,
        _payload: &serde_json::Value,
    ) -> Result<String, RemoteError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        Self::reply(&self.start_reply)
    }

    async fn stop(&self, _kind: JobKind) -> Result<String, RemoteError> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        Self::reply(&self.stop_reply)
    }

    async fn status(&self, _kind: JobKind) -> Result<StatusResponse, RemoteError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let in_flight = self.status_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_status_in_flight
            .fetch_max(in_flight, Ordering::SeqCst);

        let next = self.statuses.lock().unwrap().pop_front();
        let reply = match next {
            Some(StatusReply::Ok(status)) => Ok(status),
            Some(StatusReply::Malformed) => {
                let err = serde_json::from_str::<StatusResponse>("{not json").unwrap_err();
                Err(RemoteError::Parse(err))
            }
            None => Ok(self.fallback_status.lock().unwrap().clone()),
        };

        let gate = self.status_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let delay = *self.status_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.status_in_flight.fetch_sub(1, Ordering::SeqCst);
        reply
    }
}

pub fn controller(kind: JobKind, service: &Arc<ScriptedService>) -> JobController {
    let service: Arc<dyn JobService> = service.clone();
    JobController::new(
        kind,
        service,
        ControllerConfig {
            poll_interval: POLL,
            max_entries: 50,
        },
    )
}

/// A remote entry timestamped `offset_secs` from now.  Positive offsets
/// keep it newer than anything the controller appended locally.
pub fn remote(message: &str, kind: &str, offset_secs: i64) -> RemoteLogEntry {
    RemoteLogEntry::new(message, kind, Utc::now() + chrono::Duration::seconds(offset_secs))
}

/// Advance the paused clock past `ticks` poll intervals.
pub async fn advance_ticks(ticks: u32) {
    tokio::time::sleep(POLL * ticks + Duration::from_millis(100)).await;
}
