use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use tokio::task::JoinHandle;

/// mutable portion of a session, only ever touched under the session lock
#[derive(Debug, Default)]
struct SessionState {
    uploaded_chunks: u64,
    paused: bool,
    terminated: bool,
    completed: bool,
    /// set when a worker run died on an I/O error; cleared by a successful resume
    error: Option<String>,
}

/// lock-consistent snapshot of one session, as returned by the status operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub uploaded_chunks: u64,
    pub total_chunks: u64,
    pub paused: bool,
    pub completed: bool,
    pub cancelled: bool,
    pub error: Option<String>,
}

/// state record for one transfer
///
/// The identity fields are fixed at creation; everything that moves lives in
/// `state` behind its own mutex so status snapshots are internally consistent.
/// `worker` holds the handle of the currently active run (if any) and doubles
/// as the run-exclusion token: resume takes this mutex, awaits the old handle,
/// and only then launches the next run.
pub struct UploadSession {
    pub file_name: String,
    pub destination: PathBuf,
    pub total_size: u64,
    pub total_chunks: u64,
    state: Mutex<SessionState>,
    pub(crate) worker: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl UploadSession {
    pub fn new(file_name: String, destination: PathBuf, total_size: u64, total_chunks: u64) -> Self {
        Self {
            file_name,
            destination,
            total_size,
            total_chunks,
            state: Mutex::new(SessionState::default()),
            worker: tokio::sync::Mutex::new(None),
        }
    }

    pub fn snapshot(&self) -> SessionStatus {
        let st = self.state.lock().unwrap();
        SessionStatus {
            uploaded_chunks: st.uploaded_chunks,
            total_chunks: self.total_chunks,
            paused: st.paused,
            completed: st.completed,
            cancelled: st.terminated,
            error: st.error.clone(),
        }
    }

    /// request a pause; the worker stops at its next per-chunk checkpoint
    pub fn request_pause(&self) {
        self.state.lock().unwrap().paused = true;
    }

    /// request termination; honored at the same checkpoint as pause
    pub fn request_terminate(&self) {
        self.state.lock().unwrap().terminated = true;
    }

    /// worker checkpoint: should the current run stop here?
    pub(crate) fn should_stop(&self) -> bool {
        let st = self.state.lock().unwrap();
        st.paused || st.terminated
    }

    pub(crate) fn is_paused(&self) -> bool {
        self.state.lock().unwrap().paused
    }

    /// re-arm at the start of a run so a resumed transfer can progress again
    pub(crate) fn rearm(&self) {
        self.state.lock().unwrap().completed = false;
    }

    /// count one durably written chunk; flips `completed` on the last one
    pub(crate) fn advance_chunk(&self) {
        let mut st = self.state.lock().unwrap();
        st.uploaded_chunks += 1;
        if st.uploaded_chunks >= self.total_chunks {
            st.completed = true;
        }
    }

    pub(crate) fn mark_completed(&self) {
        self.state.lock().unwrap().completed = true;
    }

    pub(crate) fn record_error(&self, err: &std::io::Error) {
        self.state.lock().unwrap().error = Some(err.to_string());
    }

    /// resume precondition check; returns the chunk count the offset is based on
    ///
    /// A session is resumable while it is neither completed nor cancelled and
    /// either paused or stopped by an I/O error.
    pub(crate) fn resumable_at(&self) -> Option<u64> {
        let st = self.state.lock().unwrap();
        if st.completed || st.terminated || !(st.paused || st.error.is_some()) {
            return None;
        }
        Some(st.uploaded_chunks)
    }

    /// clear the stop flags just before the next run launches
    pub(crate) fn clear_stop_flags(&self) {
        let mut st = self.state.lock().unwrap();
        st.paused = false;
        st.error = None;
    }
}

/// concurrency-safe token -> session mapping
///
/// Entries are never removed; expiry/eviction is an extension point, not part
/// of the engine.
#[derive(Default)]
pub struct SessionRegistry {
    inner: DashMap<String, Arc<UploadSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self { inner: DashMap::new() }
    }

    pub fn insert(&self, token: String, session: Arc<UploadSession>) {
        self.inner.insert(token, session);
    }

    pub fn get(&self, token: &str) -> Option<Arc<UploadSession>> {
        self.inner.get(token).map(|entry| entry.clone())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
