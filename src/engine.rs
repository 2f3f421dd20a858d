use std::io::SeekFrom;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::fs::OpenOptions;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt, AsyncWriteExt};
use uuid::Uuid;

use crate::session::{SessionRegistry, SessionStatus, UploadSession};

/// caller-facing failures of the transfer control surface
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("session not found")]
    NotFound,
    #[error("session is not in a resumable state")]
    Conflict,
    #[error("failed to seek source stream: {0}")]
    Seek(#[from] std::io::Error),
}

/// the resumable transfer engine: session registry plus the control surface
///
/// `chunk_size` is a process-wide setting shared by every session; the resume
/// offset arithmetic (`uploaded_chunks * chunk_size`) depends on it never
/// changing while sessions are live.
pub struct TransferEngine {
    registry: SessionRegistry,
    uploads_dir: PathBuf,
    chunk_size: usize,
}

impl TransferEngine {
    pub fn new(uploads_dir: PathBuf, chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "chunk size must be non-zero");
        Self {
            registry: SessionRegistry::new(),
            uploads_dir,
            chunk_size,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// create and register a session, launch its first run, return the token
    ///
    /// Returns immediately; progress is observed via `status`. The caller is
    /// responsible for having sanitized `file_name` already. The destination
    /// is prefixed with the session token so two uploads of the same filename
    /// never append to the same file.
    pub async fn start<R>(&self, source: R, file_name: &str, total_size: u64) -> String
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let token = Uuid::new_v4().to_string();
        let destination = self.uploads_dir.join(format!("{}_{}", token, file_name));
        let total_chunks = total_size.div_ceil(self.chunk_size as u64);

        let session = Arc::new(UploadSession::new(
            file_name.to_string(),
            destination,
            total_size,
            total_chunks,
        ));
        self.registry.insert(token.clone(), session.clone());

        tracing::info!(
            "📤 Starting upload {} ({} bytes, {} chunks) as session {}",
            file_name,
            total_size,
            total_chunks,
            token
        );

        let mut worker = session.worker.lock().await;
        *worker = Some(tokio::spawn(run_transfer(
            source,
            session.clone(),
            self.chunk_size,
        )));

        token
    }

    /// request a pause; fire-and-forget, the worker stops at its next checkpoint
    ///
    /// Idempotent, and a no-op on a transfer that already finished.
    pub fn pause(&self, token: &str) -> Result<(), TransferError> {
        let session = self.registry.get(token).ok_or(TransferError::NotFound)?;
        session.request_pause();
        tracing::debug!("Pause requested for session {}", token);
        Ok(())
    }

    /// resume a paused (or errored) session with a freshly supplied source
    ///
    /// The worker-handle mutex is held across validate -> await -> seek ->
    /// relaunch, so at most one run is ever active per session and concurrent
    /// resume calls serialize. The resume offset is computed only after the
    /// previous run has fully stopped, which accounts for any chunk that run
    /// drained after the pause was requested.
    pub async fn resume<R>(&self, token: &str, mut source: R) -> Result<(), TransferError>
    where
        R: AsyncRead + AsyncSeek + Unpin + Send + 'static,
    {
        let session = self.registry.get(token).ok_or(TransferError::NotFound)?;

        let mut worker = session.worker.lock().await;

        // reject fast before waiting on the old run: awaiting the handle of a
        // non-paused run would block until the whole transfer finishes
        if session.resumable_at().is_none() {
            return Err(TransferError::Conflict);
        }

        if let Some(handle) = worker.take() {
            if let Err(err) = handle.await {
                tracing::error!("Previous run of session {} panicked: {}", token, err);
            }
        }

        // the stopping run may have written one more chunk, or finished outright
        let uploaded = session.resumable_at().ok_or(TransferError::Conflict)?;
        let offset = uploaded * self.chunk_size as u64;

        source.seek(SeekFrom::Start(offset)).await.map_err(|e| {
            tracing::error!("Failed to seek session {} source to {}: {}", token, offset, e);
            TransferError::Seek(e)
        })?;

        session.clear_stop_flags();
        tracing::info!("▶️  Resuming session {} at chunk {} (offset {})", token, uploaded, offset);

        *worker = Some(tokio::spawn(run_transfer(
            source,
            session.clone(),
            self.chunk_size,
        )));

        Ok(())
    }

    /// request termination; the worker stops at its next checkpoint and the
    /// session permanently rejects resume
    pub fn cancel(&self, token: &str) -> Result<(), TransferError> {
        let session = self.registry.get(token).ok_or(TransferError::NotFound)?;
        session.request_terminate();
        tracing::info!("🛑 Cancel requested for session {}", token);
        Ok(())
    }

    /// lock-consistent snapshot of the session's progress and flags
    pub fn status(&self, token: &str) -> Result<SessionStatus, TransferError> {
        let session = self.registry.get(token).ok_or(TransferError::NotFound)?;
        Ok(session.snapshot())
    }
}

/// one run of the chunk reader/writer loop
///
/// Drains `source` into the session's destination file in `chunk_size`
/// increments, checking the stop flags between chunks. I/O failures are
/// recorded on the session and end the run; they are never surfaced to the
/// operation that launched it.
async fn run_transfer<R>(mut source: R, session: Arc<UploadSession>, chunk_size: usize)
where
    R: AsyncRead + Unpin,
{
    let mut sink = match OpenOptions::new()
        .append(true)
        .create(true)
        .open(&session.destination)
        .await
    {
        Ok(file) => file,
        Err(e) => {
            tracing::error!("Failed to open {:?} for append: {}", session.destination, e);
            session.record_error(&e);
            return;
        }
    };

    session.rearm();

    let mut buf = vec![0u8; chunk_size];

    loop {
        if session.should_stop() {
            tracing::debug!("Run for {} stopping at checkpoint", session.file_name);
            return;
        }

        // fill the whole chunk before writing; short reads must not skew the
        // uploaded_chunks * chunk_size resume offset
        let mut filled = 0;
        while filled < chunk_size {
            match source.read(&mut buf[filled..]).await {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) => {
                    tracing::error!("Read failed for {}: {}", session.file_name, e);
                    session.record_error(&e);
                    return;
                }
            }
        }
        if filled == 0 {
            break;
        }

        if let Err(e) = sink.write_all(&buf[..filled]).await {
            tracing::error!("Write failed for {:?}: {}", session.destination, e);
            session.record_error(&e);
            return;
        }
        // push the chunk through to the OS before counting it
        if let Err(e) = sink.flush().await {
            tracing::error!("Flush failed for {:?}: {}", session.destination, e);
            session.record_error(&e);
            return;
        }

        session.advance_chunk();

        if session.is_paused() {
            tracing::debug!("Run for {} paused after chunk write", session.file_name);
            return;
        }
    }

    session.mark_completed();
    tracing::info!("✅ Upload {} completed", session.file_name);
}
