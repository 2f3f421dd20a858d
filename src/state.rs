use std::path::PathBuf;

use crate::engine::TransferEngine;

/// shared application state
pub struct AppState {
    pub engine: TransferEngine,
}

impl AppState {
    /// create a new app state with the given uploads directory and chunk size
    pub fn new(uploads_dir: PathBuf, chunk_size: usize) -> Self {
        Self {
            engine: TransferEngine::new(uploads_dir, chunk_size),
        }
    }
}
