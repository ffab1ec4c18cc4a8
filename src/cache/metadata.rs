use std::time::{Duration, Instant};

/// Bookkeeping attached to every ready cache entry.
#[derive(Debug, Clone)]
pub struct EntryMetadata {
    pub compiled_at: Instant,
    pub compile_time: Duration,
    pub access_count: u64,
}

impl EntryMetadata {
    pub fn new(compile_time: Duration) -> Self {
        Self {
            compiled_at: Instant::now(),
            compile_time,
            access_count: 0,
        }
    }

    pub fn record_access(&mut self) {
        self.access_count += 1;
    }
}
