use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{Semaphore, SemaphorePermit};

/// Counting limiter bounding how many fetches are in flight.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    permits: Arc<Semaphore>,
}

impl ConcurrencyLimiter {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    pub async fn acquire(&self) -> Result<SemaphorePermit<'_>> {
        Ok(self.permits.acquire().await?)
    }
}
