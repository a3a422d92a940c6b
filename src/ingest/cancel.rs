//! Cooperative cancellation for connector fetches
//!
//! The caller holds one clone and cancels; the connector polls another
//! between reads. The apply phase of a sync never observes the token.

use super::error::ConnectorError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A shared abort flag handed to connectors
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// `Err(ConnectorError::Cancelled)` once cancelled, for use with `?`
    pub fn check(&self) -> Result<(), ConnectorError> {
        if self.is_cancelled() {
            Err(ConnectorError::Cancelled)
        } else {
            Ok(())
        }
    }
}
