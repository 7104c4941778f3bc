//! Batched Pokemon catalog sync.
//!
//! The backend refreshes the catalog one slice at a time, so a full sync is a
//! sequence of `(limit, offset)` calls driven from here. Batches never overlap
//! in time; a failed batch stops the run and reports its offset so an operator
//! can restart from there.

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::models::PokemonSyncResponse;

pub const ESTIMATED_POKEMON_TOTAL: u64 = 1350;
pub const POKEMON_BATCH_SIZE: u64 = 50;

/// Anything that can push one sync batch to the backend.
#[async_trait]
pub trait PokemonBatchSource: Send + Sync {
    type Error: fmt::Display + Send;

    async fn sync_batch(&self, limit: u64, offset: u64)
        -> Result<PokemonSyncResponse, Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncProgress {
    /// About to send the batch covering catalog entries `first..=last` (1-based).
    Batch { first: u64, last: u64 },
}

impl fmt::Display for SyncProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncProgress::Batch { first, last } => write!(f, "Syncing batch {first}-{last}..."),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOutcome {
    pub synced: u64,
    pub batches: u32,
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Successfully synced {} Pokemon!", self.synced)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("Failed to sync batch at offset {offset}")]
    Batch { offset: u64, reason: String },
    #[error("Sync cancelled before offset {offset}")]
    Cancelled { offset: u64 },
}

impl SyncError {
    /// Offset to pass to [`PokemonSync::starting_at`] to pick up where this run stopped.
    pub fn resume_offset(&self) -> u64 {
        match self {
            SyncError::Batch { offset, .. } | SyncError::Cancelled { offset } => *offset,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PokemonSync {
    estimated_total: u64,
    batch_size: u64,
    start_offset: u64,
}

impl Default for PokemonSync {
    fn default() -> Self {
        Self {
            estimated_total: ESTIMATED_POKEMON_TOTAL,
            batch_size: POKEMON_BATCH_SIZE,
            start_offset: 0,
        }
    }
}

impl PokemonSync {
    pub fn starting_at(mut self, offset: u64) -> Self {
        self.start_offset = offset;
        self
    }

    pub fn with_batch_size(mut self, batch_size: u64) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_estimated_total(mut self, total: u64) -> Self {
        self.estimated_total = total;
        self
    }

    /// Send batches until the estimate is covered or the backend says there is
    /// nothing past the current slice. `cancel` is checked between batches.
    pub async fn run<S, F>(
        &self,
        source: &S,
        mut on_progress: F,
        cancel: &CancellationToken,
    ) -> Result<SyncOutcome, SyncError>
    where
        S: PokemonBatchSource + ?Sized,
        F: FnMut(&SyncProgress) + Send,
    {
        let mut offset = self.start_offset;
        let mut outcome = SyncOutcome {
            synced: 0,
            batches: 0,
        };

        while offset < self.estimated_total {
            if cancel.is_cancelled() {
                tracing::info!(offset, "pokemon sync cancelled");
                return Err(SyncError::Cancelled { offset });
            }

            let last = (offset + self.batch_size).min(self.estimated_total);
            on_progress(&SyncProgress::Batch {
                first: offset + 1,
                last,
            });

            let response = source
                .sync_batch(self.batch_size, offset)
                .await
                .map_err(|err| {
                    tracing::warn!(offset, error = %err, "pokemon sync batch failed");
                    SyncError::Batch {
                        offset,
                        reason: err.to_string(),
                    }
                })?;

            let batch = response.data.unwrap_or_default();
            outcome.synced += batch.inserted + batch.updated;
            outcome.batches += 1;
            tracing::debug!(offset, inserted = batch.inserted, updated = batch.updated, "batch synced");

            if let Some(available) = batch.total_available {
                if offset + self.batch_size >= available {
                    break;
                }
            }
            offset += self.batch_size;
        }

        tracing::info!(synced = outcome.synced, batches = outcome.batches, "pokemon sync finished");
        Ok(outcome)
    }
}
