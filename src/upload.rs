//! Batched bet upload.
//!
//! Drains a [`RecordSource`] into string-list messages of bounded size.
//! The buffer is flushed the moment it reaches the configured maximum and
//! once more at the end for any remainder, so every batch on the wire
//! holds between 1 and `max_batch_size` records and arrives in source
//! order. There is no partial success: either every record the source
//! produced was sent in some batch, or the upload failed.

use std::fmt;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use crate::protocol::{self, Message};
use crate::records::RecordSource;
use crate::transport::Transport;
use crate::types::ClientError;

// ---------------------------------------------------------------------------
// Upload report
// ---------------------------------------------------------------------------

/// Totals for a completed upload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub records: u64,
    pub batches: u64,
}

impl fmt::Display for UploadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} record(s) in {} batch(es)", self.records, self.batches)
    }
}

// ---------------------------------------------------------------------------
// Uploader
// ---------------------------------------------------------------------------

pub struct BatchUploader {
    max_batch_size: usize,
}

impl BatchUploader {
    pub fn new(max_batch_size: usize) -> Self {
        Self { max_batch_size }
    }

    /// Send every record the source yields, grouped into bounded batches.
    ///
    /// The first failure, whether a source read or a send, aborts the
    /// upload immediately; no further records are read. An empty source
    /// sends nothing at all.
    pub async fn run<S, R>(
        &self,
        transport: &mut Transport<S>,
        source: &mut R,
    ) -> Result<UploadReport, ClientError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
        R: RecordSource + ?Sized,
    {
        let mut report = UploadReport::default();
        let mut batch: Vec<String> = Vec::with_capacity(self.max_batch_size);

        while let Some(record) = source
            .next_record()
            .await
            .map_err(|e| ClientError::Source(e.to_string()))?
        {
            batch.push(record);
            if batch.len() >= self.max_batch_size {
                self.flush(transport, &mut batch, &mut report).await?;
            }
        }
        if !batch.is_empty() {
            self.flush(transport, &mut batch, &mut report).await?;
        }
        Ok(report)
    }

    async fn flush<S>(
        &self,
        transport: &mut Transport<S>,
        batch: &mut Vec<String>,
        report: &mut UploadReport,
    ) -> Result<(), ClientError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let size = batch.len() as u64;
        let msg = Message::List(batch.drain(..).collect());
        protocol::send(transport, &msg).await?;
        report.batches += 1;
        report.records += size;
        debug!(
            action = "batch_sent",
            result = "success",
            records = size,
            batch = report.batches,
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
