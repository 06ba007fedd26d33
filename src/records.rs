//! Bet record input.
//!
//! Records reach the uploader through the [`RecordSource`] trait: a lazy,
//! finite sequence of record lines, opened fresh for each session. The
//! production implementation streams the agency's CSV file without ever
//! holding it in memory whole; tests substitute scripted sources.

use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};

/// Yields one bet record per call, `None` once the source is exhausted.
///
/// A record is one line of input; its comma-separated interior is opaque
/// to the client and validated server side.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordSource: Send {
    async fn next_record(&mut self) -> io::Result<Option<String>>;
}

// ---------------------------------------------------------------------------
// File-backed source
// ---------------------------------------------------------------------------

/// Streams records from the agency's line-oriented bet file.
#[derive(Debug)]
pub struct FileRecordSource {
    lines: Lines<BufReader<File>>,
}

impl FileRecordSource {
    /// Open the record file for streaming.
    pub async fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .await
            .with_context(|| format!("Failed to open record file {}", path.display()))?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
        })
    }
}

#[async_trait]
impl RecordSource for FileRecordSource {
    async fn next_record(&mut self) -> io::Result<Option<String>> {
        while let Some(line) = self.lines.next_line().await? {
            // Windows-edited bet files end lines with \r\n.
            let record = line.trim_end_matches('\r');
            if record.trim().is_empty() {
                continue;
            }
            return Ok(Some(record.to_owned()));
        }
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
