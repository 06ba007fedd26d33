//! Connection adapter between the codec and a raw byte stream.
//!
//! `Transport` wraps an ordered, full-duplex stream (TCP in production,
//! in-memory pipes in tests) and owes its callers two guarantees:
//!
//! - read/write calls either complete fully or fail; short reads are
//!   reported with how many bytes actually arrived;
//! - every call races the shared [`CancellationToken`], so a shutdown
//!   signal unblocks any in-flight dial, read, or write instead of leaving
//!   it hanging. Once the token is cancelled every further call fails fast
//!   with [`ClientError::Cancelled`].
//!
//! The session owns the transport and uses it strictly sequentially; only
//! one message is ever in flight.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::types::ClientError;

#[derive(Debug)]
pub struct Transport<S> {
    stream: Option<S>,
    cancel: CancellationToken,
}

impl Transport<TcpStream> {
    /// Establish a TCP connection to `addr`.
    ///
    /// Fails with [`ClientError::Connect`] if the connection is refused or
    /// not established within `timeout`, and with [`ClientError::Cancelled`]
    /// if the shutdown signal arrives first.
    pub async fn dial(
        addr: &str,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Result<Self, ClientError> {
        let attempt = tokio::time::timeout(timeout, TcpStream::connect(addr));
        let stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ClientError::Cancelled),
            outcome = attempt => match outcome {
                Ok(Ok(stream)) => stream,
                Ok(Err(source)) => {
                    return Err(ClientError::Connect {
                        addr: addr.to_owned(),
                        source,
                    })
                }
                Err(_) => {
                    return Err(ClientError::Connect {
                        addr: addr.to_owned(),
                        source: io::Error::new(
                            io::ErrorKind::TimedOut,
                            format!("no answer within {timeout:?}"),
                        ),
                    })
                }
            },
        };
        Ok(Self::new(stream, cancel))
    }
}

impl<S> Transport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an already-established stream. Tests use this with in-memory
    /// duplex pipes and scripted mock streams.
    pub fn new(stream: S, cancel: CancellationToken) -> Self {
        Self {
            stream: Some(stream),
            cancel,
        }
    }

    /// Whether [`close`](Self::close) has not been called yet.
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Write all of `bytes`, retrying on partial writes, then flush.
    pub async fn write_all(&mut self, bytes: &[u8]) -> Result<(), ClientError> {
        let cancel = self.cancel.clone();
        let stream = self.stream.as_mut().ok_or_else(closed)?;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ClientError::Cancelled),
            outcome = async {
                stream.write_all(bytes).await?;
                stream.flush().await
            } => outcome.map_err(ClientError::from),
        }
    }

    /// Fill `buf` completely, looping over as many reads as it takes.
    ///
    /// End of stream before the buffer is full fails with
    /// [`ClientError::Incomplete`] carrying the byte counts.
    pub async fn read_full(&mut self, buf: &mut [u8]) -> Result<(), ClientError> {
        let cancel = self.cancel.clone();
        let stream = self.stream.as_mut().ok_or_else(closed)?;
        let mut read = 0;
        while read < buf.len() {
            let n = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                outcome = stream.read(&mut buf[read..]) => outcome?,
            };
            if n == 0 {
                return Err(ClientError::Incomplete {
                    expected: buf.len(),
                    read,
                });
            }
            read += n;
        }
        Ok(())
    }

    /// Shut down and drop the stream. Safe to call more than once; the
    /// shutdown error, if any, is ignored.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
            debug!(action = "close_transport", result = "success");
        }
    }
}

fn closed() -> ClientError {
    ClientError::Transport(io::Error::new(
        io::ErrorKind::NotConnected,
        "transport already closed",
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
