//! Client session state machine.
//!
//! Drives one agency through the complete exchange with the lottery
//! server: register, upload every bet in bounded batches, announce
//! completion, then poll until the draw results arrive. Steps are strictly
//! sequential; the session never has more than one message in flight, and
//! every blocking point honors the shutdown token through the transport.
//!
//! ```text
//! idle -> connected -> uploading -> notified -> polling -> done
//!   \________\____________\____________\___________\----> failed
//! ```
//!
//! `Done` and `Failed` both close the transport; a best-effort `END` is
//! sent first if the upload never reached that step, so the server can
//! release this agency's slot.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::ClientConfig;
use crate::protocol::{self, Message};
use crate::records::RecordSource;
use crate::transport::Transport;
use crate::types::{commands, ClientError, DrawResults, SessionState};
use crate::upload::BatchUploader;

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct Client {
    config: ClientConfig,
    cancel: CancellationToken,
    state: SessionState,
    end_sent: bool,
}

impl Client {
    pub fn new(config: ClientConfig, cancel: CancellationToken) -> Self {
        Self {
            config,
            cancel,
            state: SessionState::Idle,
            end_sent: false,
        }
    }

    /// Current phase of the session.
    pub fn state(&self) -> SessionState {
        self.state
    }

    fn agency_id(&self) -> u32 {
        self.config.agency.id
    }

    /// Run the whole session against the configured server.
    pub async fn run<R>(&mut self, source: &mut R) -> Result<DrawResults, ClientError>
    where
        R: RecordSource + ?Sized,
    {
        let transport = match Transport::dial(
            &self.config.server.address,
            self.config.connect_timeout(),
            self.cancel.clone(),
        )
        .await
        {
            Ok(transport) => transport,
            Err(err) => return Err(self.fail(err)),
        };
        info!(
            action = "connect",
            result = "success",
            address = %self.config.server.address,
            agency_id = self.agency_id(),
        );
        self.run_connected(transport, source).await
    }

    /// Run the session over an already-established stream.
    ///
    /// [`run`](Self::run) calls this once the dial succeeds; tests drive it
    /// directly over in-memory pipes.
    pub async fn run_connected<S, R>(
        &mut self,
        mut transport: Transport<S>,
        source: &mut R,
    ) -> Result<DrawResults, ClientError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
        R: RecordSource + ?Sized,
    {
        self.enter(SessionState::Connected);
        let outcome = self.exchange(&mut transport, source).await;
        self.conclude(&mut transport, outcome).await
    }

    /// The ordered protocol steps between connect and terminal close.
    async fn exchange<S, R>(
        &mut self,
        transport: &mut Transport<S>,
        source: &mut R,
    ) -> Result<DrawResults, ClientError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
        R: RecordSource + ?Sized,
    {
        // Registration is fire and forget; the server sends no reply.
        let register = Message::Plain(commands::load_batches(self.agency_id()));
        protocol::send(transport, &register).await?;
        self.enter(SessionState::Uploading);

        let report = BatchUploader::new(self.config.batch.max_size)
            .run(transport, source)
            .await?;
        info!(
            action = "bets_uploaded",
            result = "success",
            records = report.records,
            batches = report.batches,
        );

        protocol::send(transport, &Message::Plain(commands::END.into())).await?;
        self.end_sent = true;
        let notice = Message::Plain(commands::all_bets_sent(self.agency_id()));
        protocol::send(transport, &notice).await?;
        self.enter(SessionState::Notified);

        self.poll_results(transport).await
    }

    /// Ask for results until the draw completes, the configured attempt
    /// limit runs out, or the session is cancelled.
    async fn poll_results<S>(
        &mut self,
        transport: &mut Transport<S>,
    ) -> Result<DrawResults, ClientError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.enter(SessionState::Polling);
        let request = Message::Plain(commands::results_request(self.agency_id()));
        let mut attempts: u32 = 0;
        loop {
            protocol::send(transport, &request).await?;
            match protocol::receive(transport).await? {
                Message::List(winners) => {
                    let results = DrawResults::new(winners);
                    info!(
                        action = "winners_received",
                        result = "success",
                        winners = results.winner_count(),
                    );
                    return Ok(results);
                }
                Message::Plain(reply) if reply == commands::IN_PROGRESS => {
                    attempts += 1;
                    debug!(
                        action = "results_poll",
                        result = "in_progress",
                        attempt = attempts,
                    );
                    if let Some(limit) = self.config.results.max_poll_attempts {
                        if attempts >= limit {
                            return Err(ClientError::PollLimit(attempts));
                        }
                    }
                    self.wait_retry_period().await?;
                }
                Message::Plain(other) => return Err(ClientError::UnexpectedReply(other)),
            }
        }
    }

    /// Sleep out the retry period, or bail early on shutdown.
    async fn wait_retry_period(&self) -> Result<(), ClientError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ClientError::Cancelled),
            _ = tokio::time::sleep(self.config.retry_period()) => Ok(()),
        }
    }

    /// Terminal bookkeeping shared by both outcomes: best-effort `END` if
    /// the upload never got that far, close the transport, log the verdict.
    async fn conclude<S>(
        &mut self,
        transport: &mut Transport<S>,
        outcome: Result<DrawResults, ClientError>,
    ) -> Result<DrawResults, ClientError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        if !self.end_sent && transport.is_open() {
            // The server only frees this agency's slot on END; losing the
            // message delays that but cannot change the outcome here.
            let _ = protocol::send(transport, &Message::Plain(commands::END.into())).await;
        }
        transport.close().await;

        match outcome {
            Ok(results) => {
                self.enter(SessionState::Done);
                info!(
                    action = "session",
                    result = "success",
                    winners = results.winner_count(),
                );
                Ok(results)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Mark the session failed and report the cause at the right level.
    /// Shutdown is not a defect, so it never reaches the error log.
    fn fail(&mut self, err: ClientError) -> ClientError {
        self.enter(SessionState::Failed);
        if err.is_cancelled() {
            info!(action = "session", result = "interrupted");
        } else {
            error!(action = "session", result = "fail", error = %err);
        }
        err
    }

    fn enter(&mut self, next: SessionState) {
        debug!(action = "session_state", from = %self.state, to = %next);
        self.state = next;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
