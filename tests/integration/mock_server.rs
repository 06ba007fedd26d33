//! In-process lottery server for integration testing.
//!
//! Listens on a loopback port and speaks the real wire protocol. Test
//! code scripts how the draw behaves and inspects everything the client
//! sent. One connection per server instance, matching production where
//! each agency holds a single session.

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use quiniela::protocol::{self, Message};
use quiniela::types::commands;

/// How the server answers results requests.
pub enum DrawBehavior {
    /// The draw is already complete; reply with these winners.
    Complete(Vec<String>),
    /// Reply in-progress this many times, then the winners.
    Delayed {
        in_progress_replies: u32,
        winners: Vec<String>,
    },
    /// The draw never completes; every request gets in-progress.
    NeverComplete,
}

/// Everything the server received, in arrival order.
#[derive(Debug, Default, Clone)]
pub struct Received {
    pub commands: Vec<String>,
    pub batches: Vec<Vec<String>>,
}

impl Received {
    pub fn results_requests(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| c.starts_with("RESULTS_REQUEST"))
            .count()
    }

    /// All uploaded records in upload order, batches flattened.
    pub fn records(&self) -> Vec<String> {
        self.batches.iter().flatten().cloned().collect()
    }
}

pub struct MockLotteryServer {
    address: String,
    received: Arc<Mutex<Received>>,
    handle: JoinHandle<()>,
}

impl MockLotteryServer {
    /// Bind a loopback port and serve a single client connection.
    pub async fn start(behavior: DrawBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let received = Arc::new(Mutex::new(Received::default()));
        let log = Arc::clone(&received);
        let handle = tokio::spawn(async move {
            if let Ok((stream, _)) = listener.accept().await {
                serve(stream, behavior, log).await;
            }
        });
        Self {
            address,
            received,
            handle,
        }
    }

    /// `host:port` the client should dial.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Snapshot of everything received so far.
    pub fn received(&self) -> Received {
        self.received.lock().unwrap().clone()
    }

    /// Wait for the client to hang up, then hand back the full log.
    pub async fn finished(self) -> Received {
        self.handle.await.unwrap();
        let snapshot = self.received.lock().unwrap().clone();
        snapshot
    }
}

async fn serve(mut stream: TcpStream, behavior: DrawBehavior, log: Arc<Mutex<Received>>) {
    let mut pending = match &behavior {
        DrawBehavior::Delayed {
            in_progress_replies,
            ..
        } => *in_progress_replies,
        _ => 0,
    };
    loop {
        let msg = match read_message(&mut stream).await {
            Some(msg) => msg,
            None => return,
        };
        let command = match msg {
            Message::List(batch) => {
                log.lock().unwrap().batches.push(batch);
                continue;
            }
            Message::Plain(command) => {
                log.lock().unwrap().commands.push(command.clone());
                command
            }
        };
        if !command.starts_with("RESULTS_REQUEST") {
            continue;
        }
        let reply = match &behavior {
            DrawBehavior::Complete(winners) => Message::List(winners.clone()),
            DrawBehavior::Delayed { winners, .. } => {
                if pending > 0 {
                    pending -= 1;
                    Message::Plain(commands::IN_PROGRESS.into())
                } else {
                    Message::List(winners.clone())
                }
            }
            DrawBehavior::NeverComplete => Message::Plain(commands::IN_PROGRESS.into()),
        };
        write_message(&mut stream, &reply).await;
    }
}

async fn read_message(stream: &mut TcpStream) -> Option<Message> {
    let mut header = [0u8; protocol::HEADER_LEN];
    stream.read_exact(&mut header).await.ok()?;
    let len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize;
    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).await.ok()?;
    protocol::decode(header[0], &body).ok()
}

async fn write_message(stream: &mut TcpStream, msg: &Message) {
    // Best effort: the client may already have hung up.
    let _ = stream.write_all(&protocol::encode(msg).unwrap()).await;
}

/// Convenience for behavior literals.
pub fn winners(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    async fn send_raw(stream: &mut TcpStream, msg: &Message) {
        stream
            .write_all(&protocol::encode(msg).unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_complete_draw_replies_winners() {
        let server = MockLotteryServer::start(DrawBehavior::Complete(winners(&["42"]))).await;
        let mut stream = TcpStream::connect(server.address()).await.unwrap();

        send_raw(&mut stream, &Message::Plain("RESULTS_REQUEST,9".into())).await;
        let reply = read_message(&mut stream).await.unwrap();
        assert_eq!(reply, Message::List(vec!["42".to_string()]));

        drop(stream);
        let received = server.finished().await;
        assert_eq!(received.results_requests(), 1);
    }

    #[tokio::test]
    async fn test_batches_and_commands_are_logged_in_order() {
        let server = MockLotteryServer::start(DrawBehavior::NeverComplete).await;
        let mut stream = TcpStream::connect(server.address()).await.unwrap();

        send_raw(&mut stream, &Message::Plain("LOAD_BATCHES,9".into())).await;
        send_raw(&mut stream, &Message::List(winners(&["a", "b"]))).await;
        send_raw(&mut stream, &Message::Plain("END".into())).await;

        drop(stream);
        let received = server.finished().await;
        assert_eq!(received.commands, vec!["LOAD_BATCHES,9", "END"]);
        assert_eq!(received.records(), vec!["a", "b"]);
    }
}
