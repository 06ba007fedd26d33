//! End-to-end session tests over real TCP.
//!
//! Each test starts a scripted in-process server, writes a bet file into
//! a scratch directory, and drives a full client session against it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use quiniela::config::{AgencyConfig, BatchConfig, ClientConfig, ResultsConfig, ServerConfig};
use quiniela::records::FileRecordSource;
use quiniela::session::Client;
use quiniela::types::{ClientError, SessionState};

use crate::mock_server::{winners, DrawBehavior, MockLotteryServer};

const BETS: &[&str] = &[
    "Santiago Lionel,Lorca,30904465,1999-03-17,7574",
    "Juana,Robles,35635111,1990-11-24,7823",
    "Ana Paula,Suarez,33791469,1993-07-02,1011",
    "Martin,Funes,28450120,1985-01-30,4442",
    "Camila,Ortega,39115889,1996-05-09,902",
    "Bruno,Paz,31002458,1988-09-14,6401",
    "Lucia,Medina,40223817,1998-12-01,3030",
];

fn test_config(address: &str, data_dir: &Path) -> ClientConfig {
    ClientConfig {
        agency: AgencyConfig {
            id: 1,
            data_dir: data_dir.to_path_buf(),
        },
        server: ServerConfig {
            address: address.to_string(),
            connect_timeout_secs: 2,
        },
        batch: BatchConfig { max_size: 3 },
        results: ResultsConfig {
            retry_period_ms: 50,
            max_poll_attempts: None,
        },
    }
}

/// Writes `agency-1.csv` into a fresh scratch directory and returns it.
fn write_bet_file(tag: &str, records: &[&str]) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("quiniela-it-{}-{tag}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("agency-1.csv"), records.join("\n") + "\n").unwrap();
    dir
}

#[tokio::test]
async fn test_full_session_uploads_file_and_collects_winners() {
    let server =
        MockLotteryServer::start(DrawBehavior::Complete(winners(&["30904465", "33791469"])))
            .await;
    let dir = write_bet_file("happy", BETS);

    let cfg = test_config(server.address(), &dir);
    let mut source = FileRecordSource::open(&cfg.data_file()).await.unwrap();
    let mut client = Client::new(cfg, CancellationToken::new());

    let results = client.run(&mut source).await.unwrap();
    assert_eq!(results.winners, vec!["30904465", "33791469"]);
    assert_eq!(client.state(), SessionState::Done);

    let received = server.finished().await;
    assert_eq!(
        received.commands,
        vec!["LOAD_BATCHES,1", "END", "ALL_BETS_SENT,1", "RESULTS_REQUEST,1"]
    );
    let sizes: Vec<usize> = received.batches.iter().map(|b| b.len()).collect();
    assert_eq!(sizes, vec![3, 3, 1]);
    assert_eq!(received.records(), BETS);

    std::fs::remove_dir_all(dir).ok();
}

#[tokio::test]
async fn test_polling_retries_until_draw_completes() {
    let server = MockLotteryServer::start(DrawBehavior::Delayed {
        in_progress_replies: 2,
        winners: winners(&["111", "222"]),
    })
    .await;
    let dir = write_bet_file("delayed", &BETS[..1]);

    let cfg = test_config(server.address(), &dir);
    let mut source = FileRecordSource::open(&cfg.data_file()).await.unwrap();
    let mut client = Client::new(cfg, CancellationToken::new());

    let started = std::time::Instant::now();
    let results = client.run(&mut source).await.unwrap();

    // Two in-progress replies mean two full retry sleeps.
    assert!(started.elapsed() >= Duration::from_millis(100));
    assert_eq!(results.winners, vec!["111", "222"]);

    let received = server.finished().await;
    assert_eq!(received.results_requests(), 3);

    std::fs::remove_dir_all(dir).ok();
}

#[tokio::test]
async fn test_shutdown_interrupts_an_endless_draw() {
    let server = MockLotteryServer::start(DrawBehavior::NeverComplete).await;
    let dir = write_bet_file("shutdown", &BETS[..2]);

    let mut cfg = test_config(server.address(), &dir);
    // Long enough that the cancel always lands inside the retry sleep.
    cfg.results.retry_period_ms = 30_000;
    let cancel = CancellationToken::new();
    let mut source = FileRecordSource::open(&cfg.data_file()).await.unwrap();
    let mut client = Client::new(cfg, cancel.clone());

    let trigger = async {
        while server.received().results_requests() == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        cancel.cancel();
    };
    let (outcome, ()) = tokio::join!(client.run(&mut source), trigger);

    assert!(matches!(outcome, Err(ClientError::Cancelled)));
    assert_eq!(client.state(), SessionState::Failed);

    let received = server.finished().await;
    assert_eq!(received.results_requests(), 1);

    std::fs::remove_dir_all(dir).ok();
}

#[tokio::test]
async fn test_unreachable_server_fails_without_retry() {
    // Bind then drop to get a port with nothing listening.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    drop(listener);

    let dir = write_bet_file("refused", &BETS[..1]);
    let cfg = test_config(&address, &dir);
    let mut source = FileRecordSource::open(&cfg.data_file()).await.unwrap();
    let mut client = Client::new(cfg, CancellationToken::new());

    let outcome = client.run(&mut source).await;
    assert!(matches!(outcome, Err(ClientError::Connect { .. })));
    assert_eq!(client.state(), SessionState::Failed);

    std::fs::remove_dir_all(dir).ok();
}
