//! Feed Lifecycle Integration Tests
//!
//! Drives the supervisor through the public feed handle over a scripted
//! transport, with Tokio's clock paused so backoff waits are exact.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, sleep};

use common::{ETH_TRADE, Exhausted, Log, Script, ScriptedConnector, config, subscribes};
use trade_feed::{FeedError, FeedHandle, SessionState, start_with_connector};

/// Start a feed whose callbacks append to `log`.
fn start_logged(connector: Arc<ScriptedConnector>, channels: &[&str], log: &Log) -> FeedHandle {
    let handle = start_with_connector(config(channels), connector).unwrap();

    let trades = Arc::clone(log);
    handle.on_trade(move |trade| trades.lock().push(format!("trade:{}", trade.symbol())));

    let errors = Arc::clone(log);
    handle.on_error(move |error| {
        let label = match error {
            FeedError::Decode(_) => "decode".to_string(),
            FeedError::Transport(e) => format!("transport:{}", e.kind()),
            FeedError::VenueNotice(notice) if notice.is_error() => "venue-error".to_string(),
            FeedError::VenueNotice(_) => "venue-ack".to_string(),
        };
        errors.lock().push(format!("error:{label}"));
    });

    handle
}

/// Timer rounding allowance.
const SLACK: Duration = Duration::from_millis(5);

fn assert_near(actual: Duration, expected_secs: u64) {
    let expected = Duration::from_secs(expected_secs);
    let diff = actual.max(expected) - actual.min(expected);
    assert!(diff <= SLACK, "expected ~{expected:?}, got {actual:?}");
}

fn gaps(instants: &[Instant]) -> Vec<Duration> {
    instants.windows(2).map(|w| w[1] - w[0]).collect()
}

#[tokio::test(start_paused = true)]
async fn every_session_sends_one_subscribe_before_decoding() {
    let log = Log::default();
    let connector = ScriptedConnector::new(
        vec![
            Script::open_for(Duration::from_secs(1), &[ETH_TRADE]),
            Script::open_forever(&[ETH_TRADE]),
        ],
        Exhausted::Hang,
        &log,
    );
    let handle = start_logged(
        Arc::clone(&connector),
        &["btcusdt@trade", "ETHUSDT@trade", "solusdt@trade"],
        &log,
    );

    sleep(Duration::from_secs(10)).await;
    handle.stop().await;

    assert_eq!(
        subscribes(&log),
        vec![
            r#"{"method":"SUBSCRIBE","params":["btcusdt@trade","ethusdt@trade","solusdt@trade"],"id":1}"#,
            r#"{"method":"SUBSCRIBE","params":["btcusdt@trade","ethusdt@trade","solusdt@trade"],"id":2}"#,
        ]
    );

    let log = log.lock().clone();
    let positions = |needle: &str| -> Vec<usize> {
        log.iter()
            .enumerate()
            .filter(|(_, entry)| entry.starts_with(needle))
            .map(|(i, _)| i)
            .collect()
    };
    let sends = positions("send:");
    let trades = positions("trade:");
    assert_eq!(sends.len(), 2);
    assert_eq!(trades.len(), 2);
    assert!(sends[0] < trades[0]);
    assert!(trades[0] < sends[1]);
    assert!(sends[1] < trades[1]);
}

#[tokio::test(start_paused = true)]
async fn immediate_failures_back_off_exponentially_up_to_the_cap() {
    let log = Log::default();
    let connector = ScriptedConnector::new(Vec::new(), Exhausted::Refuse, &log);
    let handle = start_logged(Arc::clone(&connector), &["ethusdt@trade"], &log);

    let mut last_attempts = 0;
    for _ in 0..6 {
        // Each wait covers the next backoff
        sleep(Duration::from_secs(61)).await;
        let attempts = handle.status().attempt_count;
        assert!(attempts > last_attempts);
        last_attempts = attempts;
    }
    handle.stop().await;

    let gaps = gaps(&connector.connects());
    assert!(gaps.len() >= 6);
    assert_near(gaps[0], 2);
    assert_near(gaps[1], 4);
    assert_near(gaps[2], 8);
    for pair in gaps.windows(2) {
        assert!(pair[1] + SLACK >= pair[0], "delay decreased: {pair:?}");
    }
    assert!(gaps.iter().all(|gap| *gap <= Duration::from_secs(60) + SLACK));
    assert_near(*gaps.last().unwrap(), 60);
}

#[tokio::test(start_paused = true)]
async fn stable_session_resets_attempt_count() {
    let log = Log::default();
    let connector = ScriptedConnector::new(
        vec![
            Script::Refuse,
            Script::Refuse,
            Script::open_for(Duration::from_secs(31), &[]),
        ],
        Exhausted::Refuse,
        &log,
    );
    let handle = start_logged(Arc::clone(&connector), &["ethusdt@trade"], &log);

    // Refused at 0s and 2s, open from 6s
    sleep(Duration::from_secs(5)).await;
    assert_eq!(handle.status().attempt_count, 2);

    sleep(Duration::from_secs(5)).await;
    assert_eq!(handle.status().state, SessionState::Open);

    // Dropped at 37s after 31s of uptime
    sleep(Duration::from_millis(27_500)).await;
    assert_eq!(handle.status().attempt_count, 0);

    // Refused again at 38s
    sleep(Duration::from_secs(1)).await;
    assert_eq!(handle.status().attempt_count, 1);
    handle.stop().await;

    let connects = connector.connects();
    assert_near(connects[3] - connects[2], 32);
}

#[tokio::test(start_paused = true)]
async fn short_session_counts_as_failure() {
    let log = Log::default();
    let connector = ScriptedConnector::new(
        vec![Script::open_for(Duration::from_secs(5), &[ETH_TRADE])],
        Exhausted::Hang,
        &log,
    );
    let handle = start_logged(Arc::clone(&connector), &["ethusdt@trade"], &log);

    sleep(Duration::from_secs(6)).await;
    assert_eq!(handle.status().attempt_count, 1);
    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn stop_during_backoff_creates_no_further_sessions() {
    let log = Log::default();
    let connector = ScriptedConnector::new(Vec::new(), Exhausted::Refuse, &log);
    let handle = start_logged(Arc::clone(&connector), &["ethusdt@trade"], &log);

    sleep(Duration::from_secs(1)).await;
    let before = Instant::now();
    handle.stop().await;
    assert!(before.elapsed() < Duration::from_secs(1));

    sleep(Duration::from_secs(120)).await;
    assert_eq!(connector.connects().len(), 1);
    assert_eq!(handle.status().sessions_started, 1);
}

#[tokio::test(start_paused = true)]
async fn stop_during_connect_returns_promptly() {
    let log = Log::default();
    let connector = ScriptedConnector::new(Vec::new(), Exhausted::Hang, &log);
    let handle = start_logged(Arc::clone(&connector), &["ethusdt@trade"], &log);

    sleep(Duration::from_secs(3)).await;
    let before = Instant::now();
    handle.stop().await;
    assert!(before.elapsed() < Duration::from_secs(1));

    sleep(Duration::from_secs(60)).await;
    assert_eq!(connector.connects().len(), 1);
    assert_eq!(handle.status().state, SessionState::Closed);
}

#[tokio::test(start_paused = true)]
async fn stop_while_open_releases_connection() {
    let log = Log::default();
    let connector = ScriptedConnector::new(
        vec![Script::open_forever(&[ETH_TRADE])],
        Exhausted::Refuse,
        &log,
    );
    let handle = start_logged(Arc::clone(&connector), &["ethusdt@trade"], &log);

    sleep(Duration::from_secs(5)).await;
    assert_eq!(handle.status().state, SessionState::Open);

    handle.stop().await;
    handle.stop().await;

    let log = log.lock().clone();
    let tail: Vec<&str> = log.iter().rev().take(2).rev().map(String::as_str).collect();
    assert_eq!(tail, vec!["close", "released"]);
    assert_eq!(connector.connects().len(), 1);
    assert_eq!(handle.status().state, SessionState::Closed);
}

#[tokio::test(start_paused = true)]
async fn bad_frames_do_not_interrupt_the_stream() {
    let log = Log::default();
    let connector = ScriptedConnector::new(
        vec![Script::open_forever(&[
            "garbage",
            ETH_TRADE,
            r#"{"q":"1","T":1700000000000,"s":"ETHUSDT"}"#,
            r#"{"p":"abc","q":"1","T":1700000000000,"s":"ETHUSDT"}"#,
            ETH_TRADE,
        ])],
        Exhausted::Hang,
        &log,
    );
    let handle = start_logged(Arc::clone(&connector), &["ethusdt@trade"], &log);

    sleep(Duration::from_secs(1)).await;
    let status = handle.status();
    handle.stop().await;

    assert_eq!(status.trades_received, 2);
    assert_eq!(status.decode_errors, 3);
    assert_eq!(status.sessions_started, 1);

    let events: Vec<String> = log
        .lock()
        .iter()
        .filter(|entry| entry.starts_with("trade:") || entry.starts_with("error:"))
        .cloned()
        .collect();
    assert_eq!(
        events,
        vec![
            "error:decode",
            "trade:ETHUSDT",
            "error:decode",
            "error:decode",
            "trade:ETHUSDT",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn venue_error_frame_is_informational() {
    let log = Log::default();
    let connector = ScriptedConnector::new(
        vec![Script::open_forever(&[
            r#"{"result":null,"id":1}"#,
            r#"{"error":{"code":2,"msg":"Invalid request: unknown channel"},"id":1}"#,
            ETH_TRADE,
        ])],
        Exhausted::Hang,
        &log,
    );
    let handle = start_logged(Arc::clone(&connector), &["nosuchcoin@trade"], &log);

    sleep(Duration::from_secs(1)).await;
    let status = handle.status();
    handle.stop().await;

    assert_eq!(status.venue_notices, 2);
    assert_eq!(status.decode_errors, 0);
    assert_eq!(status.sessions_started, 1);
    assert_eq!(status.state, SessionState::Open);

    let log = log.lock().clone();
    assert!(log.contains(&"error:venue-ack".to_string()));
    assert!(log.contains(&"error:venue-error".to_string()));
    assert!(log.contains(&"trade:ETHUSDT".to_string()));
}

#[tokio::test(start_paused = true)]
async fn dropped_connection_is_reported_then_retried() {
    let log = Log::default();
    let connector = ScriptedConnector::new(
        vec![Script::open_for(Duration::ZERO, &[])],
        Exhausted::Hang,
        &log,
    );
    let handle = start_logged(Arc::clone(&connector), &["ethusdt@trade"], &log);

    sleep(Duration::from_secs(3)).await;
    handle.stop().await;

    assert!(log.lock().contains(&"error:transport:disconnected".to_string()));
    assert_eq!(connector.connects().len(), 2);
}
