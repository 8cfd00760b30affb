//! Worker thread and supervisor tests

use std::time::{Duration, Instant};

use murmur::config::DEFAULT_FAREWELL;
use murmur::daemon::{WORKER_THREAD_NAME, spawn_worker, supervise};
use murmur::{Phase, SessionState, StopSignal};

mod common;

use common::{Harness, ScriptedListener, ScriptedRunner, texts};

const POLL: Duration = Duration::from_millis(10);

/// Scheduling slack allowed on top of one poll interval
const SLACK: Duration = Duration::from_millis(100);

#[tokio::test]
async fn test_supervisor_returns_within_a_poll_after_quit() {
    let poll = Duration::from_millis(200);
    let stop = StopSignal::new();
    let listener = ScriptedListener::new(&["hey assistant", "what is 2 plus 2", "quit"]);
    let runner = ScriptedRunner::replying("Four.");
    let h = Harness::new(Some("hey assistant"), listener, runner, stop.clone());
    let spoken = h.spoken.clone();
    let log_path = h.log_path.clone();

    let worker = spawn_worker(h.controller).unwrap();
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        supervise(worker, &stop, std::future::pending(), poll),
    )
    .await
    .expect("supervisor did not return");
    let returned = Instant::now();

    assert!(result.is_ok());
    assert!(stop.is_requested());

    // The farewell is the worker's last act before it exits
    let farewell = spoken.lock().unwrap().last().cloned().unwrap();
    assert_eq!(farewell.text, DEFAULT_FAREWELL);
    let lag = returned.duration_since(farewell.at);
    assert!(lag <= poll + SLACK, "supervisor returned {lag:?} after the worker finished");
    assert!(std::fs::read_to_string(log_path).unwrap().contains("Assistant: Four."));
}

#[tokio::test]
async fn test_interrupt_requests_stop_and_waits() {
    let stop = StopSignal::new();
    // Never hears anything, so only the interrupt can end it
    let listener = ScriptedListener::new(&[]);
    let h = Harness::new(None, listener, ScriptedRunner::replying("unused"), stop.clone());
    let spoken = h.spoken.clone();

    let worker = spawn_worker(h.controller).unwrap();
    let started = Instant::now();
    let interrupt = tokio::time::sleep(Duration::from_millis(50));

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        supervise(worker, &stop, interrupt, POLL),
    )
    .await
    .expect("supervisor did not return");

    assert!(result.is_ok());
    assert!(stop.is_requested());
    assert!(started.elapsed() >= Duration::from_millis(50));
    // Interrupted turns end without a farewell
    assert!(texts(&spoken).is_empty());
}

#[tokio::test]
async fn test_worker_runs_on_named_thread() {
    let h = Harness::scripted(None, &[], ScriptedRunner::replying("unused"));
    let stop = h.stop.clone();
    let worker = spawn_worker(h.controller).unwrap();

    assert_eq!(worker.thread().name(), Some(WORKER_THREAD_NAME));

    // The script is empty, so the worker stops itself
    supervise(worker, &stop, std::future::pending(), POLL).await.unwrap();
}

#[test]
fn test_stop_signal_shared_with_session() {
    let stop = StopSignal::new();
    let mut session = SessionState::new(true, stop.clone());
    assert_eq!(session.phase(), Phase::AwaitingWakeWord);

    let remote = stop.clone();
    std::thread::spawn(move || remote.request()).join().unwrap();

    assert!(session.stop_requested());
    session.terminate();
    assert_eq!(session.phase(), Phase::Terminated);
}
