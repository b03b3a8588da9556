//! Session controller tests: start/stop semantics, event emission, and the
//! stop-while-retrying race.

mod common;

use auriga::client::ChargePointClient;
use auriga::controller::SessionController;
use auriga::error::AurigaError;
use auriga::events::{EventBus, SessionEvent};
use auriga::scheduler::PollScheduler;
use auriga::session::ChargingState;
use auriga::store::{MemoryStore, SessionStore};
use common::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct Rig {
    client: Arc<ScriptedClient>,
    bus: Arc<EventBus>,
    controller: SessionController,
    started: Arc<AtomicU32>,
    stopped: Arc<AtomicU32>,
}

fn rig() -> Rig {
    let client = Arc::new(ScriptedClient::new());
    let store = Arc::new(MemoryStore::new());
    let bus = Arc::new(EventBus::new());
    let state = Arc::new(Mutex::new(ChargingState::new()));
    let started = count_started(&bus);
    let stopped = count_stopped(&bus);

    let handle = PollScheduler::spawn(
        Arc::clone(&client) as Arc<dyn ChargePointClient>,
        Arc::clone(&store) as Arc<dyn SessionStore>,
        Arc::clone(&bus),
        Arc::clone(&state),
        &polling(10, 30, 3),
    );

    let controller = SessionController::new(
        Arc::clone(&client) as Arc<dyn ChargePointClient>,
        Arc::clone(&bus),
        state,
        handle,
    );

    Rig {
        client,
        bus,
        controller,
        started,
        stopped,
    }
}

#[tokio::test]
async fn successful_start_sets_state_and_emits_one_started_event() {
    let rig = rig();
    rig.client.push_start(Ok(accepted_start("abc123")));

    let started_ids = Arc::new(Mutex::new(Vec::new()));
    {
        let ids = Arc::clone(&started_ids);
        rig.bus.subscribe_started(move |event| {
            if let SessionEvent::Started { session_id, .. } = event {
                ids.lock().unwrap().push(session_id.clone());
            }
            Ok(())
        });
    }

    let outcome = rig.controller.start(63205, 1).await.unwrap();
    assert!(outcome.success);
    assert!(outcome.charging);
    assert_eq!(outcome.session_id.as_deref(), Some("abc123"));

    let snapshot = rig.controller.state_snapshot().unwrap();
    assert!(snapshot.is_charging);
    assert_eq!(snapshot.active_session_id.as_deref(), Some("abc123"));

    assert_eq!(rig.started.load(Ordering::SeqCst), 1);
    assert_eq!(*started_ids.lock().unwrap(), vec!["abc123".to_string()]);
    assert_eq!(rig.client.start_calls(), 1);
}

#[tokio::test]
async fn start_rejects_non_positive_identifiers_before_any_call() {
    let rig = rig();

    let err = rig.controller.start(0, 1).await.unwrap_err();
    assert!(matches!(err, AurigaError::Validation { .. }));

    let err = rig.controller.start(63205, -1).await.unwrap_err();
    assert!(matches!(err, AurigaError::Validation { .. }));

    assert_eq!(rig.client.start_calls(), 0);
    assert_eq!(rig.started.load(Ordering::SeqCst), 0);
    assert!(!rig.controller.state_snapshot().unwrap().is_charging);
}

#[tokio::test]
async fn rejected_start_mutates_nothing() {
    let rig = rig();
    rig.client
        .push_start(Ok(rejected_start("Charge point is busy")));

    let outcome = rig.controller.start(63205, 1).await.unwrap();
    assert!(!outcome.success);
    assert!(!outcome.charging);
    assert_eq!(outcome.message, "Charge point is busy");

    assert!(!rig.controller.state_snapshot().unwrap().is_charging);
    assert_eq!(rig.started.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn auth_failure_on_start_propagates_without_state_change() {
    let rig = rig();
    rig.client
        .push_start(Err(AurigaError::auth("token expired")));

    let err = rig.controller.start(63205, 1).await.unwrap_err();
    assert!(matches!(err, AurigaError::Auth { .. }));

    assert!(!rig.controller.state_snapshot().unwrap().is_charging);
    assert_eq!(rig.started.load(Ordering::SeqCst), 0);
    assert_eq!(rig.stopped.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn concurrent_session_is_rejected_defensively() {
    let rig = rig();
    rig.client.push_start(Ok(accepted_start("abc123")));

    assert!(rig.controller.start(63205, 1).await.unwrap().success);

    let second = rig.controller.start(63205, 1).await.unwrap();
    assert!(!second.success);
    assert!(second.charging);
    assert_eq!(second.session_id.as_deref(), Some("abc123"));

    // The client was only ever asked once
    assert_eq!(rig.client.start_calls(), 1);
    assert_eq!(rig.started.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn stop_without_active_session_is_an_idempotent_noop() {
    let rig = rig();

    let outcome = rig.controller.stop(63205).await.unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.message, "No charging session found");

    assert_eq!(rig.client.stop_calls(), 0);
    assert_eq!(rig.stopped.load(Ordering::SeqCst), 0);
    assert!(!rig.controller.state_snapshot().unwrap().is_charging);
}

#[tokio::test]
async fn confirmed_stop_clears_state_and_emits_one_stopped_event() {
    let rig = rig();
    rig.client.push_start(Ok(accepted_start("abc123")));
    rig.client.push_stop(Ok(accepted_stop()));

    rig.controller.start(63205, 1).await.unwrap();
    let outcome = rig.controller.stop(63205).await.unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.message, "Charging has stopped");
    assert!(!rig.controller.state_snapshot().unwrap().is_charging);
    assert_eq!(rig.stopped.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_stop_preserves_state_so_a_retry_is_meaningful() {
    let rig = rig();
    rig.client.push_start(Ok(accepted_start("abc123")));
    rig.client
        .push_stop(Err(AurigaError::transport("connection reset")));
    rig.client.push_stop(Ok(accepted_stop()));

    rig.controller.start(63205, 1).await.unwrap();

    let err = rig.controller.stop(63205).await.unwrap_err();
    assert!(matches!(err, AurigaError::Transport { .. }));

    // State survives the failed attempt; no Stopped was emitted
    let snapshot = rig.controller.state_snapshot().unwrap();
    assert!(snapshot.is_charging);
    assert_eq!(snapshot.active_session_id.as_deref(), Some("abc123"));
    assert_eq!(rig.stopped.load(Ordering::SeqCst), 0);

    // The retried stop targets the same session and succeeds
    let outcome = rig.controller.stop(63205).await.unwrap();
    assert!(outcome.success);
    assert!(!rig.controller.state_snapshot().unwrap().is_charging);
    assert_eq!(rig.stopped.load(Ordering::SeqCst), 1);
    assert_eq!(rig.client.stop_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn stop_during_retrying_yields_exactly_one_stopped_event() {
    let rig = rig();
    rig.client.push_start(Ok(accepted_start("abc123")));
    rig.client.push_stop(Ok(accepted_stop()));
    // No status responses scripted: polling reports not-found

    rig.controller.start(63205, 1).await.unwrap();

    // Let the first poll push the scheduler into its backoff wait
    advance(Duration::from_secs(10)).await;
    assert_eq!(rig.client.status_calls(), 1);

    let outcome = rig.controller.stop(63205).await.unwrap();
    assert!(outcome.success);
    assert_eq!(rig.stopped.load(Ordering::SeqCst), 1);

    // The exhaustion path must not race a second Stopped in afterwards,
    // and the cancelled timer must not poll again
    advance(Duration::from_secs(300)).await;
    assert_eq!(rig.stopped.load(Ordering::SeqCst), 1);
    assert_eq!(rig.client.status_calls(), 1);
}

#[tokio::test]
async fn status_reads_validate_identifiers() {
    let rig = rig();

    assert!(matches!(
        rig.controller.charge_point_status(0).await.unwrap_err(),
        AurigaError::Validation { .. }
    ));
    assert!(matches!(
        rig.controller.charge_point(-5).await.unwrap_err(),
        AurigaError::Validation { .. }
    ));

    let status = rig.controller.charge_point_status(63205).await.unwrap();
    assert_eq!(status.network_status, "online");

    let details = rig.controller.charge_point(63205).await.unwrap();
    assert_eq!(details["id"], 63205);
}
