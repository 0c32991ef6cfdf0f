//! Integration tests: simulator writes flowing through the session gateway.

use chrono::Utc;
use ride_client::{unsigned_token, Session, SessionConfig, StubHttp, StubRenewal, POSITION_WRITE_PATH};
use ride_domain::{Coordinate, CredentialPair, Route, Subject};
use ride_sim::PositionSimulator;
use ride_store::MemoryCredentialStore;
use std::sync::Arc;
use std::time::Duration;

const INTERVAL: Duration = Duration::from_millis(500);

fn route() -> Route {
    Route::new(vec![
        Coordinate::new(10.0, 106.0).unwrap(),
        Coordinate::new(10.1, 106.1).unwrap(),
    ])
    .unwrap()
}

async fn let_tasks_run() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_writes_carry_bearer_and_body() {
    let access = unsigned_token(Utc::now() + chrono::Duration::hours(1));
    let http = Arc::new(StubHttp::new());
    let session = Session::new(
        Arc::new(MemoryCredentialStore::with_pair(CredentialPair::new(access.clone(), "r1"))),
        Arc::new(StubRenewal::rejecting(401)),
        http.clone(),
        SessionConfig::default(),
    );
    let simulator = PositionSimulator::new(Subject::new("driver-9").unwrap(), route(), session.gateway())
        .with_interval(INTERVAL);

    simulator.start();
    let_tasks_run().await;
    tokio::time::advance(INTERVAL).await;
    let_tasks_run().await;
    simulator.stop().await;

    let writes = http.requests_to(POSITION_WRITE_PATH);
    assert_eq!(writes.len(), 2);
    assert!(writes.iter().all(|w| w.bearer.as_deref() == Some(access.as_str())));
    let body = writes[1].body.clone().unwrap();
    assert_eq!(body["subject"], "driver-9");
    assert_eq!(body["latitude"], 10.1);
    assert_eq!(body["longitude"], 106.1);
}

#[tokio::test]
async fn test_expiring_session_renews_once_for_write() {
    let fresh = unsigned_token(Utc::now() + chrono::Duration::hours(1));
    let renewal = Arc::new(StubRenewal::issuing(CredentialPair::new(fresh.clone(), "r2")));
    let http = Arc::new(StubHttp::new());
    let session = Session::new(
        Arc::new(MemoryCredentialStore::with_pair(CredentialPair::new(
            unsigned_token(Utc::now() + chrono::Duration::seconds(90)),
            "r1",
        ))),
        renewal.clone(),
        http.clone(),
        SessionConfig::default(),
    );
    let simulator = PositionSimulator::new(Subject::new("driver-9").unwrap(), route(), session.gateway());

    simulator.run_once().await.unwrap();
    simulator.run_once().await.unwrap();

    assert_eq!(renewal.calls(), 1);
    let writes = http.requests_to(POSITION_WRITE_PATH);
    assert_eq!(writes.len(), 2);
    assert!(writes.iter().all(|w| w.bearer.as_deref() == Some(fresh.as_str())));
}
