//! Integration tests for live channel rebinding.
//!
//! A rebind must never let the previous subject's positions reach the new
//! subscription or the `latest` slot, even when the old transport keeps
//! delivering after teardown.

use futures_util::StreamExt;
use ride_client::{LivePositionChannel, StubFeed};
use ride_domain::{PositionEvent, Subject};
use std::sync::Arc;

fn subject(id: &str) -> Subject {
    Subject::new(id).unwrap()
}

fn event(id: &str, lat: f64) -> PositionEvent {
    PositionEvent {
        subject: id.to_string(),
        latitude: lat,
        longitude: 106.66,
    }
}

async fn let_pumps_run() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_rebind_isolates_previous_subject() {
    let feed = Arc::new(StubFeed::new());
    let channel = LivePositionChannel::new(feed.clone());

    let mut first = channel.subscribe(subject("driver-1")).await.unwrap();
    feed.push(0, event("driver-1", 10.0)).await;
    assert_eq!(first.recv().await.unwrap().latitude(), 10.0);

    let mut second = channel.subscribe(subject("driver-2")).await.unwrap();
    assert!(feed.is_closed(0));
    assert!(!first.is_live());

    // Late delivery on the old connection and a stray event on the new one.
    feed.push(0, event("driver-1", 11.0)).await;
    feed.push(1, event("driver-1", 12.0)).await;
    feed.push(1, event("driver-2", 20.0)).await;

    let position = second.recv().await.unwrap();
    assert_eq!(position.subject.as_str(), "driver-2");
    assert_eq!(position.latitude(), 20.0);
    assert!(first.next().await.is_none());

    let latest = channel.latest().unwrap();
    assert_eq!(latest.subject.as_str(), "driver-2");
    assert_eq!(channel.bound_subject().await, Some(subject("driver-2")));
    assert_eq!(feed.opened(), vec![subject("driver-1"), subject("driver-2")]);
}

#[tokio::test]
async fn test_buffered_positions_are_dropped_on_rebind() {
    let feed = Arc::new(StubFeed::new());
    let channel = LivePositionChannel::new(feed.clone());

    let mut first = channel.subscribe(subject("driver-1")).await.unwrap();
    feed.push(0, event("driver-1", 1.0)).await;
    feed.push(0, event("driver-1", 2.0)).await;
    let_pumps_run().await;

    let _second = channel.subscribe(subject("driver-2")).await.unwrap();

    assert!(first.recv().await.is_none());
    assert!(channel.latest().is_none());
}

#[tokio::test]
async fn test_rapid_rebinds_leave_only_last_live() {
    let feed = Arc::new(StubFeed::new());
    let channel = LivePositionChannel::new(feed.clone());

    let a = channel.subscribe(subject("a")).await.unwrap();
    let b = channel.subscribe(subject("b")).await.unwrap();
    let mut c = channel.subscribe(subject("c")).await.unwrap();

    assert!(!a.is_live());
    assert!(!b.is_live());
    assert!(c.is_live());
    assert!(feed.is_closed(0));
    assert!(feed.is_closed(1));
    assert!(!feed.is_closed(2));

    feed.push(0, event("a", 1.0)).await;
    feed.push(1, event("b", 2.0)).await;
    feed.push(2, event("c", 3.0)).await;

    assert_eq!(c.recv().await.unwrap().subject.as_str(), "c");
    assert_eq!(channel.latest().unwrap().latitude(), 3.0);
}
