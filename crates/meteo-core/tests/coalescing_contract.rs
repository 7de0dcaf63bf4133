//! Contract Test: Request Coalescing
//!
//! Constraints verified:
//! - Concurrent reads of the same cold or stale city make one remote call
//! - Every joined caller receives the same result
//! - Different cities are never coalesced together
//! - A caller that goes away does not cancel the shared refresh
//! - A failed refresh is not reused by later callers
//! - Finished refreshes leave the in-flight table; evicted ones are not stored
//!
//! If this test fails, someone has removed the per-city in-flight table or
//! tied the refresh to the lifetime of the first caller.

mod common;

use common::*;
use meteo_core::traits::LocalStore;
use std::time::Duration;

#[tokio::test]
async fn two_concurrent_cold_reads_make_one_remote_call() {
    let h = Harness::new(true);
    h.forecast.set_delay(Duration::from_millis(100));
    let city = paris();

    let (a, b) = tokio::join!(
        h.engine.get_snapshot(&city, 600),
        h.engine.get_snapshot(&city, 600)
    );

    assert_eq!(h.forecast.calls(), 1, "concurrent reads must share one fetch");
    assert_eq!(a.unwrap(), b.unwrap());
}

#[tokio::test]
async fn many_concurrent_readers_share_one_fetch() {
    let h = Harness::new(true);
    h.forecast.set_delay(Duration::from_millis(50));
    let city = paris();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let engine = h.engine.clone();
        let city = city.clone();
        handles.push(tokio::spawn(async move {
            engine.get_snapshot(&city, 600).await
        }));
    }

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(h.forecast.calls(), 1);
    assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(h.engine.in_flight().await, 0);
}

#[tokio::test]
async fn stale_readers_share_one_refresh() {
    let h = Harness::new(true);
    h.forecast.set_delay(Duration::from_millis(50));
    let city = paris();
    seed_snapshot(h.store.as_ref(), &city, 3.0, chrono::Duration::hours(1)).await;

    let (a, b, c) = tokio::join!(
        h.engine.get_snapshot(&city, 60),
        h.engine.get_snapshot(&city, 60),
        h.engine.get_snapshot(&city, 60)
    );

    assert_eq!(h.forecast.calls(), 1);
    let a = a.unwrap();
    assert_eq!(a.temperature, 1.0);
    assert_eq!(a, b.unwrap());
    assert_eq!(a, c.unwrap());
}

#[tokio::test]
async fn joined_callers_share_the_failure() {
    let h = Harness::new(true);
    h.forecast.set_delay(Duration::from_millis(50));
    h.forecast.set_failing(true);
    let city = paris();

    let (a, b) = tokio::join!(
        h.engine.get_snapshot(&city, 600),
        h.engine.get_snapshot(&city, 600)
    );

    assert_eq!(h.forecast.calls(), 1);
    assert_eq!(a.unwrap_err(), b.unwrap_err());
}

#[tokio::test]
async fn different_cities_are_fetched_independently() {
    let h = Harness::new(true);
    h.forecast.set_delay(Duration::from_millis(50));

    let (p, l) = (paris(), london());
    let (a, b) = tokio::join!(
        h.engine.get_snapshot(&p, 600),
        h.engine.get_snapshot(&l, 600)
    );

    assert_eq!(h.forecast.calls(), 2);
    assert_ne!(a.unwrap().city_id, b.unwrap().city_id);
}

#[tokio::test]
async fn abandoned_caller_does_not_cancel_refresh() {
    let h = Harness::new(true);
    h.forecast.set_delay(Duration::from_millis(100));
    let city = paris();

    let first = {
        let engine = h.engine.clone();
        let city = city.clone();
        tokio::spawn(async move { engine.get_snapshot(&city, 600).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    first.abort();

    let snapshot = h.engine.get_snapshot(&city, 600).await.unwrap();

    assert_eq!(h.forecast.calls(), 1, "second caller joins the surviving refresh");
    assert_eq!(
        h.store.get_snapshot(city.id()).await.unwrap(),
        Some(snapshot)
    );
}

#[tokio::test]
async fn failed_refresh_is_retried_by_next_caller() {
    let h = Harness::new(true);
    let city = paris();
    h.forecast.set_failing(true);

    assert!(h.engine.get_snapshot(&city, 600).await.is_err());

    h.forecast.set_failing(false);
    let snapshot = h.engine.get_snapshot(&city, 600).await.unwrap();

    assert_eq!(h.forecast.calls(), 2);
    assert_eq!(snapshot.temperature, 2.0);
}

#[tokio::test]
async fn offline_flight_does_not_block_later_online_refresh() {
    let h = Harness::new(false);
    let city = paris();

    assert!(h.engine.get_snapshot(&city, 600).await.is_err());

    h.probe.set_online(true);
    h.engine.get_snapshot(&city, 600).await.unwrap();
    assert_eq!(h.forecast.calls(), 1);
}

#[tokio::test]
async fn evict_during_refresh_discards_its_write() {
    let h = Harness::new(true);
    h.forecast.set_delay(Duration::from_millis(100));
    let city = paris();

    let reader = {
        let engine = h.engine.clone();
        let city = city.clone();
        tokio::spawn(async move { engine.get_snapshot(&city, 600).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    h.engine.evict(city.id()).await.unwrap();

    // The joined caller still gets the result
    let snapshot = reader.await.unwrap().unwrap();
    assert_eq!(snapshot.city_id, city.id());

    assert!(h.store.get_snapshot(city.id()).await.unwrap().is_none());
    assert_eq!(h.engine.in_flight().await, 0);
}

#[tokio::test]
async fn completed_refreshes_leave_no_flight_entries() {
    let h = Harness::new(true);

    for city in [paris(), london(), tokyo()] {
        h.engine.get_snapshot(&city, 600).await.unwrap();
    }
    let located = meteo_core::CityIdentity::current_location(10.5, 20.25).unwrap();
    h.engine.get_snapshot(&located, 600).await.unwrap();

    h.forecast.set_failing(true);
    let unreachable = meteo_core::CityIdentity::current_location(-10.5, -20.25).unwrap();
    assert!(h.engine.get_snapshot(&unreachable, 600).await.is_err());

    assert_eq!(h.forecast.calls(), 5);
    assert_eq!(h.engine.in_flight().await, 0);
}
