//! Session adapter tests against a scripted thermostat portal

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use nexus_gateway::providers::ThermostatPortal;
use nexus_gateway::session::adapter::{AdapterPolicy, AggregateResult, Freshness, ScrapedSessionAdapter};

use crate::fakes::{portal, portal_credentials, thermostats, FakePortal};

fn adapter(fake: &Arc<FakePortal>, window: Duration) -> Arc<ScrapedSessionAdapter<ThermostatPortal>> {
    Arc::new(ScrapedSessionAdapter::new(
        portal(),
        fake.clone(),
        AdapterPolicy::new(window, Duration::from_secs(2)),
    ))
}

fn ready<R: Clone>(result: AggregateResult<R>) -> (Vec<R>, Freshness) {
    match result {
        AggregateResult::Ready {
            items, freshness, ..
        } => (items, freshness),
        AggregateResult::NotConfigured => panic!("expected readings, got NotConfigured"),
        AggregateResult::Failed(e) => panic!("expected readings, got Failed({e})"),
    }
}

#[tokio::test]
async fn test_one_login_within_freshness_window() {
    let fake = FakePortal::new();
    let adapter = adapter(&fake, Duration::from_secs(60));
    let devices = thermostats(&[101, 102]);
    let creds = portal_credentials("me@example.com");

    let (items, freshness) = ready(adapter.fetch_all(&devices, Some(&creds)).await);
    assert_eq!(freshness, Freshness::Live);
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].current_temp, Some(70.0));
    assert_eq!(items[0].mode, "Heat");
    assert_eq!(items[0].status, "Heating");

    let (cached, freshness) = ready(adapter.fetch_all(&devices, Some(&creds)).await);
    assert_eq!(freshness, Freshness::Cached);
    assert_eq!(cached, items);
    assert_eq!(fake.logins(), 1);
}

#[tokio::test]
async fn test_concurrent_callers_share_one_cycle() {
    let fake = FakePortal::new();
    let adapter = adapter(&fake, Duration::from_secs(60));
    let devices = thermostats(&[101]);
    let creds = portal_credentials("me@example.com");

    let (a, b, c) = tokio::join!(
        adapter.fetch_all(&devices, Some(&creds)),
        adapter.fetch_all(&devices, Some(&creds)),
        adapter.fetch_all(&devices, Some(&creds)),
    );
    let freshness: Vec<Freshness> = [a, b, c].into_iter().map(|r| ready(r).1).collect();

    assert_eq!(fake.logins(), 1);
    assert_eq!(freshness.iter().filter(|f| **f == Freshness::Live).count(), 1);
    assert_eq!(freshness.iter().filter(|f| **f == Freshness::Cached).count(), 2);
}

#[tokio::test]
async fn test_failing_device_does_not_affect_others() {
    let fake = FakePortal::new();
    fake.fail_device("102");
    let adapter = adapter(&fake, Duration::from_secs(60));
    let devices = thermostats(&[101, 102, 103]);

    let (items, freshness) = ready(
        adapter
            .fetch_all(&devices, Some(&portal_credentials("me@example.com")))
            .await,
    );

    assert_eq!(freshness, Freshness::Live);
    assert_eq!(items.len(), 3);
    assert_eq!(items[0].current_temp, Some(70.0));
    assert_eq!(items[1].status, "Error");
    assert_eq!(items[1].mode, "Unknown");
    assert_eq!(items[1].current_temp, None);
    assert_eq!(items[1].id, serde_json::json!(102));
    assert_eq!(items[2].current_temp, Some(70.0));
}

#[tokio::test]
async fn test_slow_device_times_out_alone() {
    let fake = FakePortal::new();
    fake.slow_device("102", Duration::from_millis(500));
    let adapter = Arc::new(ScrapedSessionAdapter::new(
        portal(),
        fake.clone(),
        AdapterPolicy::new(Duration::from_secs(60), Duration::from_millis(50)),
    ));

    let (items, _) = ready(
        adapter
            .fetch_all(&thermostats(&[101, 102]), Some(&portal_credentials("me@example.com")))
            .await,
    );
    assert_eq!(items[0].status, "Heating");
    assert_eq!(items[1].status, "Error");
}

#[tokio::test]
async fn test_all_failed_cycle_is_not_cached() {
    let fake = FakePortal::new();
    fake.pages_down.store(true, Ordering::SeqCst);
    let adapter = adapter(&fake, Duration::from_secs(60));
    let devices = thermostats(&[101]);
    let creds = portal_credentials("me@example.com");

    let (items, freshness) = ready(adapter.fetch_all(&devices, Some(&creds)).await);
    assert_eq!(freshness, Freshness::Live);
    assert_eq!(items[0].status, "Error");

    fake.pages_down.store(false, Ordering::SeqCst);
    let (items, freshness) = ready(adapter.fetch_all(&devices, Some(&creds)).await);
    assert_eq!(freshness, Freshness::Live);
    assert_eq!(items[0].current_temp, Some(70.0));
    assert_eq!(fake.logins(), 2);
}

#[tokio::test]
async fn test_failed_cycle_serves_stale() {
    let fake = FakePortal::new();
    // A zero window makes every call run a cycle
    let adapter = adapter(&fake, Duration::ZERO);
    let devices = thermostats(&[101]);
    let creds = portal_credentials("me@example.com");

    let (first, _) = ready(adapter.fetch_all(&devices, Some(&creds)).await);

    fake.temperature.store(55, Ordering::SeqCst);
    fake.pages_down.store(true, Ordering::SeqCst);
    let (items, freshness) = ready(adapter.fetch_all(&devices, Some(&creds)).await);
    assert_eq!(freshness, Freshness::Stale);
    assert_eq!(items, first);

    fake.pages_down.store(false, Ordering::SeqCst);
    fake.reject_login.store(true, Ordering::SeqCst);
    let (items, freshness) = ready(adapter.fetch_all(&devices, Some(&creds)).await);
    assert_eq!(freshness, Freshness::Stale);
    assert_eq!(items[0].current_temp, Some(70.0));
}

#[tokio::test]
async fn test_rejected_login_without_cache_fails() {
    let fake = FakePortal::new();
    fake.reject_login.store(true, Ordering::SeqCst);
    let adapter = adapter(&fake, Duration::from_secs(60));

    let result = adapter
        .fetch_all(&thermostats(&[101]), Some(&portal_credentials("me@example.com")))
        .await;
    assert!(matches!(result, AggregateResult::Failed(_)));
}

#[tokio::test]
async fn test_missing_credentials_or_devices() {
    let fake = FakePortal::new();
    let adapter = adapter(&fake, Duration::from_secs(60));

    let result = adapter.fetch_all(&thermostats(&[101]), None).await;
    assert!(matches!(result, AggregateResult::NotConfigured));

    let result = adapter
        .fetch_all(&[], Some(&portal_credentials("me@example.com")))
        .await;
    assert!(matches!(result, AggregateResult::NotConfigured));
    assert_eq!(fake.logins(), 0);
}

#[tokio::test]
async fn test_invalidate_forces_fresh_login() {
    let fake = FakePortal::new();
    let adapter = adapter(&fake, Duration::from_secs(60));
    let devices = thermostats(&[101]);

    ready(
        adapter
            .fetch_all(&devices, Some(&portal_credentials("old@example.com")))
            .await,
    );
    let before = adapter.generation_id();
    adapter.invalidate();
    assert_ne!(adapter.generation_id(), before);

    let (_, freshness) = ready(
        adapter
            .fetch_all(&devices, Some(&portal_credentials("new@example.com")))
            .await,
    );
    assert_eq!(freshness, Freshness::Live);
    assert_eq!(fake.logins(), 2);
    assert_eq!(
        *fake.usernames.lock().unwrap(),
        vec!["old@example.com".to_string(), "new@example.com".to_string()]
    );
}

#[tokio::test]
async fn test_in_flight_cycle_cannot_fill_new_generation() {
    let fake = FakePortal::new();
    fake.slow_device("101", Duration::from_millis(200));
    let adapter = adapter(&fake, Duration::from_secs(60));
    let devices = thermostats(&[101]);

    let in_flight = {
        let adapter = Arc::clone(&adapter);
        let devices = devices.clone();
        tokio::spawn(async move {
            adapter
                .fetch_all(&devices, Some(&portal_credentials("old@example.com")))
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    adapter.invalidate();
    let (_, freshness) = ready(in_flight.await.unwrap());
    assert_eq!(freshness, Freshness::Live);

    // The old cycle's result belongs to the dropped generation
    let (_, freshness) = ready(
        adapter
            .fetch_all(&devices, Some(&portal_credentials("new@example.com")))
            .await,
    );
    assert_eq!(freshness, Freshness::Live);
    assert_eq!(fake.logins(), 2);
}

#[tokio::test]
async fn test_credentials_read_before_invalidation_stay_in_old_generation() {
    let fake = FakePortal::new();
    let adapter = adapter(&fake, Duration::from_secs(60));
    let devices = thermostats(&[101]);

    // Request pins its generation, then reads the old credentials
    let ticket = adapter.begin();
    let old = portal_credentials("old@example.com");

    // A credential write lands before the request reaches the portal
    adapter.invalidate();
    assert_ne!(ticket.generation_id(), adapter.generation_id());

    let (_, freshness) = ready(adapter.fetch_all_in(ticket, &devices, Some(&old)).await);
    assert_eq!(freshness, Freshness::Live);

    let (_, freshness) = ready(
        adapter
            .fetch_all(&devices, Some(&portal_credentials("new@example.com")))
            .await,
    );
    assert_eq!(freshness, Freshness::Live);
    assert_eq!(fake.logins(), 2);
    assert_eq!(
        *fake.usernames.lock().unwrap(),
        vec!["old@example.com".to_string(), "new@example.com".to_string()]
    );
}

#[tokio::test]
async fn test_discovery_session_lists_thermostats() {
    let fake = FakePortal::new();
    let adapter = adapter(&fake, Duration::from_secs(60));

    let session = adapter
        .login_session(&portal_credentials("me@example.com"))
        .await
        .unwrap();
    let devices = adapter.provider().list_devices(&session).await.unwrap();

    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].name.as_deref(), Some("Upstairs"));
    assert_eq!(devices[0].extra["locationName"], "Home");
}
