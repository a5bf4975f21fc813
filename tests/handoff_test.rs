mod common;

use std::{sync::Arc, time::Duration};

use common::{FakeMusicService, client};
use spotdash::{
    Error,
    management::{AuthHandoff, Delivery, HandoffOutcome, HandoffState},
    types::SessionKey,
};

const PENDING_TTL: Duration = Duration::from_secs(600);
const WAIT: Duration = Duration::from_secs(60);

#[tokio::test]
async fn test_begin_records_pending_authorization() {
    let service = FakeMusicService::new();
    let handoff = AuthHandoff::new(PENDING_TTL);

    let login = handoff.begin(service.as_ref(), "/mood").await;

    assert!(
        login
            .authorize_url
            .contains(&format!("state={}", login.session_key))
    );
    assert!(login.authorize_url.contains("code_challenge="));
    assert_eq!(handoff.pending_count().await, 1);
    assert_eq!(
        handoff.state(&login.session_key).await,
        Some(HandoffState::AwaitingCallback)
    );
}

#[tokio::test]
async fn test_claim_is_granted_once() {
    let service = FakeMusicService::new();
    let handoff = AuthHandoff::new(PENDING_TTL);
    let login = handoff.begin(service.as_ref(), "/history").await;

    let claim = handoff.claim(&login.session_key).await.unwrap().unwrap();
    assert_eq!(claim.code_verifier.len(), 128);
    assert_eq!(claim.return_to, "/history");
    assert_eq!(
        handoff.state(&login.session_key).await,
        Some(HandoffState::Exchanging)
    );

    assert!(handoff.claim(&login.session_key).await.unwrap().is_none());
}

#[tokio::test]
async fn test_claim_unknown_session() {
    let handoff = AuthHandoff::new(PENDING_TTL);
    let result = handoff.claim(&SessionKey::new()).await;
    assert!(matches!(result, Err(Error::UnknownSession)));
}

#[tokio::test]
async fn test_second_delivery_is_ignored() {
    let service = FakeMusicService::new();
    let handoff = Arc::new(AuthHandoff::new(PENDING_TTL));
    let key = handoff.begin(service.as_ref(), "/").await.session_key;

    let waiter = {
        let handoff = Arc::clone(&handoff);
        tokio::spawn(async move { handoff.wait(&key, WAIT).await })
    };
    tokio::task::yield_now().await;

    let first = client("first");
    assert!(handoff.deliver(&key, Delivery::Client(first.clone())).await);
    assert!(!handoff.deliver(&key, Delivery::Client(client("second"))).await);
    assert!(
        !handoff
            .deliver(&key, Delivery::Failed("late".into()))
            .await
    );

    match waiter.await.unwrap() {
        HandoffOutcome::Delivered(got) => assert!(got.ptr_eq(&first)),
        other => panic!("unexpected outcome: {other:?}"),
    }
    // consumed
    assert_eq!(handoff.state(&key).await, None);
}

#[tokio::test]
async fn test_delivery_without_waiter_releases_slot() {
    let service = FakeMusicService::new();
    let handoff = AuthHandoff::new(PENDING_TTL);
    let key = handoff.begin(service.as_ref(), "/").await.session_key;
    handoff.claim(&key).await.unwrap().unwrap();

    assert!(handoff.deliver(&key, Delivery::Client(client("a"))).await);

    assert!(!handoff.is_pending(&key).await);
    assert_eq!(handoff.pending_count().await, 0);
    assert!(!handoff.deliver(&key, Delivery::Client(client("b"))).await);
    assert!(matches!(
        handoff.wait(&key, WAIT).await,
        HandoffOutcome::NotPending
    ));
}

#[tokio::test]
async fn test_delivered_slot_is_not_pending() {
    let service = FakeMusicService::new();
    let handoff = Arc::new(AuthHandoff::new(PENDING_TTL));
    let key = handoff.begin(service.as_ref(), "/").await.session_key;
    assert!(handoff.is_pending(&key).await);

    // the subscribed waiter keeps the delivered slot alive until it runs
    let waiter = {
        let handoff = Arc::clone(&handoff);
        tokio::spawn(async move { handoff.wait(&key, WAIT).await })
    };
    tokio::task::yield_now().await;

    handoff.deliver(&key, Delivery::Client(client("a"))).await;
    assert_eq!(handoff.state(&key).await, Some(HandoffState::Delivered));
    assert!(!handoff.is_pending(&key).await);

    assert!(handoff.forget(&key).await);
    assert_eq!(handoff.state(&key).await, None);
    // the value was published before the slot went away
    assert!(matches!(
        waiter.await.unwrap(),
        HandoffOutcome::Delivered(_)
    ));
}

#[tokio::test]
async fn test_waiter_is_woken_by_delivery() {
    let service = FakeMusicService::new();
    let handoff = Arc::new(AuthHandoff::new(PENDING_TTL));
    let key = handoff.begin(service.as_ref(), "/").await.session_key;

    let waiter = {
        let handoff = Arc::clone(&handoff);
        tokio::spawn(async move { handoff.wait(&key, WAIT).await })
    };
    tokio::task::yield_now().await;

    let handle = client("a");
    assert!(handoff.deliver(&key, Delivery::Client(handle.clone())).await);

    match waiter.await.unwrap() {
        HandoffOutcome::Delivered(got) => assert!(got.ptr_eq(&handle)),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn test_failure_is_delivered_as_value() {
    let service = FakeMusicService::new();
    let handoff = Arc::new(AuthHandoff::new(PENDING_TTL));
    let key = handoff.begin(service.as_ref(), "/").await.session_key;

    let waiter = {
        let handoff = Arc::clone(&handoff);
        tokio::spawn(async move { handoff.wait(&key, WAIT).await })
    };
    tokio::task::yield_now().await;

    handoff
        .deliver(&key, Delivery::Failed("invalid_grant".into()))
        .await;

    match waiter.await.unwrap() {
        HandoffOutcome::Failed(reason) => assert_eq!(reason, "invalid_grant"),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_wait_times_out() {
    let service = FakeMusicService::new();
    let handoff = AuthHandoff::new(PENDING_TTL);
    let key = handoff.begin(service.as_ref(), "/").await.session_key;

    let outcome = handoff.wait(&key, WAIT).await;

    assert!(matches!(outcome, HandoffOutcome::TimedOut));
    assert!(!handoff.is_pending(&key).await);
    // a callback arriving afterwards finds nothing to complete
    assert!(matches!(
        handoff.claim(&key).await,
        Err(Error::UnknownSession)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_dropped_waiter_leaves_slot_intact() {
    let service = FakeMusicService::new();
    let handoff = Arc::new(AuthHandoff::new(PENDING_TTL));
    let key = handoff.begin(service.as_ref(), "/").await.session_key;

    let abandoned = tokio::time::timeout(Duration::from_secs(1), handoff.wait(&key, WAIT)).await;
    assert!(abandoned.is_err());

    assert!(handoff.is_pending(&key).await);

    let waiter = {
        let handoff = Arc::clone(&handoff);
        tokio::spawn(async move { handoff.wait(&key, WAIT).await })
    };
    tokio::task::yield_now().await;

    assert!(handoff.deliver(&key, Delivery::Client(client("a"))).await);
    assert!(matches!(
        waiter.await.unwrap(),
        HandoffOutcome::Delivered(_)
    ));
}

#[tokio::test]
async fn test_wait_without_pending_authorization() {
    let handoff = AuthHandoff::new(PENDING_TTL);
    assert!(matches!(
        handoff.wait(&SessionKey::new(), WAIT).await,
        HandoffOutcome::NotPending
    ));
}

#[tokio::test(start_paused = true)]
async fn test_purge_expired_collects_unclaimed_slots() {
    let service = FakeMusicService::new();
    let handoff = AuthHandoff::new(PENDING_TTL);
    handoff.begin(service.as_ref(), "/").await;
    handoff.begin(service.as_ref(), "/").await;

    tokio::time::advance(Duration::from_secs(300)).await;
    let fresh = handoff.begin(service.as_ref(), "/").await.session_key;
    assert_eq!(handoff.purge_expired().await, 0);

    tokio::time::advance(Duration::from_secs(301)).await;
    assert_eq!(handoff.purge_expired().await, 2);
    assert_eq!(handoff.pending_count().await, 1);
    assert!(handoff.is_pending(&fresh).await);
}
