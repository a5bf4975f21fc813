mod common;

use std::sync::Mutex;

use common::{FakeMusicService, client, tracks};
use spotdash::{
    Error, Result,
    engine::{BatchFetcher, fetch_chunked},
    types::ids_of,
};

fn ids(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("id{i}")).collect()
}

/// Echo lookup that records the size of every chunk it sees.
async fn run_echo(input: &[String], chunk_size: usize) -> (Result<Vec<String>>, Vec<usize>) {
    let sizes = Mutex::new(Vec::new());
    let result = fetch_chunked(input, chunk_size, |chunk| {
        sizes.lock().unwrap().push(chunk.len());
        async move { Ok(chunk) }
    })
    .await;
    (result, sizes.into_inner().unwrap())
}

#[tokio::test]
async fn test_results_keep_input_order() {
    let input = ids(120);
    let (result, sizes) = run_echo(&input, 50).await;

    assert_eq!(result.unwrap(), input);
    assert_eq!(sizes, vec![50, 50, 20]);
}

#[tokio::test]
async fn test_chunk_boundaries() {
    let (_, sizes) = run_echo(&ids(50), 50).await;
    assert_eq!(sizes, vec![50]);

    let (_, sizes) = run_echo(&ids(51), 50).await;
    assert_eq!(sizes, vec![50, 1]);
}

#[tokio::test]
async fn test_empty_input_makes_no_calls() {
    let (result, sizes) = run_echo(&[], 50).await;
    assert!(result.unwrap().is_empty());
    assert!(sizes.is_empty());
}

#[tokio::test]
async fn test_first_failure_aborts_the_fetch() {
    let calls = Mutex::new(0);
    let result: Result<Vec<String>> = fetch_chunked(&ids(150), 50, |chunk| {
        let call = {
            let mut calls = calls.lock().unwrap();
            *calls += 1;
            *calls
        };
        async move {
            if call == 2 {
                Err(Error::Service {
                    status: 500,
                    message: "boom".into(),
                })
            } else {
                Ok(chunk)
            }
        }
    })
    .await;

    assert!(matches!(result, Err(Error::Service { status: 500, .. })));
    assert_eq!(*calls.lock().unwrap(), 2);
}

#[tokio::test]
async fn test_short_chunk_is_an_error() {
    let result = fetch_chunked(&ids(60), 50, |mut chunk| async move {
        chunk.pop();
        Ok(chunk)
    })
    .await;

    assert!(matches!(
        result,
        Err(Error::IncompleteBatch {
            requested: 50,
            received: 49
        })
    ));
}

#[tokio::test]
async fn test_fetch_many_uses_track_batches() {
    let catalog = tracks(75);
    let service = FakeMusicService::with_catalog(&catalog);
    let handle = client("a");

    let fetched = BatchFetcher::new(service.as_ref(), &handle)
        .fetch_many(&ids_of(&catalog))
        .await
        .unwrap();

    assert_eq!(ids_of(&fetched), ids_of(&catalog));
    assert_eq!(FakeMusicService::count(&service.calls.lookup_tracks), 2);
}

#[tokio::test]
async fn test_fetch_many_reports_unknown_tracks() {
    let service = FakeMusicService::with_catalog(&tracks(3));
    let handle = client("a");
    let wanted = vec!["t0".to_string(), "missing".to_string(), "t2".to_string()];

    let result = BatchFetcher::new(service.as_ref(), &handle)
        .fetch_many(&wanted)
        .await;

    assert!(matches!(
        result,
        Err(Error::IncompleteBatch {
            requested: 3,
            received: 2
        })
    ));
}

#[tokio::test]
async fn test_fetch_many_stops_on_failed_chunk() {
    let catalog = tracks(160);
    let service = FakeMusicService::with_catalog(&catalog);
    *service.fail_tracks_call.lock().unwrap() = Some(2);
    let handle = client("a");

    let result = BatchFetcher::new(service.as_ref(), &handle)
        .fetch_many(&ids_of(&catalog))
        .await;

    assert!(result.is_err());
    assert_eq!(FakeMusicService::count(&service.calls.lookup_tracks), 2);
}

#[tokio::test]
async fn test_fetch_audio_features_uses_feature_batches() {
    let service = FakeMusicService::new();
    let handle = client("a");
    let wanted = ids(250);

    let features = BatchFetcher::new(service.as_ref(), &handle)
        .fetch_audio_features(&wanted)
        .await
        .unwrap();

    assert_eq!(ids_of(&features), wanted);
    assert_eq!(
        FakeMusicService::count(&service.calls.lookup_audio_features),
        3
    );
}
