use std::collections::HashMap;

use tokio_util::sync::CancellationToken;

use super::source::{KvSource, MockKvSource};
use super::{Error, WatchOptions};

/// The facade must stay object-safe: consumers hold `Box<dyn KvSource>` and
/// never name a concrete adapter.
#[tokio::test]
async fn test_trait_object_read() {
    let mut mock = MockKvSource::new();
    mock.expect_get_values().times(2).returning(|_| {
        Ok(HashMap::from([(
            "/database/host".to_string(),
            "db1".to_string(),
        )]))
    });

    let source: Box<dyn KvSource> = Box::new(mock);
    let first = source
        .get_values(&["/database".to_string()])
        .await
        .expect("should read");
    let second = source
        .get_values(&["/database".to_string()])
        .await
        .expect("should read");
    // idempotent with no intervening writes
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_sentinel_classification() {
    let mut mock = MockKvSource::new();
    mock.expect_watch_prefix()
        .returning(|_, _, _| Err(Error::WatchNotSupported));

    let source: Box<dyn KvSource> = Box::new(mock);
    let err = source
        .watch_prefix(CancellationToken::new(), "/", WatchOptions::default())
        .await
        .unwrap_err();
    assert!(err.is_watch_unsupported());
    assert!(!err.is_canceled());
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let mut mock = MockKvSource::new();
    mock.expect_close().times(2).returning(|| ());

    let source: Box<dyn KvSource> = Box::new(mock);
    source.close().await;
    source.close().await;
}
