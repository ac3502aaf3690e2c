use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use warp::Filter;

use crate::{FileSource, KvSource, WatchOptions};

const TESTFILE_YML: &str = r#"
remtest:
  database:
    hosts:
    - name: test1
      ip: 192.168.0.1
      size: 60
    - name: test2
      ip: 192.168.0.2
      size: 80

premtest:
  database: {url: www.google.de, user: Boris}
"#;

const TESTFILE_JSON: &str = r#"
{
    "remtest": {
        "database": {
            "hosts": [
                {"name": "test1", "ip": "192.168.0.1", "size": 60},
                {"name": "test2", "ip": "192.168.0.2", "size": 80}
            ]
        }
    },
    "premtest": {
        "database": {
            "url": "www.google.de",
            "user": "Boris"
        }
    }
}
"#;

const TESTFILE_JSON_MIXED: &str = r#"
{
    "remtest": [1, true, null],
    "premtest": {
        "database": {
            "url": 100,
            "user": false
        }
    }
}
"#;

fn expected_all() -> HashMap<String, String> {
    [
        ("/remtest/database/hosts/0/name", "test1"),
        ("/remtest/database/hosts/0/ip", "192.168.0.1"),
        ("/remtest/database/hosts/0/size", "60"),
        ("/remtest/database/hosts/1/name", "test2"),
        ("/remtest/database/hosts/1/ip", "192.168.0.2"),
        ("/remtest/database/hosts/1/size", "80"),
        ("/premtest/database/url", "www.google.de"),
        ("/premtest/database/user", "Boris"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn expected_premtest() -> HashMap<String, String> {
    [
        ("/premtest/database/url", "www.google.de"),
        ("/premtest/database/user", "Boris"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn write_document(
    dir: &tempfile::TempDir,
    content: &str,
) -> String {
    let path = dir.path().join("config.yml");
    std::fs::write(&path, content).expect("should write document");
    path.to_str().expect("utf-8 path").to_string()
}

#[tokio::test]
async fn test_get_values_yaml() {
    let dir = tempfile::tempdir().expect("should create tempdir");
    let path = write_document(&dir, TESTFILE_YML);
    let source = FileSource::builder(path).build().expect("should build");

    let union = source
        .get_values(&["/remtest".to_string(), "/premtest".to_string()])
        .await
        .expect("should read document");
    assert_eq!(union, expected_all());

    let subset = source
        .get_values(&["/premtest".to_string()])
        .await
        .expect("should read document");
    assert_eq!(subset, expected_premtest());

    // strict subset of a root read
    let everything = source
        .get_values(&["/".to_string()])
        .await
        .expect("should read document");
    assert!(subset.len() < everything.len());
    for (key, value) in &subset {
        assert_eq!(everything.get(key), Some(value));
    }
}

#[tokio::test]
async fn test_get_values_json() {
    let dir = tempfile::tempdir().expect("should create tempdir");
    let path = write_document(&dir, TESTFILE_JSON);
    let source = FileSource::builder(path).build().expect("should build");

    let values = source
        .get_values(&["/remtest".to_string(), "/premtest".to_string()])
        .await
        .expect("should read document");
    assert_eq!(values, expected_all());
}

#[tokio::test]
async fn test_get_values_json_mixed_types() {
    let dir = tempfile::tempdir().expect("should create tempdir");
    let path = write_document(&dir, TESTFILE_JSON_MIXED);
    let source = FileSource::builder(path).build().expect("should build");

    let values = source
        .get_values(&["/remtest".to_string(), "/premtest".to_string()])
        .await
        .expect("should read document");
    let expected: HashMap<String, String> = [
        ("/remtest/0", "1"),
        ("/remtest/1", "true"),
        ("/remtest/2", "<nil>"),
        ("/premtest/database/url", "100"),
        ("/premtest/database/user", "false"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    assert_eq!(values, expected);
}

#[tokio::test]
async fn test_get_values_is_idempotent() {
    let dir = tempfile::tempdir().expect("should create tempdir");
    let path = write_document(&dir, TESTFILE_YML);
    let source = FileSource::builder(path).build().expect("should build");

    let first = source
        .get_values(&["/".to_string()])
        .await
        .expect("should read document");
    let second = source
        .get_values(&["/".to_string()])
        .await
        .expect("should read document");
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_get_values_malformed_document() {
    let dir = tempfile::tempdir().expect("should create tempdir");
    let path = write_document(&dir, "{invalid: [unclosed");
    let source = FileSource::builder(path).build().expect("should build");

    let err = source.get_values(&["/".to_string()]).await.unwrap_err();
    assert!(matches!(err, crate::Error::Decode(_)));
}

#[tokio::test]
async fn test_watch_detects_change() {
    let dir = tempfile::tempdir().expect("should create tempdir");
    let path = write_document(&dir, TESTFILE_YML);
    let source = Arc::new(
        FileSource::builder(path.clone())
            .poll_interval(Duration::from_millis(25))
            .build()
            .expect("should build"),
    );

    let cancel = CancellationToken::new();
    let watcher = {
        let source = source.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            source
                .watch_prefix(cancel, "/", WatchOptions::default())
                .await
        })
    };

    // let the watcher take its baseline before changing the document
    tokio::time::sleep(Duration::from_millis(150)).await;
    std::fs::write(&path, TESTFILE_JSON_MIXED).expect("should rewrite document");

    let result = tokio::time::timeout(Duration::from_secs(2), watcher)
        .await
        .expect("watch should return after the change")
        .expect("watch task should not panic");
    assert_eq!(result.expect("should report the change"), 1);
}

#[tokio::test]
async fn test_watch_cancel_returns_quickly() {
    let dir = tempfile::tempdir().expect("should create tempdir");
    let path = write_document(&dir, TESTFILE_YML);
    let source = Arc::new(
        FileSource::builder(path)
            .poll_interval(Duration::from_millis(25))
            .build()
            .expect("should build"),
    );

    let cancel = CancellationToken::new();
    let watcher = {
        let source = source.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            source
                .watch_prefix(cancel, "/", WatchOptions::default().with_resume_token(7))
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(60)).await;
    cancel.cancel();

    let result = tokio::time::timeout(Duration::from_secs(1), watcher)
        .await
        .expect("cancellation should unblock the watch")
        .expect("watch task should not panic");
    assert!(result.unwrap_err().is_canceled());
}

#[tokio::test]
async fn test_watch_ignores_irrelevant_change() {
    let dir = tempfile::tempdir().expect("should create tempdir");
    let path = write_document(&dir, TESTFILE_YML);
    let source = Arc::new(
        FileSource::builder(path.clone())
            .poll_interval(Duration::from_millis(25))
            .build()
            .expect("should build"),
    );

    let cancel = CancellationToken::new();
    let options = WatchOptions::default().with_interest_prefixes(["/premtest"]);
    let mut watcher = {
        let source = source.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { source.watch_prefix(cancel, "/", options).await })
    };

    tokio::time::sleep(Duration::from_millis(150)).await;
    // change outside the interest set only
    let changed = TESTFILE_YML.replace("test1", "test9");
    std::fs::write(&path, changed).expect("should rewrite document");

    // several poll ticks pass without a wakeup
    let still_pending = tokio::time::timeout(Duration::from_millis(200), &mut watcher).await;
    assert!(still_pending.is_err(), "irrelevant change must not wake the watch");

    cancel.cancel();
    let result = tokio::time::timeout(Duration::from_secs(1), watcher)
        .await
        .expect("cancellation should unblock the watch")
        .expect("watch task should not panic");
    assert!(result.unwrap_err().is_canceled());
}

#[tokio::test]
async fn test_http_document_with_headers() {
    // echo the request headers back as a YAML document
    let route = warp::header::headers_cloned().map(|headers: warp::http::HeaderMap| {
        let mut body = String::from("---\n");
        for (name, value) in headers.iter() {
            body.push_str(&format!("{}: {:?}\n", name.as_str(), value.to_str().unwrap_or_default()));
        }
        body
    });
    let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
    let server = tokio::spawn(server);

    let source = FileSource::builder(format!("http://{addr}"))
        .header("X-Test-Token", "Hi")
        .header("Content-Type", "application/json")
        .build()
        .expect("should build");

    let values = source
        .get_values(&["/".to_string()])
        .await
        .expect("should fetch document");

    assert_eq!(values["/x-test-token"], "Hi");
    assert_eq!(values["/content-type"], "application/json");
    assert_eq!(
        values.get("/x-nonexistent").cloned().unwrap_or_default(),
        ""
    );

    server.abort();
}
