use super::*;

#[test]
fn test_endpoint_url_no_scheme() {
    assert_eq!(endpoint_url("127.0.0.1:2379", false), "http://127.0.0.1:2379");
    assert_eq!(endpoint_url("node1:2379", false), "http://node1:2379");
    assert_eq!(endpoint_url("localhost:2379", true), "https://localhost:2379");
}

#[test]
fn test_endpoint_url_preserves_scheme() {
    assert_eq!(endpoint_url("http://127.0.0.1:2379", false), "http://127.0.0.1:2379");
    assert_eq!(endpoint_url("http://127.0.0.1:2379", true), "http://127.0.0.1:2379");
    assert_eq!(
        endpoint_url("https://secure.example.com:2379", false),
        "https://secure.example.com:2379"
    );
}
