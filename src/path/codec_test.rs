use super::*;

#[test]
fn test_dotted_to_canonical() {
    assert_eq!(dotted::to_canonical("database.hosts.0"), "/database/hosts/0");
    assert_eq!(dotted::to_canonical("single"), "/single");
}

#[test]
fn test_dotted_round_trip() {
    for native in ["premtest.database.url", "remtest.database.hosts.0.name", "x.y"] {
        assert_eq!(dotted::to_native(&dotted::to_canonical(native)), native);
    }
}

#[test]
fn test_dotted_watch_subject() {
    assert_eq!(dotted::watch_subject("/database"), "database.>");
    assert_eq!(dotted::watch_subject("/database/hosts"), "database.hosts.>");
    assert_eq!(dotted::watch_subject("/"), ">");
    assert_eq!(dotted::watch_subject(""), ">");
}

#[test]
fn test_env_to_native() {
    assert_eq!(env_names::to_native("/foo/bar/test"), "FOO_BAR_TEST");
}

#[test]
fn test_env_to_canonical() {
    assert_eq!(env_names::to_canonical("FOO_BAR_TEST"), "/foo/bar/test");
}

#[test]
fn test_env_round_trip() {
    for native in ["FOO_BAR_TEST", "DATABASE_HOST", "A"] {
        assert_eq!(env_names::to_native(&env_names::to_canonical(native)), native);
    }
}

#[test]
fn test_matches_any_literal_prefix() {
    let prefixes = vec!["/ab".to_string()];
    // literal string prefix, not segment-aware
    assert!(matches_any("/abc", &prefixes));
    assert!(matches_any("/ab/c", &prefixes));
    assert!(!matches_any("/a", &prefixes));
}

#[test]
fn test_matches_any_empty_set() {
    assert!(!matches_any("/anything", &[]));
}

#[test]
fn test_is_relevant_falls_back_to_prefix() {
    assert!(is_relevant("/a/b", &[], "/a"));
    assert!(!is_relevant("/c", &[], "/a"));
    // empty fallback matches everything
    assert!(is_relevant("/c", &[], ""));
}

#[test]
fn test_is_relevant_prefers_interest() {
    let interest = vec!["/a/b".to_string()];
    assert!(is_relevant("/a/b/c", &interest, "/"));
    // an interest set narrows even a broad fallback
    assert!(!is_relevant("/a/x", &interest, "/"));
}
