use super::watch::WatchOptions;

#[test]
fn test_defaults() {
    let options = WatchOptions::default();
    assert_eq!(options.resume_token, 0);
    assert!(options.interest_prefixes.is_empty());
}

#[test]
fn test_builder_chain() {
    let options = WatchOptions::new()
        .with_resume_token(42)
        .with_interest_prefixes(["/a", "/b/c"]);
    assert_eq!(options.resume_token, 42);
    assert_eq!(options.interest_prefixes, vec!["/a", "/b/c"]);
}

#[test]
fn test_fresh_options_per_call() {
    let first = WatchOptions::new().with_interest_prefixes(["/a"]);
    let second = first.clone().with_resume_token(9);
    // the original is unaffected; options are immutable during a call
    assert_eq!(first.resume_token, 0);
    assert_eq!(second.interest_prefixes, vec!["/a"]);
}
