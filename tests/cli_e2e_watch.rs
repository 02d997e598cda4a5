//! End-to-end tests for the `watch` command.

mod common;

use std::time::Duration;

use bundle_publish::session::SessionListener;
use common::prelude::*;

#[test]
fn test_watch_without_publisher_fails() {
    let listener = SessionListener::bind(Duration::from_secs(1)).unwrap();
    let port = listener.port().unwrap();
    drop(listener);

    cargo_bin_cmd!("bundle-publish")
        .args(["watch", &port.to_string()])
        .assert()
        .failure()
        .stderr(predicate::str::contains(format!("Nothing is listening on port {}", port)));
}

#[test]
fn test_watch_rejects_invalid_port() {
    cargo_bin_cmd!("bundle-publish")
        .args(["watch", "not-a-port"])
        .assert()
        .code(2);
}
