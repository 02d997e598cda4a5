//! End-to-end tests for the `publish` command.

mod common;

use std::fs;

use common::prelude::*;

#[test]
fn test_publish_writes_and_commits_outputs() {
    if !git_available() {
        return;
    }
    let ws = CliWorkspace::new();
    ws.configure();

    ws.cmd(&["publish", "web"])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("[PUB] web@{} (4 outputs,", ws.rev)));

    assert_eq!(fs::read_to_string(ws.published("web/all.js")).unwrap(), "a();\nvendor();");
    assert_eq!(fs::read_to_string(ws.published("web/app.js")).unwrap(), "a();");
    assert_eq!(fs::read_to_string(ws.published("web/src/a.js")).unwrap(), "a();");
    assert_eq!(
        git(&ws.published(""), &["log", "-1", "--format=%an|%cn|%s"]),
        "Alice|Publisher|init"
    );

    ws.cmd(&["publish", "web"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[OK] web is up to date"));
}

#[test]
fn test_publish_removes_deleted_source() {
    if !git_available() {
        return;
    }
    let ws = CliWorkspace::new();
    ws.configure();
    ws.cmd(&["publish", "web"]).assert().success();

    ws.web.commit(
        &[("src/b.js", Some("b();")), ("src/a.js", None)],
        "replace a with b",
    );
    ws.cmd(&["publish", "web"]).assert().success();

    assert!(!ws.published("web/src/a.js").exists());
    assert_eq!(fs::read_to_string(ws.published("web/src/b.js")).unwrap(), "b();");
    assert_eq!(fs::read_to_string(ws.published("web/all.js")).unwrap(), "b();\nvendor();");
}

#[test]
fn test_preview_publishes_nothing() {
    if !git_available() {
        return;
    }
    let ws = CliWorkspace::new();
    ws.configure();

    ws.cmd(&["publish", "web", "--preview"])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("[SCAN] web@{}", ws.rev)))
        .stdout(predicate::str::contains("~ all.js"));

    assert!(!ws.published("web/all.js").exists());
    ws.cmd(&["repos"])
        .assert()
        .success()
        .stdout(predicate::str::contains("never published"));
}
