//! End-to-end tests for the `affected` command.

mod common;

use common::prelude::*;

#[test]
fn test_affected_lists_outputs_of_initial_commit() {
    if !git_available() {
        return;
    }
    let ws = CliWorkspace::new();
    ws.configure();

    ws.cmd(&["affected", "web"])
        .assert()
        .success()
        .stdout(predicate::str::contains("~ all.js"))
        .stdout(predicate::str::contains("~ app.js"))
        .stdout(predicate::str::contains("A src/a.js"))
        .stdout(predicate::str::contains("A vendor.js"))
        .stdout(predicate::str::contains("concatfile.json").not())
        .stdout(predicate::str::contains(".gspconfig").not());
}

#[test]
fn test_affected_follows_nesting_only() {
    if !git_available() {
        return;
    }
    let ws = CliWorkspace::new();
    let rev = ws.web.commit(&[("vendor.js", Some("vendor2();"))], "bump vendor");
    ws.configure();

    ws.cmd(&["affected", "web", &rev])
        .assert()
        .success()
        .stdout(predicate::str::contains("M vendor.js"))
        .stdout(predicate::str::contains("~ all.js"))
        .stdout(predicate::str::contains("app.js").not());
}

#[test]
fn test_affected_unrelated_change() {
    if !git_available() {
        return;
    }
    let ws = CliWorkspace::new();
    let rev = ws.web.commit(&[("docs/readme.md", Some("docs"))], "docs");
    ws.configure();

    ws.cmd(&["affected", "web", &rev, "--cascades"])
        .assert()
        .success()
        .stdout(predicate::str::contains("readme").not());
    ws.cmd(&["affected", "web", &rev])
        .assert()
        .success()
        .stdout(predicate::str::contains("No bundles affected"));
}
