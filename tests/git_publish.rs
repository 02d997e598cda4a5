//! Publishing from real git mirrors into a real git working copy.
//!
//! Skipped when `git` is not installed.

mod common;

use std::fs;
use std::sync::Arc;

use bundle_publish::config::ServerSettings;
use bundle_publish::git::Identity;
use bundle_publish::publish::Publisher;
use bundle_publish::registry::Registry;
use bundle_publish::repository::RepositoryManager;
use bundle_publish::transport::GitWorkingCopy;
use common::prelude::*;

const MANIFEST: &str = r#"{"pkg": {"dist/app.js": ["src/*.js", "!src/debug.js"]}}"#;
const GSP: &str = r#"{"publish_dir": "dist", "mapping_dir": "web"}"#;

fn publisher(settings: &ServerSettings) -> Publisher {
    let registry = Registry::open(&settings.registry_path()).unwrap();
    let manager = RepositoryManager::from_registry(registry, settings.concurrency).unwrap();
    let transport = GitWorkingCopy::new(
        settings.target_dir(),
        Identity {
            name: settings.target.name.clone(),
            email: settings.target.email.clone(),
        },
        false,
    );
    Publisher::new(manager, Arc::new(transport))
}

#[test]
fn test_publish_from_mirror_into_working_copy() {
    if !git_available() {
        return;
    }
    let temp = TempDir::new().unwrap();
    let upstream = temp.path().join("upstream");
    let workspace = temp.path().join("workspace");

    let web = SourceRepo::init(&upstream.join("web.git"));
    let first = web.commit(
        &[
            ("concatfile.json", Some(MANIFEST)),
            (".gspconfig", Some(GSP)),
            ("src/a.js", Some("a();")),
            ("src/b.js", Some("b();")),
            ("src/debug.js", Some("debugger;")),
        ],
        "Add app bundle",
    );

    let target = SourceRepo::init(&workspace.join("publish"));
    target.commit(&[("README", Some("published bundles"))], "init");

    let settings = ServerSettings::parse(&settings_yaml(&workspace, &upstream, &["web"])).unwrap();
    let manager = RepositoryManager::new(
        Registry::open(&settings.registry_path()).unwrap(),
        settings.concurrency,
    );
    assert_eq!(manager.configure(&settings).unwrap(), vec!["web"]);

    let reports = publisher(&settings).publish_range("web", None).unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].revision, first);

    let output = workspace.join("publish/web/app.js");
    assert_eq!(fs::read_to_string(&output).unwrap(), "a();\nb();");
    assert_eq!(git(&target.path, &["log", "-1", "--format=%an|%cn|%s"]), "Alice|Publisher|Add app bundle");

    // A later changeset is fetched and published on the next run
    let second = web.commit(&[("src/b.js", Some("b2();"))], "Update b");
    let reports = publisher(&settings).publish_range("web", None).unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].revision, second);
    assert_eq!(fs::read_to_string(&output).unwrap(), "a();\nb2();");

    let registry = Registry::open(&settings.registry_path()).unwrap();
    assert_eq!(registry.last_published("web").unwrap(), Some(second));

    // Nothing new: nothing published
    assert!(publisher(&settings).publish_range("web", None).unwrap().is_empty());
}

#[test]
fn test_excluded_change_creates_no_commit() {
    if !git_available() {
        return;
    }
    let temp = TempDir::new().unwrap();
    let upstream = temp.path().join("upstream");
    let workspace = temp.path().join("workspace");

    let web = SourceRepo::init(&upstream.join("web.git"));
    web.commit(
        &[
            ("concatfile.json", Some(MANIFEST)),
            (".gspconfig", Some(GSP)),
            ("src/a.js", Some("a();")),
            ("src/debug.js", Some("debugger;")),
        ],
        "init",
    );
    let target = SourceRepo::init(&workspace.join("publish"));
    target.commit(&[("README", Some("published bundles"))], "init");

    let settings = ServerSettings::parse(&settings_yaml(&workspace, &upstream, &["web"])).unwrap();
    RepositoryManager::new(Registry::open(&settings.registry_path()).unwrap(), 5)
        .configure(&settings)
        .unwrap();
    publisher(&settings).publish_range("web", None).unwrap();
    let head = git(&target.path, &["rev-parse", "HEAD"]);

    web.commit(&[("src/debug.js", Some("debugger; debugger;"))], "more debugging");
    let reports = publisher(&settings).publish_range("web", None).unwrap();

    assert_eq!(reports.len(), 1);
    assert!(reports[0].affected.is_empty());
    assert_eq!(git(&target.path, &["rev-parse", "HEAD"]), head);
}

#[test]
fn test_cascades_into_shared_working_copy_commit_separately() {
    if !git_available() {
        return;
    }
    let temp = TempDir::new().unwrap();
    let upstream = temp.path().join("upstream");
    let workspace = temp.path().join("workspace");

    let lib = SourceRepo::init(&upstream.join("lib.git"));
    lib.commit(&[("shared/x.js", Some("x0"))], "init");

    let embedding = ["b1", "b2", "b3", "b4"];
    for name in embedding {
        let repo = SourceRepo::init(&upstream.join(format!("{}.git", name)));
        let gsp = format!(r#"{{"mapping_dir": "{}"}}"#, name);
        repo.commit(
            &[
                (
                    "concatfile.json",
                    Some(
                        r#"{"pkg": {"out.js": ["vendor/x.js", "own.js"]},
                            "ext": {"vendor/x.js": {"repo": "lib", "uri": "shared/x.js"}}}"#,
                    ),
                ),
                (".gspconfig", Some(gsp.as_str())),
                ("own.js", Some(name)),
            ],
            "init",
        );
    }

    let target = SourceRepo::init(&workspace.join("publish"));
    target.commit(&[("README", Some("published bundles"))], "init");

    let mut names = vec!["lib"];
    names.extend(embedding);
    let settings = ServerSettings::parse(&settings_yaml(&workspace, &upstream, &names)).unwrap();
    RepositoryManager::new(Registry::open(&settings.registry_path()).unwrap(), 5)
        .configure(&settings)
        .unwrap();

    let publisher = publisher(&settings);
    publisher.publish_range("lib", None).unwrap();
    for round in 1..=3 {
        let content = format!("x{}", round);
        lib.commit(&[("shared/x.js", Some(content.as_str()))], &format!("x round {}", round));
        for report in publisher.publish_range("lib", None).unwrap() {
            assert_eq!(report.cascades.len(), embedding.len());
            for cascade in &report.cascades {
                assert!(cascade.outcome.is_ok(), "{:?}", cascade.outcome);
            }
        }
    }

    // Every commit after the initial one belongs to exactly one repository
    let log = git(&target.path, &["rev-list", "HEAD"]);
    let commits: Vec<&str> = log.lines().collect();
    assert_eq!(commits.len(), 1 + embedding.len() * 4);
    for id in &commits[..commits.len() - 1] {
        let files = git(&target.path, &["show", "--name-only", "--format=", *id]);
        let message = git(&target.path, &["show", "-s", "--format=%B", *id]);
        let dirs: std::collections::BTreeSet<&str> =
            files.lines().filter_map(|f| f.split('/').next()).collect();
        assert_eq!(dirs.len(), 1, "commit {} spans {:?}", id, dirs);
        let dir = dirs.iter().next().unwrap();
        assert!(message.contains(&format!("{}: out.js", dir)), "{}", message);
        assert_eq!(git(&target.path, &["show", "-s", "--format=%an", *id]), "Alice");
    }

    for name in embedding {
        let out = fs::read_to_string(workspace.join(format!("publish/{}/out.js", name))).unwrap();
        assert_eq!(out, format!("/* from lib:shared/x.js */\nx3\n{}", name));
    }
}
