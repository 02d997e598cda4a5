//! # Publish Orchestration
//!
//! The [`Publisher`] drives one publish run end to end:
//!
//! 1. the raw first-parent diff of a changeset is propagated through the
//!    repository's manifest into the set of affected bundles;
//! 2. every affected bundle is resolved, at most `concurrency` at once, and
//!    the first failure abandons the whole changeset;
//! 3. the resolved outputs go to the [`Transport`] in a single request;
//! 4. the raw and propagated paths are translated into the other registered
//!    repositories, which are republished at their last published revision.
//!
//! Cascades into distinct repositories run concurrently; publishes into the
//! same repository are serialized by a per-repository lock. A failing cascade
//! is reported and logged but never fails the changeset that triggered it,
//! since that changeset is already committed.
//!
//! A revision range is walked strictly in order. The registry records the
//! last published revision after every successful changeset, so a failed
//! walk resumes where it stopped.

use crate::cache::ManifestCache;
use crate::cascade::{self, Cascade, CascadeTrail};
use crate::config::PublishConfig;
use crate::diff::{self, DiffSet};
use crate::error::{Error, Result};
use crate::fanout;
use crate::git::Identity;
use crate::manifest::BundleConfig;
use crate::repository::RepositoryManager;
use crate::resolver::{Content, ExternalSource, RepoView, Resolver};
use crate::session::{LogSink, ProgressSink};
use crate::transport::{PublishRequest, Transport};
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

/// Outcome of publishing one changeset, including the cascades it caused.
#[derive(Debug, Clone)]
pub struct ChangesetReport {
    pub repo: String,
    pub revision: String,
    /// Propagated outputs that were published
    pub affected: DiffSet,
    /// Commit created in the publish target, if anything changed
    pub commit: Option<String>,
    pub cascades: Vec<CascadeReport>,
}

/// Outcome of one republish triggered by another repository.
#[derive(Debug, Clone)]
pub struct CascadeReport {
    pub target: String,
    pub trail: CascadeTrail,
    pub outcome: std::result::Result<ChangesetReport, String>,
}

/// What a changeset would publish, without publishing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub affected: DiffSet,
    /// Repositories that would be republished and their affected bundles
    pub cascades: BTreeMap<String, DiffSet>,
}

/// Author and message of the changeset a publish chain started from.
struct Origin {
    author: Identity,
    message: String,
}

/// Repository state ready for resolution.
struct Prepared {
    view: RepoView,
    publish: PublishConfig,
    affected: DiffSet,
}

pub struct Publisher {
    repos: RepositoryManager,
    cache: ManifestCache,
    transport: Arc<dyn Transport>,
    progress: Arc<dyn ProgressSink>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Publisher {
    pub fn new(repos: RepositoryManager, transport: Arc<dyn Transport>) -> Self {
        Self {
            repos,
            cache: ManifestCache::new(),
            transport,
            progress: Arc::new(LogSink),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Report progress to `progress` instead of the log.
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn repos(&self) -> &RepositoryManager {
        &self.repos
    }

    pub fn cache(&self) -> &ManifestCache {
        &self.cache
    }

    /// Fetch `repo` and publish every revision after `skip`, or after the
    /// last published revision when `skip` is not given.
    ///
    /// Stops at the first failing changeset; the error names its revision.
    pub fn publish_range(&self, repo: &str, skip: Option<&str>) -> Result<Vec<ChangesetReport>> {
        let backend = self.repos.backend(repo)?;
        backend.fetch()?;

        let since = match skip {
            Some(rev) => Some(rev.to_string()),
            None => self.repos.registry().last_published(repo)?,
        };
        let revisions = backend.revisions(since.as_deref())?;
        info!("{} changesets of {} to publish", revisions.len(), repo);

        let mut reports = Vec::with_capacity(revisions.len());
        for revision in &revisions {
            match self.publish_changeset(repo, revision) {
                Ok(report) => {
                    self.repos.registry().set_last_published(repo, revision)?;
                    reports.push(report);
                }
                Err(e) => {
                    self.progress.message(&e.to_string());
                    self.progress.message("Publish didn't finish due to errors.");
                    return Err(e);
                }
            }
        }
        self.progress.message("Publish finished, without errors.");
        Ok(reports)
    }

    /// Publish a single changeset and run the cascades it causes.
    pub fn publish_changeset(&self, repo: &str, revision: &str) -> Result<ChangesetReport> {
        self.progress
            .message(&format!("Publish changeset {}", short(revision)));

        let run = || -> Result<ChangesetReport> {
            let backend = self.repos.backend(repo)?;
            let raw = backend.changes(revision)?;
            let info = backend.commit_info(revision)?;
            let origin = Origin {
                author: Identity {
                    name: info.name,
                    email: info.email,
                },
                message: info.message,
            };
            let trail = CascadeTrail::new(repo, revision);
            let (mut report, cascades) = self.publish_one(repo, revision, raw, &trail, &origin)?;
            report.cascades = self.run_cascades(cascades, &origin);
            Ok(report)
        };
        run().map_err(|e| e.in_changeset(repo, revision))
    }

    /// Affected bundles of `revision` and the cascades it would cause.
    pub fn preview(&self, repo: &str, revision: &str) -> Result<Preview> {
        let raw = self.repos.backend(repo)?.changes(revision)?;
        let prepared = self.prepare(repo, revision, &raw)?;
        let mut outgoing = raw;
        outgoing.absorb(&prepared.affected);
        let cascades = cascade::translate(&outgoing, repo, &self.configs()?);
        Ok(Preview {
            affected: prepared.affected,
            cascades,
        })
    }

    /// Propagated bundle set of `revision`.
    pub fn affected(&self, repo: &str, revision: &str) -> Result<DiffSet> {
        let raw = self.repos.backend(repo)?.changes(revision)?;
        Ok(self.prepare(repo, revision, &raw)?.affected)
    }

    /// Resolve one bundle of `repo` at `revision`.
    pub fn resolve(&self, repo: &str, revision: &str, bundle: &str) -> Result<Content> {
        let prepared = self.prepare(repo, revision, &DiffSet::new())?;
        Resolver::new(self).resolve(bundle, &prepared.view)
    }

    fn prepare(&self, repo: &str, revision: &str, raw: &DiffSet) -> Result<Prepared> {
        let snapshot = self.repos.backend(repo)?.open_snapshot(revision)?;
        let publish = PublishConfig::load(snapshot.as_ref())?;
        let config = self.cache.get_or_load(repo, snapshot.as_ref(), Some(raw))?;

        let mut affected = raw.clone();
        diff::propagate(&mut affected, &config, publish.scope());
        debug!("{}@{}: {} affected bundles", repo, short(revision), affected.len());

        let view = RepoView::new(repo, snapshot, config).with_pipeline(Arc::new(publish.pipeline()));
        Ok(Prepared {
            view,
            publish,
            affected,
        })
    }

    /// Resolve every affected output; deleted ones map to `None`.
    fn compile(&self, prepared: &Prepared) -> Result<BTreeMap<String, Option<Vec<u8>>>> {
        let jobs: Vec<(String, bool)> = prepared
            .affected
            .iter()
            .map(|(bundle, kind)| (bundle.to_string(), kind.is_deletion()))
            .collect();
        let resolver = Resolver::new(self);
        let outputs = fanout::try_map(self.repos.concurrency(), &jobs, |(bundle, deleted)| {
            if *deleted {
                return Ok((bundle.clone(), None));
            }
            self.progress.message(&format!("Compiling {}...", bundle));
            let content = resolver.resolve(bundle, &prepared.view)?;
            Ok((bundle.clone(), Some(content.into_bytes())))
        })?;
        Ok(outputs.into_iter().collect())
    }

    fn lock_for(&self, repo: &str) -> Result<Arc<Mutex<()>>> {
        let mut locks = self.locks.lock().map_err(|_| Error::LockPoisoned {
            context: "publish locks".to_string(),
        })?;
        Ok(Arc::clone(locks.entry(repo.to_string()).or_default()))
    }

    /// Publish `raw` in `repo` at `revision` under the repository lock.
    ///
    /// Returns the cascades to run next. They are not run here so the lock
    /// is released before another repository is entered.
    fn publish_one(
        &self,
        repo: &str,
        revision: &str,
        raw: DiffSet,
        trail: &CascadeTrail,
        origin: &Origin,
    ) -> Result<(ChangesetReport, Vec<Cascade>)> {
        let lock = self.lock_for(repo)?;
        let _guard = lock.lock().map_err(|_| Error::LockPoisoned {
            context: format!("publish lock of {}", repo),
        })?;

        let prepared = self.prepare(repo, revision, &raw)?;
        let files = self.compile(&prepared)?;

        let commit = if files.is_empty() {
            info!("No bundles of {} affected at {}", repo, short(revision));
            None
        } else {
            let message = if trail.hops().is_empty() {
                origin.message.clone()
            } else {
                format!("{}\n\n{}", trail.commit_message(), origin.message)
            };
            let request = PublishRequest {
                repo: repo.to_string(),
                files,
                author: origin.author.clone(),
                message,
                publish_dir: prepared.publish.publish_dir.clone(),
                mapping_dir: prepared.publish.mapping_dir.clone(),
            };
            self.transport.deliver(&request, self.progress.as_ref())?.commit
        };

        let mut outgoing = raw;
        outgoing.absorb(&prepared.affected);
        let cascades = cascade::plan(&outgoing, trail, &self.configs()?);

        Ok((
            ChangesetReport {
                repo: repo.to_string(),
                revision: revision.to_string(),
                affected: prepared.affected,
                commit,
                cascades: Vec::new(),
            },
            cascades,
        ))
    }

    fn run_cascades(&self, cascades: Vec<Cascade>, origin: &Origin) -> Vec<CascadeReport> {
        if cascades.is_empty() {
            return Vec::new();
        }
        match fanout::try_map(self.repos.concurrency(), &cascades, |job| {
            Ok(self.run_cascade(job, origin))
        }) {
            Ok(reports) => reports,
            Err(e) => {
                warn!("Could not schedule cascades: {}", e);
                Vec::new()
            }
        }
    }

    fn run_cascade(&self, job: &Cascade, origin: &Origin) -> CascadeReport {
        self.progress.message(&format!(
            "Republish repository {} which refers files updated in this commit.",
            job.target
        ));
        let outcome = self.cascade_into(job, origin).map_err(|e| {
            let message = format!("Republish of {} ({}) failed: {}", job.target, job.trail, e);
            warn!("{}", message);
            self.progress.message(&message);
            e.to_string()
        });
        CascadeReport {
            target: job.target.clone(),
            trail: job.trail.clone(),
            outcome,
        }
    }

    fn cascade_into(&self, job: &Cascade, origin: &Origin) -> Result<ChangesetReport> {
        let revision = match self.repos.registry().last_published(&job.target)? {
            Some(revision) => revision,
            None => self.repos.backend(&job.target)?.latest()?,
        };
        let (mut report, next) =
            self.publish_one(&job.target, &revision, job.diff.clone(), &job.trail, origin)?;
        report.cascades = self.run_cascades(next, origin);
        Ok(report)
    }

    /// Current manifest of `repo`, from the cache when possible.
    fn config_of(&self, repo: &str) -> Result<Arc<BundleConfig>> {
        if let Some(config) = self.cache.get(repo)? {
            return Ok(config);
        }
        let snapshot = self.repos.backend(repo)?.open_snapshot("HEAD")?;
        self.cache.get_or_load(repo, snapshot.as_ref(), None)
    }

    /// Manifests of every registered repository; unreadable ones are skipped.
    fn configs(&self) -> Result<BTreeMap<String, Arc<BundleConfig>>> {
        let mut configs = BTreeMap::new();
        for repo in self.repos.repositories()? {
            match self.config_of(&repo) {
                Ok(config) => {
                    configs.insert(repo, config);
                }
                Err(e) => warn!("Ignoring {} for cascades: {}", repo, e),
            }
        }
        Ok(configs)
    }
}

impl ExternalSource for Publisher {
    fn checkout(&self, repo: &str) -> Result<Option<RepoView>> {
        let Some(backend) = self.repos.get(repo)? else {
            return Ok(None);
        };
        let snapshot = backend.open_snapshot("HEAD")?;
        let publish = PublishConfig::load(snapshot.as_ref())?;
        let config = match self.cache.get(repo)? {
            Some(config) => config,
            None => self.cache.get_or_load(repo, snapshot.as_ref(), None)?,
        };
        Ok(Some(
            RepoView::new(repo, snapshot, config).with_pipeline(Arc::new(publish.pipeline())),
        ))
    }
}

fn short(revision: &str) -> &str {
    revision.get(..7).unwrap_or(revision)
}
