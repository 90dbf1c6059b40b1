// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Job Manager — owns every validation job and its state transitions.
//
// The registry map is locked only to look up, insert or evict entries; each
// job's state lives behind its own mutex, so transitions of one job never
// contend with another. A pipeline runs on a blocking worker once it holds
// one of the configured worker slots. Outputs are stored together with the
// DONE transition under a single lock, so no reader sees DONE without them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use techcheck_core::config::{JobConfig, TechcheckConfig};
use techcheck_core::error::{JobError, Result, TechcheckError};
use techcheck_core::human_errors::humanize_error;
use techcheck_core::integrity::{fingerprint, short_fingerprint};
use techcheck_core::types::{Finding, Job, JobFailure, JobId, JobState};
use techcheck_rules::ValidationReport;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::pipeline::{Pipeline, PipelineOutput};

struct Record {
    job: Job,
    report: Option<Arc<ValidationReport>>,
}

struct Entry {
    record: Mutex<Record>,
    state: watch::Sender<JobState>,
}

impl Entry {
    fn new(job: Job) -> Self {
        let (state, _) = watch::channel(job.state);
        Self {
            record: Mutex::new(Record { job, report: None }),
            state,
        }
    }

    fn record(&self) -> MutexGuard<'_, Record> {
        lock(&self.record)
    }

    /// Advance to `next`; refused when the job is terminal or out of order.
    fn advance(&self, next: JobState) -> Result<()> {
        let mut record = self.record();
        record.job.advance(next)?;
        let id = record.job.id;
        drop(record);
        self.state.send_replace(next);
        info!(job_id = %id, state = %next, "job transition");
        Ok(())
    }

    fn complete(&self, output: PipelineOutput) -> Result<()> {
        let mut record = self.record();
        record.job.advance(JobState::Done)?;
        record.job.findings = Some(Arc::new(output.findings));
        record.job.artifact = Some(Arc::new(output.artifact));
        record.report = Some(Arc::new(output.report));
        let id = record.job.id;
        drop(record);
        self.state.send_replace(JobState::Done);
        info!(job_id = %id, "job done");
        Ok(())
    }

    fn fail(&self, err: &TechcheckError) {
        let mut record = self.record();
        let id = record.job.id;
        if let Err(refused) = record.job.advance(JobState::Failed) {
            error!(job_id = %id, %refused, %err, "failure on a finished job ignored");
            return;
        }
        record.job.failure = Some(JobFailure {
            kind: err.failure_kind(),
            reason: err.to_string(),
            suggestion: humanize_error(err).suggestion,
        });
        drop(record);
        self.state.send_replace(JobState::Failed);
        warn!(job_id = %id, %err, "job failed");
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Inner {
    registry: Mutex<HashMap<JobId, Arc<Entry>>>,
    pipeline: Pipeline,
    slots: Arc<Semaphore>,
    config: JobConfig,
}

/// Process-wide owner of validation jobs. Cheap to clone; clones share the
/// same registry.
#[derive(Clone)]
pub struct JobManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for JobManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobManager")
            .field("jobs", &lock(&self.inner.registry).len())
            .field("config", &self.inner.config)
            .finish()
    }
}

impl JobManager {
    pub fn new(config: &TechcheckConfig) -> Self {
        Self::with_pipeline(Pipeline::new(config), config.jobs.clone())
    }

    pub fn with_pipeline(pipeline: Pipeline, config: JobConfig) -> Self {
        let slots = Arc::new(Semaphore::new(config.worker_slots.max(1)));
        Self {
            inner: Arc::new(Inner {
                registry: Mutex::new(HashMap::new()),
                pipeline,
                slots,
                config,
            }),
        }
    }

    /// Register a job for `bytes` and start it in the background. Must be
    /// called from within a Tokio runtime.
    #[instrument(skip_all, fields(bytes = bytes.len()))]
    pub fn submit(&self, bytes: Vec<u8>) -> JobId {
        let document = fingerprint(&bytes);
        info!(document = short_fingerprint(&document), "job submitted");
        let job = Job::new(document);
        let id = job.id;
        let entry = Arc::new(Entry::new(job));
        lock(&self.inner.registry).insert(id, Arc::clone(&entry));
        debug!(job_id = %id, "job registered");

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let permit = match Arc::clone(&inner.slots).acquire_owned().await {
                Ok(permit) => permit,
                Err(closed) => {
                    entry.fail(&TechcheckError::Worker(closed.to_string()));
                    return;
                }
            };
            debug!(job_id = %id, "worker slot acquired");

            let worker_entry = Arc::clone(&entry);
            let joined = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                let outcome = inner
                    .pipeline
                    .run(&bytes, |stage| worker_entry.advance(stage))
                    .and_then(|output| worker_entry.complete(output));
                if let Err(err) = outcome {
                    worker_entry.fail(&err);
                }
            })
            .await;

            if let Err(join) = joined {
                entry.fail(&TechcheckError::Worker(join.to_string()));
            }
        });
        id
    }

    fn entry(&self, id: JobId) -> std::result::Result<Arc<Entry>, JobError> {
        lock(&self.inner.registry)
            .get(&id)
            .cloned()
            .ok_or(JobError::NotFound(id))
    }

    pub fn status(&self, id: JobId) -> std::result::Result<JobState, JobError> {
        Ok(self.entry(id)?.record().job.state)
    }

    /// A copy of the job as it is now.
    pub fn snapshot(&self, id: JobId) -> std::result::Result<Job, JobError> {
        Ok(self.entry(id)?.record().job.clone())
    }

    /// Findings of a DONE job.
    pub fn result(&self, id: JobId) -> std::result::Result<Arc<Vec<Finding>>, JobError> {
        let entry = self.entry(id)?;
        let record = entry.record();
        match (&record.job.findings, record.job.state) {
            (Some(findings), JobState::Done) => Ok(Arc::clone(findings)),
            (_, state) => Err(JobError::NotReady { id, state }),
        }
    }

    /// Annotated document of a DONE job.
    pub fn artifact(&self, id: JobId) -> std::result::Result<Arc<Vec<u8>>, JobError> {
        let entry = self.entry(id)?;
        let record = entry.record();
        match (&record.job.artifact, record.job.state) {
            (Some(artifact), JobState::Done) => Ok(Arc::clone(artifact)),
            (_, state) => Err(JobError::NotReady { id, state }),
        }
    }

    /// Report of a DONE job.
    pub fn report(&self, id: JobId) -> std::result::Result<Arc<ValidationReport>, JobError> {
        let entry = self.entry(id)?;
        let record = entry.record();
        match (&record.report, record.job.state) {
            (Some(report), JobState::Done) => Ok(Arc::clone(report)),
            (_, state) => Err(JobError::NotReady { id, state }),
        }
    }

    /// Wait until the job is DONE or FAILED and return it.
    pub async fn wait(&self, id: JobId) -> std::result::Result<Job, JobError> {
        let mut state = self.entry(id)?.state.subscribe();
        if state.wait_for(JobState::is_terminal).await.is_err() {
            // Sender dropped: the entry was evicted while we waited.
            return Err(JobError::NotFound(id));
        }
        self.snapshot(id)
    }

    /// Remove terminal jobs that finished at least the retention window
    /// before `now`. Returns how many were removed.
    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let retention = self.inner.config.retention_secs;
        let mut registry = lock(&self.inner.registry);
        let before = registry.len();
        registry.retain(|_, entry| match entry.record().job.finished_at() {
            Some(finished) => {
                let age = now.signed_duration_since(finished).num_seconds();
                age < 0 || (age as u64) < retention
            }
            None => true,
        });
        let evicted = before - registry.len();
        if evicted > 0 {
            info!(evicted, remaining = registry.len(), "expired jobs evicted");
        }
        evicted
    }

    /// Periodically evict expired jobs until the manager is dropped.
    pub fn spawn_eviction(&self) -> JoinHandle<()> {
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        let period = Duration::from_secs(self.inner.config.eviction_interval_secs.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let Some(inner) = inner.upgrade() else {
                    debug!("job manager dropped, eviction stopped");
                    break;
                };
                JobManager { inner }.evict_expired(Utc::now());
            }
        })
    }

    pub fn len(&self) -> usize {
        lock(&self.inner.registry).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use techcheck_core::types::{FailureKind, PageRole, Severity};
    use techcheck_document::fixtures::{self, FixturePage};

    fn manager() -> JobManager {
        JobManager::new(&TechcheckConfig::default())
    }

    #[tokio::test]
    async fn compliant_thesis_reaches_done_with_empty_findings() {
        let manager = manager();
        let id = manager.submit(fixtures::thesis_pdf());
        let job = manager.wait(id).await.expect("wait");

        assert_eq!(job.state, JobState::Done);
        let states: Vec<JobState> = job.transitions.iter().map(|t| t.state).collect();
        assert_eq!(
            states,
            vec![
                JobState::Pending,
                JobState::Extracting,
                JobState::Evaluating,
                JobState::Annotating,
                JobState::Done
            ]
        );
        assert!(manager.result(id).expect("findings").is_empty());
        let artifact = manager.artifact(id).expect("artifact");
        let annotated = lopdf::Document::load_mem(&artifact).expect("annotated pdf");
        assert_eq!(annotated.get_pages().len(), 9);
        assert!(manager.report(id).expect("report").passed());
        assert_eq!(job.document_hash, fingerprint(&fixtures::thesis_pdf()));
    }

    #[tokio::test]
    async fn missing_section_is_reported_with_summary_page() {
        let mut pages = fixtures::thesis_pages();
        pages.remove(1);
        let manager = manager();
        let id = manager.submit(fixtures::build(&pages));
        manager.wait(id).await.expect("wait");

        let findings = manager.result(id).expect("findings");
        assert_eq!(findings[0].rule_id, "section.declaration");
        assert_eq!(findings[0].severity, Severity::Critical);
        let artifact = manager.artifact(id).expect("artifact");
        let annotated = lopdf::Document::load_mem(&artifact).expect("annotated pdf");
        assert_eq!(annotated.get_pages().len(), pages.len() + 1);

        let report = manager.report(id).expect("report");
        assert_eq!(report.counts.critical, 1);
        assert!(!report.pages.iter().any(|p| p.role == PageRole::Declaration));
    }

    #[tokio::test]
    async fn encrypted_document_fails_without_outputs() {
        let manager = manager();
        let id = manager.submit(fixtures::encrypted_pdf());
        let job = manager.wait(id).await.expect("wait");

        assert_eq!(job.state, JobState::Failed);
        let failure = job.failure.expect("failure");
        assert_eq!(failure.kind, FailureKind::Encrypted);
        assert_eq!(failure.reason, "document is encrypted and requires a password");
        assert!(!failure.suggestion.is_empty());
        assert!(job.findings.is_none());
        assert!(job.artifact.is_none());
        assert_eq!(
            manager.result(id),
            Err(JobError::NotReady {
                id,
                state: JobState::Failed
            })
        );
        assert!(manager.artifact(id).is_err());
    }

    #[tokio::test]
    async fn garbage_input_is_unreadable() {
        let manager = manager();
        let id = manager.submit(b"this is not a pdf".to_vec());
        let job = manager.wait(id).await.expect("wait");
        let failure = job.failure.expect("failure");
        assert_eq!(failure.kind, FailureKind::Unreadable);
        assert!(failure.reason.starts_with("document is unreadable"));
        assert_eq!(
            job.transitions.last().map(|t| t.state),
            Some(JobState::Failed)
        );
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let manager = manager();
        let id = JobId::new();
        assert_eq!(manager.status(id), Err(JobError::NotFound(id)));
        assert!(matches!(manager.wait(id).await, Err(JobError::NotFound(_))));
    }

    #[tokio::test]
    async fn pending_job_is_not_ready() {
        let config = TechcheckConfig::default();
        let manager = JobManager::with_pipeline(Pipeline::new(&config), config.jobs.clone());
        // Hold every slot so the job cannot leave PENDING.
        let held = Arc::clone(&manager.inner.slots)
            .acquire_many_owned(config.jobs.worker_slots as u32)
            .await
            .expect("slots");
        let id = manager.submit(fixtures::thesis_pdf());
        tokio::task::yield_now().await;

        assert_eq!(manager.status(id), Ok(JobState::Pending));
        assert_eq!(
            manager.artifact(id),
            Err(JobError::NotReady {
                id,
                state: JobState::Pending
            })
        );
        drop(held);
        assert_eq!(manager.wait(id).await.expect("wait").state, JobState::Done);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_jobs_all_finish() {
        let config = TechcheckConfig::default();
        let jobs = JobConfig {
            worker_slots: 2,
            ..JobConfig::default()
        };
        let manager = JobManager::with_pipeline(Pipeline::new(&config), jobs);
        let bad = FixturePage::body("Kratko besedilo.");
        let ids: Vec<JobId> = (0..6)
            .map(|i| {
                if i % 3 == 0 {
                    manager.submit(fixtures::build(std::slice::from_ref(&bad)))
                } else {
                    manager.submit(fixtures::thesis_pdf())
                }
            })
            .collect();

        for id in &ids {
            let job = manager.wait(*id).await.expect("wait");
            assert_eq!(job.state, JobState::Done);
        }
        assert_eq!(manager.len(), 6);
        assert!(!manager.result(ids[0]).expect("findings").is_empty());
        assert!(manager.result(ids[1]).expect("findings").is_empty());
    }

    #[tokio::test]
    async fn expired_jobs_are_evicted() {
        let manager = manager();
        let id = manager.submit(fixtures::thesis_pdf());
        let job = manager.wait(id).await.expect("wait");
        let finished = job.finished_at().expect("finished");

        assert_eq!(manager.evict_expired(finished), 0);
        assert_eq!(manager.status(id), Ok(JobState::Done));

        let later = finished + chrono::Duration::seconds(3601);
        assert_eq!(manager.evict_expired(later), 1);
        assert_eq!(manager.status(id), Err(JobError::NotFound(id)));
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn eviction_task_stops_with_the_manager() {
        let manager = JobManager::with_pipeline(
            Pipeline::default(),
            JobConfig {
                retention_secs: 0,
                eviction_interval_secs: 1,
                worker_slots: 1,
            },
        );
        let handle = manager.spawn_eviction();
        let id = manager.submit(fixtures::thesis_pdf());
        manager.wait(id).await.expect("wait");
        drop(manager);
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("eviction task ended")
            .expect("no panic");
    }
}
