//! Per-key transcode job supervision.
//!
//! The supervisor owns an in-memory registry of jobs keyed by cache key.
//! Starting a job is decided under the registry entry for that key, so at
//! most one job is ever launched per key no matter how many requests race.
//! The segment directory and a `running` status marker are created before
//! the job is spawned; the job itself runs detached from the request.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use hlscache_av::{Prober, RenditionSettings, TranscodeEngine, TranscodeJob};
use hlscache_common::{CacheKey, Error, Result};
use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::Instrument;

use super::state::{
    playlist_is_complete, read_status, write_status, JobRecord, JobState, Phase, INTERRUPTED,
};
use crate::cache::{CacheLayout, TEMP_PREFIX};

/// Reason recorded when the job body panicked.
const PANICKED: &str = "job panicked";

/// Tunables for spawned jobs.
#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    pub job_timeout: Duration,
    pub rendition: RenditionSettings,
}

struct JobHandle {
    state: watch::Receiver<JobState>,
    record: Arc<RwLock<JobRecord>>,
}

impl JobHandle {
    /// Handle for a job that is not running in this process.
    fn settled(record: JobRecord) -> Self {
        let (_tx, rx) = watch::channel(record.job_state());
        Self {
            state: rx,
            record: Arc::new(RwLock::new(record)),
        }
    }

    fn current(&self) -> JobState {
        self.state.borrow().clone()
    }
}

/// Launches and tracks at most one transcode job per cache key.
pub struct JobSupervisor {
    layout: CacheLayout,
    engine: Arc<dyn TranscodeEngine>,
    prober: Arc<dyn Prober>,
    options: SupervisorOptions,
    jobs: DashMap<CacheKey, JobHandle>,
}

impl JobSupervisor {
    pub fn new(
        layout: CacheLayout,
        engine: Arc<dyn TranscodeEngine>,
        prober: Arc<dyn Prober>,
        options: SupervisorOptions,
    ) -> Self {
        Self {
            layout,
            engine,
            prober,
            options,
            jobs: DashMap::new(),
        }
    }

    pub fn layout(&self) -> &CacheLayout {
        &self.layout
    }

    /// Start the job for `key` unless one was already started, returning the
    /// state observed afterwards.
    ///
    /// Never waits for the job. The source must already be materialized.
    pub fn ensure_started(&self, key: &CacheKey) -> Result<JobState> {
        if let Some(handle) = self.jobs.get(key) {
            return Ok(handle.current());
        }
        if self.layout.segment_dir(key).exists() {
            return Ok(self.settle_existing(key)?.job_state());
        }

        let record = Arc::new(RwLock::new(JobRecord::running(Utc::now())));
        let (tx, rx) = watch::channel(JobState::Running);
        match self.jobs.entry(key.clone()) {
            Entry::Occupied(e) => return Ok(e.get().current()),
            Entry::Vacant(e) => {
                e.insert(JobHandle {
                    state: rx,
                    record: record.clone(),
                });
            }
        }

        // The registry entry claims the key; disk work happens outside the
        // shard lock.
        let prepared = std::fs::create_dir_all(self.layout.segment_dir(key))
            .map_err(Error::from)
            .and_then(|()| write_status(&self.layout.status_path(key), &record.read()));
        if let Err(e) = prepared {
            self.jobs.remove(key);
            return Err(e);
        }

        self.spawn_job(key.clone(), tx, record);
        Ok(JobState::Running)
    }

    /// Current state of `key`.
    pub fn state(&self, key: &CacheKey) -> Result<JobState> {
        Ok(self
            .record(key)?
            .map(|r| r.job_state())
            .unwrap_or(JobState::NotStarted))
    }

    /// Snapshot of the job record, `None` if no job was ever started.
    pub fn record(&self, key: &CacheKey) -> Result<Option<JobRecord>> {
        if let Some(handle) = self.jobs.get(key) {
            return Ok(Some(handle.record.read().clone()));
        }
        if !self.layout.segment_dir(key).exists() {
            return Ok(None);
        }
        self.settle_existing(key).map(Some)
    }

    /// Wait until the job for `key` reaches a terminal state.
    ///
    /// Returns immediately with the current state when no job is running.
    pub async fn wait(&self, key: &CacheKey) -> Result<JobState> {
        let rx = self.jobs.get(key).map(|h| h.state.clone());
        let Some(mut rx) = rx else {
            return self.state(key);
        };
        let settled = match rx.wait_for(JobState::is_terminal).await {
            Ok(state) => Some(state.clone()),
            Err(_) => None,
        };
        Ok(settled.unwrap_or_else(|| rx.borrow().clone()))
    }

    /// Remove the playlist, segments and status marker of a settled job so a
    /// later request starts it afresh. The materialized source is kept.
    ///
    /// Artifacts are moved aside while the key is locked and deleted on the
    /// blocking pool afterwards.
    pub async fn invalidate(&self, key: &CacheKey) -> Result<()> {
        let trash = match self.jobs.entry(key.clone()) {
            Entry::Occupied(e) => {
                if e.get().current() == JobState::Running {
                    return Err(Error::Conflict(format!("transcode job for {key} is running")));
                }
                let trash = self.move_artifacts_aside(key)?;
                e.remove();
                trash
            }
            Entry::Vacant(_) => self.move_artifacts_aside(key)?,
        };

        tokio::task::spawn_blocking(move || trash.close())
            .await
            .map_err(|e| Error::internal(format!("cleanup task failed: {e}")))??;

        tracing::info!(cache_key = %key, "Invalidated transcode output");
        Ok(())
    }

    /// Settle every job left `running` by a previous process and write
    /// markers for legacy directories that have none. Also removes stale
    /// temporary files. Returns how many jobs were reset.
    pub fn reconcile_orphans(&self) -> Result<usize> {
        for tmp in self.layout.stale_temp_files()? {
            let removed = if tmp.is_dir() {
                std::fs::remove_dir_all(&tmp)
            } else {
                std::fs::remove_file(&tmp)
            };
            if let Err(e) = removed {
                tracing::warn!(path = %tmp.display(), error = %e, "Failed to remove stale temp file");
            }
        }

        let mut reset = 0;
        for key in self.layout.known_keys()? {
            if self.jobs.contains_key(&key) {
                continue;
            }
            let before = read_status(&self.layout.status_path(&key))?;
            let record = self.recover(&key)?;
            if before.map(|r| r.state) != Some(record.state) {
                reset += 1;
            }
        }
        Ok(reset)
    }

    /// Rebuild a settled record for a key with no live job in this process.
    fn recover(&self, key: &CacheKey) -> Result<JobRecord> {
        let status_path = self.layout.status_path(key);
        let record = match read_status(&status_path)? {
            Some(mut record) if record.state == Phase::Running => {
                tracing::warn!(cache_key = %key, "Transcode job was interrupted");
                record.finish(&JobState::Failed(INTERRUPTED.to_string()));
                record
            }
            Some(record) => return Ok(record),
            None => {
                let state = if playlist_is_complete(&self.layout.playlist_path(key)) {
                    JobState::Done
                } else {
                    JobState::Failed(INTERRUPTED.to_string())
                };
                JobRecord::settled(&state)
            }
        };
        write_status(&status_path, &record)?;
        Ok(record)
    }

    /// Recover a key found on disk and register it as settled, unless a
    /// handle appeared in the meantime.
    fn settle_existing(&self, key: &CacheKey) -> Result<JobRecord> {
        let record = self.recover(key)?;
        let handle = self
            .jobs
            .entry(key.clone())
            .or_insert_with(|| JobHandle::settled(record));
        let record = handle.record.read().clone();
        Ok(record)
    }

    /// Rename the job's artifacts into a fresh temporary directory.
    fn move_artifacts_aside(&self, key: &CacheKey) -> Result<tempfile::TempDir> {
        let trash = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempdir_in(self.layout.root())?;
        for path in [
            self.layout.segment_dir(key),
            self.layout.playlist_path(key),
            self.layout.status_path(key),
        ] {
            let Some(name) = path.file_name() else {
                continue;
            };
            match std::fs::rename(&path, trash.path().join(name)) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(trash)
    }

    fn spawn_job(
        &self,
        key: CacheKey,
        tx: watch::Sender<JobState>,
        record: Arc<RwLock<JobRecord>>,
    ) {
        let job = TranscodeJob {
            source: self.layout.source_path(&key),
            segment_dir: self.layout.segment_dir(&key),
            playlist: self.layout.playlist_path(&key),
            segment_base_url: self
                .options
                .rendition
                .segment_base_url(&key.cache_file_name()),
            timeout: self.options.job_timeout,
        };
        let status_path = self.layout.status_path(&key);
        let engine = self.engine.clone();
        let prober = self.prober.clone();

        let span = tracing::info_span!("transcode", cache_key = %key);
        tokio::spawn(
            async move {
                tracing::info!(engine = engine.name(), "Transcode job started");

                // The body runs in its own task so a panic still settles the key.
                let body = {
                    let record = record.clone();
                    tokio::spawn(
                        async move {
                            run_job(engine.as_ref(), prober.as_ref(), &job, &record).await
                        }
                        .in_current_span(),
                    )
                };
                let state = match body.await {
                    Ok(state) => state,
                    Err(e) if e.is_panic() => JobState::Failed(PANICKED.to_string()),
                    Err(e) => JobState::Failed(format!("job aborted: {e}")),
                };

                match &state {
                    JobState::Done => tracing::info!("Transcode job finished"),
                    JobState::Failed(reason) => {
                        tracing::error!(error = %reason, "Transcode job failed")
                    }
                    _ => {}
                }

                let snapshot = {
                    let mut record = record.write();
                    record.finish(&state);
                    record.clone()
                };
                if let Err(e) = write_status(&status_path, &snapshot) {
                    tracing::error!(error = %e, "Failed to write status marker");
                }
                tx.send_replace(state);
            }
            .instrument(span),
        );
    }
}

/// Probe, then transcode under the job timeout.
async fn run_job(
    engine: &dyn TranscodeEngine,
    prober: &dyn Prober,
    job: &TranscodeJob,
    record: &RwLock<JobRecord>,
) -> JobState {
    match prober.probe(&job.source).await {
        Ok(probe) => {
            if !probe.has_video() {
                return JobState::Failed(
                    Error::Unsupported("no video stream".to_string()).to_string(),
                );
            }
            tracing::debug!(
                duration_secs = probe.duration_secs,
                bit_rate = probe.bit_rate,
                streams = probe.streams.len(),
                "Probed source"
            );
            record.write().duration_secs = probe.duration().map(|d| d.as_secs_f64());
        }
        Err(e) => {
            tracing::warn!(kind = e.kind(), error = %e, "Probe failed, transcoding anyway");
        }
    }

    match tokio::time::timeout(job.timeout, engine.transcode(job)).await {
        Ok(Ok(())) => JobState::Done,
        Ok(Err(e)) => JobState::Failed(e.to_string()),
        Err(_) => JobState::Failed(format!("timed out after {}s", job.timeout.as_secs())),
    }
}
