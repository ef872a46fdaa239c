//! Job states and the persisted status marker.

use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use hlscache_common::Result;
use serde::{Deserialize, Serialize};

/// Terminal tag of a finished HLS playlist.
pub const ENDLIST_TAG: &str = "#EXT-X-ENDLIST";

/// Reason recorded for a job that was running when the process stopped.
pub const INTERRUPTED: &str = "interrupted";

/// Lifecycle of the transcode job for one cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    NotStarted,
    Running,
    Done,
    Failed(String),
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done | JobState::Failed(_))
    }

    pub fn phase(&self) -> Phase {
        match self {
            JobState::NotStarted => Phase::NotStarted,
            JobState::Running => Phase::Running,
            JobState::Done => Phase::Done,
            JobState::Failed(_) => Phase::Failed,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            JobState::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Serialized name of a [`JobState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    NotStarted,
    Running,
    Done,
    Failed,
}

/// Contents of `<key>.dat.status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub state: Phase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    /// Source duration reported by the probe.
    #[serde(default)]
    pub duration_secs: Option<f64>,
}

impl JobRecord {
    pub fn running(started_at: DateTime<Utc>) -> Self {
        Self {
            state: Phase::Running,
            error: None,
            started_at: Some(started_at),
            finished_at: None,
            duration_secs: None,
        }
    }

    /// A record for a job that has already settled.
    pub fn settled(state: &JobState) -> Self {
        Self {
            state: state.phase(),
            error: state.error().map(str::to_string),
            started_at: None,
            finished_at: Some(Utc::now()),
            duration_secs: None,
        }
    }

    pub fn job_state(&self) -> JobState {
        match self.state {
            Phase::NotStarted => JobState::NotStarted,
            Phase::Running => JobState::Running,
            Phase::Done => JobState::Done,
            Phase::Failed => {
                JobState::Failed(self.error.clone().unwrap_or_else(|| "unknown error".into()))
            }
        }
    }

    /// Move to a terminal state.
    pub fn finish(&mut self, state: &JobState) {
        self.state = state.phase();
        self.error = state.error().map(str::to_string);
        self.finished_at = Some(Utc::now());
    }
}

/// Read a status marker. `Ok(None)` when absent or unreadable as JSON.
pub fn read_status(path: &Path) -> Result<Option<JobRecord>> {
    let raw = match std::fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    match serde_json::from_slice(&raw) {
        Ok(record) => Ok(Some(record)),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring corrupt status marker");
            Ok(None)
        }
    }
}

/// Write a status marker via a temporary file and rename.
pub fn write_status(path: &Path, record: &JobRecord) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| hlscache_common::Error::internal("status path has no parent"))?;
    let mut tmp = tempfile::Builder::new()
        .prefix(crate::cache::TEMP_PREFIX)
        .tempfile_in(dir)?;
    serde_json::to_writer(&mut tmp, record)
        .map_err(|e| hlscache_common::Error::internal(format!("failed to encode status: {e}")))?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Whether a playlist file carries the terminal tag.
pub fn playlist_is_complete(path: &Path) -> bool {
    std::fs::read_to_string(path)
        .map(|content| content.lines().any(|line| line.trim() == ENDLIST_TAG))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_round_trips_through_marker() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vid.dat.status");
        assert_eq!(read_status(&path).unwrap(), None);

        let mut record = JobRecord::running(Utc::now());
        record.duration_secs = Some(42.5);
        write_status(&path, &record).unwrap();
        assert_eq!(read_status(&path).unwrap(), Some(record.clone()));

        record.finish(&JobState::Failed("exit 1".into()));
        write_status(&path, &record).unwrap();
        let read = read_status(&path).unwrap().unwrap();
        assert_eq!(read.job_state(), JobState::Failed("exit 1".into()));
        assert!(read.finished_at.is_some());
    }

    #[test]
    fn marker_json_shape() {
        let record = JobRecord::settled(&JobState::Done);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["state"], "done");
        assert!(json.get("error").is_none());

        let failed = JobRecord::settled(&JobState::Failed(INTERRUPTED.into()));
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["error"], "interrupted");
    }

    #[test]
    fn corrupt_marker_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vid.dat.status");
        std::fs::write(&path, b"{not json").unwrap();
        assert_eq!(read_status(&path).unwrap(), None);
    }

    #[test]
    fn playlist_completion() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.m3u8");
        assert!(!playlist_is_complete(&path));
        std::fs::write(&path, "#EXTM3U\n#EXTINF:10.0,\n000.ts\n").unwrap();
        assert!(!playlist_is_complete(&path));
        std::fs::write(&path, "#EXTM3U\n#EXTINF:10.0,\n000.ts\n#EXT-X-ENDLIST\n").unwrap();
        assert!(playlist_is_complete(&path));
    }

    #[test]
    fn terminal_states() {
        assert!(!JobState::NotStarted.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(JobState::Done.is_terminal());
        assert!(JobState::Failed("x".into()).is_terminal());
    }
}
