//! Background transcode jobs: explicit per-key state, persisted status
//! markers and the supervisor that launches at most one job per key.

mod state;
mod supervisor;

pub use state::{
    playlist_is_complete, read_status, write_status, JobRecord, JobState, Phase, ENDLIST_TAG,
    INTERRUPTED,
};
pub use supervisor::{JobSupervisor, SupervisorOptions};
