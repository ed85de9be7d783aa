/// Entity identifiers are UUIDs (v4).
pub type ProjectId = uuid::Uuid;
pub type ScriptId = uuid::Uuid;
pub type VideoId = uuid::Uuid;
pub type JobId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
