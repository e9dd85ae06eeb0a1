mod db;
mod types;

pub use db::DatabaseManager;
pub use types::{JobStatus, Meeting, MeetingSnapshot, MeetingSummary, NewMeeting, RecordingKind};
