mod backup;
mod editor;
mod progress;
mod session;
mod stage_store;

// Public API of the course subsystem.
pub use backup::BackupManager;
pub use editor::{DraftMode, StageEditor};
pub use progress::CourseProgress;
pub use session::{CourseSession, CourseSessionConfig};
pub use stage_store::{StageSource, StageStore};
