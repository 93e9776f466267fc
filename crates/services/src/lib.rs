#![forbid(unsafe_code)]

pub mod course;
pub mod error;

pub use course_core::Clock;
pub use course_core::model::IdGenerator;

pub use course::{
    BackupManager, CourseProgress, CourseSession, CourseSessionConfig, DraftMode, StageEditor,
    StageSource, StageStore,
};
pub use error::{CourseSessionError, EditorError};
