pub mod draft;
mod ids;
mod seed;
mod snapshot;
mod stage;

pub use draft::{QuestionDraft, StageDraft, TestStageDraft, VideoEntryDraft, VideoStageDraft};
pub use ids::{AttachmentId, IdGenerator, ParseIdError, QuestionId, StageId, VideoId};
pub use seed::seed_course;
pub use snapshot::{AnswerMap, DocumentError, ExportDocument, Snapshot, import_document};
pub use stage::{
    Attachment, MIN_OPTIONS, Question, Stage, StageKind, StageValidationError, TestStage,
    VideoEntry, VideoStage, validate_stages,
};
