#![forbid(unsafe_code)]

pub mod embed;
pub mod model;
pub mod position;
pub mod quiz;
pub mod time;

pub use position::PositionTracker;
pub use quiz::{AnswerFeedback, QuizSession, score, stage_result};
pub use time::Clock;
