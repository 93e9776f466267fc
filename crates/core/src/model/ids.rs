use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[must_use]
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self::new(raw)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err(ParseIdError {
                        kind: stringify!($name),
                    });
                }
                Ok(Self::new(trimmed))
            }
        }
    };
}

string_id! {
    /// Identifier of a stage within a course.
    StageId
}

string_id! {
    /// Identifier of a video entry inside a video stage.
    VideoId
}

string_id! {
    /// Identifier of a file attached to a video entry.
    AttachmentId
}

string_id! {
    /// Identifier of a quiz question. Answers are keyed by it.
    QuestionId
}

/// Error type for parsing an id from user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: &'static str,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} cannot be blank", self.kind)
    }
}

impl std::error::Error for ParseIdError {}

// ─── Id minting ────────────────────────────────────────────────────────────────

/// Mints fresh identifiers for stages and their children.
///
/// `Random` is the production choice. `Sequential` yields `stage-1`,
/// `stage-2`, ... so tests can predict ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum IdGenerator {
    #[default]
    Random,
    Sequential(u64),
}

impl IdGenerator {
    #[must_use]
    pub fn sequential() -> Self {
        Self::Sequential(0)
    }

    fn mint(&mut self, prefix: &str) -> String {
        match self {
            IdGenerator::Random => format!("{prefix}-{}", Uuid::new_v4().simple()),
            IdGenerator::Sequential(counter) => {
                *counter += 1;
                format!("{prefix}-{counter}")
            }
        }
    }

    pub fn stage_id(&mut self) -> StageId {
        StageId::new(self.mint("stage"))
    }

    pub fn video_id(&mut self) -> VideoId {
        VideoId::new(self.mint("video"))
    }

    pub fn attachment_id(&mut self) -> AttachmentId {
        AttachmentId::new(self.mint("file"))
    }

    pub fn question_id(&mut self) -> QuestionId {
        QuestionId::new(self.mint("question"))
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
