use crate::model::ids::{QuestionId, StageId, VideoId};
use crate::model::stage::{Question, Stage, TestStage, VideoEntry, VideoStage};

/// Two-stage course installed when nothing usable is persisted.
#[must_use]
pub fn seed_course() -> Vec<Stage> {
    vec![
        Stage::Video(VideoStage {
            id: StageId::new("1"),
            title: "Introduction to quantum mechanics".into(),
            description: "Core principles and concepts of quantum physics".into(),
            duration_label: "15 min".into(),
            videos: vec![VideoEntry {
                id: VideoId::new("v1"),
                title: "Quantum mechanics basics".into(),
                source_url: None,
                attachments: Vec::new(),
            }],
        }),
        Stage::Test(TestStage {
            id: StageId::new("2"),
            title: "Knowledge check: quantum mechanics basics".into(),
            questions: vec![Question {
                id: QuestionId::new("q1"),
                text: "What is a quantum number?".into(),
                options: vec![
                    "The number of electrons in an atom".into(),
                    "A characteristic of an electron's energy state".into(),
                    "The speed of an electron".into(),
                ],
                correct_option_index: 1,
                explanation: Some(
                    "Quantum numbers describe the energy state of an electron in an atom: \
                     they fix the orbital it occupies and its energy."
                        .into(),
                ),
            }],
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::stage::{StageKind, validate_stages};

    #[test]
    fn seed_is_one_video_then_one_test() {
        let stages = seed_course();
        let kinds: Vec<_> = stages.iter().map(Stage::kind).collect();
        assert_eq!(kinds, vec![StageKind::Video, StageKind::Test]);
        assert!(validate_stages(&stages).is_ok());
    }
}
