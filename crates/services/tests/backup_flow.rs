use std::sync::Arc;

use course_core::model::{QuestionId, Stage, StageId, VideoStage};
use course_core::time::{fixed_clock, fixed_now};
use services::{CourseSession, CourseSessionConfig, CourseSessionError, IdGenerator};
use storage::{InMemoryStore, KeyValueStore, Storage};

fn config() -> CourseSessionConfig {
    CourseSessionConfig::default()
        .with_clock(fixed_clock())
        .with_ids(IdGenerator::sequential())
}

async fn open(kv: &InMemoryStore) -> CourseSession {
    let storage = Storage {
        records: Arc::new(kv.clone()),
    };
    CourseSession::open(&storage, "c", config()).await
}

fn video(title: &str) -> Stage {
    Stage::Video(VideoStage {
        id: StageId::new(""),
        title: title.into(),
        description: String::new(),
        duration_label: String::new(),
        videos: Vec::new(),
    })
}

#[tokio::test]
async fn restore_drops_stages_created_after_the_backup() {
    let kv = InMemoryStore::new();
    let mut session = open(&kv).await;
    let snapshot = session.create_backup().await.unwrap();
    assert_eq!(snapshot.timestamp, fixed_now());
    let before = session.stages().to_vec();

    let created = session.create_stage(video("C")).await;
    assert!(session.restore_from_backup().await);

    assert_eq!(session.stages(), before.as_slice());
    assert!(session.stages().iter().all(|s| s.id() != &created));
}

#[tokio::test]
async fn restore_brings_back_position_and_answers() {
    let kv = InMemoryStore::new();
    let mut session = open(&kv).await;
    session.advance().await;
    session.submit_answer(&QuestionId::new("q1"), 1).await;
    session.create_backup().await.unwrap();

    session.reset().await;
    assert_eq!(session.current_index(), 0);
    assert!(session.restore_from_backup().await);
    assert_eq!(session.current_index(), 1);
    assert_eq!(session.quiz().answer_for(&QuestionId::new("q1")), Some(1));
    assert_eq!(kv.raw("minicourse-c-stage").as_deref(), Some("1"));
}

#[tokio::test]
async fn each_structural_edit_can_be_undone_once() {
    let kv = InMemoryStore::new();
    let mut session = open(&kv).await;
    session.create_stage(video("C")).await;
    let with_c = session.stages().to_vec();
    assert!(session.delete_stage(&StageId::new("1")).await);

    assert!(session.restore_from_backup().await);
    assert_eq!(session.stages(), with_c.as_slice());
}

#[tokio::test]
async fn missing_backup_restores_nothing() {
    let kv = InMemoryStore::new();
    let mut session = open(&kv).await;
    session.advance().await;
    assert!(!session.restore_from_backup().await);
    assert_eq!(session.current_index(), 1);
}

#[tokio::test]
async fn corrupt_backup_leaves_state_untouched() {
    let kv = InMemoryStore::new();
    let mut session = open(&kv).await;
    session.create_stage(video("C")).await;
    kv.set("minicourse-c-backup", "{\"stages\": [").await.unwrap();
    let before = session.stages().to_vec();

    assert!(!session.restore_from_backup().await);
    assert_eq!(session.stages(), before.as_slice());
}

#[tokio::test]
async fn backup_with_inconsistent_stages_is_ignored() {
    let kv = InMemoryStore::new();
    let mut session = open(&kv).await;
    let raw = r#"{
        "stages": [
            { "type": "video", "id": "x", "title": "One" },
            { "type": "video", "id": "x", "title": "Two" }
        ],
        "currentIndex": 0,
        "answers": {},
        "timestamp": 1700000000000
    }"#;
    kv.set("minicourse-c-backup", raw).await.unwrap();
    assert!(!session.restore_from_backup().await);
    assert_eq!(session.stages().len(), 2);
}

#[tokio::test]
async fn lost_backup_write_leaves_the_previous_snapshot() {
    let kv = InMemoryStore::new();
    let mut session = open(&kv).await;
    session.create_backup().await.unwrap();
    let seed = session.stages().to_vec();

    kv.reject_writes_to("minicourse-c-backup");
    session.create_stage(video("C")).await;
    session.create_stage(video("D")).await;
    assert_eq!(session.stages().len(), 4);
    assert!(kv.raw("minicourse-c-data").unwrap().contains("\"D\""));

    let err = session.create_backup().await.unwrap_err();
    assert!(matches!(err, CourseSessionError::Storage(_)));

    kv.accept_all_writes();
    assert!(session.restore_from_backup().await);
    assert_eq!(session.stages(), seed.as_slice());
}

#[tokio::test]
async fn lost_live_write_keeps_memory_authoritative() {
    let kv = InMemoryStore::new();
    let mut session = open(&kv).await;
    kv.reject_writes_to("minicourse-c-data");
    session.create_stage(video("C")).await;
    assert_eq!(session.stages().len(), 3);

    kv.accept_all_writes();
    let reopened = open(&kv).await;
    assert_eq!(reopened.stages().len(), 2);
}
