use std::fmt;
use std::path::{Path, PathBuf};

use course_core::embed::canonical_embed_url;
use course_core::model::{QuestionId, Stage, StageId};
use serde_json::json;
use services::{CourseSession, CourseSessionConfig};
use storage::Storage;
use tracing_subscriber::EnvFilter;

const DEFAULT_DB_URL: &str = "sqlite://course.sqlite3";
const DEFAULT_COURSE_ID: &str = "demo";

#[derive(Debug)]
enum ArgsError {
    MissingCommand,
    MissingValue { flag: &'static str },
    MissingOperand { command: &'static str, operand: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidNumber { raw: String },
    InvalidDbUrl { raw: String },
    InvalidCourseId { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingCommand => write!(f, "no command given"),
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingOperand { command, operand } => {
                write!(f, "{command} requires <{operand}>")
            }
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown command: {cmd}"),
            ArgsError::InvalidNumber { raw } => write!(f, "expected a positive number, got: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidCourseId { raw } => write!(f, "invalid --course value: {raw:?}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- <command> [--db <sqlite_url>] [--course <id>]");
    eprintln!();
    eprintln!("Learner commands:");
    eprintln!("  show [--json]            current stage, progress and score");
    eprintln!("  next | prev | goto <n>   move between stages (n is 1-based)");
    eprintln!("  answer <question> <n>    answer the current test (n is 1-based)");
    eprintln!("  retake                   clear the current test's answers");
    eprintln!();
    eprintln!("Authoring commands:");
    eprintln!("  move <from> <to>         reorder stages (1-based)");
    eprintln!("  delete <stage-id>");
    eprintln!("  export [--out <path>]    write stages as JSON");
    eprintln!("  import <path>            replace stages from an exported file");
    eprintln!("  backup | restore | reset");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db {DEFAULT_DB_URL}");
    eprintln!("  --course {DEFAULT_COURSE_ID}");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  COURSE_DB_URL, COURSE_ID, RUST_LOG");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Show { json: bool },
    Next,
    Prev,
    Goto(usize),
    Answer { question: QuestionId, option: usize },
    Retake,
    Move { from: usize, to: usize },
    Delete(StageId),
    Export { out: Option<PathBuf> },
    Import(PathBuf),
    Backup,
    Restore,
    Reset,
}

struct Args {
    db_url: String,
    course_id: String,
    command: Command,
}

/// Parses a 1-based number from the command line into a 0-based index.
fn parse_position(raw: String) -> Result<usize, ArgsError> {
    raw.parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .ok_or(ArgsError::InvalidNumber { raw })
}

fn operand(
    operands: &mut impl Iterator<Item = String>,
    command: &'static str,
    name: &'static str,
) -> Result<String, ArgsError> {
    operands.next().ok_or(ArgsError::MissingOperand {
        command,
        operand: name,
    })
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("COURSE_DB_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map_or_else(|| DEFAULT_DB_URL.into(), normalize_sqlite_url);
        let mut course_id = std::env::var("COURSE_ID")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_COURSE_ID.into());
        let mut json = false;
        let mut out = None;
        let mut positional = Vec::new();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--course" => {
                    let value = require_value(args, "--course")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidCourseId { raw: value });
                    }
                    course_id = value.trim().to_owned();
                }
                "--out" => out = Some(PathBuf::from(require_value(args, "--out")?)),
                "--json" => json = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ if arg.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ => positional.push(arg),
            }
        }

        let mut operands = positional.into_iter();
        let name = operands.next().ok_or(ArgsError::MissingCommand)?;
        let command = match name.as_str() {
            "show" => Command::Show { json },
            "next" => Command::Next,
            "prev" => Command::Prev,
            "goto" => Command::Goto(parse_position(operand(&mut operands, "goto", "n")?)?),
            "answer" => Command::Answer {
                question: QuestionId::new(operand(&mut operands, "answer", "question")?),
                option: parse_position(operand(&mut operands, "answer", "n")?)?,
            },
            "retake" => Command::Retake,
            "move" => Command::Move {
                from: parse_position(operand(&mut operands, "move", "from")?)?,
                to: parse_position(operand(&mut operands, "move", "to")?)?,
            },
            "delete" => Command::Delete(StageId::new(operand(&mut operands, "delete", "stage-id")?)),
            "export" => Command::Export { out },
            "import" => Command::Import(PathBuf::from(operand(&mut operands, "import", "path")?)),
            "backup" => Command::Backup,
            "restore" => Command::Restore,
            "reset" => Command::Reset,
            _ => return Err(ArgsError::UnknownCommand(name)),
        };
        if let Some(extra) = operands.next() {
            return Err(ArgsError::UnknownArg(extra));
        }

        Ok(Self {
            db_url,
            course_id,
            command,
        })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim();
    let path = Path::new(trimmed.strip_prefix("sqlite:").unwrap_or(trimmed));
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// Creates the database file (and its directory) so sqlx can open it.
fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }
    Ok(())
}

//
// ─── OUTPUT ────────────────────────────────────────────────────────────────────
//

fn print_overview(session: &CourseSession) {
    let progress = session.progress();
    println!(
        "Course {}: stage {}/{} ({}%), score {}%",
        session.course_id(),
        progress.current_stage,
        progress.total_stages,
        progress.percent,
        session.score()
    );
    for (index, stage) in session.stages().iter().enumerate() {
        let marker = if index == session.current_index() { '>' } else { ' ' };
        let kind = match stage {
            Stage::Video(_) => "video",
            Stage::Test(_) => "test",
        };
        println!("{marker} {}. [{kind}] {} ({})", index + 1, stage.title(), stage.id());
    }
}

fn print_current_stage(session: &CourseSession) {
    let Some(stage) = session.current_stage() else {
        println!();
        println!("This course has no stages.");
        return;
    };
    println!();
    match stage {
        Stage::Video(video) => {
            println!("{} [{}]", video.title, video.duration_label);
            if !video.description.is_empty() {
                println!("{}", video.description);
            }
            for entry in &video.videos {
                match entry.source_url.as_deref() {
                    Some(url) => println!("  * {} <{}>", entry.title, canonical_embed_url(url)),
                    None => println!("  * {}", entry.title),
                }
                for file in &entry.attachments {
                    println!("      - {} ({}) {}", file.name, file.mime_type, file.url);
                }
            }
        }
        Stage::Test(test) => {
            let (correct, total) = session.stage_result(&test.id).unwrap_or((0, 0));
            println!("{} ({correct}/{total} correct)", test.title);
            for question in &test.questions {
                let selected = session.quiz().answer_for(&question.id);
                println!("  {} [{}]", question.text, question.id);
                for (index, option) in question.options.iter().enumerate() {
                    let mark = if selected == Some(index) { 'x' } else { ' ' };
                    println!("    ({mark}) {}. {option}", index + 1);
                }
            }
        }
    }
}

fn print_json(session: &CourseSession) -> Result<(), serde_json::Error> {
    let view = json!({
        "courseId": session.course_id(),
        "currentIndex": session.current_index(),
        "progress": session.progress(),
        "score": session.score(),
        "stage": session.current_stage(),
    });
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

async fn answer(
    session: &mut CourseSession,
    question: &QuestionId,
    option: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    if !session.submit_answer(question, option).await {
        let shown = option + 1;
        return Err(format!("{question} has no option {shown} on the current stage").into());
    }
    while session
        .current_question()
        .is_some_and(|q| &q.id != question)
    {
        if !session.next_question() {
            break;
        }
    }
    session.reveal();
    if let Some(feedback) = session.feedback() {
        if feedback.is_correct {
            println!("Correct.");
        } else {
            println!("Incorrect. The answer is: {}", feedback.correct_option);
        }
        if let Some(explanation) = feedback.explanation {
            println!("{explanation}");
        }
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);
    let parsed = Args::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    tracing::debug!(db_url = %parsed.db_url, course_id = %parsed.course_id, command = ?parsed.command, "starting");
    prepare_sqlite_file(&parsed.db_url)?;
    let storage = Storage::sqlite(&parsed.db_url).await?;
    let mut session =
        CourseSession::open(&storage, parsed.course_id, CourseSessionConfig::default()).await;

    match parsed.command {
        Command::Show { json: true } => {
            print_json(&session)?;
            return Ok(());
        }
        Command::Show { json: false } => {}
        Command::Next => {
            if !session.advance().await {
                println!("Already on the last stage.");
            }
        }
        Command::Prev => {
            if !session.retreat().await {
                println!("Already on the first stage.");
            }
        }
        Command::Goto(index) => {
            if index >= session.stages().len() {
                return Err(format!("there is no stage {}", index + 1).into());
            }
            session.jump_to(index).await;
        }
        Command::Answer { question, option } => {
            answer(&mut session, &question, option).await?;
            return Ok(());
        }
        Command::Retake => {
            if !session.retake().await {
                println!("The current stage is not a test.");
            }
        }
        Command::Move { from, to } => {
            if !session.reorder_stages(from, to).await {
                return Err("stage positions out of range".into());
            }
        }
        Command::Delete(id) => {
            if !session.delete_stage(&id).await {
                return Err(format!("no stage with id {id}").into());
            }
        }
        Command::Export { out } => {
            let document = session.export_snapshot();
            let path = out.unwrap_or_else(|| PathBuf::from(document.file_name()));
            std::fs::write(&path, document.to_json()?)?;
            println!("Exported {} stages to {}", document.stages.len(), path.display());
            return Ok(());
        }
        Command::Import(path) => {
            let raw = std::fs::read_to_string(&path)?;
            let count = session.import_stages(&raw).await?;
            println!("Imported {count} stages from {}", path.display());
        }
        Command::Backup => {
            let snapshot = session.create_backup().await?;
            println!("Backup saved at {}", snapshot.timestamp.to_rfc3339());
            return Ok(());
        }
        Command::Restore => {
            if !session.restore_from_backup().await {
                println!("No usable backup.");
                return Ok(());
            }
        }
        Command::Reset => session.reset().await,
    }

    print_overview(&session);
    print_current_stage(&session);
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
