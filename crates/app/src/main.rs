use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use services::{AppServices, Clock};
use showfarm_core::model::{CourseId, LearnerId, LessonId, LessonRef, ModuleId};
use tracing_subscriber::EnvFilter;

mod quiz_runner;

const DEFAULT_DB_URL: &str = "sqlite://showfarm.sqlite3";
const DEFAULT_LEARNER: &str = "learner";
const DEFAULT_HISTORY_LIMIT: u32 = 10;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    InvalidValue { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidValue { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
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

fn parse_value<T: FromStr>(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<T, ArgsError> {
    let raw = require_value(args, flag)?;
    raw.trim()
        .parse()
        .map_err(|_| ArgsError::InvalidValue { flag, raw })
}

fn required<T>(value: Option<T>, flag: &'static str) -> Result<T, ArgsError> {
    value.ok_or(ArgsError::MissingFlag { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- quiz     --file <quiz.json> --course <id> --module <id> [--db <sqlite_url>] [--learner <id>]");
    eprintln!("  cargo run -p app -- history  --lesson <id> [--limit <n>] [--db <sqlite_url>] [--learner <id>]");
    eprintln!("  cargo run -p app -- progress --course <id> --lessons <n> [--db <sqlite_url>] [--learner <id>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db {DEFAULT_DB_URL}");
    eprintln!("  --learner {DEFAULT_LEARNER}");
    eprintln!("  --limit {DEFAULT_HISTORY_LIMIT}");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  SHOWFARM_DB_URL, SHOWFARM_LEARNER, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Quiz,
    History,
    Progress,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "quiz" => Some(Self::Quiz),
            "history" => Some(Self::History),
            "progress" => Some(Self::Progress),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct Args {
    db_url: String,
    learner: LearnerId,
    file: Option<PathBuf>,
    course_id: Option<CourseId>,
    module_id: Option<ModuleId>,
    lesson_id: Option<LessonId>,
    total_lessons: Option<usize>,
    limit: u32,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut parsed = Self::from_env();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    parsed.db_url = normalize_sqlite_url(value);
                }
                "--learner" => {
                    let value = require_value(args, "--learner")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidValue {
                            flag: "--learner",
                            raw: value,
                        });
                    }
                    parsed.learner = LearnerId::new(value.trim());
                }
                "--file" => parsed.file = Some(PathBuf::from(require_value(args, "--file")?)),
                "--course" => parsed.course_id = Some(parse_value(args, "--course")?),
                "--module" => parsed.module_id = Some(parse_value(args, "--module")?),
                "--lesson" => parsed.lesson_id = Some(parse_value(args, "--lesson")?),
                "--lessons" => parsed.total_lessons = Some(parse_value(args, "--lessons")?),
                "--limit" => parsed.limit = parse_value(args, "--limit")?,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(parsed)
    }

    fn from_env() -> Self {
        let db_url = std::env::var("SHOWFARM_DB_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map_or_else(|| DEFAULT_DB_URL.into(), normalize_sqlite_url);
        let learner = std::env::var("SHOWFARM_LEARNER")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map_or_else(|| LearnerId::new(DEFAULT_LEARNER), |v| LearnerId::new(v.trim()));

        Self {
            db_url,
            learner,
            file: None,
            course_id: None,
            module_id: None,
            lesson_id: None,
            total_lessons: None,
            limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None | Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    let mut iter = argv.into_iter().skip(1);
    let parsed = Args::parse(&mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite at startup so services never touch the filesystem.
    prepare_sqlite_file(&parsed.db_url)?;
    let app = AppServices::new_sqlite(&parsed.db_url, Clock::default_clock()).await?;
    tracing::debug!(db_url = %parsed.db_url, learner = %parsed.learner, ?cmd, "app services ready");

    match cmd {
        Command::Quiz => {
            let file = required(parsed.file, "--file")?;
            let course_id = required(parsed.course_id, "--course")?;
            let module_id = required(parsed.module_id, "--module")?;
            let quiz = services::content::load_quiz_file(&file)?;
            let lesson = LessonRef::new(course_id, module_id, quiz.lesson_id());
            quiz_runner::run_quiz(&app, parsed.learner, lesson, &quiz).await
        }
        Command::History => {
            let lesson_id = required(parsed.lesson_id, "--lesson")?;
            print_history(&app, &parsed.learner, lesson_id, parsed.limit).await
        }
        Command::Progress => {
            let course_id = required(parsed.course_id, "--course")?;
            let total_lessons = required(parsed.total_lessons, "--lessons")?;
            print_progress(&app, &parsed.learner, course_id, total_lessons).await
        }
    }
}

async fn print_history(
    app: &AppServices,
    learner: &LearnerId,
    lesson_id: LessonId,
    limit: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let history = app.history();
    let items = history.list_attempts(learner, lesson_id, limit).await?;
    if items.is_empty() {
        println!("No attempts for lesson {lesson_id} by {learner}.");
        return Ok(());
    }

    println!("Attempts for lesson {lesson_id} by {learner} (newest first):");
    for item in &items {
        println!(
            "  #{:<4} {}  {:>3}%  {}/{}  {:>4}s  {}{}",
            item.id,
            item.submitted_at.format("%Y-%m-%d %H:%M"),
            item.score_percent,
            item.correct,
            item.total,
            item.time_taken_seconds,
            if item.passed { "passed" } else { "failed" },
            if item.timed_out { " (timed out)" } else { "" },
        );
    }

    let total = history.attempt_count(learner, lesson_id).await?;
    if let Some(best) = history.best_attempt(learner, lesson_id).await? {
        println!("Best: {}% over {total} attempt(s).", best.score_percent);
    }
    Ok(())
}

async fn print_progress(
    app: &AppServices,
    learner: &LearnerId,
    course_id: CourseId,
    total_lessons: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let progress = app
        .progress()
        .summary(learner, course_id, total_lessons)
        .await?;
    println!(
        "Course {course_id}: {}/{} lessons complete ({}%).",
        progress.completed_lessons.len(),
        progress.total_lessons,
        progress.percent_complete,
    );
    for lesson in &progress.completed_lessons {
        println!("  module {} lesson {}", lesson.module_id, lesson.lesson_id);
    }
    if progress.is_complete() {
        println!("Course finished.");
    }
    Ok(())
}

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

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
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

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
