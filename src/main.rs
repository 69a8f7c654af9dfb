//! # Exam Forge CLI (`forge`)
//!
//! ```bash
//! forge --config ./config/forge.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `forge init` | Create the SQLite database and schema |
//! | `forge ingest exams` | Index parsed exam questions |
//! | `forge ingest lectures` | Chunk, tag and index lecture notes |
//! | `forge search "<query>"` | Semantic search with metadata filters |
//! | `forge generate exams` | Generate exam-style questions from past exams |
//! | `forge generate theory` | Generate multiple-choice questions from lectures |
//! | `forge reshuffle` | Re-randomize answer order in theory artifacts |
//! | `forge stats` | Index and output overview |
//!
//! Diagnostics go through `tracing`; set `RUST_LOG=exam_forge=debug` for
//! detail. A `.env` file in the working directory is loaded on startup.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use exam_forge::config;
use exam_forge::generate_cmd::{self, GenerateArgs, JobKind};
use exam_forge::progress::ProgressMode;
use exam_forge::search::{self, Collection, SearchArgs};
use exam_forge::{ingest, migrate, stats};
use exam_forge_core::filter::{ExamFilters, LectureFilters};

/// Exam Forge: retrieval-driven bulk generation of exam questions.
#[derive(Parser)]
#[command(
    name = "forge",
    about = "Exam Forge: index past exams and lecture notes, then generate new questions from them",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/forge.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Load source material into the vector index.
    Ingest {
        #[command(subcommand)]
        target: IngestTarget,
    },

    /// Semantic search over past exams or lecture notes.
    Search {
        /// The search query.
        query: String,

        /// Collection to search: `exams` or `lectures`.
        #[arg(long, default_value = "exams")]
        collection: String,

        /// Number of results (defaults to `retrieval.search_results`).
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Question type: MultipleChoice, Open, CodeAnalysis.
        #[arg(long = "type")]
        question_type: Option<String>,

        /// Difficulty: Easy, Medium, Hard. Also used for `--generate` on lectures.
        #[arg(long)]
        difficulty: Option<String>,

        /// Exam year.
        #[arg(long)]
        year: Option<i64>,

        /// Topic substring, matched against the comma-joined topic list.
        #[arg(long)]
        topic: Option<String>,

        /// Only questions with an official solution.
        #[arg(long)]
        has_solution: bool,

        /// Only questions containing code.
        #[arg(long)]
        has_code: bool,

        /// Lecture subject: Virtualization, Concurrency, File Systems, Disks.
        #[arg(long)]
        subject: Option<String>,

        /// Lecture number.
        #[arg(long)]
        lecture: Option<i64>,

        /// Fall back to fewer filters when too few results match.
        #[arg(long)]
        relax: bool,

        /// Print stored question JSON (exams) or chunk text (lectures).
        #[arg(long)]
        raw: bool,

        /// Generate one new question from the results.
        #[arg(long)]
        generate: bool,
    },

    /// Run a resumable batch generation job.
    Generate {
        #[command(subcommand)]
        job: GenerateJob,
    },

    /// Reshuffle answer options of every generated theory question.
    Reshuffle,

    /// Show index and output statistics.
    Stats,
}

#[derive(Subcommand)]
enum IngestTarget {
    /// Parsed exam JSON files (default: every `*.json` in `sources.exams_dir`).
    Exams {
        /// Specific files to ingest.
        files: Vec<PathBuf>,

        /// Delete the collection before ingesting.
        #[arg(long)]
        reset: bool,
    },
    /// Lecture notes named `<N>.txt` in `sources.lectures_dir`.
    Lectures {
        /// Delete the collection before ingesting.
        #[arg(long)]
        reset: bool,
    },
}

#[derive(clap::Args)]
struct GenerateFlags {
    /// Skip items whose artifact already exists and is valid JSON.
    #[arg(long)]
    resume: bool,

    /// Print the plan distribution without generating anything.
    #[arg(long)]
    dry_run: bool,

    /// Only process the first N plan items.
    #[arg(long)]
    limit: Option<usize>,

    /// Progress output: `human`, `json`, or `off` (default: human on a TTY).
    #[arg(long)]
    progress: Option<String>,
}

#[derive(Subcommand)]
enum GenerateJob {
    /// Exam-style questions grounded in past exam questions.
    Exams(GenerateFlags),
    /// Multiple-choice theory questions grounded in lecture notes.
    Theory(GenerateFlags),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { target } => match target {
            IngestTarget::Exams { files, reset } => {
                ingest::run_ingest_exams(&cfg, files, reset).await?;
            }
            IngestTarget::Lectures { reset } => {
                ingest::run_ingest_lectures(&cfg, reset).await?;
            }
        },
        Commands::Search {
            query,
            collection,
            limit,
            question_type,
            difficulty,
            year,
            topic,
            has_solution,
            has_code,
            subject,
            lecture,
            relax,
            raw,
            generate,
        } => {
            let collection = Collection::parse(&collection)?;
            let args = SearchArgs {
                limit,
                exam: ExamFilters {
                    question_type,
                    difficulty,
                    year,
                    topic,
                    has_solution: has_solution.then_some(true),
                    has_code: has_code.then_some(true),
                },
                lecture: LectureFilters {
                    subject,
                    lecture_number: lecture,
                },
                relax,
                raw,
                generate,
            };
            search::run_search(&cfg, &query, collection, &args).await?;
        }
        Commands::Generate { job } => {
            let (kind, flags) = match job {
                GenerateJob::Exams(flags) => (JobKind::Exams, flags),
                GenerateJob::Theory(flags) => (JobKind::Theory, flags),
            };
            let args = GenerateArgs {
                resume: flags.resume,
                dry_run: flags.dry_run,
                limit: flags.limit,
                progress: ProgressMode::from_flag(flags.progress.as_deref())?,
            };
            generate_cmd::run_generate(&cfg, kind, args).await?;
        }
        Commands::Reshuffle => {
            generate_cmd::run_reshuffle(&cfg)?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
