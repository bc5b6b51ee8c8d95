use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use ta_pool::config::SimConfig;
use ta_pool::events::{Event, EventSender};
use ta_pool::pool::GraderPool;
use ta_pool::shutdown::install_shutdown_handler;
use ta_pool::state::SharedState;
use ta_pool::store::{self, RubricStore};

#[derive(Parser, Debug)]
#[command(name = "ta-pool")]
#[command(version)]
#[command(about = "Simulates a pool of TAs concurrently grading a shared exam queue")]
struct Args {
    /// Number of TA workers to spawn
    #[arg(long = "tas", default_value_t = 2)]
    tas: usize,

    /// Directory of exam files, graded in file-name order
    #[arg(long)]
    exams: PathBuf,

    /// Rubric file with one "<question>, <code>" line per question
    #[arg(long)]
    rubric: PathBuf,

    /// Use real mutual exclusion (the default runs deliberately
    /// unsynchronized so races can be observed)
    #[arg(long)]
    sync: bool,

    /// Output format for the final summary
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
}

#[derive(ValueEnum, Clone, Debug)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Serialize)]
struct RunSummary {
    exams_graded: usize,
    rubric_changes: usize,
    questions_marked: usize,
    stopped_by_end_marker: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = SimConfig::new(args.tas, args.sync);
    config.validate()?;

    // Load errors abort the run before any concurrent work begins
    let rubric = store::load_rubric(&args.rubric).await?;
    let exams = store::load_exams(&args.exams).await?;
    tracing::info!(
        exams = exams.len(),
        synchronized = args.sync,
        tas = args.tas,
        "Loaded exam queue"
    );

    let shared = Arc::new(SharedState::new(rubric, exams));
    let (events, mut events_rx) = EventSender::channel();
    let pool = GraderPool::new(config, shared.clone(), RubricStore::new(&args.rubric), events)?;

    let drain = tokio::spawn(async move {
        let mut rubric_changes = 0usize;
        let mut questions_marked = 0usize;
        while let Some(event) = events_rx.recv().await {
            match event {
                Event::RubricChanged { .. } => rubric_changes += 1,
                Event::QuestionMarked { .. } => questions_marked += 1,
            }
        }
        (rubric_changes, questions_marked)
    });

    let cancel = install_shutdown_handler();
    pool.run(cancel).await;

    // Drop the pool's event sender so the drain task sees the channel close
    drop(pool);
    let (rubric_changes, questions_marked) = drain.await?;

    let summary = RunSummary {
        exams_graded: shared.cursor().min(shared.exam_count()),
        rubric_changes,
        questions_marked,
        stopped_by_end_marker: shared.stop_requested(),
    };

    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Table => {
            println!("Exams graded:     {}", summary.exams_graded);
            println!("Rubric changes:   {}", summary.rubric_changes);
            println!("Questions marked: {}", summary.questions_marked);
            println!(
                "Stopped by end marker: {}",
                if summary.stopped_by_end_marker { "yes" } else { "no" }
            );
        }
    }

    Ok(())
}
