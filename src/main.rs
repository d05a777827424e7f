use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use responseflow::models::AnswerValue;
use responseflow::{
    parse_submissions_file, AnthropicClient, AnthropicConfig, DeepgramConfig, DeepgramTranscriber,
    InMemoryStore, InterpretationHandler, Pipeline, PipelineConfig, PipelineContext,
    ProcessingSummary, ReportHandler, ScoringHandler, StageHandler, StrategyRegistry,
    SubmissionError, Submission, TranscriptionHandler,
};

#[derive(Parser)]
#[command(name = "responseflow")]
#[command(author, version, about = "Assessment response processing pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run submissions through transcription, interpretation, scoring and reporting
    Process {
        /// Submissions file (JSON object or array)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file for the processing summary (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip report synthesis after scoring
        #[arg(long)]
        no_reports: bool,

        /// Attempts per stage, including the first
        #[arg(long, default_value = "3")]
        max_attempts: u32,

        /// Multiplier applied to every stage delay (0 runs stages back to back)
        #[arg(long, default_value = "1.0")]
        delay_scale: f64,

        /// Give up waiting for responses to settle after this many seconds
        #[arg(long, default_value = "900")]
        timeout_secs: u64,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate and normalize submissions without running any stage
    Validate {
        /// Submissions file (JSON object or array)
        #[arg(short, long)]
        input: PathBuf,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Process {
            input,
            output,
            no_reports,
            max_attempts,
            delay_scale,
            timeout_secs,
            verbose,
        } => {
            setup_logging(verbose);
            let mut config = PipelineConfig::default();
            config.retry.max_attempts = max_attempts.max(1);
            config.delays = config.delays.scaled(delay_scale);
            config.generate_reports = !no_reports;
            process_submissions(input, output, config, Duration::from_secs(timeout_secs)).await
        }
        Commands::Validate { input, verbose } => {
            setup_logging(verbose);
            validate_submissions(input)
        }
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn has_audio(submission: &Submission) -> bool {
    submission
        .answers
        .iter()
        .any(|a| matches!(&a.value, AnswerValue::Audio { audio_url, .. } if !audio_url.trim().is_empty()))
}

async fn process_submissions(
    input: PathBuf,
    output: Option<PathBuf>,
    config: PipelineConfig,
    timeout: Duration,
) -> Result<()> {
    info!("Loading submissions from {:?}", input);
    let submissions = parse_submissions_file(&input).context("Failed to parse submissions")?;
    info!("Loaded {} submission(s)", submissions.len());

    let strategies = StrategyRegistry::new();
    let needs_audio = submissions.iter().any(has_audio);
    let needs_ai = config.generate_reports
        || submissions
            .iter()
            .any(|s| strategies.resolve(s.questionnaire_type()).requires_ai());

    let mut handlers: Vec<Arc<dyn StageHandler>> = vec![Arc::new(ScoringHandler)];
    if needs_audio {
        let transcriber = DeepgramTranscriber::new(DeepgramConfig::from_env()?);
        handlers.push(Arc::new(TranscriptionHandler::new(Arc::new(transcriber))));
    }
    if needs_ai {
        let client = Arc::new(AnthropicClient::new(AnthropicConfig::from_env()?));
        info!("Using model {}", client.model());
        handlers.push(Arc::new(InterpretationHandler::new(client.clone())));
        handlers.push(Arc::new(ReportHandler::new(client)));
    }

    let ctx = PipelineContext::new(Arc::new(InMemoryStore::new())).with_strategies(strategies);
    let pipeline = Pipeline::start(ctx, config, handlers);

    let mut accepted = 0;
    for submission in submissions {
        let campaign_id = submission.campaign_id;
        match pipeline.submit(submission).await {
            Ok(id) => {
                info!("Accepted response {} (campaign {})", id, campaign_id);
                accepted += 1;
            }
            Err(SubmissionError::Rejected(errors)) => {
                warn!("Rejected submission for campaign {}", campaign_id);
                for error in errors {
                    warn!("  {}", error);
                }
            }
            Err(err) => return Err(err).context("Failed to submit response"),
        }
    }

    info!("Waiting for {} response(s) to settle...", accepted);
    if !pipeline.wait_for_settled(timeout).await {
        warn!("Timed out after {:?}; summarizing current state", timeout);
    }

    let records = pipeline.records(None).await?;
    let summary = ProcessingSummary::from_records(&records, Utc::now());

    for (status, count) in pipeline.status_counts(None).await? {
        info!("{}: {}", status, count);
    }
    if let Some(path) = output {
        summary.write_json(&path)?;
        info!("Summary written to {:?}", path);
    }

    info!(
        "Complete: {} response(s), {} without scores",
        summary.total,
        summary.unscored()
    );

    pipeline.shutdown().await;
    Ok(())
}

fn validate_submissions(input: PathBuf) -> Result<()> {
    info!("Validating submissions from {:?}", input);
    let submissions = parse_submissions_file(&input).context("Failed to parse submissions")?;
    let strategies = StrategyRegistry::new();

    let mut rejected = 0;
    for (index, submission) in submissions.iter().enumerate() {
        let strategy = strategies.resolve(submission.questionnaire_type());
        println!(
            "Submission {} ({} -> {} strategy)",
            index,
            submission.questionnaire_type(),
            strategy.kind()
        );
        println!("------------------------------");

        let errors = strategy.validate(&submission.questionnaire, &submission.answers);
        if !errors.is_empty() {
            rejected += 1;
            for error in &errors {
                println!("  error {}", error);
            }
            println!();
            continue;
        }

        for answer in strategy.normalize(&submission.questionnaire, &submission.answers) {
            println!(
                "  {}: {:?}, {} words, {} chars, {} selected",
                answer.question_id,
                answer.shape,
                answer.metadata.word_count,
                answer.metadata.char_count,
                answer.metadata.selected_count
            );
        }
        println!();
    }

    println!(
        "{} of {} submission(s) valid",
        submissions.len() - rejected,
        submissions.len()
    );
    Ok(())
}
