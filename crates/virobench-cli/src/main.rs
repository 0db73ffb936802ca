//! Command-line few-shot exam runner.

use std::env;
use std::path::PathBuf;

use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use virobench_core::error::ConfigError;
use virobench_core::model::CallOptions;
use virobench_eval::corpus::{load_few_shot, load_test_set};
use virobench_eval::harness::{Harness, prepare_messages};
use virobench_eval::runner::EvalRunner;
use virobench_llm::factory::create_chat_model;
use virobench_llm::provider::Provider;

#[derive(Parser)]
#[command(name = "virobench")]
#[command(about = "Few-shot multiple-choice exam runner for chat models")]
#[command(version)]
struct Cli {
    /// CSV of worked examples asked before every test question
    #[arg(long, default_value = "data/fewshot.csv")]
    few_shot: PathBuf,

    /// CSV of test questions to score
    #[arg(long, default_value = "data/test.csv")]
    test_set: PathBuf,

    /// Backend to query: openai or claude
    #[arg(short, long, default_value = "openai")]
    provider: String,

    /// Model identifier (defaults to the provider's standard model)
    #[arg(short, long)]
    model: Option<String>,

    /// Sampling temperature
    #[arg(long, default_value_t = 0.0)]
    temperature: f64,

    /// Completion token budget per question
    #[arg(long, default_value_t = 1024)]
    max_tokens: u32,

    /// Extra attempts after transient backend failures
    #[arg(long, default_value_t = 2)]
    max_retries: u32,

    /// Seed for option shuffling (random when omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Write the full JSON report here
    #[arg(long)]
    report: Option<PathBuf>,

    /// Print the assembled transcript for the first test question and exit
    /// without calling any backend
    #[arg(long)]
    dry_run: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("virobench_eval=debug,virobench_llm=debug,info")
        } else {
            EnvFilter::new("virobench_eval=info,warn")
        }
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let provider: Provider = cli.provider.parse()?;
    let model_id = cli
        .model
        .clone()
        .unwrap_or_else(|| provider.default_model().to_string());

    let mut rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let fewshot = load_few_shot(&cli.few_shot, &mut rng)?;
    let tests = load_test_set(&cli.test_set, &mut rng)?;

    info!(
        provider = %provider,
        model = %model_id,
        few_shot = fewshot.len(),
        tests = tests.len(),
        "loaded corpus"
    );

    if tests.is_empty() {
        eprintln!("Error: no test questions in {}", cli.test_set.display());
        std::process::exit(1);
    }

    if cli.dry_run {
        let messages = prepare_messages(&fewshot, &tests[0])?;
        println!(
            "=== Transcript for {model_id} ({} test questions total) ===",
            tests.len()
        );
        for message in &messages {
            println!("\n[{}]\n{}", message.role(), message.content());
        }
        return Ok(());
    }

    // The only place a credential is read; backends receive it explicitly.
    let api_key = env::var(provider.api_key_env())
        .map_err(|_| ConfigError::MissingApiKey(provider.api_key_env().to_string()))?;

    let model = create_chat_model(&provider, api_key, model_id);
    let harness = Harness::new(model)
        .with_options(CallOptions {
            max_tokens: Some(cli.max_tokens),
            temperature: Some(cli.temperature),
        })
        .with_max_retries(cli.max_retries);

    let runner = EvalRunner::new(harness);
    let report = runner.run(&fewshot, &tests).await?;

    if let Some(path) = &cli.report {
        std::fs::write(path, report.to_json()?)?;
        println!("Report written to: {}", path.display());
    }

    println!(
        "Accuracy: {}/{} = {:.6}",
        report.correct, report.total, report.accuracy
    );
    Ok(())
}
