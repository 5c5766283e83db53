use std::{
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{Context, Result};
use clap::Parser;
use serde::de::DeserializeOwned;

use wound_analyzer::{Config, PhotoRecord, SymptomLog, WoundAnalysisError, WoundAnalyzer};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Photo of the wound to analyze
    image: PathBuf,

    /// JSON array of earlier photo records
    #[arg(long)]
    history: Option<PathBuf>,

    /// JSON symptom log to weigh into the infection risk
    #[arg(long)]
    log: Option<PathBuf>,

    #[arg(short, long, default_value_t = 0)]
    wound_id: i64,

    #[command(flatten)]
    config: Config,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let history: Vec<PhotoRecord> = match &cli.history {
        Some(path) => read_json(path)?,
        None => Vec::new(),
    };
    let latest_log: Option<SymptomLog> = cli
        .log
        .as_deref()
        .map(read_json::<SymptomLog>)
        .transpose()?;

    let analyzer = WoundAnalyzer::with_onnx_models(cli.config);
    match analyzer
        .analyze(cli.wound_id, &history, &cli.image, latest_log.as_ref())
        .await
    {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e @ WoundAnalysisError::Input { .. }) => {
            eprintln!("{e}");
            Ok(ExitCode::from(2))
        }
        Err(e) => Err(e).context("Analysis failed"),
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    run(Cli::parse()).await
}
