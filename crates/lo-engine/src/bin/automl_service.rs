use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use lo_data::DatasetLoader;
use lo_engine::{ServiceConfig, TrainingOrchestrator};
use lo_types::{BackendKind, ProblemType, TrainingConfig};
use tracing_subscriber::EnvFilter;

/// Train one model on a CSV or JSON dataset and print its result as JSON.
#[derive(Parser, Debug)]
#[command(name = "lo-automl", version, about = "LuminaOps AutoML training")]
struct Cli {
    /// Dataset file (.csv or .json)
    data: PathBuf,

    /// Column to predict
    target: String,

    /// classification or regression
    #[arg(short, long, default_value = "classification")]
    problem_type: ProblemType,

    /// meta_search, gbt_a, gbt_b or gbt_c
    #[arg(short, long, default_value = "meta_search")]
    backend: BackendKind,

    /// Number of search trials
    #[arg(long)]
    trials: Option<usize>,

    /// Search time budget in seconds
    #[arg(long)]
    time_budget: Option<u64>,

    /// Id to register and persist the model under
    #[arg(long)]
    model_id: Option<String>,
}

impl Cli {
    fn training_config(&self) -> TrainingConfig {
        let mut config = TrainingConfig::new(self.problem_type).with_backend(self.backend);
        if let Some(trials) = self.trials {
            config = config.with_trial_count(trials);
        }
        if let Some(secs) = self.time_budget {
            config = config.with_time_budget_secs(secs);
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let dataset = DatasetLoader::new()
        .load_file(&cli.data)
        .await
        .with_context(|| format!("failed to load {}", cli.data.display()))?;

    let service = ServiceConfig::from_env()?;
    let orchestrator = TrainingOrchestrator::new(&service)?;

    let config = cli.training_config();
    let result = orchestrator
        .train(dataset, &cli.target, config, cli.model_id.clone())
        .await?;
    orchestrator.shutdown().await;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_apply_when_only_positionals_are_given() {
        let cli = Cli::try_parse_from(["lo-automl", "churn.csv", "churn"]).unwrap();
        assert_eq!(cli.data, PathBuf::from("churn.csv"));
        assert_eq!(cli.target, "churn");

        let config = cli.training_config();
        let defaults = TrainingConfig::new(ProblemType::Classification);
        assert_eq!(config.problem_type, ProblemType::Classification);
        assert_eq!(config.backend, BackendKind::MetaSearch);
        assert_eq!(config.trial_count, defaults.trial_count);
        assert_eq!(config.time_budget_secs, defaults.time_budget_secs);
    }

    #[test]
    fn flags_override_the_training_config() {
        let cli = Cli::try_parse_from([
            "lo-automl",
            "houses.json",
            "price",
            "--problem-type",
            "regression",
            "--backend",
            "gbt_b",
            "--trials",
            "12",
            "--time-budget",
            "30",
            "--model-id",
            "houses_v2",
        ])
        .unwrap();

        let config = cli.training_config();
        assert_eq!(config.problem_type, ProblemType::Regression);
        assert_eq!(config.backend, BackendKind::GbtB);
        assert_eq!(config.trial_count, 12);
        assert_eq!(config.time_budget_secs, 30);
        assert_eq!(cli.model_id.as_deref(), Some("houses_v2"));
    }

    #[test]
    fn bad_values_are_usage_errors() {
        assert!(Cli::try_parse_from(["lo-automl", "data.csv"]).is_err());
        assert!(Cli::try_parse_from(["lo-automl", "data.csv", "y", "--backend", "svm"]).is_err());
        assert!(Cli::try_parse_from(["lo-automl", "data.csv", "y", "--problem-type", "ranking"]).is_err());
        assert!(Cli::try_parse_from(["lo-automl", "data.csv", "y", "--trials", "many"]).is_err());
    }
}
