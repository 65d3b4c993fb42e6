//! Train a classifier from an in-memory JSON table, then predict with it.
//!
//! Run with `RUST_LOG=debug` to see every search trial.

use lo_data::DatasetLoader;
use lo_engine::{ServiceConfig, TrainingOrchestrator};
use lo_types::{BackendKind, ProblemType, TrainingConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let records: Vec<serde_json::Value> = (0..120)
        .map(|i| {
            let age = 20 + (i * 7) % 50;
            let income = 20_000 + (i * 1_337) % 80_000;
            let churn = if age > 45 && income < 60_000 { "yes" } else { "no" };
            serde_json::json!({ "age": age, "income": income, "churn": churn })
        })
        .collect();
    let dataset = DatasetLoader::new().load_json_value(&serde_json::Value::Array(records))?;

    let model_dir = std::env::temp_dir().join("luminaops-basic-usage");
    let orchestrator = TrainingOrchestrator::new(&ServiceConfig::default().with_model_dir(&model_dir))?;

    let config = TrainingConfig::new(ProblemType::Classification)
        .with_backend(BackendKind::MetaSearch)
        .with_trial_count(20)
        .with_time_budget_secs(30);

    let result = orchestrator
        .train(dataset.clone(), "churn", config, Some("churn_demo".to_string()))
        .await?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    let predictions = orchestrator.predict("churn_demo", dataset.take_rows(&[0, 1, 2, 3])).await?;
    println!("first predictions: {}", serde_json::to_string(&predictions)?);

    orchestrator.shutdown().await;
    Ok(())
}
