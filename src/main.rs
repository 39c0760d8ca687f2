use anyhow::Context;
use chrono::Local;
use dotenv::dotenv;

use subscription_scheduler::config::Config;
use subscription_scheduler::services::database::SurrealStore;
use subscription_scheduler::services::subscription::SubscriptionService;
use subscription_scheduler::tasks::processing_task::run_processing_cycle;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env().context("Failed to load configuration")?;

    let store = SurrealStore::connect(&config.database_url)
        .await
        .with_context(|| format!("Failed to open database at {}", config.database_url))?;

    let service = SubscriptionService::new(store, config.scheduler.clone());
    let today = config.processing_date.unwrap_or_else(|| Local::now().date_naive());

    let report = run_processing_cycle(&service, today).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.failed.is_empty() {
        log::warn!("{} subscription(s) failed processing", report.failed.len());
    }

    Ok(())
}
