//! Maintenance binary: initializes the database, seeds configured rows,
//! and prints a reconciliation audit for the configured user.

use budget_engine::config::{database, seed};
use budget_engine::core::reconciliation;
use budget_engine::errors::Result;
use dotenvy::dotenv;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Load the seed configuration
    let config = seed::load_default_config()
        .inspect_err(|e| error!("Failed to load config.toml: {e}"))?;
    info!(user_id = %config.user_id, "loaded seed configuration");

    // 4. Initialize database and create tables
    let db = database::create_connection()
        .await
        .inspect(|_| info!("Database connection established"))
        .inspect_err(|e| error!("Failed to connect to database: {e}"))?;
    database::create_tables(&db).await?;

    // 5. Seed configured envelopes and income sources
    seed::seed_database(&db, &config)
        .await
        .inspect_err(|e| error!("Failed to seed database: {e}"))?;

    // 6. Run a reconciliation audit for the configured user
    let report = reconciliation::reconcile(&db, &config.user_id).await?;
    info!("{}", report.summary());
    if !report.balanced {
        warn!(
            "reconciliation identity violated; review account and envelope balances manually"
        );
    }

    Ok(())
}
