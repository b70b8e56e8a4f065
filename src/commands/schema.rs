use anyhow::{Context, Result};

use prospector::config::Config;
use prospector::storage::{create_pool, postgres};

/// Create the campaigns, leads and dedup_records tables if missing
pub async fn init_schema(config: Config) -> Result<()> {
    let pool = create_pool(&config.database).context("Failed to create PostgreSQL pool")?;

    postgres::init_schema(&pool)
        .await
        .context("Failed to initialize schema")?;

    println!("Schema initialized");
    Ok(())
}
