use anyhow::{Context, Result};

use prospector::campaign::CampaignStateMachine;
use prospector::config::Config;
use prospector::storage::{create_pool, Stores};

/// Print the campaigns the next tick would pick, oldest first
pub async fn campaigns(config: Config, limit: usize) -> Result<()> {
    let pool = create_pool(&config.database).context("Failed to create PostgreSQL pool")?;
    let stores = Stores::postgres(pool);
    let state = CampaignStateMachine::new(stores.campaigns);

    let eligible = state
        .eligible(limit)
        .await
        .context("Failed to load eligible campaigns")?;

    println!("Eligible Campaigns");
    println!("==================");

    if eligible.is_empty() {
        println!("None");
        return Ok(());
    }

    for campaign in &eligible {
        println!(
            "  {} {:<9} runs={:<3} leads={:<5} last_run={} {}",
            campaign.id,
            campaign.status.as_str(),
            campaign.run_count,
            campaign.lead_ids.len(),
            campaign
                .last_run
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "never".to_string()),
            campaign.name,
        );
    }

    if eligible.len() > config.scheduler.batch_size {
        println!(
            "\nNext tick processes the first {} (scheduler.batch_size)",
            config.scheduler.batch_size
        );
    }

    Ok(())
}
