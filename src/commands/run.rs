use anyhow::Result;

use prospector::config::Config;
#[cfg(feature = "chromium")]
use prospector::scheduler::{log_tick, CampaignRun, TickReport};

/// Run one scheduler tick against the configured Chromium session
#[cfg(feature = "chromium")]
pub async fn run(config: Config) -> Result<()> {
    use anyhow::Context;
    use prospector::browser::chromium::ChromiumProvider;
    use prospector::browser::BrowserProvider;

    let scheduler = super::build_scheduler(&config).await?;

    let provider = ChromiumProvider::new(config.browser.clone());
    let mut browser = provider
        .acquire()
        .await
        .context("Failed to attach to the browser session")?;

    let report = scheduler.run_tick(&mut browser).await?;
    log_tick(&report);
    print_report(&report);

    Ok(())
}

#[cfg(not(feature = "chromium"))]
pub async fn run(_config: Config) -> Result<()> {
    anyhow::bail!("prospector was built without a browser adapter; rebuild with --features chromium")
}

#[cfg(feature = "chromium")]
fn print_report(report: &TickReport) {
    println!("Scheduler Tick");
    println!("==============");

    let runs = match report {
        TickReport::LockContended => {
            println!("Skipped: another worker holds the scheduler lock");
            return;
        }
        TickReport::Ran { runs } => runs,
    };

    if runs.is_empty() {
        println!("No eligible campaigns");
        return;
    }

    for run in runs {
        match run {
            CampaignRun::Crawled(r) => println!(
                "  {} {:<9} pages={} new={} duplicates={} skipped={}{}",
                r.campaign_id,
                r.outcome.as_str(),
                r.pages_visited,
                r.new_leads,
                r.duplicates_skipped,
                r.entries_skipped,
                r.error
                    .as_deref()
                    .map(|e| format!(" error=\"{e}\""))
                    .unwrap_or_default(),
            ),
            CampaignRun::NotClaimed { campaign_id } => {
                println!("  {campaign_id} not claimed")
            }
            CampaignRun::PickupFailed { campaign_id, error } => {
                println!("  {campaign_id} pickup failed: {error}")
            }
            CampaignRun::Panicked {
                campaign_id,
                message,
            } => println!("  {campaign_id} panicked: {message}"),
        }
    }
}
