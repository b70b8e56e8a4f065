pub mod campaigns;
pub mod run;
pub mod schema;
pub mod serve;

use std::sync::Arc;

use prospector::config::Config;
use prospector::crawler::CrawlEngine;
use prospector::enrichment::RedisEnrichmentQueue;
use prospector::error::{Error, Result};
use prospector::lock::{create_redis_pool, RedisLockManager};
use prospector::scheduler::Scheduler;
use prospector::storage::{create_pool, Stores};

// Re-export command functions for convenience
pub use campaigns::campaigns;
pub use run::run;
pub use schema::init_schema;
pub use serve::serve;

/// Validate the config and wire the scheduler to PostgreSQL and Redis
pub async fn build_scheduler(config: &Config) -> Result<Scheduler> {
    config
        .validate()
        .map_err(|e| Error::config(format!("{e:#}")))?;

    let pg_pool = create_pool(&config.database)
        .map_err(|e| Error::with_source("Failed to create PostgreSQL pool", e))?;
    let stores = Stores::postgres(pg_pool);

    let redis_pool = create_redis_pool(&config.redis)
        .await
        .map_err(|e| Error::with_source("Failed to connect to Redis", e))?;
    let locks = Arc::new(RedisLockManager::new(
        redis_pool.clone(),
        config.redis.key_prefix.clone(),
    ));

    let mut engine = CrawlEngine::new(&stores, config.crawl.clone());
    if config.enrichment.enabled {
        let queue = RedisEnrichmentQueue::new(
            redis_pool,
            &config.redis.key_prefix,
            &config.enrichment.queue_key,
        );
        tracing::info!(queue = queue.queue_key(), "Enrichment handoff enabled");
        engine = engine.with_enrichment(Arc::new(queue), config.enrichment.max_batch_size);
    }

    let scheduler = Scheduler::new(locks, engine, config.scheduler.clone())?;
    Ok(scheduler)
}
