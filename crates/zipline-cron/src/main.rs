mod cli;
mod publisher;

use crate::cli::CLI;
use crate::publisher::MaxIdPublisher;
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use zipline_cache::RedisKvCache;
use zipline_storage::{MySqlPoolConfig, MySqlUrlMapStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CLI::try_parse()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    info!(publish_hour = config.publish_hour, "starting max-id publisher");

    let store = MySqlUrlMapStore::connect(&MySqlPoolConfig {
        dsn: config.mysql_dsn.clone(),
        max_open_conns: config.mysql_max_open_conns,
        max_idle_conns: config.mysql_max_idle_conns,
        max_lifetime_secs: config.mysql_max_lifetime_secs,
    })
    .await?;

    let redis_client = redis::Client::open(config.redis_url())?;
    let redis_conn = redis_client.get_multiplexed_tokio_connection().await?;

    let publisher = MaxIdPublisher::new(
        Arc::new(store),
        Arc::new(RedisKvCache::new(redis_conn)),
    );
    publisher.run_daily(config.publish_hour).await;

    Ok(())
}
