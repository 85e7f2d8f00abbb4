mod cli;
mod server;

use crate::cli::{StorageBackendArg, CLI};
use crate::server::ShortUrlGrpcServer;
use clap::Parser;
use std::sync::Arc;
use tonic::transport::Server;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use zipline_cache::{InMemoryKvCache, LocalCache, RedisKvCache, TwoLevelCache};
use zipline_core::{KvCache, UrlMapStore};
use zipline_proto_schema::v1::short_url_server::ShortUrlServer;
use zipline_server::warmup::WARM_INTERVAL;
use zipline_server::{BearerAuth, CacheWarmer, ServiceConfig, ShortUrlService};
use zipline_storage::{InMemoryUrlMapStore, MySqlPoolConfig, MySqlUrlMapStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CLI::try_parse()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    info!(
        listen_addr = %config.listen_addr,
        storage_backend = %config.storage,
        "starting short-url gRPC server"
    );

    let service_config = ServiceConfig::builder()
        .short_domain(config.short_domain.clone())
        .user_short_domain(config.user_short_domain.clone())
        .default_ttl_secs(config.default_ttl_secs)
        .build();

    match config.storage {
        StorageBackendArg::InMemory => {
            run_server(
                config.listen_addr,
                &config.access_token,
                InMemoryUrlMapStore::new(),
                InMemoryKvCache::new(),
                service_config,
            )
            .await?;
        }
        StorageBackendArg::Mysql => {
            let mysql_dsn = config
                .mysql_dsn
                .clone()
                .ok_or("mysql dsn is required when storage backend is mysql")?;
            let store = MySqlUrlMapStore::connect(&MySqlPoolConfig {
                dsn: mysql_dsn,
                max_open_conns: config.mysql_max_open_conns,
                max_idle_conns: config.mysql_max_idle_conns,
                max_lifetime_secs: config.mysql_max_lifetime_secs,
            })
            .await?;

            let redis_client = redis::Client::open(config.redis_url())?;
            let redis_conn = redis_client.get_multiplexed_tokio_connection().await?;

            run_server(
                config.listen_addr,
                &config.access_token,
                store,
                RedisKvCache::new(redis_conn),
                service_config,
            )
            .await?;
        }
    }

    Ok(())
}

async fn run_server<S: UrlMapStore, K: KvCache>(
    listen_addr: std::net::SocketAddr,
    access_token: &str,
    store: S,
    distributed_kv: K,
    config: ServiceConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(store);
    let distributed = Arc::new(distributed_kv);

    let local = LocalCache::new();
    let reaper = local.spawn_reaper();

    let cache = Arc::new(TwoLevelCache::new(
        local,
        Arc::clone(&distributed),
        config.default_ttl_secs,
    ));

    let service = Arc::new(ShortUrlService::new(
        Arc::clone(&store),
        Arc::clone(&cache),
        Arc::clone(&distributed),
        config.clone(),
    ));

    let warmer = CacheWarmer::new(store, cache, distributed, &config);
    if let Err(e) = warmer.warmup().await {
        warn!(error = %e, "startup cache warmup failed");
    }
    let warmup = warmer.spawn_periodic(WARM_INTERVAL);

    type Grpc<S, K> = ShortUrlGrpcServer<S, TwoLevelCache<Arc<K>>, K>;

    // The health service is registered outside the auth interceptor so
    // health checks never need the bearer token.
    let (mut health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<ShortUrlServer<Grpc<S, K>>>()
        .await;

    let grpc = ShortUrlGrpcServer::new(service);
    let result = Server::builder()
        .add_service(health_service)
        .add_service(ShortUrlServer::with_interceptor(
            grpc,
            BearerAuth::new(access_token),
        ))
        .serve(listen_addr)
        .await;

    warmup.stop();
    reaper.stop();
    result?;
    Ok(())
}
