use clap::{Parser, ValueEnum};
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;

pub const LISTEN_ADDR_ENV: &str = "ZIPLINE_SERVER_LISTEN_ADDR";
pub const STORAGE_BACKEND_ENV: &str = "ZIPLINE_SERVER_STORAGE_BACKEND";
pub const MYSQL_DSN_ENV: &str = "ZIPLINE_SERVER_MYSQL_DSN";
pub const ACCESS_TOKEN_ENV: &str = "ZIPLINE_SERVER_ACCESS_TOKEN";
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:50051";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    /// In-process store and KV; nothing survives a restart.
    #[value(name = "in-memory")]
    InMemory,
    /// MySQL origin store with Redis caching.
    #[value(name = "mysql")]
    Mysql,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::InMemory => write!(f, "in-memory"),
            StorageBackendArg::Mysql => write!(f, "mysql"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "zipline-server")]
pub struct CLI {
    #[arg(long, env = LISTEN_ADDR_ENV, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: SocketAddr,

    /// Bearer token every gRPC request must present.
    #[arg(long, env = ACCESS_TOKEN_ENV)]
    pub access_token: String,

    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::InMemory
    )]
    pub storage: StorageBackendArg,

    #[arg(long, env = MYSQL_DSN_ENV, required_if_eq("storage", "mysql"))]
    pub mysql_dsn: Option<String>,

    #[arg(long, default_value_t = 20)]
    pub mysql_max_open_conns: u32,

    #[arg(long, default_value_t = 5)]
    pub mysql_max_idle_conns: u32,

    #[arg(long, default_value_t = 1800)]
    pub mysql_max_lifetime_secs: u64,

    #[arg(long, default_value = "127.0.0.1")]
    pub redis_host: String,

    #[arg(long, default_value_t = 6379)]
    pub redis_port: u16,

    #[arg(long, default_value = "")]
    pub redis_pwd: String,

    /// Domain prepended to public short keys.
    #[arg(long, default_value = "https://s.zipline.dev/")]
    pub short_domain: String,

    /// Domain prepended to private short keys.
    #[arg(long, default_value = "https://u.zipline.dev/")]
    pub user_short_domain: String,

    /// Base TTL (seconds) for cached mappings.
    #[arg(long, default_value_t = 3600)]
    pub default_ttl_secs: u64,

    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl CLI {
    pub fn redis_url(&self) -> String {
        if self.redis_pwd.is_empty() {
            format!("redis://{}:{}/", self.redis_host, self.redis_port)
        } else {
            format!(
                "redis://:{}@{}:{}/",
                self.redis_pwd, self.redis_host, self.redis_port
            )
        }
    }
}
