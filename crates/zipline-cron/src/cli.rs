use clap::Parser;

pub const MYSQL_DSN_ENV: &str = "ZIPLINE_CRON_MYSQL_DSN";

#[derive(Debug, Parser)]
#[command(name = "zipline-cron")]
pub struct CLI {
    #[arg(long, env = MYSQL_DSN_ENV)]
    pub mysql_dsn: String,

    #[arg(long, default_value_t = 5)]
    pub mysql_max_open_conns: u32,

    #[arg(long, default_value_t = 1)]
    pub mysql_max_idle_conns: u32,

    #[arg(long, default_value_t = 1800)]
    pub mysql_max_lifetime_secs: u64,

    #[arg(long, default_value = "127.0.0.1")]
    pub redis_host: String,

    #[arg(long, default_value_t = 6379)]
    pub redis_port: u16,

    #[arg(long, default_value = "")]
    pub redis_pwd: String,

    /// Local hour of day for the daily publication pass.
    #[arg(long, default_value_t = 3)]
    pub publish_hour: i8,

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
