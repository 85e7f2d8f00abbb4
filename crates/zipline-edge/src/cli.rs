use clap::Parser;
use std::net::SocketAddr;

pub const LISTEN_ADDR_ENV: &str = "ZIPLINE_EDGE_LISTEN_ADDR";
pub const SHORTURL_ENDPOINT_ENV: &str = "ZIPLINE_EDGE_SHORTURL_ENDPOINT";
pub const ACCESS_TOKEN_ENV: &str = "ZIPLINE_EDGE_ACCESS_TOKEN";
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_SHORTURL_ENDPOINT: &str = "http://127.0.0.1:50051";

#[derive(Debug, Parser)]
#[command(name = "zipline-edge")]
pub struct CLI {
    #[arg(long, env = LISTEN_ADDR_ENV, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: SocketAddr,

    /// gRPC endpoint of the short-url service.
    #[arg(long, env = SHORTURL_ENDPOINT_ENV, default_value = DEFAULT_SHORTURL_ENDPOINT)]
    pub shorturl_endpoint: String,

    /// Bearer token presented to the short-url service.
    #[arg(long, env = ACCESS_TOKEN_ENV)]
    pub access_token: String,

    #[arg(long, default_value = "info")]
    pub log_level: String,
}
