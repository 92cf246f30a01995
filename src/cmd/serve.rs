//! API server command: `jobstatus serve`.

use anyhow::Result;
use chrono::NaiveDate;

use jobstatus::config::{Config, DEFAULT_SECRET};
use jobstatus::tracker::server::{ServerConfig, start_server};

pub async fn cmd_serve(
    config: &Config,
    port: Option<u16>,
    host: Option<String>,
    dev: bool,
    today: Option<NaiveDate>,
) -> Result<()> {
    for warning in config.validate() {
        tracing::warn!("{}", warning);
    }

    let mut server = ServerConfig::from(config);
    if let Some(port) = port {
        server.port = port;
    }
    if let Some(host) = host {
        server.host = host;
    } else if dev && server.secret != DEFAULT_SECRET {
        // Reachable from containers and other machines on the LAN.
        server.host = "0.0.0.0".to_string();
    }
    server.dev_mode = dev;
    server.today = today;

    start_server(server).await
}
