use std::net::{Ipv4Addr, SocketAddr};

use log::{info, warn};
use tokio::net::TcpListener;

const DEFAULT_PORT: u16 = 3000;

/// Port from the `PORT` value, falling back to 3000 when unset or not a number.
fn parse_port(raw: Option<&str>) -> u16 {
    match raw {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("PORT={raw:?} is not a port number, using {DEFAULT_PORT}");
            DEFAULT_PORT
        }),
        None => DEFAULT_PORT,
    }
}

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    env_logger::init();
    let port = parse_port(std::env::var("PORT").ok().as_deref());
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    let listener = TcpListener::bind(addr).await?;
    info!("mock server listening on http://{addr}");
    mock_server::run(listener).await
}
