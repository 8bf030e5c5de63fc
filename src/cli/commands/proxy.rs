//! `proxy --mode=...`: local pivot/forwarding. `port_forward` is a real
//! TCP relay; `socks5`/`http` modes need full protocol handshakes that
//! are out of scope for this pass and return an explicit error rather
//! than a silent no-op, the same way `Dialer` reports `ProxyUnsupported`
//! for its own client-side SOCKS5 dialing.

use anyhow::{bail, Context, Result};
use tokio::io::copy_bidirectional;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::cli::types::ProxyMode;

pub async fn handle(mode: ProxyMode, listen: String, forward: Option<String>) -> Result<()> {
    match mode {
        ProxyMode::PortForward => {
            let forward = forward.context("--forward is required for port_forward mode")?;
            run_port_forward(&listen, &forward).await
        }
        ProxyMode::Socks5 => bail!("socks5 proxy mode is not yet implemented"),
        ProxyMode::Http => bail!("http proxy mode is not yet implemented"),
    }
}

async fn run_port_forward(listen: &str, forward: &str) -> Result<()> {
    let listener = TcpListener::bind(listen).await.with_context(|| format!("binding {listen}"))?;
    info!(listen, forward, "port-forward listening");

    loop {
        let (mut inbound, peer) = listener.accept().await?;
        let forward = forward.to_string();
        tokio::spawn(async move {
            let mut outbound = match tokio::net::TcpStream::connect(&forward).await {
                Ok(s) => s,
                Err(e) => {
                    warn!(%peer, forward, error = %e, "forward dial failed");
                    return;
                }
            };
            if let Err(e) = copy_bidirectional(&mut inbound, &mut outbound).await {
                warn!(%peer, forward, error = %e, "relay ended with error");
            }
        });
    }
}
