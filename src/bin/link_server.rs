//! Host-side receiver for tag link frames
//!
//! Usage: `link-server [config.json] [listen_addr]`. Accepts one tag connection
//! at a time, decodes each frame and logs the located tag position. The listen
//! address comes from the second argument, else `server.listen_addr`.

use std::io::Read;
use std::net::{TcpListener, TcpStream};

use anyhow::Context;
use tracing::{debug, info, warn};

use uwb_link::utils::logging;
use uwb_link::{AppConfig, LinkError, LinkReceiver, LocateError};

const READ_CHUNK: usize = 1024;

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => AppConfig::from_file(&path).with_context(|| format!("loading {path}"))?,
        None => AppConfig::default(),
    };
    let bind = args.next().unwrap_or_else(|| config.server.listen_addr.clone());
    logging::init(config.device.debug_logging)?;

    let layout = LinkReceiver::from_config(&config)?;
    let locator = layout.locator();
    if locator.anchor_count() < locator.min_anchors() {
        warn!(
            anchors = locator.anchor_count(),
            required = locator.min_anchors(),
            "anchor layout too small to locate the tag"
        );
    }

    let listener = TcpListener::bind(&bind).with_context(|| format!("binding {bind}"))?;
    info!(%bind, "waiting for tag connection");

    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "accept failed");
                continue;
            }
        };
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        info!(%peer, "tag connected");

        let mut receiver = LinkReceiver::from_config(&config)?;
        match serve(stream, &mut receiver) {
            Ok(()) => info!(%peer, frames = receiver.frames_decoded(), fixes = receiver.fixes(), "tag disconnected"),
            Err(e) => warn!(%peer, error = %e, frames = receiver.frames_decoded(), "tag connection failed"),
        }
    }

    Ok(())
}

/// Read frames until the peer closes
fn serve(mut stream: TcpStream, receiver: &mut LinkReceiver) -> uwb_link::Result<()> {
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        let read = stream.read(&mut chunk)?;
        if read == 0 {
            return Ok(());
        }

        match receiver.feed(&String::from_utf8_lossy(&chunk[..read])) {
            Ok(Some(fix)) => info!(
                x = fix.x_m,
                y = fix.y_m,
                anchors = fix.anchors.len(),
                residual = fix.residual_m,
                "tag located"
            ),
            Ok(None) => {}
            Err(LinkError::Locate(LocateError::InsufficientAnchors { available, required })) => {
                debug!(available, required, "not enough anchors in frame")
            }
            Err(LinkError::Frame(e)) => warn!(error = %e, "dropping malformed frame"),
            Err(e) => warn!(error = %e, "position solve failed"),
        }
    }
}
