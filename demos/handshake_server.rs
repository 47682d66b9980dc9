//! Handshake-only RTMP server
//!
//! Run with: cargo run --example handshake_server
//!
//! Point any RTMP client at rtmp://localhost:40000/live/test. The client
//! will complete the handshake, then get disconnected because no
//! application layer is attached. Set RUST_LOG=rtmp_handshake=trace to see
//! every stage.

use rtmp_handshake::{ConnectionAcceptor, LoggingHandler, ServerConfig};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rtmp_handshake=debug".parse()?)
                .add_directive("handshake_server=debug".parse()?),
        )
        .init();

    let config = ServerConfig::with_port(40000);
    println!("Starting RTMP handshake server on {}", config.bind_addr);

    let acceptor = ConnectionAcceptor::new(config, LoggingHandler);
    let stats = acceptor.stats();

    acceptor
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    println!("\nShutting down... {:?}", stats.snapshot());
    Ok(())
}
