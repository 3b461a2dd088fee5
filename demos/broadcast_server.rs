//! Viewer-count broadcast server
//!
//! Run with: cargo run --example broadcast_server [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example broadcast_server                  # binds to 0.0.0.0:80
//!   cargo run --example broadcast_server localhost:8080   # binds to 127.0.0.1:8080
//!   cargo run --example broadcast_server 0.0.0.0:9000     # binds to 0.0.0.0:9000
//!
//! ## Try it
//!
//! With websocat, in two terminals:
//!   websocat ws://localhost:8080
//!
//! Each side sees `{"type":"viewerCount","count":2}`. Typing
//!   {"type":"message","data":"hi"}
//! in one shows it in the other.
//!
//! Health check:
//!   curl http://localhost:8080/health

use std::net::SocketAddr;

use crowdcast::protocol::constants::DEFAULT_PORT;
use crowdcast::{BroadcastServer, ServerConfig};

/// Parse bind address from command line argument.
///
/// Accepts formats:
/// - "localhost" -> 127.0.0.1:80
/// - "localhost:8080" -> 127.0.0.1:8080
/// - "127.0.0.1" -> 127.0.0.1:80
/// - "0.0.0.0:9000" -> 0.0.0.0:9000
fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn print_usage() {
    eprintln!("Usage: broadcast_server [BIND_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR    Address to bind to (default: 0.0.0.0:{})", DEFAULT_PORT);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let mut config = ServerConfig::default();
    if let Some(addr_str) = args.get(1) {
        match parse_bind_addr(addr_str) {
            Ok(addr) => config = config.bind(addr),
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("crowdcast=debug".parse()?)
                .add_directive("broadcast_server=debug".parse()?),
        )
        .init();

    let server = BroadcastServer::new(config);
    println!("Starting broadcast server on {}", server.bind_addr());

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            println!("\nShutting down...");
        })
        .await?;

    Ok(())
}
