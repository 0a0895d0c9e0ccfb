//! AlumniBridge stub backend.
//!
//! Serves the HTTP API under `/api` and the STOMP live channel on `/ws` from
//! seeded in-memory data. Seeded accounts share the password `password123`:
//! `alice@example.com` (student), `bob@example.com` and `carol@example.com`
//! (alumni).
//!
//! Run with:
//! ```not_rust
//! cargo run --bin alumnibridge-stub-server
//! cargo run --bin alumnibridge-stub-server -- --host 0.0.0.0 --port 3000
//! ```

use clap::Parser;

use alumnibridge_shared::logger::setup_logger;
use alumnibridge_stub_server::run_server;

#[derive(Parser, Debug)]
#[command(name = "alumnibridge-stub-server")]
#[command(about = "In-memory AlumniBridge backend for local development", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "debug");

    let args = Args::parse();

    if let Err(e) = run_server(args.host, args.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
