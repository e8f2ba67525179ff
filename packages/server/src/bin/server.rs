//! Tayori real-time chat transport server.
//!
//! Accepts one WebSocket connection per authenticated user, routes inbound
//! commands and pushes messages / read receipts to online participants.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin tayori-server
//! cargo run --bin tayori-server -- --host 0.0.0.0 --port 3000 --ping-interval-secs 10
//! ```

use std::{sync::Arc, time::Duration};

use clap::Parser;
use tayori_server::{
    domain::{ConnectionRegistry, UserId, ValidationError},
    infrastructure::service::{InMemoryChatStore, InMemoryProfileService},
    ui::{KeepaliveConfig, Server, ServerConfig, register_message_handlers},
    usecase::{CommandRouter, MessageDispatcher},
};
use tayori_shared::{
    logger::setup_logger,
    time::{Clock, SystemClock},
};

#[derive(Parser, Debug)]
#[command(name = "tayori-server")]
#[command(about = "Real-time chat transport over WebSocket", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, env = "TAYORI_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, env = "TAYORI_PORT", default_value = "8080")]
    port: u16,

    /// Seconds between keepalive pings
    #[arg(long, env = "TAYORI_PING_INTERVAL_SECS", default_value = "30")]
    ping_interval_secs: u64,

    /// Unanswered pings tolerated before a connection is closed
    #[arg(long, env = "TAYORI_MAX_MISSED_PONGS", default_value = "3")]
    max_missed_pongs: u32,

    /// Group chat to create at startup, as comma-separated participant UUIDs.
    /// Repeat the flag (or separate with ';' in the env var) for several chats.
    #[arg(long = "group-chat", env = "TAYORI_GROUP_CHATS", value_delimiter = ';')]
    group_chats: Vec<String>,

    /// Default log level (overridden by RUST_LOG)
    #[arg(long, env = "TAYORI_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize tracing
    setup_logger(
        &[env!("CARGO_BIN_NAME"), "tayori-shared", "tower_http"],
        &args.log_level,
    );

    // Initialize dependencies in order:
    // 1. Collaborators (in-memory)
    // 2. ConnectionRegistry
    // 3. MessageDispatcher / CommandRouter
    // 4. Server

    // 1. Create collaborators
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let chat_store = Arc::new(InMemoryChatStore::new());
    let profile_service = Arc::new(InMemoryProfileService::new(clock.clone()));

    for raw in &args.group_chats {
        match parse_participants(raw) {
            Ok(participants) => {
                let count = participants.len();
                let chat_id = chat_store.create_group_chat(participants).await;
                tracing::info!("Group chat {} created with {} participant(s)", chat_id, count);
            }
            Err(e) => {
                tracing::error!("Invalid --group-chat '{}': {}", raw, e);
                std::process::exit(1);
            }
        }
    }

    // 2. Create ConnectionRegistry
    let registry = Arc::new(ConnectionRegistry::new());

    // 3. Create MessageDispatcher and register command handlers
    let dispatcher = Arc::new(MessageDispatcher::new(
        chat_store.clone(),
        chat_store,
        profile_service.clone(),
        registry.clone(),
    ));
    let mut router = CommandRouter::new();
    if let Err(e) = register_message_handlers(&mut router, dispatcher) {
        tracing::error!("Failed to register command handlers: {}", e);
        std::process::exit(1);
    }

    // 4. Create and run the server
    let keepalive = match KeepaliveConfig::new(
        Duration::from_secs(args.ping_interval_secs),
        args.max_missed_pongs,
    ) {
        Ok(keepalive) => keepalive,
        Err(e) => {
            tracing::error!("Invalid keepalive configuration: {}", e);
            std::process::exit(1);
        }
    };
    let config = ServerConfig {
        host: args.host,
        port: args.port,
        keepalive,
    };
    let server = Server::new(
        config,
        registry,
        Arc::new(router),
        profile_service,
        clock,
    );
    if let Err(e) = server.run().await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Parse a comma-separated list of participant UUIDs. Blank entries are skipped.
fn parse_participants(raw: &str) -> Result<Vec<UserId>, ValidationError> {
    raw.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(|part| UserId::parse("participant", part))
        .collect()
}
