use anyhow::Result;
use clap::{Arg, Command};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use yt_transcript_chat::api::ApiServer;
use yt_transcript_chat::{ChatService, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("YouTube Transcript Chat")
        .version(env!("CARGO_PKG_VERSION"))
        .author("TigreRoll")
        .about("Chat with an LLM about the transcript of a YouTube video")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file (default: search the standard locations)")
        )
        .arg(
            Arg::new("host")
                .long("host")
                .value_name("HOST")
                .help("Address to listen on")
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Port to listen on")
                .value_parser(clap::value_parser!(u16))
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue)
        )
        .get_matches();

    let verbose = matches.get_flag("verbose");

    // Read config before logging is up so the file can set the level
    let config_result = match matches.get_one::<String>("config") {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };

    let level = match &config_result {
        _ if verbose => "debug".to_string(),
        Ok(config) => config.logging.level.clone(),
        Err(_) => "info".to_string(),
    };

    // Initialize logging; RUST_LOG wins over config and flags
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("yt_transcript_chat={},tower_http={},warn", level, level))
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = config_result?;

    if let Some(host) = matches.get_one::<String>("host") {
        config.server.host = host.clone();
    }
    if let Some(port) = matches.get_one::<u16>("port") {
        config.server.port = *port;
    }

    config.resolve_api_key();
    if let Err(e) = config.validate() {
        error!("❌ {}", e);
        return Err(e);
    }

    info!("🚀 YouTube Transcript Chat starting...");
    for line in config.summary().lines() {
        info!("{}", line);
    }

    let service = Arc::new(ChatService::from_config(&config)?);
    let server = ApiServer::new(service, Arc::new(config));

    server.start().await
}
