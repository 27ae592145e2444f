//! API module for the transcript chat server
//!
//! Serves the single-page chat UI and the JSON endpoints it talks to.

use anyhow::Result;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::info;

use crate::config::Config;
use crate::service::ChatService;
use crate::session::SessionStore;

pub mod handlers;
pub mod models;
pub mod server;

/// How often idle sessions are looked for
const SWEEP_PERIOD: Duration = Duration::from_secs(60);

/// API Server for the chat UI
pub struct ApiServer {
    service: Arc<ChatService>,
    config: Arc<Config>,
}

impl ApiServer {
    pub fn new(service: Arc<ChatService>, config: Arc<Config>) -> Self {
        Self { service, config }
    }

    /// Run the API server until it stops
    pub async fn start(self) -> Result<()> {
        info!(
            "🚀 Starting API server on {}:{}",
            self.config.server.host, self.config.server.port
        );

        // Tabs that never sent their DELETE are cleaned up here
        let max_idle = chrono::Duration::minutes(self.config.server.session_idle_minutes as i64);
        let sweeper = spawn_session_sweeper(self.service.sessions().clone(), max_idle, SWEEP_PERIOD);

        let result = server::start_http_server(server::AppState {
            service: self.service,
            config: self.config,
        })
        .await;

        sweeper.abort();
        result
    }
}

/// Periodically drop sessions idle for longer than `max_idle`
pub fn spawn_session_sweeper(sessions: SessionStore, max_idle: chrono::Duration, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        loop {
            ticker.tick().await;
            sessions.expire_idle(max_idle).await;
        }
    })
}
