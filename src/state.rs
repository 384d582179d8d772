// src/state.rs

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::FromRef;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::engine::environment::ClientEnvironment;
use crate::engine::monitor::SessionRuntime;
use crate::engine::presence::PresenceFeed;
use crate::providers::content::ContentProvider;
use crate::providers::results::ResultsSink;

/// One hosted session plus the transport-facing signal mailboxes the
/// client reports into.
#[derive(Clone)]
pub struct SessionEntry {
    pub runtime: Arc<SessionRuntime>,
    pub feed: Arc<PresenceFeed>,
    pub bridge: Arc<ClientEnvironment>,
}

pub type SessionRegistry = Arc<RwLock<HashMap<String, SessionEntry>>>;

#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionRegistry,
    pub content: Arc<dyn ContentProvider>,
    pub results: Arc<dyn ResultsSink>,
    pub config: Config,
}

impl AppState {
    pub fn new(
        content: Arc<dyn ContentProvider>,
        results: Arc<dyn ResultsSink>,
        config: Config,
    ) -> Self {
        AppState {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            content,
            results,
            config,
        }
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
