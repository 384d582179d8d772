// src/config.rs

use std::env;
use std::time::Duration;

use dotenvy::dotenv;
use url::Url;

use crate::engine::monitor::MonitorPolicy;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub rust_log: String,

    /// Browser origin allowed to call the API.
    pub allowed_origin: String,

    /// Hard time limit of an exam, in seconds.
    pub exam_duration_secs: u64,

    /// Presence poll interval while a session is armed, in milliseconds.
    pub presence_poll_ms: u64,

    /// Grace window for presence loss, in seconds.
    pub presence_grace_secs: u64,

    /// Age after which a client presence sample reads as a dead camera,
    /// in milliseconds.
    pub presence_staleness_ms: u64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let allowed_origin =
            env::var("ALLOWED_ORIGIN").unwrap_or_else(|_| "http://localhost:3000".to_string());
        Url::parse(&allowed_origin).expect("ALLOWED_ORIGIN must be a valid URL");

        Self {
            database_url,
            jwt_secret,
            rust_log,
            allowed_origin,
            exam_duration_secs: env_u64("EXAM_DURATION_SECS", 1800),
            presence_poll_ms: env_u64("PRESENCE_POLL_MS", 1250),
            presence_grace_secs: env_u64("PRESENCE_GRACE_SECS", 10),
            presence_staleness_ms: env_u64("PRESENCE_STALENESS_MS", 4000),
        }
    }

    pub fn monitor_policy(&self) -> MonitorPolicy {
        MonitorPolicy {
            exam_duration: Duration::from_secs(self.exam_duration_secs),
            poll_interval: Duration::from_millis(self.presence_poll_ms),
            grace_period: Duration::from_secs(self.presence_grace_secs),
            ..MonitorPolicy::default()
        }
    }

    pub fn presence_staleness(&self) -> Duration {
        Duration::from_millis(self.presence_staleness_ms)
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
