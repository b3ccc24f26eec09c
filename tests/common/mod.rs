#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use coltech_api::auth::hash_password;
use coltech_api::config::{AppConfig, Environment};
use coltech_api::database::models::{Scope, Token};
use coltech_api::database::{MemoryStore, Models};
use coltech_api::lifecycle::{ShutdownCoordinator, ShutdownError};
use coltech_api::middleware::{RateLimitConfig, RateLimiter};
use coltech_api::services::{MailError, Mailer, Message};
use coltech_api::{build_app, AppState};

/// Keeps every message it is handed, optionally after a delay
#[derive(Default)]
pub struct RecordingMailer {
    pub delay: Option<Duration>,
    sent: Mutex<Vec<Message>>,
}

impl RecordingMailer {
    pub fn delayed(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn messages(&self) -> Vec<Message> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &Message) -> Result<(), MailError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// An in-process server on a free port, backed by the in-memory store
pub struct TestServer {
    pub base_url: String,
    pub store: MemoryStore,
    pub mailer: Arc<RecordingMailer>,
    pub coordinator: ShutdownCoordinator,
    pub client: reqwest::Client,
    serving: JoinHandle<Result<(), ShutdownError>>,
}

/// Development presets with the rate limiter off
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::for_environment(Environment::Development);
    config.limiter.enabled = false;
    config
}

pub async fn spawn() -> Result<TestServer> {
    spawn_with(test_config(), RecordingMailer::default()).await
}

pub async fn spawn_with(config: AppConfig, mailer: RecordingMailer) -> Result<TestServer> {
    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    let base_url = format!("http://127.0.0.1:{}", port);

    let store = MemoryStore::new();
    let models = Models::in_memory(store.clone(), config.database.operation_timeout());
    let coordinator = ShutdownCoordinator::new(config.shutdown.grace_period());
    let limiter = Arc::new(RateLimiter::new(RateLimitConfig::from(&config.limiter)));
    let mailer = Arc::new(mailer);

    let state = AppState {
        config: Arc::new(config),
        models,
        mailer: mailer.clone(),
        background: coordinator.tasks(),
    };
    let app = build_app(state, limiter);

    let listener = TcpListener::bind(("127.0.0.1", port))
        .await
        .context("failed to bind test listener")?;
    let serving = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.serve(listener, app).await })
    };

    Ok(TestServer {
        base_url,
        store,
        mailer,
        coordinator,
        client: reqwest::Client::new(),
        serving,
    })
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Seed a user with a real password hash so it can log in
    pub fn seed_login(&self, email: &str, password: &str, activated: bool) -> Result<i64> {
        let hash = hash_password(password)?;
        Ok(self.store.seed_user("Test User", email, &hash, activated))
    }

    /// Seed a user holding `codes` and return a live bearer token for it
    pub fn bearer_for(&self, activated: bool, codes: &[&str]) -> String {
        let email = format!("user{}@example.com", next_suffix());
        let user_id = self.store.seed_user("Test User", &email, "unused", activated);
        self.store.grant(user_id, codes);
        let token = Token::generate(user_id, chrono::Duration::hours(1), Scope::Authentication);
        self.store.seed_token(&token);
        token.plaintext
    }

    /// Wait until the mailer has recorded `count` messages
    pub async fn wait_for_mail(&self, count: usize) -> Result<Vec<Message>> {
        for _ in 0..100 {
            let messages = self.mailer.messages();
            if messages.len() >= count {
                return Ok(messages);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        anyhow::bail!("expected {} mail message(s), saw {}", count, self.mailer.messages().len())
    }

    pub async fn shutdown(self) -> Result<(), ShutdownError> {
        self.coordinator.trigger();
        self.serving.await.map_err(ShutdownError::from)?
    }
}

pub fn new_item(summary: &str, priority: &str, status: &str) -> Value {
    json!({
        "summary": summary,
        "description": format!("{} - reported by the front desk", summary),
        "priority": priority,
        "status": status,
        "category": "hardware",
        "department": "facilities",
        "created_by": "dana",
    })
}

fn next_suffix() -> u64 {
    use std::sync::atomic::{AtomicU64, Ordering};
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::SeqCst)
}
