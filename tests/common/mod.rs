#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};

use reel_api::auth::password::hash_password;
use reel_api::config::AppConfig;
use reel_api::database::models::{NewUser, TokenScope};
use reel_api::database::{MemoryStore, Store};
use reel_api::mailer::{Email, Mailer, MailerError};
use reel_api::AppState;

pub const PASSWORD: &str = "pa55word1234";

/// Keeps every message instead of delivering it.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &Email) -> Result<(), MailerError> {
        self.sent
            .lock()
            .map_err(|_| MailerError::Delivery("poisoned".to_string()))?
            .push(email.clone());
        Ok(())
    }
}

impl RecordingMailer {
    /// Emails are sent from a background task, so poll briefly.
    pub async fn wait_for(&self, to: &str) -> Result<Email> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(email) = self
                .sent
                .lock()
                .map_err(|_| anyhow::anyhow!("mailer lock poisoned"))?
                .iter()
                .find(|e| e.to == to)
                .cloned()
            {
                return Ok(email);
            }
            if Instant::now() > deadline {
                anyhow::bail!("no email to {} within 5s", to);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

/// Pull the activation token out of a welcome email body.
pub fn activation_token(email: &Email) -> Result<String> {
    let marker = "{\"token\": \"";
    let start = email
        .plain_body
        .find(marker)
        .context("welcome email has no token")?
        + marker.len();
    let token: String = email.plain_body[start..].chars().take(22).collect();
    anyhow::ensure!(token.len() == 22, "truncated token in welcome email");
    Ok(token)
}

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub state: AppState,
    pub mailer: Arc<RecordingMailer>,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Development config with the rate limiter off.
    pub async fn start() -> Result<Self> {
        Self::start_with(|_| {}).await
    }

    pub async fn start_with(configure: impl FnOnce(&mut AppConfig)) -> Result<Self> {
        let mut config = AppConfig::development();
        config.limiter.enabled = false;
        config.cors.trusted_origins.clear();
        configure(&mut config);

        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);
        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind test listener")?;

        let mailer = Arc::new(RecordingMailer::default());
        let state = AppState::new(config, Arc::new(MemoryStore::new()), mailer.clone());
        let app = reel_api::app(state.clone());

        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
        });

        let server = Self {
            port,
            base_url,
            state,
            mailer,
            client: reqwest::Client::new(),
        };
        server.wait_ready(Duration::from_secs(5)).await?;
        Ok(server)
    }

    /// Probe with a bare TCP connect so readiness checks never spend
    /// rate-limit tokens.
    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if TcpStream::connect(("127.0.0.1", self.port)).await.is_ok() {
                return Ok(());
            }
            if Instant::now() > deadline {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Create a user straight in the store, bypassing registration.
    pub async fn seed_user(&self, email: &str, activated: bool, permissions: &[&str]) -> Result<i64> {
        let store = &self.state.store;
        let user = store
            .insert_user(NewUser {
                name: "Test User".to_string(),
                email: email.to_string(),
                password_hash: hash_password(PASSWORD.to_string()).await?,
            })
            .await?;

        if activated {
            let issued = self
                .state
                .tokens
                .issue(user.id, TokenScope::Activation, chrono::Duration::minutes(5))
                .await?;
            self.state.tokens.consume_activation(&issued.plaintext).await?;
        }
        if !permissions.is_empty() {
            store.add_permissions(user.id, permissions).await?;
        }
        Ok(user.id)
    }

    /// Log in over HTTP and return the plaintext bearer token.
    pub async fn login(&self, email: &str) -> Result<String> {
        let res = self
            .client
            .post(self.url("/v1/tokens/authentication"))
            .json(&json!({ "email": email, "password": PASSWORD }))
            .send()
            .await?;
        anyhow::ensure!(
            res.status() == StatusCode::CREATED,
            "login failed with {}",
            res.status()
        );
        let body: Value = res.json().await?;
        body["data"]["token"]
            .as_str()
            .map(str::to_string)
            .context("login response has no token")
    }

    /// Seeded, activated user holding `permissions`; returns a bearer token.
    pub async fn user_with(&self, email: &str, permissions: &[&str]) -> Result<String> {
        self.seed_user(email, true, permissions).await?;
        self.login(email).await
    }
}
