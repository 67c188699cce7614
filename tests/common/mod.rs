//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use gatekeeper::clock::ManualClock;
use gatekeeper::data::{Scope, Token, User, UserId};
use gatekeeper::notify::TokenNotifier;
use gatekeeper::store::{MemoryStore, PermissionStore, Stores};
use gatekeeper::{GateError, GatekeeperConfig, HttpServer, Shutdown};

/// Hands every delivered token to the test instead of a mailbox.
struct CapturingNotifier {
    tx: mpsc::UnboundedSender<(Scope, UserId, String)>,
}

#[async_trait]
impl TokenNotifier for CapturingNotifier {
    async fn deliver(&self, recipient: &User, token: &Token) -> Result<(), GateError> {
        let _ = self
            .tx
            .send((token.scope(), recipient.id, token.plaintext().to_string()));
        Ok(())
    }
}

/// Config for tests: limiter off so helpers can make many calls.
pub fn test_config() -> GatekeeperConfig {
    let mut config = GatekeeperConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.rate_limit.enabled = false;
    config
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub client: reqwest::Client,
    pub clock: ManualClock,
    pub store: Arc<MemoryStore>,
    delivered: Mutex<mpsc::UnboundedReceiver<(Scope, UserId, String)>>,
    shutdown: Shutdown,
    run: Option<JoinHandle<std::io::Result<()>>>,
}

/// Start a server on an ephemeral port.
pub async fn spawn_server(config: GatekeeperConfig) -> TestServer {
    let (tx, rx) = mpsc::unbounded_channel();
    start(config, Arc::new(CapturingNotifier { tx }), rx).await
}

/// Start a server whose tokens go to `notifier`; `next_delivered` is unusable.
pub async fn spawn_server_with_notifier(
    config: GatekeeperConfig,
    notifier: Arc<dyn TokenNotifier>,
) -> TestServer {
    let (_, rx) = mpsc::unbounded_channel();
    start(config, notifier, rx).await
}

async fn start(
    config: GatekeeperConfig,
    notifier: Arc<dyn TokenNotifier>,
    delivered: mpsc::UnboundedReceiver<(Scope, UserId, String)>,
) -> TestServer {
    let clock = ManualClock::default();
    let store = Arc::new(MemoryStore::new(Arc::new(clock.clone())));

    let server = HttpServer::new(
        config,
        Stores::shared(store.clone()),
        Arc::new(clock.clone()),
        notifier,
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let run = tokio::spawn(server.run(listener, shutdown.clone()));

    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap();

    TestServer {
        addr,
        client,
        clock,
        store,
        delivered: Mutex::new(delivered),
        shutdown,
        run: Some(run),
    }
}

impl TestServer {
    /// Trigger shutdown and wait for `run` to return.
    pub async fn stop(mut self) -> std::io::Result<()> {
        self.shutdown.trigger();
        let run = self.run.take().expect("server already stopped");
        tokio::time::timeout(Duration::from_secs(10), run)
            .await
            .expect("server did not stop in time")
            .expect("server task panicked")
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// The next token handed to the notifier.
    pub async fn next_delivered(&self, scope: Scope) -> String {
        let mut rx = self.delivered.lock().await;
        let (delivered_scope, _, plaintext) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no token delivered in time")
            .expect("notifier channel closed");
        assert_eq!(delivered_scope, scope);
        plaintext
    }

    pub async fn register(&self, email: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/v1/users"))
            .json(&json!({ "name": "Test User", "email": email, "password": password }))
            .send()
            .await
            .unwrap()
    }

    pub async fn activate(&self, token: &str) -> reqwest::Response {
        self.client
            .put(self.url("/v1/users/activated"))
            .json(&json!({ "token": token }))
            .send()
            .await
            .unwrap()
    }

    pub async fn login(&self, email: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/v1/tokens/authentication"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .unwrap()
    }

    /// Registers, activates, grants `extra` codes and logs in.
    /// Returns (user id, authentication token).
    pub async fn activated_user(&self, email: &str, extra: &[&str]) -> (UserId, String) {
        let res = self.register(email, "pa55word!").await;
        assert_eq!(res.status(), 202);
        let body: Value = res.json().await.unwrap();
        let user_id = body["user"]["id"].as_i64().unwrap();

        let activation = self.next_delivered(Scope::Activation).await;
        assert_eq!(self.activate(&activation).await.status(), 200);

        if !extra.is_empty() {
            self.store.add_for_user(user_id, extra).await.unwrap();
        }

        let res = self.login(email, "pa55word!").await;
        assert_eq!(res.status(), 201);
        let body: Value = res.json().await.unwrap();
        let token = body["authentication_token"]["token"]
            .as_str()
            .unwrap()
            .to_string();
        (user_id, token)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}
