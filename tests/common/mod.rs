//! Shared test infrastructure
//!
//! Starts a real upload server whose GitHub API is a wiremock server.

#![allow(dead_code)]

use repo_uploadr::config::{Config, GitHubConfig};
use repo_uploadr::server::Server;
use serde_json::{json, Value};
use std::net::SocketAddr;
use wiremock::MockServer;

pub const OWNER: &str = "octo";
pub const REPO: &str = "drop";
pub const TOKEN: &str = "test-token";

/// Configuration pointing at `api_url` with an OS-assigned listen port
pub fn test_config(api_url: &str) -> Config {
    let mut config = Config {
        github: GitHubConfig {
            owner: OWNER.into(),
            repo: REPO.into(),
            token: TOKEN.into(),
            api_url: api_url.into(),
            ..Default::default()
        },
        ..Default::default()
    };
    config.server.address = "127.0.0.1:0".into();
    config.metrics.enabled = false;
    config
}

/// Test environment: a running upload server in front of a mock GitHub
pub struct TestEnv {
    pub github: MockServer,
    pub addr: SocketAddr,
    pub client: reqwest::Client,
    _server_handle: tokio::task::JoinHandle<()>,
}

impl TestEnv {
    pub async fn start() -> Self {
        let github = MockServer::start().await;
        let server = Server::from_config(&test_config(&github.uri()))
            .await
            .expect("server should bind");
        let addr = server.local_addr();

        let server_handle = tokio::spawn(async move {
            let _ = server.run_until(std::future::pending()).await;
        });

        Self {
            github,
            addr,
            client: reqwest::Client::new(),
            _server_handle: server_handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn post_form(&self, form: reqwest::multipart::Form) -> reqwest::Response {
        self.client
            .post(self.url("/upload"))
            .multipart(form)
            .send()
            .await
            .expect("request should complete")
    }

    /// Path and JSON body of every request the mock GitHub received, in order
    pub async fn commits(&self) -> Vec<(String, Value)> {
        self.github
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .map(|req| {
                let body = serde_json::from_slice(&req.body).unwrap_or(Value::Null);
                (req.url.path().to_string(), body)
            })
            .collect()
    }
}

/// Contents API success body
pub fn contents_created(html_url: &str) -> Value {
    json!({
        "content": {"name": "x", "path": "x", "html_url": html_url},
        "commit": {"sha": "abc123"}
    })
}

/// True when `path` is `uploads/<19 char timestamp>-<8 hex>/<name>`
pub fn is_generated_path(path: &str, name: &str) -> bool {
    let parts: Vec<&str> = path.split('/').collect();
    if parts.len() != 3 || parts[0] != "uploads" || parts[2] != name {
        return false;
    }
    let dir = parts[1];
    if dir.len() != 28 {
        return false;
    }
    let (stamp, suffix) = dir.split_at(19);
    stamp.chars().all(|c| c.is_ascii_digit() || c == '-')
        && suffix.starts_with('-')
        && suffix[1..].chars().all(|c| c.is_ascii_hexdigit())
}
