//! GitHub contents API client
//!
//! Writes files with `PUT /repos/{owner}/{repo}/contents/{path}`.
//!
//! # Example
//!
//! ```no_run
//! use repo_uploadr::repository::{GitHubClient, GitHubClientConfig, RepositoryClient, RepositoryTarget};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = GitHubClient::new(GitHubClientConfig {
//!     api_url: "https://api.github.com".to_string(),
//!     token: "ghp_example".to_string(),
//! })?;
//! let target = RepositoryTarget {
//!     owner: "octo".to_string(),
//!     repo: "drop".to_string(),
//!     branch: "main".to_string(),
//! };
//! let commit = client
//!     .create_or_update_file(&target, "uploads/hello.txt", "Add hello", "aGVsbG8=")
//!     .await?;
//! println!("Written to {:?}", commit.content_url);
//! # Ok(())
//! # }
//! ```

use super::{FileCommit, RemoteWriteError, RepositoryClient, RepositoryTarget};
use crate::config::GitHubConfig;
use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Characters escaped inside a single path segment
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

const API_VERSION: &str = "2022-11-28";

/// GitHub client configuration
#[derive(Clone)]
pub struct GitHubClientConfig {
    pub api_url: String,
    pub token: String,
}

impl fmt::Debug for GitHubClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubClientConfig")
            .field("api_url", &self.api_url)
            .field("token", &"***")
            .finish()
    }
}

impl From<&GitHubConfig> for GitHubClientConfig {
    fn from(config: &GitHubConfig) -> Self {
        Self {
            api_url: config.api_url.clone(),
            token: config.token.clone(),
        }
    }
}

#[derive(Serialize)]
struct PutContentsBody<'a> {
    message: &'a str,
    content: &'a str,
    branch: &'a str,
}

/// GitHub client
pub struct GitHubClient {
    api_url: String,
    http_client: reqwest::Client,
}

impl GitHubClient {
    /// Create a new GitHub client
    pub fn new(config: GitHubClientConfig) -> Result<Self, RemoteWriteError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.token))
            .map_err(|e| RemoteWriteError::Request(format!("Invalid token: {}", e)))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static(API_VERSION),
        );

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| RemoteWriteError::Request(e.to_string()))?;

        Ok(Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    /// Get the API base URL
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// URL of the contents endpoint for `path`
    pub fn contents_url(&self, target: &RepositoryTarget, path: &str) -> String {
        let encoded_path = path
            .split('/')
            .map(|segment| utf8_percent_encode(segment, SEGMENT).to_string())
            .collect::<Vec<_>>()
            .join("/");

        format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_url,
            utf8_percent_encode(&target.owner, SEGMENT),
            utf8_percent_encode(&target.repo, SEGMENT),
            encoded_path
        )
    }
}

/// Pull `content.html_url` out of a contents API response
fn content_html_url(body: &Value) -> Option<String> {
    body.get("content")?
        .get("html_url")?
        .as_str()
        .map(str::to_string)
}

#[async_trait]
impl RepositoryClient for GitHubClient {
    #[tracing::instrument(
        name = "repository.create_or_update_file",
        skip(self, commit_message, base64_content),
        fields(
            repo.owner = %target.owner,
            repo.name = %target.repo,
            repo.branch = %target.branch,
            repo.path = %path,
            upload.bytes = base64_content.len(),
            http.status_code = tracing::field::Empty
        ),
        err
    )]
    async fn create_or_update_file(
        &self,
        target: &RepositoryTarget,
        path: &str,
        commit_message: &str,
        base64_content: &str,
    ) -> Result<FileCommit, RemoteWriteError> {
        let url = self.contents_url(target, path);
        let body = PutContentsBody {
            message: commit_message,
            content: base64_content,
            branch: &target.branch,
        };

        let response = self
            .http_client
            .put(&url)
            .header(
                USER_AGENT,
                concat!("repo-uploadr/", env!("CARGO_PKG_VERSION")),
            )
            .json(&body)
            .send()
            .await
            .map_err(|e| RemoteWriteError::Request(e.to_string()))?;

        let status = response.status();
        tracing::Span::current().record("http.status_code", status.as_u16());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RemoteWriteError::Request(e.to_string()))?;

        if !status.is_success() {
            let details: Option<Value> = serde_json::from_slice(&bytes).ok();
            let message = details
                .as_ref()
                .and_then(|d| d.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
                });

            return Err(RemoteWriteError::Status {
                status: status.as_u16(),
                message,
                details,
            });
        }

        let parsed: Value =
            serde_json::from_slice(&bytes).map_err(|e| RemoteWriteError::Decode(e.to_string()))?;
        let content_url = content_html_url(&parsed);

        tracing::info!(
            path = %path,
            content_url = ?content_url,
            "File committed"
        );

        Ok(FileCommit { content_url })
    }
}
