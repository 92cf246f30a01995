//! HTTP client for a running jobstatus server.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

use crate::tracker::api::LoginResponse;
use crate::tracker::models::{DueTaskGroup, ProjectWithUnits};

pub struct TrackerClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl TrackerClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turn a non-success response into an error carrying the server's
    /// `{"error": ...}` message.
    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
        let status = resp.status();
        if !status.is_success() {
            let body: serde_json::Value = resp.json().await.unwrap_or_default();
            let message = body["error"].as_str().unwrap_or("no error message");
            anyhow::bail!("Server returned {}: {}", status, message);
        }
        resp.json::<T>()
            .await
            .context("Failed to parse server response")
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let req = self.http.get(self.url(path));
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse> {
        let resp = self
            .http
            .post(self.url("/api/login"))
            .json(&serde_json::json!({"username": username, "password": password}))
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", self.base_url))?;
        Self::decode(resp).await
    }

    pub async fn projects(&self, archived: Option<bool>) -> Result<Vec<ProjectWithUnits>> {
        let mut req = self.get("/api/projects");
        if let Some(flag) = archived {
            req = req.query(&[("archived", flag)]);
        }
        let resp = req
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", self.base_url))?;
        Self::decode(resp).await
    }

    pub async fn due_tasks(&self) -> Result<Vec<DueTaskGroup>> {
        let resp = self
            .get("/api/due-tasks")
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", self.base_url))?;
        Self::decode(resp).await
    }
}
