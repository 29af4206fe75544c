//! GitHub REST client
//!
//! One `reqwest::Client` is shared; `with_token` produces cheap per-provider
//! clones carrying that provider's OAuth token.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{GitHubError, Result};
use crate::oauth::{self, AccessToken, TokenResponse};
use crate::types::{ApiErrorBody, GitHubUser, Hook, Issue, Repository, SearchResults};

const API_VERSION: &str = "2022-11-28";
const API_ACCEPT: &str = "application/vnd.github+json";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const SEARCH_PAGE_SIZE: u32 = 20;

/// Base URLs; overridable for GitHub Enterprise and tests
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub api_url: String,
    pub oauth_url: String,
    pub user_agent: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            oauth_url: "https://github.com".to_string(),
            user_agent: "ideabox".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct GitHubClient {
    http: Client,
    endpoints: Arc<Endpoints>,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(endpoints: Endpoints) -> Result<Self> {
        let http = Client::builder()
            .user_agent(endpoints.user_agent.clone())
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            endpoints: Arc::new(endpoints),
            token: None,
        })
    }

    /// Clone of this client authenticated with `token`.
    pub fn with_token(&self, token: impl Into<String>) -> Self {
        Self {
            http: self.http.clone(),
            endpoints: Arc::clone(&self.endpoints),
            token: Some(token.into()),
        }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn authorize_url(
        &self,
        client_id: &str,
        redirect_uri: &str,
        state: &str,
        scopes: &[String],
    ) -> Result<String> {
        oauth::authorize_url(&self.endpoints.oauth_url, client_id, redirect_uri, state, scopes)
    }

    /// Trade an OAuth callback `code` for an access token.
    pub async fn exchange_code(
        &self,
        client_id: &str,
        client_secret: &str,
        code: &str,
        redirect_uri: &str,
    ) -> Result<AccessToken> {
        let url = format!("{}/login/oauth/access_token", self.endpoints.oauth_url);
        let resp = self
            .http
            .post(&url)
            .header(ACCEPT, "application/json")
            .form(&[
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await?;

        let body: TokenResponse = check_status(resp).await?.json().await?;
        body.into_token().map_err(GitHubError::OAuth)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Response> {
        let token = self.token.as_deref().ok_or(GitHubError::MissingToken)?;
        let url = format!("{}{}", self.endpoints.api_url, path);

        let mut req = self
            .http
            .request(method.clone(), &url)
            .bearer_auth(token)
            .header(ACCEPT, API_ACCEPT)
            .header("X-GitHub-Api-Version", API_VERSION);
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        debug!(%method, path, "GitHub API request");
        let resp = req.send().await?;
        check_status(resp).await
    }

    /// Generic authenticated call returning a decoded JSON body.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T> {
        Ok(self.send(method, path, &[], body).await?.json().await?)
    }

    pub async fn current_user(&self) -> Result<GitHubUser> {
        self.request(Method::GET, "/user", None).await
    }

    /// Repositories the token can see, most recently updated first.
    pub async fn list_repositories(&self, page: u32, per_page: u32) -> Result<Vec<Repository>> {
        let query = [
            ("sort", "updated".to_string()),
            ("affiliation", "owner,collaborator,organization_member".to_string()),
            ("per_page", per_page.to_string()),
            ("page", page.to_string()),
        ];
        Ok(self
            .send(Method::GET, "/user/repos", &query, None)
            .await?
            .json()
            .await?)
    }

    pub async fn get_repository(&self, full_name: &str) -> Result<Repository> {
        let path = format!("/repos/{}", full_name);
        self.request(Method::GET, &path, None).await
    }

    /// Search issues (pull requests excluded) in one repository.
    pub async fn search_issues(&self, full_name: &str, text: &str) -> Result<Vec<Issue>> {
        let q = format!("repo:{} is:issue {}", full_name, text.trim());
        let query = [
            ("q", q.trim_end().to_string()),
            ("per_page", SEARCH_PAGE_SIZE.to_string()),
        ];
        let results: SearchResults<Issue> = self
            .send(Method::GET, "/search/issues", &query, None)
            .await?
            .json()
            .await?;

        Ok(results
            .items
            .into_iter()
            .filter(|issue| !issue.is_pull_request())
            .collect())
    }

    pub async fn get_issue(&self, full_name: &str, number: i64) -> Result<Issue> {
        let path = format!("/repos/{}/issues/{}", full_name, number);
        self.request(Method::GET, &path, None).await
    }

    pub async fn create_issue(&self, full_name: &str, title: &str, body: &str) -> Result<Issue> {
        let path = format!("/repos/{}/issues", full_name);
        let payload = json!({ "title": title, "body": body });
        self.request(Method::POST, &path, Some(&payload)).await
    }

    /// Register an `issues` webhook delivering JSON to `target_url`.
    pub async fn create_webhook(&self, full_name: &str, target_url: &str, secret: &str) -> Result<Hook> {
        let path = format!("/repos/{}/hooks", full_name);
        let payload = json!({
            "name": "web",
            "active": true,
            "events": ["issues"],
            "config": {
                "url": target_url,
                "content_type": "json",
                "secret": secret,
                "insecure_ssl": "0"
            }
        });
        self.request(Method::POST, &path, Some(&payload)).await
    }

    /// Delete a webhook. A hook that is already gone counts as deleted.
    pub async fn delete_webhook(&self, full_name: &str, hook_id: i64) -> Result<()> {
        let path = format!("/repos/{}/hooks/{}", full_name, hook_id);
        match self.send(Method::DELETE, &path, &[], None).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                debug!(full_name, hook_id, "webhook already deleted");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

async fn check_status(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&text)
        .map(|b| b.message)
        .unwrap_or_else(|_| {
            if text.is_empty() {
                status.canonical_reason().unwrap_or("unknown error").to_string()
            } else {
                text
            }
        });

    Err(GitHubError::Api {
        status: status.as_u16(),
        message,
    })
}
