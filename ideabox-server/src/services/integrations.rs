//! Issue-tracker integrations
//!
//! An [`Integration`] speaks one tracker's protocol; the
//! [`IntegrationRegistry`] maps a provider's `kind` to its implementation;
//! [`IntegrationService`] ties the protocol calls to stored providers,
//! repositories and links.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use ideabox_github::{
    generate_state, generate_webhook_secret, AccessToken, GitHubClient, GitHubError, Issue,
    Repository,
};
use sqlx::PgPool;

use crate::db::{DbError, IntegrationRepo, IssueLink, NewProvider, PostRepo, Provider, TrackedRepository};
use crate::models::{RepositoryName, ValidationError};

/// Path GitHub delivers webhooks to, relative to the public URL
pub const WEBHOOK_PATH: &str = "/api/webhooks/github";

#[derive(Debug, thiserror::Error)]
pub enum IntegrationError {
    #[error("unknown integration kind '{0}'")]
    UnknownKind(String),

    #[error("integration provider {0} is not connected")]
    NotConnected(Uuid),

    #[error("unknown or expired OAuth state")]
    InvalidState,

    #[error("#{0} is a pull request, not an issue")]
    NotAnIssue(i64),

    #[error("callback for '{expected}' reached the '{got}' route")]
    KindMismatch { expected: String, got: String },

    #[error("upstream error: {0}")]
    Upstream(#[from] GitHubError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Db(#[from] DbError),
}

/// One issue tracker's protocol
#[async_trait]
pub trait Integration: Send + Sync {
    fn kind(&self) -> &'static str;

    fn authorize_url(
        &self,
        provider: &Provider,
        redirect_uri: &str,
        state: &str,
    ) -> Result<String, IntegrationError>;

    async fn exchange_code(
        &self,
        provider: &Provider,
        code: &str,
        redirect_uri: &str,
    ) -> Result<AccessToken, IntegrationError>;

    async fn available_repositories(
        &self,
        token: &str,
        page: u32,
    ) -> Result<Vec<Repository>, IntegrationError>;

    async fn repository(&self, token: &str, full_name: &str) -> Result<Repository, IntegrationError>;

    /// Register a webhook; returns its remote id.
    async fn create_webhook(
        &self,
        token: &str,
        full_name: &str,
        target_url: &str,
        secret: &str,
    ) -> Result<i64, IntegrationError>;

    async fn delete_webhook(
        &self,
        token: &str,
        full_name: &str,
        hook_id: i64,
    ) -> Result<(), IntegrationError>;

    async fn search_issues(
        &self,
        token: &str,
        full_name: &str,
        query: &str,
    ) -> Result<Vec<Issue>, IntegrationError>;

    async fn get_issue(&self, token: &str, full_name: &str, number: i64) -> Result<Issue, IntegrationError>;

    async fn create_issue(
        &self,
        token: &str,
        full_name: &str,
        title: &str,
        body: &str,
    ) -> Result<Issue, IntegrationError>;
}

/// GitHub over its REST API and OAuth web flow
pub struct GitHubIntegration {
    client: GitHubClient,
    scopes: Vec<String>,
}

const REPOSITORY_PAGE_SIZE: u32 = 50;

impl GitHubIntegration {
    pub fn new(client: GitHubClient, scopes: Vec<String>) -> Self {
        Self { client, scopes }
    }
}

#[async_trait]
impl Integration for GitHubIntegration {
    fn kind(&self) -> &'static str {
        "github"
    }

    fn authorize_url(
        &self,
        provider: &Provider,
        redirect_uri: &str,
        state: &str,
    ) -> Result<String, IntegrationError> {
        Ok(self
            .client
            .authorize_url(&provider.client_id, redirect_uri, state, &self.scopes)?)
    }

    async fn exchange_code(
        &self,
        provider: &Provider,
        code: &str,
        redirect_uri: &str,
    ) -> Result<AccessToken, IntegrationError> {
        Ok(self
            .client
            .exchange_code(&provider.client_id, &provider.client_secret, code, redirect_uri)
            .await?)
    }

    async fn available_repositories(
        &self,
        token: &str,
        page: u32,
    ) -> Result<Vec<Repository>, IntegrationError> {
        Ok(self
            .client
            .with_token(token)
            .list_repositories(page, REPOSITORY_PAGE_SIZE)
            .await?)
    }

    async fn repository(&self, token: &str, full_name: &str) -> Result<Repository, IntegrationError> {
        Ok(self.client.with_token(token).get_repository(full_name).await?)
    }

    async fn create_webhook(
        &self,
        token: &str,
        full_name: &str,
        target_url: &str,
        secret: &str,
    ) -> Result<i64, IntegrationError> {
        let hook = self
            .client
            .with_token(token)
            .create_webhook(full_name, target_url, secret)
            .await?;
        Ok(hook.id)
    }

    async fn delete_webhook(
        &self,
        token: &str,
        full_name: &str,
        hook_id: i64,
    ) -> Result<(), IntegrationError> {
        Ok(self
            .client
            .with_token(token)
            .delete_webhook(full_name, hook_id)
            .await?)
    }

    async fn search_issues(
        &self,
        token: &str,
        full_name: &str,
        query: &str,
    ) -> Result<Vec<Issue>, IntegrationError> {
        Ok(self
            .client
            .with_token(token)
            .search_issues(full_name, query)
            .await?)
    }

    async fn get_issue(&self, token: &str, full_name: &str, number: i64) -> Result<Issue, IntegrationError> {
        Ok(self.client.with_token(token).get_issue(full_name, number).await?)
    }

    async fn create_issue(
        &self,
        token: &str,
        full_name: &str,
        title: &str,
        body: &str,
    ) -> Result<Issue, IntegrationError> {
        Ok(self
            .client
            .with_token(token)
            .create_issue(full_name, title, body)
            .await?)
    }
}

/// Integrations keyed by provider kind
#[derive(Clone, Default)]
pub struct IntegrationRegistry {
    integrations: HashMap<&'static str, Arc<dyn Integration>>,
}

impl IntegrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, integration: Arc<dyn Integration>) {
        self.integrations.insert(integration.kind(), integration);
    }

    pub fn get(&self, kind: &str) -> Result<Arc<dyn Integration>, IntegrationError> {
        self.integrations
            .get(kind)
            .cloned()
            .ok_or_else(|| IntegrationError::UnknownKind(kind.to_string()))
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<_> = self.integrations.keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }
}

/// Text of an issue created from a post
pub fn issue_body(post_body: &str, post_url: &str) -> String {
    let body = post_body.trim();
    if body.is_empty() {
        format!("Requested on IdeaBox: {post_url}")
    } else {
        format!("{body}\n\n---\nRequested on IdeaBox: {post_url}")
    }
}

/// Persistence-aware integration operations
pub struct IntegrationService<'a> {
    pool: &'a PgPool,
    registry: &'a IntegrationRegistry,
    public_url: &'a str,
}

impl<'a> IntegrationService<'a> {
    pub fn new(pool: &'a PgPool, registry: &'a IntegrationRegistry, public_url: &'a str) -> Self {
        Self {
            pool,
            registry,
            public_url,
        }
    }

    fn repo(&self) -> IntegrationRepo<'a> {
        IntegrationRepo::new(self.pool)
    }

    pub fn redirect_uri(&self, kind: &str) -> String {
        format!("{}/admin/integrations/{}/callback", self.public_url, kind)
    }

    pub fn webhook_url(&self) -> String {
        format!("{}{}", self.public_url, WEBHOOK_PATH)
    }

    pub async fn create_provider(&self, new: NewProvider) -> Result<Provider, IntegrationError> {
        self.registry.get(&new.kind)?;
        Ok(self.repo().create_provider(new).await?)
    }

    /// Start the OAuth handshake; returns the URL to send the admin to.
    pub async fn connect(&self, provider_id: Uuid) -> Result<String, IntegrationError> {
        let provider = self.repo().get_provider(provider_id).await?;
        let integration = self.registry.get(&provider.kind)?;

        let state = generate_state();
        self.repo().set_oauth_state(provider.id, &state).await?;
        integration.authorize_url(&provider, &self.redirect_uri(&provider.kind), &state)
    }

    /// Finish the OAuth handshake started by [`connect`](Self::connect).
    pub async fn callback(&self, kind: &str, state: &str, code: &str) -> Result<Provider, IntegrationError> {
        if state.is_empty() {
            return Err(IntegrationError::InvalidState);
        }
        let provider = self
            .repo()
            .find_by_oauth_state(state)
            .await?
            .ok_or(IntegrationError::InvalidState)?;
        if provider.kind != kind {
            return Err(IntegrationError::KindMismatch {
                expected: provider.kind,
                got: kind.to_string(),
            });
        }
        let integration = self.registry.get(&provider.kind)?;

        let token = integration
            .exchange_code(&provider, code, &self.redirect_uri(&provider.kind))
            .await
            .inspect_err(|e| tracing::warn!(provider = %provider.id, error = %e, "OAuth code exchange failed"))?;

        let provider = self
            .repo()
            .store_token(provider.id, &token.access_token, &token.scope)
            .await?;
        tracing::info!(provider = %provider.id, kind = %provider.kind, "integration connected");
        Ok(provider)
    }

    /// Drop the token and tracked repositories. Remote webhooks are removed
    /// on a best-effort basis.
    pub async fn disconnect(&self, provider_id: Uuid) -> Result<Provider, IntegrationError> {
        let provider = self.repo().get_provider(provider_id).await?;
        if let Some(token) = provider.access_token.as_deref() {
            let integration = self.registry.get(&provider.kind)?;
            for repository in self.repo().list_repositories(provider.id).await? {
                self.delete_webhook_best_effort(integration.as_ref(), token, &repository).await;
            }
        }
        let provider = self.repo().disconnect(provider.id).await?;
        tracing::info!(provider = %provider.id, "integration disconnected");
        Ok(provider)
    }

    pub async fn available_repositories(
        &self,
        provider_id: Uuid,
        page: u32,
    ) -> Result<Vec<Repository>, IntegrationError> {
        let (provider, integration, token) = self.connected(provider_id).await?;
        integration
            .available_repositories(&token, page.max(1))
            .await
            .inspect_err(|e| warn_upstream(&provider, "list repositories", e))
    }

    /// Track a repository and register its webhook.
    pub async fn add_repository(
        &self,
        provider_id: Uuid,
        full_name: RepositoryName,
    ) -> Result<TrackedRepository, IntegrationError> {
        let (provider, integration, token) = self.connected(provider_id).await?;

        let remote = integration
            .repository(&token, full_name.as_str())
            .await
            .inspect_err(|e| warn_upstream(&provider, "fetch repository", e))?;
        let secret = generate_webhook_secret();
        let hook_id = integration
            .create_webhook(&token, &remote.full_name, &self.webhook_url(), &secret)
            .await
            .inspect_err(|e| warn_upstream(&provider, "create webhook", e))?;

        let stored = self
            .repo()
            .add_repository(provider.id, &remote.full_name, remote.id, Some(hook_id), &secret)
            .await;
        match stored {
            Ok(repository) => {
                tracing::info!(repository = %repository.full_name, hook_id, "repository tracked");
                Ok(repository)
            }
            Err(e) => {
                // Don't leave an orphaned hook behind on GitHub.
                if let Err(cleanup) = integration.delete_webhook(&token, &remote.full_name, hook_id).await {
                    warn_upstream(&provider, "delete webhook", &cleanup);
                }
                Err(e.into())
            }
        }
    }

    pub async fn remove_repository(&self, repository_id: Uuid) -> Result<(), IntegrationError> {
        let repository = self.repo().get_repository(repository_id).await?;
        let provider = self.repo().get_provider(repository.provider_id).await?;
        if let Some(token) = provider.access_token.as_deref() {
            let integration = self.registry.get(&provider.kind)?;
            self.delete_webhook_best_effort(integration.as_ref(), token, &repository).await;
        }
        self.repo().remove_repository(repository.id).await?;
        tracing::info!(repository = %repository.full_name, "repository removed");
        Ok(())
    }

    pub async fn search_issues(
        &self,
        repository_id: Uuid,
        query: &str,
    ) -> Result<Vec<Issue>, IntegrationError> {
        let repository = self.repo().get_repository(repository_id).await?;
        let (provider, integration, token) = self.connected(repository.provider_id).await?;
        integration
            .search_issues(&token, &repository.full_name, query)
            .await
            .inspect_err(|e| warn_upstream(&provider, "search issues", e))
    }

    /// Link an existing issue to a post.
    pub async fn link_issue(
        &self,
        post_id: Uuid,
        repository_id: Uuid,
        issue_number: i64,
    ) -> Result<IssueLink, IntegrationError> {
        let post = PostRepo::new(self.pool).get(post_id).await?;
        let repository = self.repo().get_repository(repository_id).await?;
        let (provider, integration, token) = self.connected(repository.provider_id).await?;

        let issue = integration
            .get_issue(&token, &repository.full_name, issue_number)
            .await
            .inspect_err(|e| warn_upstream(&provider, "fetch issue", e))?;
        if issue.is_pull_request() {
            return Err(IntegrationError::NotAnIssue(issue.number));
        }

        Ok(self
            .repo()
            .upsert_link(
                post.id,
                repository.id,
                issue.number,
                &issue.title,
                &issue.html_url,
                issue.state.as_str(),
            )
            .await?)
    }

    /// Open a new issue from a post and link it.
    pub async fn create_issue_for_post(
        &self,
        post_id: Uuid,
        repository_id: Uuid,
        post_url: &str,
    ) -> Result<IssueLink, IntegrationError> {
        let post = PostRepo::new(self.pool).get(post_id).await?;
        let repository = self.repo().get_repository(repository_id).await?;
        let (provider, integration, token) = self.connected(repository.provider_id).await?;

        let issue = integration
            .create_issue(&token, &repository.full_name, &post.title, &issue_body(&post.body, post_url))
            .await
            .inspect_err(|e| warn_upstream(&provider, "create issue", e))?;
        tracing::info!(post = %post.id, issue = issue.number, repository = %repository.full_name, "issue created from post");

        Ok(self
            .repo()
            .upsert_link(
                post.id,
                repository.id,
                issue.number,
                &issue.title,
                &issue.html_url,
                issue.state.as_str(),
            )
            .await?)
    }

    pub async fn unlink(&self, link_id: Uuid) -> Result<(), IntegrationError> {
        Ok(self.repo().delete_link(link_id).await?)
    }

    async fn connected(
        &self,
        provider_id: Uuid,
    ) -> Result<(Provider, Arc<dyn Integration>, String), IntegrationError> {
        let provider = self.repo().get_provider(provider_id).await?;
        let integration = self.registry.get(&provider.kind)?;
        let token = provider
            .access_token
            .clone()
            .ok_or(IntegrationError::NotConnected(provider.id))?;
        Ok((provider, integration, token))
    }

    async fn delete_webhook_best_effort(
        &self,
        integration: &dyn Integration,
        token: &str,
        repository: &TrackedRepository,
    ) {
        let Some(hook_id) = repository.webhook_id else {
            return;
        };
        if let Err(e) = integration
            .delete_webhook(token, &repository.full_name, hook_id)
            .await
        {
            tracing::warn!(repository = %repository.full_name, hook_id, error = %e, "failed to delete webhook");
        }
    }
}

fn warn_upstream(provider: &Provider, action: &str, error: &IntegrationError) {
    tracing::warn!(provider = %provider.id, kind = %provider.kind, action, error = %error, "integration call failed");
}
