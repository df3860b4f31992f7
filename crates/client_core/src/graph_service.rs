use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use shared::{
    domain::UserSummary,
    error::{ErrorCode, RemoteException},
    protocol::{FollowListQuery, FollowOperation},
};
use tracing::debug;
use url::Url;

use crate::RemoteGraphService;

/// Follow graph served over HTTP/JSON.
///
/// `GET {base}/followers/{user}?limit=N` and `GET {base}/following/{user}?limit=N`
/// return account lists; `POST {base}/operations/follow` submits a follow operation.
pub struct HttpGraphService {
    http: Client,
    base_url: Url,
}

impl HttpGraphService {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_client(base_url, Client::new())
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build graph service http client")?;
        Self::with_client(base_url, http)
    }

    fn with_client(base_url: &str, http: Client) -> Result<Self> {
        let base_url = Url::parse(base_url.trim())
            .with_context(|| format!("invalid graph service url '{base_url}'"))?;
        if base_url.cannot_be_a_base() {
            return Err(anyhow!("graph service url '{base_url}' cannot be a base"));
        }
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("graph service url '{}' cannot be a base", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn fetch_accounts(
        &self,
        collection: &str,
        username: &str,
        limit: u32,
    ) -> Result<Vec<UserSummary>> {
        let url = self.endpoint(&[collection, username])?;
        debug!(%url, limit, "graph: fetching {collection}");
        let response = self
            .http
            .get(url.clone())
            .query(&FollowListQuery { limit })
            .send()
            .await
            .with_context(|| format!("failed to reach graph service at {url}"))?;
        let accounts = ensure_success(response)
            .await?
            .json::<Vec<UserSummary>>()
            .await
            .with_context(|| format!("malformed {collection} response from {url}"))?;
        Ok(accounts)
    }
}

async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let code = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ErrorCode::Unauthorized,
        StatusCode::NOT_FOUND => ErrorCode::NotFound,
        StatusCode::TOO_MANY_REQUESTS => ErrorCode::RateLimited,
        _ => ErrorCode::Remote,
    };
    let url = response.url().clone();
    let body = response.text().await.unwrap_or_default();
    let body = body.trim();
    let message = if body.is_empty() {
        format!("graph service returned {status} for {url}")
    } else {
        format!("graph service returned {status} for {url}: {body}")
    };
    Err(RemoteException::new(code, message).into())
}

#[async_trait]
impl RemoteGraphService for HttpGraphService {
    async fn get_followers(&self, username: &str, limit: u32) -> Result<Vec<UserSummary>> {
        self.fetch_accounts("followers", username, limit).await
    }

    async fn get_following(&self, username: &str, limit: u32) -> Result<Vec<UserSummary>> {
        self.fetch_accounts("following", username, limit).await
    }

    async fn submit_follow_op(&self, actor: &str, target: &str, unfollow: bool) -> Result<()> {
        let url = self.endpoint(&["operations", "follow"])?;
        let operation = FollowOperation::new(actor, target, unfollow);
        debug!(%url, actor, target, unfollow, "graph: submitting follow operation");
        let response = self
            .http
            .post(url.clone())
            .json(&operation)
            .send()
            .await
            .with_context(|| format!("failed to reach graph service at {url}"))?;
        ensure_success(response).await?;
        Ok(())
    }
}

pub struct MissingGraphService;

#[async_trait]
impl RemoteGraphService for MissingGraphService {
    async fn get_followers(&self, _username: &str, _limit: u32) -> Result<Vec<UserSummary>> {
        Err(anyhow!("graph service is unavailable"))
    }

    async fn get_following(&self, _username: &str, _limit: u32) -> Result<Vec<UserSummary>> {
        Err(anyhow!("graph service is unavailable"))
    }

    async fn submit_follow_op(&self, _actor: &str, _target: &str, _unfollow: bool) -> Result<()> {
        Err(anyhow!("graph service is unavailable"))
    }
}

#[cfg(test)]
#[path = "tests/graph_service_tests.rs"]
mod tests;
