use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::{StatusCode, header};
use serde::{Deserialize, Serialize};

use super::{AutosaveRequest, DraftSnapshot};
use crate::db::user::Role;

/// Who is editing, as reported by the session collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub author_id: String,
    pub role: Role,
}

/// A failed persistence call. The coordinator treats every variant the same way.
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("save rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("invalid response: {0}")]
    Decode(String),
}

/// Somewhere drafts can be durably stored.
///
/// The returned future must own everything it needs, since the coordinator may detach it.
pub trait Persist: Send + Sync + 'static {
    fn persist(&self, author: &Identity, draft: &DraftSnapshot) -> BoxFuture<'static, Result<DraftSnapshot, SaveError>>;
}

/// The persistence endpoint of a running server, authenticated with a session token.
#[derive(Clone)]
pub struct HttpEndpoint {
    base_url: String,
    session: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl HttpEndpoint {
    pub fn new(base_url: &str, session: &str) -> anyhow::Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            session: session.to_string(),
            http: reqwest::Client::builder().timeout(Duration::from_secs(30)).build()?,
        })
    }

    fn cookie(&self) -> String {
        format!("session={}", self.session)
    }

    /// Ask the server who our session belongs to. `None` if the session isn't valid.
    pub async fn whoami(&self) -> Result<Option<Identity>, SaveError> {
        let res = self
            .http
            .get(format!("{}/api/me", self.base_url))
            .header(header::COOKIE, self.cookie())
            .send()
            .await?;

        match res.status() {
            StatusCode::UNAUTHORIZED => Ok(None),
            _ => Ok(Some(decode(res).await?)),
        }
    }

    /// Load one of our own drafts, as last stored. `None` if it doesn't exist or isn't ours.
    pub async fn fetch(&self, identifier: &str) -> Result<Option<DraftSnapshot>, SaveError> {
        let res = self
            .http
            .get(format!("{}/api/posts/{identifier}", self.base_url))
            .header(header::COOKIE, self.cookie())
            .send()
            .await?;

        match res.status() {
            StatusCode::NOT_FOUND => Ok(None),
            _ => Ok(Some(decode(res).await?)),
        }
    }
}

impl Persist for HttpEndpoint {
    fn persist(&self, author: &Identity, draft: &DraftSnapshot) -> BoxFuture<'static, Result<DraftSnapshot, SaveError>> {
        let body = AutosaveRequest { draft: draft.clone(), author_id: author.author_id.clone() };
        let req = self
            .http
            .post(format!("{}/api/posts/autosave", self.base_url))
            .header(header::COOKIE, self.cookie())
            .json(&body);

        Box::pin(async move { decode(req.send().await?).await })
    }
}

async fn decode<T: serde::de::DeserializeOwned>(res: reqwest::Response) -> Result<T, SaveError> {
    let status = res.status();
    if !status.is_success() {
        let message = match res.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status.canonical_reason().unwrap_or("unknown error").to_string(),
        };
        return Err(SaveError::Rejected { status: status.as_u16(), message });
    }
    res.json::<T>().await.map_err(|e| SaveError::Decode(e.to_string()))
}
