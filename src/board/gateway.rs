use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::models::{Candidate, CandidatePage, CandidateStatus, Job, NewCandidate, SessionUser};
use crate::errors::GatewayError;

/// Page size the server is asked for on every candidate listing.
pub const DEFAULT_PAGE_SIZE: u32 = 3;

/// Proposed status/position change for one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateUpdate {
    pub status: CandidateStatus,
    pub position: f64,
    /// `updated_at` the client last saw; the server may reject the write if it moved on.
    pub prior_updated_at: DateTime<Utc>,
}

/// Abstraction over the server API for testability.
/// Real implementation: `HttpGateway`.
#[async_trait]
pub trait CandidateGateway: Send + Sync {
    async fn get_job(&self, job_id: &str) -> Result<Job, GatewayError>;

    /// First page across all statuses (with column counts) when `status` is
    /// `None`, otherwise the next page of `status` after `cursor`.
    async fn get_all_for_job(
        &self,
        job_id: &str,
        status: Option<CandidateStatus>,
        cursor: Option<f64>,
    ) -> Result<CandidatePage, GatewayError>;

    async fn create_candidate(
        &self,
        job_id: &str,
        props: &NewCandidate,
        actor: &SessionUser,
    ) -> Result<Candidate, GatewayError>;

    async fn update_candidate(
        &self,
        job_id: &str,
        candidate_id: i64,
        update: &CandidateUpdate,
        actor: &SessionUser,
    ) -> Result<Candidate, GatewayError>;
}

// ── Wire payloads ────────────────────────────────────────────────────

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Serialize)]
struct CreateCandidateBody<'a> {
    props: &'a NewCandidate,
    user: &'a SessionUser,
}

#[derive(Serialize)]
struct CandidateChange {
    status: CandidateStatus,
    position: f64,
}

#[derive(Serialize)]
struct UpdateCandidateBody<'a> {
    candidate: CandidateChange,
    user: &'a SessionUser,
    current_candidate_updated_at: DateTime<Utc>,
}

// ── HTTP implementation ──────────────────────────────────────────────

/// JSON-over-HTTP gateway. Every response body is wrapped in `{"data": ...}`.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    page_size: u32,
}

impl HttpGateway {
    pub fn new(base_url: &str, page_size: u32, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            page_size,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn candidates_url(&self, job_id: &str) -> String {
        format!("{}/jobs/{}/candidates", self.base_url, job_id)
    }
}

async fn unwrap_data<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, GatewayError> {
    let status = resp.status();
    if !status.is_success() {
        return Err(GatewayError::Status {
            status: status.as_u16(),
        });
    }
    let body = resp.bytes().await?;
    let envelope: Envelope<T> =
        serde_json::from_slice(&body).map_err(|e| GatewayError::Decode(e.to_string()))?;
    Ok(envelope.data)
}

#[async_trait]
impl CandidateGateway for HttpGateway {
    async fn get_job(&self, job_id: &str) -> Result<Job, GatewayError> {
        let url = format!("{}/jobs/{}", self.base_url, job_id);
        debug!(%url, "fetching job");
        let resp = self.client.get(&url).send().await?;
        unwrap_data(resp).await
    }

    async fn get_all_for_job(
        &self,
        job_id: &str,
        status: Option<CandidateStatus>,
        cursor: Option<f64>,
    ) -> Result<CandidatePage, GatewayError> {
        let mut query = vec![("limit", self.page_size.to_string())];
        match status {
            None => query.push(("with_column", "true".to_string())),
            Some(status) => {
                query.push(("with_column", "false".to_string()));
                query.push(("status", status.as_str().to_string()));
                query.push(("cursor", cursor.unwrap_or(0.0).to_string()));
            }
        }

        let url = self.candidates_url(job_id);
        debug!(%url, ?status, ?cursor, "fetching candidates page");
        let resp = self.client.get(&url).query(&query).send().await?;
        unwrap_data(resp).await
    }

    async fn create_candidate(
        &self,
        job_id: &str,
        props: &NewCandidate,
        actor: &SessionUser,
    ) -> Result<Candidate, GatewayError> {
        let body = CreateCandidateBody { props, user: actor };
        let resp = self
            .client
            .post(self.candidates_url(job_id))
            .json(&body)
            .send()
            .await?;
        unwrap_data(resp).await
    }

    async fn update_candidate(
        &self,
        job_id: &str,
        candidate_id: i64,
        update: &CandidateUpdate,
        actor: &SessionUser,
    ) -> Result<Candidate, GatewayError> {
        let body = UpdateCandidateBody {
            candidate: CandidateChange {
                status: update.status,
                position: update.position,
            },
            user: actor,
            current_candidate_updated_at: update.prior_updated_at,
        };
        let url = format!("{}/{}", self.candidates_url(job_id), candidate_id);
        let resp = self.client.put(&url).json(&body).send().await?;
        unwrap_data(resp).await
    }
}
