//! Builders and test doubles shared by the board unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Notify, oneshot};

use super::gateway::{CandidateGateway, CandidateUpdate};
use super::models::{
    Candidate, CandidatePage, CandidateStatus, ColumnCounts, Job, NewCandidate, SessionUser,
};
use crate::errors::GatewayError;

pub fn fixed_time() -> DateTime<Utc> {
    DateTime::from_timestamp(1_704_067_200, 0).unwrap()
}

pub struct CandidateBuilder {
    candidate: Candidate,
}

pub fn a_candidate(id: i64) -> CandidateBuilder {
    CandidateBuilder {
        candidate: Candidate {
            id,
            email: format!("test{}@test.com", id),
            status: CandidateStatus::New.as_str().to_string(),
            position: 1000.0,
            updated_at: fixed_time(),
        },
    }
}

impl CandidateBuilder {
    pub fn status(mut self, status: CandidateStatus) -> Self {
        self.candidate.status = status.as_str().to_string();
        self
    }

    pub fn raw_status(mut self, status: &str) -> Self {
        self.candidate.status = status.to_string();
        self
    }

    pub fn position(mut self, position: f64) -> Self {
        self.candidate.position = position;
        self
    }

    pub fn email(mut self, email: &str) -> Self {
        self.candidate.email = email.to_string();
        self
    }

    pub fn updated_at(mut self, at: DateTime<Utc>) -> Self {
        self.candidate.updated_at = at;
        self
    }

    pub fn build(self) -> Candidate {
        self.candidate
    }
}

pub fn a_user(name: &str) -> SessionUser {
    SessionUser::new(name, "#ffb3ba").unwrap()
}

pub fn a_job(id: &str, name: &str) -> Job {
    Job {
        id: id.to_string(),
        name: name.to_string(),
    }
}

pub fn counts(pairs: &[(&str, u64)]) -> ColumnCounts {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

/// First-page result with column counts derived from the candidates themselves.
pub fn first_page(candidates: Vec<Candidate>) -> CandidatePage {
    let mut columns = ColumnCounts::new();
    for c in &candidates {
        *columns.entry(c.status.clone()).or_default() += 1;
    }
    CandidatePage {
        candidates,
        has_more: false,
        columns: Some(columns),
    }
}

pub fn failure(status: u16) -> GatewayError {
    GatewayError::Status { status }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    GetJob(String),
    GetPage {
        job_id: String,
        status: Option<CandidateStatus>,
        cursor: Option<f64>,
    },
    Create {
        job_id: String,
        email: String,
    },
    Update {
        job_id: String,
        candidate_id: i64,
        update: CandidateUpdate,
    },
}

/// Scripted `CandidateGateway`.
///
/// Each call pops the next scripted result for its operation. Unscripted
/// job and page lookups fail with 404; unscripted updates echo the change
/// back with a fresh `updated_at`.
#[derive(Default)]
pub struct FakeGateway {
    jobs: Mutex<VecDeque<Result<Job, GatewayError>>>,
    pages: Mutex<VecDeque<Result<CandidatePage, GatewayError>>>,
    creates: Mutex<VecDeque<Result<Candidate, GatewayError>>>,
    updates: Mutex<VecDeque<Result<Candidate, GatewayError>>>,
    calls: Mutex<Vec<GatewayCall>>,
    job_gate: Mutex<Option<oneshot::Receiver<()>>>,
    page_gate: Mutex<Option<oneshot::Receiver<()>>>,
    update_gate: Mutex<Option<oneshot::Receiver<()>>>,
    pub job_started: Notify,
    pub page_started: Notify,
    pub update_started: Notify,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_job(self, job: Result<Job, GatewayError>) -> Self {
        self.jobs.lock().unwrap().push_back(job);
        self
    }

    pub fn with_page(self, page: Result<CandidatePage, GatewayError>) -> Self {
        self.pages.lock().unwrap().push_back(page);
        self
    }

    pub fn with_create(self, result: Result<Candidate, GatewayError>) -> Self {
        self.creates.lock().unwrap().push_back(result);
        self
    }

    pub fn with_update(self, result: Result<Candidate, GatewayError>) -> Self {
        self.updates.lock().unwrap().push_back(result);
        self
    }

    /// Park the next job lookup until the returned sender fires (or is dropped).
    pub fn hold_next_job(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.job_gate.lock().unwrap() = Some(rx);
        tx
    }

    /// Park the next page lookup until the returned sender fires (or is dropped).
    pub fn hold_next_page(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.page_gate.lock().unwrap() = Some(rx);
        tx
    }

    /// Park the next update call until the returned sender fires (or is dropped).
    pub fn hold_next_update(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.update_gate.lock().unwrap() = Some(rx);
        tx
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn update_calls(&self) -> Vec<CandidateUpdate> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                GatewayCall::Update { update, .. } => Some(update),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: GatewayCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl CandidateGateway for FakeGateway {
    async fn get_job(&self, job_id: &str) -> Result<Job, GatewayError> {
        self.record(GatewayCall::GetJob(job_id.to_string()));
        let next = self.jobs.lock().unwrap().pop_front();
        self.job_started.notify_one();
        wait_for_gate(&self.job_gate).await;
        next.unwrap_or(Err(failure(404)))
    }

    async fn get_all_for_job(
        &self,
        job_id: &str,
        status: Option<CandidateStatus>,
        cursor: Option<f64>,
    ) -> Result<CandidatePage, GatewayError> {
        self.record(GatewayCall::GetPage {
            job_id: job_id.to_string(),
            status,
            cursor,
        });
        let next = self.pages.lock().unwrap().pop_front();
        // Only gated lookups signal, so earlier pages leave no stale permit.
        let gate = self.page_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            self.page_started.notify_one();
            let _ = gate.await;
        }
        next.unwrap_or(Err(failure(404)))
    }

    async fn create_candidate(
        &self,
        job_id: &str,
        props: &NewCandidate,
        _actor: &SessionUser,
    ) -> Result<Candidate, GatewayError> {
        self.record(GatewayCall::Create {
            job_id: job_id.to_string(),
            email: props.email.clone(),
        });
        let next = self.creates.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(Candidate::new(100, &props.email, props.status, 1000.0)))
    }

    async fn update_candidate(
        &self,
        job_id: &str,
        candidate_id: i64,
        update: &CandidateUpdate,
        _actor: &SessionUser,
    ) -> Result<Candidate, GatewayError> {
        self.record(GatewayCall::Update {
            job_id: job_id.to_string(),
            candidate_id,
            update: update.clone(),
        });
        let next = self.updates.lock().unwrap().pop_front();
        self.update_started.notify_one();
        wait_for_gate(&self.update_gate).await;
        next.unwrap_or_else(|| Ok(Candidate::new(candidate_id, "", update.status, update.position)))
    }
}

async fn wait_for_gate(gate: &Mutex<Option<oneshot::Receiver<()>>>) {
    let gate = gate.lock().unwrap().take();
    if let Some(gate) = gate {
        let _ = gate.await;
    }
}
