//! Form model for adding a candidate to the board.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{info, warn};

use super::columns::Column;
use super::gateway::CandidateGateway;
use super::models::{Candidate, CandidateStatus, NewCandidate, SessionUser};
use crate::errors::GatewayError;

static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

pub const INVALID_EMAIL: &str = "Email must be valid";
pub const INVALID_STATUS: &str = "Status is not a valid one";
pub const INVALID_FORM: &str = "Check your inputs, something is wrong";

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_REGEX.is_match(value)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormOption {
    pub value: CandidateStatus,
    pub label: String,
}

#[derive(Debug, Clone)]
pub struct CandidateForm {
    options: Vec<FormOption>,
    email: Option<String>,
    email_error: Option<String>,
    status: Option<CandidateStatus>,
    status_error: Option<String>,
    is_valid: bool,
    form_error: Option<String>,
}

impl CandidateForm {
    /// One status option per board column, in column order.
    pub fn new(columns: &[Column]) -> Self {
        let options = columns
            .iter()
            .map(|c| FormOption {
                value: c.id,
                label: c.name.clone(),
            })
            .collect();
        Self {
            options,
            email: None,
            email_error: None,
            status: Some(CandidateStatus::New),
            status_error: None,
            is_valid: false,
            form_error: None,
        }
    }

    pub fn options(&self) -> &[FormOption] {
        &self.options
    }

    pub fn status(&self) -> Option<CandidateStatus> {
        self.status
    }

    pub fn email_error(&self) -> &str {
        self.email_error.as_deref().unwrap_or("")
    }

    pub fn status_error(&self) -> &str {
        self.status_error.as_deref().unwrap_or("")
    }

    pub fn form_error(&self) -> &str {
        self.form_error.as_deref().unwrap_or("")
    }

    pub fn has_error(&self) -> bool {
        self.form_error.is_some()
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    pub fn form_is_disabled(&self, connected: bool) -> bool {
        !connected || !self.is_valid
    }

    pub fn email_has_changed(&mut self, value: &str) {
        self.is_valid = is_valid_email(value);
        self.email = Some(value.to_string());
        self.email_error = (!self.is_valid).then(|| INVALID_EMAIL.to_string());
    }

    pub fn column_has_changed(&mut self, value: &str) {
        match value.parse::<CandidateStatus>() {
            Ok(status) => {
                self.status = Some(status);
                self.status_error = None;
            }
            Err(_) => {
                self.status = None;
                self.status_error = Some(INVALID_STATUS.to_string());
            }
        }
    }

    /// Create the candidate server-side. Position is assigned by the server.
    ///
    /// Returns `None` when the form is invalid, when there is no job or user,
    /// or when the server refused; the reason is in `form_error`.
    pub async fn submit(
        &mut self,
        gateway: &dyn CandidateGateway,
        job_id: Option<&str>,
        user: Option<&SessionUser>,
    ) -> Option<Candidate> {
        if !self.is_valid {
            self.form_error = Some(INVALID_FORM.to_string());
            return None;
        }
        let (Some(user), Some(job_id), Some(email), Some(status)) =
            (user, job_id, self.email.clone(), self.status)
        else {
            return None;
        };

        let props = NewCandidate { email, status };
        match gateway.create_candidate(job_id, &props, user).await {
            Ok(candidate) => {
                info!(job_id, candidate_id = candidate.id, "candidate created");
                self.form_error = None;
                Some(candidate)
            }
            Err(e) => {
                warn!(job_id, error = %e, "candidate creation failed");
                self.form_error = Some(creation_error_message(&e).to_string());
                None
            }
        }
    }

    /// Back to a blank form; the status options are kept.
    pub fn reset(&mut self) {
        *self = Self {
            options: std::mem::take(&mut self.options),
            ..Self::new(&[])
        };
    }
}

fn creation_error_message(err: &GatewayError) -> &'static str {
    match err.status_code() {
        Some(400) => "Inputs are invalid",
        Some(409) => "Email address already exists",
        Some(500) => "Position already exists",
        _ => "Something went wrong",
    }
}
