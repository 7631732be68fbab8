use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::BoardError;

/// Colors offered when a user picks an avatar for their session.
pub const AVATAR_COLORS: [&str; 5] = ["#ffb3ba", "#ffdfba", "#ffffba", "#baffc9", "#bae1ff"];

pub const DEFAULT_AVATAR_COLOR: &str = "#ffb3ba";

/// Server-reported totals per status, keyed by the wire status string.
pub type ColumnCounts = BTreeMap<String, u64>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    New,
    Interview,
    Hired,
    Rejected,
}

impl CandidateStatus {
    /// Board column order.
    pub const ALL: [CandidateStatus; 4] = [Self::New, Self::Interview, Self::Hired, Self::Rejected];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Interview => "interview",
            Self::Hired => "hired",
            Self::Rejected => "rejected",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Interview => "Interview",
            Self::Hired => "Hired",
            Self::Rejected => "Rejected",
        }
    }
}

impl std::fmt::Display for CandidateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CandidateStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "interview" => Ok(Self::Interview),
            "hired" => Ok(Self::Hired),
            "rejected" => Ok(Self::Rejected),
            _ => Err(format!("Invalid status: {}", s)),
        }
    }
}

/// A candidate as the server reports it.
///
/// `status` keeps the raw wire string: anything outside the four known
/// statuses is carried as-is and rejected when the board is projected,
/// instead of being dropped during decoding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    pub id: i64,
    pub email: String,
    pub status: String,
    pub position: f64,
    #[serde(default)]
    pub updated_at: DateTime<Utc>,
}

impl Candidate {
    pub fn new(id: i64, email: &str, status: CandidateStatus, position: f64) -> Self {
        Self {
            id,
            email: email.to_string(),
            status: status.as_str().to_string(),
            position,
            updated_at: Utc::now(),
        }
    }

    /// Typed status, failing on anything the board does not know about.
    pub fn status(&self) -> Result<CandidateStatus, BoardError> {
        self.status
            .parse()
            .map_err(|_| BoardError::UnknownStatus {
                status: self.status.clone(),
            })
    }

    pub fn has_status(&self, status: CandidateStatus) -> bool {
        self.status == status.as_str()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
}

/// The person currently driving this board view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionUser {
    pub name: String,
    pub color: String,
}

impl SessionUser {
    pub fn new(name: &str, color: &str) -> Result<Self, BoardError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(BoardError::InvalidSessionName);
        }
        Ok(Self {
            name: name.to_string(),
            color: color.to_string(),
        })
    }

    /// Collaborator events are told apart by display name only.
    pub fn is_same_actor(&self, other: &SessionUser) -> bool {
        self.name == other.name
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewCandidate {
    pub email: String,
    pub status: CandidateStatus,
}

/// One page of candidates for a job.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CandidatePage {
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub columns: Option<ColumnCounts>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_status_roundtrip() {
        for s in &["new", "interview", "hired", "rejected"] {
            let parsed: CandidateStatus = s.parse().unwrap();
            assert_eq!(parsed.as_str(), *s);
        }
        assert!("archived".parse::<CandidateStatus>().is_err());
    }

    #[test]
    fn test_status_serde_is_lowercase() {
        assert_eq!(
            serde_json::to_string(&CandidateStatus::Interview).unwrap(),
            "\"interview\""
        );
        assert_eq!(
            serde_json::from_str::<CandidateStatus>("\"hired\"").unwrap(),
            CandidateStatus::Hired
        );
    }

    #[test]
    fn test_candidate_keeps_unknown_status_until_checked() {
        let json = r#"{"id":7,"email":"a@b.io","status":"archived","position":1000.0,
                       "updated_at":"2024-01-01T00:00:00Z"}"#;
        let candidate: Candidate = serde_json::from_str(json).unwrap();
        assert_eq!(candidate.status, "archived");
        assert!(matches!(
            candidate.status(),
            Err(BoardError::UnknownStatus { status }) if status == "archived"
        ));
    }

    #[test]
    fn test_candidate_without_updated_at_defaults() {
        let json = r#"{"id":1,"email":"a@b.io","status":"new","position":2000}"#;
        let candidate: Candidate = serde_json::from_str(json).unwrap();
        assert_eq!(candidate.position, 2000.0);
        assert_eq!(candidate.updated_at, DateTime::<Utc>::default());
    }

    #[test]
    fn test_job_id_accepts_number_or_string() {
        let job: Job = serde_json::from_str(r#"{"id":12,"name":"Engineer"}"#).unwrap();
        assert_eq!(job.id, "12");
        let job: Job = serde_json::from_str(r#"{"id":"12","name":"Engineer"}"#).unwrap();
        assert_eq!(job.id, "12");
    }

    #[test]
    fn test_session_user_rejects_blank_name() {
        assert!(matches!(
            SessionUser::new("   ", DEFAULT_AVATAR_COLOR),
            Err(BoardError::InvalidSessionName)
        ));
        let user = SessionUser::new(" alice ", "#bae1ff").unwrap();
        assert_eq!(user.name, "alice");
    }

    #[test]
    fn test_same_actor_compares_names_only() {
        let a = SessionUser::new("alice", "#ffb3ba").unwrap();
        let b = SessionUser::new("alice", "#bae1ff").unwrap();
        let c = SessionUser::new("bob", "#ffb3ba").unwrap();
        assert!(a.is_same_actor(&b));
        assert!(!a.is_same_actor(&c));
    }

    #[test]
    fn test_page_without_columns() {
        let page: CandidatePage =
            serde_json::from_str(r#"{"candidates":[],"has_more":true}"#).unwrap();
        assert!(page.has_more);
        assert!(page.columns.is_none());
    }
}
