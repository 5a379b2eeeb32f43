use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CivicDeskError;

/// Canonical form used for every email comparison: trimmed and lowercased.
/// Stored values are never rewritten; they are normalized at comparison time.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

// --- Identifiers ---

/// Issue identifier: a 24-character hex ObjectId, validated at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IssueId(String);

impl IssueId {
    pub fn parse(raw: &str) -> Result<Self, CivicDeskError> {
        let raw = raw.trim();
        if raw.len() == 24 && raw.bytes().all(|b| b.is_ascii_hexdigit()) {
            Ok(Self(raw.to_ascii_lowercase()))
        } else {
            Err(CivicDeskError::Validation(format!(
                "invalid issue id: {raw}"
            )))
        }
    }

    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for IssueId {
    type Error = CivicDeskError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        IssueId::parse(&value)
    }
}

impl From<IssueId> for String {
    fn from(id: IssueId) -> Self {
        id.0
    }
}

impl fmt::Display for IssueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Citizen,
    Staff,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Citizen => "citizen",
            Role::Staff => "staff",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = CivicDeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "citizen" => Ok(Role::Citizen),
            "staff" => Ok(Role::Staff),
            "admin" => Ok(Role::Admin),
            other => Err(CivicDeskError::Validation(format!("unknown role: {other}"))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueStatus {
    Pending,
    StaffAssigned,
    Resolved,
    Rejected,
    Closed,
}

impl IssueStatus {
    /// Statuses in which an issue no longer counts as open.
    pub const SETTLED: [IssueStatus; 3] = [
        IssueStatus::Resolved,
        IssueStatus::Rejected,
        IssueStatus::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IssueStatus::Pending => "pending",
            IssueStatus::StaffAssigned => "staff-assigned",
            IssueStatus::Resolved => "resolved",
            IssueStatus::Rejected => "rejected",
            IssueStatus::Closed => "closed",
        }
    }

    pub fn is_open(self) -> bool {
        !Self::SETTLED.contains(&self)
    }
}

impl FromStr for IssueStatus {
    type Err = CivicDeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(IssueStatus::Pending),
            "staff-assigned" => Ok(IssueStatus::StaffAssigned),
            "resolved" => Ok(IssueStatus::Resolved),
            "rejected" => Ok(IssueStatus::Rejected),
            "closed" => Ok(IssueStatus::Closed),
            other => Err(CivicDeskError::Validation(format!(
                "unknown issue status: {other}"
            ))),
        }
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Staff assignment ---

/// Who an issue is assigned to. Stored records carry this in two shapes:
/// a bare email string, or an object with an `email` field. Both adapt to
/// this union on read; writes emit the bare string form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StaffAssignment {
    #[default]
    Unassigned,
    Assigned(String),
}

impl StaffAssignment {
    pub fn email(&self) -> Option<&str> {
        match self {
            StaffAssignment::Unassigned => None,
            StaffAssignment::Assigned(email) => Some(email),
        }
    }

    pub fn is_unassigned(&self) -> bool {
        matches!(self, StaffAssignment::Unassigned)
    }

    /// Whether this assignment refers to the given staff email.
    pub fn matches(&self, email: &str) -> bool {
        self.email()
            .is_some_and(|e| normalize_email(e) == normalize_email(email))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAssignment {
    Email(String),
    Record { email: String },
}

impl<'de> Deserialize<'de> for StaffAssignment {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<RawAssignment>::deserialize(deserializer)?;
        Ok(match raw {
            None => StaffAssignment::Unassigned,
            Some(RawAssignment::Email(email)) | Some(RawAssignment::Record { email }) => {
                StaffAssignment::Assigned(email)
            }
        })
    }
}

impl Serialize for StaffAssignment {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            StaffAssignment::Unassigned => serializer.serialize_none(),
            StaffAssignment::Assigned(email) => serializer.serialize_str(email),
        }
    }
}

// --- Records ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    #[serde(rename = "_id")]
    pub id: IssueId,
    pub title: String,
    pub description: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub status: IssueStatus,
    pub priority: String,
    pub is_boosted: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "StaffAssignment::is_unassigned")]
    pub assigned_staff: StaffAssignment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    pub upvotes: i64,
    #[serde(default)]
    pub upvoters: Vec<String>,
}

impl Issue {
    /// Membership test over the voter set. `voter` must already be normalized;
    /// stored entries are normalized here, at comparison time.
    pub fn has_upvoter(&self, voter: &str) -> bool {
        self.upvoters.iter().any(|e| normalize_email(e) == voter)
    }
}

/// A not-yet-persisted issue. The server stamps every field the client does
/// not control.
#[derive(Debug, Clone)]
pub struct IssueDraft {
    pub title: String,
    pub description: String,
    pub category: String,
    pub location: Option<String>,
    pub status: IssueStatus,
    pub priority: String,
    pub is_boosted: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub upvotes: i64,
    pub upvoters: Vec<String>,
}

impl IssueDraft {
    /// A fresh citizen submission: pending, normal priority, no votes.
    pub fn submitted(
        title: String,
        description: String,
        category: String,
        location: Option<String>,
        created_by: &str,
    ) -> Self {
        Self {
            title,
            description,
            category,
            location,
            status: IssueStatus::Pending,
            priority: "normal".to_string(),
            is_boosted: false,
            created_by: normalize_email(created_by),
            created_at: Utc::now(),
            upvotes: 0,
            upvoters: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub email: String,
    pub name: String,
    #[serde(rename = "photoURL", default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    pub role: Role,
    pub is_premium: bool,
    pub is_blocked: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// A first-sign-in profile: citizen, not premium, not blocked.
    pub fn signed_up(email: &str, name: String, photo_url: Option<String>) -> Self {
        Self {
            email: normalize_email(email),
            name,
            photo_url,
            role: Role::Citizen,
            is_premium: false,
            is_blocked: false,
            created_at: Utc::now(),
        }
    }
}
