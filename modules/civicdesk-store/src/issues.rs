use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use civicdesk_common::{CivicDeskError, Issue, IssueDraft, IssueId, IssueStatus};

/// Which timestamp a histogram query buckets on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateField {
    CreatedAt,
    ResolvedAt,
}

/// Declarative match over the issue collection. All email fields are matched
/// case- and whitespace-insensitively; callers pass normalized values.
#[derive(Debug, Clone, Default)]
pub struct IssueFilter {
    pub created_by: Option<String>,
    /// Matches either storage shape of the assignment field.
    pub assigned_to: Option<String>,
    pub upvoter: Option<String>,
    pub status: Option<IssueStatus>,
    pub status_not_in: Vec<IssueStatus>,
}

/// Guard a conditional update verifies against the current document at
/// update time. Emails are normalized.
#[derive(Debug, Clone)]
pub enum VoterPredicate {
    Absent(String),
    Present(String),
}

/// Mutation applied when the guard holds. The store keeps the vote counter
/// equal to the voter set size as part of the same atomic update.
#[derive(Debug, Clone)]
pub enum VoterMutation {
    Add(String),
    Remove(String),
}

/// Result of a conditional update. `issue` is the post-update document when
/// `applied` is true, otherwise a fresh authoritative read of the current
/// document (None only if the id no longer resolves).
#[derive(Debug, Clone)]
pub struct ConditionalOutcome {
    pub applied: bool,
    pub issue: Option<Issue>,
}

#[async_trait]
pub trait IssueStore: Send + Sync {
    async fn insert(&self, draft: IssueDraft) -> Result<Issue, CivicDeskError>;

    async fn find_by_id(&self, id: &IssueId) -> Result<Option<Issue>, CivicDeskError>;

    async fn list(&self, filter: &IssueFilter) -> Result<Vec<Issue>, CivicDeskError>;

    async fn count(&self, filter: &IssueFilter) -> Result<u64, CivicDeskError>;

    /// Apply `mutation` to one document iff `predicate` holds against its
    /// state at update time, as a single atomic operation. Never implemented
    /// as read-then-unconditional-write.
    async fn conditional_update(
        &self,
        id: &IssueId,
        predicate: VoterPredicate,
        mutation: VoterMutation,
    ) -> Result<ConditionalOutcome, CivicDeskError>;

    /// Count matching documents per UTC calendar day of `field`, over the
    /// half-open range `[from, to)`. Days with no matches are absent.
    async fn daily_counts(
        &self,
        filter: &IssueFilter,
        field: DateField,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<HashMap<NaiveDate, u64>, CivicDeskError>;

    /// `(assignedAt, resolvedAt)` pairs for resolved issues assigned to
    /// `staff` where both timestamps are present.
    async fn resolution_spans(
        &self,
        staff: &str,
    ) -> Result<Vec<(DateTime<Utc>, DateTime<Utc>)>, CivicDeskError>;
}
