use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use civicdesk_common::{normalize_email, CivicDeskError, IssueId};
use civicdesk_store::{IssueStore, VoterMutation, VoterPredicate};

/// Outcome of one upvote toggle, as answered to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UpvoteReceipt {
    pub upvoted: bool,
    pub upvotes: i64,
}

/// Flips one caller's vote on one issue. The membership check and the counter
/// change ride on the store's conditional update, so concurrent requests can
/// never drive the counter away from the voter set.
pub struct EngagementToggle {
    issues: Arc<dyn IssueStore>,
}

impl EngagementToggle {
    pub fn new(issues: Arc<dyn IssueStore>) -> Self {
        Self { issues }
    }

    /// Toggle the caller's upvote. Running it twice with the same caller
    /// restores the exact prior state.
    pub async fn toggle(
        &self,
        raw_id: &str,
        caller_email: &str,
    ) -> Result<UpvoteReceipt, CivicDeskError> {
        let id = IssueId::parse(raw_id)?;
        let voter = normalize_email(caller_email);

        let issue = self
            .issues
            .find_by_id(&id)
            .await?
            .ok_or_else(|| CivicDeskError::NotFound("issue".to_string()))?;

        let (predicate, mutation, upvoted) = if issue.has_upvoter(&voter) {
            (
                VoterPredicate::Present(voter.clone()),
                VoterMutation::Remove(voter),
                false,
            )
        } else {
            (
                VoterPredicate::Absent(voter.clone()),
                VoterMutation::Add(voter),
                true,
            )
        };

        let outcome = self.issues.conditional_update(&id, predicate, mutation).await?;
        if !outcome.applied {
            // A concurrent request for the same caller got there first. The
            // caller still ends up in the state it asked for; only the guard
            // kept the mutation from landing twice.
            debug!(issue = %id, "toggle guard lost to a concurrent request");
        }

        // The returned count always comes from the store's own response,
        // never from the snapshot read before the update.
        let current = outcome
            .issue
            .ok_or_else(|| CivicDeskError::NotFound("issue".to_string()))?;
        Ok(UpvoteReceipt {
            upvoted,
            upvotes: current.upvotes.max(0),
        })
    }
}
