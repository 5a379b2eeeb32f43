use std::collections::HashMap;
use std::sync::Mutex;

use bson::oid::ObjectId;
use chrono::{DateTime, NaiveDate, Utc};

use async_trait::async_trait;
use civicdesk_common::{
    normalize_email, CivicDeskError, Issue, IssueDraft, IssueId, IssueStatus, Role,
    StaffAssignment, User,
};

use crate::issues::{
    ConditionalOutcome, DateField, IssueFilter, IssueStore, VoterMutation, VoterPredicate,
};
use crate::users::UserStore;

/// In-memory issue collection. Backs unit and concurrency tests; the mutex
/// gives conditional updates the same single-document atomicity the real
/// store provides.
#[derive(Default)]
pub struct MemoryIssueStore {
    issues: Mutex<HashMap<String, Issue>>,
}

impl MemoryIssueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(issues: Vec<Issue>) -> Self {
        let map = issues
            .into_iter()
            .map(|issue| (issue.id.as_hex().to_string(), issue))
            .collect();
        Self {
            issues: Mutex::new(map),
        }
    }
}

#[async_trait]
impl IssueStore for MemoryIssueStore {
    async fn insert(&self, draft: IssueDraft) -> Result<Issue, CivicDeskError> {
        let id = IssueId::parse(&ObjectId::new().to_hex())?;
        let issue = Issue {
            id: id.clone(),
            title: draft.title,
            description: draft.description,
            category: draft.category,
            location: draft.location,
            status: draft.status,
            priority: draft.priority,
            is_boosted: draft.is_boosted,
            created_by: draft.created_by,
            created_at: draft.created_at,
            assigned_staff: StaffAssignment::Unassigned,
            assigned_at: None,
            resolved_at: None,
            upvotes: draft.upvotes,
            upvoters: draft.upvoters,
        };
        self.issues
            .lock()
            .unwrap()
            .insert(id.as_hex().to_string(), issue.clone());
        Ok(issue)
    }

    async fn find_by_id(&self, id: &IssueId) -> Result<Option<Issue>, CivicDeskError> {
        Ok(self.issues.lock().unwrap().get(id.as_hex()).cloned())
    }

    async fn list(&self, filter: &IssueFilter) -> Result<Vec<Issue>, CivicDeskError> {
        Ok(self
            .issues
            .lock()
            .unwrap()
            .values()
            .filter(|issue| matches(filter, issue))
            .cloned()
            .collect())
    }

    async fn count(&self, filter: &IssueFilter) -> Result<u64, CivicDeskError> {
        Ok(self
            .issues
            .lock()
            .unwrap()
            .values()
            .filter(|issue| matches(filter, issue))
            .count() as u64)
    }

    async fn conditional_update(
        &self,
        id: &IssueId,
        predicate: VoterPredicate,
        mutation: VoterMutation,
    ) -> Result<ConditionalOutcome, CivicDeskError> {
        let mut issues = self.issues.lock().unwrap();
        let Some(issue) = issues.get_mut(id.as_hex()) else {
            return Ok(ConditionalOutcome {
                applied: false,
                issue: None,
            });
        };

        let holds = match &predicate {
            VoterPredicate::Absent(voter) => !issue.has_upvoter(voter),
            VoterPredicate::Present(voter) => issue.has_upvoter(voter),
        };
        if holds {
            match &mutation {
                VoterMutation::Add(voter) => issue.upvoters.push(voter.clone()),
                VoterMutation::Remove(voter) => {
                    issue.upvoters.retain(|e| normalize_email(e) != *voter)
                }
            }
            issue.upvotes = issue.upvoters.len() as i64;
        }
        Ok(ConditionalOutcome {
            applied: holds,
            issue: Some(issue.clone()),
        })
    }

    async fn daily_counts(
        &self,
        filter: &IssueFilter,
        field: DateField,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<HashMap<NaiveDate, u64>, CivicDeskError> {
        let mut counts: HashMap<NaiveDate, u64> = HashMap::new();
        for issue in self.issues.lock().unwrap().values() {
            if !matches(filter, issue) {
                continue;
            }
            let ts = match field {
                DateField::CreatedAt => Some(issue.created_at),
                DateField::ResolvedAt => issue.resolved_at,
            };
            if let Some(ts) = ts {
                if ts >= from && ts < to {
                    *counts.entry(ts.date_naive()).or_default() += 1;
                }
            }
        }
        Ok(counts)
    }

    async fn resolution_spans(
        &self,
        staff: &str,
    ) -> Result<Vec<(DateTime<Utc>, DateTime<Utc>)>, CivicDeskError> {
        let staff = normalize_email(staff);
        Ok(self
            .issues
            .lock()
            .unwrap()
            .values()
            .filter(|issue| {
                issue.status == IssueStatus::Resolved && issue.assigned_staff.matches(&staff)
            })
            .filter_map(|issue| issue.assigned_at.zip(issue.resolved_at))
            .collect())
    }
}

fn matches(filter: &IssueFilter, issue: &Issue) -> bool {
    if let Some(email) = &filter.created_by {
        if normalize_email(&issue.created_by) != *email {
            return false;
        }
    }
    if let Some(email) = &filter.assigned_to {
        if !issue.assigned_staff.matches(email) {
            return false;
        }
    }
    if let Some(email) = &filter.upvoter {
        if !issue.has_upvoter(email) {
            return false;
        }
    }
    if let Some(status) = filter.status {
        if issue.status != status {
            return false;
        }
    }
    if filter.status_not_in.contains(&issue.status) {
        return false;
    }
    true
}

/// In-memory user collection, keyed by normalized email.
#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<String, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(users: Vec<User>) -> Self {
        let map = users
            .into_iter()
            .map(|user| (normalize_email(&user.email), user))
            .collect();
        Self {
            users: Mutex::new(map),
        }
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert_if_absent(&self, user: User) -> Result<bool, CivicDeskError> {
        let mut users = self.users.lock().unwrap();
        let key = normalize_email(&user.email);
        if users.contains_key(&key) {
            return Ok(false);
        }
        users.insert(key, user);
        Ok(true)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, CivicDeskError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .get(&normalize_email(email))
            .cloned())
    }

    async fn list(&self) -> Result<Vec<User>, CivicDeskError> {
        Ok(self.users.lock().unwrap().values().cloned().collect())
    }

    async fn list_by_role(&self, role: Role) -> Result<Vec<User>, CivicDeskError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .filter(|user| user.role == role)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(id: &str, upvoters: Vec<&str>) -> Issue {
        Issue {
            id: IssueId::parse(id).unwrap(),
            title: "Overflowing bin".to_string(),
            description: "Bin at the park entrance".to_string(),
            category: "sanitation".to_string(),
            location: None,
            status: IssueStatus::Pending,
            priority: "normal".to_string(),
            is_boosted: false,
            created_by: "x@y.com".to_string(),
            created_at: Utc::now(),
            assigned_staff: StaffAssignment::Unassigned,
            assigned_at: None,
            resolved_at: None,
            upvotes: upvoters.len() as i64,
            upvoters: upvoters.into_iter().map(String::from).collect(),
        }
    }

    const ID: &str = "64f1a2b3c4d5e6f708192a3b";

    #[tokio::test]
    async fn guarded_add_applies_once() {
        let store = MemoryIssueStore::seeded(vec![issue(ID, vec![])]);
        let id = IssueId::parse(ID).unwrap();

        let first = store
            .conditional_update(
                &id,
                VoterPredicate::Absent("a@b.com".into()),
                VoterMutation::Add("a@b.com".into()),
            )
            .await
            .unwrap();
        assert!(first.applied);
        assert_eq!(first.issue.unwrap().upvotes, 1);

        let second = store
            .conditional_update(
                &id,
                VoterPredicate::Absent("a@b.com".into()),
                VoterMutation::Add("a@b.com".into()),
            )
            .await
            .unwrap();
        assert!(!second.applied);
        assert_eq!(second.issue.unwrap().upvotes, 1);
    }

    #[tokio::test]
    async fn guarded_remove_matches_denormalized_entries() {
        let store = MemoryIssueStore::seeded(vec![issue(ID, vec![" A@B.com "])]);
        let id = IssueId::parse(ID).unwrap();

        let outcome = store
            .conditional_update(
                &id,
                VoterPredicate::Present("a@b.com".into()),
                VoterMutation::Remove("a@b.com".into()),
            )
            .await
            .unwrap();
        assert!(outcome.applied);
        let updated = outcome.issue.unwrap();
        assert_eq!(updated.upvotes, 0);
        assert!(updated.upvoters.is_empty());
    }

    #[tokio::test]
    async fn counter_tracks_voter_set_size() {
        let store = MemoryIssueStore::seeded(vec![issue(ID, vec![])]);
        let id = IssueId::parse(ID).unwrap();

        for voter in ["a@b.com", "c@d.com", "e@f.com"] {
            let outcome = store
                .conditional_update(
                    &id,
                    VoterPredicate::Absent(voter.into()),
                    VoterMutation::Add(voter.into()),
                )
                .await
                .unwrap();
            let updated = outcome.issue.unwrap();
            assert_eq!(updated.upvotes, updated.upvoters.len() as i64);
        }
        assert_eq!(store.find_by_id(&id).await.unwrap().unwrap().upvotes, 3);
    }

    #[tokio::test]
    async fn filter_matches_both_assignment_shapes() {
        let mut bare = issue(ID, vec![]);
        bare.assigned_staff = StaffAssignment::Assigned("staff@city.gov".into());
        let mut denormalized = issue("74f1a2b3c4d5e6f708192a3b", vec![]);
        denormalized.assigned_staff = StaffAssignment::Assigned(" Staff@City.GOV ".into());
        let store = MemoryIssueStore::seeded(vec![bare, denormalized]);

        let filter = IssueFilter {
            assigned_to: Some("staff@city.gov".into()),
            ..Default::default()
        };
        assert_eq!(store.count(&filter).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn upvoter_filter_is_normalized() {
        let store = MemoryIssueStore::seeded(vec![issue(ID, vec![" A@B.com "])]);
        let filter = IssueFilter {
            upvoter: Some("a@b.com".into()),
            ..Default::default()
        };
        assert_eq!(store.count(&filter).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn user_insert_is_first_wins() {
        let store = MemoryUserStore::new();
        let created = store
            .insert_if_absent(User::signed_up("X@Y.com", "Pat".into(), None))
            .await
            .unwrap();
        assert!(created);
        let again = store
            .insert_if_absent(User::signed_up(" x@y.com ", "Other".into(), None))
            .await
            .unwrap();
        assert!(!again);
        let user = store.find_by_email("x@y.com").await.unwrap().unwrap();
        assert_eq!(user.name, "Pat");
    }
}
