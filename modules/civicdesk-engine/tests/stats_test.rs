// Dashboard views composed over the in-memory stores.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use civicdesk_common::{
    CivicDeskError, Issue, IssueId, IssueStatus, Role, StaffAssignment, User,
};
use civicdesk_engine::{AvgResponseHours, Caller, StatsAggregator};
use civicdesk_store::{MemoryIssueStore, MemoryUserStore};

struct IssueBuilder {
    issue: Issue,
}

impl IssueBuilder {
    fn new(n: u32) -> Self {
        Self {
            issue: Issue {
                id: IssueId::parse(&format!("{n:024x}")).unwrap(),
                title: format!("Issue {n}"),
                description: "".to_string(),
                category: "roads".to_string(),
                location: None,
                status: IssueStatus::Pending,
                priority: "normal".to_string(),
                is_boosted: false,
                created_by: "citizen@mail.com".to_string(),
                created_at: Utc::now(),
                assigned_staff: StaffAssignment::Unassigned,
                assigned_at: None,
                resolved_at: None,
                upvotes: 0,
                upvoters: Vec::new(),
            },
        }
    }

    fn status(mut self, status: IssueStatus) -> Self {
        self.issue.status = status;
        self
    }

    fn created_by(mut self, email: &str) -> Self {
        self.issue.created_by = email.to_string();
        self
    }

    fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.issue.created_at = at;
        self
    }

    fn assigned(mut self, email: &str) -> Self {
        self.issue.assigned_staff = StaffAssignment::Assigned(email.to_string());
        self
    }

    fn resolved_span(mut self, hours: i64) -> Self {
        let resolved = Utc::now();
        self.issue.status = IssueStatus::Resolved;
        self.issue.assigned_at = Some(resolved - Duration::hours(hours));
        self.issue.resolved_at = Some(resolved);
        self
    }

    fn upvoters(mut self, voters: &[&str]) -> Self {
        self.issue.upvoters = voters.iter().map(|v| v.to_string()).collect();
        self.issue.upvotes = voters.len() as i64;
        self
    }

    fn build(self) -> Issue {
        self.issue
    }
}

fn aggregator(issues: Vec<Issue>, users: Vec<User>) -> StatsAggregator {
    StatsAggregator::new(
        Arc::new(MemoryIssueStore::seeded(issues)),
        Arc::new(MemoryUserStore::seeded(users)),
    )
}

fn admin() -> Caller {
    Caller::new("admin@city.gov", Some(Role::Admin))
}

fn citizen_user(email: &str, blocked: bool) -> User {
    let mut user = User::signed_up(email, "Citizen".to_string(), None);
    user.is_blocked = blocked;
    user
}

// --- Admin view ---

#[tokio::test]
async fn admin_view_counts_by_status() {
    let agg = aggregator(
        vec![
            IssueBuilder::new(1).status(IssueStatus::Resolved).build(),
            IssueBuilder::new(2).status(IssueStatus::Resolved).build(),
            IssueBuilder::new(3).status(IssueStatus::Pending).build(),
            IssueBuilder::new(4).status(IssueStatus::Rejected).build(),
            IssueBuilder::new(5).status(IssueStatus::Closed).build(),
        ],
        vec![],
    );

    let stats = agg.admin_stats(&admin()).await.unwrap();
    assert_eq!(stats.total_issues, 5);
    assert_eq!(stats.total_resolved_issues, 2);
    assert_eq!(stats.total_pending_issues, 1);
    assert_eq!(stats.total_rejected_issues, 1);
}

#[tokio::test]
async fn admin_view_rejects_non_admins() {
    let agg = aggregator(vec![], vec![]);
    for role in [Some(Role::Staff), Some(Role::Citizen), None] {
        let err = agg
            .admin_stats(&Caller::new("someone@mail.com", role))
            .await
            .unwrap_err();
        assert!(matches!(err, CivicDeskError::Forbidden));
    }
}

// --- Staff view ---

fn staff_issues() -> Vec<Issue> {
    vec![
        IssueBuilder::new(1)
            .assigned("staff@city.gov")
            .status(IssueStatus::StaffAssigned)
            .build(),
        IssueBuilder::new(2)
            .assigned(" Staff@City.GOV ")
            .status(IssueStatus::Pending)
            .build(),
        IssueBuilder::new(3)
            .assigned("staff@city.gov")
            .resolved_span(2)
            .build(),
        IssueBuilder::new(4)
            .assigned("staff@city.gov")
            .resolved_span(4)
            .build(),
        IssueBuilder::new(5)
            .assigned("staff@city.gov")
            .resolved_span(6)
            .build(),
        IssueBuilder::new(6)
            .assigned("other@city.gov")
            .resolved_span(40)
            .build(),
        IssueBuilder::new(7)
            .assigned("staff@city.gov")
            .status(IssueStatus::Closed)
            .build(),
    ]
}

#[tokio::test]
async fn staff_view_separates_active_from_settled() {
    let agg = aggregator(staff_issues(), vec![]);
    let stats = agg
        .staff_stats(&admin(), "staff@city.gov")
        .await
        .unwrap();

    assert_eq!(stats.assigned_count, 2);
    assert_eq!(stats.open_count, 2);
    assert_eq!(stats.resolved_count, 3);
    assert_eq!(stats.assigned_to_you, 6);
}

#[tokio::test]
async fn staff_view_averages_response_hours() {
    let agg = aggregator(staff_issues(), vec![]);
    let stats = agg
        .staff_stats(&admin(), "staff@city.gov")
        .await
        .unwrap();
    assert_eq!(stats.avg_response_hours, AvgResponseHours::Hours(4.0));
}

#[tokio::test]
async fn staff_view_without_resolutions_has_no_average() {
    let agg = aggregator(
        vec![IssueBuilder::new(1)
            .assigned("staff@city.gov")
            .status(IssueStatus::StaffAssigned)
            .build()],
        vec![],
    );
    let stats = agg
        .staff_stats(&admin(), "staff@city.gov")
        .await
        .unwrap();
    assert_eq!(stats.avg_response_hours, AvgResponseHours::Unavailable);
}

#[tokio::test]
async fn staff_histogram_counts_recent_resolutions() {
    let agg = aggregator(staff_issues(), vec![]);
    let stats = agg
        .staff_stats(&admin(), "staff@city.gov")
        .await
        .unwrap();

    assert_eq!(stats.last_7_days.len(), 7);
    let total: u64 = stats.last_7_days.iter().map(|b| b.count).sum();
    assert_eq!(total, 3);
    // All three resolutions happened today, the window's last entry.
    assert_eq!(stats.last_7_days[6].count, 3);
}

#[tokio::test]
async fn staff_view_allows_self_and_admin_only() {
    let agg = aggregator(vec![], vec![]);

    let own = agg
        .staff_stats(
            &Caller::new("staff@city.gov", Some(Role::Staff)),
            "staff@city.gov",
        )
        .await;
    assert!(own.is_ok());

    let err = agg
        .staff_stats(
            &Caller::new("other@city.gov", Some(Role::Staff)),
            "staff@city.gov",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CivicDeskError::Forbidden));
}

// --- Citizen view ---

fn citizen_issues() -> Vec<Issue> {
    vec![
        IssueBuilder::new(1).created_by("me@mail.com").build(),
        IssueBuilder::new(2)
            .created_by(" Me@Mail.com ")
            .status(IssueStatus::StaffAssigned)
            .build(),
        IssueBuilder::new(3)
            .created_by("me@mail.com")
            .status(IssueStatus::Resolved)
            .build(),
        IssueBuilder::new(4)
            .created_by("me@mail.com")
            .status(IssueStatus::Rejected)
            .build(),
        IssueBuilder::new(5)
            .created_by("someone-else@mail.com")
            .upvoters(&[" ME@mail.com ", "third@mail.com"])
            .build(),
    ]
}

#[tokio::test]
async fn citizen_view_counts_own_issues() {
    let agg = aggregator(
        citizen_issues(),
        vec![citizen_user("me@mail.com", false)],
    );
    let stats = agg.citizen_stats(&admin(), "me@mail.com").await.unwrap();

    assert_eq!(stats.submitted_count, 4);
    assert_eq!(stats.resolved_count, 1);
    assert_eq!(stats.pending_count, 1);
    assert_eq!(stats.open_count, 2);
    assert_eq!(stats.upvotes_given, 1);
    assert!(!stats.is_blocked);
}

#[tokio::test]
async fn citizen_histogram_counts_submissions_in_window() {
    let now = Utc::now();
    let agg = aggregator(
        vec![
            IssueBuilder::new(1).created_by("me@mail.com").build(),
            IssueBuilder::new(2)
                .created_by("me@mail.com")
                .created_at(now - Duration::days(2))
                .build(),
            IssueBuilder::new(3)
                .created_by("me@mail.com")
                .created_at(now - Duration::days(6))
                .build(),
            IssueBuilder::new(4)
                .created_by("me@mail.com")
                .created_at(now - Duration::days(8))
                .build(),
        ],
        vec![citizen_user("me@mail.com", false)],
    );

    let stats = agg.citizen_stats(&admin(), "me@mail.com").await.unwrap();
    assert_eq!(stats.last_7_days.len(), 7);
    let total: u64 = stats.last_7_days.iter().map(|b| b.count).sum();
    assert_eq!(total, 3);
}

#[tokio::test]
async fn citizen_view_surfaces_blocked_flag() {
    let agg = aggregator(vec![], vec![citizen_user("me@mail.com", true)]);
    let stats = agg.citizen_stats(&admin(), "me@mail.com").await.unwrap();
    assert!(stats.is_blocked);
}

#[tokio::test]
async fn citizen_view_rejects_other_citizens() {
    let agg = aggregator(vec![], vec![citizen_user("me@mail.com", false)]);
    let err = agg
        .citizen_stats(
            &Caller::new("nosy@mail.com", Some(Role::Citizen)),
            "me@mail.com",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CivicDeskError::Forbidden));
}

#[tokio::test]
async fn citizen_view_requires_a_profile() {
    let agg = aggregator(vec![], vec![]);
    let err = agg
        .citizen_stats(&admin(), "ghost@mail.com")
        .await
        .unwrap_err();
    assert!(matches!(err, CivicDeskError::NotFound(_)));
}
