use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use civicdesk_common::{normalize_email, CivicDeskError, IssueStatus};
use civicdesk_store::{DateField, IssueFilter, IssueStore, UserStore};

use crate::authz::{may_view_subject, Caller};
use crate::histogram::{DayBucket, DayWindow};

/// Mean response time in hours, or a sentinel when the subject has no
/// resolved issue carrying both timestamps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AvgResponseHours {
    Hours(f64),
    Unavailable,
}

impl Serialize for AvgResponseHours {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            AvgResponseHours::Hours(hours) => serializer.serialize_f64(*hours),
            AvgResponseHours::Unavailable => serializer.serialize_str("unavailable"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub total_issues: u64,
    pub total_resolved_issues: u64,
    pub total_pending_issues: u64,
    pub total_rejected_issues: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffStats {
    pub assigned_count: u64,
    pub resolved_count: u64,
    pub open_count: u64,
    pub assigned_to_you: u64,
    pub avg_response_hours: AvgResponseHours,
    pub last_7_days: Vec<DayBucket>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CitizenStats {
    pub submitted_count: u64,
    pub resolved_count: u64,
    pub pending_count: u64,
    pub open_count: u64,
    pub upvotes_given: u64,
    pub is_blocked: bool,
    pub last_7_days: Vec<DayBucket>,
}

/// Role-scoped dashboard statistics over the issue collection. Each view
/// authorizes first, then composes independent read-only queries; any
/// sub-query failure aborts the whole view.
pub struct StatsAggregator {
    issues: Arc<dyn IssueStore>,
    users: Arc<dyn UserStore>,
}

impl StatsAggregator {
    pub fn new(issues: Arc<dyn IssueStore>, users: Arc<dyn UserStore>) -> Self {
        Self { issues, users }
    }

    /// Platform-wide issue totals. Admin only.
    pub async fn admin_stats(&self, caller: &Caller) -> Result<AdminStats, CivicDeskError> {
        if !caller.is_admin() {
            return Err(CivicDeskError::Forbidden);
        }

        // Independent counts; the dashboard tolerates skew between them.
        Ok(AdminStats {
            total_issues: self.issues.count(&IssueFilter::default()).await?,
            total_resolved_issues: self.status_count(IssueStatus::Resolved).await?,
            total_pending_issues: self.status_count(IssueStatus::Pending).await?,
            total_rejected_issues: self.status_count(IssueStatus::Rejected).await?,
        })
    }

    /// Workload figures for one staff member. Admin or the subject itself.
    pub async fn staff_stats(
        &self,
        caller: &Caller,
        subject_email: &str,
    ) -> Result<StaffStats, CivicDeskError> {
        if !may_view_subject(caller, subject_email) {
            return Err(CivicDeskError::Forbidden);
        }
        let subject = normalize_email(subject_email);

        let active = IssueFilter {
            assigned_to: Some(subject.clone()),
            status_not_in: IssueStatus::SETTLED.to_vec(),
            ..Default::default()
        };
        let assigned_count = self.issues.count(&active).await?;

        let resolved = IssueFilter {
            assigned_to: Some(subject.clone()),
            status: Some(IssueStatus::Resolved),
            ..Default::default()
        };
        let resolved_count = self.issues.count(&resolved).await?;

        let assigned_to_you = self
            .issues
            .count(&IssueFilter {
                assigned_to: Some(subject.clone()),
                ..Default::default()
            })
            .await?;

        let spans = self.issues.resolution_spans(&subject).await?;

        let window = DayWindow::ending_today();
        let counts = self
            .issues
            .daily_counts(&resolved, DateField::ResolvedAt, window.start(), window.end())
            .await?;

        Ok(StaffStats {
            assigned_count,
            resolved_count,
            // The dashboard reads the active-assignment figure under both keys.
            open_count: assigned_count,
            assigned_to_you,
            avg_response_hours: mean_response_hours(&spans),
            last_7_days: window.fill(&counts),
        })
    }

    /// Participation figures for one citizen. Admin or the subject itself.
    pub async fn citizen_stats(
        &self,
        caller: &Caller,
        subject_email: &str,
    ) -> Result<CitizenStats, CivicDeskError> {
        if !may_view_subject(caller, subject_email) {
            return Err(CivicDeskError::Forbidden);
        }
        let subject = normalize_email(subject_email);

        let user = self
            .users
            .find_by_email(&subject)
            .await?
            .ok_or_else(|| CivicDeskError::NotFound("user".to_string()))?;

        let mine = IssueFilter {
            created_by: Some(subject.clone()),
            ..Default::default()
        };
        let submitted_count = self.issues.count(&mine).await?;
        let resolved_count = self
            .issues
            .count(&IssueFilter {
                created_by: Some(subject.clone()),
                status: Some(IssueStatus::Resolved),
                ..Default::default()
            })
            .await?;
        let pending_count = self
            .issues
            .count(&IssueFilter {
                created_by: Some(subject.clone()),
                status: Some(IssueStatus::Pending),
                ..Default::default()
            })
            .await?;
        let open_count = self
            .issues
            .count(&IssueFilter {
                created_by: Some(subject.clone()),
                status_not_in: IssueStatus::SETTLED.to_vec(),
                ..Default::default()
            })
            .await?;
        let upvotes_given = self
            .issues
            .count(&IssueFilter {
                upvoter: Some(subject.clone()),
                ..Default::default()
            })
            .await?;

        let window = DayWindow::ending_today();
        let counts = self
            .issues
            .daily_counts(&mine, DateField::CreatedAt, window.start(), window.end())
            .await?;

        Ok(CitizenStats {
            submitted_count,
            resolved_count,
            pending_count,
            open_count,
            upvotes_given,
            is_blocked: user.is_blocked,
            last_7_days: window.fill(&counts),
        })
    }

    async fn status_count(&self, status: IssueStatus) -> Result<u64, CivicDeskError> {
        self.issues
            .count(&IssueFilter {
                status: Some(status),
                ..Default::default()
            })
            .await
    }
}

fn mean_response_hours(spans: &[(DateTime<Utc>, DateTime<Utc>)]) -> AvgResponseHours {
    if spans.is_empty() {
        return AvgResponseHours::Unavailable;
    }
    let total_hours: f64 = spans
        .iter()
        .map(|(assigned, resolved)| (*resolved - *assigned).num_seconds() as f64 / 3600.0)
        .sum();
    let mean = total_hours / spans.len() as f64;
    AvgResponseHours::Hours((mean * 10.0).round() / 10.0)
}
