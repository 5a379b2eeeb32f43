pub mod authz;
pub mod engagement;
pub mod histogram;
pub mod stats;

pub use authz::{may_view_subject, Caller};
pub use engagement::{EngagementToggle, UpvoteReceipt};
pub use histogram::{DayBucket, DayWindow};
pub use stats::{AdminStats, AvgResponseHours, CitizenStats, StaffStats, StatsAggregator};
