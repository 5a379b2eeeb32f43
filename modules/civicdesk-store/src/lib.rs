pub mod client;
pub mod issues;
pub mod memory;
pub mod mongo;
pub mod users;

#[cfg(feature = "test-utils")]
pub mod testutil;

pub use client::StoreClient;
pub use issues::{
    ConditionalOutcome, DateField, IssueFilter, IssueStore, VoterMutation, VoterPredicate,
};
pub use memory::{MemoryIssueStore, MemoryUserStore};
pub use mongo::{MongoIssueStore, MongoUserStore};
pub use users::UserStore;
