use async_trait::async_trait;

use civicdesk_common::{CivicDeskError, Role, User};

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Create the profile unless one already exists for the email.
    /// Returns true when a new profile was created.
    async fn insert_if_absent(&self, user: User) -> Result<bool, CivicDeskError>;

    /// Lookup by email, compared after normalization.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, CivicDeskError>;

    async fn list(&self) -> Result<Vec<User>, CivicDeskError>;

    async fn list_by_role(&self, role: Role) -> Result<Vec<User>, CivicDeskError>;
}
