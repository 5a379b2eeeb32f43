use civicdesk_common::{normalize_email, Role};

/// The verified caller for one request: email from the credential layer,
/// role from the user table (None when no profile exists yet).
#[derive(Debug, Clone)]
pub struct Caller {
    pub email: String,
    pub role: Option<Role>,
}

impl Caller {
    pub fn new(email: &str, role: Option<Role>) -> Self {
        Self {
            email: normalize_email(email),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Some(Role::Admin)
    }
}

/// Whether a caller may read a subject's dashboard: admins may read any,
/// everyone else only their own.
pub fn may_view_subject(caller: &Caller, subject_email: &str) -> bool {
    caller.is_admin() || caller.email == normalize_email(subject_email)
}
