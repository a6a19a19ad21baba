use super::user::{Role, UserId, UserProfile};

/// The user resolved for a single request. Lives only as long as the request.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: UserProfile,
}

impl Session {
    pub fn user_id(&self) -> UserId {
        self.user.id
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.user.role == role
    }
}
