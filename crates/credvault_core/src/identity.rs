//! Caller identity collaborator.
//!
//! Stores read the caller's user id once, at construction, and scope every
//! user-facing query by it. Authentication itself lives outside the core.

/// Supplies the id of the user on whose behalf the core is acting.
pub trait IdentityProvider {
    /// Returns `None` for system contexts (maintenance jobs, admin tooling).
    fn user_id(&self) -> Option<String>;
}

/// Fixed identity, resolved up front by the embedding application.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticIdentity {
    user_id: Option<String>,
}

impl StaticIdentity {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
        }
    }

    /// Identity for system contexts without a logged-in user.
    pub fn system() -> Self {
        Self::default()
    }
}

impl IdentityProvider for StaticIdentity {
    fn user_id(&self) -> Option<String> {
        self.user_id.clone()
    }
}
