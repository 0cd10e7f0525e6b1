//! Authentication backends.
//!
//! The admin site does not own a user table. It asks an [`Authenticator`] to
//! check credentials at login and to reload the principal whose id was stored
//! in the session under [`SESSION_KEY`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::user::AdminUser;

/// Session key holding the logged-in user's id.
pub const SESSION_KEY: &str = "_auth_user_id";

/// Resolves credentials and session ids to principals.
pub trait Authenticator: Send + Sync {
    /// Returns the user if the credentials are valid.
    fn authenticate(&self, username: &str, password: &str) -> Option<AdminUser>;

    /// Reloads a user by id.
    fn get_user(&self, user_id: u64) -> Option<AdminUser>;
}

/// An [`Authenticator`] over a fixed set of users, for development and tests.
///
/// Passwords are compared as given; do not use it with real credentials.
///
/// # Examples
///
/// ```
/// use xadmin_rs_auth::{AdminUser, Authenticator, InMemoryAuthenticator};
///
/// let auth = InMemoryAuthenticator::new();
/// auth.add_user(AdminUser::new(1, "admin").superuser(), "secret");
///
/// assert!(auth.authenticate("admin", "secret").is_some());
/// assert!(auth.authenticate("admin", "wrong").is_none());
/// assert_eq!(auth.get_user(1).unwrap().username, "admin");
/// ```
#[derive(Clone, Default)]
pub struct InMemoryAuthenticator {
    users: Arc<RwLock<HashMap<u64, (AdminUser, String)>>>,
}

impl InMemoryAuthenticator {
    /// Creates an empty authenticator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a user.
    pub fn add_user(&self, user: AdminUser, password: impl Into<String>) {
        self.users
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user.id, (user, password.into()));
    }
}

impl fmt::Debug for InMemoryAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("InMemoryAuthenticator")
            .field("users", &users.len())
            .finish_non_exhaustive()
    }
}

impl Authenticator for InMemoryAuthenticator {
    fn authenticate(&self, username: &str, password: &str) -> Option<AdminUser> {
        let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
        users
            .values()
            .find(|(u, p)| u.username == username && p == password && u.is_active)
            .map(|(u, _)| u.clone())
    }

    fn get_user(&self, user_id: u64) -> Option<AdminUser> {
        let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
        users.get(&user_id).map(|(u, _)| u.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inactive_users_cannot_log_in() {
        let auth = InMemoryAuthenticator::new();
        auth.add_user(AdminUser::new(2, "gone").inactive(), "pw");
        assert!(auth.authenticate("gone", "pw").is_none());
        assert!(auth.get_user(2).is_some());
    }

    #[test]
    fn test_unknown_user() {
        let auth = InMemoryAuthenticator::new();
        assert!(auth.authenticate("nobody", "").is_none());
        assert!(auth.get_user(99).is_none());
    }

    #[test]
    fn test_debug_hides_passwords() {
        let auth = InMemoryAuthenticator::new();
        auth.add_user(AdminUser::new(1, "a"), "hunter2");
        let out = format!("{auth:?}");
        assert!(!out.contains("hunter2"));
    }
}
