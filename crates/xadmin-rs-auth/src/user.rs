//! The request principal.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::permissions::Group;

/// A user of the admin site, or the anonymous principal.
///
/// Permission strings use the `app_label.codename` form
/// (e.g. `"blog.change_article"`).
///
/// # Examples
///
/// ```
/// use xadmin_rs_auth::AdminUser;
///
/// let editor = AdminUser::new(7, "editor").staff().with_perm("blog.change_article");
/// assert!(editor.has_perm("blog.change_article"));
/// assert!(!editor.has_perm("blog.delete_article"));
///
/// let root = AdminUser::new(1, "root").superuser();
/// assert!(root.has_perm("anything.at_all"));
///
/// assert!(!AdminUser::anonymous().is_authenticated());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminUser {
    /// Primary key. `0` for the anonymous user.
    pub id: u64,
    /// Login name.
    pub username: String,
    /// Email address.
    pub email: String,
    /// Inactive users have no permissions.
    pub is_active: bool,
    /// Staff users may enter the admin site.
    pub is_staff: bool,
    /// Superusers hold every permission.
    pub is_superuser: bool,
    /// Directly assigned permissions.
    pub permissions: BTreeSet<String>,
    /// Groups whose permissions the user inherits.
    pub groups: Vec<Group>,
    authenticated: bool,
}

impl AdminUser {
    /// Creates an active, authenticated, non-staff user with no permissions.
    pub fn new(id: u64, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            email: String::new(),
            is_active: true,
            is_staff: false,
            is_superuser: false,
            permissions: BTreeSet::new(),
            groups: Vec::new(),
            authenticated: true,
        }
    }

    /// The anonymous principal.
    pub fn anonymous() -> Self {
        Self {
            authenticated: false,
            ..Self::new(0, "")
        }
    }

    /// Marks the user as staff.
    #[must_use]
    pub const fn staff(mut self) -> Self {
        self.is_staff = true;
        self
    }

    /// Marks the user as a staff superuser.
    #[must_use]
    pub const fn superuser(mut self) -> Self {
        self.is_staff = true;
        self.is_superuser = true;
        self
    }

    /// Deactivates the user.
    #[must_use]
    pub const fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Sets the email address.
    #[must_use]
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    /// Grants a permission.
    #[must_use]
    pub fn with_perm(mut self, perm: impl Into<String>) -> Self {
        self.permissions.insert(perm.into());
        self
    }

    /// Adds the user to a group.
    #[must_use]
    pub fn with_group(mut self, group: Group) -> Self {
        self.groups.push(group);
        self
    }

    /// Returns `false` only for the anonymous principal.
    pub const fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Returns `true` if the user holds `perm` directly, through a group, or
    /// as an active superuser.
    pub fn has_perm(&self, perm: &str) -> bool {
        if !self.is_active || !self.authenticated {
            return false;
        }
        self.is_superuser
            || self.permissions.contains(perm)
            || self.groups.iter().any(|g| g.permissions.contains(perm))
    }

    /// Returns `true` if the user holds any permission in `app_label`.
    pub fn has_module_perms(&self, app_label: &str) -> bool {
        if !self.is_active || !self.authenticated {
            return false;
        }
        let prefix = format!("{app_label}.");
        self.is_superuser
            || self.permissions.iter().any(|p| p.starts_with(&prefix))
            || self
                .groups
                .iter()
                .flat_map(|g| g.permissions.iter())
                .any(|p| p.starts_with(&prefix))
    }
}

impl Default for AdminUser {
    fn default() -> Self {
        Self::anonymous()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inactive_superuser_has_nothing() {
        let u = AdminUser::new(1, "x").superuser().inactive();
        assert!(!u.has_perm("a.b"));
        assert!(!u.has_module_perms("a"));
    }

    #[test]
    fn test_anonymous_has_nothing() {
        let u = AdminUser::anonymous().with_perm("a.view_b");
        assert!(!u.has_perm("a.view_b"));
        assert_eq!(AdminUser::default(), AdminUser::anonymous());
    }

    #[test]
    fn test_group_permissions() {
        let group = Group::new("editors").with_perm("blog.add_article");
        let u = AdminUser::new(2, "g").with_group(group);
        assert!(u.has_perm("blog.add_article"));
        assert!(u.has_module_perms("blog"));
        assert!(!u.has_module_perms("shop"));
    }
}
