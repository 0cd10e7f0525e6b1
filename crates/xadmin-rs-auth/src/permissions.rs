//! Model permissions and the permission-implication table.
//!
//! Model permissions are named `app_label.<action>_<model_name>`. Some
//! actions imply others: whoever may change a model may also view it. Those
//! implications are data in a [`PermissionTable`] rather than ad-hoc
//! fallbacks, and [`check_permission`] is the one function views call.
//!
//! # Examples
//!
//! ```
//! use xadmin_rs_auth::{check_permission, Action, AdminUser};
//! use xadmin_rs_db::ModelMeta;
//!
//! let article = ModelMeta::new("blog", "Article");
//! let editor = AdminUser::new(3, "ed").staff().with_perm("blog.change_article");
//!
//! assert!(check_permission(&editor, &article, &Action::Change));
//! assert!(check_permission(&editor, &article, &Action::View));
//! assert!(!check_permission(&editor, &article, &Action::Delete));
//! ```

use std::collections::BTreeSet;
use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use xadmin_rs_db::ModelMeta;

use crate::user::AdminUser;

/// Something a principal may do to a model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Read access.
    View,
    /// Create records.
    Add,
    /// Modify records.
    Change,
    /// Remove records.
    Delete,
    /// A model-specific permission codename prefix.
    Custom(String),
}

impl Action {
    /// The codename prefix (`"view"`, `"add"`, ...).
    pub fn as_str(&self) -> &str {
        match self {
            Self::View => "view",
            Self::Add => "add",
            Self::Change => "change",
            Self::Delete => "delete",
            Self::Custom(name) => name,
        }
    }

    /// Parses a codename prefix. Unknown names become [`Action::Custom`].
    pub fn parse(name: &str) -> Self {
        match name {
            "view" => Self::View,
            "add" => Self::Add,
            "change" => Self::Change,
            "delete" => Self::Delete,
            other => Self::Custom(other.to_string()),
        }
    }

    /// The four standard model actions.
    pub fn standard() -> [Self; 4] {
        [Self::View, Self::Add, Self::Change, Self::Delete]
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns the permission codename, e.g. `"change_article"`.
pub fn get_permission_codename(action: &Action, meta: &ModelMeta) -> String {
    format!("{}_{}", action.as_str(), meta.model_name)
}

/// Returns the full permission name, e.g. `"blog.change_article"`.
pub fn get_model_perm(meta: &ModelMeta, action: &Action) -> String {
    format!("{}.{}", meta.app_label, get_permission_codename(action, meta))
}

/// A named set of permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Group name.
    pub name: String,
    /// Full permission names.
    pub permissions: BTreeSet<String>,
}

impl Group {
    /// Creates an empty group.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            permissions: BTreeSet::new(),
        }
    }

    /// Adds a permission.
    #[must_use]
    pub fn with_perm(mut self, perm: impl Into<String>) -> Self {
        self.permissions.insert(perm.into());
        self
    }
}

/// A directed graph of "holding A grants B" edges between actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionTable {
    edges: Vec<(Action, Action)>,
}

impl Default for PermissionTable {
    /// The standard table: `change` implies `view`.
    fn default() -> Self {
        Self::empty().implies(Action::Change, Action::View)
    }
}

impl PermissionTable {
    /// A table with no implications.
    pub const fn empty() -> Self {
        Self { edges: Vec::new() }
    }

    /// Declares that holding `granting` also grants `granted`.
    #[must_use]
    pub fn implies(mut self, granting: Action, granted: Action) -> Self {
        if !self.edges.contains(&(granting.clone(), granted.clone())) {
            self.edges.push((granting, granted));
        }
        self
    }

    /// Every action whose holder is granted `action`, including `action`
    /// itself, following implications transitively.
    pub fn granting(&self, action: &Action) -> Vec<Action> {
        let mut found = vec![action.clone()];
        let mut cursor = 0;
        while cursor < found.len() {
            let target = found[cursor].clone();
            for (from, to) in &self.edges {
                if *to == target && !found.contains(from) {
                    found.push(from.clone());
                }
            }
            cursor += 1;
        }
        found
    }

    /// Returns `true` if `principal` may perform `action` on `meta`.
    pub fn check(&self, principal: &AdminUser, meta: &ModelMeta, action: &Action) -> bool {
        self.granting(action)
            .iter()
            .any(|a| principal.has_perm(&get_model_perm(meta, a)))
    }
}

static DEFAULT_TABLE: Lazy<PermissionTable> = Lazy::new(PermissionTable::default);

/// Checks a model permission against the default [`PermissionTable`].
pub fn check_permission(principal: &AdminUser, meta: &ModelMeta, action: &Action) -> bool {
    let allowed = DEFAULT_TABLE.check(principal, meta, action);
    tracing::trace!(
        user = principal.id,
        model = %meta.label(),
        action = %action,
        allowed,
        "permission check"
    );
    allowed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article() -> ModelMeta {
        ModelMeta::new("blog", "Article")
    }

    #[test]
    fn test_codenames() {
        assert_eq!(get_permission_codename(&Action::Add, &article()), "add_article");
        assert_eq!(get_model_perm(&article(), &Action::View), "blog.view_article");
        assert_eq!(
            get_model_perm(&article(), &Action::Custom("publish".into())),
            "blog.publish_article"
        );
    }

    #[test]
    fn test_action_parse_roundtrip() {
        for a in Action::standard() {
            assert_eq!(Action::parse(a.as_str()), a);
        }
        assert_eq!(Action::parse("export"), Action::Custom("export".into()));
    }

    #[test]
    fn test_default_table_change_grants_view() {
        let table = PermissionTable::default();
        assert_eq!(table.granting(&Action::View), vec![Action::View, Action::Change]);
        assert_eq!(table.granting(&Action::Change), vec![Action::Change]);
    }

    #[test]
    fn test_view_does_not_grant_change() {
        let viewer = AdminUser::new(1, "v").with_perm("blog.view_article");
        assert!(check_permission(&viewer, &article(), &Action::View));
        assert!(!check_permission(&viewer, &article(), &Action::Change));
    }

    #[test]
    fn test_transitive_implications() {
        let table = PermissionTable::empty()
            .implies(Action::Delete, Action::Change)
            .implies(Action::Change, Action::View);
        let deleter = AdminUser::new(1, "d").with_perm("blog.delete_article");
        assert!(table.check(&deleter, &article(), &Action::View));
        assert!(!table.check(&deleter, &article(), &Action::Add));
    }

    #[test]
    fn test_cycle_terminates() {
        let table = PermissionTable::empty()
            .implies(Action::Add, Action::Change)
            .implies(Action::Change, Action::Add);
        assert_eq!(table.granting(&Action::Add).len(), 2);
    }

    #[test]
    fn test_empty_table_is_literal() {
        let editor = AdminUser::new(1, "e").with_perm("blog.change_article");
        assert!(!PermissionTable::empty().check(&editor, &article(), &Action::View));
    }

    #[test]
    fn test_superuser_passes_everything() {
        let root = AdminUser::new(1, "r").superuser();
        assert!(check_permission(&root, &article(), &Action::Delete));
    }
}
