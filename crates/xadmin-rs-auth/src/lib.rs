//! # xadmin-rs-auth
//!
//! Who is making the request and what they may do.
//!
//! ## Modules
//!
//! - [`user`] - [`AdminUser`], the authenticated principal (or anonymous)
//! - [`permissions`] - [`Action`], [`Group`], the [`PermissionTable`] and [`check_permission`]
//! - [`backends`] - The [`Authenticator`] trait consulted by the login view

pub mod backends;
pub mod permissions;
pub mod user;

pub use backends::{Authenticator, InMemoryAuthenticator, SESSION_KEY};
pub use permissions::{check_permission, Action, Group, PermissionTable};
pub use user::AdminUser;
