//! # xadmin-rs-test
//!
//! Support code for testing admin sites without a server.
//!
//! ## Modules
//!
//! - [`request_factory`] - [`RequestFactory`] for building requests with a user and session
//! - [`fixtures`] - Users, model metadata and a seeded store
//! - [`assertions`] - Checks on [`AdminResponse`](xadmin_rs_http::AdminResponse)s

pub mod assertions;
pub mod fixtures;
pub mod request_factory;

pub use assertions::{assert_context_contains, assert_redirects, assert_status, assert_template_used};
pub use request_factory::RequestFactory;
