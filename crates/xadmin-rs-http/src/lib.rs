//! # xadmin-rs-http
//!
//! The inbound and outbound sides of a request as the admin core sees them.
//! Nothing here parses wire format beyond query strings and urlencoded
//! bodies; the axum adapter in `xadmin-rs-admin` does the rest.
//!
//! ## Modules
//!
//! - [`querydict`] - [`QueryDict`], multi-valued query and form parameters
//! - [`request`] - [`AdminRequest`] and its builder
//! - [`session`] - [`Session`] handles, flash [`Message`]s, and an in-memory [`SessionStore`]
//! - [`response`] - [`AdminResponse`], the abstract result of a view

pub mod querydict;
pub mod request;
pub mod response;
pub mod session;

pub use querydict::QueryDict;
pub use request::{AdminRequest, AdminRequestBuilder};
pub use response::AdminResponse;
pub use session::{Message, MessageLevel, Session, SessionStore};
