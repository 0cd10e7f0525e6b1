//! # xadmin-rs-template
//!
//! The template collaborator. Views never render HTML themselves: they build
//! a [`Context`] and a list of candidate template names, and a
//! [`TemplateRenderer`] turns the first template that exists into a string.
//!
//! ## Modules
//!
//! - [`context`] - [`Context`], the JSON variable map handed to templates
//! - [`media`] - [`Media`], the CSS/JS asset lists views and plugins accumulate
//! - [`engine`] - The [`TemplateRenderer`] trait and the Tera-backed [`Engine`]

pub mod context;
pub mod engine;
pub mod media;

pub use context::Context;
pub use engine::{Engine, TemplateRenderer};
pub use media::Media;
