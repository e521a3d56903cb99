//! review
//!
//! Abstraction over the code-review server that owns candidate changes.
//!
//! # Architecture
//!
//! The [`ReviewAdapter`] trait defines everything the repository layer
//! needs from the review server: change metadata, per-change file maps and
//! the review workflow (topic, submit, abandon, rebase, comments). The
//! repository layer only ever holds an `Arc<dyn ReviewAdapter>`.
//!
//! # Modules
//!
//! - `traits`: Core `ReviewAdapter` trait and request/response types
//! - [`gerrit`]: Gerrit REST implementation
//! - [`mock`]: In-memory implementation for deterministic testing

pub mod gerrit;
pub mod mock;
mod traits;

pub use traits::*;
