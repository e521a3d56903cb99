//! core
//!
//! Core domain types, configuration and path routing.
//!
//! # Modules
//!
//! - [`types`] - Strong types: VersionId, BranchName, FileEntry, etc.
//! - [`config`] - Configuration schema and loading
//! - [`paths`] - Clone directory routing and path confinement
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Schemas are strict and self-describing
//! - Nothing here touches Git or the network

pub mod config;
pub mod paths;
pub mod types;
