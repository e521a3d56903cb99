//! regstore - versioned access to registry artifacts kept in git
//!
//! Registry artifacts (forms, process definitions, settings) live in a git
//! repository paired with a Gerrit-style review server. Every "version" is
//! either the trunk or an open change under review, and each version gets
//! its own working directory.
//!
//! # Architecture
//!
//! The codebase follows a layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to repo)
//! - [`repo`] - Versioned repository facades, locking, caching, mutation
//! - [`review`] - Abstraction over the review server (Gerrit, mock)
//! - [`git`] - Single interface for all Git operations
//! - [`core`] - Domain types, configuration and path routing
//!
//! # Correctness Invariants
//!
//! 1. Exactly one clone per version on disk
//! 2. At most one git operation in flight per version
//! 3. A candidate's working tree is never observed mid-commit
//! 4. The trunk never accepts writes

pub mod cli;
pub mod core;
pub mod git;
pub mod repo;
pub mod review;
