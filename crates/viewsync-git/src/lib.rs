//! Git abstraction layer for viewsync.
//!
//! Every other viewsync crate talks to git through the two traits defined
//! here. Nothing outside this crate imports gix or spawns `git` directly.
//!
//! # Crate layout
//!
//! - [`repo`]: the [`GitRepo`] trait (non-destructive primitives) and the
//!   [`DestructiveGitRepo`] extension trait (primitives that overwrite
//!   uncommitted working-tree content).
//! - [`types`]: value types used in trait signatures ([`GitOid`],
//!   [`RefName`], [`CommitInfo`], [`StatusEntry`], [`Identity`]).
//! - [`error`]: the [`GitError`] enum returned by all trait methods.
//!
//! Holding a `&dyn GitRepo` gives no way to reach the destructive methods;
//! callers must be handed a `&dyn DestructiveGitRepo` explicitly.

pub mod error;
pub mod repo;
pub mod types;

// gix + CLI backed implementation modules
mod checkout_impl;
mod cli;
mod gix_repo;
mod objects_impl;
mod refs_impl;
mod remote_impl;
mod snapshot_impl;
mod status_impl;

pub use gix_repo::GixRepo;

pub use error::GitError;
pub use repo::{DestructiveGitRepo, GitRepo};
pub use types::{
    CommitInfo, FileStatus, GitOid, Identity, OidParseError, RefName, RefNameError, StatusEntry,
};
