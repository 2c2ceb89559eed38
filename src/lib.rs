//! viewsync library crate.
//!
//! Binds long-lived working copies ("views") to named lines of work
//! ("workspaces") over a shared git trunk per codebase. Switching a view
//! snapshots the outgoing workspace's working tree and restores the incoming
//! one's, without ever committing to workspace branches.
//!
//! The `viewsync` binary is a thin CLI over [`Engine`].

pub mod binder;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod executor;
pub mod locator;
pub mod model;
pub mod snapshot;
pub mod store;
pub mod telemetry;

pub use engine::{Engine, NewView, NewWorkspace};
pub use error::{Error, ErrorKind, Result};
