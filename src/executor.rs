//! Exclusive executor: one FIFO lock per repository instance.
//!
//! Every mutating git operation runs inside [`Executor::schedule`], which
//! holds the instance's lock for the whole closure, including every nested
//! sub-call made through the [`RepoHandle`] it receives. Different instances
//! never contend.
//!
//! # Lock ordering
//!
//! Work holding a view lock may schedule on its codebase's trunk; the
//! reverse is not allowed. Scheduling the key you already hold deadlocks, so
//! sub-operations take the handle instead of re-scheduling.
//!
//! # Capabilities
//!
//! [`RepoHandle::git`] exposes only [`GitRepo`]. Destructive primitives live
//! on [`RebasingHandle`], which [`RepoHandle::rebasing`] hands out only when
//! the work was scheduled with `allow_rebasing`.

use std::cell::OnceCell;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, instrument, trace};
use viewsync_git::{DestructiveGitRepo, GitRepo, GixRepo, Identity};

use crate::config::ExecutorConfig;
use crate::error::{Error, GitContext as _, Result};
use crate::locator::Locator;
use crate::model::{CodebaseId, ViewId};

// ---------------------------------------------------------------------------
// RepoKey
// ---------------------------------------------------------------------------

/// Identifies one repository instance.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RepoKey {
    Trunk(CodebaseId),
    View(CodebaseId, ViewId),
}

impl RepoKey {
    #[must_use]
    pub const fn codebase(&self) -> &CodebaseId {
        match self {
            Self::Trunk(cb) | Self::View(cb, _) => cb,
        }
    }
}

impl fmt::Display for RepoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trunk(cb) => write!(f, "{cb}/trunk"),
            Self::View(cb, view) => write!(f, "{cb}/{view}"),
        }
    }
}

// ---------------------------------------------------------------------------
// CancelToken / ScheduleOptions
// ---------------------------------------------------------------------------

/// Cooperative cancellation for a queued lock wait.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-call scheduling options.
#[derive(Clone, Debug, Default)]
pub struct ScheduleOptions {
    allow_rebasing: bool,
    deadline: Option<Instant>,
    timeout: Option<Duration>,
    cancel: Option<CancelToken>,
}

impl ScheduleOptions {
    /// Safe handle, configured default timeout, no cancellation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for `new().allow_rebasing(true)`.
    #[must_use]
    pub fn rebasing() -> Self {
        Self::new().allow_rebasing(true)
    }

    #[must_use]
    pub const fn allow_rebasing(mut self, allow: bool) -> Self {
        self.allow_rebasing = allow;
        self
    }

    /// Give up waiting at `deadline`.
    #[must_use]
    pub const fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Give up waiting after `timeout`, measured from the `schedule` call.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    #[must_use]
    pub const fn allows_rebasing(&self) -> bool {
        self.allow_rebasing
    }

    fn effective_deadline(&self, start: Instant, default: Option<Duration>) -> Option<Instant> {
        let from_timeout = self.timeout.or(default).map(|t| start + t);
        match (self.deadline, from_timeout) {
            (Some(d), Some(t)) if self.timeout.is_some() => Some(d.min(t)),
            (Some(d), _) => Some(d),
            (None, t) => t,
        }
    }
}

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

/// A FIFO ticket lock whose waiters can time out or be cancelled.
#[derive(Default)]
struct Gate {
    state: Mutex<GateState>,
    cond: Condvar,
}

#[derive(Default)]
struct GateState {
    next_ticket: u64,
    serving: u64,
    /// Tickets whose waiters gave up; skipped when the lock moves on.
    abandoned: BTreeSet<u64>,
}

impl GateState {
    fn advance(&mut self) {
        self.serving += 1;
        while self.abandoned.remove(&self.serving) {
            self.serving += 1;
        }
    }
}

enum WaitFailure {
    TimedOut,
    Cancelled,
}

impl Gate {
    fn acquire(
        self: &Arc<Self>,
        deadline: Option<Instant>,
        cancel: Option<&CancelToken>,
        poll: Duration,
    ) -> std::result::Result<GatePass, WaitFailure> {
        let mut state = self.state.lock();
        let ticket = state.next_ticket;
        state.next_ticket += 1;

        loop {
            if state.serving == ticket {
                return Ok(GatePass {
                    gate: Arc::clone(self),
                });
            }
            let failure = if cancel.is_some_and(CancelToken::is_cancelled) {
                Some(WaitFailure::Cancelled)
            } else if deadline.is_some_and(|d| Instant::now() >= d) {
                Some(WaitFailure::TimedOut)
            } else {
                None
            };
            if let Some(failure) = failure {
                state.abandoned.insert(ticket);
                return Err(failure);
            }

            // Wake at least every `poll` to observe cancellation.
            let mut wake = Instant::now() + poll;
            if let Some(d) = deadline {
                wake = wake.min(d);
            }
            self.cond.wait_until(&mut state, wake);
        }
    }

    fn release(&self) {
        let mut state = self.state.lock();
        state.advance();
        drop(state);
        self.cond.notify_all();
    }
}

/// Held lock; released on drop, including during unwinding.
struct GatePass {
    gate: Arc<Gate>,
}

impl Drop for GatePass {
    fn drop(&mut self) {
        self.gate.release();
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// Serializes work per repository instance.
///
/// Locks are created on first use and kept for the executor's lifetime.
pub struct Executor {
    gates: DashMap<RepoKey, Arc<Gate>>,
    locator: Locator,
    identity: Identity,
    default_timeout: Option<Duration>,
    poll_interval: Duration,
}

impl Executor {
    #[must_use]
    pub fn new(locator: Locator, identity: Identity, config: &ExecutorConfig) -> Self {
        Self {
            gates: DashMap::new(),
            locator,
            identity,
            default_timeout: config.lock_timeout(),
            poll_interval: config.poll_interval(),
        }
    }

    #[must_use]
    pub const fn locator(&self) -> &Locator {
        &self.locator
    }

    #[must_use]
    pub fn path_for(&self, key: &RepoKey) -> PathBuf {
        match key {
            RepoKey::Trunk(cb) => self.locator.trunk_path(cb),
            RepoKey::View(cb, view) => self.locator.view_path(cb, view),
        }
    }

    fn gate(&self, key: &RepoKey) -> Arc<Gate> {
        // Clone out of the map so no shard lock is held while waiting.
        Arc::clone(self.gates.entry(key.clone()).or_default().value())
    }

    /// Run `work` with exclusive access to the instance behind `key`.
    ///
    /// Errors from `work` are returned unchanged. The lock is released on
    /// every exit path.
    ///
    /// # Errors
    /// [`Error::LockTimeout`] or [`Error::Cancelled`] if the lock was not
    /// acquired; in both cases `work` never ran.
    #[instrument(level = "debug", skip(self, key, options, work), fields(key = %key, rebasing = options.allow_rebasing))]
    pub fn schedule<T>(
        &self,
        key: &RepoKey,
        options: &ScheduleOptions,
        label: &str,
        work: impl FnOnce(&RepoHandle) -> Result<T>,
    ) -> Result<T> {
        let started = Instant::now();
        let deadline = options.effective_deadline(started, self.default_timeout);
        let gate = self.gate(key);

        let _pass = gate
            .acquire(deadline, options.cancel.as_ref(), self.poll_interval)
            .map_err(|failure| match failure {
                WaitFailure::TimedOut => Error::LockTimeout {
                    key: key.clone(),
                    waited: started.elapsed(),
                },
                WaitFailure::Cancelled => Error::Cancelled { key: key.clone() },
            })?;
        trace!(waited = ?started.elapsed(), "lock acquired");

        let handle = RepoHandle {
            key: key.clone(),
            path: self.path_for(key),
            identity: self.identity.clone(),
            allow_rebasing: options.allow_rebasing,
            repo: OnceCell::new(),
        };
        let result = work(&handle);
        debug!(ok = result.is_ok(), elapsed = ?started.elapsed(), "released");
        result
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("locks", &self.gates.len())
            .field("base", &self.locator.base())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// Access to one locked repository instance. Valid only inside `schedule`.
pub struct RepoHandle {
    key: RepoKey,
    path: PathBuf,
    identity: Identity,
    allow_rebasing: bool,
    repo: OnceCell<GixRepo>,
}

impl RepoHandle {
    #[must_use]
    pub const fn key(&self) -> &RepoKey {
        &self.key
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn allows_rebasing(&self) -> bool {
        self.allow_rebasing
    }

    /// `true` if the instance directory exists.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn repo(&self) -> Result<&GixRepo> {
        if let Some(repo) = self.repo.get() {
            return Ok(repo);
        }
        let repo = GixRepo::open(&self.path, self.identity.clone())
            .vcs(|| format!("opening {}", self.key))?;
        Ok(self.repo.get_or_init(|| repo))
    }

    /// Non-destructive git access.
    ///
    /// # Errors
    /// Fails if the instance is not a git repository.
    pub fn git(&self) -> Result<&dyn GitRepo> {
        Ok(self.repo()?)
    }

    /// Destructive access, granted only if scheduled with `allow_rebasing`.
    ///
    /// # Errors
    /// [`Error::DestructiveOperationDenied`] otherwise.
    pub fn rebasing(&self, operation: &'static str) -> Result<RebasingHandle<'_>> {
        if self.allow_rebasing {
            Ok(RebasingHandle { handle: self })
        } else {
            tracing::warn!(key = %self.key, operation, "destructive operation denied");
            Err(Error::DestructiveOperationDenied {
                key: self.key.clone(),
                operation,
            })
        }
    }
}

/// Destructive access to a locked instance.
pub struct RebasingHandle<'a> {
    handle: &'a RepoHandle,
}

impl RebasingHandle<'_> {
    /// Git access including the primitives that discard working-tree content.
    ///
    /// # Errors
    /// Fails if the instance is not a git repository.
    pub fn git(&self) -> Result<&dyn DestructiveGitRepo> {
        Ok(self.handle.repo()?)
    }

    /// Create the bare trunk repository at this instance's path.
    ///
    /// # Errors
    /// Fails if git cannot initialize the directory.
    pub fn init_trunk(&self, branch: &str) -> Result<()> {
        let h = self.handle;
        let repo = GixRepo::init_bare(&h.path, branch, h.identity.clone())
            .vcs(|| format!("initializing trunk {}", h.key))?;
        let _ = h.repo.set(repo);
        Ok(())
    }

    /// Clone `trunk` into this instance's path.
    ///
    /// # Errors
    /// Fails if the path is non-empty or the clone fails.
    pub fn clone_trunk(&self, trunk: &Path) -> Result<()> {
        let h = self.handle;
        let repo = GixRepo::clone_from(trunk, &h.path, h.identity.clone())
            .vcs(|| format!("cloning trunk into {}", h.key))?;
        let _ = h.repo.set(repo);
        Ok(())
    }

    /// Delete the instance directory and everything in it.
    ///
    /// # Errors
    /// Fails on I/O errors other than the directory already being gone.
    pub fn remove_instance(&self) -> Result<()> {
        let h = self.handle;
        match std::fs::remove_dir_all(&h.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::git(
                format!("removing {}", h.key),
                viewsync_git::GitError::IoError(e),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn executor() -> Executor {
        Executor::new(
            Locator::new("/nonexistent/viewsync-test"),
            Identity::default(),
            &ExecutorConfig::default(),
        )
    }

    fn view_key(view: &str) -> RepoKey {
        RepoKey::View(CodebaseId::new("cb").unwrap(), ViewId::new(view).unwrap())
    }

    #[test]
    fn key_display_and_path() {
        let exec = executor();
        let trunk = RepoKey::Trunk(CodebaseId::new("cb").unwrap());
        assert_eq!(trunk.to_string(), "cb/trunk");
        assert_eq!(view_key("v1").to_string(), "cb/v1");
        assert_eq!(
            exec.path_for(&view_key("v1")),
            PathBuf::from("/nonexistent/viewsync-test/cb/v1")
        );
    }

    #[test]
    fn work_result_is_returned_unchanged() {
        let exec = executor();
        let out = exec
            .schedule(&view_key("v"), &ScheduleOptions::new(), "t", |_| Ok(42))
            .unwrap();
        assert_eq!(out, 42);

        let err = exec
            .schedule(&view_key("v"), &ScheduleOptions::new(), "t", |_| {
                Err::<(), _>(Error::not_found("view", "x"))
            })
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { kind: "view", .. }));

        // The lock was released after the error.
        exec.schedule(&view_key("v"), &ScheduleOptions::new(), "t", |_| Ok(()))
            .unwrap();
    }

    #[test]
    fn safe_handle_refuses_rebasing() {
        let exec = executor();
        let err = exec
            .schedule(&view_key("v"), &ScheduleOptions::new(), "t", |h| {
                h.rebasing("reset_hard").map(|_| ())
            })
            .unwrap_err();
        assert!(matches!(
            err,
            Error::DestructiveOperationDenied {
                operation: "reset_hard",
                ..
            }
        ));

        exec.schedule(&view_key("v"), &ScheduleOptions::rebasing(), "t", |h| {
            assert!(h.allows_rebasing());
            h.rebasing("reset_hard").map(|_| ())
        })
        .unwrap();
    }

    #[test]
    fn lock_released_after_panic() {
        let exec = executor();
        let caught = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = exec.schedule(&view_key("v"), &ScheduleOptions::new(), "t", |_| -> Result<()> {
                panic!("boom")
            });
        }));
        assert!(caught.is_err());
        exec.schedule(
            &view_key("v"),
            &ScheduleOptions::new().timeout(Duration::from_millis(200)),
            "t",
            |_| Ok(()),
        )
        .unwrap();
    }

    #[test]
    fn nested_different_key_is_allowed() {
        let exec = executor();
        let trunk = RepoKey::Trunk(CodebaseId::new("cb").unwrap());
        let out = exec
            .schedule(&view_key("v"), &ScheduleOptions::new(), "outer", |_| {
                exec.schedule(&trunk, &ScheduleOptions::new(), "inner", |h| {
                    Ok(h.key().clone())
                })
            })
            .unwrap();
        assert_eq!(out, trunk);
    }

    #[test]
    fn effective_deadline_prefers_earliest_explicit_bound() {
        let start = Instant::now();
        let default = Some(Duration::from_secs(60));

        assert_eq!(ScheduleOptions::new().effective_deadline(start, None), None);
        assert_eq!(
            ScheduleOptions::new().effective_deadline(start, default),
            Some(start + Duration::from_secs(60))
        );

        let deadline = start + Duration::from_secs(5);
        // An explicit deadline overrides the configured default.
        assert_eq!(
            ScheduleOptions::new()
                .deadline(deadline)
                .effective_deadline(start, default),
            Some(deadline)
        );
        assert_eq!(
            ScheduleOptions::new()
                .deadline(deadline)
                .timeout(Duration::from_secs(1))
                .effective_deadline(start, default),
            Some(start + Duration::from_secs(1))
        );
    }

    #[test]
    fn abandoned_tickets_are_skipped() {
        let gate = Arc::new(Gate::default());
        let poll = Duration::from_millis(1);
        let first = gate.acquire(None, None, poll).ok().unwrap();

        // Second waiter gives up immediately.
        let expired = Some(Instant::now());
        assert!(matches!(
            gate.acquire(expired, None, poll),
            Err(WaitFailure::TimedOut)
        ));
        // Third waiter is cancelled.
        let token = CancelToken::new();
        token.cancel();
        assert!(matches!(
            gate.acquire(None, Some(&token), poll),
            Err(WaitFailure::Cancelled)
        ));

        drop(first);
        // The next fresh ticket is served without waiting on the abandoned ones.
        let again = gate.acquire(Some(Instant::now() + Duration::from_secs(1)), None, poll);
        assert!(again.is_ok());
    }
}
