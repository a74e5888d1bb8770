//! Cancellable deadlines for outbound calls and store operations.
//!
//! # Responsibility
//! - Carry an optional expiry instant and a cancellation flag per operation.
//! - Derive child deadlines that observe every ancestor's cancellation.
//!
//! # Invariants
//! - A child never outlives its parent: its expiry is `min(parent, own)`.
//! - Cancelling a child does not cancel its parent or siblings.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Why an operation stopped before completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    /// The operation or one of its ancestors was cancelled explicitly.
    Cancelled,
    /// The expiry instant has passed.
    DeadlineExceeded,
}

impl Display for Interrupted {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cancelled => f.write_str("operation cancelled"),
            Self::DeadlineExceeded => f.write_str("deadline exceeded"),
        }
    }
}

impl Error for Interrupted {}

/// Cancellable deadline handle. Cheap to clone; clones share cancellation.
#[derive(Debug, Clone)]
pub struct Deadline {
    expires_at: Option<Instant>,
    flags: Vec<Arc<AtomicBool>>,
}

impl Default for Deadline {
    fn default() -> Self {
        Self::none()
    }
}

impl Deadline {
    /// Deadline without expiry; still cancellable.
    pub fn none() -> Self {
        Self {
            expires_at: None,
            flags: vec![Arc::new(AtomicBool::new(false))],
        }
    }

    pub fn after(timeout: Duration) -> Self {
        Self {
            expires_at: Instant::now().checked_add(timeout),
            flags: vec![Arc::new(AtomicBool::new(false))],
        }
    }

    /// Derives a child bounded by both `timeout` and this deadline.
    pub fn child(&self, timeout: Duration) -> Self {
        let own = Instant::now().checked_add(timeout);
        let expires_at = match (self.expires_at, own) {
            (Some(parent), Some(own)) => Some(parent.min(own)),
            (parent, own) => parent.or(own),
        };
        self.derive(expires_at)
    }

    /// Derives a child with the same expiry but its own cancellation flag.
    pub fn scope(&self) -> Self {
        self.derive(self.expires_at)
    }

    fn derive(&self, expires_at: Option<Instant>) -> Self {
        let mut flags = Vec::with_capacity(self.flags.len() + 1);
        flags.push(Arc::new(AtomicBool::new(false)));
        flags.extend(self.flags.iter().cloned());
        Self { expires_at, flags }
    }

    /// Cancels this deadline, its clones and all of its descendants.
    pub fn cancel(&self) {
        if let Some(own) = self.flags.first() {
            own.store(true, Ordering::SeqCst);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.flags.iter().any(|flag| flag.load(Ordering::SeqCst))
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| Instant::now() >= expires_at)
    }

    /// Time left before expiry; `None` when the deadline has no expiry.
    pub fn remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|expires_at| expires_at.saturating_duration_since(Instant::now()))
    }

    /// Fails fast when the deadline is cancelled or expired.
    ///
    /// Cancellation wins over expiry when both hold.
    pub fn check(&self) -> Result<(), Interrupted> {
        if self.is_cancelled() {
            return Err(Interrupted::Cancelled);
        }
        if self.is_expired() {
            return Err(Interrupted::DeadlineExceeded);
        }
        Ok(())
    }
}
