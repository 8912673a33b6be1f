//! Synchronization strategies.
//!
//! A strategy sits between the session and the wire. Every local edit passes
//! through [`SyncStrategy::register_outgoing`] before it is sent, and every
//! remote edit passes through [`SyncStrategy::transform_incoming`] before it
//! is applied. Swapping the strategy swaps the conflict-resolution algorithm
//! without touching the session.

use std::fmt;

use docshare_core::{transform_with, Operation, OperationError, Priority};

use crate::messages::UpdateMessage;

/// Which side of the session this party is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Sent the Start message.
    Initiator,
    /// Accepted the Start message.
    Receiver,
}

impl Role {
    /// Tie-break used when transforming remote edits.
    ///
    /// The initiator's insertion wins every tie, on both sides.
    pub fn priority(self) -> Priority {
        match self {
            Role::Initiator => Priority::Local,
            Role::Receiver => Priority::Remote,
        }
    }
}

/// A conflict-resolution algorithm for one session.
pub trait SyncStrategy: Send + fmt::Debug {
    /// Record a local edit that is about to be sent; returns what to send.
    ///
    /// The operation inside the returned update is `op` unchanged.
    fn register_outgoing(&mut self, op: Operation) -> UpdateMessage;

    /// Check a remote edit fits the text the peer made it on, given that the
    /// local document now holds `len` chars.
    ///
    /// Leaves the strategy untouched. An update that fails here must not be
    /// passed to [`transform_incoming`](Self::transform_incoming).
    fn check_incoming(&self, update: &UpdateMessage, len: usize) -> docshare_core::Result<()>;

    /// Adjust a remote edit so it applies to the local document.
    fn transform_incoming(&mut self, update: UpdateMessage) -> Operation;

    /// Count remote edits that were applied without going through this
    /// strategy, such as updates buffered before a share was accepted.
    fn skip_incoming(&mut self, count: u64);

    /// Local edits the peer has not yet acknowledged, oldest first.
    fn outstanding(&self) -> &[Operation];
}

/// Which strategy a session creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategyKind {
    /// Operational transformation against the unacknowledged local backlog.
    #[default]
    Cola,
    /// No transformation at all.
    Identity,
}

impl StrategyKind {
    /// Create a fresh strategy instance for a session in `role`.
    pub fn build(self, role: Role) -> Box<dyn SyncStrategy> {
        match self {
            StrategyKind::Cola => Box::new(ColaStrategy::new(role)),
            StrategyKind::Identity => Box::new(IdentityStrategy),
        }
    }
}

/// Backlog-based operational transformation for two parties.
///
/// Outgoing edits are queued unchanged and tagged with how many edits each
/// side had produced. An incoming update says how many of our edits the
/// peer had applied when it made its edit: those are acknowledged and
/// dropped. The incoming edit is then folded through what is left,
/// oldest-first, and each remaining local edit is rewritten to follow it, so
/// the backlog stays in the context of the next incoming edit.
#[derive(Debug, Clone)]
pub struct ColaStrategy {
    outstanding: Vec<Operation>,
    /// Local edits sent so far.
    sent: u64,
    /// Local edits the peer has acknowledged.
    acknowledged: u64,
    /// Remote edits applied so far.
    received: u64,
    priority: Priority,
}

impl ColaStrategy {
    pub fn new(role: Role) -> Self {
        Self {
            outstanding: Vec::new(),
            sent: 0,
            acknowledged: 0,
            received: 0,
            priority: role.priority(),
        }
    }

    /// Outstanding edits the peer had not applied when it made an edit
    /// tagged `seen`.
    fn unseen(&self, seen: u64) -> &[Operation] {
        let retired = seen.min(self.sent).saturating_sub(self.acknowledged) as usize;
        self.outstanding.get(retired..).unwrap_or(&[])
    }

    fn retire(&mut self, seen: u64) {
        let seen = if seen > self.sent {
            tracing::warn!(seen, sent = self.sent, "peer acknowledged edits never sent");
            self.sent
        } else {
            seen
        };
        if seen > self.acknowledged {
            // Outstanding edits are contiguous, oldest first.
            let retired = (seen - self.acknowledged) as usize;
            self.outstanding.drain(..retired.min(self.outstanding.len()));
            self.acknowledged = seen;
            tracing::trace!(retired, "peer acknowledged local edits");
        }
    }
}

impl SyncStrategy for ColaStrategy {
    fn register_outgoing(&mut self, op: Operation) -> UpdateMessage {
        self.sent += 1;
        self.outstanding.push(op.clone());
        UpdateMessage::new(op, self.sent, self.received)
    }

    fn check_incoming(&self, update: &UpdateMessage, len: usize) -> docshare_core::Result<()> {
        // The local document is the peer's text plus the edits it has not seen.
        let delta: isize = self.unseen(update.seen).iter().map(Operation::len_delta).sum();
        let base = isize::try_from(len)
            .ok()
            .and_then(|len| len.checked_sub(delta))
            .and_then(|base| usize::try_from(base).ok())
            .ok_or(OperationError::BacklogMismatch { len, delta })?;
        update.operation.check_bounds(base)
    }

    fn transform_incoming(&mut self, update: UpdateMessage) -> Operation {
        self.retire(update.seen);
        self.received += 1;

        let priority = self.priority;
        let local_priority = priority.opposite();
        let mut remote = update.operation;
        for local in &mut self.outstanding {
            let adjusted = transform_with(&remote, local, priority);
            *local = transform_with(local, &remote, local_priority);
            remote = adjusted;
        }
        remote
    }

    fn skip_incoming(&mut self, count: u64) {
        self.received += count;
    }

    fn outstanding(&self) -> &[Operation] {
        &self.outstanding
    }
}

/// Pass-through strategy: no backlog, no transformation.
///
/// Correct only when edits never overlap in flight, e.g. strictly
/// alternating turns. Useful as a baseline in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityStrategy;

impl SyncStrategy for IdentityStrategy {
    fn register_outgoing(&mut self, op: Operation) -> UpdateMessage {
        UpdateMessage::untagged(op)
    }

    fn check_incoming(&self, update: &UpdateMessage, len: usize) -> docshare_core::Result<()> {
        update.operation.check_bounds(len)
    }

    fn transform_incoming(&mut self, update: UpdateMessage) -> Operation {
        update.operation
    }

    fn skip_incoming(&mut self, _count: u64) {}

    fn outstanding(&self) -> &[Operation] {
        &[]
    }
}
