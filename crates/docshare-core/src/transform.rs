//! Operational transformation of concurrent text operations.
//!
//! [`transform`] takes a remote operation and a local operation that were
//! both derived from the same document state, and rewrites the remote one so
//! it can be applied on top of a document that already contains the local one.
//!
//! Local edits are applied to the document the instant they happen. A
//! strategy that keeps a backlog of unacknowledged local edits rewrites its
//! own copies with the same function, arguments swapped and priority
//! reversed.
//!
//! ## Rules
//!
//! Let `L` be the applied local operation and `R` the incoming remote one,
//! each a deleted range `[position, end)` plus an insertion at `position`.
//!
//! 1. Equal ranges (two inserts at one offset, or two replacements of the
//!    same span): the insertion with [`Priority`] goes first; `R` deletes
//!    nothing further.
//! 2. `L` ends at or before `R` starts: `R` shifts by `L`'s length delta.
//! 3. `R` ends at or before `L` starts: `R` is unchanged.
//! 4. `R` lies strictly inside `L`'s deletion: `R` is absorbed (becomes a
//!    no-op after `L`'s insertion).
//! 5. `L` lies strictly inside `R`'s deletion: `R` also deletes `L`'s
//!    insertion.
//! 6. Partial overlap: `R`'s deletion is clipped to what `L` left behind and
//!    its insertion lands next to `L`'s, ordered by original position (the
//!    operation whose range starts first, or ends first on a shared start,
//!    inserts first).
//!
//! The same rules applied on both sides, with opposite priorities, make the
//! two documents converge.

use crate::operation::Operation;

/// Which insertion wins when both land on the same offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    /// The already-applied local insertion stays first; the remote one
    /// lands after it.
    #[default]
    Local,
    /// The remote insertion lands first.
    Remote,
}

impl Priority {
    /// The priority the peer must use for the two sides to agree.
    pub fn opposite(self) -> Self {
        match self {
            Priority::Local => Priority::Remote,
            Priority::Remote => Priority::Local,
        }
    }
}

/// Transform `remote` against the already-applied `local`, local winning ties.
pub fn transform(remote: &Operation, local: &Operation) -> Operation {
    transform_with(remote, local, Priority::Local)
}

/// Transform `remote` against the already-applied `local`.
///
/// Both operations must fit the document they were made on. Callers check
/// bounds first (see [`Operation::check_bounds`]); nothing is checked here.
pub fn transform_with(remote: &Operation, local: &Operation, priority: Priority) -> Operation {
    let (lp, le) = (local.position(), local.end());
    let (rp, re) = (remote.position(), remote.end());
    let shift = local.inserted_len();
    let text = remote.inserted_text();

    if lp == rp && le == re {
        let position = match priority {
            Priority::Local => lp + shift,
            Priority::Remote => lp,
        };
        return Operation::new(position, 0, text);
    }

    if le <= rp {
        return Operation::new(rp - local.delete_len() + shift, remote.delete_len(), text);
    }

    if re <= lp {
        return remote.clone();
    }

    if lp < rp && re < le {
        return Operation::new(lp + shift, 0, "");
    }

    if rp < lp && le < re {
        return Operation::new(rp, remote.delete_len() - local.delete_len() + shift, text);
    }

    if lp < rp || (lp == rp && le < re) {
        Operation::new(lp + shift, re - le, text)
    } else {
        Operation::new(rp, lp - rp, text)
    }
}
