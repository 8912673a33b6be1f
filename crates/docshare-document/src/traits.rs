//! Document trait: the abstract interface for a shared editing surface.
//!
//! This trait lets the sync engine stay editor-agnostic. Implementations
//! include [`MemoryDocument`](crate::MemoryDocument) and whatever editor
//! widget the host application wraps.

use std::fmt;
use std::sync::Arc;

use docshare_core::Operation;

use crate::error::Result;

/// Callback fired after every mutation of a document.
///
/// The operation describes the edit in the coordinates of the text as it was
/// just before the edit.
pub type EditListener = Arc<dyn Fn(&Operation) + Send + Sync>;

/// Handle identifying a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// The Document trait: a mutable text with edit notifications.
///
/// # Contract
///
/// - `replace` mutates atomically: concurrent readers see the text either
///   before or after the edit, never in between.
/// - Every successful `replace` notifies every listener registered at that
///   moment, synchronously, on the calling thread.
/// - Listeners must not be invoked while an internal lock that `replace` or
///   `text` needs is held.
pub trait Document: Send + Sync {
    /// Current text.
    fn text(&self) -> String;

    /// Current length in chars.
    fn len_chars(&self) -> usize {
        self.text().chars().count()
    }

    /// Replace `delete_len` chars at `position` with `text`.
    fn replace(&self, position: usize, delete_len: usize, text: &str) -> Result<()>;

    /// Apply an operation through [`Document::replace`].
    fn apply(&self, op: &Operation) -> Result<()> {
        self.replace(op.position(), op.delete_len(), op.inserted_text())
    }

    /// Register a listener; it stays registered until removed.
    fn add_edit_listener(&self, listener: EditListener) -> ListenerId;

    /// Remove a listener. Returns false if it was not registered.
    fn remove_edit_listener(&self, id: ListenerId) -> bool;
}

/// A registered edit listener that is removed when this handle drops.
pub struct EditSubscription {
    document: Arc<dyn Document>,
    id: ListenerId,
}

impl EditSubscription {
    /// The listener's id on the underlying document.
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// The document this subscription listens to.
    pub fn document(&self) -> &Arc<dyn Document> {
        &self.document
    }
}

impl Drop for EditSubscription {
    fn drop(&mut self) {
        if !self.document.remove_edit_listener(self.id) {
            tracing::debug!("edit listener {:?} was already removed", self.id);
        }
    }
}

impl fmt::Debug for EditSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditSubscription").field("id", &self.id).finish()
    }
}

/// Register `listener` on `document`, returning a scoped subscription.
pub fn subscribe(document: &Arc<dyn Document>, listener: EditListener) -> EditSubscription {
    let id = document.add_edit_listener(listener);
    EditSubscription {
        document: Arc::clone(document),
        id,
    }
}
