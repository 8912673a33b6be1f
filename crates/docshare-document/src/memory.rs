//! In-memory implementation of the Document trait.
//!
//! Behaves like an editor widget with no UI: edits apply atomically and
//! notify listeners synchronously on the editing thread.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

use docshare_core::Operation;

use crate::error::Result;
use crate::traits::{Document, EditListener, ListenerId};

/// In-memory document.
///
/// Thread-safe: the text sits behind an RwLock and listeners are called
/// after the write lock is released.
pub struct MemoryDocument {
    text: RwLock<String>,
    listeners: Mutex<Vec<(ListenerId, EditListener)>>,
    next_listener: AtomicU64,
}

impl MemoryDocument {
    /// Create a document holding `text`.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: RwLock::new(text.into()),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(1),
        }
    }

    /// Number of listeners currently registered.
    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl Document for MemoryDocument {
    fn text(&self) -> String {
        self.text
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn len_chars(&self) -> usize {
        self.text
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .chars()
            .count()
    }

    fn replace(&self, position: usize, delete_len: usize, text: &str) -> Result<()> {
        let op = Operation::new(position, delete_len, text);

        {
            let mut current = self.text.write().unwrap_or_else(PoisonError::into_inner);
            op.apply_in_place(&mut current)?;
        }

        // Snapshot so listeners may add or remove listeners themselves.
        let listeners: Vec<EditListener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in listeners {
            listener(&op);
        }
        Ok(())
    }

    fn add_edit_listener(&self, listener: EditListener) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
        id
    }

    fn remove_edit_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }
}
