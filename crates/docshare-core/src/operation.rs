//! Text operations: the atomic unit of document change.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{OperationError, Result};

/// A single text mutation.
///
/// Applying an operation removes `delete_len` characters starting at
/// `position`, then inserts `inserted_text` at `position`. Positions and
/// lengths count `char`s.
///
/// Operations are immutable once constructed; transformation produces new
/// values.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Operation {
    position: usize,
    delete_len: usize,
    inserted_text: String,
}

impl Operation {
    /// Create an operation replacing `delete_len` chars at `position` with `text`.
    pub fn new(position: usize, delete_len: usize, text: impl Into<String>) -> Self {
        Self {
            position,
            delete_len,
            inserted_text: text.into(),
        }
    }

    /// Pure insertion.
    pub fn insert(position: usize, text: impl Into<String>) -> Self {
        Self::new(position, 0, text)
    }

    /// Pure deletion.
    pub fn delete(position: usize, delete_len: usize) -> Self {
        Self::new(position, delete_len, String::new())
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn delete_len(&self) -> usize {
        self.delete_len
    }

    pub fn inserted_text(&self) -> &str {
        &self.inserted_text
    }

    /// Number of chars this operation inserts.
    pub fn inserted_len(&self) -> usize {
        self.inserted_text.chars().count()
    }

    /// End (exclusive) of the deleted range in the source text.
    pub fn end(&self) -> usize {
        self.position.saturating_add(self.delete_len)
    }

    /// True if applying the operation leaves any text unchanged.
    pub fn is_noop(&self) -> bool {
        self.delete_len == 0 && self.inserted_text.is_empty()
    }

    /// Net change in document length, in chars.
    pub fn len_delta(&self) -> isize {
        self.inserted_len() as isize - self.delete_len as isize
    }

    /// Check the fields are representable without reference to any document.
    pub fn check_structure(&self) -> Result<()> {
        match self.position.checked_add(self.delete_len) {
            Some(_) => Ok(()),
            None => Err(OperationError::Overflow {
                position: self.position,
                delete_len: self.delete_len,
            }),
        }
    }

    /// Check the operation fits a document of `len` chars.
    pub fn check_bounds(&self, len: usize) -> Result<()> {
        self.check_structure()?;
        if self.end() > len {
            return Err(OperationError::OutOfBounds {
                position: self.position,
                end: self.end(),
                len,
            });
        }
        Ok(())
    }

    /// Apply to `text`, returning the new text.
    pub fn apply(&self, text: &str) -> Result<String> {
        let mut out = text.to_string();
        self.apply_in_place(&mut out)?;
        Ok(out)
    }

    /// Apply to `text` in place. On error `text` is left untouched.
    pub fn apply_in_place(&self, text: &mut String) -> Result<()> {
        self.check_structure()?;
        let out_of_bounds = || OperationError::OutOfBounds {
            position: self.position,
            end: self.end(),
            len: text.chars().count(),
        };
        let start = byte_offset(text, self.position).ok_or_else(out_of_bounds)?;
        let end = byte_offset(text, self.end()).ok_or_else(out_of_bounds)?;
        text.replace_range(start..end, &self.inserted_text);
        Ok(())
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Operation {{ pos: {}, del: {}, ins: {:?} }}",
            self.position, self.delete_len, self.inserted_text
        )
    }
}

/// Byte offset of the `index`-th char, or of the end when `index == len`.
pub(crate) fn byte_offset(text: &str, index: usize) -> Option<usize> {
    if index == 0 {
        return Some(0);
    }
    match text.char_indices().nth(index) {
        Some((offset, _)) => Some(offset),
        None if text.chars().count() == index => Some(text.len()),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_insert() {
        let op = Operation::insert(5, "X");
        assert_eq!(op.apply("hello").unwrap(), "helloX");
        assert_eq!(Operation::insert(0, "Y").apply("hello").unwrap(), "Yhello");
    }

    #[test]
    fn test_apply_replace() {
        let op = Operation::new(1, 3, "ipp");
        assert_eq!(op.apply("hello").unwrap(), "hippo");
    }

    #[test]
    fn test_apply_delete_to_end() {
        let op = Operation::delete(2, 3);
        assert_eq!(op.apply("hello").unwrap(), "he");
    }

    #[test]
    fn test_apply_counts_chars_not_bytes() {
        let op = Operation::new(1, 1, "e");
        assert_eq!(op.apply("héllo").unwrap(), "hello");
        assert_eq!(Operation::insert(2, "✓").apply("ü☃").unwrap(), "ü☃✓");
    }

    #[test]
    fn test_apply_out_of_bounds() {
        let op = Operation::delete(4, 2);
        let err = op.apply("hello").unwrap_err();
        assert_eq!(
            err,
            OperationError::OutOfBounds {
                position: 4,
                end: 6,
                len: 5
            }
        );
        assert!(Operation::insert(6, "x").apply("hello").is_err());
    }

    #[test]
    fn test_apply_in_place_leaves_text_on_error() {
        let mut text = String::from("abc");
        assert!(Operation::delete(1, 5).apply_in_place(&mut text).is_err());
        assert_eq!(text, "abc");
    }

    #[test]
    fn test_overflow_is_structural_error() {
        let op = Operation::delete(usize::MAX, 2);
        assert!(matches!(
            op.check_structure(),
            Err(OperationError::Overflow { .. })
        ));
        assert!(op.apply("abc").is_err());
    }

    #[test]
    fn test_len_delta() {
        assert_eq!(Operation::new(0, 3, "ab").len_delta(), -1);
        assert_eq!(Operation::insert(0, "☃☃").len_delta(), 2);
        assert!(Operation::insert(3, "").is_noop());
    }

    #[test]
    fn test_byte_offset_end() {
        assert_eq!(byte_offset("ab", 2), Some(2));
        assert_eq!(byte_offset("ab", 3), None);
        assert_eq!(byte_offset("", 0), Some(0));
    }
}
