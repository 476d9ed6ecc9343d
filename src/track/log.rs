// src/track/log.rs
//! Append-only sequences whose snapshots share storage with the writer
//!
//! Items are only ever pushed, never changed or removed, so a view that
//! remembers the length at the time it was taken keeps seeing exactly the
//! items it saw then. Taking a view is O(1) however long the log grows.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

type Items<T> = Arc<RwLock<Vec<T>>>;

fn read<T>(items: &Items<T>) -> RwLockReadGuard<'_, Vec<T>> {
    items.read().unwrap_or_else(PoisonError::into_inner)
}

/// Owning, writable end. Only the owner can append.
pub struct AppendLog<T> {
    items: Items<T>,
    len: usize,
}

impl<T> AppendLog<T> {
    pub fn new() -> Self {
        Self {
            items: Arc::new(RwLock::new(Vec::new())),
            len: 0,
        }
    }

    pub fn push(&mut self, item: T) {
        self.items
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(item);
        self.len += 1;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Frozen view of everything appended so far
    pub fn view(&self) -> LogView<T> {
        LogView {
            items: Arc::clone(&self.items),
            len: self.len,
        }
    }
}

impl<T: Clone> AppendLog<T> {
    pub fn last(&self) -> Option<T> {
        read(&self.items).last().cloned()
    }

    pub fn to_vec(&self) -> Vec<T> {
        read(&self.items).clone()
    }
}

impl<T> Default for AppendLog<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for AppendLog<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.view(), f)
    }
}

/// Read-only prefix of an [`AppendLog`]
pub struct LogView<T> {
    items: Items<T>,
    len: usize,
}

impl<T> LogView<T> {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Run `f` over the items without copying them
    pub fn with<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(&read(&self.items)[..self.len])
    }

    /// True when both views read the same underlying log
    pub fn shares_storage_with(&self, other: &LogView<T>) -> bool {
        Arc::ptr_eq(&self.items, &other.items)
    }
}

impl<T: Clone> LogView<T> {
    pub fn get(&self, index: usize) -> Option<T> {
        self.with(|items| items.get(index).cloned())
    }

    pub fn last(&self) -> Option<T> {
        self.with(|items| items.last().cloned())
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.with(|items| items.to_vec())
    }
}

impl<T> Clone for LogView<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
            len: self.len,
        }
    }
}

impl<T> Default for LogView<T> {
    fn default() -> Self {
        AppendLog::new().view()
    }
}

impl<T> From<Vec<T>> for LogView<T> {
    fn from(items: Vec<T>) -> Self {
        let len = items.len();
        Self {
            items: Arc::new(RwLock::new(items)),
            len,
        }
    }
}

impl<T: PartialEq> PartialEq for LogView<T> {
    fn eq(&self, other: &Self) -> bool {
        if self.len != other.len {
            return false;
        }
        if Arc::ptr_eq(&self.items, &other.items) {
            return true;
        }
        self.with(|a| other.with(|b| a == b))
    }
}

impl<T: fmt::Debug> fmt::Debug for LogView<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.with(|items| f.debug_list().entries(items).finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_is_frozen_at_its_length() {
        let mut log = AppendLog::new();
        log.push(1);
        log.push(2);
        let before = log.view();

        log.push(3);
        assert_eq!(before.to_vec(), vec![1, 2]);
        assert_eq!(before.last(), Some(2));
        assert_eq!(log.view().to_vec(), vec![1, 2, 3]);
        assert_eq!(log.last(), Some(3));
    }

    #[test]
    fn test_views_share_storage() {
        let mut log = AppendLog::new();
        for i in 0..1_000 {
            log.push(i);
        }
        let a = log.view();
        let b = log.view();
        assert!(a.shares_storage_with(&b));
        assert_eq!(a, b);
        assert_eq!(a.get(999), Some(999));
        assert_eq!(a.get(1_000), None);
    }

    #[test]
    fn test_equality_compares_contents() {
        let mut log = AppendLog::new();
        log.push("a");
        assert_eq!(log.view(), LogView::from(vec!["a"]));
        assert_ne!(log.view(), LogView::from(vec!["a", "b"]));
        assert!(LogView::<u8>::default().is_empty());
    }
}
