//! Ports for the two pieces of global mutable state the map touches: the
//! browser location and a persisted key/value slot.
//!
//! The codec and resolver only see these traits. On WASM targets the
//! browser adapters wrap `window.location`, `history.replaceState` and
//! `localStorage`; the in-memory adapters serve native builds and tests.

#[cfg(target_arch = "wasm32")]
mod browser;

#[cfg(target_arch = "wasm32")]
pub use browser::{BrowserLocation, LocalStorageSlot, LocationChangeListener};

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use thiserror::Error;

/// Errors that can occur while touching storage or the location.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The backing store does not exist or refused access.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    /// A write was rejected (quota exceeded, private mode, ...).
    #[error("storage write failed: {0}")]
    WriteFailed(String),
    /// The browser location could not be read or replaced.
    #[error("location error: {0}")]
    Location(String),
}

/// A durable string slot keyed by name (localStorage on the web).
///
/// Note: no `Send` bounds; WASM is single-threaded and JS handles cannot
/// cross threads anyway.
pub trait PersistedSlot {
    /// Returns `Ok(None)` if nothing is stored under `key`.
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Overwrites whatever is stored under `key`.
    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// The current page URL and a way to replace it without navigating.
pub trait LocationPort {
    /// Full current URL.
    fn href(&self) -> Result<String, StorageError>;

    /// Replaces the current history entry; must not trigger a reload or a
    /// change notification.
    fn replace(&self, href: &str) -> Result<(), StorageError>;
}

/// In-memory [`PersistedSlot`]. Clones share the same data.
#[derive(Clone)]
pub struct MemorySlot {
    data: Rc<RefCell<HashMap<String, String>>>,
    available: bool,
}

impl Default for MemorySlot {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySlot {
    pub fn new() -> Self {
        Self {
            data: Rc::new(RefCell::new(HashMap::new())),
            available: true,
        }
    }

    /// A slot that fails every operation, like storage in a locked-down
    /// browser profile.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    pub fn len(&self) -> usize {
        self.data.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.borrow().is_empty()
    }
}

impl PersistedSlot for MemorySlot {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        if !self.available {
            return Err(StorageError::Unavailable("memory slot disabled".to_string()));
        }
        Ok(self.data.borrow().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if !self.available {
            return Err(StorageError::WriteFailed("memory slot disabled".to_string()));
        }
        self.data
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// In-memory [`LocationPort`]. Clones share the same URL.
#[derive(Clone)]
pub struct MemoryLocation {
    href: Rc<RefCell<String>>,
    replacements: Rc<Cell<usize>>,
}

impl MemoryLocation {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: Rc::new(RefCell::new(href.into())),
            replacements: Rc::new(Cell::new(0)),
        }
    }

    /// Simulates an external edit (address bar, back/forward).
    pub fn set_href(&self, href: impl Into<String>) {
        *self.href.borrow_mut() = href.into();
    }

    /// Number of `replace` calls so far.
    pub fn replacements(&self) -> usize {
        self.replacements.get()
    }
}

impl LocationPort for MemoryLocation {
    fn href(&self) -> Result<String, StorageError> {
        Ok(self.href.borrow().clone())
    }

    fn replace(&self, href: &str) -> Result<(), StorageError> {
        *self.href.borrow_mut() = href.to_string();
        self.replacements.set(self.replacements.get() + 1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_slot_overwrites() {
        let slot = MemorySlot::new();
        assert_eq!(slot.read("k"), Ok(None));
        slot.write("k", "one").unwrap();
        slot.write("k", "two").unwrap();
        assert_eq!(slot.read("k"), Ok(Some("two".to_string())));
        assert_eq!(slot.len(), 1);
    }

    #[test]
    fn test_memory_slot_clones_share_data() {
        let slot = MemorySlot::new();
        let other = slot.clone();
        slot.write("k", "v").unwrap();
        assert_eq!(other.read("k"), Ok(Some("v".to_string())));
    }

    #[test]
    fn test_unavailable_slot_errors() {
        let slot = MemorySlot::unavailable();
        assert!(matches!(slot.read("k"), Err(StorageError::Unavailable(_))));
        assert!(matches!(
            slot.write("k", "v"),
            Err(StorageError::WriteFailed(_))
        ));
    }

    #[test]
    fn test_memory_location_replace() {
        let location = MemoryLocation::new("https://example.com/");
        location.replace("https://example.com/#m/7.00/55.19114/23.87100/0/0").unwrap();
        assert_eq!(location.replacements(), 1);
        assert_eq!(
            location.href().unwrap(),
            "https://example.com/#m/7.00/55.19114/23.87100/0/0"
        );

        location.set_href("https://example.com/#p/9.00/54.00000/25.00000/0/0");
        assert_eq!(location.replacements(), 1);
    }
}
