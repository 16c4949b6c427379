//! Browser adapters for the storage ports (WASM only).

use super::{LocationPort, PersistedSlot, StorageError};
use std::cell::Cell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

fn window() -> Result<web_sys::Window, StorageError> {
    web_sys::window().ok_or_else(|| StorageError::Unavailable("no window".to_string()))
}

fn local_storage() -> Result<web_sys::Storage, StorageError> {
    match window()?.local_storage() {
        Ok(Some(storage)) => Ok(storage),
        Ok(None) => Err(StorageError::Unavailable(
            "localStorage is disabled".to_string(),
        )),
        Err(e) => Err(StorageError::Unavailable(format!("{:?}", e))),
    }
}

/// `window.localStorage` as a [`PersistedSlot`].
#[derive(Clone, Copy, Default)]
pub struct LocalStorageSlot;

impl PersistedSlot for LocalStorageSlot {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        local_storage()?
            .get_item(key)
            .map_err(|e| StorageError::Unavailable(format!("{:?}", e)))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        local_storage()?
            .set_item(key, value)
            .map_err(|e| StorageError::WriteFailed(format!("{:?}", e)))
    }
}

/// `window.location` + `history.replaceState` as a [`LocationPort`].
#[derive(Clone, Copy, Default)]
pub struct BrowserLocation;

impl LocationPort for BrowserLocation {
    fn href(&self) -> Result<String, StorageError> {
        window()?
            .location()
            .href()
            .map_err(|e| StorageError::Location(format!("{:?}", e)))
    }

    fn replace(&self, href: &str) -> Result<(), StorageError> {
        window()?
            .history()
            .map_err(|e| StorageError::Location(format!("{:?}", e)))?
            .replace_state_with_url(&JsValue::NULL, "", Some(href))
            .map_err(|e| StorageError::Location(format!("{:?}", e)))
    }
}

/// Events fired when the URL changes outside our control.
const LOCATION_EVENTS: [&str; 2] = ["hashchange", "popstate"];

/// Records externally-triggered URL changes (address-bar edits,
/// back/forward) so the UI loop can pick them up on its next frame.
///
/// `replaceState` fires neither event, so our own publishes never echo
/// back through here.
pub struct LocationChangeListener {
    pending: Rc<Cell<bool>>,
    closure: Closure<dyn FnMut(web_sys::Event)>,
}

impl LocationChangeListener {
    /// Registers the listener; `on_change` runs after each event (used to
    /// request a repaint).
    pub fn install(on_change: impl Fn() + 'static) -> Result<Self, StorageError> {
        let pending = Rc::new(Cell::new(false));
        let flag = pending.clone();
        let closure = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            flag.set(true);
            on_change();
        }) as Box<dyn FnMut(_)>);

        let window = window()?;
        for event in LOCATION_EVENTS {
            window
                .add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())
                .map_err(|e| StorageError::Location(format!("{:?}", e)))?;
        }
        log::debug!("Installed location change listener");

        Ok(Self { pending, closure })
    }

    /// Returns true once per burst of URL change events.
    pub fn take_pending(&self) -> bool {
        self.pending.replace(false)
    }
}

impl Drop for LocationChangeListener {
    fn drop(&mut self) {
        if let Some(window) = web_sys::window() {
            for event in LOCATION_EVENTS {
                let _ = window.remove_event_listener_with_callback(
                    event,
                    self.closure.as_ref().unchecked_ref(),
                );
            }
        }
    }
}
