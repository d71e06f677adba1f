//! `sessionStorage` behind the [`SessionStore`] seam

use wasm_bindgen::{JsCast, JsValue};
use web_sys::{DomException, Storage};

use diversity_core::{SessionStore, StoreError};

/// Tab-scoped browser storage. When the browser refuses access (private
/// mode, sandboxed iframe) every read misses and every write fails, so the
/// pattern cache degrades to memory only.
#[derive(Debug, Clone, Default)]
pub struct BrowserSessionStore {
    storage: Option<Storage>,
}

impl BrowserSessionStore {
    pub fn open() -> Self {
        let storage = web_sys::window().and_then(|w| w.session_storage().ok().flatten());
        if storage.is_none() {
            tracing::warn!("sessionStorage unavailable, caching in memory only");
        }
        Self { storage }
    }

    pub fn is_available(&self) -> bool {
        self.storage.is_some()
    }
}

fn store_error(err: JsValue) -> StoreError {
    match err.dyn_ref::<DomException>() {
        Some(e) if e.name() == "QuotaExceededError" => StoreError::QuotaExceeded,
        Some(e) => StoreError::Unavailable(e.message()),
        None => StoreError::Unavailable(format!("{:?}", err)),
    }
}

impl SessionStore for BrowserSessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.storage.as_ref()?.get_item(key).ok().flatten()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let storage = self
            .storage
            .as_ref()
            .ok_or_else(|| StoreError::Unavailable("No sessionStorage".to_string()))?;
        storage.set_item(key, value).map_err(store_error)
    }

    fn remove(&self, key: &str) {
        if let Some(storage) = &self.storage {
            let _ = storage.remove_item(key);
        }
    }

    fn keys(&self) -> Vec<String> {
        let Some(storage) = &self.storage else {
            return Vec::new();
        };
        let len = storage.length().unwrap_or(0);
        (0..len)
            .filter_map(|i| storage.key(i).ok().flatten())
            .collect()
    }
}
