use gloo_storage::{LocalStorage, Storage};
use shared::{SessionError, SessionStorage};

/// Raw string access to `window.localStorage`. Values are stored as-is so
/// other tabs and the server-side login redirect see the same strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserStorage;

impl SessionStorage for BrowserStorage {
    fn get(&self, key: &str) -> Option<String> {
        LocalStorage::raw().get_item(key).ok().flatten()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), SessionError> {
        LocalStorage::raw()
            .set_item(key, value)
            .map_err(|e| SessionError::Storage(format!("{:?}", e)))
    }

    fn remove(&mut self, key: &str) {
        if LocalStorage::raw().remove_item(key).is_err() {
            log::warn!("Could not remove {} from local storage", key);
        }
    }
}
