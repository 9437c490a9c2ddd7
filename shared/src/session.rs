use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

pub const USER_KEY: &str = "user";
pub const AUTH_TOKEN_KEY: &str = "authToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Key/value persistence behind the session (browser local storage in the
/// client).
pub trait SessionStorage {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), SessionError>;
    fn remove(&mut self, key: &str);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub picture_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Session {
    pub user: Option<SessionUser>,
    pub auth_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl Session {
    /// A stored auth token is the only authentication signal.
    pub fn is_authenticated(&self) -> bool {
        self.auth_token.is_some()
    }

    pub fn display_name(&self) -> &str {
        self.user
            .as_ref()
            .map(|u| u.name.as_str())
            .unwrap_or("Guest")
    }

    fn read<S: SessionStorage>(storage: &S) -> Self {
        let auth_token = storage
            .get(AUTH_TOKEN_KEY)
            .filter(|t| !t.trim().is_empty());
        let refresh_token = storage.get(REFRESH_TOKEN_KEY);
        let user = match storage.get(USER_KEY) {
            Some(raw) => match serde_json::from_str::<SessionUser>(&raw) {
                Ok(user) => Some(user),
                Err(e) => {
                    log::warn!("Stored user could not be parsed, treating as signed out: {}", e);
                    return Session::default();
                }
            },
            None => None,
        };
        Session {
            user,
            auth_token,
            refresh_token,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, From)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn Fn(&Session)>;

/// Process-wide session state. Listeners fire exactly when the session
/// changes through sign-in, sign-out or an external storage change.
pub struct SessionProvider<S: SessionStorage> {
    storage: S,
    session: Session,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_id: u64,
}

impl<S: SessionStorage> SessionProvider<S> {
    pub fn load(storage: S) -> Self {
        let session = Session::read(&storage);
        Self {
            storage,
            session,
            listeners: Vec::new(),
            next_id: 0,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn sign_in(
        &mut self,
        user: SessionUser,
        auth_token: String,
        refresh_token: Option<String>,
    ) -> Result<(), SessionError> {
        let raw_user = serde_json::to_string(&user)?;
        let writes = [
            (USER_KEY, Some(raw_user.as_str())),
            (AUTH_TOKEN_KEY, Some(auth_token.as_str())),
            (REFRESH_TOKEN_KEY, refresh_token.as_deref()),
        ];
        let previous: Vec<_> = writes
            .iter()
            .map(|(key, _)| (*key, self.storage.get(key)))
            .collect();
        if let Err(e) = self.write_keys(&writes) {
            // Leave storage as it was so a reload never sees half a sign-in.
            let restore: Vec<_> = previous.iter().map(|(k, v)| (*k, v.as_deref())).collect();
            if let Err(restore_err) = self.write_keys(&restore) {
                log::warn!("Could not restore session storage: {}", restore_err);
            }
            return Err(e);
        }
        self.session = Session {
            user: Some(user),
            auth_token: Some(auth_token),
            refresh_token,
        };
        self.notify();
        Ok(())
    }

    pub fn sign_out(&mut self) {
        for key in [USER_KEY, AUTH_TOKEN_KEY, REFRESH_TOKEN_KEY] {
            self.storage.remove(key);
        }
        if self.session != Session::default() {
            self.session = Session::default();
            self.notify();
        }
    }

    /// Re-reads storage after it was changed elsewhere (another tab).
    pub fn reload(&mut self) {
        let fresh = Session::read(&self.storage);
        if fresh != self.session {
            self.session = fresh;
            self.notify();
        }
    }

    pub fn subscribe(&mut self, listener: impl Fn(&Session) + 'static) -> SubscriptionId {
        let id = SubscriptionId::from(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sub, _)| *sub != id);
        before != self.listeners.len()
    }

    fn write_keys(&mut self, entries: &[(&str, Option<&str>)]) -> Result<(), SessionError> {
        for (key, value) in entries {
            match value {
                Some(value) => self.storage.set(key, value)?,
                None => self.storage.remove(key),
            }
        }
        Ok(())
    }

    fn notify(&self) {
        for (_, listener) in &self.listeners {
            listener(&self.session);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::HashMap;
    use std::rc::Rc;

    #[derive(Default)]
    struct MemoryStorage(HashMap<String, String>);

    impl SessionStorage for MemoryStorage {
        fn get(&self, key: &str) -> Option<String> {
            self.0.get(key).cloned()
        }
        fn set(&mut self, key: &str, value: &str) -> Result<(), SessionError> {
            self.0.insert(key.to_string(), value.to_string());
            Ok(())
        }
        fn remove(&mut self, key: &str) {
            self.0.remove(key);
        }
    }

    /// Accepts a fixed number of writes, then fails every later one.
    struct FlakyStorage {
        inner: MemoryStorage,
        writes_left: usize,
    }

    impl SessionStorage for FlakyStorage {
        fn get(&self, key: &str) -> Option<String> {
            self.inner.get(key)
        }
        fn set(&mut self, key: &str, value: &str) -> Result<(), SessionError> {
            if self.writes_left == 0 {
                return Err(SessionError::Storage("quota exceeded".into()));
            }
            self.writes_left -= 1;
            self.inner.set(key, value)
        }
        fn remove(&mut self, key: &str) {
            self.inner.remove(key);
        }
    }

    fn user() -> SessionUser {
        SessionUser {
            id: "u1".into(),
            email: "ada@example.com".into(),
            name: "Ada".into(),
            picture_url: None,
        }
    }

    #[test]
    fn token_presence_means_authenticated() {
        let mut storage = MemoryStorage::default();
        storage.set(AUTH_TOKEN_KEY, "tok").unwrap();
        let provider = SessionProvider::load(storage);
        assert!(provider.session().is_authenticated());
        assert_eq!(provider.session().display_name(), "Guest");
    }

    #[test]
    fn corrupt_user_falls_back_to_signed_out() {
        let mut storage = MemoryStorage::default();
        storage.set(USER_KEY, "{not json").unwrap();
        storage.set(AUTH_TOKEN_KEY, "tok").unwrap();
        let provider = SessionProvider::load(storage);
        assert!(!provider.session().is_authenticated());
        assert!(provider.session().user.is_none());
    }

    #[test]
    fn sign_in_and_out_notify_exactly_once_each() {
        let calls = Rc::new(Cell::new(0));
        let mut provider = SessionProvider::load(MemoryStorage::default());
        let counter = calls.clone();
        provider.subscribe(move |_| counter.set(counter.get() + 1));

        provider.sign_in(user(), "tok".into(), Some("ref".into())).unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(provider.storage.get(AUTH_TOKEN_KEY).as_deref(), Some("tok"));
        assert_eq!(provider.session().display_name(), "Ada");

        provider.sign_out();
        provider.sign_out();
        assert_eq!(calls.get(), 2);
        assert!(provider.storage.get(USER_KEY).is_none());
    }

    #[test]
    fn failed_sign_in_leaves_storage_untouched() {
        let storage = FlakyStorage {
            inner: MemoryStorage::default(),
            writes_left: 1,
        };
        let calls = Rc::new(Cell::new(0));
        let mut provider = SessionProvider::load(storage);
        let counter = calls.clone();
        provider.subscribe(move |_| counter.set(counter.get() + 1));

        let result = provider.sign_in(user(), "tok".into(), Some("ref".into()));
        assert!(matches!(result, Err(SessionError::Storage(_))));
        assert!(provider.storage.get(USER_KEY).is_none());
        assert!(provider.storage.get(AUTH_TOKEN_KEY).is_none());
        assert_eq!(provider.session(), &Session::default());
        assert_eq!(calls.get(), 0);

        provider.reload();
        assert!(!provider.session().is_authenticated());
    }

    #[test]
    fn reload_picks_up_external_changes() {
        let calls = Rc::new(Cell::new(0));
        let mut provider = SessionProvider::load(MemoryStorage::default());
        let counter = calls.clone();
        provider.subscribe(move |_| counter.set(counter.get() + 1));

        provider.reload();
        assert_eq!(calls.get(), 0);

        provider.storage.set(AUTH_TOKEN_KEY, "other-tab").unwrap();
        provider.reload();
        assert_eq!(calls.get(), 1);
        assert!(provider.session().is_authenticated());
    }

    #[test]
    fn unsubscribed_listeners_stop_firing() {
        let calls = Rc::new(Cell::new(0));
        let mut provider = SessionProvider::load(MemoryStorage::default());
        let counter = calls.clone();
        let id = provider.subscribe(move |_| counter.set(counter.get() + 1));
        assert!(provider.unsubscribe(id));
        provider.sign_in(user(), "tok".into(), None).unwrap();
        assert_eq!(calls.get(), 0);
    }
}
