//! Client-side persistence.
//!
//! A [`KeyValueStore`] keeps string values under string keys, synchronously.  [`Storage`] layers
//! JSON on top and never fails a read: corrupt or mistyped data is logged and replaced by the
//! type's default.  [`Preferences`] are the small scalar settings stored next to the chat history.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::observability::{STORAGE_LOAD_FAILURES, STORAGE_WRITES};
use crate::types::Locale;

/// Key of the serialized session list.
pub const CHAT_HISTORY_KEY: &str = "chatHistory";
/// Key of the interface language.
pub const LANGUAGE_KEY: &str = "language";
/// Key of the theme flag, stored as `"true"` or `"false"`.
pub const DARK_MODE_KEY: &str = "darkMode";
/// Key of the display name.
pub const USERNAME_KEY: &str = "username";

/// A synchronous string key/value store.
pub trait KeyValueStore {
    /// Read the value under `key`, `None` if it was never written.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Replace the value under `key`.
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// A store keeping one file per key inside a directory.
///
/// Writes go to a temporary sibling first and are renamed into place, so a crash mid-write never
/// leaves a truncated value behind.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|err| {
            Error::io(
                format!("failed to create data directory {}", dir.display()),
                err,
            )
        })?;
        Ok(Self { dir })
    }

    /// The directory holding the values.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty()
            || !key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(Error::validation(
                format!("invalid storage key {key:?}"),
                Some("key".to_string()),
            ));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(Error::io(format!("failed to read {}", path.display()), err)),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)
            .map_err(|err| Error::io(format!("failed to write {}", tmp.display()), err))?;
        fs::rename(&tmp, &path)
            .map_err(|err| Error::io(format!("failed to replace {}", path.display()), err))
    }
}

/// An in-memory store, for tests and for running without a data directory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// JSON persistence over a [`KeyValueStore`].
#[derive(Debug, Clone)]
pub struct Storage<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> Storage<S> {
    /// Wrap a store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The wrapped store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Load and parse the JSON under `key`.
    ///
    /// A missing key, unreadable value, parse failure, or shape mismatch (an object where an
    /// array was expected, say) all yield `T::default()`.  Failures are logged, never returned.
    pub fn load<T>(&self, key: &str) -> T
    where
        T: DeserializeOwned + Default,
    {
        let raw = match self.store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return T::default(),
            Err(err) => {
                STORAGE_LOAD_FAILURES.click();
                tracing::warn!(key, error = %err, "could not read stored value, using default");
                return T::default();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(err) => {
                STORAGE_LOAD_FAILURES.click();
                tracing::warn!(key, error = %err, "stored value is corrupt, using default");
                T::default()
            }
        }
    }

    /// Serialize `value` and write it under `key`.
    pub fn save<T>(&mut self, key: &str, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let raw = serde_json::to_string(value)?;
        self.store.set(key, &raw)?;
        STORAGE_WRITES.click();
        Ok(())
    }

    /// Read a raw string value.  Read failures are logged and treated as absent.
    pub fn load_string(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(err) => {
                STORAGE_LOAD_FAILURES.click();
                tracing::warn!(key, error = %err, "could not read stored value");
                None
            }
        }
    }

    /// Write a raw string value.
    pub fn save_string(&mut self, key: &str, value: &str) -> Result<()> {
        self.store.set(key, value)?;
        STORAGE_WRITES.click();
        Ok(())
    }
}

/// Scalar user settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preferences {
    /// Interface language.
    pub locale: Locale,
    /// Dark (true) or light (false) palette.
    pub dark_mode: bool,
    /// Display name.
    pub username: String,
}

impl Default for Preferences {
    fn default() -> Self {
        let locale = Locale::default();
        Self {
            locale,
            dark_mode: true,
            username: locale.strings().guest.to_string(),
        }
    }
}

impl Preferences {
    /// Read the stored preferences, falling back per field.
    pub fn load<S: KeyValueStore>(storage: &Storage<S>) -> Self {
        let locale = storage
            .load_string(LANGUAGE_KEY)
            .and_then(|raw| match raw.parse::<Locale>() {
                Ok(locale) => Some(locale),
                Err(err) => {
                    tracing::warn!(error = %err, "ignoring stored language");
                    None
                }
            })
            .unwrap_or_default();
        let dark_mode = storage
            .load_string(DARK_MODE_KEY)
            .map(|raw| raw.trim() == "true")
            .unwrap_or(true);
        let username = storage
            .load_string(USERNAME_KEY)
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| locale.strings().guest.to_string());
        Self {
            locale,
            dark_mode,
            username,
        }
    }

    /// Persist the language.
    pub fn save_locale<S: KeyValueStore>(
        &mut self,
        storage: &mut Storage<S>,
        locale: Locale,
    ) -> Result<()> {
        self.locale = locale;
        storage.save_string(LANGUAGE_KEY, locale.as_str())
    }

    /// Persist the theme.
    pub fn save_dark_mode<S: KeyValueStore>(
        &mut self,
        storage: &mut Storage<S>,
        dark_mode: bool,
    ) -> Result<()> {
        self.dark_mode = dark_mode;
        storage.save_string(DARK_MODE_KEY, if dark_mode { "true" } else { "false" })
    }

    /// Persist the display name.
    pub fn save_username<S: KeyValueStore>(
        &mut self,
        storage: &mut Storage<S>,
        username: &str,
    ) -> Result<()> {
        self.username = username.to_string();
        storage.save_string(USERNAME_KEY, username)
    }
}
