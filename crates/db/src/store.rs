//! The in-memory data store and its persistence lifecycle.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use civic_common::config::StorageKeys;
use civic_common::{AppError, AppResult, Clock, Config, IdGenerator, SystemClock};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::backend::KeyValueStore;
use crate::entities::{ChatMessage, Escalation, Profile, Rating, Report};

/// Store shared between services. Each operation holds the lock for its duration.
pub type SharedStore = Arc<Mutex<DataStore>>;

/// Result of a mutation, with the write failure it left behind.
///
/// A failed write keeps the change in memory, so the value is always there;
/// `persist_warning` tells the caller the change has not reached the backend.
#[derive(Debug)]
#[must_use]
pub struct Saved<T> {
    pub value: T,
    pub persist_warning: Option<AppError>,
}

impl<T> Saved<T> {
    /// Whether every write behind this value succeeded.
    #[must_use]
    pub const fn is_persisted(&self) -> bool {
        self.persist_warning.is_none()
    }

    /// Drop the warning and keep the value.
    pub fn into_inner(self) -> T {
        self.value
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Saved<U> {
        Saved {
            value: f(self.value),
            persist_warning: self.persist_warning,
        }
    }
}

/// A persisted collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Reports,
    Profile,
    Ratings,
    ChatMessages,
    Escalations,
}

impl Collection {
    /// Every collection.
    pub const ALL: [Self; 5] = [
        Self::Reports,
        Self::Profile,
        Self::Ratings,
        Self::ChatMessages,
        Self::Escalations,
    ];

    fn key(self, keys: &StorageKeys) -> &str {
        match self {
            Self::Reports => &keys.reports,
            Self::Profile => &keys.profile,
            Self::Ratings => &keys.ratings,
            Self::ChatMessages => &keys.chat_messages,
            Self::Escalations => &keys.escalations,
        }
    }
}

/// Store behaviour taken from configuration.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Backend keys.
    pub keys: StorageKeys,
    /// Whether deleting a report also deletes its escalations.
    pub cascade_escalations: bool,
    /// Age in days after which a new, unescalated report counts as needing escalation.
    pub stats_threshold_days: u32,
    /// Profile used when none is stored.
    pub default_profile: Profile,
}

impl StoreOptions {
    /// Build options from the application configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            keys: config.storage.keys.clone(),
            cascade_escalations: config.storage.cascade_escalations,
            stats_threshold_days: config.escalation.stats_threshold_days,
            default_profile: Profile::from_defaults(&config.profile),
        }
    }
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Single source of truth for every collection, mirrored to a [`KeyValueStore`].
///
/// Every mutation persists the collections it touched before returning. A
/// failed write does not roll the mutation back; it is logged, kept for
/// [`DataStore::take_persist_error`], and the store is marked dirty so the
/// next successful persist rewrites everything.
pub struct DataStore {
    backend: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    options: StoreOptions,
    ids: IdGenerator,
    pub(crate) reports: Vec<Report>,
    pub(crate) profile: Profile,
    pub(crate) ratings: Vec<Rating>,
    pub(crate) chat_messages: Vec<ChatMessage>,
    pub(crate) escalations: Vec<Escalation>,
    dirty: bool,
    persist_error: Option<AppError>,
}

impl fmt::Debug for DataStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataStore")
            .field("reports", &self.reports.len())
            .field("ratings", &self.ratings.len())
            .field("chat_messages", &self.chat_messages.len())
            .field("escalations", &self.escalations.len())
            .field("dirty", &self.dirty)
            .finish_non_exhaustive()
    }
}

impl DataStore {
    /// Create an empty store. Call [`DataStore::load`] to read existing data.
    #[must_use]
    pub fn new(
        backend: Arc<dyn KeyValueStore>,
        options: StoreOptions,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let profile = options.default_profile.clone();
        Self {
            backend,
            clock,
            options,
            ids: IdGenerator::new(),
            reports: Vec::new(),
            profile,
            ratings: Vec::new(),
            chat_messages: Vec::new(),
            escalations: Vec::new(),
            dirty: false,
            persist_error: None,
        }
    }

    /// Create a store on the system clock.
    #[must_use]
    pub fn with_system_clock(backend: Arc<dyn KeyValueStore>, options: StoreOptions) -> Self {
        Self::new(backend, options, Arc::new(SystemClock))
    }

    /// Wrap for sharing between services.
    #[must_use]
    pub fn into_shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    /// Current time on the store's clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// The store's clock.
    #[must_use]
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Options the store was created with.
    #[must_use]
    pub const fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Whether some mutation has not reached the backend.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Take the most recent persistence failure, if any. Returns it only once.
    pub fn take_persist_error(&mut self) -> Option<AppError> {
        self.persist_error.take()
    }

    /// Pair `value` with the pending persistence failure, consuming it.
    pub fn saved<T>(&mut self, value: T) -> Saved<T> {
        Saved {
            value,
            persist_warning: self.take_persist_error(),
        }
    }

    /// Read every collection from the backend.
    ///
    /// Missing keys yield empty collections (or the default profile). A
    /// malformed document is logged and replaced by its empty value. Only a
    /// backend read failure is returned as an error.
    pub fn load(&mut self) -> AppResult<()> {
        let keys = self.options.keys.clone();

        self.reports = self.read_collection(&keys.reports)?.unwrap_or_default();
        self.ratings = self.read_collection(&keys.ratings)?.unwrap_or_default();
        self.chat_messages = self
            .read_collection(&keys.chat_messages)?
            .unwrap_or_default();
        self.escalations = self
            .read_collection(&keys.escalations)?
            .unwrap_or_default();
        self.profile = match self.read_collection::<Profile>(&keys.profile)? {
            Some(profile) if !profile.name.trim().is_empty() => profile,
            _ => self.options.default_profile.clone(),
        };
        self.dirty = false;

        info!(
            reports = self.reports.len(),
            ratings = self.ratings.len(),
            chat_messages = self.chat_messages.len(),
            escalations = self.escalations.len(),
            "Store loaded"
        );
        Ok(())
    }

    /// Write every collection to the backend.
    pub fn save_all(&mut self) -> AppResult<()> {
        let mut first_error = None;
        for collection in Collection::ALL {
            if let Err(e) = self.write_collection(collection) {
                error!(error = %e, ?collection, "Failed to save collection");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => {
                self.dirty = true;
                Err(e)
            }
            None => {
                self.dirty = false;
                debug!("All collections saved");
                Ok(())
            }
        }
    }

    /// Persist the collections a mutation touched, or everything while dirty.
    pub(crate) fn persist(&mut self, touched: &[Collection]) {
        let collections: &[Collection] = if self.dirty {
            &Collection::ALL
        } else {
            touched
        };

        let mut failed = false;
        for &collection in collections {
            if let Err(e) = self.write_collection(collection) {
                error!(error = %e, ?collection, "Failed to persist collection");
                self.persist_error = Some(e);
                failed = true;
            }
        }
        self.dirty = failed;
    }

    /// A fresh id not used by any record in `existing`.
    pub(crate) fn next_id<'a, I>(&self, existing: I) -> String
    where
        I: IntoIterator<Item = &'a str> + Clone,
    {
        self.ids
            .generate_unique(|candidate| existing.clone().into_iter().any(|id| id == candidate))
    }

    fn read_collection<T: DeserializeOwned>(&self, key: &str) -> AppResult<Option<T>> {
        let Some(text) = self.backend.read(key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&text) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key, error = %e, "Malformed stored document, starting empty");
                Ok(None)
            }
        }
    }

    fn write_collection(&self, collection: Collection) -> AppResult<()> {
        let key = collection.key(&self.options.keys);
        let text = match collection {
            Collection::Reports => encode(&self.reports)?,
            Collection::Profile => encode(&self.profile)?,
            Collection::Ratings => encode(&self.ratings)?,
            Collection::ChatMessages => encode(&self.chat_messages)?,
            Collection::Escalations => encode(&self.escalations)?,
        };
        self.backend.write(key, &text)
    }
}

fn encode<T: Serialize + ?Sized>(value: &T) -> AppResult<String> {
    Ok(serde_json::to_string(value)?)
}
