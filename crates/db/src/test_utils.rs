//! Test utilities for store operations.
//!
//! Provides an in-memory store on a manual clock plus fixture builders.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use civic_common::ManualClock;

use crate::backend::MemoryStore;
use crate::entities::{ChatMessage, NewChatMessage, NewReport, SenderRole};
use crate::repositories::ChatRepository;
use crate::store::{DataStore, SharedStore, StoreOptions};

/// Fixed instant test clocks start at: 2024-03-01 08:00 UTC.
#[must_use]
pub fn test_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// A report draft that passes submission validation.
#[must_use]
pub fn new_report(title: &str) -> NewReport {
    NewReport {
        title: title.to_string(),
        name: "Siti Rahma".to_string(),
        location: "Jl. Mawar RT 02".to_string(),
        description: format!("{title}: reported by a resident, needs attention"),
        ..NewReport::default()
    }
}

/// A store over [`MemoryStore`] driven by a [`ManualClock`].
#[derive(Debug)]
pub struct TestStore {
    /// The store under test.
    pub store: DataStore,
    /// Backend, for inspecting writes or injecting failures.
    pub backend: Arc<MemoryStore>,
    /// Clock shared with the store.
    pub clock: ManualClock,
}

impl TestStore {
    /// Empty store with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(StoreOptions::default())
    }

    /// Empty store with custom options.
    #[must_use]
    pub fn with_options(options: StoreOptions) -> Self {
        let backend = Arc::new(MemoryStore::new());
        let clock = ManualClock::new(test_epoch());
        let store = DataStore::new(backend.clone(), options, Arc::new(clock.clone()));
        Self {
            store,
            backend,
            clock,
        }
    }

    /// Move the store into a [`SharedStore`], keeping the backend and clock handles.
    #[must_use]
    pub fn into_shared(self) -> (SharedStore, Arc<MemoryStore>, ManualClock) {
        (self.store.into_shared(), self.backend, self.clock)
    }

    /// Add a message from the citizen.
    pub fn add_citizen_message(&mut self, report_id: &str, text: &str) -> ChatMessage {
        self.add_message(report_id, "Siti Rahma", SenderRole::Citizen, text)
    }

    /// Add a message from an officer.
    pub fn add_officer_message(&mut self, report_id: &str, text: &str) -> ChatMessage {
        self.add_message(report_id, "Village Officer", SenderRole::Officer, text)
    }

    fn add_message(
        &mut self,
        report_id: &str,
        sender: &str,
        sender_role: SenderRole,
        text: &str,
    ) -> ChatMessage {
        self.store.add_chat_message(NewChatMessage {
            report_id: report_id.to_string(),
            sender: sender.to_string(),
            sender_role,
            message: text.to_string(),
        })
    }
}

impl Default for TestStore {
    fn default() -> Self {
        Self::new()
    }
}
