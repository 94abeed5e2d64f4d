//! Report conversations between citizens and officers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use civic_common::config::ChatConfig;
use civic_common::{AppError, AppResult, FieldErrors};
use civic_db::{Saved, SharedStore};
use civic_db::entities::{ChatMessage, NewChatMessage, SenderRole};
use civic_db::repositories::{ChatRepository, ProfileRepository, ReportRepository};
use rand::Rng;
use serde::Deserialize;
use tracing::{debug, info};
use validator::Validate;

use super::report::SYSTEM_SENDER;
use crate::scheduler::{TaskHandle, spawn_delayed};

/// Longest accepted chat message, in characters.
pub const MAX_MESSAGE_LENGTH: usize = 500;

/// Officer replies sent automatically after a citizen writes.
pub const AUTO_REPLIES: [&str; 5] = [
    "Thank you for the information. We will follow up on this report shortly.",
    "Your report has been received and is being reviewed by our team.",
    "Thank you. A field officer will be assigned to check the location.",
    "Noted. We will keep you updated on the progress of this report.",
    "Thank you for your patience. This report is in our processing queue.",
];

/// Chooses which canned reply to send.
pub trait ReplyPicker: Send + Sync {
    fn pick(&self, replies: &[&'static str]) -> &'static str;
}

/// Uniformly random choice.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomReplyPicker;

impl ReplyPicker for RandomReplyPicker {
    fn pick(&self, replies: &[&'static str]) -> &'static str {
        if replies.is_empty() {
            return "";
        }
        replies[rand::thread_rng().gen_range(0..replies.len())]
    }
}

/// Cycles through the replies in order.
#[derive(Debug, Default)]
pub struct SequentialReplyPicker {
    next: AtomicUsize,
}

impl ReplyPicker for SequentialReplyPicker {
    fn pick(&self, replies: &[&'static str]) -> &'static str {
        if replies.is_empty() {
            return "";
        }
        replies[self.next.fetch_add(1, Ordering::Relaxed) % replies.len()]
    }
}

/// Input for sending a chat message as the current profile.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageInput {
    pub report_id: String,
    #[validate(length(max = 500, message = "Message must be no more than 500 characters"))]
    pub message: String,
}

/// Chat service.
#[derive(Clone)]
pub struct ChatService {
    store: SharedStore,
    config: ChatConfig,
    picker: Arc<dyn ReplyPicker>,
    pending: Arc<Mutex<Vec<TaskHandle>>>,
}

impl ChatService {
    /// Create a chat service choosing auto-replies at random.
    #[must_use]
    pub fn new(store: SharedStore, config: ChatConfig) -> Self {
        Self::with_picker(store, config, Arc::new(RandomReplyPicker))
    }

    #[must_use]
    pub fn with_picker(
        store: SharedStore,
        config: ChatConfig,
        picker: Arc<dyn ReplyPicker>,
    ) -> Self {
        Self {
            store,
            config,
            picker,
            pending: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Send a message as the current profile.
    ///
    /// The length limit applies to the trimmed text. A citizen message
    /// schedules an officer auto-reply when enabled.
    pub async fn send(&self, input: SendMessageInput) -> AppResult<Saved<ChatMessage>> {
        let input = SendMessageInput {
            message: input.message.trim().to_string(),
            ..input
        };
        if input.message.is_empty() {
            let mut errors = FieldErrors::default();
            errors.insert_first("message", "Message cannot be empty".to_string());
            return Err(AppError::Validation(errors));
        }
        input.validate()?;

        let saved = {
            let mut store = self.store.lock().await;
            if store.get_report(&input.report_id).is_none() {
                return Err(AppError::ReportNotFound(input.report_id));
            }
            let profile = store.profile();
            let message = store.add_chat_message(NewChatMessage {
                report_id: input.report_id,
                sender: profile.name,
                sender_role: profile.role.into(),
                message: input.message,
            });
            store.saved(message)
        };
        let message = &saved.value;
        debug!(report_id = %message.report_id, role = %message.sender_role, "Chat message sent");

        if message.sender_role == SenderRole::Citizen && self.config.auto_reply_enabled {
            self.schedule_auto_reply(message.report_id.clone());
        }
        Ok(saved)
    }

    /// Post a message from the application itself.
    pub async fn add_system_message(
        &self,
        report_id: &str,
        text: &str,
    ) -> AppResult<Saved<ChatMessage>> {
        let mut store = self.store.lock().await;
        if store.get_report(report_id).is_none() {
            return Err(AppError::ReportNotFound(report_id.to_string()));
        }
        let message = store.add_chat_message(NewChatMessage {
            report_id: report_id.to_string(),
            sender: SYSTEM_SENDER.to_string(),
            sender_role: SenderRole::System,
            message: text.to_string(),
        });
        Ok(store.saved(message))
    }

    /// Messages of a report, oldest first.
    pub async fn messages(&self, report_id: &str) -> Vec<ChatMessage> {
        self.store.lock().await.chat_messages(report_id)
    }

    /// Mark the conversation read for the current profile and return it.
    pub async fn open_conversation(&self, report_id: &str) -> Vec<ChatMessage> {
        let mut store = self.store.lock().await;
        let viewer = store.profile().role.into();
        store.mark_chat_messages_read(report_id, viewer);
        store.chat_messages(report_id)
    }

    /// Mark messages not written by `viewer` as read.
    pub async fn mark_read(&self, report_id: &str, viewer: SenderRole) -> usize {
        self.store
            .lock()
            .await
            .mark_chat_messages_read(report_id, viewer)
    }

    /// Unread messages for `viewer`.
    pub async fn unread_count(&self, report_id: &str, viewer: SenderRole) -> usize {
        self.store.lock().await.unread_count(report_id, viewer)
    }

    /// Auto-replies scheduled and not yet sent.
    #[must_use]
    pub fn pending_replies(&self) -> usize {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.retain(|handle| !handle.is_finished());
        pending.len()
    }

    /// Cancel every scheduled auto-reply.
    pub fn cancel_pending(&self) {
        let drained: Vec<TaskHandle> = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        if !drained.is_empty() {
            info!(count = drained.len(), "Cancelled pending auto-replies");
        }
    }

    fn schedule_auto_reply(&self, report_id: String) {
        let store = Arc::clone(&self.store);
        let officer = self.config.officer_name.clone();
        let reply = self.picker.pick(&AUTO_REPLIES).to_string();

        let handle = spawn_delayed("chat-auto-reply", self.config.auto_reply_delay(), async move {
            let mut store = store.lock().await;
            if store.get_report(&report_id).is_none() {
                debug!(report_id = %report_id, "Report gone, auto-reply skipped");
                return;
            }
            store.add_chat_message(NewChatMessage {
                report_id,
                sender: officer,
                sender_role: SenderRole::Officer,
                message: reply,
            });
        });

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.retain(|handle| !handle.is_finished());
        pending.push(handle);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    use civic_db::entities::{ProfilePatch, Role};
    use civic_db::test_utils::{TestStore, new_report};

    fn input(report_id: &str, message: &str) -> SendMessageInput {
        SendMessageInput {
            report_id: report_id.to_string(),
            message: message.to_string(),
        }
    }

    async fn setup() -> (ChatService, SharedStore, String) {
        let mut t = TestStore::new();
        let report = t.store.add_report(new_report("Broken street lamp"));
        let (store, _, _) = t.into_shared();
        let service = ChatService::with_picker(
            Arc::clone(&store),
            ChatConfig::default(),
            Arc::new(SequentialReplyPicker::default()),
        );
        (service, store, report.id)
    }

    #[tokio::test(start_paused = true)]
    async fn test_citizen_message_gets_auto_reply() {
        let (service, _, report_id) = setup().await;

        let sent = service.send(input(&report_id, "  Still broken  ")).await.unwrap();
        assert!(sent.is_persisted());
        assert_eq!(service.pending_replies(), 1);
        assert_eq!(service.messages(&report_id).await.len(), 1);

        tokio::time::sleep(Duration::from_millis(2100)).await;
        let messages = service.messages(&report_id).await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].message, "Still broken");
        assert_eq!(messages[1].sender_role, SenderRole::Officer);
        assert_eq!(messages[1].sender, "Village Officer");
        assert_eq!(messages[1].message, AUTO_REPLIES[0]);
        assert_eq!(service.pending_replies(), 0);
        assert_eq!(service.unread_count(&report_id, SenderRole::Citizen).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_reply_skipped_after_delete() {
        let (service, store, report_id) = setup().await;

        let _ = service.send(input(&report_id, "Hello")).await.unwrap();
        store.lock().await.delete_report(&report_id);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(service.messages(&report_id).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_officer_message_does_not_trigger_reply() {
        let (service, store, report_id) = setup().await;
        store.lock().await.update_profile(ProfilePatch {
            role: Some(Role::Officer),
            ..ProfilePatch::default()
        });

        let _ = service.send(input(&report_id, "We are on it")).await.unwrap();
        assert_eq!(service.pending_replies(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_pending() {
        let (service, _, report_id) = setup().await;
        let _ = service.send(input(&report_id, "Hello")).await.unwrap();
        service.cancel_pending();

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(service.messages(&report_id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_send_validation() {
        let (service, _, report_id) = setup().await;

        let err = service.send(input(&report_id, "   ")).await.unwrap_err();
        assert_eq!(
            err.field_errors().unwrap().get("message"),
            Some("Message cannot be empty")
        );

        let err = service
            .send(input(&report_id, &"a".repeat(501)))
            .await
            .unwrap_err();
        assert_eq!(
            err.field_errors().unwrap().get("message"),
            Some("Message must be no more than 500 characters")
        );

        let err = service.send(input("missing", "Hello")).await.unwrap_err();
        assert_eq!(err.error_code(), "REPORT_NOT_FOUND");
        service.cancel_pending();
    }

    #[tokio::test]
    async fn test_length_limit_applies_to_trimmed_text() {
        let (service, _, report_id) = setup().await;
        let padded = format!("  {}  ", "a".repeat(MAX_MESSAGE_LENGTH));

        let sent = service.send(input(&report_id, &padded)).await.unwrap();
        assert_eq!(sent.value.message.chars().count(), MAX_MESSAGE_LENGTH);
        service.cancel_pending();
    }

    #[tokio::test]
    async fn test_send_surfaces_failed_write() {
        let mut t = TestStore::new();
        let report = t.store.add_report(new_report("Broken street lamp"));
        t.backend.set_fail_writes(true);
        let (store, _, _) = t.into_shared();
        let service = ChatService::new(store, ChatConfig::default());

        let sent = service.send(input(&report.id, "Hello")).await.unwrap();
        assert_eq!(sent.value.message, "Hello");
        assert!(!sent.is_persisted());
        service.cancel_pending();
    }

    #[tokio::test]
    async fn test_open_conversation_marks_read() {
        let (service, _, report_id) = setup().await;
        let posted = service
            .add_system_message(&report_id, "Report escalated")
            .await
            .unwrap();
        assert_eq!(posted.value.sender, SYSTEM_SENDER);

        assert_eq!(service.unread_count(&report_id, SenderRole::Citizen).await, 1);
        let messages = service.open_conversation(&report_id).await;
        assert!(messages.iter().all(|m| m.is_read));
        assert_eq!(service.unread_count(&report_id, SenderRole::Citizen).await, 0);
    }

    #[test]
    fn test_sequential_picker_cycles() {
        let picker = SequentialReplyPicker::default();
        let picked: Vec<&str> = (0..6).map(|_| picker.pick(&AUTO_REPLIES)).collect();
        assert_eq!(picked[0], picked[5]);
        assert_ne!(picked[0], picked[1]);
    }
}
