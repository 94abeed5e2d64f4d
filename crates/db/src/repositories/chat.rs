//! Chat message repository.

use civic_common::{SortOrder, sort_by_key};
use tracing::debug;

use crate::entities::{ChatMessage, NewChatMessage, SenderRole};
use crate::store::{Collection, DataStore};

/// Chat message persistence.
pub trait ChatRepository {
    /// Store a new unread message stamped now.
    fn add_chat_message(&mut self, data: NewChatMessage) -> ChatMessage;

    /// Messages of one report, oldest first.
    fn chat_messages(&self, report_id: &str) -> Vec<ChatMessage>;

    /// Every message in storage order.
    fn all_chat_messages(&self) -> Vec<ChatMessage>;

    /// Mark a report's messages authored by anyone but `viewer` as read. Returns how many changed.
    fn mark_chat_messages_read(&mut self, report_id: &str, viewer: SenderRole) -> usize;

    /// Unread messages of a report that `viewer` did not author.
    fn unread_count(&self, report_id: &str, viewer: SenderRole) -> usize;
}

impl ChatRepository for DataStore {
    fn add_chat_message(&mut self, data: NewChatMessage) -> ChatMessage {
        let id = self.next_id(self.chat_messages.iter().map(|m| m.id.as_str()));
        let message = ChatMessage {
            id,
            report_id: data.report_id,
            sender: data.sender,
            sender_role: data.sender_role,
            message: data.message,
            timestamp: self.now(),
            is_read: false,
        };

        self.chat_messages.push(message.clone());
        self.persist(&[Collection::ChatMessages]);
        debug!(report_id = %message.report_id, role = %message.sender_role, "Chat message added");
        message
    }

    fn chat_messages(&self, report_id: &str) -> Vec<ChatMessage> {
        let messages: Vec<ChatMessage> = self
            .chat_messages
            .iter()
            .filter(|m| m.report_id == report_id)
            .cloned()
            .collect();
        sort_by_key(&messages, |m| m.timestamp, SortOrder::Asc)
    }

    fn all_chat_messages(&self) -> Vec<ChatMessage> {
        self.chat_messages.clone()
    }

    fn mark_chat_messages_read(&mut self, report_id: &str, viewer: SenderRole) -> usize {
        let mut changed = 0;
        for message in self
            .chat_messages
            .iter_mut()
            .filter(|m| m.report_id == report_id && m.sender_role != viewer && !m.is_read)
        {
            message.is_read = true;
            changed += 1;
        }

        if changed > 0 {
            self.persist(&[Collection::ChatMessages]);
            debug!(report_id, count = changed, "Chat messages marked read");
        }
        changed
    }

    fn unread_count(&self, report_id: &str, viewer: SenderRole) -> usize {
        self.chat_messages
            .iter()
            .filter(|m| m.report_id == report_id && m.sender_role != viewer && !m.is_read)
            .count()
    }
}
