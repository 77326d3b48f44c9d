// src/clipboard/messages.rs

//! Notifications the clipboard sends to owner and viewer contexts.
//!
//! These stand in for the window messages an owner or viewer window would
//! receive. They are always invoked with no clipboard lock held, so an
//! implementation may call straight back into the clipboard.

use super::format::FormatId;
use super::session::ContextId;

pub trait ClipboardMessages: Send + Sync {
    /// The clipboard was emptied by a different context; `owner` no longer
    /// owns its contents.
    fn destroy_clipboard(&self, _owner: ContextId) {}

    /// Asks `owner` to produce the bytes of a format it declared for delayed
    /// rendering. `None` means the owner could not render it.
    fn render_format(&self, _owner: ContextId, _format: FormatId) -> Option<Vec<u8>> {
        None
    }

    /// The contents changed; sent to the head of the viewer chain on close.
    fn draw_clipboard(&self, _viewer: ContextId) {}
}

/// Drops every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMessages;

impl ClipboardMessages for NoMessages {}

#[cfg(test)]
pub use recording::{Message, RecordingMessages};

#[cfg(test)]
mod recording {
    use std::collections::HashMap;
    use std::sync::{Mutex, PoisonError};

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Message {
        Destroy(ContextId),
        Render(ContextId, FormatId),
        Draw(ContextId),
    }

    /// Records every message and answers render requests from a table.
    #[derive(Debug, Default)]
    pub struct RecordingMessages {
        log: Mutex<Vec<Message>>,
        renders: Mutex<HashMap<FormatId, Vec<u8>>>,
    }

    impl RecordingMessages {
        pub fn will_render(&self, format: FormatId, bytes: &[u8]) {
            self.renders
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(format, bytes.to_vec());
        }

        pub fn messages(&self) -> Vec<Message> {
            self.log.lock().unwrap_or_else(PoisonError::into_inner).clone()
        }

        fn push(&self, message: Message) {
            self.log.lock().unwrap_or_else(PoisonError::into_inner).push(message);
        }
    }

    impl ClipboardMessages for RecordingMessages {
        fn destroy_clipboard(&self, owner: ContextId) {
            self.push(Message::Destroy(owner));
        }

        fn render_format(&self, owner: ContextId, format: FormatId) -> Option<Vec<u8>> {
            self.push(Message::Render(owner, format));
            self.renders
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&format)
                .cloned()
        }

        fn draw_clipboard(&self, viewer: ContextId) {
            self.push(Message::Draw(viewer));
        }
    }
}
