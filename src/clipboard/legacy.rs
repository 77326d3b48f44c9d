// src/clipboard/legacy.rs

//! Win16/Win32-style entry points over `Clipboard`.
//!
//! Old callers get integer handles instead of shared buffers, and 16-bit and
//! 32-bit callers each expect their own handle width. Both widths refer to
//! one canonical buffer per format. Handles are tied to the clipboard
//! sequence number and stop resolving once the clipboard is emptied or lost.
//! Failures collapse to `false`, `0` or a null handle, as those APIs report
//! them.

use std::sync::{Mutex, MutexGuard, PoisonError};

use log::debug;

use super::format::{FormatId, INVALID_FORMAT};
use super::session::ContextId;
use super::text::Codepage;
use super::{ClipData, Clipboard};
use crate::host::HostDisplay;

pub type Handle16 = u16;
pub type Handle32 = u32;

/// Marks a 32-bit handle so it never collides with a 16-bit one.
const HANDLE32_TAG: Handle32 = 0x0001_0000;

#[derive(Debug, Default)]
struct HandleTable {
    sequence: u32,
    slots: Vec<(FormatId, ClipData)>,
}

impl HandleTable {
    /// Slot for `data`, reusing one that already holds the same buffer.
    fn slot_for(&mut self, id: FormatId, data: ClipData) -> Option<Handle16> {
        let index = match self
            .slots
            .iter()
            .position(|(format, held)| *format == id && std::sync::Arc::ptr_eq(held, &data))
        {
            Some(index) => index,
            None => {
                self.slots.push((id, data));
                self.slots.len() - 1
            }
        };
        Handle16::try_from(index + 1).ok()
    }

    fn resolve(&self, handle: Handle16) -> Option<ClipData> {
        let index = usize::from(handle).checked_sub(1)?;
        self.slots.get(index).map(|(_, data)| data.clone())
    }
}

/// A `Clipboard` with handle-returning, `bool`-reporting entry points.
pub struct LegacyClipboard<H: HostDisplay> {
    clipboard: Clipboard<H>,
    handles: Mutex<HandleTable>,
}

impl<H: HostDisplay> LegacyClipboard<H> {
    pub fn new(clipboard: Clipboard<H>) -> Self {
        LegacyClipboard {
            clipboard,
            handles: Mutex::new(HandleTable::default()),
        }
    }

    pub fn clipboard(&self) -> &Clipboard<H> {
        &self.clipboard
    }

    /// The handle table, emptied first if the clipboard moved on since the
    /// handles in it were issued.
    fn handles(&self) -> MutexGuard<'_, HandleTable> {
        let sequence = self.clipboard.sequence_number();
        let mut table = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        if table.sequence != sequence {
            if !table.slots.is_empty() {
                debug!("Dropping {} legacy clipboard handles", table.slots.len());
            }
            table.slots.clear();
            table.sequence = sequence;
        }
        table
    }

    fn handle_for(&self, id: FormatId, data: ClipData) -> Handle16 {
        self.handles().slot_for(id, data).unwrap_or(0)
    }

    pub fn open_clipboard(&self, ctx: ContextId) -> bool {
        self.clipboard.open(ctx).is_ok()
    }

    pub fn close_clipboard(&self) -> bool {
        self.clipboard.close().is_ok()
    }

    pub fn empty_clipboard(&self) -> bool {
        self.clipboard.empty().is_ok()
    }

    /// Stores `data` and returns a 16-bit handle to it. `None` declares a
    /// delayed format and returns a null handle on success, as the original
    /// API does.
    pub fn set_clipboard_data16(&self, id: FormatId, data: Option<Vec<u8>>) -> Handle16 {
        match self.clipboard.set_data(id, data) {
            Ok(Some(stored)) => self.handle_for(id, stored),
            Ok(None) | Err(_) => 0,
        }
    }

    pub fn set_clipboard_data32(&self, id: FormatId, data: Option<Vec<u8>>) -> Handle32 {
        widen(self.set_clipboard_data16(id, data))
    }

    pub fn get_clipboard_data16(&self, id: FormatId) -> Handle16 {
        match self.clipboard.get_data(id) {
            Ok(data) => self.handle_for(id, data),
            Err(_) => 0,
        }
    }

    pub fn get_clipboard_data32(&self, id: FormatId) -> Handle32 {
        widen(self.get_clipboard_data16(id))
    }

    /// Bytes behind a 16-bit handle, `None` if it is null or stale.
    pub fn lock_handle16(&self, handle: Handle16) -> Option<ClipData> {
        self.handles().resolve(handle)
    }

    pub fn lock_handle32(&self, handle: Handle32) -> Option<ClipData> {
        if handle & HANDLE32_TAG == 0 {
            return None;
        }
        self.lock_handle16(Handle16::try_from(handle & !HANDLE32_TAG).ok()?)
    }

    pub fn count_clipboard_formats(&self) -> i32 {
        self.clipboard
            .count_formats()
            .map(|count| i32::try_from(count).unwrap_or(i32::MAX))
            .unwrap_or(0)
    }

    pub fn enum_clipboard_formats(&self, prev: FormatId) -> FormatId {
        self.clipboard.enum_formats(prev).unwrap_or(INVALID_FORMAT)
    }

    pub fn register_clipboard_format(&self, name: &str) -> FormatId {
        self.clipboard.register_format(name).unwrap_or(INVALID_FORMAT)
    }

    /// Copies the format's name into `buffer` as a NUL-terminated ANSI
    /// string, truncated to fit. Returns the number of characters copied,
    /// 0 for built-ins, unknown ids and empty buffers.
    pub fn get_clipboard_format_name(&self, id: FormatId, buffer: &mut [u8]) -> usize {
        let Some(name) = self.clipboard.format_name(id) else {
            return 0;
        };
        if buffer.is_empty() {
            return 0;
        }
        let encoded = Codepage::Windows1252.encode(&name);
        let copied = encoded.len().min(buffer.len() - 1);
        buffer[..copied].copy_from_slice(&encoded[..copied]);
        buffer[copied] = 0;
        copied
    }

    pub fn is_clipboard_format_available(&self, id: FormatId) -> bool {
        self.clipboard.is_format_available(id)
    }

    pub fn set_clipboard_viewer(&self, viewer: ContextId) -> Option<ContextId> {
        self.clipboard.set_viewer(Some(viewer))
    }

    pub fn change_clipboard_chain(&self, remove: ContextId, next: Option<ContextId>) -> bool {
        self.clipboard.change_viewer_chain(remove, next)
    }

    pub fn get_clipboard_owner(&self) -> Option<ContextId> {
        self.clipboard.owner()
    }

    pub fn get_open_clipboard_window(&self) -> Option<ContextId> {
        self.clipboard.open_by()
    }
}

fn widen(handle: Handle16) -> Handle32 {
    if handle == 0 {
        0
    } else {
        HANDLE32_TAG | Handle32::from(handle)
    }
}
