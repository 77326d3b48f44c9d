// src/clipboard/session.rs

//! The open/close/empty state machine.
//!
//! A context opens the clipboard, optionally empties it (becoming owner of
//! record), supplies data and closes it again. `Releasing` is entered while
//! the selection-loss path empties the store on the host's behalf; neither
//! `open` nor a regular `empty` is legal in that state, which keeps the loss
//! path from looping back into another destroy or claim.

use log::{debug, trace};

use crate::error::ClipboardError;

/// Identifies the task or window calling into the clipboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub u32);

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

/// The open bracket held by one context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenBracket {
    pub ctx: ContextId,
    /// `empty` already ran inside this bracket.
    pub emptied: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Open(OpenBracket),
    /// The host took the selection away; the bracket (if any) is parked
    /// until the loss has been applied.
    Releasing(Option<OpenBracket>),
}

/// What `close` leaves for the caller to do once locks are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseOutcome {
    pub changed: bool,
    pub notify_viewer: Option<ContextId>,
}

#[derive(Debug)]
pub struct Session {
    state: SessionState,
    owner_of_record: Option<ContextId>,
    changed_since_open: bool,
    viewer: Option<ContextId>,
    sequence: u32,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Session {
            state: SessionState::Closed,
            owner_of_record: None,
            changed_since_open: false,
            viewer: None,
            sequence: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn owner(&self) -> Option<ContextId> {
        self.owner_of_record
    }

    pub fn viewer(&self) -> Option<ContextId> {
        self.viewer
    }

    pub fn sequence_number(&self) -> u32 {
        self.sequence
    }

    pub fn changed_since_open(&self) -> bool {
        self.changed_since_open
    }

    /// The context currently holding the open bracket.
    pub fn holder(&self) -> Option<ContextId> {
        match self.state {
            SessionState::Open(bracket) | SessionState::Releasing(Some(bracket)) => Some(bracket.ctx),
            _ => None,
        }
    }

    pub fn open(&mut self, ctx: ContextId) -> Result<(), ClipboardError> {
        if let Some(holder) = self.holder() {
            debug!("{} cannot open the clipboard: held by {}", ctx, holder);
            return Err(ClipboardError::AlreadyOpen { holder });
        }
        if let SessionState::Releasing(None) = self.state {
            debug!("{} cannot open the clipboard while a selection loss is applied", ctx);
            return Err(ClipboardError::Releasing);
        }
        self.state = SessionState::Open(OpenBracket { ctx, emptied: false });
        self.changed_since_open = false;
        trace!("Clipboard opened by {}", ctx);
        Ok(())
    }

    pub fn close(&mut self) -> Result<CloseOutcome, ClipboardError> {
        let bracket = self.require_open()?;
        self.state = SessionState::Closed;
        let changed = std::mem::take(&mut self.changed_since_open);
        trace!("Clipboard closed by {} (changed: {})", bracket.ctx, changed);
        Ok(CloseOutcome {
            changed,
            notify_viewer: if changed { self.viewer } else { None },
        })
    }

    pub fn require_open(&self) -> Result<OpenBracket, ClipboardError> {
        match self.state {
            SessionState::Open(bracket) => Ok(bracket),
            _ => Err(ClipboardError::NotOpen),
        }
    }

    /// The caller must hold the bracket and be owner of record.
    pub fn require_owner(&self) -> Result<ContextId, ClipboardError> {
        match self.state {
            SessionState::Open(bracket) if self.owner_of_record == Some(bracket.ctx) => Ok(bracket.ctx),
            SessionState::Open(_) | SessionState::Releasing(Some(_)) => Err(ClipboardError::NotOwned),
            _ => Err(ClipboardError::NotOpen),
        }
    }

    /// Validates and records an `empty` by the bracket holder.
    ///
    /// Returns the previous owner of record when it differs from the caller;
    /// that owner must be sent a destroy notification.
    pub fn begin_empty(&mut self) -> Result<Option<ContextId>, ClipboardError> {
        let bracket = match self.state {
            SessionState::Open(bracket) => bracket,
            SessionState::Releasing(_) => {
                // Only the loss path empties while releasing, via `release_empty`.
                return Err(ClipboardError::NotOwned);
            }
            SessionState::Closed => return Err(ClipboardError::NotOpen),
        };
        if bracket.emptied && self.owner_of_record != Some(bracket.ctx) {
            return Err(ClipboardError::NotOwned);
        }
        let previous = self.owner_of_record.filter(|owner| *owner != bracket.ctx);
        self.owner_of_record = Some(bracket.ctx);
        self.state = SessionState::Open(OpenBracket {
            ctx: bracket.ctx,
            emptied: true,
        });
        self.changed_since_open = true;
        self.sequence = self.sequence.wrapping_add(1);
        debug!("Clipboard emptied by {} (sequence {})", bracket.ctx, self.sequence);
        Ok(previous)
    }

    /// Marks contents as modified inside the current bracket.
    pub fn mark_changed(&mut self) {
        self.changed_since_open = true;
    }

    /// Enters `Releasing`. Returns false if a release is already in progress.
    pub fn begin_release(&mut self) -> bool {
        let parked = match self.state {
            SessionState::Releasing(_) => return false,
            SessionState::Open(bracket) => Some(bracket),
            SessionState::Closed => None,
        };
        self.state = SessionState::Releasing(parked);
        true
    }

    /// The restricted empty used on selection loss: no owner is notified and
    /// nobody becomes owner of record.
    pub fn release_empty(&mut self) {
        if let SessionState::Releasing(_) = self.state {
            self.owner_of_record = None;
            self.sequence = self.sequence.wrapping_add(1);
            debug!("Clipboard contents released (sequence {})", self.sequence);
        }
    }

    /// Leaves `Releasing`. A parked bracket is restored as not yet emptied,
    /// so its holder may empty and supply new data.
    pub fn finish_release(&mut self) {
        if let SessionState::Releasing(parked) = self.state {
            self.state = match parked {
                Some(bracket) => SessionState::Open(OpenBracket {
                    ctx: bracket.ctx,
                    emptied: false,
                }),
                None => SessionState::Closed,
            };
        }
    }

    /// Installs a viewer and returns the one it replaces.
    pub fn set_viewer(&mut self, viewer: Option<ContextId>) -> Option<ContextId> {
        std::mem::replace(&mut self.viewer, viewer)
    }

    /// Unlinks `remove` from the viewer chain, making `next` the head if
    /// `remove` was the head. Returns whether the chain changed.
    pub fn change_viewer_chain(&mut self, remove: ContextId, next: Option<ContextId>) -> bool {
        if self.viewer == Some(remove) {
            self.viewer = next;
            true
        } else {
            false
        }
    }
}
