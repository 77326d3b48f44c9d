// src/error.rs

//! Error taxonomy for the clipboard and selection layers.
//!
//! Every failure surfaces as a plain `Result` to the caller; nothing is
//! propagated across the host event boundary. Callers that only care about
//! success can treat any `Err` as "format unavailable", matching what
//! applications observed historically.

use std::time::Duration;

use thiserror::Error;

use crate::clipboard::format::FormatId;
use crate::clipboard::session::ContextId;

/// Failures of the local clipboard API and of selection conversions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ClipboardError {
    /// `open` while another (or the same) context already holds the clipboard.
    #[error("clipboard is already open by context {holder:?}")]
    AlreadyOpen { holder: ContextId },

    /// An operation that needs an open bracket was called while closed.
    #[error("clipboard is not open")]
    NotOpen,

    /// `open` while the store is being emptied after a selection loss.
    #[error("clipboard is being released after a selection loss")]
    Releasing,

    /// `set_data`/`empty` without the required open bracket and ownership.
    #[error("caller does not own the clipboard")]
    NotOwned,

    /// No data for the format, and it could not be synthesized or fetched.
    #[error("format {0:#06x} is not available")]
    FormatAbsent(FormatId),

    /// The peer owning the selection did not answer within the deadline.
    #[error("selection owner did not convert {target} within {waited:?}")]
    ConversionTimeout { target: String, waited: Duration },

    /// The peer answered, but declined the conversion (property None) or
    /// returned data of the wrong type.
    #[error("selection owner refused conversion to {target}")]
    ConversionRefused { target: String },

    /// A peer sent a malformed request or reply.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// Empty or otherwise unusable format name.
    #[error("invalid clipboard format name")]
    InvalidFormatName,

    /// The host display reported a failure, such as refusing to intern a
    /// target atom.
    #[error("host display error: {0}")]
    Host(String),
}

impl ClipboardError {
    /// Whether repeating the same call later may succeed.
    ///
    /// A timed-out conversion qualifies (the peer may simply have been busy),
    /// as does an `open` that raced a selection loss. Everything else
    /// reflects state that will not change on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClipboardError::ConversionTimeout { .. } | ClipboardError::Releasing
        )
    }
}
