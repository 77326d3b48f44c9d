// src/lib.rs

//! `clipbridge` reconciles a synchronous, multi-format clipboard (the model
//! emulated applications program against) with the X11 selection protocol.
//!
//! The crate is organised leaves first:
//! - `clipboard`: format registry, format store, the open/close/empty session
//!   controller and the per-thread `Clipboard` handle that exposes the local API.
//! - `selection`: host-side selection ownership, the outbound request handler
//!   (answering peers) and the inbound requestor (fetching from peers).
//! - `host`: the protocol seam (`HostDisplay`) plus the clock and graphics
//!   collaborators; `host::mock` is an in-memory X server used by tests.
//! - `backends::x11`: the Xlib implementation of `HostDisplay`.

pub mod backends;
pub mod clipboard;
pub mod config;
pub mod error;
pub mod host;
pub mod selection;

pub use clipboard::format::{FormatId, FormatRegistry, INVALID_FORMAT};
pub use clipboard::legacy::LegacyClipboard;
pub use clipboard::messages::{ClipboardMessages, NoMessages};
pub use clipboard::session::ContextId;
pub use clipboard::{ClipData, Clipboard, ClipboardService};
pub use error::ClipboardError;
pub use host::{Clock, GraphicsBridge, HostDisplay, HostEvent, SystemClock};
