// src/host/mod.rs

//! The host display protocol seam.
//!
//! `HostDisplay` is the subset of the X11 selection protocol the clipboard
//! layer needs: ownership claims, conversion requests, property reads and
//! writes, `SelectionNotify` replies and non-blocking event polling. The Xlib
//! implementation lives in `crate::backends::x11`; `mock` provides an
//! in-memory server for tests.
//!
//! Alongside it sit two collaborators: `Clock`, which lets the inbound
//! conversion wait be driven by a fake clock, and `GraphicsBridge`, which
//! owns GDI-level objects (metafiles) whose bytes the clipboard only carries.

use std::time::{Duration, Instant};

use anyhow::Result;

#[cfg(test)]
pub mod mock;

/// An interned protocol-wide name (X11 `Atom`).
pub type Atom = u64;
/// A host window identifier (X11 `Window`).
pub type WindowId = u64;

/// The `None` atom / window.
pub const NONE: Atom = 0;

/// Payload of a window property, by item width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    /// Format 8: byte-oriented data.
    Bytes(Vec<u8>),
    /// Format 32: atoms, XIDs and other 32-bit items.
    Longs(Vec<u64>),
}

impl PropertyValue {
    /// The X11 item width in bits.
    pub fn format(&self) -> u8 {
        match self {
            PropertyValue::Bytes(_) => 8,
            PropertyValue::Longs(_) => 32,
        }
    }

    /// Number of items (not bytes).
    pub fn len(&self) -> usize {
        match self {
            PropertyValue::Bytes(bytes) => bytes.len(),
            PropertyValue::Longs(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A typed window property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub type_atom: Atom,
    pub value: PropertyValue,
}

impl Property {
    pub fn bytes(type_atom: Atom, bytes: Vec<u8>) -> Self {
        Property {
            type_atom,
            value: PropertyValue::Bytes(bytes),
        }
    }

    pub fn longs(type_atom: Atom, items: Vec<u64>) -> Self {
        Property {
            type_atom,
            value: PropertyValue::Longs(items),
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &self.value {
            PropertyValue::Bytes(bytes) => Some(bytes),
            PropertyValue::Longs(_) => None,
        }
    }

    pub fn as_longs(&self) -> Option<&[u64]> {
        match &self.value {
            PropertyValue::Longs(items) => Some(items),
            PropertyValue::Bytes(_) => None,
        }
    }
}

/// A peer asks the selection owner to convert `selection` to `target` and
/// store the result in `property` on `requestor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionRequest {
    pub owner: WindowId,
    pub requestor: WindowId,
    pub selection: Atom,
    pub target: Atom,
    pub property: Atom,
    pub time: u64,
}

/// Conversion-complete reply. `property` is `NONE` when the conversion failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionNotify {
    pub requestor: WindowId,
    pub selection: Atom,
    pub target: Atom,
    pub property: Atom,
    pub time: u64,
}

/// Host events the clipboard layer reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    SelectionRequest(SelectionRequest),
    SelectionNotify(SelectionNotify),
    /// `window` lost ownership of `selection`.
    SelectionClear {
        window: WindowId,
        selection: Atom,
        time: u64,
    },
    PropertyNotify {
        window: WindowId,
        atom: Atom,
        deleted: bool,
    },
    /// Anything else; carries the raw event type for tracing.
    Other(i32),
}

/// Selection-protocol operations on one host connection.
///
/// Implementations are per thread: an Xlib display is not shareable, so each
/// thread that services clipboard traffic attaches its own host.
pub trait HostDisplay {
    /// Interns `name`, creating the atom if needed.
    fn intern_atom(&self, name: &str) -> Result<Atom>;

    /// Returns the name of an atom (a host round trip).
    fn atom_name(&self, atom: Atom) -> Option<String>;

    /// The window this connection uses as selection owner and requestor.
    fn selection_window(&self) -> WindowId;

    /// Claims (or with `NONE`, releases) a selection. The host never confirms
    /// a claim synchronously.
    fn set_selection_owner(&self, selection: Atom, owner: WindowId);

    /// Current owner of a selection, `NONE` if unowned.
    fn selection_owner(&self, selection: Atom) -> WindowId;

    /// Asks the current owner of `selection` to convert it.
    fn convert_selection(&self, selection: Atom, target: Atom, property: Atom, requestor: WindowId);

    /// Replaces a property on `window`.
    fn change_property(&self, window: WindowId, property: Atom, value: &Property);

    /// Reads a whole property; `delete` removes it after reading.
    fn get_property(&self, window: WindowId, property: Atom, delete: bool) -> Option<Property>;

    fn delete_property(&self, window: WindowId, property: Atom);

    /// Sends a `SelectionNotify` to `notify.requestor`.
    fn send_selection_notify(&self, notify: &SelectionNotify);

    /// Returns the next queued event without blocking.
    fn poll_event(&self) -> Option<HostEvent>;

    fn flush(&self);

    /// Realizes a host image resource from a packed DIB and returns its id.
    ///
    /// Pixel interpretation belongs to the graphics side of the backend; the
    /// clipboard only hands the bytes over and references the result.
    fn create_pixmap_from_dib(&self, _dib: &[u8]) -> Option<u64> {
        log::trace!("HostDisplay::create_pixmap_from_dib not implemented for this host.");
        None
    }

    /// Reads a peer's pixmap back as a packed DIB.
    fn dib_from_pixmap(&self, _pixmap: u64) -> Option<Vec<u8>> {
        log::trace!("HostDisplay::dib_from_pixmap not implemented for this host.");
        None
    }
}

/// Time source for the bounded conversion wait.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Wall-clock time and real sleeps.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// GDI-side owner of metafile and bitmap objects.
///
/// The clipboard stores METAFILEPICT, ENHMETAFILE and BITMAP records as small
/// headers holding a graphics handle; transferring them means asking this
/// collaborator for the bits (outbound) or for a new handle (inbound).
pub trait GraphicsBridge: Send + Sync {
    /// The packed DIB of a device-dependent bitmap.
    fn bitmap_dib(&self, _handle: u32) -> Option<Vec<u8>> {
        None
    }

    fn metafile_bits(&self, _handle: u32) -> Option<Vec<u8>> {
        None
    }

    fn enh_metafile_bits(&self, _handle: u32) -> Option<Vec<u8>> {
        None
    }

    fn create_metafile(&self, _bits: &[u8]) -> Option<u32> {
        None
    }

    fn create_enh_metafile(&self, _bits: &[u8]) -> Option<u32> {
        None
    }
}

/// A graphics bridge with no metafile or bitmap support.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullGraphics;

impl GraphicsBridge for NullGraphics {}
