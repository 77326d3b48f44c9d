// src/clipboard/format.rs

//! Format identifiers and the process-wide format registry.
//!
//! Ids below `FIRST_REGISTERED_FORMAT` are built in and never change. Names
//! registered at run time get the next free id at or above it; registering a
//! name again (in any letter case) returns the same id. Nothing is ever
//! unregistered.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, trace};

/// A clipboard format identifier.
pub type FormatId = u32;

/// Returned by `register` on failure. Never a valid format.
pub const INVALID_FORMAT: FormatId = 0;

pub const CF_TEXT: FormatId = 1;
pub const CF_BITMAP: FormatId = 2;
pub const CF_METAFILEPICT: FormatId = 3;
pub const CF_SYLK: FormatId = 4;
pub const CF_DIF: FormatId = 5;
pub const CF_TIFF: FormatId = 6;
pub const CF_OEMTEXT: FormatId = 7;
pub const CF_DIB: FormatId = 8;
pub const CF_PALETTE: FormatId = 9;
pub const CF_PENDATA: FormatId = 10;
pub const CF_RIFF: FormatId = 11;
pub const CF_WAVE: FormatId = 12;
pub const CF_UNICODETEXT: FormatId = 13;
pub const CF_ENHMETAFILE: FormatId = 14;
pub const CF_HDROP: FormatId = 15;
pub const CF_LOCALE: FormatId = 16;
pub const CF_DIBV5: FormatId = 17;
pub const CF_OWNERDISPLAY: FormatId = 0x0080;
pub const CF_DSPTEXT: FormatId = 0x0081;
pub const CF_DSPBITMAP: FormatId = 0x0082;
pub const CF_DSPMETAFILEPICT: FormatId = 0x0083;
pub const CF_DSPENHMETAFILE: FormatId = 0x008E;

/// First id handed out by `FormatRegistry::register`.
pub const FIRST_REGISTERED_FORMAT: FormatId = 0xC000;
const LAST_REGISTERED_FORMAT: FormatId = 0xFFFF;

/// Built-in formats and the names they travel under on the host.
const BUILTIN_FORMATS: &[(FormatId, &str)] = &[
    (CF_TEXT, "TEXT"),
    (CF_BITMAP, "BITMAP"),
    (CF_METAFILEPICT, "METAFILEPICT"),
    (CF_SYLK, "SYLK"),
    (CF_DIF, "DIF"),
    (CF_TIFF, "TIFF"),
    (CF_OEMTEXT, "OEMTEXT"),
    (CF_DIB, "DIB"),
    (CF_PALETTE, "PALETTE"),
    (CF_PENDATA, "PENDATA"),
    (CF_RIFF, "RIFF"),
    (CF_WAVE, "WAVE"),
    (CF_UNICODETEXT, "UNICODETEXT"),
    (CF_ENHMETAFILE, "ENHMETAFILE"),
    (CF_HDROP, "HDROP"),
    (CF_LOCALE, "LOCALE"),
    (CF_DIBV5, "DIBV5"),
    (CF_OWNERDISPLAY, "OWNERDISPLAY"),
    (CF_DSPTEXT, "DSPTEXT"),
    (CF_DSPBITMAP, "DSPBITMAP"),
    (CF_DSPMETAFILEPICT, "DSPMETAFILEPICT"),
    (CF_DSPENHMETAFILE, "DSPENHMETAFILE"),
];

/// Short name of a built-in format (`"TEXT"`, `"DIB"`, ...).
pub fn builtin_name(id: FormatId) -> Option<&'static str> {
    BUILTIN_FORMATS
        .iter()
        .find(|(builtin, _)| *builtin == id)
        .map(|(_, name)| *name)
}

/// Reverse of `builtin_name`.
pub fn builtin_by_name(name: &str) -> Option<FormatId> {
    BUILTIN_FORMATS
        .iter()
        .find(|(_, builtin)| builtin.eq_ignore_ascii_case(name))
        .map(|(id, _)| *id)
}

pub fn is_builtin(id: FormatId) -> bool {
    builtin_name(id).is_some()
}

pub fn is_registered_id(id: FormatId) -> bool {
    (FIRST_REGISTERED_FORMAT..=LAST_REGISTERED_FORMAT).contains(&id)
}

/// A registry entry. Built-ins have no registered name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredFormat {
    pub id: FormatId,
    pub name: Option<String>,
}

#[derive(Debug, Default)]
struct RegistryTable {
    names: Vec<String>,
    by_folded_name: HashMap<String, FormatId>,
}

impl RegistryTable {
    fn name(&self, id: FormatId) -> Option<&str> {
        if !is_registered_id(id) {
            return None;
        }
        self.names
            .get((id - FIRST_REGISTERED_FORMAT) as usize)
            .map(String::as_str)
    }
}

/// Table of built-in and dynamically registered formats.
///
/// Guarded by its own lock, so registration works whether or not the
/// clipboard is open and never waits on clipboard traffic.
#[derive(Debug, Default)]
pub struct FormatRegistry {
    table: Mutex<RegistryTable>,
}

impl FormatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `name` and returns its id, or `INVALID_FORMAT` if the name
    /// is empty or the id space is exhausted.
    pub fn register(&self, name: &str) -> FormatId {
        if name.is_empty() {
            debug!("Refusing to register an empty format name.");
            return INVALID_FORMAT;
        }
        let folded = name.to_lowercase();
        let mut table = self.lock();
        if let Some(id) = table.by_folded_name.get(&folded) {
            trace!("Format '{}' already registered as {:#06x}", name, id);
            return *id;
        }
        let next = FIRST_REGISTERED_FORMAT as usize + table.names.len();
        if next > LAST_REGISTERED_FORMAT as usize {
            debug!("Format id space exhausted, cannot register '{}'", name);
            return INVALID_FORMAT;
        }
        let id = next as FormatId;
        table.names.push(name.to_string());
        table.by_folded_name.insert(folded, id);
        debug!("Registered format '{}' as {:#06x}", name, id);
        id
    }

    pub fn lookup_by_id(&self, id: FormatId) -> Option<RegisteredFormat> {
        if is_builtin(id) {
            return Some(RegisteredFormat { id, name: None });
        }
        self.lock().name(id).map(|name| RegisteredFormat {
            id,
            name: Some(name.to_string()),
        })
    }

    /// Finds a registered (not built-in) format by name, ignoring case.
    pub fn lookup_by_name(&self, name: &str) -> Option<FormatId> {
        self.lock().by_folded_name.get(&name.to_lowercase()).copied()
    }

    /// Name of a registered format, as it was first registered.
    pub fn name_of(&self, id: FormatId) -> Option<String> {
        self.lock().name(id).map(str::to_string)
    }

    /// Human-readable label for any id, for logs and the CLI listing.
    pub fn describe(&self, id: FormatId) -> String {
        match builtin_name(id) {
            Some(name) => format!("CF_{}", name),
            None => self
                .name_of(id)
                .unwrap_or_else(|| format!("{:#06x}", id)),
        }
    }
}
