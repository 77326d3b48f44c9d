// src/selection/targets.rs

//! Mapping between clipboard formats and selection targets.
//!
//! - `CF_TEXT` travels as `STRING` (also served for `TEXT` and `COMPOUND_TEXT`).
//! - `CF_UNICODETEXT` travels as `UTF8_STRING`.
//! - Bitmaps are offered as `PIXMAP`, and a peer's `PIXMAP` imports as `CF_DIB`.
//! - Every other built-in travels as a `WCF_<NAME>` passthrough atom, and a
//!   registered format as the atom of its own name.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use log::{error, trace};

use super::atoms::SelectionAtoms;
use crate::clipboard::format::{
    builtin_by_name, builtin_name, FormatId, FormatRegistry, CF_DIB, CF_TEXT, CF_UNICODETEXT,
    INVALID_FORMAT,
};
use crate::error::ClipboardError;
use crate::host::{Atom, HostDisplay, NONE};

/// Prefix of the passthrough atoms for built-in formats.
pub const NATIVE_PREFIX: &str = "WCF_";

/// Protocol-level targets a peer may advertise that carry no clipboard data.
const META_TARGETS: &[&str] = &[
    "TARGETS",
    "MULTIPLE",
    "TIMESTAMP",
    "DELETE",
    "SAVE_TARGETS",
    "INSERT_SELECTION",
    "INSERT_PROPERTY",
    "LENGTH",
    "INCR",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// Latin-1 `STRING`, produced from the ANSI record.
    Ansi,
    Utf8,
}

/// How the owner handler serves a requested target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Targets,
    Multiple,
    Text(TextEncoding),
    Image,
    Native(FormatId),
    Unsupported,
}

/// Per-connection format/target translation with cached atom lookups.
#[derive(Debug)]
pub struct TargetMap {
    atoms: SelectionAtoms,
    by_format: Mutex<HashMap<FormatId, Atom>>,
    names: Mutex<HashMap<Atom, Option<String>>>,
}

impl TargetMap {
    pub fn new(atoms: SelectionAtoms) -> Self {
        TargetMap {
            atoms,
            by_format: Mutex::new(HashMap::new()),
            names: Mutex::new(HashMap::new()),
        }
    }

    pub fn atoms(&self) -> &SelectionAtoms {
        &self.atoms
    }

    /// Name of `atom`, asking the host only the first time.
    pub fn atom_name<H: HostDisplay + ?Sized>(&self, host: &H, atom: Atom) -> Option<String> {
        if atom == NONE {
            return None;
        }
        let mut names = self.names.lock().unwrap_or_else(PoisonError::into_inner);
        names
            .entry(atom)
            .or_insert_with(|| host.atom_name(atom))
            .clone()
    }

    /// The target a format is transferred as.
    ///
    /// Formats without a name (unregistered ids, the sentinel) have no
    /// target; a host that refuses to intern the name is reported as such.
    pub fn atom_for_format<H: HostDisplay + ?Sized>(
        &self,
        host: &H,
        registry: &FormatRegistry,
        id: FormatId,
    ) -> Result<Atom, ClipboardError> {
        match id {
            CF_TEXT => return Ok(self.atoms.string),
            CF_UNICODETEXT => return Ok(self.atoms.utf8_string),
            INVALID_FORMAT => return Err(ClipboardError::FormatAbsent(id)),
            _ => {}
        }
        if let Some(atom) = self
            .by_format
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
        {
            return Ok(*atom);
        }
        let name = match builtin_name(id) {
            Some(builtin) => format!("{}{}", NATIVE_PREFIX, builtin),
            None => registry.name_of(id).ok_or(ClipboardError::FormatAbsent(id))?,
        };
        let atom = host.intern_atom(&name).map_err(|e| {
            error!("Cannot map format {:#06x} to a target: {:#}", id, e);
            ClipboardError::Host(format!("{:#}", e))
        })?;
        trace!("Format {:#06x} travels as '{}' ({})", id, name, atom);
        self.by_format
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, atom);
        Ok(atom)
    }

    /// Decides how to answer a request for `target`.
    pub fn classify<H: HostDisplay + ?Sized>(
        &self,
        host: &H,
        registry: &FormatRegistry,
        target: Atom,
    ) -> TargetKind {
        let atoms = &self.atoms;
        if target == atoms.targets {
            return TargetKind::Targets;
        }
        if target == atoms.multiple {
            return TargetKind::Multiple;
        }
        if atoms.is_ansi_text_target(target) {
            return TargetKind::Text(TextEncoding::Ansi);
        }
        if target == atoms.utf8_string {
            return TargetKind::Text(TextEncoding::Utf8);
        }
        if target == atoms.pixmap || target == atoms.bitmap {
            return TargetKind::Image;
        }
        match self.atom_name(host, target) {
            Some(name) => native_format(registry, &name)
                .map(TargetKind::Native)
                .unwrap_or(TargetKind::Unsupported),
            None => TargetKind::Unsupported,
        }
    }

    /// The format a peer-advertised target imports into.
    ///
    /// Unknown names are registered so the data can be fetched later.
    /// `PIXMAP` imports as a DIB. Protocol meta targets and depth-1
    /// `BITMAP`s yield `None`.
    pub fn format_for_advertised<H: HostDisplay + ?Sized>(
        &self,
        host: &H,
        registry: &FormatRegistry,
        target: Atom,
    ) -> Option<FormatId> {
        let atoms = &self.atoms;
        if atoms.is_ansi_text_target(target) {
            return Some(CF_TEXT);
        }
        if target == atoms.utf8_string {
            return Some(CF_UNICODETEXT);
        }
        if target == atoms.pixmap {
            return Some(CF_DIB);
        }
        if target == atoms.bitmap || target == atoms.atom_pair {
            return None;
        }
        let name = self.atom_name(host, target)?;
        if META_TARGETS.contains(&name.as_str()) {
            return None;
        }
        if let Some(id) = native_format(registry, &name) {
            return Some(id);
        }
        match registry.register(&name) {
            INVALID_FORMAT => None,
            id => {
                self.by_format
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(id, target);
                Some(id)
            }
        }
    }
}

/// `WCF_<NAME>` built-ins, then formats registered under `name`.
fn native_format(registry: &FormatRegistry, name: &str) -> Option<FormatId> {
    name.strip_prefix(NATIVE_PREFIX)
        .and_then(builtin_by_name)
        .or_else(|| registry.lookup_by_name(name))
}
