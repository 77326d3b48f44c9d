// src/selection/atoms.rs

//! Atoms used by the selection protocol, interned once per host connection.

use anyhow::{Context, Result};

use crate::host::{Atom, HostDisplay};

/// Property this process asks peers to store conversions into.
pub const SELECTION_DATA_PROPERTY: &str = "CLIPBRIDGE_SELECTION_DATA";

/// Holds commonly used atoms for selection handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionAtoms {
    // Selection names
    pub primary: Atom,
    pub clipboard: Atom,

    // Pseudo-targets
    pub targets: Atom,
    pub multiple: Atom,
    pub atom_pair: Atom,
    pub incr: Atom,

    // Text targets
    pub string: Atom,
    pub utf8_string: Atom,
    pub text: Atom,
    pub compound_text: Atom,

    // Image and list types
    pub pixmap: Atom,
    pub bitmap: Atom,
    pub atom: Atom,

    /// Our private conversion destination.
    pub selection_data: Atom,
}

impl SelectionAtoms {
    pub fn new<H: HostDisplay + ?Sized>(host: &H) -> Result<Self> {
        let intern = |name: &str| -> Result<Atom> {
            host.intern_atom(name)
                .with_context(|| format!("Failed to intern selection atom '{}'", name))
        };

        Ok(Self {
            primary: intern("PRIMARY")?,
            clipboard: intern("CLIPBOARD")?,
            targets: intern("TARGETS")?,
            multiple: intern("MULTIPLE")?,
            atom_pair: intern("ATOM_PAIR")?,
            incr: intern("INCR")?,
            string: intern("STRING")?,
            utf8_string: intern("UTF8_STRING")?,
            text: intern("TEXT")?,
            compound_text: intern("COMPOUND_TEXT")?,
            pixmap: intern("PIXMAP")?,
            bitmap: intern("BITMAP")?,
            atom: intern("ATOM")?,
            selection_data: intern(SELECTION_DATA_PROPERTY)?,
        })
    }

    /// Whether `atom` names one of the two selections this layer manages.
    pub fn is_managed_selection(&self, atom: Atom) -> bool {
        atom == self.clipboard || atom == self.primary
    }

    /// Targets served from the ANSI text record.
    pub fn is_ansi_text_target(&self, target: Atom) -> bool {
        target == self.string || target == self.text || target == self.compound_text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::mock::FakeServer;
    use test_log::test;

    #[test]
    fn it_should_use_predefined_values_for_core_atoms() {
        let server = FakeServer::new();
        let host = server.connect();
        let atoms = SelectionAtoms::new(&host).unwrap();
        assert_eq!(atoms.primary, 1);
        assert_eq!(atoms.string, 31);
        assert_eq!(atoms.pixmap, 20);
        assert_ne!(atoms.clipboard, atoms.targets);
        assert!(atoms.is_managed_selection(atoms.clipboard));
        assert!(!atoms.is_managed_selection(atoms.string));
    }

    #[test]
    fn it_should_agree_across_connections() {
        let server = FakeServer::new();
        let first = SelectionAtoms::new(&server.connect()).unwrap();
        let second = SelectionAtoms::new(&server.connect()).unwrap();
        assert_eq!(first, second);
    }
}
