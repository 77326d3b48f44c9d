// src/selection/claim.rs

//! Host selection ownership, kept in lockstep with local ownership.
//!
//! Claims are optimistic: the protocol never confirms `SetSelectionOwner`,
//! so a selection counts as ours from the moment we ask for it until a
//! `SelectionClear` says otherwise. Loss always wins over local state, but a
//! clear only counts as loss if the host no longer names this window owner.

use bitflags::bitflags;
use log::{debug, info, trace};

use crate::clipboard::Clipboard;
use crate::host::{Atom, HostDisplay, WindowId, NONE};

bitflags! {
    /// The selections this layer manages.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SelectionMask: u8 {
        const PRIMARY = 1 << 0;
        const CLIPBOARD = 1 << 1;
    }
}

/// Which selections this process believes it owns, and through which window.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SelectionClaims {
    mask: SelectionMask,
    window: WindowId,
}

impl SelectionClaims {
    pub fn mask(&self) -> SelectionMask {
        self.mask
    }

    /// The window the current claims were made with, `NONE` if unclaimed.
    pub fn window(&self) -> WindowId {
        if self.mask.is_empty() {
            NONE
        } else {
            self.window
        }
    }

    pub fn is_claimed(&self, flag: SelectionMask) -> bool {
        self.mask.intersects(flag)
    }

    /// Marks every selection in `wanted` as claimed and returns those that
    /// were not claimed before; the caller asks the host for exactly those.
    pub fn plan_acquire(&mut self, wanted: SelectionMask, window: WindowId) -> SelectionMask {
        let missing = wanted.difference(self.mask);
        if missing.is_empty() {
            return missing;
        }
        if self.mask.is_empty() {
            self.window = window;
        }
        self.mask.insert(missing);
        missing
    }

    /// Applies the loss of `lost`. Returns `None` if it was not claimed;
    /// otherwise drops every claim and returns the others that were still
    /// held, which the caller releases on the host.
    pub fn on_lost(&mut self, lost: SelectionMask) -> Option<SelectionMask> {
        if !self.mask.intersects(lost) {
            return None;
        }
        let others = self.mask.difference(lost);
        self.mask = SelectionMask::empty();
        Some(others)
    }

    /// Drops every claim and returns what was held.
    pub fn release_all(&mut self) -> SelectionMask {
        std::mem::take(&mut self.mask)
    }
}

impl<H: HostDisplay> Clipboard<H> {
    pub(crate) fn mask_for_selection(&self, selection: Atom) -> Option<SelectionMask> {
        let atoms = self.atoms();
        if selection == atoms.clipboard {
            Some(SelectionMask::CLIPBOARD)
        } else if selection == atoms.primary {
            Some(SelectionMask::PRIMARY)
        } else {
            None
        }
    }

    /// Reacts to the host taking `selection` away.
    ///
    /// The store is emptied through the restricted path: nobody is sent a
    /// destroy notification and nothing is claimed again. The other managed
    /// selection is released too, so both always agree.
    pub(crate) fn handle_selection_clear(&self, selection: Atom) {
        let Some(flag) = self.mask_for_selection(selection) else {
            trace!("SelectionClear for unmanaged selection {}", selection);
            return;
        };
        // A clear queued by our own earlier release arrives after we claimed
        // again; the host still names this window as owner.
        if self.host.selection_owner(selection) == self.window {
            debug!("Stale SelectionClear for {:?}; this window owns it again", flag);
            return;
        }
        let others = {
            let mut state = self.lock();
            if !state.claims.is_claimed(flag) {
                debug!("SelectionClear for {:?}, which is not claimed; ignoring", flag);
                return;
            }
            if !state.session.begin_release() {
                debug!("SelectionClear for {:?} while already releasing", flag);
                return;
            }
            let others = state.claims.on_lost(flag).unwrap_or_default();
            state.store.clear();
            state.session.release_empty();
            others
        };
        info!("Lost ownership of {:?} selection", flag);
        self.release_host_selections(others);
        self.lock().session.finish_release();
    }
}
