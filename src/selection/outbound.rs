// src/selection/outbound.rs

//! Answering peers while this process owns a selection.
//!
//! Every top-level `SelectionRequest` gets exactly one `SelectionNotify`.
//! Conversions write the requestor's property first; the notify names that
//! property on success and `None` otherwise. `MULTIPLE` runs each listed
//! conversion through the same logic without replying per pair.

use log::{debug, trace, warn};

use super::composite;
use super::targets::{TargetKind, TextEncoding};
use crate::clipboard::format::{FormatId, CF_BITMAP, CF_DIB, CF_OEMTEXT, CF_TEXT, CF_UNICODETEXT};
use crate::clipboard::{text, Clipboard};
use crate::host::{Atom, HostDisplay, Property, SelectionNotify, SelectionRequest, WindowId, NONE};

impl<H: HostDisplay> Clipboard<H> {
    pub(crate) fn handle_selection_request(&self, request: &SelectionRequest) {
        trace!(
            "SelectionRequest (owner: {:#x}, requestor: {:#x}, selection: {}, target: {}, property: {})",
            request.owner,
            request.requestor,
            request.selection,
            request.target,
            request.property
        );

        // Obsolete clients leave the property unset and expect the target
        // atom to be used instead.
        let property = if request.property == NONE {
            request.target
        } else {
            request.property
        };

        let mut reply = SelectionNotify {
            requestor: request.requestor,
            selection: request.selection,
            target: request.target,
            property: NONE,
            time: request.time,
        };

        if request.owner != self.window {
            warn!(
                "SelectionRequest for window {:#x}, but this connection owns {:#x}",
                request.owner, self.window
            );
        } else if !self.holds_selection(request.selection) {
            warn!("SelectionRequest for selection {} which is not claimed", request.selection);
        } else if self.convert_for_peer(request.requestor, request.target, property, false) {
            reply.property = property;
        }

        self.host.send_selection_notify(&reply);
        self.host.flush();
    }

    fn holds_selection(&self, selection: Atom) -> bool {
        match self.mask_for_selection(selection) {
            Some(flag) => self.lock().claims.is_claimed(flag),
            None => false,
        }
    }

    /// Performs one conversion into `property` on `requestor`. Returns
    /// whether the property was written.
    fn convert_for_peer(&self, requestor: WindowId, target: Atom, property: Atom, nested: bool) -> bool {
        match self.targets.classify(&self.host, self.registry(), target) {
            TargetKind::Targets => self.export_targets(requestor, property),
            TargetKind::Multiple if nested => {
                warn!("Refusing MULTIPLE nested inside MULTIPLE");
                false
            }
            TargetKind::Multiple => self.export_multiple(requestor, property),
            TargetKind::Text(encoding) => self.export_text(encoding, requestor, property),
            TargetKind::Image => self.export_pixmap(requestor, property),
            TargetKind::Native(id) => self.export_native(id, target, requestor, property),
            TargetKind::Unsupported => {
                debug!("Cannot convert selection to target {}", target);
                false
            }
        }
    }

    fn export_targets(&self, requestor: WindowId, property: Atom) -> bool {
        let available = self.lock().store.available();
        let atoms = *self.atoms();

        let mut list = vec![atoms.targets, atoms.multiple];
        let mut push = |atom: Atom| {
            if atom != NONE && !list.contains(&atom) {
                list.push(atom);
            }
        };
        if available
            .iter()
            .any(|id| matches!(*id, CF_TEXT | CF_OEMTEXT | CF_UNICODETEXT))
        {
            push(atoms.utf8_string);
            push(atoms.string);
        }
        for id in &available {
            if let Ok(atom) = self.targets.atom_for_format(&self.host, self.registry(), *id) {
                push(atom);
            }
        }
        let offers_image = available.contains(&CF_DIB)
            || (available.contains(&CF_BITMAP) && self.bitmap_as_dib().is_some());
        if offers_image {
            push(atoms.pixmap);
        }

        trace!("Offering {} targets", list.len());
        self.host
            .change_property(requestor, property, &Property::longs(atoms.atom, list));
        true
    }

    fn export_multiple(&self, requestor: WindowId, property: Atom) -> bool {
        let Some(pairs) = self.host.get_property(requestor, property, false) else {
            warn!("MULTIPLE request without a pair list on {:#x}", requestor);
            return false;
        };
        let Some(items) = pairs.as_longs() else {
            warn!("MULTIPLE pair list is not a 32-bit list; ignoring request");
            return false;
        };
        let limit = self.service.config().max_property_longs;
        let mut items = items[..items.len().min(limit)].to_vec();
        if items.len() % 2 != 0 {
            warn!("MULTIPLE pair list has odd length {}; ignoring trailing atom", items.len());
        }

        for pair in items.chunks_exact_mut(2) {
            let (target, pair_property) = (pair[0], pair[1]);
            if pair_property == NONE {
                trace!("Skipping MULTIPLE pair for target {} without property", target);
                continue;
            }
            if !self.convert_for_peer(requestor, target, pair_property, true) {
                pair[1] = NONE;
            }
        }

        self.host
            .change_property(requestor, property, &Property::longs(pairs.type_atom, items));
        true
    }

    fn export_text(&self, encoding: TextEncoding, requestor: WindowId, property: Atom) -> bool {
        let atoms = *self.atoms();
        let (type_atom, bytes) = match encoding {
            TextEncoding::Ansi => {
                let ansi = match self.materialize_local(CF_TEXT) {
                    Some(ansi) => Some(ansi.to_vec()),
                    None => self
                        .materialize_local(CF_UNICODETEXT)
                        .map(|wide| text::string_to_ansi(&text::utf16le_to_string(&wide))),
                };
                let Some(ansi) = ansi else {
                    debug!("No text to convert to STRING");
                    return false;
                };
                (atoms.string, text::ansi_to_latin1(&text::strip_carriage_returns(&ansi)))
            }
            TextEncoding::Utf8 => {
                let decoded = match self.materialize_local(CF_UNICODETEXT) {
                    Some(wide) => Some(text::utf16le_to_string(&wide)),
                    None => self
                        .materialize_local(CF_TEXT)
                        .map(|ansi| text::ansi_to_string(&ansi)),
                };
                let Some(decoded) = decoded else {
                    debug!("No text to convert to UTF8_STRING");
                    return false;
                };
                (atoms.utf8_string, text::strip_carriage_returns(decoded.as_bytes()))
            }
        };
        trace!("Writing {} bytes of text to property {}", bytes.len(), property);
        self.host
            .change_property(requestor, property, &Property::bytes(type_atom, bytes));
        true
    }

    /// The DIB behind the `CF_BITMAP` record, if the graphics side can
    /// produce one.
    fn bitmap_as_dib(&self) -> Option<Vec<u8>> {
        let record = self.materialize_local(CF_BITMAP)?;
        composite::bitmap_dib(&record, self.service.graphics())
    }

    fn export_pixmap(&self, requestor: WindowId, property: Atom) -> bool {
        let dib = match self.materialize_local(CF_DIB) {
            Some(dib) => dib.to_vec(),
            None => match self.bitmap_as_dib() {
                Some(dib) => dib,
                None => {
                    debug!("PIXMAP requested but no DIB or convertible bitmap is available");
                    return false;
                }
            },
        };
        let Some(pixmap) = self.host.create_pixmap_from_dib(&dib) else {
            warn!("Failed to realize a pixmap from a {}-byte DIB", dib.len());
            return false;
        };
        let pixmap_type = self.atoms().pixmap;
        self.host
            .change_property(requestor, property, &Property::longs(pixmap_type, vec![pixmap]));
        true
    }

    fn export_native(&self, id: FormatId, target: Atom, requestor: WindowId, property: Atom) -> bool {
        let Some(data) = self.materialize_local(id) else {
            debug!("{} requested but not available", self.registry().describe(id));
            return false;
        };
        let bytes = if composite::is_composite(id) {
            match composite::serialize(id, &data, self.service.graphics()) {
                Some(buffer) => buffer,
                None => return false,
            }
        } else {
            data.to_vec()
        };
        self.host
            .change_property(requestor, property, &Property::bytes(target, bytes));
        true
    }
}
