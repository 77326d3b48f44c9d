// src/selection/requestor.rs

//! Fetching data from a peer that owns the selection.
//!
//! A conversion is the one place this layer waits. The wait is a poll loop
//! against the host event queue with a deadline: unrelated events are
//! dispatched as they arrive (so a `SelectionClear` or a peer's own request
//! is still handled) and the loop gives up once the configured timeout has
//! elapsed on the injected clock.

use log::{debug, trace, warn};

use super::composite;
use crate::clipboard::format::{FormatId, CF_DIB, CF_TEXT, CF_UNICODETEXT, INVALID_FORMAT};
use crate::clipboard::store::{alias_partner, DataOrigin};
use crate::clipboard::{text, ClipData, Clipboard};
use crate::error::ClipboardError;
use crate::host::{Atom, HostDisplay, HostEvent, Property, PropertyValue, NONE};

impl<H: HostDisplay> Clipboard<H> {
    fn target_label(&self, target: Atom) -> String {
        self.targets
            .atom_name(&self.host, target)
            .unwrap_or_else(|| format!("atom {}", target))
    }

    /// Asks the owner of `selection` to convert it to `target` and waits for
    /// the reply, servicing other host events meanwhile.
    pub(crate) fn convert_selection_blocking(
        &self,
        selection: Atom,
        target: Atom,
    ) -> Result<Property, ClipboardError> {
        let property = self.atoms().selection_data;
        let config = self.service.config();

        // A stale reply from an abandoned conversion must not be mistaken
        // for this one.
        self.host.delete_property(self.window, property);
        self.host
            .convert_selection(selection, target, property, self.window);
        self.host.flush();

        let started = self.clock.now();
        let deadline = started + config.conversion_timeout();
        loop {
            while let Some(event) = self.host.poll_event() {
                match event {
                    HostEvent::SelectionNotify(notify)
                        if notify.requestor == self.window
                            && notify.selection == selection
                            && notify.target == target =>
                    {
                        if notify.property == NONE {
                            debug!("Selection owner refused conversion to {}", self.target_label(target));
                            return Err(ClipboardError::ConversionRefused {
                                target: self.target_label(target),
                            });
                        }
                        let reply = self
                            .host
                            .get_property(self.window, notify.property, true)
                            .ok_or_else(|| {
                                ClipboardError::ProtocolViolation(format!(
                                    "conversion to {} named an empty property",
                                    self.target_label(target)
                                ))
                            })?;
                        if reply.type_atom == self.atoms().incr {
                            warn!(
                                "Selection owner offered an incremental transfer for {}; not supported",
                                self.target_label(target)
                            );
                            return Err(ClipboardError::ConversionRefused {
                                target: self.target_label(target),
                            });
                        }
                        trace!(
                            "Conversion to {} returned {} items of format {}",
                            target,
                            reply.value.len(),
                            reply.value.format()
                        );
                        return Ok(reply);
                    }
                    other => self.process_event(other),
                }
            }

            let now = self.clock.now();
            if now >= deadline {
                let waited = now.duration_since(started);
                let target = self.target_label(target);
                warn!(
                    "Timed out after {:?} waiting for the selection owner to convert {}",
                    waited, target
                );
                return Err(ClipboardError::ConversionTimeout { target, waited });
            }
            self.clock
                .sleep(config.poll_interval().min(deadline.duration_since(now)));
        }
    }

    /// Converts to `target` and checks the reply is `target`-typed bytes.
    fn fetch_bytes(&self, selection: Atom, target: Atom) -> Result<Vec<u8>, ClipboardError> {
        let reply = self.convert_selection_blocking(selection, target)?;
        if reply.type_atom != target {
            warn!(
                "Selection owner answered {} with type {}",
                self.target_label(target),
                self.target_label(reply.type_atom)
            );
            return Err(ClipboardError::ConversionRefused {
                target: self.target_label(target),
            });
        }
        match reply.value {
            PropertyValue::Bytes(bytes) => Ok(bytes),
            PropertyValue::Longs(_) => {
                warn!("Selection owner answered {} with 32-bit data", self.target_label(target));
                Err(ClipboardError::ConversionRefused {
                    target: self.target_label(target),
                })
            }
        }
    }

    /// Turns wire bytes for `id` into its local representation.
    fn decode_import(&self, id: FormatId, wire: Vec<u8>) -> Result<ClipData, ClipboardError> {
        let local = match id {
            CF_TEXT => text::latin1_to_ansi(&text::expand_line_feeds(&wire)),
            CF_UNICODETEXT => {
                let mut expanded = text::expand_line_feeds(&wire);
                expanded.pop();
                text::string_to_utf16le(&String::from_utf8_lossy(&expanded))
            }
            _ if composite::is_composite(id) => {
                composite::deserialize(id, &wire, self.service.graphics())
                    .ok_or(ClipboardError::FormatAbsent(id))?
            }
            _ => wire,
        };
        Ok(ClipData::from(local))
    }

    /// Converts to `PIXMAP` and reads the returned pixmap back as a DIB.
    fn fetch_pixmap_dib(&self, selection: Atom) -> Result<Vec<u8>, ClipboardError> {
        let pixmap_type = self.atoms().pixmap;
        let reply = self.convert_selection_blocking(selection, pixmap_type)?;
        let refused = || ClipboardError::ConversionRefused {
            target: self.target_label(pixmap_type),
        };
        let pixmap = match reply.as_longs() {
            Some([pixmap, ..]) if reply.type_atom == pixmap_type => *pixmap,
            _ => {
                warn!(
                    "Selection owner answered PIXMAP with type {}",
                    self.target_label(reply.type_atom)
                );
                return Err(refused());
            }
        };
        self.host.dib_from_pixmap(pixmap).ok_or_else(|| {
            warn!("Cannot read pixmap {:#x} back as a DIB", pixmap);
            refused()
        })
    }

    /// Fetches one format from the peer owning `selection` and caches it.
    ///
    /// A DIB is asked for through its passthrough target first, then as a
    /// `PIXMAP`, which is all most peers offer for images.
    pub(crate) fn import_format(&self, selection: Atom, id: FormatId) -> Result<ClipData, ClipboardError> {
        let target = self
            .targets
            .atom_for_format(&self.host, self.registry(), id)?;
        let wire = match self.fetch_bytes(selection, target) {
            Err(ClipboardError::ConversionRefused { .. }) if id == CF_DIB => {
                debug!("{} refused; asking for PIXMAP", self.target_label(target));
                self.fetch_pixmap_dib(selection)?
            }
            other => other?,
        };
        let data = self.decode_import(id, wire)?;

        let mut state = self.lock();
        if state.claims.mask().is_empty() {
            state.store.declare_host(id);
            state.store.fill(id, data.clone());
        }
        debug!("Imported {} ({} bytes) from the host", self.registry().describe(id), data.len());
        Ok(data)
    }

    /// `import_format`, falling back to fetching the alias partner and
    /// recoding it. A timeout is never retried through the partner.
    pub(crate) fn import_with_alias(&self, selection: Atom, id: FormatId) -> Result<ClipData, ClipboardError> {
        let error = match self.import_format(selection, id) {
            Ok(data) => return Ok(data),
            Err(error) => error,
        };
        let Some(partner) = alias_partner(id) else {
            return Err(error);
        };
        if error.is_retryable() {
            return Err(error);
        }
        let partner_data = self.import_format(selection, partner)?;
        let mut state = self.lock();
        if let Some(data) = state.store.synthesize_alias(id) {
            return Ok(data);
        }
        // Not cached (we claimed meanwhile); recode without storing.
        let recoded = match id {
            CF_TEXT => text::oem_to_ansi(&partner_data),
            _ => text::ansi_to_oem(&partner_data),
        };
        Ok(ClipData::from(recoded))
    }

    /// Records what the peer owning the selection offers.
    ///
    /// Asks for `TARGETS` and declares every advertised format as a
    /// host-origin record without fetching it. Owners that refuse `TARGETS`
    /// are probed for `STRING`. Does nothing when no peer owns a selection.
    pub(crate) fn refresh_from_host(&self) -> Result<(), ClipboardError> {
        let Some(selection) = self.peer_selection() else {
            return Ok(());
        };
        let atoms = *self.atoms();

        let mut fetched_text = None;
        let advertised: Vec<FormatId> = match self.convert_selection_blocking(selection, atoms.targets) {
            Ok(reply) => {
                let Some(list) = reply.as_longs() else {
                    return Err(ClipboardError::ProtocolViolation(
                        "TARGETS reply is not an atom list".to_string(),
                    ));
                };
                let limit = self.service.config().max_property_longs;
                let mut formats = Vec::new();
                for target in list.iter().take(limit) {
                    if let Some(id) = self.targets.format_for_advertised(&self.host, self.registry(), *target) {
                        if id != INVALID_FORMAT && !formats.contains(&id) {
                            formats.push(id);
                        }
                    }
                }
                formats
            }
            Err(ClipboardError::ConversionRefused { .. }) => {
                debug!("Selection owner does not support TARGETS; probing STRING");
                match self.fetch_bytes(selection, atoms.string) {
                    Ok(wire) => {
                        fetched_text = Some(self.decode_import(CF_TEXT, wire)?);
                        vec![CF_TEXT]
                    }
                    Err(ClipboardError::ConversionRefused { .. }) => Vec::new(),
                    Err(other) => return Err(other),
                }
            }
            Err(other) => return Err(other),
        };

        let mut state = self.lock();
        if !state.claims.mask().is_empty() {
            trace!("Selection claimed during the TARGETS probe; keeping local contents");
            return Ok(());
        }
        state.store.clear_origin(DataOrigin::Host);
        for id in &advertised {
            state.store.declare_host(*id);
        }
        if let Some(data) = fetched_text {
            state.store.fill(CF_TEXT, data);
        }
        trace!("Host selection offers {} formats", advertised.len());
        Ok(())
    }
}
