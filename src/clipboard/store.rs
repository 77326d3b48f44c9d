// src/clipboard/store.rs

//! Per-format clipboard contents.
//!
//! A format is present exactly when the store holds a record for it. A
//! present record may still lack bytes: either its owner declared it for
//! delayed rendering, or it was advertised by a host peer and has not been
//! fetched yet. `DataOrigin` tells the two apart.

use std::collections::HashMap;
use std::sync::Arc;

use log::trace;

use super::format::{FormatId, CF_OEMTEXT, CF_TEXT};
use super::text;

/// Immutable clipboard bytes, shared with callers without copying.
pub type ClipData = Arc<[u8]>;

/// Where a record's contents come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOrigin {
    /// Supplied by a local owner (possibly still waiting to be rendered).
    Local,
    /// Advertised by the host selection owner; fetched on demand.
    Host,
}

#[derive(Debug, Clone)]
pub struct FormatRecord {
    pub id: FormatId,
    data: Option<ClipData>,
    /// The bytes were synthesized from the alias partner.
    cached_alias: bool,
    origin: DataOrigin,
}

impl FormatRecord {
    pub fn data(&self) -> Option<&ClipData> {
        self.data.as_ref()
    }

    pub fn origin(&self) -> DataOrigin {
        self.origin
    }

    pub fn is_cached_alias(&self) -> bool {
        self.cached_alias
    }
}

/// The other half of the text/OEM-text pair.
pub fn alias_partner(id: FormatId) -> Option<FormatId> {
    match id {
        CF_TEXT => Some(CF_OEMTEXT),
        CF_OEMTEXT => Some(CF_TEXT),
        _ => None,
    }
}

#[derive(Debug, Default)]
pub struct FormatStore {
    records: HashMap<FormatId, FormatRecord>,
    /// Enumeration order: the order formats first became present.
    order: Vec<FormatId>,
}

impl FormatStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, record: FormatRecord) {
        let id = record.id;
        if self.records.insert(id, record).is_none() {
            self.order.push(id);
        }
    }

    fn remove(&mut self, id: FormatId) {
        if self.records.remove(&id).is_some() {
            self.order.retain(|present| *present != id);
        }
    }

    /// Drops a synthesized partner of `id`, if any.
    fn invalidate_derived(&mut self, id: FormatId) {
        if let Some(partner) = alias_partner(id) {
            if self.records.get(&partner).map_or(false, |r| r.cached_alias) {
                trace!("Invalidating cached alias {:#06x} derived from {:#06x}", partner, id);
                self.remove(partner);
            }
        }
    }

    /// Stores local data for `id`, replacing any previous record. `None`
    /// declares the format for delayed rendering.
    pub fn set(&mut self, id: FormatId, data: Option<ClipData>) {
        self.invalidate_derived(id);
        self.insert(FormatRecord {
            id,
            data,
            cached_alias: false,
            origin: DataOrigin::Local,
        });
    }

    /// Records a format a host peer advertised, without its bytes.
    pub fn declare_host(&mut self, id: FormatId) {
        if !self.records.contains_key(&id) {
            self.insert(FormatRecord {
                id,
                data: None,
                cached_alias: false,
                origin: DataOrigin::Host,
            });
        }
    }

    /// Supplies the bytes for an already present record, keeping its origin.
    /// Returns false if the format is not present.
    pub fn fill(&mut self, id: FormatId, data: ClipData) -> bool {
        let filled = match self.records.get_mut(&id) {
            Some(record) => {
                record.data = Some(data);
                true
            }
            None => false,
        };
        if filled {
            self.invalidate_derived(id);
        }
        filled
    }

    pub fn record(&self, id: FormatId) -> Option<&FormatRecord> {
        self.records.get(&id)
    }

    pub fn contains(&self, id: FormatId) -> bool {
        self.records.contains_key(&id)
    }

    pub fn data(&self, id: FormatId) -> Option<ClipData> {
        self.records.get(&id).and_then(|r| r.data.clone())
    }

    /// Declared by a local owner but not rendered yet.
    pub fn is_delayed(&self, id: FormatId) -> bool {
        self.records
            .get(&id)
            .map_or(false, |r| r.origin == DataOrigin::Local && r.data.is_none())
    }

    /// Advertised by the host but not fetched yet.
    pub fn needs_fetch(&self, id: FormatId) -> bool {
        self.records
            .get(&id)
            .map_or(false, |r| r.origin == DataOrigin::Host && r.data.is_none())
    }

    /// Builds `id` from its alias partner and caches the result on `id`.
    ///
    /// The partner record is only read. Returns `None` when `id` is not part
    /// of the pair, is already present, or the partner has no bytes.
    pub fn synthesize_alias(&mut self, id: FormatId) -> Option<ClipData> {
        let partner = alias_partner(id)?;
        if self.records.contains_key(&id) {
            return None;
        }
        let source = self.records.get(&partner)?;
        let bytes = source.data.as_ref()?;
        let origin = source.origin;
        let recoded: ClipData = match id {
            CF_OEMTEXT => text::ansi_to_oem(bytes),
            _ => text::oem_to_ansi(bytes),
        }
        .into();
        trace!("Synthesized {:#06x} from {:#06x} ({} bytes)", id, partner, recoded.len());
        self.insert(FormatRecord {
            id,
            data: Some(recoded.clone()),
            cached_alias: true,
            origin,
        });
        Some(recoded)
    }

    /// Whether `id` could be produced from its partner without a fetch.
    pub fn can_synthesize(&self, id: FormatId) -> bool {
        alias_partner(id).map_or(false, |partner| {
            !self.records.contains_key(&id) && self.records.contains_key(&partner)
        })
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.order.clear();
    }

    /// Removes every record of the given origin.
    pub fn clear_origin(&mut self, origin: DataOrigin) {
        self.records.retain(|_, r| r.origin != origin);
        let records = &self.records;
        self.order.retain(|id| records.contains_key(id));
    }

    /// Every format a reader can ask for, in enumeration order: the present
    /// records, then the alias partner of a present text format.
    pub fn available(&self) -> Vec<FormatId> {
        let mut ids = self.order.clone();
        for id in &self.order {
            if let Some(partner) = alias_partner(*id) {
                if !ids.contains(&partner) {
                    ids.push(partner);
                }
            }
        }
        ids
    }

    pub fn delayed_ids(&self) -> Vec<FormatId> {
        self.order
            .iter()
            .copied()
            .filter(|id| self.is_delayed(*id))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::format::{CF_DIB, CF_UNICODETEXT};
    use test_log::test;

    fn data(bytes: &[u8]) -> Option<ClipData> {
        Some(ClipData::from(bytes))
    }

    #[test]
    fn it_should_return_stored_bytes_unchanged() {
        let mut store = FormatStore::new();
        store.set(CF_DIB, data(&[1, 2, 3, 0, 255]));
        assert_eq!(store.data(CF_DIB).as_deref(), Some(&[1u8, 2, 3, 0, 255][..]));
    }

    #[test]
    fn it_should_synthesize_oem_text_without_touching_the_source() {
        let mut store = FormatStore::new();
        store.set(CF_TEXT, data(&[0xE9, 0]));
        let oem = store.synthesize_alias(CF_OEMTEXT).unwrap();
        assert_eq!(&oem[..], &[0x82, 0]);
        assert_eq!(store.data(CF_TEXT).as_deref(), Some(&[0xE9u8, 0][..]));
        assert!(store.record(CF_OEMTEXT).unwrap().is_cached_alias());
        assert!(!store.record(CF_TEXT).unwrap().is_cached_alias());
    }

    #[test]
    fn it_should_invalidate_the_cached_alias_when_the_source_changes() {
        let mut store = FormatStore::new();
        store.set(CF_TEXT, data(b"a\0"));
        store.synthesize_alias(CF_OEMTEXT);
        store.set(CF_TEXT, data(b"b\0"));
        assert!(!store.contains(CF_OEMTEXT));
        assert_eq!(store.synthesize_alias(CF_OEMTEXT).as_deref(), Some(&b"b\0"[..]));
    }

    #[test]
    fn it_should_keep_a_directly_set_partner() {
        let mut store = FormatStore::new();
        store.set(CF_OEMTEXT, data(b"oem\0"));
        store.set(CF_TEXT, data(b"ansi\0"));
        assert_eq!(store.data(CF_OEMTEXT).as_deref(), Some(&b"oem\0"[..]));
        assert_eq!(store.synthesize_alias(CF_OEMTEXT), None);
    }

    #[test]
    fn it_should_list_the_alias_partner_once() {
        let mut store = FormatStore::new();
        store.set(CF_UNICODETEXT, None);
        store.set(CF_TEXT, data(b"x\0"));
        assert_eq!(store.available(), vec![CF_UNICODETEXT, CF_TEXT, CF_OEMTEXT]);
        store.synthesize_alias(CF_OEMTEXT);
        assert_eq!(store.available(), vec![CF_UNICODETEXT, CF_TEXT, CF_OEMTEXT]);
        assert_eq!(store.delayed_ids(), vec![CF_UNICODETEXT]);
    }

    #[test]
    fn it_should_clear_everything_and_stay_cleared() {
        let mut store = FormatStore::new();
        store.set(CF_TEXT, data(b"x\0"));
        store.declare_host(CF_DIB);
        store.clear();
        assert!(store.is_empty());
        store.clear();
        assert!(store.is_empty());
        assert!(store.available().is_empty());
    }

    #[test]
    fn it_should_drop_only_host_records() {
        let mut store = FormatStore::new();
        store.set(CF_TEXT, data(b"x\0"));
        store.declare_host(CF_DIB);
        assert!(store.needs_fetch(CF_DIB));
        assert!(store.fill(CF_DIB, ClipData::from(&[9u8][..])));
        assert!(!store.needs_fetch(CF_DIB));
        store.clear_origin(DataOrigin::Host);
        assert_eq!(store.available(), vec![CF_TEXT, CF_OEMTEXT]);
    }
}
