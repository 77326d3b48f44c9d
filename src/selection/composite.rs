// src/selection/composite.rs

//! Wire form of the two formats whose clipboard record only references a
//! graphics object.
//!
//! A `CF_METAFILEPICT` record is 16 bytes: mapping mode, x extent and y
//! extent (little-endian `i32`) followed by the metafile handle. On the wire
//! it becomes the 12-byte header followed by the metafile bits. A
//! `CF_ENHMETAFILE` record is just the handle; on the wire it is the
//! enhanced-metafile bits. A `CF_BITMAP` record is likewise a bare handle,
//! which only leaves the process as a DIB realized into a `PIXMAP`.

use log::{debug, warn};

use crate::clipboard::format::{FormatId, CF_ENHMETAFILE, CF_METAFILEPICT};
use crate::host::GraphicsBridge;

pub const METAFILEPICT_HEADER_LEN: usize = 12;
pub const METAFILEPICT_RECORD_LEN: usize = METAFILEPICT_HEADER_LEN + 4;
pub const ENHMETAFILE_RECORD_LEN: usize = 4;

pub fn is_composite(id: FormatId) -> bool {
    id == CF_METAFILEPICT || id == CF_ENHMETAFILE
}

fn read_handle(bytes: &[u8], offset: usize) -> Option<u32> {
    let raw: [u8; 4] = bytes.get(offset..offset + 4)?.try_into().ok()?;
    Some(u32::from_le_bytes(raw))
}

/// Flattens a composite record into one transferable buffer.
pub fn serialize(id: FormatId, record: &[u8], graphics: &dyn GraphicsBridge) -> Option<Vec<u8>> {
    match id {
        CF_METAFILEPICT => {
            let handle = read_handle(record, METAFILEPICT_HEADER_LEN)?;
            let Some(bits) = graphics.metafile_bits(handle) else {
                warn!("No metafile bits for handle {:#x}", handle);
                return None;
            };
            let mut buffer = Vec::with_capacity(METAFILEPICT_HEADER_LEN + bits.len());
            buffer.extend_from_slice(&record[..METAFILEPICT_HEADER_LEN]);
            buffer.extend_from_slice(&bits);
            Some(buffer)
        }
        CF_ENHMETAFILE => {
            let handle = read_handle(record, 0)?;
            let bits = graphics.enh_metafile_bits(handle);
            if bits.is_none() {
                warn!("No enhanced metafile bits for handle {:#x}", handle);
            }
            bits
        }
        _ => Some(record.to_vec()),
    }
}

/// The packed DIB behind a `CF_BITMAP` record.
pub fn bitmap_dib(record: &[u8], graphics: &dyn GraphicsBridge) -> Option<Vec<u8>> {
    let handle = read_handle(record, 0)?;
    let dib = graphics.bitmap_dib(handle);
    if dib.is_none() {
        debug!("Bitmap handle {:#x} has no DIB", handle);
    }
    dib
}

/// Rebuilds a local composite record from its wire form.
pub fn deserialize(id: FormatId, wire: &[u8], graphics: &dyn GraphicsBridge) -> Option<Vec<u8>> {
    match id {
        CF_METAFILEPICT => {
            if wire.len() < METAFILEPICT_HEADER_LEN {
                warn!("METAFILEPICT payload of {} bytes is too short", wire.len());
                return None;
            }
            let handle = graphics.create_metafile(&wire[METAFILEPICT_HEADER_LEN..])?;
            let mut record = Vec::with_capacity(METAFILEPICT_RECORD_LEN);
            record.extend_from_slice(&wire[..METAFILEPICT_HEADER_LEN]);
            record.extend_from_slice(&handle.to_le_bytes());
            Some(record)
        }
        CF_ENHMETAFILE => graphics
            .create_enh_metafile(wire)
            .map(|handle| handle.to_le_bytes().to_vec()),
        _ => Some(wire.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::format::CF_DIB;
    use crate::host::mock::FakeGraphics;
    use crate::host::NullGraphics;
    use test_log::test;

    fn metafilepict(mm: i32, x: i32, y: i32, handle: u32) -> Vec<u8> {
        let mut record = Vec::new();
        record.extend_from_slice(&mm.to_le_bytes());
        record.extend_from_slice(&x.to_le_bytes());
        record.extend_from_slice(&y.to_le_bytes());
        record.extend_from_slice(&handle.to_le_bytes());
        record
    }

    #[test]
    fn it_should_inline_metafile_bits_after_the_header() {
        let graphics = FakeGraphics::default();
        let handle = graphics.insert(b"META");
        let record = metafilepict(8, 100, 200, handle);
        let wire = serialize(CF_METAFILEPICT, &record, &graphics).unwrap();
        assert_eq!(wire.len(), METAFILEPICT_HEADER_LEN + 4);
        assert_eq!(&wire[..12], &record[..12]);
        assert_eq!(&wire[12..], b"META");
    }

    #[test]
    fn it_should_rebuild_a_metafile_record_with_a_new_handle() {
        let graphics = FakeGraphics::default();
        let mut wire = metafilepict(8, 1, 2, 0)[..12].to_vec();
        wire.extend_from_slice(b"bits");
        let record = deserialize(CF_METAFILEPICT, &wire, &graphics).unwrap();
        assert_eq!(record.len(), METAFILEPICT_RECORD_LEN);
        let handle = u32::from_le_bytes(record[12..16].try_into().unwrap());
        assert_eq!(graphics.bits(handle).as_deref(), Some(&b"bits"[..]));
    }

    #[test]
    fn it_should_carry_enhanced_metafiles_as_bits() {
        let graphics = FakeGraphics::default();
        let handle = graphics.insert(b"EMF+");
        let wire = serialize(CF_ENHMETAFILE, &handle.to_le_bytes(), &graphics).unwrap();
        assert_eq!(wire, b"EMF+");
        assert!(deserialize(CF_ENHMETAFILE, &wire, &NullGraphics).is_none());
    }

    #[test]
    fn it_should_resolve_bitmap_handles_to_dibs() {
        let graphics = FakeGraphics::default();
        let handle = graphics.insert_bitmap(b"DIB!");
        assert_eq!(bitmap_dib(&handle.to_le_bytes(), &graphics), Some(b"DIB!".to_vec()));
        assert_eq!(bitmap_dib(&handle.to_le_bytes(), &NullGraphics), None);
        assert_eq!(bitmap_dib(&[1, 2], &graphics), None);
    }

    #[test]
    fn it_should_fail_on_truncated_records() {
        let graphics = FakeGraphics::default();
        assert!(serialize(CF_METAFILEPICT, &[0; 8], &graphics).is_none());
        assert!(deserialize(CF_METAFILEPICT, &[0; 4], &graphics).is_none());
        assert_eq!(serialize(CF_DIB, &[1, 2], &graphics), Some(vec![1, 2]));
        assert!(!is_composite(CF_DIB));
    }
}
