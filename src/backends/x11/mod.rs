// src/backends/x11/mod.rs

//! Xlib implementation of `HostDisplay`.
//!
//! Each `XHost` opens its own display connection with a private selection
//! window. Xlib displays are not shared across threads, so a thread that
//! services clipboard traffic attaches its own `XHost` to the shared
//! `ClipboardService`.

pub mod connection;
pub mod event;
pub mod pixmap;

use std::ffi::{CStr, CString};
use std::ptr;

use anyhow::{anyhow, Context, Result};
use libc::{c_char, c_int, c_long, c_uchar, c_ulong, c_void};
use log::{trace, warn};
use x11::xlib;

use self::connection::Connection;
use crate::host::{Atom, HostDisplay, HostEvent, Property, PropertyValue, SelectionNotify, WindowId};

/// A host connection backed by Xlib.
#[derive(Debug)]
pub struct XHost {
    connection: Connection,
}

impl XHost {
    /// Opens the display named by `DISPLAY` and creates the selection window.
    pub fn open() -> Result<Self> {
        let connection = Connection::new().context("Failed to open the X11 selection connection")?;
        Ok(XHost { connection })
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    fn display(&self) -> *mut xlib::Display {
        self.connection.display()
    }
}

impl HostDisplay for XHost {
    fn intern_atom(&self, name: &str) -> Result<Atom> {
        let atom_name = CString::new(name)
            .with_context(|| format!("Failed to create CString for atom name '{}'", name))?;
        let atom = unsafe { xlib::XInternAtom(self.display(), atom_name.as_ptr() as *const c_char, xlib::False) };
        if atom == 0 {
            Err(anyhow!("Failed to intern X11 atom: {}", name))
        } else {
            Ok(atom)
        }
    }

    fn atom_name(&self, atom: Atom) -> Option<String> {
        if atom == 0 {
            return None;
        }
        // SAFETY: XGetAtomName returns an Xlib-allocated C string or null.
        unsafe {
            let raw = xlib::XGetAtomName(self.display(), atom);
            if raw.is_null() {
                return None;
            }
            let name = CStr::from_ptr(raw).to_string_lossy().into_owned();
            xlib::XFree(raw as *mut c_void);
            Some(name)
        }
    }

    fn selection_window(&self) -> WindowId {
        self.connection.window()
    }

    fn set_selection_owner(&self, selection: Atom, owner: WindowId) {
        unsafe {
            xlib::XSetSelectionOwner(self.display(), selection, owner, xlib::CurrentTime);
        }
    }

    fn selection_owner(&self, selection: Atom) -> WindowId {
        unsafe { xlib::XGetSelectionOwner(self.display(), selection) }
    }

    fn convert_selection(&self, selection: Atom, target: Atom, property: Atom, requestor: WindowId) {
        unsafe {
            xlib::XConvertSelection(
                self.display(),
                selection,
                target,
                property,
                requestor,
                xlib::CurrentTime,
            );
        }
    }

    fn change_property(&self, window: WindowId, property: Atom, value: &Property) {
        let display = self.display();
        match &value.value {
            PropertyValue::Bytes(bytes) => unsafe {
                xlib::XChangeProperty(
                    display,
                    window,
                    property,
                    value.type_atom,
                    8,
                    xlib::PropModeReplace,
                    bytes.as_ptr() as *const c_uchar,
                    bytes.len() as c_int,
                );
            },
            PropertyValue::Longs(items) => {
                // Format-32 data is passed to Xlib as an array of C longs.
                let longs: Vec<c_ulong> = items.iter().map(|item| *item as c_ulong).collect();
                unsafe {
                    xlib::XChangeProperty(
                        display,
                        window,
                        property,
                        value.type_atom,
                        32,
                        xlib::PropModeReplace,
                        longs.as_ptr() as *const c_uchar,
                        longs.len() as c_int,
                    );
                }
            }
        }
        trace!(
            "XChangeProperty(window: {:#x}, property: {}, type: {}, {} items)",
            window,
            property,
            value.type_atom,
            value.value.len()
        );
    }

    fn get_property(&self, window: WindowId, property: Atom, delete: bool) -> Option<Property> {
        let mut actual_type: xlib::Atom = 0;
        let mut actual_format: c_int = 0;
        let mut nitems: c_ulong = 0;
        let mut bytes_after: c_ulong = 0;
        let mut data: *mut c_uchar = ptr::null_mut();

        let status = unsafe {
            xlib::XGetWindowProperty(
                self.display(),
                window,
                property,
                0,
                c_long::MAX / 4,
                if delete { xlib::True } else { xlib::False },
                xlib::AnyPropertyType as xlib::Atom,
                &mut actual_type,
                &mut actual_format,
                &mut nitems,
                &mut bytes_after,
                &mut data,
            )
        };
        if status != xlib::Success as c_int {
            warn!("XGetWindowProperty failed with status {}", status);
            return None;
        }
        if actual_type == 0 {
            // The property does not exist.
            if !data.is_null() {
                unsafe { xlib::XFree(data as *mut c_void) };
            }
            return None;
        }
        if bytes_after != 0 {
            warn!("Property {} truncated; {} bytes left unread", property, bytes_after);
        }

        let count = nitems as usize;
        let value = if data.is_null() || count == 0 {
            match actual_format {
                32 => PropertyValue::Longs(Vec::new()),
                _ => PropertyValue::Bytes(Vec::new()),
            }
        } else {
            // SAFETY: Xlib returns `nitems` items of `actual_format` width;
            // format-32 items are stored as C longs.
            unsafe {
                match actual_format {
                    8 => PropertyValue::Bytes(std::slice::from_raw_parts(data, count).to_vec()),
                    16 => {
                        let shorts = std::slice::from_raw_parts(data as *const libc::c_short, count);
                        PropertyValue::Bytes(shorts.iter().flat_map(|s| (*s as u16).to_le_bytes()).collect())
                    }
                    32 => {
                        let longs = std::slice::from_raw_parts(data as *const c_ulong, count);
                        PropertyValue::Longs(longs.iter().map(|l| *l as u64 & 0xFFFF_FFFF).collect())
                    }
                    other => {
                        warn!("Property {} has unexpected format {}", property, other);
                        xlib::XFree(data as *mut c_void);
                        return None;
                    }
                }
            }
        };
        if !data.is_null() {
            unsafe { xlib::XFree(data as *mut c_void) };
        }
        Some(Property {
            type_atom: actual_type,
            value,
        })
    }

    fn delete_property(&self, window: WindowId, property: Atom) {
        unsafe {
            xlib::XDeleteProperty(self.display(), window, property);
        }
    }

    fn send_selection_notify(&self, notify: &SelectionNotify) {
        let mut response = event::selection_notify_event(self.display(), notify);
        unsafe {
            xlib::XSendEvent(
                self.display(),
                notify.requestor,
                xlib::False,
                xlib::NoEventMask,
                &mut response,
            );
        }
        trace!("Sent SelectionNotify to requestor {:#x}", notify.requestor);
    }

    fn poll_event(&self) -> Option<HostEvent> {
        let display = self.display();
        unsafe {
            if xlib::XPending(display) == 0 {
                return None;
            }
            let mut xevent: xlib::XEvent = std::mem::zeroed();
            xlib::XNextEvent(display, &mut xevent);
            Some(event::translate(&xevent))
        }
    }

    fn flush(&self) {
        unsafe {
            xlib::XFlush(self.display());
        }
    }

    fn create_pixmap_from_dib(&self, dib: &[u8]) -> Option<u64> {
        pixmap::create_pixmap(&self.connection, dib)
    }

    fn dib_from_pixmap(&self, pixmap: u64) -> Option<Vec<u8>> {
        pixmap::read_pixmap(&self.connection, pixmap)
    }
}
