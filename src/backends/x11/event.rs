// src/backends/x11/event.rs

//! Conversion between Xlib selection events and `HostEvent`.

use std::mem;

use log::trace;
use x11::xlib;

use crate::host::{HostEvent, SelectionNotify, SelectionRequest};

/// Translates one Xlib event. Event types the clipboard has no use for come
/// back as `HostEvent::Other`.
pub fn translate(xevent: &xlib::XEvent) -> HostEvent {
    let event_type = xevent.get_type();
    match event_type {
        xlib::SelectionRequest => {
            // SAFETY: the union member matches the event type.
            let req = unsafe { xevent.selection_request };
            HostEvent::SelectionRequest(SelectionRequest {
                owner: req.owner,
                requestor: req.requestor,
                selection: req.selection,
                target: req.target,
                property: req.property,
                time: req.time,
            })
        }
        xlib::SelectionNotify => {
            let sel = unsafe { xevent.selection };
            HostEvent::SelectionNotify(SelectionNotify {
                requestor: sel.requestor,
                selection: sel.selection,
                target: sel.target,
                property: sel.property,
                time: sel.time,
            })
        }
        xlib::SelectionClear => {
            let clear = unsafe { xevent.selection_clear };
            HostEvent::SelectionClear {
                window: clear.window,
                selection: clear.selection,
                time: clear.time,
            }
        }
        xlib::PropertyNotify => {
            let prop = unsafe { xevent.property };
            HostEvent::PropertyNotify {
                window: prop.window,
                atom: prop.atom,
                deleted: prop.state == xlib::PropertyDelete,
            }
        }
        other => {
            trace!("Unhandled X event type {}", other);
            HostEvent::Other(other)
        }
    }
}

/// Builds the `SelectionNotify` an owner sends back with `XSendEvent`.
pub fn selection_notify_event(display: *mut xlib::Display, notify: &SelectionNotify) -> xlib::XEvent {
    let mut response: xlib::XSelectionEvent = unsafe { mem::zeroed() };
    response.type_ = xlib::SelectionNotify;
    response.display = display;
    response.requestor = notify.requestor;
    response.selection = notify.selection;
    response.target = notify.target;
    response.property = notify.property;
    response.time = notify.time;
    xlib::XEvent::from(response)
}
