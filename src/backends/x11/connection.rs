// src/backends/x11/connection.rs
#![allow(non_snake_case)]

use anyhow::{anyhow, Result};
use log::{debug, info, warn};
use std::mem;
use std::ptr;

use libc::{c_int, c_uint};
use x11::xlib;

/// Owns an Xlib display pointer and closes it on drop.
#[derive(Debug)]
struct ManagedDisplay {
    ptr: *mut xlib::Display,
}

impl ManagedDisplay {
    /// Opens the display named by `DISPLAY`.
    fn new() -> Result<Self> {
        let display_ptr = unsafe { xlib::XOpenDisplay(ptr::null()) };
        if display_ptr.is_null() {
            Err(anyhow!(
                "Failed to open X display. Check DISPLAY environment variable or X server status."
            ))
        } else {
            debug!("X display opened: {:p}", display_ptr);
            Ok(Self { ptr: display_ptr })
        }
    }

    #[inline]
    fn raw(&self) -> *mut xlib::Display {
        self.ptr
    }
}

impl Drop for ManagedDisplay {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            info!("Closing X11 display connection: {:p}", self.ptr);
            unsafe {
                let status = xlib::XCloseDisplay(self.ptr);
                if status != 0 {
                    warn!("XCloseDisplay returned non-zero status: {}", status);
                }
            }
        }
    }
}

/// One connection to the X server plus the unmapped window it uses to own
/// selections and receive conversion replies.
///
/// The window is `InputOnly` and never mapped; it only exists so the server
/// has somewhere to deliver `SelectionRequest`, `SelectionNotify` and
/// `PropertyNotify` events.
#[derive(Debug)]
pub struct Connection {
    managed_display: ManagedDisplay,
    screen: c_int,
    visual: *mut xlib::Visual,
    depth: c_int,
    window: xlib::Window,
}

impl Connection {
    pub fn new() -> Result<Self> {
        info!("Establishing X11 server connection for selection traffic.");
        let managed_display = ManagedDisplay::new()?;
        let display = managed_display.raw();

        let screen = unsafe { xlib::XDefaultScreen(display) };
        let visual = unsafe { xlib::XDefaultVisual(display, screen) };
        if visual.is_null() {
            return Err(anyhow!("Failed to get default visual for screen {}.", screen));
        }
        let depth = unsafe { xlib::XDefaultDepth(display, screen) };
        debug!("Default screen {} (depth {}), visual {:p}", screen, depth, visual);

        let window = unsafe {
            let root = xlib::XRootWindow(display, screen);
            let mut attributes: xlib::XSetWindowAttributes = mem::zeroed();
            attributes.event_mask = xlib::PropertyChangeMask;
            xlib::XCreateWindow(
                display,
                root,
                -1,
                -1,
                1,
                1,
                0,
                0, // CopyFromParent depth, required for InputOnly
                xlib::InputOnly as c_uint,
                ptr::null_mut(),
                xlib::CWEventMask,
                &mut attributes,
            )
        };
        if window == 0 {
            return Err(anyhow!("XCreateWindow failed for the selection window"));
        }
        unsafe { xlib::XFlush(display) };
        info!("Selection window created (ID: {:#x})", window);

        Ok(Connection {
            managed_display,
            screen,
            visual,
            depth,
            window,
        })
    }

    /// Destroys the selection window and detaches from the display. The
    /// display itself is closed when the connection drops. Idempotent.
    pub fn cleanup(&mut self) -> Result<()> {
        let display = self.managed_display.ptr;
        if display.is_null() {
            info!("X11 selection connection already cleaned up.");
            return Ok(());
        }
        if self.window != 0 {
            unsafe {
                xlib::XDestroyWindow(display, self.window);
                xlib::XFlush(display);
            }
            debug!("Selection window {:#x} destroyed", self.window);
            self.window = 0;
        }
        unsafe { xlib::XCloseDisplay(display) };
        self.managed_display.ptr = ptr::null_mut();
        Ok(())
    }

    #[inline]
    pub fn display(&self) -> *mut xlib::Display {
        self.managed_display.raw()
    }

    #[inline]
    pub fn screen(&self) -> c_int {
        self.screen
    }

    #[inline]
    pub fn visual(&self) -> *mut xlib::Visual {
        self.visual
    }

    #[inline]
    pub fn depth(&self) -> c_int {
        self.depth
    }

    /// The selection owner/requestor window; 0 after `cleanup`.
    #[inline]
    pub fn window(&self) -> xlib::Window {
        self.window
    }

    pub fn is_open(&self) -> bool {
        !self.managed_display.ptr.is_null()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Err(e) = self.cleanup() {
            warn!("Error while closing the X11 selection connection: {:#}", e);
        }
    }
}
