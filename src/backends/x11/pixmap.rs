// src/backends/x11/pixmap.rs

//! Moving images between packed DIBs and X pixmaps for `PIXMAP`
//! conversions, in both directions.

use std::ptr;

use libc::{c_char, c_int, c_uint, c_ulong};
use log::{debug, warn};
use x11::xlib;

use super::connection::Connection;

const BITMAPINFOHEADER_LEN: usize = 40;
const BI_RGB: u32 = 0;
const BI_BITFIELDS: u32 = 3;

/// A decoded DIB: top-down rows of `0x00RRGGBB` pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedDib {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u32>,
}

fn read_u16(bytes: &[u8], offset: usize) -> Option<u16> {
    Some(u16::from_le_bytes(bytes.get(offset..offset + 2)?.try_into().ok()?))
}

fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    Some(u32::from_le_bytes(bytes.get(offset..offset + 4)?.try_into().ok()?))
}

/// Decodes an uncompressed 24- or 32-bit packed DIB (a `BITMAPINFOHEADER`
/// followed by optional masks and the pixel rows).
pub fn decode_dib(dib: &[u8]) -> Option<DecodedDib> {
    let header_len = read_u32(dib, 0)? as usize;
    if header_len < BITMAPINFOHEADER_LEN {
        debug!("DIB header of {} bytes is not a BITMAPINFOHEADER", header_len);
        return None;
    }
    let width = read_u32(dib, 4)? as i32;
    let raw_height = read_u32(dib, 8)? as i32;
    let bit_count = read_u16(dib, 14)?;
    let compression = read_u32(dib, 16)?;
    if width <= 0 || raw_height == 0 {
        return None;
    }
    let bytes_per_pixel = match (bit_count, compression) {
        (24, BI_RGB) => 3,
        (32, BI_RGB) | (32, BI_BITFIELDS) => 4,
        _ => {
            debug!("Unsupported DIB: {} bpp, compression {}", bit_count, compression);
            return None;
        }
    };
    let masks_len = if compression == BI_BITFIELDS && header_len == BITMAPINFOHEADER_LEN {
        12
    } else {
        0
    };

    let width = width.unsigned_abs();
    let height = raw_height.unsigned_abs();
    let bottom_up = raw_height > 0;
    let stride = (width as usize * bytes_per_pixel + 3) & !3;
    let offset = header_len + masks_len;
    let rows = dib.get(offset..offset.checked_add(stride.checked_mul(height as usize)?)?)?;

    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height as usize {
        let source_row = if bottom_up { height as usize - 1 - y } else { y };
        let row = &rows[source_row * stride..source_row * stride + width as usize * bytes_per_pixel];
        for pixel in row.chunks_exact(bytes_per_pixel) {
            let (b, g, r) = (pixel[0] as u32, pixel[1] as u32, pixel[2] as u32);
            pixels.push((r << 16) | (g << 8) | b);
        }
    }
    Some(DecodedDib {
        width,
        height,
        pixels,
    })
}

/// Encodes pixels as a top-down 32-bit `BI_RGB` packed DIB.
pub fn encode_dib(image: &DecodedDib) -> Vec<u8> {
    let image_size = image.pixels.len() * 4;
    let mut dib = Vec::with_capacity(BITMAPINFOHEADER_LEN + image_size);
    dib.extend_from_slice(&(BITMAPINFOHEADER_LEN as u32).to_le_bytes());
    dib.extend_from_slice(&(image.width as i32).to_le_bytes());
    // Negative height marks the rows as top-down.
    dib.extend_from_slice(&(-(image.height as i32)).to_le_bytes());
    dib.extend_from_slice(&1u16.to_le_bytes());
    dib.extend_from_slice(&32u16.to_le_bytes());
    dib.extend_from_slice(&BI_RGB.to_le_bytes());
    dib.extend_from_slice(&(image_size as u32).to_le_bytes());
    dib.extend_from_slice(&[0; 16]);
    for pixel in &image.pixels {
        dib.extend_from_slice(&(pixel & 0x00FF_FFFF).to_le_bytes());
    }
    dib
}

/// Reads a pixmap owned by any client back as a packed DIB.
pub fn read_pixmap(connection: &Connection, pixmap: xlib::Pixmap) -> Option<Vec<u8>> {
    let display = connection.display();
    let mut root: xlib::Window = 0;
    let (mut x, mut y): (c_int, c_int) = (0, 0);
    let (mut width, mut height, mut border, mut depth): (c_uint, c_uint, c_uint, c_uint) = (0, 0, 0, 0);

    // SAFETY: `display` is live; the image is destroyed before returning and
    // pixels are copied out through XGetPixel.
    unsafe {
        let status = xlib::XGetGeometry(
            display,
            pixmap,
            &mut root,
            &mut x,
            &mut y,
            &mut width,
            &mut height,
            &mut border,
            &mut depth,
        );
        if status == 0 || width == 0 || height == 0 {
            warn!("XGetGeometry failed for pixmap {:#x}", pixmap);
            return None;
        }
        if depth != 24 && depth != 32 {
            warn!("Cannot read a depth-{} pixmap as a DIB", depth);
            return None;
        }
        let image = xlib::XGetImage(display, pixmap, 0, 0, width, height, !0 as c_ulong, xlib::ZPixmap);
        if image.is_null() {
            warn!("XGetImage failed for pixmap {:#x}", pixmap);
            return None;
        }
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for row in 0..height as c_int {
            for column in 0..width as c_int {
                pixels.push(xlib::XGetPixel(image, column, row) as u32 & 0x00FF_FFFF);
            }
        }
        xlib::XDestroyImage(image);
        debug!("Read {}x{} pixmap {:#x}", width, height, pixmap);
        Some(encode_dib(&DecodedDib {
            width,
            height,
            pixels,
        }))
    }
}

/// Uploads `dib` into a new pixmap on the default screen. The pixmap is
/// handed to the requestor and outlives this call.
pub fn create_pixmap(connection: &Connection, dib: &[u8]) -> Option<xlib::Pixmap> {
    let decoded = decode_dib(dib)?;
    let depth = connection.depth();
    if depth != 24 && depth != 32 {
        warn!("Cannot realize a DIB on a depth-{} screen", depth);
        return None;
    }
    let display = connection.display();
    let mut buffer: Vec<u8> = decoded.pixels.iter().flat_map(|p| p.to_ne_bytes()).collect();

    // SAFETY: `display` and `visual` come from a live connection; `buffer`
    // outlives the image, whose data pointer is detached before destruction.
    unsafe {
        let pixmap = xlib::XCreatePixmap(
            display,
            connection.window(),
            decoded.width as c_uint,
            decoded.height as c_uint,
            depth as c_uint,
        );
        if pixmap == 0 {
            warn!("XCreatePixmap failed");
            return None;
        }
        let image = xlib::XCreateImage(
            display,
            connection.visual(),
            depth as c_uint,
            xlib::ZPixmap,
            0,
            buffer.as_mut_ptr() as *mut c_char,
            decoded.width as c_uint,
            decoded.height as c_uint,
            32,
            0,
        );
        if image.is_null() {
            warn!("XCreateImage failed");
            xlib::XFreePixmap(display, pixmap);
            return None;
        }
        let gc = xlib::XCreateGC(display, pixmap, 0, ptr::null_mut());
        xlib::XPutImage(
            display,
            pixmap,
            gc,
            image,
            0,
            0,
            0,
            0,
            decoded.width as c_uint,
            decoded.height as c_uint,
        );
        xlib::XFreeGC(display, gc);
        (*image).data = ptr::null_mut(); // Don't let XDestroyImage free our Rust buffer
        xlib::XDestroyImage(image);
        xlib::XFlush(display);
        debug!(
            "Realized {}x{} DIB as pixmap {:#x}",
            decoded.width, decoded.height, pixmap
        );
        Some(pixmap)
    }
}
