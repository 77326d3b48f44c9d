// src/backends/mod.rs

//! Host display implementations.

pub mod x11;

pub use x11::XHost;
