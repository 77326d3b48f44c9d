// src/selection/mod.rs

//! Host selection plumbing for the clipboard.
//!
//! The modules here extend `Clipboard` with the host-facing halves of the
//! protocol: claiming and losing ownership (`claim`), answering peers
//! (`outbound`) and fetching from them (`requestor`). `atoms` and `targets`
//! hold the per-connection vocabulary; `composite` flattens the metafile
//! formats for transfer.

pub mod atoms;
pub mod claim;
pub mod composite;
mod outbound;
mod requestor;
pub mod targets;
