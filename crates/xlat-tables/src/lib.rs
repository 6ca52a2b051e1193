//! Boot-time translation tables.
//!
//! A [`Context`] collects the memory regions of one translation regime,
//! builds the table tree for all of them in [`Context::init`] and, with the
//! `dynamic` feature, maps and unmaps further regions while the tables are
//! live. Table memory comes from a fixed pool inside the context; nothing is
//! allocated at runtime.
//!
//! Descriptor encoding and cache/TLB maintenance are supplied through the
//! [`DescriptorCodec`] and [`ArchOps`] traits.
#![no_std]

mod action;
mod context;
mod dump;
mod global;
mod map;
mod pool;
mod query;
mod region;
mod registry;
mod tree;
#[cfg(feature = "dynamic")]
mod unmap;

pub use action::*;
pub use context::Context;
pub use dump::{WalkEntry, WalkInfo};
pub use global::GlobalContext;
pub use pool::{RegionCounts, Table, TablePool};
pub use query::Translation;
pub use region::*;
pub use registry::{Limits, Registry};
pub use xlat_interface::*;
