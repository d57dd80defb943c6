//! Durable record of every pipeline entity, backed by `sled`.
//!
//! Each entity gets its own tree, keyed by an 8-byte big-endian id so range
//! scans come back in id (and therefore insertion/time) order. Secondary
//! indexes live as extra keys in the same tree, marked with a prefix byte
//! that can never collide with a primary row's 8-byte id key — this keeps
//! `select_variant`, the one operation the design requires to be atomic
//! across multiple rows, inside a single-tree `sled` transaction instead of
//! needing sled's (more awkward) multi-tree transaction API.

mod keys;
mod store;

pub use store::{SelectVariantOutcome, Store};
