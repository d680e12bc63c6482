//! Shared types, adapter traits, and core utilities for the Warden server.
//!
//! This crate contains the foundational types that are shared between the
//! server crate, the feature crates, and all adapter implementations.
//! Extracting these into a separate crate allows adapter crates to compile
//! in parallel with the server's feature modules.

pub mod client;
pub mod error;
pub mod kv_adapter;
pub mod kv_key;
pub mod prelude;
pub mod rbac;
pub mod session;
pub mod store_adapter;
pub mod tenant;
pub mod types;
pub mod worker;

// vim: ts=4
