//! Storage abstraction and implementations for Chance.
//!
//! This crate provides a trait-based storage interface with a JSON file
//! reference implementation.

#![warn(missing_docs)]

pub mod trait_;
pub mod json_storage;

pub use trait_::{
    ActionFilter, BreakpointFilter, EntityKind, EventFilter, Result, Storage, StorageError,
};
pub use json_storage::JsonStorage;
