//! Execution layer - readiness selection and dependency resolution.

#![warn(missing_docs)]

pub mod selector;
pub mod dependency;

pub use selector::{select_ready, ActionSelector, MesSelector, ReadyActionView};
pub use dependency::{ActionIndex, DependencyResolver, Resolution};
