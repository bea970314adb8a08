//! Backend-agnostic file and reaction operations.
//!
//! Callers own a [`Session`] and the engines; each engine call asks the
//! [`AvailabilitySelector`] which record store to use for that one operation.

mod files;
mod reaction;
mod selector;
mod session;

pub use files::FileEngine;
pub use reaction::ReactionEngine;
pub use selector::{AvailabilitySelector, Backend, Served};
pub use session::Session;
