//! # Strata Core
//!
//! Foundation for the layered resolution engine: typed event emitters
//! and subscription lifecycle.

pub mod event;

pub use event::{Emitter, Subscription};
