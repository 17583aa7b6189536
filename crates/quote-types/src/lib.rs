//! Common types shared across the quote cluster crates
//!
//! This crate holds the quote record that travels from the fetchers,
//! through the quote channel, into the leader's store, together with the
//! routing discriminators and validation helpers every crate agrees on.

pub mod error;
pub mod quote;
pub mod routing;
pub mod validation;

pub use error::*;
pub use quote::*;
pub use routing::*;
pub use validation::*;
