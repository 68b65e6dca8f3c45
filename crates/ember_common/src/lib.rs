//! Shared foundational types used across the Ember hardware toolchain.
//!
//! This crate provides interned identifiers, the bit-width-tagged [`Bits`]
//! value type used by both the simulator and the lowering engine, and the
//! internal error type.

#![warn(missing_docs)]

pub mod bits;
pub mod ident;
pub mod result;

pub use bits::{Bits, BitsError};
pub use ident::{Ident, Interner};
pub use result::InternalError;
