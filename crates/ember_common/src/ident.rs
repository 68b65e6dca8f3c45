//! Interned names of modules, signals, rules, fields, and rule locals.

use std::fmt;

use lasso::ThreadedRodeo;
use serde::{Deserialize, Serialize};

/// An interned name.
///
/// Only meaningful together with the [`Interner`] of the design that created
/// it. Comparing two `Ident`s compares names without touching the strings.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Ident(u32);

impl Ident {
    /// Wraps a raw interner index. Used by tests and hand-built type tables.
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// The raw interner index.
    pub fn as_raw(self) -> u32 {
        self.0
    }
}

// SAFETY: `try_from_usize` only accepts values that fit in a `u32`, and
// `into_usize` widens losslessly, so the two directions round-trip.
unsafe impl lasso::Key for Ident {
    fn into_usize(self) -> usize {
        self.0 as usize
    }

    fn try_from_usize(int: usize) -> Option<Self> {
        u32::try_from(int).ok().map(Ident)
    }
}

/// Name table owned by a design and serialized with it.
///
/// Builders on several threads may intern concurrently. A design loaded from
/// JSON gets back the same table, so stored `Ident`s keep their meaning.
#[derive(Serialize, Deserialize)]
pub struct Interner {
    rodeo: ThreadedRodeo<Ident>,
}

impl Interner {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            rodeo: ThreadedRodeo::new(),
        }
    }

    /// Returns the `Ident` for `s`, adding it on first use.
    pub fn get_or_intern(&self, s: &str) -> Ident {
        self.rodeo.get_or_intern(s)
    }

    /// The string behind `ident`.
    ///
    /// # Panics
    ///
    /// Panics if `ident` came from another table.
    pub fn resolve(&self, ident: Ident) -> &str {
        self.rodeo.resolve(&ident)
    }

    /// The string behind `ident`, or `None` if this table never issued it.
    pub fn try_resolve(&self, ident: Ident) -> Option<&str> {
        self.rodeo.try_resolve(&ident)
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Interner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Interner({} names)", self.rodeo.len())
    }
}
