//! Signal and signal-array definitions.
//!
//! A [`Signal`] is a named, fixed-width value container owned by one module.
//! A [`SignalArray`] groups signals of identical type so rules can select an
//! element by (possibly runtime) index.

use crate::ids::{ModuleId, SignalId, TypeId};
use ember_common::{Bits, Ident};
use serde::{Deserialize, Serialize};

/// The direction of a port on a module boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    /// Data flows into the module.
    Input,
    /// Data flows out of the module.
    Output,
}

/// The kind of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalKind {
    /// A port exposed at the module boundary.
    Port(PortDirection),
    /// An internal wire.
    Wire,
    /// A constant; its `init` value is its only driver.
    Constant,
}

impl SignalKind {
    /// Returns `true` for ports of either direction.
    pub fn is_port(self) -> bool {
        matches!(self, SignalKind::Port(_))
    }

    /// Returns `true` for input ports.
    pub fn is_input(self) -> bool {
        self == SignalKind::Port(PortDirection::Input)
    }
}

/// A signal within a module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    /// The signal name, unique within its module.
    pub name: Ident,
    /// The type of this signal.
    pub ty: TypeId,
    /// Port, wire, or constant.
    pub kind: SignalKind,
    /// The module that declares this signal.
    pub owner: ModuleId,
    /// Initial value; required for constants.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init: Option<Bits>,
}

/// A named list of signals with identical type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalArray {
    /// The array name, unique within its module.
    pub name: Ident,
    /// The module that declares this array.
    pub owner: ModuleId,
    /// The elements in index order.
    pub elements: Vec<SignalId>,
}

impl SignalArray {
    /// Returns the number of elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns `true` if the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}
