//! Module instances and connections.
//!
//! A [`Module`] is a named instance in the design tree. Each child belongs to
//! exactly one parent; the tree is rooted at [`Design::top`](crate::Design::top).

use crate::ids::{ArrayId, ModuleId, RuleId, SignalId};
use ember_common::Ident;
use serde::{Deserialize, Serialize};

/// A connection stating that two signals name the same storage.
///
/// Connections are undirected. A connection declared in a module may join
/// that module's own signals and the ports of its direct children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    /// One endpoint.
    pub a: SignalId,
    /// The other endpoint.
    pub b: SignalId,
}

/// A module instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    /// Instance name, unique among siblings.
    pub name: Ident,
    /// The owning parent, `None` only for the top module.
    pub parent: Option<ModuleId>,
    /// Child instances in declaration order.
    #[serde(default)]
    pub children: Vec<ModuleId>,
    /// Declared signals in declaration order (ports first by convention).
    #[serde(default)]
    pub signals: Vec<SignalId>,
    /// Declared signal arrays.
    #[serde(default)]
    pub arrays: Vec<ArrayId>,
    /// Connections declared in this module.
    #[serde(default)]
    pub connections: Vec<Connection>,
    /// Update rules attached to this module.
    #[serde(default)]
    pub rules: Vec<RuleId>,
}

impl Module {
    /// Creates an empty module instance.
    pub fn new(name: Ident, parent: Option<ModuleId>) -> Self {
        Self {
            name,
            parent,
            children: Vec::new(),
            signals: Vec::new(),
            arrays: Vec::new(),
            connections: Vec::new(),
            rules: Vec::new(),
        }
    }
}
