//! The Ember model graph: the elaborated hardware design shared by the
//! simulator and the lowering engine.
//!
//! A [`Design`] is a tree of [`Module`] instances with exclusive ownership.
//! Modules own [`Signal`]s, [`SignalArray`]s, [`Connection`]s, and update
//! [`Rule`]s. Rule bodies are written in a small structured IR ([`Stmt`],
//! [`Expr`], [`Target`]). [`NetMap`] resolves connections to one storage net
//! per equivalence class.

#![warn(missing_docs)]

pub mod arena;
pub mod builder;
pub mod design;
pub mod error;
pub mod expr;
pub mod ids;
pub mod module;
pub mod net;
pub mod rule;
pub mod signal;
pub mod stmt;
pub mod types;
mod validate;

pub use arena::{Arena, ArenaId};
pub use builder::DesignBuilder;
pub use design::Design;
pub use error::ElabError;
pub use expr::{BinaryOp, Expr, UnaryOp};
pub use ids::{ArrayId, ModuleId, NetId, RuleId, SignalId, TypeId};
pub use module::{Connection, Module};
pub use net::{Net, NetMap};
pub use rule::{Rule, RuleKind};
pub use signal::{PortDirection, Signal, SignalArray, SignalKind};
pub use stmt::{Stmt, Target};
pub use types::{FieldInfo, Type, TypeDb};
