//! Type system for FIL-S

pub mod type_system;

pub use type_system::{MessageDirection, TupleMember, Type, TypeId, TypeTable};
