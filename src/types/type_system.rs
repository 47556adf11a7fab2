//! FIL-S Type System
//!
//! Types are interned in a [`TypeTable`] and referred to by [`TypeId`].
//! The scalar types are fixed singletons; every declared tuple, actor,
//! function and message type gets its own id, so two declared types are
//! the same type only when they share an id.

use serde::{Deserialize, Serialize};

use crate::frontend::ast::NodeId;

/// Handle of a type inside a [`TypeTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeId(u32);

impl TypeId {
    /// The empty tuple
    pub const VOID: TypeId = TypeId(0);
    pub const INT: TypeId = TypeId(1);
    pub const BOOL: TypeId = TypeId(2);
    /// Opaque pointer handed to C code
    pub const C_POINTER: TypeId = TypeId(3);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Direction of a message type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageDirection {
    In,
    Out,
}

/// One member of a tuple or actor type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TupleMember {
    pub ty: TypeId,
    pub name: Option<String>,
}

impl TupleMember {
    pub fn new(ty: TypeId, name: Option<String>) -> Self {
        Self { ty, name }
    }

    pub fn unnamed(ty: TypeId) -> Self {
        Self { ty, name: None }
    }
}

/// A resolved FIL-S type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Type {
    Void,
    Int,
    Bool,
    CPointer,
    /// Ordered members. `decl` is the defining tuple-def node, `None` for
    /// anonymous tuples built from tuple literals.
    Tuple {
        members: Vec<TupleMember>,
        decl: Option<NodeId>,
    },
    Function {
        params: TypeId,
        ret: TypeId,
    },
    Actor {
        name: String,
        params: TypeId,
        members: Vec<TupleMember>,
        decl: NodeId,
    },
    Message {
        direction: MessageDirection,
        params: TypeId,
    },
    Array {
        element: TypeId,
        size: Option<i64>,
    },
}

/// Storage for every type created during analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeTable {
    types: Vec<Type>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self {
            types: vec![Type::Void, Type::Int, Type::Bool, Type::CPointer],
        }
    }

    pub fn get(&self, id: TypeId) -> &Type {
        &self.types[id.index()]
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    fn add(&mut self, ty: Type) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(ty);
        id
    }

    /// Create a tuple type. A tuple without members is always `Void`.
    pub fn tuple(&mut self, members: Vec<TupleMember>, decl: Option<NodeId>) -> TypeId {
        if members.is_empty() {
            return TypeId::VOID;
        }
        self.add(Type::Tuple { members, decl })
    }

    pub fn function(&mut self, params: TypeId, ret: TypeId) -> TypeId {
        self.add(Type::Function { params, ret })
    }

    pub fn message(&mut self, direction: MessageDirection, params: TypeId) -> TypeId {
        self.add(Type::Message { direction, params })
    }

    pub fn actor(&mut self, name: String, params: TypeId, members: Vec<TupleMember>, decl: NodeId) -> TypeId {
        self.add(Type::Actor { name, params, members, decl })
    }

    pub fn array(&mut self, element: TypeId, size: Option<i64>) -> TypeId {
        self.add(Type::Array { element, size })
    }

    // ==================== Queries ====================

    pub fn is_tuple(&self, id: TypeId) -> bool {
        matches!(self.get(id), Type::Tuple { .. })
    }

    /// Members of a tuple type; empty for anything else
    pub fn tuple_members(&self, id: TypeId) -> &[TupleMember] {
        match self.get(id) {
            Type::Tuple { members, .. } => members,
            _ => &[],
        }
    }

    /// Look up a named member of a tuple or actor type
    pub fn member_by_name(&self, id: TypeId, name: &str) -> Option<TypeId> {
        let members = match self.get(id) {
            Type::Tuple { members, .. } | Type::Actor { members, .. } => members,
            _ => return None,
        };
        members
            .iter()
            .find(|m| m.name.as_deref() == Some(name))
            .map(|m| m.ty)
    }

    /// Function, message and actor types can be called
    pub fn is_callable(&self, id: TypeId) -> bool {
        matches!(
            self.get(id),
            Type::Function { .. } | Type::Message { .. } | Type::Actor { .. }
        )
    }

    /// Parameter tuple of a callable type
    pub fn params_of(&self, id: TypeId) -> Option<TypeId> {
        match self.get(id) {
            Type::Function { params, .. }
            | Type::Message { params, .. }
            | Type::Actor { params, .. } => Some(*params),
            _ => None,
        }
    }

    /// Result type of calling a value of type `id`. Calling an actor
    /// yields an instance of that actor; sending a message yields nothing.
    pub fn call_result_of(&self, id: TypeId) -> Option<TypeId> {
        match self.get(id) {
            Type::Function { ret, .. } => Some(*ret),
            Type::Message { .. } => Some(TypeId::VOID),
            Type::Actor { .. } => Some(id),
            _ => None,
        }
    }

    /// Structural compatibility without any value adaptation.
    ///
    /// Identical ids are always compatible. Tuples match member by member,
    /// recursing into nested tuples; functions match on parameters and
    /// return type; messages on their parameter tuples. Scalars, actors
    /// and the remaining shapes only match themselves.
    pub fn compatible(&self, dest: TypeId, src: TypeId) -> bool {
        if dest == src {
            return true;
        }
        match (self.get(dest), self.get(src)) {
            (Type::Tuple { members: d, .. }, Type::Tuple { members: s, .. }) => {
                d.len() == s.len() && d.iter().zip(s).all(|(d, s)| self.compatible(d.ty, s.ty))
            }
            (Type::Function { params: dp, ret: dr }, Type::Function { params: sp, ret: sr }) => {
                self.compatible(*dp, *sp) && self.compatible(*dr, *sr)
            }
            (Type::Message { params: dp, .. }, Type::Message { params: sp, .. }) => {
                self.compatible(*dp, *sp)
            }
            (Type::Array { element: de, size: ds }, Type::Array { element: se, size: ss }) => {
                ds == ss && self.compatible(*de, *se)
            }
            _ => false,
        }
    }

    /// Human readable rendering, used in diagnostics
    pub fn display(&self, id: TypeId) -> String {
        match self.get(id) {
            Type::Void => "()".to_string(),
            Type::Int => "int".to_string(),
            Type::Bool => "bool".to_string(),
            Type::CPointer => "c_pointer".to_string(),
            Type::Tuple { members, .. } => {
                let parts: Vec<String> = members.iter().map(|m| self.display(m.ty)).collect();
                format!("({})", parts.join(","))
            }
            Type::Function { params, ret } => {
                format!("function{}:{}", self.display(*params), self.display(*ret))
            }
            Type::Actor { name, .. } => format!("actor {}", name),
            Type::Message { direction, params } => {
                let keyword = match direction {
                    MessageDirection::In => "input",
                    MessageDirection::Out => "output",
                };
                format!("{}{}", keyword, self.display(*params))
            }
            Type::Array { element, size } => match size {
                Some(size) => format!("{}[{}]", self.display(*element), size),
                None => format!("{}[]", self.display(*element)),
            },
        }
    }
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_tuple_is_void() {
        let mut table = TypeTable::new();
        assert_eq!(table.tuple(vec![], None), TypeId::VOID);
        assert_eq!(table.tuple(Vec::new(), Some(NodeId::new(7))), TypeId::VOID);
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn test_display() {
        let mut table = TypeTable::new();
        let inner = table.tuple(vec![TupleMember::unnamed(TypeId::INT); 2], None);
        let outer = table.tuple(
            vec![
                TupleMember::new(TypeId::INT, Some("a".to_string())),
                TupleMember::new(TypeId::BOOL, Some("b".to_string())),
                TupleMember::unnamed(inner),
            ],
            None,
        );
        assert_eq!(table.display(outer), "(int,bool,(int,int))");

        let func = table.function(inner, TypeId::INT);
        assert_eq!(table.display(func), "function(int,int):int");

        let procedure = table.function(TypeId::VOID, TypeId::VOID);
        assert_eq!(table.display(procedure), "function():()");

        let msg = table.message(MessageDirection::Out, inner);
        assert_eq!(table.display(msg), "output(int,int)");

        let arr = table.array(TypeId::BOOL, Some(4));
        assert_eq!(table.display(arr), "bool[4]");
    }

    #[test]
    fn test_nested_compatibility() {
        let mut table = TypeTable::new();
        let int_bool = table.tuple(vec![TupleMember::unnamed(TypeId::INT), TupleMember::unnamed(TypeId::BOOL)], None);
        let bool_int = table.tuple(vec![TupleMember::unnamed(TypeId::BOOL), TupleMember::unnamed(TypeId::INT)], None);
        let int_bool2 = table.tuple(vec![TupleMember::unnamed(TypeId::INT), TupleMember::unnamed(TypeId::BOOL)], None);

        let a = table.tuple(vec![TupleMember::unnamed(TypeId::INT), TupleMember::unnamed(int_bool)], Some(NodeId::new(1)));
        let b = table.tuple(vec![TupleMember::unnamed(TypeId::INT), TupleMember::unnamed(int_bool2)], Some(NodeId::new(2)));
        let c = table.tuple(vec![TupleMember::unnamed(TypeId::INT), TupleMember::unnamed(bool_int)], Some(NodeId::new(3)));

        assert_ne!(a, b);
        assert!(table.compatible(a, b));
        assert!(table.compatible(b, a));
        assert!(!table.compatible(a, c));
    }

    #[test]
    fn test_scalars_only_match_themselves() {
        let mut table = TypeTable::new();
        let single = table.tuple(vec![TupleMember::unnamed(TypeId::INT)], None);
        assert!(table.compatible(TypeId::INT, TypeId::INT));
        assert!(!table.compatible(TypeId::INT, TypeId::BOOL));
        assert!(!table.compatible(single, TypeId::INT));
        assert!(!table.compatible(TypeId::C_POINTER, single));
    }

    #[test]
    fn test_callables() {
        let mut table = TypeTable::new();
        let params = table.tuple(vec![TupleMember::unnamed(TypeId::INT)], None);
        let func = table.function(params, TypeId::BOOL);
        let msg = table.message(MessageDirection::In, params);

        assert!(table.is_callable(func));
        assert!(table.is_callable(msg));
        assert!(!table.is_callable(params));
        assert_eq!(table.call_result_of(func), Some(TypeId::BOOL));
        assert_eq!(table.call_result_of(msg), Some(TypeId::VOID));
        assert_eq!(table.params_of(msg), Some(params));
    }
}
