//! Assignment compatibility
//!
//! Every place where a value flows into a typed slot (declarations,
//! assignments, call arguments, returns, function bodies) is validated by
//! [`assign_check`]. It does not touch the tree: it returns the
//! [`Coercion`] needed to make the value fit, which a transform later
//! realizes with [`apply_coercion`].

use crate::frontend::ast::{Ast, AstNode, AstNodeKind, NodeId};
use crate::frontend::semantic::state::AnalysisState;
use crate::types::{Type, TypeId};
use crate::utils::{Error, Result};

/// Adaptation needed to store a value in a slot of another type
#[derive(Debug, Clone, PartialEq)]
pub enum Coercion {
    /// Value fits as is
    None,
    /// Reinterpret a same-shape tuple as the given tuple type
    TupleAdapter(TypeId),
    /// Pass a tuple by address to a `c_pointer` slot
    AddressOf,
    /// Wrap a scalar in a one-member tuple
    Promote { inner: Box<Coercion>, tuple: TypeId },
    /// Rebuild a tuple literal element by element
    Rebuild { elements: Vec<Coercion>, tuple: TypeId },
}

impl Coercion {
    pub fn is_identity(&self) -> bool {
        matches!(self, Coercion::None)
    }
}

/// Check that the value of `src` can be stored in a slot of type `dest`
pub fn assign_check(ast: &Ast, dest: TypeId, src: NodeId) -> Result<Coercion> {
    let types = ast.types();
    let src_ty = ast.data_type(src);
    let incompatible = || Error::IncompatibleTypes {
        from: types.display(src_ty),
        to: types.display(dest),
        pos: ast.pos(src),
    };

    match types.get(dest) {
        Type::Void => {
            if src_ty == TypeId::VOID {
                Ok(Coercion::None)
            } else {
                Err(incompatible())
            }
        }
        Type::Function { .. } => match types.get(src_ty) {
            Type::Function { .. } if types.compatible(dest, src_ty) => Ok(Coercion::None),
            _ => Err(incompatible()),
        },
        Type::Message { .. } => match types.get(src_ty) {
            Type::Message { .. } if types.compatible(dest, src_ty) => Ok(Coercion::None),
            _ => Err(incompatible()),
        },
        Type::Tuple { members, .. } => {
            if ast.kind(src) == AstNodeKind::Tuple {
                // No default values: widths must match exactly
                let elements = ast.child_ids(src);
                if elements.len() != members.len() {
                    return Err(incompatible());
                }
                let elements = elements
                    .iter()
                    .zip(members)
                    .map(|(element, member)| assign_check(ast, member.ty, *element))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Coercion::Rebuild { elements, tuple: dest })
            } else if types.is_tuple(src_ty) {
                if !types.compatible(dest, src_ty) {
                    Err(incompatible())
                } else if dest == src_ty {
                    Ok(Coercion::None)
                } else {
                    Ok(Coercion::TupleAdapter(dest))
                }
            } else if members.len() == 1 {
                let inner = assign_check(ast, members[0].ty, src).map_err(|_| incompatible())?;
                Ok(Coercion::Promote {
                    inner: Box::new(inner),
                    tuple: dest,
                })
            } else {
                Err(incompatible())
            }
        }
        Type::CPointer => {
            if src_ty == TypeId::C_POINTER {
                Ok(Coercion::None)
            } else if types.is_tuple(src_ty) {
                Ok(Coercion::AddressOf)
            } else {
                Err(incompatible())
            }
        }
        Type::Int | Type::Bool | Type::Actor { .. } | Type::Array { .. } => {
            if types.compatible(dest, src_ty) {
                Ok(Coercion::None)
            } else {
                Err(incompatible())
            }
        }
    }
}

/// Rewrite `node` according to `coercion` and return the node to store
/// in its slot
pub fn apply_coercion(state: &mut AnalysisState<'_>, node: NodeId, coercion: &Coercion) -> NodeId {
    match coercion {
        Coercion::None => node,
        Coercion::TupleAdapter(ty) => {
            log::trace!("tuple adapter to '{}' at {}", state.type_string(*ty), state.ast.pos(node));
            wrap(state, node, AstNodeKind::TupleAdapter, vec![Some(node)], *ty)
        }
        Coercion::AddressOf => {
            log::trace!("address of tuple at {}", state.ast.pos(node));
            wrap(state, node, AstNodeKind::GetAddress, vec![Some(node)], TypeId::C_POINTER)
        }
        Coercion::Promote { inner, tuple } => {
            let value = apply_coercion(state, node, inner);
            wrap(state, node, AstNodeKind::Tuple, vec![Some(value)], *tuple)
        }
        Coercion::Rebuild { elements, tuple } => {
            let children = state
                .ast
                .child_ids(node)
                .into_iter()
                .zip(elements)
                .map(|(element, coercion)| Some(apply_coercion(state, element, coercion)))
                .collect();
            wrap(state, node, AstNodeKind::Tuple, children, *tuple)
        }
    }
}

fn wrap(state: &mut AnalysisState<'_>, original: NodeId, kind: AstNodeKind, children: Vec<Option<NodeId>>, ty: TypeId) -> NodeId {
    let pos = state.ast.pos(original);
    let node = state.ast.add(AstNode::new(kind, pos).with_children(children));
    state.ast.set_data_type(node, ty);
    let scope = state.scope_of(original);
    state.set_scope(node, scope);
    node
}

/// Plan and apply the coercion of child `slot` of `parent` into `dest`.
/// Does nothing when the value does not fit; the check phase reports
/// that.
pub fn coerce_child(state: &mut AnalysisState<'_>, parent: NodeId, slot: usize, dest: TypeId) {
    let Some(child) = state.ast.child(parent, slot) else {
        return;
    };
    let Ok(coercion) = assign_check(state.ast, dest, child) else {
        return;
    };
    if coercion.is_identity() {
        return;
    }
    let replacement = apply_coercion(state, child, &coercion);
    state.ast.set_child(parent, slot, Some(replacement));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::semantic::state::ModuleMap;
    use crate::types::{MessageDirection, TupleMember};
    use crate::utils::Position;
    use pretty_assertions::assert_eq;

    fn typed(ast: &mut Ast, kind: AstNodeKind, ty: TypeId, children: Vec<Option<NodeId>>) -> NodeId {
        let node = ast.add(AstNode::new(kind, Position::new(1, 1)).with_children(children));
        ast.set_data_type(node, ty);
        node
    }

    fn tuple_type(ast: &mut Ast, members: &[TypeId]) -> TypeId {
        let members = members.iter().copied().map(TupleMember::unnamed).collect();
        ast.types_mut().tuple(members, None)
    }

    #[test]
    fn test_scalars_need_identity() {
        let mut ast = Ast::new();
        let value = typed(&mut ast, AstNodeKind::Integer, TypeId::INT, vec![]);
        assert_eq!(assign_check(&ast, TypeId::INT, value), Ok(Coercion::None));

        let err = assign_check(&ast, TypeId::BOOL, value).unwrap_err();
        assert!(matches!(err, Error::IncompatibleTypes { ref from, ref to, .. } if from == "int" && to == "bool"));
    }

    #[test]
    fn test_scalar_promotion_to_single_member_tuple() {
        let mut ast = Ast::new();
        let single = tuple_type(&mut ast, &[TypeId::INT]);
        let pair = tuple_type(&mut ast, &[TypeId::INT, TypeId::INT]);
        let value = typed(&mut ast, AstNodeKind::Identifier, TypeId::INT, vec![]);

        assert_eq!(
            assign_check(&ast, single, value),
            Ok(Coercion::Promote {
                inner: Box::new(Coercion::None),
                tuple: single
            })
        );
        assert!(matches!(assign_check(&ast, pair, value), Err(Error::IncompatibleTypes { .. })));
    }

    #[test]
    fn test_compatible_tuples_get_adapter() {
        let mut ast = Ast::new();
        let inner_a = tuple_type(&mut ast, &[TypeId::INT, TypeId::BOOL]);
        let inner_b = tuple_type(&mut ast, &[TypeId::INT, TypeId::BOOL]);
        let swapped = tuple_type(&mut ast, &[TypeId::BOOL, TypeId::INT]);
        let a = tuple_type(&mut ast, &[TypeId::INT, inner_a]);
        let b = tuple_type(&mut ast, &[TypeId::INT, inner_b]);
        let c = tuple_type(&mut ast, &[TypeId::INT, swapped]);
        let value = typed(&mut ast, AstNodeKind::Identifier, b, vec![]);

        assert_eq!(assign_check(&ast, b, value), Ok(Coercion::None));
        assert_eq!(assign_check(&ast, a, value), Ok(Coercion::TupleAdapter(a)));
        assert!(assign_check(&ast, c, value).is_err());
    }

    #[test]
    fn test_tuple_literal_is_rebuilt() {
        let mut ast = Ast::new();
        let single = tuple_type(&mut ast, &[TypeId::INT]);
        let dest = tuple_type(&mut ast, &[single, TypeId::BOOL]);
        let literal_ty = tuple_type(&mut ast, &[TypeId::INT, TypeId::BOOL]);
        let first = typed(&mut ast, AstNodeKind::Integer, TypeId::INT, vec![]);
        let second = typed(&mut ast, AstNodeKind::Bool, TypeId::BOOL, vec![]);
        let literal = typed(&mut ast, AstNodeKind::Tuple, literal_ty, vec![Some(first), Some(second)]);

        let coercion = assign_check(&ast, dest, literal).unwrap();
        assert_eq!(
            coercion,
            Coercion::Rebuild {
                elements: vec![
                    Coercion::Promote {
                        inner: Box::new(Coercion::None),
                        tuple: single
                    },
                    Coercion::None
                ],
                tuple: dest
            }
        );

        let modules = ModuleMap::new();
        let mut state = AnalysisState::new(&mut ast, &modules);
        let rebuilt = apply_coercion(&mut state, literal, &coercion);
        assert_ne!(rebuilt, literal);
        assert_eq!(state.ast.data_type(rebuilt), dest);

        let promoted = state.ast.child(rebuilt, 0).unwrap();
        assert_eq!(state.ast.kind(promoted), AstNodeKind::Tuple);
        assert_eq!(state.ast.data_type(promoted), single);
        assert_eq!(state.ast.child(promoted, 0), Some(first));
        assert_eq!(state.ast.child(rebuilt, 1), Some(second));
    }

    #[test]
    fn test_tuple_literal_width_must_match() {
        let mut ast = Ast::new();
        let dest = tuple_type(&mut ast, &[TypeId::INT, TypeId::INT, TypeId::INT]);
        let literal_ty = tuple_type(&mut ast, &[TypeId::INT, TypeId::INT]);
        let a = typed(&mut ast, AstNodeKind::Integer, TypeId::INT, vec![]);
        let b = typed(&mut ast, AstNodeKind::Integer, TypeId::INT, vec![]);
        let literal = typed(&mut ast, AstNodeKind::Tuple, literal_ty, vec![Some(a), Some(b)]);

        let err = assign_check(&ast, dest, literal).unwrap_err();
        assert!(matches!(err, Error::IncompatibleTypes { ref from, ref to, .. } if from == "(int,int)" && to == "(int,int,int)"));
    }

    #[test]
    fn test_c_pointer_takes_tuple_address() {
        let mut ast = Ast::new();
        let pair = tuple_type(&mut ast, &[TypeId::INT, TypeId::INT]);
        let value = typed(&mut ast, AstNodeKind::Identifier, pair, vec![]);
        let number = typed(&mut ast, AstNodeKind::Integer, TypeId::INT, vec![]);

        assert_eq!(assign_check(&ast, TypeId::C_POINTER, value), Ok(Coercion::AddressOf));
        assert!(assign_check(&ast, TypeId::C_POINTER, number).is_err());

        let modules = ModuleMap::new();
        let mut state = AnalysisState::new(&mut ast, &modules);
        let address = apply_coercion(&mut state, value, &Coercion::AddressOf);
        assert_eq!(state.ast.kind(address), AstNodeKind::GetAddress);
        assert_eq!(state.ast.data_type(address), TypeId::C_POINTER);
    }

    #[test]
    fn test_functions() {
        let mut ast = Ast::new();
        let params = tuple_type(&mut ast, &[TypeId::INT]);
        let other_params = tuple_type(&mut ast, &[TypeId::INT]);
        let f = ast.types_mut().function(params, TypeId::INT);
        let g = ast.types_mut().function(other_params, TypeId::INT);
        let h = ast.types_mut().function(params, TypeId::BOOL);
        let value = typed(&mut ast, AstNodeKind::Identifier, g, vec![]);

        assert_eq!(assign_check(&ast, f, value), Ok(Coercion::None));
        assert!(assign_check(&ast, h, value).is_err());
        assert!(assign_check(&ast, TypeId::VOID, value).is_err());
    }

    #[test]
    fn test_messages() {
        let mut ast = Ast::new();
        let int_params = tuple_type(&mut ast, &[TypeId::INT]);
        let other_int_params = tuple_type(&mut ast, &[TypeId::INT]);
        let bool_params = tuple_type(&mut ast, &[TypeId::BOOL]);
        let input = ast.types_mut().message(MessageDirection::In, int_params);
        let output = ast.types_mut().message(MessageDirection::Out, other_int_params);
        let bool_output = ast.types_mut().message(MessageDirection::Out, bool_params);
        let function = ast.types_mut().function(int_params, TypeId::VOID);

        let connected = typed(&mut ast, AstNodeKind::Identifier, output, vec![]);
        assert_eq!(assign_check(&ast, input, connected), Ok(Coercion::None));

        let mismatched = typed(&mut ast, AstNodeKind::Identifier, bool_output, vec![]);
        let err = assign_check(&ast, input, mismatched).unwrap_err();
        assert!(matches!(err, Error::IncompatibleTypes { ref from, ref to, .. } if from == "output(bool)" && to == "input(int)"));

        let handler = typed(&mut ast, AstNodeKind::Identifier, function, vec![]);
        let err = assign_check(&ast, input, handler).unwrap_err();
        assert!(matches!(err, Error::IncompatibleTypes { ref from, .. } if from == "function(int):()"));
    }
}
