//! Type check passes (leaves first)
//!
//! The first pass computes the type of every node bottom up and checks
//! every value transfer except `return`. Returns are checked by a second
//! pass, once every function has its final (possibly inferred) return
//! type.

use crate::frontend::ast::{AstFlags, AstNodeKind, NodeId};
use crate::frontend::semantic::assign::{assign_check, coerce_child};
use crate::frontend::semantic::state::AnalysisState;
use crate::frontend::semantic::walk::{walk_leaves_first, NodeOperations, PassOperations, SemanticResult};
use crate::types::{MessageDirection, TupleMember, Type, TypeId};
use crate::utils::{Error, Result};

pub fn run_first(state: &mut AnalysisState<'_>, root: NodeId) -> SemanticResult {
    let ops = PassOperations::new("type check", first_pass_operations);
    walk_leaves_first(&ops, state, root)
}

pub fn run_second(state: &mut AnalysisState<'_>, root: NodeId) -> SemanticResult {
    let ops = PassOperations::new("return check", second_pass_operations);
    walk_leaves_first(&ops, state, root)
}

fn first_pass_operations(kind: AstNodeKind) -> NodeOperations {
    match kind {
        AstNodeKind::Module | AstNodeKind::Script => NodeOperations::checks(vec![mark_type_checked]),
        AstNodeKind::TypeName => NodeOperations::checks(vec![type_name_check]),
        AstNodeKind::TupleDef => NodeOperations::checks(vec![tuple_def_check]),
        AstNodeKind::Actor => NodeOperations::checks(vec![actor_check]),
        AstNodeKind::MessageType => NodeOperations::checks(vec![message_type_check]),
        AstNodeKind::Input => NodeOperations::checks(vec![input_check]),
        AstNodeKind::Output => NodeOperations::checks(vec![output_check]),
        AstNodeKind::FunctionType => NodeOperations::checks(vec![function_type_check]),
        AstNodeKind::ArrayDecl => NodeOperations::checks(vec![array_decl_check]),
        AstNodeKind::Block => NodeOperations::checks(vec![block_check]),
        AstNodeKind::Typedef => NodeOperations::checks(vec![typedef_check]),
        AstNodeKind::Tuple => NodeOperations::checks(vec![tuple_check]),
        AstNodeKind::Declaration => {
            NodeOperations::checks(vec![declaration_check]).with_transforms(vec![coerce_initializer])
        }
        AstNodeKind::If => NodeOperations::checks(vec![if_check]),
        AstNodeKind::For => NodeOperations::checks(vec![for_check]),
        AstNodeKind::Return => NodeOperations::checks(vec![return_type_check]),
        AstNodeKind::Function => NodeOperations::checks(vec![function_check]).with_transforms(vec![coerce_body]),
        AstNodeKind::Assignment => {
            NodeOperations::checks(vec![assignment_check]).with_transforms(vec![coerce_assigned_value])
        }
        AstNodeKind::Call => NodeOperations::checks(vec![call_check, actor_instance_check])
            .with_transforms(vec![coerce_arguments]),
        AstNodeKind::CtCall => NodeOperations::checks(vec![ct_call_check]),
        AstNodeKind::Identifier => NodeOperations::checks(vec![identifier_check]),
        AstNodeKind::MemberAccess => NodeOperations::checks(vec![member_access_check]),
        AstNodeKind::BinaryOp => NodeOperations::checks(vec![binary_op_check]),
        AstNodeKind::PrefixOp | AstNodeKind::PostfixOp => NodeOperations::checks(vec![unary_op_check]),
        AstNodeKind::Integer => NodeOperations::checks(vec![integer_check]),
        AstNodeKind::Bool => NodeOperations::checks(vec![bool_check]),
        AstNodeKind::Float | AstNodeKind::Str | AstNodeKind::Select => {
            NodeOperations::checks(vec![not_implemented])
        }
        AstNodeKind::UnnamedInput => NodeOperations::checks(vec![unnamed_input_check]),
        AstNodeKind::TupleAdapter
        | AstNodeKind::GetAddress
        | AstNodeKind::MemberName
        | AstNodeKind::DefaultType
        | AstNodeKind::Import => NodeOperations::none(),
    }
}

fn second_pass_operations(kind: AstNodeKind) -> NodeOperations {
    match kind {
        AstNodeKind::Return => NodeOperations::checks(vec![return_check]).with_transforms(vec![coerce_return_value]),
        AstNodeKind::Module
        | AstNodeKind::Script
        | AstNodeKind::Typedef
        | AstNodeKind::Block
        | AstNodeKind::Tuple
        | AstNodeKind::TupleDef
        | AstNodeKind::TupleAdapter
        | AstNodeKind::Declaration
        | AstNodeKind::If
        | AstNodeKind::For
        | AstNodeKind::Function
        | AstNodeKind::FunctionType
        | AstNodeKind::Assignment
        | AstNodeKind::Call
        | AstNodeKind::CtCall
        | AstNodeKind::Integer
        | AstNodeKind::Float
        | AstNodeKind::Str
        | AstNodeKind::Bool
        | AstNodeKind::Identifier
        | AstNodeKind::MemberAccess
        | AstNodeKind::MemberName
        | AstNodeKind::BinaryOp
        | AstNodeKind::PrefixOp
        | AstNodeKind::PostfixOp
        | AstNodeKind::Actor
        | AstNodeKind::TypeName
        | AstNodeKind::DefaultType
        | AstNodeKind::Input
        | AstNodeKind::Output
        | AstNodeKind::MessageType
        | AstNodeKind::UnnamedInput
        | AstNodeKind::Import
        | AstNodeKind::GetAddress
        | AstNodeKind::ArrayDecl
        | AstNodeKind::Select => NodeOperations::none(),
    }
}

// ==================== Helpers ====================

fn child_type(state: &AnalysisState<'_>, node: NodeId, index: usize) -> TypeId {
    state
        .ast
        .child(node, index)
        .map_or(TypeId::VOID, |child| state.ast.data_type(child))
}

fn expect_type(state: &AnalysisState<'_>, node: NodeId, expected: TypeId) -> Result<()> {
    let found = state.ast.data_type(node);
    if found == expected {
        return Ok(());
    }
    Err(Error::WrongType {
        expected: state.type_string(expected),
        found: state.type_string(found),
        pos: state.ast.pos(node),
    })
}

fn set_type(state: &mut AnalysisState<'_>, node: NodeId, ty: TypeId) -> Result<()> {
    state.ast.set_data_type(node, ty);
    Ok(())
}

// ==================== Declarations and types ====================

fn mark_type_checked(state: &mut AnalysisState<'_>, node: NodeId) -> Result<()> {
    state.ast.node_mut(node).flags.insert(AstFlags::TYPE_CHECKED);
    Ok(())
}

fn type_name_check(state: &mut AnalysisState<'_>, node: NodeId) -> Result<()> {
    let name = state.ast.name(node).to_string();
    let pos = state.ast.pos(node);
    let scope = state.scope_of(node);

    let target = state
        .get_symbol(scope, &name, true)
        .ok_or_else(|| Error::NonExistentSymbol { name: name.clone(), pos })?;
    if !state.ast.kind(target).is_type_declaration() {
        return Err(Error::NotAType { name, pos });
    }

    state.ast.set_reference(node, Some(target));
    let ty = state.ast.data_type(target);
    set_type(state, node, ty)
}

/// Member types of a tuple definition; only declarations name a member
fn tuple_members(state: &AnalysisState<'_>, tuple_def: NodeId) -> Vec<TupleMember> {
    state
        .ast
        .child_ids(tuple_def)
        .into_iter()
        .map(|child| {
            let name = match state.ast.kind(child) {
                AstNodeKind::Declaration => Some(state.ast.name(child).to_string()),
                _ => None,
            };
            TupleMember::new(state.ast.data_type(child), name)
        })
        .collect()
}

fn tuple_def_check(state: &mut AnalysisState<'_>, node: NodeId) -> Result<()> {
    let members = tuple_members(state, node);
    let ty = state.ast.types_mut().tuple(members, Some(node));
    set_type(state, node, ty)
}

fn actor_check(state: &mut AnalysisState<'_>, node: NodeId) -> Result<()> {
    let params = child_type(state, node, 0);
    let members = state
        .ast
        .child_ids(node)
        .into_iter()
        .skip(1)
        .filter(|member| {
            matches!(
                state.ast.kind(*member),
                AstNodeKind::Declaration | AstNodeKind::Input | AstNodeKind::Output
            ) && !state.ast.name(*member).is_empty()
        })
        .map(|member| TupleMember::new(state.ast.data_type(member), Some(state.ast.name(member).to_string())))
        .collect();

    let name = state.ast.name(node).to_string();
    let ty = state.ast.types_mut().actor(name, params, members, node);
    set_type(state, node, ty)
}

fn message(state: &mut AnalysisState<'_>, node: NodeId, direction: MessageDirection) -> Result<()> {
    let params = child_type(state, node, 0);
    let ty = state.ast.types_mut().message(direction, params);
    set_type(state, node, ty)
}

fn message_type_check(state: &mut AnalysisState<'_>, node: NodeId) -> Result<()> {
    let direction = if state.ast.node(node).value == "output" {
        MessageDirection::Out
    } else {
        MessageDirection::In
    };
    message(state, node, direction)
}

fn input_check(state: &mut AnalysisState<'_>, node: NodeId) -> Result<()> {
    message(state, node, MessageDirection::In)
}

fn output_check(state: &mut AnalysisState<'_>, node: NodeId) -> Result<()> {
    message(state, node, MessageDirection::Out)
}

fn function_type_check(state: &mut AnalysisState<'_>, node: NodeId) -> Result<()> {
    let params = child_type(state, node, 0);
    let ret = child_type(state, node, 1);
    let ty = state.ast.types_mut().function(params, ret);
    set_type(state, node, ty)
}

fn array_decl_check(state: &mut AnalysisState<'_>, node: NodeId) -> Result<()> {
    let element = child_type(state, node, 0);
    let size = match state.ast.child(node, 1) {
        Some(size) => {
            expect_type(state, size, TypeId::INT)?;
            match state.ast.kind(size) {
                AstNodeKind::Integer => state.ast.node(size).value.parse::<i64>().ok(),
                _ => None,
            }
        }
        None => None,
    };
    let ty = state.ast.types_mut().array(element, size);
    set_type(state, node, ty)
}

fn typedef_check(state: &mut AnalysisState<'_>, node: NodeId) -> Result<()> {
    let ty = child_type(state, node, 0);
    set_type(state, node, ty)
}

fn declaration_check(state: &mut AnalysisState<'_>, node: NodeId) -> Result<()> {
    let type_desc = state.ast.child(node, 0);
    let init = state.ast.child(node, 1);

    let ty = match (type_desc, init) {
        (Some(desc), Some(init)) => {
            let ty = state.ast.data_type(desc);
            assign_check(state.ast, ty, init)?;
            ty
        }
        (Some(desc), None) => state.ast.data_type(desc),
        (None, Some(init)) => state.ast.data_type(init),
        (None, None) => {
            return Err(Error::DeclarationWithoutType {
                name: state.ast.name(node).to_string(),
                pos: state.ast.pos(node),
            })
        }
    };
    set_type(state, node, ty)
}

fn coerce_initializer(state: &mut AnalysisState<'_>, node: NodeId) -> NodeId {
    if state.ast.child(node, 0).is_some() {
        let ty = state.ast.data_type(node);
        coerce_child(state, node, 1, ty);
    }
    node
}

// ==================== Statements ====================

fn block_check(state: &mut AnalysisState<'_>, node: NodeId) -> Result<()> {
    let ty = state
        .ast
        .child_ids(node)
        .last()
        .map_or(TypeId::VOID, |last| state.ast.data_type(*last));
    set_type(state, node, ty)
}

fn if_check(state: &mut AnalysisState<'_>, node: NodeId) -> Result<()> {
    let condition = child_type(state, node, 0);
    if condition != TypeId::BOOL {
        let pos = state.ast.child(node, 0).map_or(state.ast.pos(node), |c| state.ast.pos(c));
        return Err(Error::WrongIfConditionType {
            found: state.type_string(condition),
            pos,
        });
    }

    let then_type = child_type(state, node, 1);
    let ty = match state.ast.child(node, 2) {
        Some(otherwise) if state.ast.types().compatible(then_type, state.ast.data_type(otherwise)) => then_type,
        _ => TypeId::VOID,
    };
    set_type(state, node, ty)
}

fn for_check(state: &mut AnalysisState<'_>, node: NodeId) -> Result<()> {
    if let Some(condition) = state.ast.child(node, 1) {
        expect_type(state, condition, TypeId::BOOL)?;
    }
    set_type(state, node, TypeId::VOID)
}

fn return_type_check(state: &mut AnalysisState<'_>, node: NodeId) -> Result<()> {
    let ty = child_type(state, node, 0);
    set_type(state, node, ty)
}

/// Return type of a function node: declared, inferred from the body, or
/// void for bodiless declarations
fn function_return_type(state: &AnalysisState<'_>, node: NodeId) -> TypeId {
    match (state.ast.child(node, 1), state.ast.child(node, 2)) {
        (Some(declared), _) => state.ast.data_type(declared),
        (None, Some(body)) => state.ast.data_type(body),
        (None, None) => TypeId::VOID,
    }
}

fn function_check(state: &mut AnalysisState<'_>, node: NodeId) -> Result<()> {
    let params = child_type(state, node, 0);
    let ret = function_return_type(state, node);

    if state.ast.child(node, 1).is_some() && ret != TypeId::VOID {
        if let Some(body) = state.ast.child(node, 2) {
            assign_check(state.ast, ret, body)?;
        }
    }

    let ty = state.ast.types_mut().function(params, ret);
    set_type(state, node, ty)
}

fn coerce_body(state: &mut AnalysisState<'_>, node: NodeId) -> NodeId {
    if state.ast.child(node, 1).is_some() {
        let ret = function_return_type(state, node);
        if ret != TypeId::VOID {
            coerce_child(state, node, 2, ret);
        }
    }
    node
}

// ==================== Expressions ====================

fn assignment_check(state: &mut AnalysisState<'_>, node: NodeId) -> Result<()> {
    let lhs = child_type(state, node, 0);
    let op = state.ast.node(node).value.clone();

    if op != "=" {
        if let Some(target) = state.ast.child(node, 0) {
            expect_type(state, target, TypeId::INT)?;
        }
    }
    if let Some(value) = state.ast.child(node, 1) {
        assign_check(state.ast, lhs, value)?;
    }
    set_type(state, node, lhs)
}

fn coerce_assigned_value(state: &mut AnalysisState<'_>, node: NodeId) -> NodeId {
    let ty = state.ast.data_type(node);
    coerce_child(state, node, 1, ty);
    node
}

fn call_check(state: &mut AnalysisState<'_>, node: NodeId) -> Result<()> {
    let callee = child_type(state, node, 0);
    let types = state.ast.types();
    let (Some(params), Some(result)) = (types.params_of(callee), types.call_result_of(callee)) else {
        return Err(Error::NotCallable {
            found: state.type_string(callee),
            pos: state.ast.pos(node),
        });
    };

    if let Some(args) = state.ast.child(node, 1) {
        assign_check(state.ast, params, args)?;
    }
    set_type(state, node, result)
}

/// Actors are only instantiated as const members of another actor
fn actor_instance_check(state: &mut AnalysisState<'_>, node: NodeId) -> Result<()> {
    let callee = child_type(state, node, 0);
    let Type::Actor { name, decl, .. } = state.ast.types().get(callee) else {
        return Ok(());
    };
    let pos = state.ast.pos(node);

    let declaration = state.parent(0).filter(|parent| {
        let parent_node = state.ast.node(*parent);
        parent_node.kind == AstNodeKind::Declaration
            && parent_node.flags.contains(AstFlags::ACTOR_MEMBER)
            && state.ast.child(*parent, 1) == Some(node)
    });
    let Some(declaration) = declaration else {
        return Err(Error::MisplacedActorInstance { pos });
    };
    if state.ast.flags(declaration).contains(AstFlags::VAR) {
        return Err(Error::NonConstActorInstance { pos });
    }
    if state.find_parent(AstNodeKind::Actor) == Some(*decl) {
        return Err(Error::RecursiveActorInstance { name: name.clone(), pos });
    }
    Ok(())
}

fn coerce_arguments(state: &mut AnalysisState<'_>, node: NodeId) -> NodeId {
    let callee = child_type(state, node, 0);
    if let Some(params) = state.ast.types().params_of(callee) {
        coerce_child(state, node, 1, params);
    }
    node
}

/// `x[i]`: arrays take any int index, tuples a literal one
fn ct_call_check(state: &mut AnalysisState<'_>, node: NodeId) -> Result<()> {
    let callee = child_type(state, node, 0);
    let pos = state.ast.pos(node);
    let indexes = state.ast.child(node, 1).map_or_else(Vec::new, |args| state.ast.child_ids(args));

    let ty = match state.ast.types().get(callee) {
        Type::Array { element, .. } => {
            let &[index] = indexes.as_slice() else {
                return Err(Error::InvalidArrayIndex { pos });
            };
            if state.ast.data_type(index) != TypeId::INT {
                return Err(Error::InvalidArrayIndex { pos: state.ast.pos(index) });
            }
            *element
        }
        Type::Tuple { members, .. } => {
            let &[index] = indexes.as_slice() else {
                return Err(Error::InvalidTupleIndex { pos });
            };
            let literal = state.ast.node(index);
            if literal.kind != AstNodeKind::Integer {
                return Err(Error::InvalidTupleIndex { pos: literal.pos });
            }
            let value = literal
                .value
                .parse::<i64>()
                .map_err(|_| Error::InvalidTupleIndex { pos: literal.pos })?;
            let member = usize::try_from(value)
                .ok()
                .and_then(|i| members.get(i))
                .ok_or(Error::IndexOutOfRange {
                    index: value,
                    size: members.len(),
                    pos: literal.pos,
                })?;
            member.ty
        }
        _ => {
            return Err(Error::NotIndexable {
                found: state.type_string(callee),
                pos,
            })
        }
    };
    set_type(state, node, ty)
}

fn identifier_check(state: &mut AnalysisState<'_>, node: NodeId) -> Result<()> {
    let name = state.ast.name(node).to_string();
    let scope = state.scope_of(node);
    let target = state.get_symbol(scope, &name, true).ok_or_else(|| Error::NonExistentSymbol {
        name,
        pos: state.ast.pos(node),
    })?;

    // The target may not be typed yet when it is declared further down
    state.ast.set_reference(node, Some(target));
    let ty = state.ast.data_type(target);
    set_type(state, node, ty)
}

fn member_access_check(state: &mut AnalysisState<'_>, node: NodeId) -> Result<()> {
    let object = child_type(state, node, 0);
    let pos = state.ast.pos(node);
    if !state.ast.types().is_tuple(object) {
        return Err(Error::WrongType {
            expected: "tuple".to_string(),
            found: state.type_string(object),
            pos,
        });
    }

    let Some(member) = state.ast.child(node, 1) else {
        return Err(Error::ExpectedIdent { pos });
    };
    let member_name = state.ast.name(member).to_string();
    let ty = state
        .ast
        .types()
        .member_by_name(object, &member_name)
        .ok_or_else(|| Error::MemberNotFound {
            member: member_name,
            ty: state.type_string(object),
            pos: state.ast.pos(member),
        })?;

    state.ast.set_data_type(member, ty);
    set_type(state, node, ty)
}

fn binary_op_check(state: &mut AnalysisState<'_>, node: NodeId) -> Result<()> {
    let (Some(lhs), Some(rhs)) = (state.ast.child(node, 0), state.ast.child(node, 1)) else {
        return Err(Error::ExpectedExpr { pos: state.ast.pos(node) });
    };
    let op = state.ast.node(node).value.clone();

    let ty = match op.as_str() {
        "<" | "<=" | ">" | ">=" => {
            expect_type(state, lhs, TypeId::INT)?;
            expect_type(state, rhs, TypeId::INT)?;
            TypeId::BOOL
        }
        "==" | "!=" => {
            let operand = state.ast.data_type(lhs);
            if operand != TypeId::INT && operand != TypeId::BOOL {
                return Err(Error::NotComparable {
                    found: state.type_string(operand),
                    pos: state.ast.pos(lhs),
                });
            }
            expect_type(state, rhs, operand)?;
            TypeId::BOOL
        }
        "&&" | "||" => {
            expect_type(state, lhs, TypeId::BOOL)?;
            expect_type(state, rhs, TypeId::BOOL)?;
            TypeId::BOOL
        }
        _ => {
            expect_type(state, lhs, TypeId::INT)?;
            expect_type(state, rhs, TypeId::INT)?;
            TypeId::INT
        }
    };
    set_type(state, node, ty)
}

fn unary_op_check(state: &mut AnalysisState<'_>, node: NodeId) -> Result<()> {
    let Some(operand) = state.ast.child(node, 0) else {
        return Err(Error::ExpectedExpr { pos: state.ast.pos(node) });
    };
    let expected = if state.ast.node(node).value == "!" {
        TypeId::BOOL
    } else {
        TypeId::INT
    };
    expect_type(state, operand, expected)?;
    set_type(state, node, expected)
}

fn integer_check(state: &mut AnalysisState<'_>, node: NodeId) -> Result<()> {
    set_type(state, node, TypeId::INT)
}

fn bool_check(state: &mut AnalysisState<'_>, node: NodeId) -> Result<()> {
    set_type(state, node, TypeId::BOOL)
}

fn tuple_check(state: &mut AnalysisState<'_>, node: NodeId) -> Result<()> {
    let members = state
        .ast
        .child_ids(node)
        .into_iter()
        .map(|child| state.ast.data_type(child))
        .collect();
    let ty = state.intern_tuple(members);
    set_type(state, node, ty)
}

fn not_implemented(state: &mut AnalysisState<'_>, node: NodeId) -> Result<()> {
    let feature = match state.ast.kind(node) {
        AstNodeKind::Str => "string literals",
        AstNodeKind::Float => "floating point literals",
        _ => "select",
    };
    Err(Error::NotImplemented {
        feature: feature.to_string(),
        pos: state.ast.pos(node),
    })
}

// ==================== Actor connections ====================

/// `input a.b (params) { ... }` connects to output `b` of member `a`.
/// The path is resolved from the enclosing scope, then through the
/// members of each actor instance along the way.
fn unnamed_input_check(state: &mut AnalysisState<'_>, node: NodeId) -> Result<()> {
    let pos = state.ast.pos(node);
    let path = state.ast.node(node).value.clone();
    let mut segments = path.split('.').filter(|s| !s.is_empty());

    let Some(root) = segments.next() else {
        return Err(Error::UnspecifiedConnectOutput { pos });
    };
    let invalid = || Error::InvalidConnectOutput { path: path.clone(), pos };

    let scope = state.scope_of(node);
    let mut current = state.get_symbol(scope, root, true).ok_or_else(invalid)?;
    for segment in segments {
        let actor = match state.ast.types().get(state.ast.data_type(current)) {
            Type::Actor { decl, .. } => *decl,
            _ => return Err(invalid()),
        };
        current = state
            .ast
            .child_ids(actor)
            .into_iter()
            .skip(1)
            .find(|member| state.ast.name(*member) == segment)
            .ok_or_else(invalid)?;
    }

    if state.ast.kind(current) != AstNodeKind::Output {
        return Err(invalid());
    }
    let output_params = child_type(state, current, 0);
    let input_params = child_type(state, node, 0);
    if !state.ast.types().compatible(input_params, output_params) {
        return Err(Error::IncompatibleTypes {
            from: state.type_string(output_params),
            to: state.type_string(input_params),
            pos,
        });
    }

    state.ast.set_reference(node, Some(current));
    let ty = state.ast.types_mut().message(MessageDirection::In, input_params);
    set_type(state, node, ty)
}

// ==================== Returns ====================

fn return_check(state: &mut AnalysisState<'_>, node: NodeId) -> Result<()> {
    let pos = state.ast.pos(node);
    let function = state
        .find_parent(AstNodeKind::Function)
        .ok_or(Error::ReturnOutsideFunction { pos })?;
    let ret = function_return_type(state, function);

    match state.ast.child(node, 0) {
        Some(value) => assign_check(state.ast, ret, value)
            .map(|_| ())
            .map_err(|_| Error::IncompatibleReturnType {
                found: state.ast.type_string(value),
                expected: state.type_string(ret),
                pos,
            }),
        None if ret == TypeId::VOID => Ok(()),
        None => Err(Error::IncompatibleReturnType {
            found: state.type_string(TypeId::VOID),
            expected: state.type_string(ret),
            pos,
        }),
    }
}

fn coerce_return_value(state: &mut AnalysisState<'_>, node: NodeId) -> NodeId {
    if let Some(function) = state.find_parent(AstNodeKind::Function) {
        let ret = function_return_type(state, function);
        coerce_child(state, node, 0, ret);
    }
    node
}
