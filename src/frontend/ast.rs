//! Abstract Syntax Tree for FIL-S
//!
//! The tree lives in an arena ([`Ast`]) and nodes are addressed by
//! [`NodeId`]. Child lists are slots (`Option<NodeId>`) so optional
//! children keep a fixed index per node kind. Semantic annotations (the
//! resolved type and the resolved declaration of a node) are kept in side
//! tables next to the nodes, together with the [`TypeTable`] they refer to.
//!
//! Child layout per kind:
//!
//! | kind | children |
//! |---|---|
//! | `Module` | scripts, then exported items |
//! | `Script`, `Block`, `Tuple`, `TupleDef` | items |
//! | `Typedef` | type descriptor |
//! | `Declaration` | type descriptor?, initializer? |
//! | `If` | condition, then, else? |
//! | `For` | init?, condition?, step?, body |
//! | `Return` | expression? |
//! | `Function` | parameters, return type?, body? |
//! | `FunctionType` | parameters, return type? |
//! | `Assignment`, `BinaryOp` | lhs, rhs |
//! | `Call`, `CtCall` | callee, argument tuple |
//! | `MemberAccess` | object, member name |
//! | `Actor` | parameters, members... |
//! | `Input`, `UnnamedInput` | parameters, body |
//! | `Output`, `MessageType` | parameters |
//! | `ArrayDecl` | element type, size |
//! | `PrefixOp`, `PostfixOp`, `TupleAdapter`, `GetAddress` | operand |

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::types::{TypeId, TypeTable};
use crate::utils::{Error, Position, Result};

/// Handle of a node inside an [`Ast`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u32);

impl NodeId {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Node kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AstNodeKind {
    Module,
    Script,
    Typedef,
    Block,
    /// Tuple literal
    Tuple,
    TupleDef,
    /// Same-shape reinterpretation inserted by assignment checks
    TupleAdapter,
    Declaration,
    If,
    For,
    Return,
    Function,
    FunctionType,
    Assignment,
    Call,
    /// `x[i]`
    CtCall,
    Integer,
    Float,
    Str,
    Bool,
    Identifier,
    MemberAccess,
    MemberName,
    BinaryOp,
    PrefixOp,
    PostfixOp,
    Actor,
    TypeName,
    /// Built-in scalar type declaration (`int`, `bool`, `c_pointer`)
    DefaultType,
    Input,
    Output,
    MessageType,
    UnnamedInput,
    Import,
    GetAddress,
    ArrayDecl,
    Select,
}

impl AstNodeKind {
    pub const ALL: [AstNodeKind; 37] = [
        AstNodeKind::Module,
        AstNodeKind::Script,
        AstNodeKind::Typedef,
        AstNodeKind::Block,
        AstNodeKind::Tuple,
        AstNodeKind::TupleDef,
        AstNodeKind::TupleAdapter,
        AstNodeKind::Declaration,
        AstNodeKind::If,
        AstNodeKind::For,
        AstNodeKind::Return,
        AstNodeKind::Function,
        AstNodeKind::FunctionType,
        AstNodeKind::Assignment,
        AstNodeKind::Call,
        AstNodeKind::CtCall,
        AstNodeKind::Integer,
        AstNodeKind::Float,
        AstNodeKind::Str,
        AstNodeKind::Bool,
        AstNodeKind::Identifier,
        AstNodeKind::MemberAccess,
        AstNodeKind::MemberName,
        AstNodeKind::BinaryOp,
        AstNodeKind::PrefixOp,
        AstNodeKind::PostfixOp,
        AstNodeKind::Actor,
        AstNodeKind::TypeName,
        AstNodeKind::DefaultType,
        AstNodeKind::Input,
        AstNodeKind::Output,
        AstNodeKind::MessageType,
        AstNodeKind::UnnamedInput,
        AstNodeKind::Import,
        AstNodeKind::GetAddress,
        AstNodeKind::ArrayDecl,
        AstNodeKind::Select,
    ];

    /// Kinds which open a new lexical scope
    pub fn needs_own_scope(self) -> bool {
        matches!(
            self,
            AstNodeKind::Block
                | AstNodeKind::For
                | AstNodeKind::TupleDef
                | AstNodeKind::Function
                | AstNodeKind::Input
                | AstNodeKind::Actor
                | AstNodeKind::UnnamedInput
                | AstNodeKind::Script
        )
    }

    /// Kinds which denote a type when referenced by name
    pub fn is_type_declaration(self) -> bool {
        matches!(
            self,
            AstNodeKind::TupleDef
                | AstNodeKind::Actor
                | AstNodeKind::MessageType
                | AstNodeKind::FunctionType
                | AstNodeKind::ArrayDecl
                | AstNodeKind::DefaultType
        )
    }

    /// Kinds which may appear as exported top-level items
    pub fn is_exportable(self) -> bool {
        matches!(
            self,
            AstNodeKind::Typedef
                | AstNodeKind::Declaration
                | AstNodeKind::TupleDef
                | AstNodeKind::Function
                | AstNodeKind::FunctionType
                | AstNodeKind::Actor
                | AstNodeKind::MessageType
        )
    }
}

bitflags! {
    /// Node flags, set by the parser and refined during analysis
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct AstFlags: u8 {
        const FUNCTION_PARAMETER = 1;
        const CONST = 1 << 1;
        const VAR = 1 << 2;
        const ACTOR_MEMBER = 1 << 3;
        const EXTERN_C = 1 << 4;
        const TYPE_CHECKED = 1 << 5;
    }
}

/// A syntax tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AstNode {
    pub kind: AstNodeKind,
    pub pos: Position,
    pub name: String,
    pub value: String,
    pub flags: AstFlags,
    pub children: Vec<Option<NodeId>>,
}

impl AstNode {
    pub fn new(kind: AstNodeKind, pos: Position) -> Self {
        Self {
            kind,
            pos,
            name: String::new(),
            value: String::new(),
            flags: AstFlags::empty(),
            children: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    pub fn with_flags(mut self, flags: AstFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_children(mut self, children: Vec<Option<NodeId>>) -> Self {
        self.children = children;
        self
    }
}

/// Node arena plus semantic side tables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ast {
    nodes: Vec<AstNode>,
    data_types: Vec<TypeId>,
    references: Vec<Option<NodeId>>,
    types: TypeTable,
    /// Script names, indexed by `Position::source`
    #[serde(default)]
    sources: Vec<String>,
}

impl Ast {
    /// Declaration of the built-in `int` type
    pub const BUILTIN_INT: NodeId = NodeId(0);
    /// Declaration of the built-in `bool` type
    pub const BUILTIN_BOOL: NodeId = NodeId(1);
    /// Declaration of the built-in `c_pointer` type
    pub const BUILTIN_C_POINTER: NodeId = NodeId(2);

    pub fn new() -> Self {
        let mut ast = Self {
            nodes: Vec::new(),
            data_types: Vec::new(),
            references: Vec::new(),
            types: TypeTable::new(),
            sources: Vec::new(),
        };
        for (name, ty) in [("int", TypeId::INT), ("bool", TypeId::BOOL), ("c_pointer", TypeId::C_POINTER)] {
            let node = AstNode::new(AstNodeKind::DefaultType, Position::synthetic()).with_name(name);
            let id = ast.add(node);
            ast.set_data_type(id, ty);
        }
        ast
    }

    /// Built-in type names and their declaration nodes
    pub fn builtin_types(&self) -> [(&'static str, NodeId); 3] {
        [
            ("int", Self::BUILTIN_INT),
            ("bool", Self::BUILTIN_BOOL),
            ("c_pointer", Self::BUILTIN_C_POINTER),
        ]
    }

    /// Add a node to the arena
    pub fn add(&mut self, node: AstNode) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        self.data_types.push(TypeId::VOID);
        self.references.push(None);
        id
    }

    /// Register a script name and return its source index
    pub fn add_source(&mut self, name: &str) -> u32 {
        self.sources.push(name.to_string());
        (self.sources.len() - 1) as u32
    }

    /// Name of the script `pos` was read from
    pub fn source_name(&self, pos: Position) -> Option<&str> {
        if pos.is_synthetic() {
            return None;
        }
        self.sources.get(pos.source as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &AstNode {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut AstNode {
        &mut self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> AstNodeKind {
        self.node(id).kind
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self.node(id).name
    }

    pub fn pos(&self, id: NodeId) -> Position {
        self.node(id).pos
    }

    pub fn flags(&self, id: NodeId) -> AstFlags {
        self.node(id).flags
    }

    pub fn children(&self, id: NodeId) -> &[Option<NodeId>] {
        &self.node(id).children
    }

    /// Child in slot `index`, if the slot exists and is filled
    pub fn child(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.node(id).children.get(index).copied().flatten()
    }

    /// Non-empty children, in order
    pub fn child_ids(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id).children.iter().flatten().copied().collect()
    }

    pub fn set_child(&mut self, id: NodeId, index: usize, child: Option<NodeId>) {
        self.node_mut(id).children[index] = child;
    }

    /// Child slots the analysis passes descend into. Module nodes only
    /// reach their items through their scripts.
    pub fn walkable_children(&self, id: NodeId) -> Vec<(usize, NodeId)> {
        let node = self.node(id);
        let mut result = Vec::with_capacity(node.children.len());
        for (index, child) in node.children.iter().enumerate() {
            let Some(child) = *child else { continue };
            if node.kind == AstNodeKind::Module && self.kind(child) != AstNodeKind::Script {
                break;
            }
            result.push((index, child));
        }
        result
    }

    // ==================== Semantic annotations ====================

    /// Resolved type of a node; `Void` until analysis assigns one
    pub fn data_type(&self, id: NodeId) -> TypeId {
        self.data_types[id.index()]
    }

    pub fn set_data_type(&mut self, id: NodeId, ty: TypeId) {
        self.data_types[id.index()] = ty;
    }

    /// Declaration an identifier (or type name, or connection) resolved to
    pub fn reference(&self, id: NodeId) -> Option<NodeId> {
        self.references[id.index()]
    }

    pub fn set_reference(&mut self, id: NodeId, target: Option<NodeId>) {
        self.references[id.index()] = target;
    }

    pub fn types(&self) -> &TypeTable {
        &self.types
    }

    pub fn types_mut(&mut self) -> &mut TypeTable {
        &mut self.types
    }

    /// Rendering of a node's resolved type
    pub fn type_string(&self, id: NodeId) -> String {
        self.types.display(self.data_type(id))
    }

    // ==================== Serialization ====================

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Io(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Io(e.to_string()))
    }
}

impl Default for Ast {
    fn default() -> Self {
        Self::new()
    }
}
