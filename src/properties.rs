//! [crate::properties] contains the building blocks shared by the rest of the
//! substrate: node identities, the closed schema catalog (node kinds, edge
//! kinds, capabilities, edge rules), source ranges, and the typed attribute
//! model.
//!
//! The schema is static data. Every per-kind question the
//! [`Factory`](crate::factory::Factory) or the traversal engine asks —
//! "which edges does this kind declare, in what order?", "may this edge
//! target that kind?", "does this kind carry a name?" — is answered by the
//! tables in this module, never by per-node state.

use enumset::{enum_set, EnumSet, EnumSetType};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Stable handle of a node within one [`Factory`](crate::factory::Factory).
///
/// `NodeId` 0 is the [`NodeId::NONE`] sentinel meaning "no node". It is never
/// allocated, so an unset single edge and an absent parent are both
/// representable without an `Option` in the wire encoding. Identities are
/// allocated monotonically starting at 1 and survive a save/load round trip
/// unrenumbered.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(u32);

impl NodeId {
    /// The "no node" sentinel.
    pub const NONE: NodeId = NodeId(0);

    /// First identity a fresh arena hands out.
    pub(crate) const FIRST: NodeId = NodeId(1);

    pub const fn from_u32(raw: u32) -> NodeId {
        NodeId(raw)
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }

    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    pub(crate) const fn successor(self) -> NodeId {
        NodeId(self.0 + 1)
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The closed set of node kinds the schema knows about.
///
/// A node's kind is fixed at creation and never changes. The discriminant is
/// part of the binary encoding, so variants must only ever be appended.
#[derive(EnumSetType, Debug, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[enumset(repr = "u16")]
pub enum NodeKind {
    Package,
    CompilationUnit,
    TypeDeclaration,
    NormalMethod,
    Parameter,
    Variable,
    Comment,
}

impl NodeKind {
    pub(crate) fn from_repr(raw: u16) -> Option<NodeKind> {
        EnumSet::<NodeKind>::all()
            .iter()
            .find(|kind| *kind as u16 == raw)
    }

    /// Capabilities statically composed into this kind.
    pub fn capabilities(self) -> EnumSet<Capability> {
        match self {
            NodeKind::Package => enum_set!(Capability::Named | Capability::Commentable),
            NodeKind::CompilationUnit => {
                enum_set!(Capability::Positioned | Capability::Commentable)
            }
            NodeKind::TypeDeclaration
            | NodeKind::NormalMethod
            | NodeKind::Parameter
            | NodeKind::Variable => {
                enum_set!(Capability::Named | Capability::Positioned | Capability::Commentable)
            }
            NodeKind::Comment => enum_set!(Capability::Positioned | Capability::Texted),
        }
    }

    pub fn has_capability(self, capability: Capability) -> bool {
        self.capabilities().contains(capability)
    }

    /// The edges this kind declares, in schema order. Traversal and the
    /// binary codec both follow this order, which makes them deterministic.
    pub fn edge_rules(self) -> &'static [EdgeRule] {
        match self {
            NodeKind::Package => PACKAGE_EDGES,
            NodeKind::CompilationUnit => COMPILATION_UNIT_EDGES,
            NodeKind::TypeDeclaration => TYPE_DECLARATION_EDGES,
            NodeKind::NormalMethod => NORMAL_METHOD_EDGES,
            NodeKind::Parameter => PARAMETER_EDGES,
            NodeKind::Variable => VARIABLE_EDGES,
            NodeKind::Comment => &[],
        }
    }

    /// Rule for one declared edge of this kind, if the kind declares it.
    pub fn edge_rule(self, edge: EdgeKind) -> Option<&'static EdgeRule> {
        self.edge_rules().iter().find(|rule| rule.edge == edge)
    }
}

/// Statically composed node capabilities. A kind either has a capability
/// permanently or lacks it permanently; there is no runtime discovery.
#[derive(EnumSetType, Debug, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Capability {
    /// A mutable name string plus the source range it was read from.
    Named,
    /// A source range plus independent compiler/tool synthesized flags.
    Positioned,
    /// An ordered, append-only `Comments` edge.
    Commentable,
    /// Raw comment text. `Comment` nodes only.
    Texted,
}

/// The closed set of edge names. The (source kind, edge) pair is what the
/// schema constrains; see [`EdgeRule`] and [`NodeKind::edge_rules`].
#[derive(EnumSetType, Debug, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[enumset(repr = "u16")]
pub enum EdgeKind {
    Members,
    Units,
    Parameters,
    Comments,
    SuperClass,
    Returns,
    RefersTo,
    Calls,
}

/// Whether an edge stores zero-or-one target or an ordered target list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Multiplicity {
    Single,
    Multiple,
}

/// Direction selector for traversal filters. `Forward` follows an edge from
/// its declaring source to its targets, `Reverse` from a target back to the
/// sources referencing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Forward,
    Reverse,
}

/// One (source kind, edge name) schema entry: which kinds the edge may
/// target, its multiplicity, and whether it is an ownership edge.
///
/// Ownership edges establish the exclusive parent/child relation: adding or
/// setting one rewires the target's parent field, and a node may be the
/// ownership target of at most one source at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeRule {
    pub edge: EdgeKind,
    pub targets: EnumSet<NodeKind>,
    pub multiplicity: Multiplicity,
    pub ownership: bool,
}

const fn owned_multi(edge: EdgeKind, targets: EnumSet<NodeKind>) -> EdgeRule {
    EdgeRule {
        edge,
        targets,
        multiplicity: Multiplicity::Multiple,
        ownership: true,
    }
}

const fn cross_single(edge: EdgeKind, targets: EnumSet<NodeKind>) -> EdgeRule {
    EdgeRule {
        edge,
        targets,
        multiplicity: Multiplicity::Single,
        ownership: false,
    }
}

const COMMENTS_RULE: EdgeRule = owned_multi(EdgeKind::Comments, enum_set!(NodeKind::Comment));

const PACKAGE_EDGES: &[EdgeRule] = &[
    owned_multi(
        EdgeKind::Members,
        enum_set!(NodeKind::Package | NodeKind::TypeDeclaration),
    ),
    owned_multi(EdgeKind::Units, enum_set!(NodeKind::CompilationUnit)),
    COMMENTS_RULE,
];

const COMPILATION_UNIT_EDGES: &[EdgeRule] = &[COMMENTS_RULE];

const TYPE_DECLARATION_EDGES: &[EdgeRule] = &[
    owned_multi(
        EdgeKind::Members,
        enum_set!(NodeKind::TypeDeclaration | NodeKind::NormalMethod | NodeKind::Variable),
    ),
    COMMENTS_RULE,
    cross_single(EdgeKind::SuperClass, enum_set!(NodeKind::TypeDeclaration)),
];

const NORMAL_METHOD_EDGES: &[EdgeRule] = &[
    owned_multi(EdgeKind::Parameters, enum_set!(NodeKind::Parameter)),
    COMMENTS_RULE,
    cross_single(EdgeKind::Returns, enum_set!(NodeKind::TypeDeclaration)),
    EdgeRule {
        edge: EdgeKind::Calls,
        targets: enum_set!(NodeKind::NormalMethod),
        multiplicity: Multiplicity::Multiple,
        ownership: false,
    },
];

const PARAMETER_EDGES: &[EdgeRule] = &[
    COMMENTS_RULE,
    cross_single(EdgeKind::RefersTo, enum_set!(NodeKind::TypeDeclaration)),
];

const VARIABLE_EDGES: &[EdgeRule] = &[
    COMMENTS_RULE,
    cross_single(EdgeKind::RefersTo, enum_set!(NodeKind::TypeDeclaration)),
];

/// Source text range. `path` is the source file the range points into; an
/// empty path means "no position recorded".
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRange {
    pub path: String,
    pub line: u32,
    pub col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl SourceRange {
    pub fn new(path: impl Into<String>, line: u32, col: u32, end_line: u32, end_col: u32) -> Self {
        SourceRange {
            path: path.into(),
            line,
            col,
            end_line,
            end_col,
        }
    }
}

/// Context under which semantic attributes produced by a frontend are stored.
pub const CONTEXT_ATTRIBUTE: &str = "attribute";
/// Context under which computed metrics are stored by downstream consumers.
pub const CONTEXT_METRIC: &str = "metric";

/// Scalar value kinds an [`Attribute`] can carry. The discriminant is part of
/// the binary encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttrKind {
    String,
    Int,
    Float,
    Bool,
}

impl AttrKind {
    pub(crate) fn from_repr(raw: u8) -> Option<AttrKind> {
        match raw {
            0 => Some(AttrKind::String),
            1 => Some(AttrKind::Int),
            2 => Some(AttrKind::Float),
            3 => Some(AttrKind::Bool),
            _ => None,
        }
    }

    pub(crate) fn repr(self) -> u8 {
        match self {
            AttrKind::String => 0,
            AttrKind::Int => 1,
            AttrKind::Float => 2,
            AttrKind::Bool => 3,
        }
    }
}

/// A typed attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl AttrValue {
    pub fn kind(&self) -> AttrKind {
        match self {
            AttrValue::String(_) => AttrKind::String,
            AttrValue::Int(_) => AttrKind::Int,
            AttrValue::Float(_) => AttrKind::Float,
            AttrValue::Bool(_) => AttrKind::Bool,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::String(value.to_string())
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Float(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

/// A (value kind, context, key, value) record attached to a node.
///
/// Multiple attributes may share a key across contexts (a `LOC` metric and a
/// `LOC` semantic attribute coexist). Lookup is by (kind, key, context); see
/// [`Node::find_attribute`](crate::node::Node::find_attribute).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub context: String,
    pub value: AttrValue,
}

impl Attribute {
    pub fn new(name: impl Into<String>, context: impl Into<String>, value: AttrValue) -> Self {
        Attribute {
            name: name.into(),
            context: context.into(),
            value,
        }
    }

    pub fn kind(&self) -> AttrKind {
        self.value.kind()
    }
}
