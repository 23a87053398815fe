//! [crate::node] defines the node state owned by the
//! [`Factory`](crate::factory::Factory) arena and its read accessors.
//!
//! A [`Node`] is plain data: identity, kind tag, parent identity, capability
//! payloads fixed by the kind's schema entry, the attribute store, and one
//! [`EdgeSlot`] per schema-declared edge. All mutation routes through the
//! Factory, which performs edge/parent bookkeeping; this module only answers
//! questions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{
    error::{AsgError, Result},
    properties::{
        AttrKind, Attribute, Capability, EdgeKind, Multiplicity, NodeId, NodeKind, SourceRange,
    },
};

/// Payload of the `Named` capability.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameData {
    pub name: String,
    pub range: SourceRange,
}

/// Payload of the `Positioned` capability. The two synthesized flags are
/// independent: a node may be generated by the compiler, injected by an
/// analysis tool, both, or neither.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionData {
    pub range: SourceRange,
    pub compiler_generated: bool,
    pub tool_generated: bool,
}

/// Storage of one declared edge: zero-or-one target, or an ordered target
/// list that preserves insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeSlot {
    Single(NodeId),
    Multiple(Vec<NodeId>),
}

impl EdgeSlot {
    fn empty(multiplicity: Multiplicity) -> EdgeSlot {
        match multiplicity {
            Multiplicity::Single => EdgeSlot::Single(NodeId::NONE),
            Multiplicity::Multiple => EdgeSlot::Multiple(Vec::new()),
        }
    }

    /// Targets currently stored, in order. A single slot yields zero or one.
    pub fn targets(&self) -> &[NodeId] {
        match self {
            EdgeSlot::Single(id) if id.is_none() => &[],
            EdgeSlot::Single(id) => std::slice::from_ref(id),
            EdgeSlot::Multiple(ids) => ids,
        }
    }
}

/// One node of the graph. Created and owned exclusively by the
/// [`Factory`](crate::factory::Factory); a node never changes kind after
/// creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    id: NodeId,
    kind: NodeKind,
    parent: NodeId,
    name: Option<NameData>,
    position: Option<PositionData>,
    text: Option<String>,
    attributes: Vec<Attribute>,
    edges: BTreeMap<EdgeKind, EdgeSlot>,
    /// Count of edge references elsewhere in the arena targeting this node.
    /// Maintained by the Factory's edge mutators; guards removal.
    pub(crate) inbound: u32,
}

impl Node {
    pub(crate) fn new(id: NodeId, kind: NodeKind) -> Node {
        let capabilities = kind.capabilities();
        let edges = kind
            .edge_rules()
            .iter()
            .map(|rule| (rule.edge, EdgeSlot::empty(rule.multiplicity)))
            .collect();
        Node {
            id,
            kind,
            parent: NodeId::NONE,
            name: capabilities
                .contains(Capability::Named)
                .then(NameData::default),
            position: capabilities
                .contains(Capability::Positioned)
                .then(PositionData::default),
            text: capabilities
                .contains(Capability::Texted)
                .then(String::new),
            attributes: Vec::new(),
            edges,
            inbound: 0,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The immutable kind tag, the discriminant for visitor dispatch.
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Identity of the unique node holding an ownership edge to this one, or
    /// [`NodeId::NONE`] while unattached.
    pub fn parent(&self) -> NodeId {
        self.parent
    }

    pub(crate) fn set_parent(&mut self, parent: NodeId) {
        self.parent = parent;
    }

    /// Name of a `Named` node. `None` when the kind lacks the capability.
    pub fn name(&self) -> Option<&str> {
        self.name.as_ref().map(|data| data.name.as_str())
    }

    pub fn name_range(&self) -> Option<&SourceRange> {
        self.name.as_ref().map(|data| &data.range)
    }

    pub(crate) fn name_mut(&mut self) -> Option<&mut NameData> {
        self.name.as_mut()
    }

    /// Position payload of a `Positioned` node.
    pub fn position(&self) -> Option<&PositionData> {
        self.position.as_ref()
    }

    pub(crate) fn position_mut(&mut self) -> Option<&mut PositionData> {
        self.position.as_mut()
    }

    /// Comment text of a `Texted` node.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub(crate) fn text_mut(&mut self) -> Option<&mut String> {
        self.text.as_mut()
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub(crate) fn attributes_mut(&mut self) -> &mut Vec<Attribute> {
        &mut self.attributes
    }

    /// All attributes matching (value kind, key, context), in insertion
    /// order. Normally zero or one.
    pub fn find_attribute(&self, kind: AttrKind, name: &str, context: &str) -> Vec<&Attribute> {
        self.attributes
            .iter()
            .filter(|attr| attr.kind() == kind && attr.name == name && attr.context == context)
            .collect()
    }

    /// Target of a declared single edge; [`NodeId::NONE`] while unset.
    pub fn single_edge(&self, edge: EdgeKind) -> Result<NodeId> {
        match self.slot(edge)? {
            EdgeSlot::Single(id) => Ok(*id),
            EdgeSlot::Multiple(_) => Err(AsgError::SchemaViolation(format!(
                "edge {edge:?} of {kind:?} is multi-valued, read it with multi_edge",
                kind = self.kind
            ))),
        }
    }

    /// Ordered targets of a declared multi edge.
    pub fn multi_edge(&self, edge: EdgeKind) -> Result<&[NodeId]> {
        match self.slot(edge)? {
            EdgeSlot::Multiple(ids) => Ok(ids),
            EdgeSlot::Single(_) => Err(AsgError::SchemaViolation(format!(
                "edge {edge:?} of {kind:?} is single-valued, read it with single_edge",
                kind = self.kind
            ))),
        }
    }

    pub(crate) fn slot(&self, edge: EdgeKind) -> Result<&EdgeSlot> {
        self.edges.get(&edge).ok_or_else(|| {
            AsgError::SchemaViolation(format!(
                "kind {kind:?} does not declare edge {edge:?}",
                kind = self.kind
            ))
        })
    }

    pub(crate) fn slot_mut(&mut self, edge: EdgeKind) -> Result<&mut EdgeSlot> {
        let kind = self.kind;
        self.edges.get_mut(&edge).ok_or_else(|| {
            AsgError::SchemaViolation(format!("kind {kind:?} does not declare edge {edge:?}"))
        })
    }

    /// Declared edges with their stored targets, in schema order.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeKind, &EdgeSlot)> {
        self.kind.edge_rules().iter().map(|rule| {
            let slot = self
                .edges
                .get(&rule.edge)
                .expect("slot allocated for every declared edge at construction");
            (rule.edge, slot)
        })
    }

    /// Every identity this node references through any edge, in schema edge
    /// order then target order.
    pub fn edge_targets(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.edges()
            .flat_map(|(_, slot)| slot.targets().iter().copied())
    }
}
