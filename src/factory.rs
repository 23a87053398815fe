//! [crate::factory] contains the arena that exclusively owns every node of an
//! ASG and the only mutation surface of the graph.
//!
//! The [`Factory`] maps identities to nodes, allocates identities
//! monotonically, and enforces the structural invariants at call time:
//!
//! - every edge target resolves to a live node of a kind the schema permits,
//! - ownership edges are exclusive and are the only writers of the parent
//!   field,
//! - a node cannot be removed while any edge elsewhere still targets it,
//! - a freed identity is never handed out again within the arena's lifetime.
//!
//! Read access goes through [`Factory::resolve`]; everything else on
//! [`Node`](crate::node::Node) is a plain accessor.

use std::collections::BTreeMap;

use crate::{
    error::{AsgError, Result},
    node::{EdgeSlot, Node},
    properties::{
        Attribute, Capability, EdgeKind, EdgeRule, Multiplicity, NodeId, NodeKind, SourceRange,
    },
};

/// The arena: an identity-indexed node store plus an allocation watermark and
/// an optional designated root.
#[derive(Debug, Clone)]
pub struct Factory {
    nodes: BTreeMap<NodeId, Node>,
    next_id: NodeId,
    root: NodeId,
}

impl Default for Factory {
    fn default() -> Self {
        Factory {
            nodes: BTreeMap::new(),
            next_id: NodeId::FIRST,
            root: NodeId::NONE,
        }
    }
}

impl Factory {
    pub fn new() -> Factory {
        Factory::default()
    }

    /// Allocate a new unattached node of `kind`. No implicit edges are
    /// created; the node's parent is the sentinel until an ownership edge
    /// claims it.
    pub fn create(&mut self, kind: NodeKind) -> NodeId {
        let id = self.next_id;
        self.next_id = self.next_id.successor();
        self.nodes.insert(id, Node::new(id, kind));
        tracing::debug!(%id, ?kind, "created node");
        id
    }

    /// Resolve an identity to its node, failing with `DanglingReference` for
    /// the sentinel and for unallocated or removed identities.
    pub fn resolve(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(&id).ok_or(AsgError::DanglingReference(id))
    }

    pub(crate) fn resolve_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(&id)
            .ok_or(AsgError::DanglingReference(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Live nodes in ascending identity order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// The designated root identity, or the sentinel if none is set.
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn set_root(&mut self, id: NodeId) -> Result<()> {
        self.resolve(id)?;
        self.root = id;
        Ok(())
    }

    /// Identity the next [`Factory::create`] call would return. Persisted so
    /// a reloaded arena never reuses identities freed before the save.
    pub(crate) fn next_id(&self) -> NodeId {
        self.next_id
    }

    pub(crate) fn bump_next_id(&mut self, watermark: NodeId) {
        if watermark > self.next_id {
            self.next_id = watermark;
        }
    }

    /// Allocate a node shell at a caller-chosen identity. Codec pass one
    /// only: shells carry no edges or payloads yet.
    pub(crate) fn insert_shell(&mut self, id: NodeId, kind: NodeKind) -> Result<()> {
        if id.is_none() {
            return Err(AsgError::CorruptData(
                "node record uses the reserved sentinel identity 0".to_string(),
            ));
        }
        if self.nodes.insert(id, Node::new(id, kind)).is_some() {
            return Err(AsgError::CorruptData(format!(
                "duplicate node record for identity {id}"
            )));
        }
        self.bump_next_id(id.successor());
        Ok(())
    }

    /// Remove a node. Fails with `SchemaViolation` while any edge elsewhere
    /// still targets it; detach those edges first (see
    /// [`Factory::clear_single`] and [`Factory::remove_from_multi`]). Edges
    /// the node holds to itself die with it and never block removal. The
    /// removed node's own outgoing edges are unlinked, resetting the parent
    /// of every child it owned. The identity is never reused.
    pub fn remove(&mut self, id: NodeId) -> Result<()> {
        let node = self.resolve(id)?;
        let unlink: Vec<(NodeId, bool)> = node
            .edges()
            .zip(node.kind().edge_rules())
            .flat_map(|((_, slot), rule)| {
                slot.targets()
                    .iter()
                    .map(|target| (*target, rule.ownership))
                    .collect::<Vec<_>>()
            })
            .collect();
        let self_refs = unlink.iter().filter(|(target, _)| *target == id).count() as u32;
        if node.inbound > self_refs {
            return Err(AsgError::SchemaViolation(format!(
                "cannot remove node {id}: {count} inbound edge target(s) remain",
                count = node.inbound - self_refs
            )));
        }
        for (target, ownership) in unlink {
            if target == id {
                continue;
            }
            let target_node = self.resolve_mut(target)?;
            target_node.inbound -= 1;
            if ownership && target_node.parent() == id {
                target_node.set_parent(NodeId::NONE);
            }
        }
        self.nodes.remove(&id);
        if self.root == id {
            self.root = NodeId::NONE;
        }
        tracing::debug!(%id, "removed node");
        Ok(())
    }

    fn checked_rule(
        &self,
        source: NodeId,
        edge: EdgeKind,
        multiplicity: Multiplicity,
    ) -> Result<&'static EdgeRule> {
        let kind = self.resolve(source)?.kind();
        let rule = kind.edge_rule(edge).ok_or_else(|| {
            AsgError::SchemaViolation(format!("kind {kind:?} does not declare edge {edge:?}"))
        })?;
        if rule.multiplicity != multiplicity {
            return Err(AsgError::SchemaViolation(format!(
                "edge {edge:?} of {kind:?} is {actual:?}, not {multiplicity:?}",
                actual = rule.multiplicity
            )));
        }
        Ok(rule)
    }

    fn check_target(&self, rule: &EdgeRule, source: NodeId, target: NodeId) -> Result<()> {
        let target_node = self.resolve(target)?;
        if !rule.targets.contains(target_node.kind()) {
            return Err(AsgError::SchemaViolation(format!(
                "edge {edge:?} may not target a {kind:?} node",
                edge = rule.edge,
                kind = target_node.kind()
            )));
        }
        if rule.ownership && !target_node.parent().is_none() && target_node.parent() != source {
            return Err(AsgError::SchemaViolation(format!(
                "node {target} is already owned by {parent}",
                parent = target_node.parent()
            )));
        }
        Ok(())
    }

    /// Set a single edge, replacing the prior target if any. Pass
    /// [`NodeId::NONE`] to clear. For an ownership edge the previous
    /// target's parent is reset and the new target's parent becomes
    /// `source`; claiming a target another node already owns is a
    /// `SchemaViolation`.
    pub fn set_single(&mut self, source: NodeId, edge: EdgeKind, target: NodeId) -> Result<()> {
        let rule = *self.checked_rule(source, edge, Multiplicity::Single)?;
        if !target.is_none() {
            self.check_target(&rule, source, target)?;
        }
        let slot = self.resolve_mut(source)?.slot_mut(edge)?;
        let previous = match slot {
            EdgeSlot::Single(id) => std::mem::replace(id, target),
            EdgeSlot::Multiple(_) => unreachable!("multiplicity checked above"),
        };
        if previous == target {
            return Ok(());
        }
        if !previous.is_none() {
            let previous_node = self.resolve_mut(previous)?;
            previous_node.inbound -= 1;
            if rule.ownership && previous_node.parent() == source {
                previous_node.set_parent(NodeId::NONE);
            }
        }
        if !target.is_none() {
            let target_node = self.resolve_mut(target)?;
            target_node.inbound += 1;
            if rule.ownership {
                target_node.set_parent(source);
            }
        }
        Ok(())
    }

    /// Clear a single edge, equivalent to setting the sentinel.
    pub fn clear_single(&mut self, source: NodeId, edge: EdgeKind) -> Result<()> {
        self.set_single(source, edge, NodeId::NONE)
    }

    /// Append a target to an ordered multi edge. For an ownership edge the
    /// target must be unowned and becomes a child of `source`; a
    /// non-ownership append never affects any other reference to the target
    /// and permits duplicates.
    pub fn append(&mut self, source: NodeId, edge: EdgeKind, target: NodeId) -> Result<()> {
        let rule = *self.checked_rule(source, edge, Multiplicity::Multiple)?;
        self.check_target(&rule, source, target)?;
        if rule.ownership && self.resolve(target)?.parent() == source {
            return Err(AsgError::SchemaViolation(format!(
                "node {target} is already owned by {source}"
            )));
        }
        match self.resolve_mut(source)?.slot_mut(edge)? {
            EdgeSlot::Multiple(ids) => ids.push(target),
            EdgeSlot::Single(_) => unreachable!("multiplicity checked above"),
        }
        let target_node = self.resolve_mut(target)?;
        target_node.inbound += 1;
        if rule.ownership {
            target_node.set_parent(source);
        }
        Ok(())
    }

    /// Detach one occurrence of `target` from an ordered multi edge, the
    /// inverse of [`Factory::append`]. For an ownership edge the target
    /// becomes an unattached root; it stays alive and keeps its own subtree.
    /// Fails with `SchemaViolation` when the edge holds no such target.
    pub fn remove_from_multi(
        &mut self,
        source: NodeId,
        edge: EdgeKind,
        target: NodeId,
    ) -> Result<()> {
        let rule = *self.checked_rule(source, edge, Multiplicity::Multiple)?;
        let ids = match self.resolve_mut(source)?.slot_mut(edge)? {
            EdgeSlot::Multiple(ids) => ids,
            EdgeSlot::Single(_) => unreachable!("multiplicity checked above"),
        };
        let position = ids.iter().position(|id| *id == target).ok_or_else(|| {
            AsgError::SchemaViolation(format!(
                "edge {edge:?} of {source} has no target {target}"
            ))
        })?;
        ids.remove(position);
        let target_node = self.resolve_mut(target)?;
        target_node.inbound -= 1;
        if rule.ownership && target_node.parent() == source {
            target_node.set_parent(NodeId::NONE);
        }
        tracing::debug!(%source, ?edge, %target, "detached edge target");
        Ok(())
    }

    fn require_capability(&mut self, id: NodeId, capability: Capability) -> Result<&mut Node> {
        let node = self.resolve_mut(id)?;
        if !node.kind().has_capability(capability) {
            return Err(AsgError::SchemaViolation(format!(
                "kind {kind:?} lacks the {capability:?} capability",
                kind = node.kind()
            )));
        }
        Ok(node)
    }

    /// Set the name and name range of a `Named` node.
    pub fn set_name(
        &mut self,
        id: NodeId,
        name: impl Into<String>,
        range: SourceRange,
    ) -> Result<()> {
        let node = self.require_capability(id, Capability::Named)?;
        let data = node.name_mut().expect("Named capability checked");
        data.name = name.into();
        data.range = range;
        Ok(())
    }

    /// Set the source range of a `Positioned` node.
    pub fn set_position(&mut self, id: NodeId, range: SourceRange) -> Result<()> {
        let node = self.require_capability(id, Capability::Positioned)?;
        node.position_mut().expect("Positioned capability checked").range = range;
        Ok(())
    }

    pub fn set_compiler_generated(&mut self, id: NodeId, flag: bool) -> Result<()> {
        let node = self.require_capability(id, Capability::Positioned)?;
        node.position_mut()
            .expect("Positioned capability checked")
            .compiler_generated = flag;
        Ok(())
    }

    pub fn set_tool_generated(&mut self, id: NodeId, flag: bool) -> Result<()> {
        let node = self.require_capability(id, Capability::Positioned)?;
        node.position_mut()
            .expect("Positioned capability checked")
            .tool_generated = flag;
        Ok(())
    }

    /// Set the text of a `Texted` (comment) node.
    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) -> Result<()> {
        let node = self.require_capability(id, Capability::Texted)?;
        *node.text_mut().expect("Texted capability checked") = text.into();
        Ok(())
    }

    /// Append an attribute record to a node.
    pub fn add_attribute(&mut self, id: NodeId, attribute: Attribute) -> Result<()> {
        self.resolve_mut(id)?.attributes_mut().push(attribute);
        Ok(())
    }

    /// Drop every node in one step and reset the root. The allocation
    /// watermark is kept, so identities from before the clear stay retired.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = NodeId::NONE;
    }
}
