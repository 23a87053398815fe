//! [crate::visitor] contains the double-dispatch depth-first traversal engine
//! and the [`EdgeTypeSet`] filter that scopes it.
//!
//! A traversal walks the graph through [`Factory::resolve`] only; it holds a
//! shared borrow of the arena for its whole run, so the forbidden case of a
//! visitor mutating edges mid-walk is unrepresentable here rather than merely
//! documented.
//!
//! Determinism: at each node the engine follows the node kind's
//! schema-declared edge order, then (for reverse selectors) the edge kinds in
//! declaration order with sources in ascending identity order. Two runs over
//! the same graph with the same [`EdgeTypeSet`] and read-only visitors
//! produce identical visit sequences.

use enumset::EnumSet;
use std::collections::{BTreeMap, BTreeSet};

use crate::{
    error::Result,
    factory::Factory,
    node::Node,
    properties::{Direction, EdgeKind, NodeId, NodeKind},
};

/// Caller-built set of (edge kind, direction) selectors scoping a traversal.
///
/// Restricting the set to ownership edges (see
/// [`EdgeTypeSet::ownership_tree`]) yields a strict tree walk over an acyclic
/// ownership subgraph; adding cross-reference edges widens the walk to the
/// general reference graph.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EdgeTypeSet {
    forward: EnumSet<EdgeKind>,
    reverse: EnumSet<EdgeKind>,
}

impl EdgeTypeSet {
    pub fn new() -> EdgeTypeSet {
        EdgeTypeSet::default()
    }

    /// Every ownership edge in the schema, forward direction. The canonical
    /// "ownership tree only" selector.
    pub fn ownership_tree() -> EdgeTypeSet {
        let mut set = EdgeTypeSet::new();
        for kind in EnumSet::<NodeKind>::all() {
            for rule in kind.edge_rules() {
                if rule.ownership {
                    set.insert(rule.edge, Direction::Forward);
                }
            }
        }
        set
    }

    pub fn insert(&mut self, edge: EdgeKind, direction: Direction) {
        match direction {
            Direction::Forward => self.forward.insert(edge),
            Direction::Reverse => self.reverse.insert(edge),
        };
    }

    /// Builder-style [`EdgeTypeSet::insert`].
    pub fn with(mut self, edge: EdgeKind, direction: Direction) -> EdgeTypeSet {
        self.insert(edge, direction);
        self
    }

    pub fn contains(&self, edge: EdgeKind, direction: Direction) -> bool {
        match direction {
            Direction::Forward => self.forward.contains(edge),
            Direction::Reverse => self.reverse.contains(edge),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty() && self.reverse.is_empty()
    }

    fn reverse_edges(&self) -> EnumSet<EdgeKind> {
        self.reverse
    }
}

/// Traversal callbacks. Each may fail; a failure aborts the active traversal
/// immediately and propagates unchanged to the caller of
/// [`Preorder::run`]. Raise [`AsgError::Visitor`](crate::AsgError::Visitor)
/// for visitor-originated conditions.
///
/// Dispatch on [`Node::kind`] inside the callbacks for per-kind behavior; the
/// kind set is closed, so a `match` is exhaustive.
pub trait Visitor {
    /// Invoked before any of the node's edges are walked.
    fn begin_node(&mut self, node: &Node) -> Result<()> {
        let _ = node;
        Ok(())
    }

    /// Invoked after all of the node's matching edges have been walked.
    fn end_node(&mut self, node: &Node) -> Result<()> {
        let _ = node;
        Ok(())
    }

    /// Invoked once per (source, edge, target) occurrence matching the
    /// selector, before recursing into the target.
    fn visit_edge(
        &mut self,
        source: &Node,
        edge: EdgeKind,
        direction: Direction,
        target: &Node,
    ) -> Result<()> {
        let _ = (source, edge, direction, target);
        Ok(())
    }
}

/// Reverse adjacency of the whole arena for the selected edge kinds, built
/// once per run when any reverse selector is present.
type ReverseIndex = BTreeMap<(NodeId, EdgeKind), Vec<NodeId>>;

/// Depth-first pre-order traversal over a [`Factory`], scoped by an
/// [`EdgeTypeSet`].
///
/// Ownership and cross edges together can make the graph a general DAG (or
/// cyclic through reverse selectors), so the engine keeps a visited set and
/// never recurses into an identity twice; edge callbacks still fire for every
/// matching edge occurrence.
pub struct Preorder<'a> {
    factory: &'a Factory,
    selector: EdgeTypeSet,
}

impl<'a> Preorder<'a> {
    pub fn new(factory: &'a Factory, selector: EdgeTypeSet) -> Preorder<'a> {
        Preorder { factory, selector }
    }

    /// Run the traversal from `root`. Fails with `DanglingReference` if any
    /// walked edge targets an unallocated identity.
    pub fn run(&self, root: NodeId, visitor: &mut dyn Visitor) -> Result<()> {
        let reverse = self.build_reverse_index()?;
        let mut visited = BTreeSet::new();
        self.walk(root, visitor, &mut visited, &reverse)
    }

    fn build_reverse_index(&self) -> Result<ReverseIndex> {
        let mut index = ReverseIndex::new();
        let selected = self.selector.reverse_edges();
        if selected.is_empty() {
            return Ok(index);
        }
        for node in self.factory.nodes() {
            for (edge, slot) in node.edges() {
                if !selected.contains(edge) {
                    continue;
                }
                for target in slot.targets() {
                    index
                        .entry((*target, edge))
                        .or_default()
                        .push(node.id());
                }
            }
        }
        Ok(index)
    }

    fn walk(
        &self,
        id: NodeId,
        visitor: &mut dyn Visitor,
        visited: &mut BTreeSet<NodeId>,
        reverse: &ReverseIndex,
    ) -> Result<()> {
        let node = self.factory.resolve(id)?;
        visited.insert(id);
        visitor.begin_node(node)?;

        for rule in node.kind().edge_rules() {
            if !self.selector.contains(rule.edge, Direction::Forward) {
                continue;
            }
            let targets: Vec<NodeId> = node.slot(rule.edge)?.targets().to_vec();
            for target in targets {
                let target_node = self.factory.resolve(target)?;
                visitor.visit_edge(node, rule.edge, Direction::Forward, target_node)?;
                if !visited.contains(&target) {
                    self.walk(target, visitor, visited, reverse)?;
                }
            }
        }

        for edge in self.selector.reverse_edges() {
            let Some(sources) = reverse.get(&(id, edge)) else {
                continue;
            };
            for source in sources {
                let source_node = self.factory.resolve(*source)?;
                visitor.visit_edge(node, edge, Direction::Reverse, source_node)?;
                if !visited.contains(source) {
                    self.walk(*source, visitor, visited, reverse)?;
                }
            }
        }

        visitor.end_node(node)
    }
}

struct SubtreeCollector {
    ids: Vec<NodeId>,
}

impl Visitor for SubtreeCollector {
    fn begin_node(&mut self, node: &Node) -> Result<()> {
        self.ids.push(node.id());
        Ok(())
    }
}

/// Enumerate the ownership subtree under `root` in pre-order visit order,
/// root included.
pub fn collect_subtree(factory: &Factory, root: NodeId) -> Result<Vec<NodeId>> {
    let mut collector = SubtreeCollector { ids: Vec::new() };
    Preorder::new(factory, EdgeTypeSet::ownership_tree()).run(root, &mut collector)?;
    Ok(collector.ids)
}
