//! # asg-core
//!
//! The in-memory graph substrate of a static-analysis toolchain: analyzed
//! program structure is held as an **Abstract Semantic Graph** (ASG) — a
//! typed, attributed, directed graph of nodes and edges — and this crate is
//! the machinery to build, traverse, query, and persist that graph.
//!
//! ## Overview
//!
//! - **[`properties`]**: the closed schema catalog ([`NodeKind`],
//!   [`EdgeKind`], [`Capability`], per-kind [`EdgeRule`] tables), node
//!   identities, source ranges, and the typed attribute model.
//! - **[`node`]**: node state and read accessors; capabilities (Named,
//!   Positioned, Commentable, Texted) are composed statically per kind.
//! - **[`factory`]**: the arena. It exclusively owns every node, allocates
//!   stable identities, and is the only mutation surface; its edge mutators
//!   enforce target-kind constraints, multiplicity, and the single-parent
//!   invariant at call time.
//! - **[`visitor`]**: deterministic depth-first pre-order traversal scoped by
//!   an [`EdgeTypeSet`] of (edge kind, direction) selectors, with pre-node,
//!   post-node, and per-edge callbacks.
//! - **[`codec`]**: stable binary persistence with forward-reference support;
//!   a round trip reproduces identities, kinds, ordered edges, and
//!   attributes exactly.
//!
//! Parsing frontends, metric engines, and launchers are external
//! collaborators: they consume this crate through node creation/mutation,
//! traversal, attribute queries, and save/load, and nothing else.
//!
//! ## Quick start
//!
//! ```rust
//! use asg_core::{
//!     codec, collect_subtree, Direction, EdgeKind, EdgeTypeSet, Factory, NodeKind, Preorder,
//!     SourceRange,
//! };
//!
//! # fn main() -> Result<(), asg_core::AsgError> {
//! let mut factory = Factory::new();
//!
//! // Wire up a tiny logical tree: a package owning a type owning a method.
//! let package = factory.create(NodeKind::Package);
//! let class = factory.create(NodeKind::TypeDeclaration);
//! let method = factory.create(NodeKind::NormalMethod);
//! factory.set_name(class, "Widget", SourceRange::default())?;
//! factory.append(package, EdgeKind::Members, class)?;
//! factory.append(class, EdgeKind::Members, method)?;
//! factory.set_root(package)?;
//!
//! // Ownership edges set the parent field as a side effect.
//! assert_eq!(factory.resolve(method)?.parent(), class);
//!
//! // Walk the ownership tree only.
//! let order = collect_subtree(&factory, package)?;
//! assert_eq!(order, vec![package, class, method]);
//!
//! // Or scope a traversal to any (edge, direction) subset.
//! let selector = EdgeTypeSet::new().with(EdgeKind::Members, Direction::Forward);
//! let mut names = Vec::new();
//! struct Collect<'a>(&'a mut Vec<String>);
//! impl asg_core::Visitor for Collect<'_> {
//!     fn begin_node(&mut self, node: &asg_core::Node) -> Result<(), asg_core::AsgError> {
//!         self.0.push(node.name().unwrap_or("<anonymous>").to_string());
//!         Ok(())
//!     }
//! }
//! Preorder::new(&factory, selector).run(package, &mut Collect(&mut names))?;
//! assert_eq!(names, vec!["", "Widget", ""]);
//!
//! // Round-trip through the binary protocol; identities are stable.
//! let mut bytes = Vec::new();
//! codec::save(&factory, &mut bytes)?;
//! let reloaded = codec::load(&mut bytes.as_slice())?;
//! assert_eq!(reloaded.resolve(class)?.name(), Some("Widget"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Invariants
//!
//! - Identity 0 is the "no node" sentinel and is never allocated.
//! - A node's parent is the unique node holding an ownership edge to it;
//!   ownership is exclusive, and only the Factory writes the parent field.
//! - Non-ownership (cross-reference) edges never affect parents, so the
//!   graph is a tree of ownership edges overlaid with an arbitrary reference
//!   graph.
//! - Multi-valued edges preserve insertion order.
//! - Dangling identities fail loudly:
//!   [`Factory::resolve`](factory::Factory::resolve), traversal, and load
//!   all report [`AsgError::DanglingReference`] instead of skipping.
//!
//! ## Concurrency
//!
//! Single-threaded, synchronous, single-writer. A `Factory` confines one
//! analysis run; read-only traversals borrow it shared, mutation borrows it
//! exclusively, and the borrow checker enforces the "no mutation during
//! traversal" contract. There is no locking, transaction, or retry layer in
//! this crate.

pub mod codec;
pub mod error;
pub mod factory;
pub mod node;
pub mod properties;
#[cfg(test)]
mod tests;
pub mod visitor;

pub use error::{AsgError, Result};
pub use factory::Factory;
pub use node::{EdgeSlot, NameData, Node, PositionData};
pub use properties::{
    AttrKind, AttrValue, Attribute, Capability, Direction, EdgeKind, EdgeRule, Multiplicity,
    NodeId, NodeKind, SourceRange, CONTEXT_ATTRIBUTE, CONTEXT_METRIC,
};
pub use visitor::{collect_subtree, EdgeTypeSet, Preorder, Visitor};
