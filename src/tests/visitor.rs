use test_log::test;

use crate::{
    node::Node,
    properties::{Direction, EdgeKind, NodeId, NodeKind},
    tests::helpers::sample_tree,
    visitor::{collect_subtree, EdgeTypeSet, Preorder, Visitor},
    AsgError, Factory, Result,
};

/// Records the full callback sequence of a traversal.
#[derive(Debug, PartialEq, Eq, Clone)]
enum Event {
    Pre(NodeId),
    Edge(NodeId, EdgeKind, Direction, NodeId),
    Post(NodeId),
}

#[derive(Default)]
struct Recorder {
    events: Vec<Event>,
    fail_on_pre: Option<NodeId>,
}

impl Visitor for Recorder {
    fn begin_node(&mut self, node: &Node) -> Result<()> {
        if self.fail_on_pre == Some(node.id()) {
            return Err(AsgError::Visitor("stop requested".to_string()));
        }
        self.events.push(Event::Pre(node.id()));
        Ok(())
    }

    fn end_node(&mut self, node: &Node) -> Result<()> {
        self.events.push(Event::Post(node.id()));
        Ok(())
    }

    fn visit_edge(
        &mut self,
        source: &Node,
        edge: EdgeKind,
        direction: Direction,
        target: &Node,
    ) -> Result<()> {
        self.events
            .push(Event::Edge(source.id(), edge, direction, target.id()));
        Ok(())
    }
}

fn run(factory: &Factory, selector: EdgeTypeSet, root: NodeId) -> Result<Vec<Event>> {
    let mut recorder = Recorder::default();
    Preorder::new(factory, selector).run(root, &mut recorder)?;
    Ok(recorder.events)
}

#[test]
fn members_only_walk_matches_scenario_a() {
    let mut factory = Factory::new();
    let class = factory.create(NodeKind::TypeDeclaration);
    let method = factory.create(NodeKind::NormalMethod);
    factory.append(class, EdgeKind::Members, method).unwrap();

    let selector = EdgeTypeSet::new().with(EdgeKind::Members, Direction::Forward);
    let events = run(&factory, selector, class).unwrap();
    assert_eq!(
        events,
        vec![
            Event::Pre(class),
            Event::Edge(class, EdgeKind::Members, Direction::Forward, method),
            Event::Pre(method),
            Event::Post(method),
            Event::Post(class),
        ]
    );
}

#[test]
fn traversal_is_deterministic() {
    let tree = sample_tree();
    let selector = EdgeTypeSet::ownership_tree()
        .with(EdgeKind::SuperClass, Direction::Forward)
        .with(EdgeKind::RefersTo, Direction::Forward);
    let first = run(&tree.factory, selector.clone(), tree.package).unwrap();
    let second = run(&tree.factory, selector, tree.package).unwrap();
    assert_eq!(first, second);
}

#[test]
fn ownership_tree_visits_every_node_exactly_once() {
    let tree = sample_tree();
    let order = collect_subtree(&tree.factory, tree.package).unwrap();
    assert_eq!(
        order,
        vec![
            tree.package,
            tree.widget,
            tree.render,
            tree.scale,
            tree.count,
            tree.gadget,
            tree.unit,
        ]
    );
}

#[test]
fn shared_cross_targets_recurse_once_but_fire_per_edge() {
    // Two methods call the same callee: the callee is entered once, yet the
    // edge callback fires for each occurrence.
    let mut factory = Factory::new();
    let class = factory.create(NodeKind::TypeDeclaration);
    let a = factory.create(NodeKind::NormalMethod);
    let b = factory.create(NodeKind::NormalMethod);
    let callee = factory.create(NodeKind::NormalMethod);
    factory.append(class, EdgeKind::Members, a).unwrap();
    factory.append(class, EdgeKind::Members, b).unwrap();
    factory.append(class, EdgeKind::Members, callee).unwrap();
    factory.append(a, EdgeKind::Calls, callee).unwrap();
    factory.append(b, EdgeKind::Calls, callee).unwrap();

    let selector = EdgeTypeSet::ownership_tree().with(EdgeKind::Calls, Direction::Forward);
    let events = run(&factory, selector, class).unwrap();

    let entered = events
        .iter()
        .filter(|event| matches!(event, Event::Pre(id) if *id == callee))
        .count();
    assert_eq!(entered, 1);
    let call_edges = events
        .iter()
        .filter(|event| matches!(event, Event::Edge(_, EdgeKind::Calls, _, _)))
        .count();
    assert_eq!(call_edges, 2);
}

#[test]
fn visitor_error_aborts_and_propagates_unchanged() {
    let tree = sample_tree();
    let mut recorder = Recorder {
        fail_on_pre: Some(tree.render),
        ..Recorder::default()
    };
    let err = Preorder::new(&tree.factory, EdgeTypeSet::ownership_tree())
        .run(tree.package, &mut recorder)
        .unwrap_err();
    assert_eq!(err, AsgError::Visitor("stop requested".to_string()));
    // Nothing after the failing callback ran.
    assert!(!recorder.events.contains(&Event::Post(tree.widget)));
    assert!(!recorder.events.contains(&Event::Pre(tree.scale)));
    // And the graph is untouched (traversal never mutates): same walk again.
    assert!(collect_subtree(&tree.factory, tree.package).is_ok());
}

#[test]
fn reverse_selector_walks_against_edge_direction() {
    let tree = sample_tree();
    // From Widget, find who extends it.
    let selector = EdgeTypeSet::new().with(EdgeKind::SuperClass, Direction::Reverse);
    let events = run(&tree.factory, selector, tree.widget).unwrap();
    assert_eq!(
        events,
        vec![
            Event::Pre(tree.widget),
            Event::Edge(tree.widget, EdgeKind::SuperClass, Direction::Reverse, tree.gadget),
            Event::Pre(tree.gadget),
            Event::Post(tree.gadget),
            Event::Post(tree.widget),
        ]
    );
}

#[test]
fn empty_selector_visits_only_the_root() {
    let tree = sample_tree();
    let events = run(&tree.factory, EdgeTypeSet::new(), tree.package).unwrap();
    assert_eq!(events, vec![Event::Pre(tree.package), Event::Post(tree.package)]);
}

#[test]
fn traversal_from_dangling_root_fails() {
    let tree = sample_tree();
    let err = run(
        &tree.factory,
        EdgeTypeSet::ownership_tree(),
        NodeId::from_u32(99),
    )
    .unwrap_err();
    assert_eq!(err, AsgError::DanglingReference(NodeId::from_u32(99)));
}
