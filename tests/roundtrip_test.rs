//! End-to-end exercise of the public surface: build a realistic logical
//! graph through the Factory, persist it to disk, and verify the reloaded
//! arena is indistinguishable from the original.

use test_log::test;

use asg_core::{
    codec, collect_subtree, AttrValue, Attribute, Direction, EdgeKind, EdgeTypeSet, Factory,
    Node, NodeId, NodeKind, Preorder, Result, SourceRange, Visitor, CONTEXT_METRIC,
};

/// A package with `classes` types, each owning `methods` methods; every
/// method calls its predecessor, and every type extends the first one.
fn build_project(classes: u32, methods: u32) -> Result<Factory> {
    let mut factory = Factory::new();
    let package = factory.create(NodeKind::Package);
    factory.set_name(package, "project", SourceRange::default())?;
    factory.set_root(package)?;

    let mut first_class = NodeId::NONE;
    let mut previous_method = NodeId::NONE;
    for c in 0..classes {
        let class = factory.create(NodeKind::TypeDeclaration);
        let path = format!("src/Class{c}.x");
        factory.set_name(
            class,
            format!("Class{c}"),
            SourceRange::new(path.as_str(), 1, 1, 1, 10),
        )?;
        factory.append(package, EdgeKind::Members, class)?;
        factory.add_attribute(
            class,
            Attribute::new("NOM", CONTEXT_METRIC, AttrValue::Int(methods as i64)),
        )?;
        if first_class.is_none() {
            first_class = class;
        } else {
            factory.set_single(class, EdgeKind::SuperClass, first_class)?;
        }

        for m in 0..methods {
            let method = factory.create(NodeKind::NormalMethod);
            factory.set_name(
                method,
                format!("method{m}"),
                SourceRange::new(path.as_str(), 2 + m, 5, 2 + m, 30),
            )?;
            factory.append(class, EdgeKind::Members, method)?;
            factory.set_single(method, EdgeKind::Returns, first_class)?;
            if !previous_method.is_none() {
                factory.append(method, EdgeKind::Calls, previous_method)?;
            }
            previous_method = method;
        }
    }
    Ok(factory)
}

struct Counter {
    nodes: usize,
    edges: usize,
}

impl Visitor for Counter {
    fn begin_node(&mut self, _node: &Node) -> Result<()> {
        self.nodes += 1;
        Ok(())
    }

    fn visit_edge(
        &mut self,
        _source: &Node,
        _edge: EdgeKind,
        _direction: Direction,
        _target: &Node,
    ) -> Result<()> {
        self.edges += 1;
        Ok(())
    }
}

#[test]
fn large_graph_survives_a_file_round_trip() {
    let factory = build_project(12, 8).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("project.asg");

    codec::save_file(&factory, &path).unwrap();
    let reloaded = codec::load_file(&path).unwrap();

    assert_eq!(reloaded.len(), factory.len());
    assert_eq!(reloaded.root(), factory.root());
    for node in factory.nodes() {
        let twin = reloaded.resolve(node.id()).unwrap();
        assert_eq!(twin.kind(), node.kind());
        assert_eq!(twin.parent(), node.parent());
        assert_eq!(twin.name(), node.name());
        assert_eq!(twin.attributes(), node.attributes());
        for ((edge, slot), (_, twin_slot)) in node.edges().zip(twin.edges()) {
            assert_eq!(
                twin_slot.targets(),
                slot.targets(),
                "edge {edge:?} of {} reordered or lost",
                node.id()
            );
        }
    }

    // Identity stability: the ownership walk is the same walk.
    assert_eq!(
        collect_subtree(&factory, factory.root()).unwrap(),
        collect_subtree(&reloaded, reloaded.root()).unwrap()
    );
}

#[test]
fn reference_graph_walk_reaches_beyond_the_ownership_tree() {
    let factory = build_project(3, 2).unwrap();
    let root = factory.root();

    let tree_only = collect_subtree(&factory, root).unwrap();
    assert_eq!(tree_only.len(), factory.len());

    // The full reference graph revisits nothing but fires an edge callback
    // per Calls/SuperClass/Returns occurrence on top of the ownership edges.
    let selector = EdgeTypeSet::ownership_tree()
        .with(EdgeKind::SuperClass, Direction::Forward)
        .with(EdgeKind::Returns, Direction::Forward)
        .with(EdgeKind::Calls, Direction::Forward);
    let mut counter = Counter { nodes: 0, edges: 0 };
    Preorder::new(&factory, selector).run(root, &mut counter).unwrap();
    assert_eq!(counter.nodes, factory.len());
    // 9 ownership edges + 2 SuperClass + 6 Returns + 5 Calls.
    assert_eq!(counter.edges, 22);
}

#[test]
fn attribute_queries_serve_downstream_consumers() {
    let factory = build_project(2, 1).unwrap();
    let root = factory.root();
    let classes = factory.resolve(root).unwrap().multi_edge(EdgeKind::Members).unwrap();
    for class in classes {
        let node = factory.resolve(*class).unwrap();
        let found = node.find_attribute(asg_core::AttrKind::Int, "NOM", CONTEXT_METRIC);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].value, AttrValue::Int(1));
    }
}
