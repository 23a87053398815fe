//! Shared test utilities for building small graphs.

use crate::{
    factory::Factory,
    properties::{EdgeKind, NodeId, NodeKind, SourceRange},
};

/// Initialize logging for tests.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

pub fn range(line: u32) -> SourceRange {
    SourceRange::new("src/Widget.x", line, 1, line, 40)
}

pub struct SampleTree {
    pub factory: Factory,
    pub package: NodeId,
    pub unit: NodeId,
    pub widget: NodeId,
    pub gadget: NodeId,
    pub render: NodeId,
    pub scale: NodeId,
    pub count: NodeId,
}

/// A package owning one compilation unit and two types; `Widget` owns a
/// method (with one parameter, as a `render` would have) and a variable,
/// `Gadget` extends `Widget`, and the variable refers to `Gadget`.
pub fn sample_tree() -> SampleTree {
    init_logging();
    let mut factory = Factory::new();

    let package = factory.create(NodeKind::Package);
    let unit = factory.create(NodeKind::CompilationUnit);
    let widget = factory.create(NodeKind::TypeDeclaration);
    let gadget = factory.create(NodeKind::TypeDeclaration);
    let render = factory.create(NodeKind::NormalMethod);
    let scale = factory.create(NodeKind::Parameter);
    let count = factory.create(NodeKind::Variable);

    factory.set_name(package, "app", SourceRange::default()).unwrap();
    factory.set_name(widget, "Widget", range(3)).unwrap();
    factory.set_name(gadget, "Gadget", range(40)).unwrap();
    factory.set_name(render, "render", range(5)).unwrap();
    factory.set_name(scale, "scale", range(5)).unwrap();
    factory.set_name(count, "count", range(11)).unwrap();

    factory.append(package, EdgeKind::Units, unit).unwrap();
    factory.append(package, EdgeKind::Members, widget).unwrap();
    factory.append(package, EdgeKind::Members, gadget).unwrap();
    factory.append(widget, EdgeKind::Members, render).unwrap();
    factory.append(widget, EdgeKind::Members, count).unwrap();
    factory.append(render, EdgeKind::Parameters, scale).unwrap();

    factory.set_single(gadget, EdgeKind::SuperClass, widget).unwrap();
    factory.set_single(count, EdgeKind::RefersTo, gadget).unwrap();

    factory.set_root(package).unwrap();

    SampleTree {
        factory,
        package,
        unit,
        widget,
        gadget,
        render,
        scale,
        count,
    }
}
