use sylva::{
    MemoryTarget, ModelProperty, NodePath, PathSegment, ReconciliationEngine, TargetAdapter,
    TreeModel, TreeModelBuilder, Value,
};

pub fn path(s: &str) -> NodePath {
    s.parse().expect("Should parse path")
}

pub fn seg(s: &str) -> PathSegment {
    s.parse().expect("Should parse segment")
}

/// Empty desired state covering the whole target
pub fn empty_root() -> TreeModel {
    TreeModel::minimal(NodePath::root(), "app:root")
}

/// Small site fixture: /site with a title, a mixin and a banner child
pub fn site_model() -> TreeModel {
    let mut builder = TreeModelBuilder::new(NodePath::root(), "app:root");
    let site = builder
        .add_node(&NodePath::root(), "site", "app:site")
        .expect("Should add site node");
    builder
        .add_property(
            &site,
            ModelProperty::single("title", Value::String("v1".to_string())),
        )
        .expect("Should add title");
    builder
        .add_mixin(&site, "mix:a")
        .expect("Should add mixin");
    builder
        .add_node(&site, "banner", "app:item")
        .expect("Should add banner node");
    builder.build()
}

/// Force-apply `model` and commit, so the target's live state matches it
pub fn seed(target: &mut MemoryTarget, model: &TreeModel) {
    init_tracing();
    ReconciliationEngine::new(target)
        .apply(&empty_root(), model, true)
        .expect("Should seed the target");
    target.commit().expect("Should commit the seeded state");
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("sylva=debug")
        .try_init();
}
