mod common;

use common::{path, seed, seg, site_model};
use sylva::{
    ExportDeltaComputer, ExportError, MemoryTarget, ModelProperty, NodePath, PropertyKind,
    PropertyState, ReconciliationEngine, ReferenceValue, TargetAdapter, TargetError,
    TreeModelBuilder, Value, ValueType,
};

// ============ Round-Trip Tests ============

#[test]
fn test_round_trip_reproduces_the_update() {
    let mut builder = TreeModelBuilder::new(NodePath::root(), "app:root");
    builder
        .add_property(
            &NodePath::root(),
            ModelProperty::single("title", Value::String("v1".to_string())),
        )
        .unwrap();
    builder
        .add_property(
            &NodePath::root(),
            ModelProperty::single("legacy", Value::String("old".to_string())),
        )
        .unwrap();
    let a = builder.add_node(&NodePath::root(), "a", "app:item").unwrap();
    builder
        .add_property(&a, ModelProperty::single("flag", Value::Boolean(true)))
        .unwrap();
    builder.add_node(&NodePath::root(), "b", "app:item").unwrap();
    builder.add_node(&NodePath::root(), "c", "app:item").unwrap();
    let baseline = builder.build();

    // the next desired state: changed value, removed property and node,
    // new mixin, new reference, new subtree
    let mut builder = TreeModelBuilder::new(NodePath::root(), "app:root");
    builder
        .add_property(
            &NodePath::root(),
            ModelProperty::single("title", Value::String("v2".to_string())),
        )
        .unwrap();
    builder
        .add_property(
            &NodePath::root(),
            ModelProperty::single(
                "ref",
                Value::Reference(ReferenceValue::Path("/a".to_string())),
            ),
        )
        .unwrap();
    builder.add_mixin(&NodePath::root(), "mix:marked").unwrap();
    let a = builder.add_node(&NodePath::root(), "a", "app:item").unwrap();
    builder
        .add_property(&a, ModelProperty::single("flag", Value::Boolean(false)))
        .unwrap();
    builder.add_node(&NodePath::root(), "c", "app:item").unwrap();
    let d = builder.add_node(&NodePath::root(), "d", "app:thing").unwrap();
    builder
        .add_property(&d, ModelProperty::single("name", Value::String("d".to_string())))
        .unwrap();
    let update = builder.build();

    let mut target = MemoryTarget::new("app:root");
    seed(&mut target, &baseline);
    ReconciliationEngine::new(&mut target)
        .apply(&baseline, &update, false)
        .expect("Should apply the update");

    let fragment = ExportDeltaComputer::new(&target)
        .export(&NodePath::root(), &baseline)
        .expect("Should export");
    assert_eq!(fragment, update);
}

#[test]
fn test_reapplying_an_export_is_a_noop() {
    let baseline = site_model();
    let mut target = MemoryTarget::new("app:root");
    seed(&mut target, &baseline);

    target
        .set_property(
            &path("/site"),
            "title",
            PropertyState::single(Value::String("manual".to_string())),
        )
        .unwrap();
    let extra = target
        .create_child(&path("/site"), "extra", "app:item", None)
        .unwrap();
    target
        .set_property(
            &extra,
            "note",
            PropertyState::single(Value::String("mine".to_string())),
        )
        .unwrap();
    target.remove_node(&path("/site/banner")).unwrap();

    let fragment = ExportDeltaComputer::new(&target)
        .export(&NodePath::root(), &baseline)
        .expect("Should export the drift");
    let report = ReconciliationEngine::new(&mut target)
        .apply(&baseline, &fragment, false)
        .expect("Should re-apply the export");
    assert!(report.is_noop());
}

// ============ Drift Capture Tests ============

#[test]
fn test_export_captures_runtime_drift() {
    let baseline = site_model();
    let mut target = MemoryTarget::new("app:root");
    seed(&mut target, &baseline);

    target
        .set_property(
            &path("/site"),
            "title",
            PropertyState::single(Value::String("manual".to_string())),
        )
        .unwrap();
    let extra = target
        .create_child(&path("/site"), "extra", "app:item", None)
        .unwrap();
    target
        .set_property(
            &extra,
            "note",
            PropertyState::single(Value::String("mine".to_string())),
        )
        .unwrap();
    target.remove_node(&path("/site/banner")).unwrap();

    let fragment = ExportDeltaComputer::new(&target)
        .export(&NodePath::root(), &baseline)
        .expect("Should export the drift");

    let site = fragment.node(&path("/site")).expect("site is exported");
    assert_eq!(
        site.property("title").unwrap().values,
        vec![Value::String("manual".to_string())]
    );
    assert!(site.mixins.contains("mix:a"));
    assert!(fragment.contains(&path("/site/extra")));
    assert_eq!(
        fragment
            .node(&path("/site/extra"))
            .unwrap()
            .property("note")
            .unwrap()
            .values,
        vec![Value::String("mine".to_string())]
    );
    assert!(!fragment.contains(&path("/site/banner")));
}

#[test]
fn test_inserted_child_gets_an_order_hint() {
    let mut builder = TreeModelBuilder::new(NodePath::root(), "app:root");
    builder.add_node(&NodePath::root(), "a", "app:item").unwrap();
    builder.add_node(&NodePath::root(), "b", "app:item").unwrap();
    let baseline = builder.build();

    let mut target = MemoryTarget::new("app:root");
    seed(&mut target, &baseline);
    target
        .create_child(&NodePath::root(), "new", "app:item", None)
        .unwrap();
    target
        .move_before(&NodePath::root(), &seg("new"), Some(&seg("b")))
        .unwrap();

    let fragment = ExportDeltaComputer::new(&target)
        .export(&NodePath::root(), &baseline)
        .expect("Should export");
    assert_eq!(
        fragment.node(&path("/new")).unwrap().order_before,
        Some(seg("b"))
    );
    assert_eq!(fragment.node(&path("/a")).unwrap().order_before, None);
    assert_eq!(fragment.node(&path("/b")).unwrap().order_before, None);
}

#[test]
fn test_cardinality_change_replaces_the_property() {
    let mut builder = TreeModelBuilder::new(NodePath::root(), "app:root");
    builder
        .add_property(
            &NodePath::root(),
            ModelProperty::multiple(
                "tags",
                ValueType::String,
                vec![
                    Value::String("one".to_string()),
                    Value::String("two".to_string()),
                ],
            ),
        )
        .unwrap();
    let baseline = builder.build();

    let mut target = MemoryTarget::new("app:root");
    seed(&mut target, &baseline);
    // runtime replaced the list with a single long
    target
        .set_property(
            &NodePath::root(),
            "tags",
            PropertyState::single(Value::Long(7)),
        )
        .unwrap();

    let fragment = ExportDeltaComputer::new(&target)
        .export(&NodePath::root(), &baseline)
        .expect("Should export");
    let tags = fragment.root().property("tags").expect("tags survives");
    assert_eq!(tags.kind, PropertyKind::Single);
    assert_eq!(tags.value_type, ValueType::Long);
    assert_eq!(tags.values, vec![Value::Long(7)]);
}

#[test]
fn test_wholesale_export_does_not_pin_identities() {
    let mut builder = TreeModelBuilder::new(NodePath::root(), "app:root");
    let a = builder.add_node(&NodePath::root(), "a", "app:item").unwrap();
    let pinned = uuid::Uuid::new_v4();
    builder.set_identity(&a, pinned).unwrap();
    let baseline = builder.build();

    let mut target = MemoryTarget::new("app:root");
    seed(&mut target, &baseline);
    target
        .create_child(&NodePath::root(), "b", "app:item", None)
        .unwrap();

    let fragment = ExportDeltaComputer::new(&target)
        .export(&NodePath::root(), &baseline)
        .expect("Should export");
    // a pinned node keeps its pin; a node new to the model never gains
    // one, since pins are authored rather than inferred from live ids
    assert_eq!(fragment.node(&path("/a")).unwrap().identity, Some(pinned));
    assert_eq!(fragment.node(&path("/b")).unwrap().identity, None);
}

// ============ Failure Tests ============

#[test]
fn test_export_of_a_missing_subtree_fails() {
    let target = MemoryTarget::new("app:root");
    let baseline = common::empty_root();
    let result = ExportDeltaComputer::new(&target).export(&path("/ghost"), &baseline);
    assert!(matches!(
        result,
        Err(ExportError::Target(TargetError::NodeNotFound(_)))
    ));
}
