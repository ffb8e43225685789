use std::path::PathBuf;
use std::sync::Arc;

use globalstate_core_types::{
    Graph, Introspection, Node, NodeId, Runtime, Setting, SettingScope, StateError, Value,
};
use globalstate_policy_center::ExclusionPolicy;
use globalstate_state_center::{array_default, ClassDecl, InMemoryRuntime, InterfaceDecl, Origin};
use indexmap::IndexMap;
use pretty_assertions::assert_eq;

use crate::{
    CapturedValue, CodeExporter, DeepCopyEngine, GraphSafetyClassifier, Location, OmissionReason,
    Restorer, SnapErrKind, SnapError, Snapshot, SnapshotOptions, UnsafeMember, UnsafeReason,
};

fn open_policy() -> Arc<ExclusionPolicy> {
    Arc::new(ExclusionPolicy::new())
}

fn entries(runtime: &InMemoryRuntime, value: &Value) -> Vec<(String, Value)> {
    let id = value.node_id().expect("composite value");
    match runtime.heap().get(id) {
        Some(Node::Array { entries }) => entries
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
        other => panic!("expected array, got {other:?}"),
    }
}

fn push_entry(runtime: &mut InMemoryRuntime, target: &Value, key: &str, value: Value) {
    let id = target.node_id().expect("composite value");
    match runtime.heap_mut().get_mut(id) {
        Some(Node::Array { entries }) => {
            entries.insert(key.to_string(), value);
        }
        other => panic!("expected array, got {other:?}"),
    }
}

fn container(runtime: &InMemoryRuntime, name: &str) -> Vec<(String, Value)> {
    runtime.container_entries(name).expect("container present")
}

fn scalar_global(runtime: &InMemoryRuntime, name: &str) -> Option<Value> {
    runtime.global(name).cloned()
}

#[test]
fn scalars_and_plain_arrays_are_safe() {
    let mut runtime = InMemoryRuntime::new();
    let inner = runtime.alloc(Node::list([Value::Int(1), Value::Int(2)])).unwrap();
    let outer = runtime.alloc(Node::array([("inner", inner), ("name", Value::str("x"))])).unwrap();

    let classifier = GraphSafetyClassifier::new(&runtime);
    assert!(classifier.is_safe_to_duplicate(&Value::Null));
    assert!(classifier.is_safe_to_duplicate(&Value::str("text")));
    assert!(classifier.is_safe_to_duplicate(&outer));
    assert!(classifier.unsafe_members(&outer).is_empty());
}

#[test]
fn self_referential_array_terminates() {
    let mut runtime = InMemoryRuntime::new();
    let array = runtime.alloc(Node::list([Value::Int(1)])).unwrap();
    push_entry(&mut runtime, &array, "self", array.clone());

    let classifier = GraphSafetyClassifier::new(&runtime);
    assert!(classifier.is_safe_to_duplicate(&array));
    assert!(classifier.unsafe_members(&array).is_empty());
}

#[test]
fn resource_inside_a_cycle_is_found() {
    let mut runtime = InMemoryRuntime::new();
    let handle = runtime.alloc(Node::resource("stream")).unwrap();
    let array = runtime.alloc(Node::list([Value::Int(1), handle])).unwrap();
    push_entry(&mut runtime, &array, "loop", array.clone());

    let classifier = GraphSafetyClassifier::new(&runtime);
    assert!(!classifier.is_safe_to_duplicate(&array));
    assert_eq!(
        classifier.unsafe_members(&array),
        vec![UnsafeMember {
            path: "$[1]".into(),
            reason: UnsafeReason::Resource {
                resource: "stream".into()
            },
        }]
    );
}

#[test]
fn shared_unsafe_member_is_reported_once() {
    let mut runtime = InMemoryRuntime::new();
    let handle = runtime.alloc(Node::resource("socket")).unwrap();
    let left = runtime.alloc(Node::list([handle.clone()])).unwrap();
    let right = runtime.alloc(Node::list([handle])).unwrap();
    let root = runtime.alloc(Node::array([("left", left), ("right", right)])).unwrap();

    let members = GraphSafetyClassifier::new(&runtime).unsafe_members(&root);
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].path, "$[left][0]");
}

#[test]
fn closures_and_unserializable_objects_are_unsafe() {
    let mut runtime = InMemoryRuntime::new();
    runtime
        .declare_class(ClassDecl::user("Connection").not_serializable())
        .unwrap();
    runtime.declare_class(ClassDecl::user("Point")).unwrap();
    let connection = runtime
        .alloc(Node::object("Connection", [("dsn", Value::str("db"))]))
        .unwrap();
    let callback = runtime
        .alloc(Node::Closure {
            bound: IndexMap::new(),
        })
        .unwrap();
    let point = runtime.alloc(Node::object("Point", [("x", Value::Int(1))])).unwrap();
    let root = runtime.alloc(Node::list([connection, callback])).unwrap();

    let classifier = GraphSafetyClassifier::new(&runtime);
    assert!(classifier.is_safe_to_duplicate(&point));
    assert_eq!(
        classifier.unsafe_members(&root),
        vec![
            UnsafeMember {
                path: "$[0]".into(),
                reason: UnsafeReason::Unserializable {
                    class: "Connection".into()
                },
            },
            UnsafeMember {
                path: "$[1]".into(),
                reason: UnsafeReason::AnonymousType,
            },
        ]
    );
}

#[test]
fn dangling_reference_is_unsafe() {
    let runtime = InMemoryRuntime::new();
    let dangling = Value::Ref(NodeId(404));
    let classifier = GraphSafetyClassifier::new(&runtime);
    assert!(!classifier.is_safe_to_duplicate(&dangling));
    assert_eq!(
        classifier.unsafe_members(&dangling)[0].reason,
        UnsafeReason::Dangling { node: NodeId(404) }
    );
}

#[test]
fn copy_is_isolated_from_later_mutation() {
    let mut runtime = InMemoryRuntime::new();
    let array = runtime.alloc(Node::list([Value::Int(1), Value::Int(2)])).unwrap();
    let copy = DeepCopyEngine::new(&runtime).copy(&array).unwrap();

    push_entry(&mut runtime, &array, "0", Value::Int(99));

    assert_eq!(
        copy.graph().root_node(),
        Some(&Node::list([Value::Int(1), Value::Int(2)]))
    );
    assert!(!runtime.heap().equals_graph(&array, copy.graph()));
}

#[test]
fn copy_preserves_sharing_and_cycles() {
    let mut runtime = InMemoryRuntime::new();
    let shared = runtime.alloc(Node::list([Value::Int(7)])).unwrap();
    let root = runtime.alloc(Node::array([("a", shared.clone()), ("b", shared)])).unwrap();
    push_entry(&mut runtime, &root, "self", root.clone());

    let graph = DeepCopyEngine::new(&runtime).detach(&root).unwrap();
    assert_eq!(graph.nodes().len(), 2);

    let attached = runtime.heap_mut().attach(&graph).unwrap();
    let members = entries(&runtime, &attached);
    assert_eq!(members[0].1, members[1].1);
    assert_ne!(members[0].1, attached);
    assert_eq!(members[2].1, attached);
    assert!(runtime.heap().equals_graph(&attached, &graph));
}

#[test]
fn copy_rejects_values_that_cannot_be_duplicated() {
    let mut runtime = InMemoryRuntime::new();
    let handle = runtime.alloc(Node::resource("file")).unwrap();
    let root = runtime.alloc(Node::list([handle])).unwrap();

    let err = DeepCopyEngine::new(&runtime).copy(&root).unwrap_err();
    assert!(matches!(err.kind(), SnapErrKind::CopyFailed(_)));

    let scalar = DeepCopyEngine::new(&runtime).copy(&Value::Float(1.5)).unwrap();
    assert_eq!(scalar.as_scalar(), Some(&Value::Float(1.5)));
    assert!(scalar.graph().nodes().is_empty());
}

#[test]
fn nothing_is_captured_without_categories() {
    let mut runtime = InMemoryRuntime::new();
    runtime.set_global("answer", Value::Int(42));
    runtime.define_constant("VERSION", Value::str("1.0"), Origin::User);
    runtime.declare_class(ClassDecl::user("Config")).unwrap();

    let snapshot = Snapshot::capture(open_policy(), &runtime, SnapshotOptions::none());
    assert!(snapshot.global_variables().is_empty());
    assert!(snapshot.container_variables().is_empty());
    assert!(snapshot.constants().is_empty());
    assert!(snapshot.classes().is_empty());
    assert!(snapshot.captured_classes().is_none());
    assert_eq!(snapshot.report().captured, 0);
}

#[test]
fn globals_capture_skips_reserved_excluded_and_unsafe_values() {
    let mut runtime = InMemoryRuntime::new();
    runtime.set_global("nothing", Value::Null);
    runtime.set_global("flag", Value::Bool(false));
    runtime.set_global("zero", Value::Int(0));
    runtime.set_global("token", Value::str("secret"));
    runtime.set_global("GLOBALS", Value::Null);
    runtime.set_container("_GET", [("page", Value::Int(1))]).unwrap();
    let handle = runtime.alloc(Node::resource("stream")).unwrap();
    runtime.set_global("log", handle);
    let callback = runtime
        .alloc(Node::Closure {
            bound: IndexMap::new(),
        })
        .unwrap();
    runtime.set_global("callback", callback);

    let mut policy = ExclusionPolicy::new();
    policy.add_global("token");
    let snapshot = Snapshot::capture(Arc::new(policy), &runtime, SnapshotOptions::all());

    let captured: Vec<(&str, Option<&Value>)> = snapshot
        .global_variables()
        .iter()
        .map(|(name, value)| (name.as_str(), value.as_scalar()))
        .collect();
    assert_eq!(
        captured,
        vec![
            ("nothing", Some(&Value::Null)),
            ("flag", Some(&Value::Bool(false))),
            ("zero", Some(&Value::Int(0))),
        ]
    );

    let report = snapshot.report();
    assert_eq!(
        report.omission(&Location::global("token")),
        Some(&OmissionReason::ExcludedByPolicy)
    );
    assert!(matches!(
        report.omission(&Location::global("log")),
        Some(OmissionReason::Unsafe { members }) if members.len() == 1
    ));
    assert!(matches!(
        report.omission(&Location::global("callback")),
        Some(OmissionReason::Unsafe { .. })
    ));
    assert_eq!(report.excluded_count(), 1);
    assert_eq!(report.unsafe_count(), 2);
}

#[test]
fn containers_are_captured_per_key() {
    let mut runtime = InMemoryRuntime::new();
    runtime.set_container("_GET", [("page", Value::Int(1)), ("q", Value::str("rust"))]).unwrap();
    runtime.set_container("_COOKIE", [("session", Value::str("abc"))]).unwrap();
    runtime.set_container("HTTP_GET_VARS", [("page", Value::Int(1))]).unwrap();

    let mut policy = ExclusionPolicy::new();
    policy.add_global("_COOKIE");
    let policy = Arc::new(policy);
    let snapshot = Snapshot::capture(policy.clone(), &runtime, SnapshotOptions::all());

    let containers = snapshot.container_variables();
    let get: Vec<&str> = containers["_GET"].keys().map(String::as_str).collect();
    assert_eq!(get, vec!["page", "q"]);
    assert!(containers["_POST"].is_empty());
    assert!(!containers.contains_key("_COOKIE"));
    assert!(!containers.contains_key("HTTP_GET_VARS"));
    assert_eq!(
        snapshot.report().omission(&Location::container("_COOKIE")),
        Some(&OmissionReason::ExcludedByPolicy)
    );
    // Without the legacy option the long-form alias is an ordinary global.
    assert!(!snapshot.global_variables().contains_key("_GET"));
    assert!(snapshot.global_variables().contains_key("HTTP_GET_VARS"));

    let legacy = SnapshotOptions {
        legacy_containers: true,
        ..SnapshotOptions::all()
    };
    let snapshot = Snapshot::capture(policy, &runtime, legacy);
    assert!(snapshot.container_variables().contains_key("HTTP_GET_VARS"));
    assert!(!snapshot.global_variables().contains_key("HTTP_GET_VARS"));
}

#[test]
fn shared_fields_honor_policy_and_initialization() {
    let mut runtime = InMemoryRuntime::new();
    runtime
        .declare_class(
            ClassDecl::user("Config")
                .field("values", array_default([("debug", Value::Bool(true))]))
                .field("name", Graph::scalar(Value::str("app")))
                .uninitialized_field("lazy"),
        )
        .unwrap();
    runtime
        .declare_class(ClassDecl::user("VendorCache").field("items", Graph::scalar(Value::Int(3))))
        .unwrap();
    runtime
        .declare_class(ClassDecl::user("Registry").field("instances", Graph::null()))
        .unwrap();

    let mut policy = ExclusionPolicy::new();
    policy.add_prefix("Vendor");
    policy.add_field("Config", "name");
    let snapshot = Snapshot::capture(Arc::new(policy), &runtime, SnapshotOptions::variables());

    let fields = snapshot.shared_fields();
    let config: Vec<&str> = fields["Config"].keys().map(String::as_str).collect();
    assert_eq!(config, vec!["values"]);
    assert!(!fields.contains_key("VendorCache"));
    assert_eq!(
        fields["Registry"]["instances"].as_scalar(),
        Some(&Value::Null)
    );
    assert_eq!(
        snapshot
            .report()
            .omission(&Location::shared_field("VendorCache", "items")),
        Some(&OmissionReason::ExcludedByPolicy)
    );
    assert_eq!(
        snapshot.captured_classes(),
        Some(&["Config".to_string(), "VendorCache".into(), "Registry".into()][..])
    );
}

#[test]
fn failing_exclusion_check_omits_the_field() {
    let mut runtime = InMemoryRuntime::new();
    runtime
        .declare_class(ClassDecl::user("Config").field("values", Graph::scalar(Value::Int(1))))
        .unwrap();

    let mut policy = ExclusionPolicy::new();
    policy.add_subtypes_of("NeverDeclared");
    let snapshot = Snapshot::capture(Arc::new(policy), &runtime, SnapshotOptions::all());

    assert!(snapshot.shared_fields().is_empty());
    assert!(matches!(
        snapshot
            .report()
            .omission(&Location::shared_field("Config", "values")),
        Some(OmissionReason::PolicyError { .. })
    ));
}

#[test]
fn declarations_and_configuration_are_listed() {
    let mut runtime = InMemoryRuntime::new();
    runtime.define_constant("VERSION", Value::str("1.0"), Origin::User);
    runtime.define_constant("PHP_EOL", Value::str("\n"), Origin::Builtin);
    runtime.declare_function("helper", Origin::User);
    runtime.declare_function("strlen", Origin::Builtin);
    runtime
        .declare_interface(InterfaceDecl::user("Renderable"))
        .unwrap();
    runtime.declare_trait("Loggable", Origin::User);
    runtime.set_setting("memory_limit", Setting::new("128M", SettingScope::All));
    runtime.add_loaded_file("/app/bootstrap.src");

    let snapshot = Snapshot::capture(open_policy(), &runtime, SnapshotOptions::all());
    let constants: Vec<&str> = snapshot.constants().keys().map(String::as_str).collect();
    assert_eq!(constants, vec!["VERSION"]);
    assert_eq!(snapshot.functions(), &["helper".to_string()]);
    assert_eq!(snapshot.interfaces(), &["Renderable".to_string()]);
    assert_eq!(snapshot.traits(), &["Loggable".to_string()]);
    assert_eq!(
        snapshot.settings()["memory_limit"],
        Setting::new("128M", SettingScope::All)
    );
    assert_eq!(
        snapshot.loaded_files(),
        &[PathBuf::from("/app/bootstrap.src")]
    );
}

#[test]
fn class_listing_follows_shared_fields_flag() {
    let mut runtime = InMemoryRuntime::new();
    runtime.declare_class(ClassDecl::user("Config")).unwrap();
    let options = SnapshotOptions {
        shared_fields: true,
        ..SnapshotOptions::none()
    };

    let snapshot = Snapshot::capture(open_policy(), &runtime, options);
    assert_eq!(snapshot.classes(), &["Config".to_string()]);
}

#[test]
fn container_is_reconciled_over_union_of_keys() {
    let mut runtime = InMemoryRuntime::new();
    runtime.set_container("_POST", [("a", Value::Int(1)), ("b", Value::Int(2))]).unwrap();
    let snapshot = Snapshot::capture(open_policy(), &runtime, SnapshotOptions::all());

    runtime
        .remove_container_entry("_POST", "a")
        .unwrap();
    runtime
        .set_container_entry("_POST", "b", Value::Int(9))
        .unwrap();
    runtime
        .set_container_entry("_POST", "c", Value::Int(3))
        .unwrap();

    let report = Restorer::new()
        .restore_named_locations(&mut runtime, &snapshot)
        .unwrap();
    let mut restored = container(&runtime, "_POST");
    restored.sort_by(|left, right| left.0.cmp(&right.0));
    assert_eq!(
        restored,
        vec![("a".to_string(), Value::Int(1)), ("b".to_string(), Value::Int(2))]
    );
    assert_eq!(report.deleted, 1);
    assert!(report.is_clean());
}

#[test]
fn globals_are_overwritten_or_deleted_but_excluded_stay() {
    let mut runtime = InMemoryRuntime::new();
    runtime.set_global("counter", Value::Int(1));
    runtime.set_global("token", Value::str("before"));
    let mut policy = ExclusionPolicy::new();
    policy.add_global("token");
    let snapshot = Snapshot::capture(Arc::new(policy), &runtime, SnapshotOptions::all());

    runtime.set_global("counter", Value::Int(5));
    runtime.set_global("token", Value::str("after"));
    runtime.set_global("fresh", Value::Bool(true));

    let restorer = Restorer::new();
    restorer
        .restore_named_locations(&mut runtime, &snapshot)
        .unwrap();
    assert_eq!(scalar_global(&runtime, "counter"), Some(Value::Int(1)));
    assert_eq!(scalar_global(&runtime, "token"), Some(Value::str("after")));
    assert_eq!(scalar_global(&runtime, "fresh"), None);

    restorer
        .restore_named_locations(&mut runtime, &snapshot)
        .unwrap();
    assert_eq!(
        runtime.global_names(),
        vec!["counter".to_string(), "token".to_string()]
    );
    assert_eq!(scalar_global(&runtime, "counter"), Some(Value::Int(1)));
}

#[test]
fn unsafe_global_is_deleted_on_restore() {
    let mut runtime = InMemoryRuntime::new();
    let handle = runtime.alloc(Node::resource("stream")).unwrap();
    runtime.set_global("log", handle);
    let snapshot = Snapshot::capture(open_policy(), &runtime, SnapshotOptions::all());

    Restorer::new()
        .restore_named_locations(&mut runtime, &snapshot)
        .unwrap();
    assert_eq!(runtime.global("log"), None);
}

#[test]
fn restored_composite_is_a_fresh_copy() {
    let mut runtime = InMemoryRuntime::new();
    let list = runtime.alloc(Node::list([Value::Int(1)])).unwrap();
    runtime.set_global("list", list.clone());
    let snapshot = Snapshot::capture(open_policy(), &runtime, SnapshotOptions::all());

    push_entry(&mut runtime, &list, "1", Value::Int(2));
    Restorer::new()
        .restore_named_locations(&mut runtime, &snapshot)
        .unwrap();

    let restored = runtime.global("list").cloned().unwrap();
    assert_ne!(restored, list);
    assert_eq!(entries(&runtime, &restored), vec![("0".to_string(), Value::Int(1))]);
}

#[test]
fn class_fields_are_restored_and_new_classes_reset() {
    let mut runtime = InMemoryRuntime::new();
    runtime
        .declare_class(ClassDecl::user("Config").field("mode", Graph::scalar(Value::str("original"))))
        .unwrap();
    let mut policy = ExclusionPolicy::new();
    policy.add_field("Plugin", "pinned");
    let snapshot = Snapshot::capture(Arc::new(policy), &runtime, SnapshotOptions::all());

    runtime
        .set_shared_field("Config", "mode", Value::str("changed"))
        .unwrap();
    runtime
        .declare_class(
            ClassDecl::user("Plugin")
                .field("count", Graph::scalar(Value::Int(0)))
                .field("pinned", Graph::scalar(Value::Int(0)))
                .uninitialized_field("lazy"),
        )
        .unwrap();
    runtime
        .set_shared_field("Plugin", "count", Value::Int(7))
        .unwrap();
    runtime
        .set_shared_field("Plugin", "pinned", Value::Int(7))
        .unwrap();
    runtime
        .set_shared_field("Plugin", "lazy", Value::Int(7))
        .unwrap();

    let report = Restorer::new()
        .restore_class_fields(&mut runtime, &snapshot)
        .unwrap();
    assert_eq!(
        runtime.shared_field("Config", "mode"),
        Some(&Value::str("original"))
    );
    assert_eq!(runtime.shared_field("Plugin", "count"), Some(&Value::Int(0)));
    assert_eq!(runtime.shared_field("Plugin", "pinned"), Some(&Value::Int(7)));
    assert_eq!(runtime.shared_field("Plugin", "lazy"), Some(&Value::Int(7)));
    assert_eq!(report.written, 1);
    assert_eq!(report.reset, 1);
}

#[test]
fn missing_targets_are_reported_not_fatal() {
    let mut source = InMemoryRuntime::new();
    source
        .declare_class(ClassDecl::user("Config").field("mode", Graph::scalar(Value::str("a"))))
        .unwrap();
    source.set_container("_GET", [("page", Value::Int(1))]).unwrap();
    let snapshot = Snapshot::capture(open_policy(), &source, SnapshotOptions::all());

    let mut target = InMemoryRuntime::new();
    let report = Restorer::new().restore_all(&mut target, &snapshot).unwrap();
    let missing: Vec<&Location> = report.missing.iter().map(|entry| &entry.location).collect();
    assert_eq!(
        missing,
        vec![
            &Location::container("_GET"),
            &Location::shared_field("Config", "mode"),
        ]
    );
}

#[test]
fn restoring_uncaptured_categories_is_an_error() {
    let mut runtime = InMemoryRuntime::new();
    let options = SnapshotOptions {
        constants: true,
        ..SnapshotOptions::none()
    };
    let snapshot = Snapshot::capture(open_policy(), &runtime, options);
    let restorer = Restorer::new();

    let err = restorer
        .restore_named_locations(&mut runtime, &snapshot)
        .unwrap_err();
    assert!(matches!(err.kind(), SnapErrKind::NotCaptured(_)));
    let err = restorer
        .restore_functions(&mut runtime, &snapshot)
        .unwrap_err();
    assert!(matches!(err.kind(), SnapErrKind::NotCaptured(_)));
    assert!(restorer.restore_all(&mut runtime, &snapshot).is_ok());
}

#[test]
fn functions_declared_after_capture_are_removed() {
    let mut runtime = InMemoryRuntime::new().with_function_removal();
    runtime.declare_function("helper", Origin::User);
    let snapshot = Snapshot::capture(open_policy(), &runtime, SnapshotOptions::all());
    runtime.declare_function("late_helper", Origin::User);

    let report = Restorer::new()
        .restore_functions(&mut runtime, &snapshot)
        .unwrap();
    assert_eq!(report.deleted, 1);
    assert_eq!(runtime.function_names(), vec!["helper".to_string()]);

    let mut fixed = InMemoryRuntime::new();
    let snapshot = Snapshot::capture(open_policy(), &fixed, SnapshotOptions::all());
    fixed.declare_function("late_helper", Origin::User);
    let err = Restorer::new()
        .restore_functions(&mut fixed, &snapshot)
        .unwrap_err();
    assert!(matches!(err.kind(), SnapErrKind::Unsupported(_)));
}

#[test]
fn exporter_renders_literals_and_encoded_values() {
    let mut runtime = InMemoryRuntime::new();
    runtime.declare_class(ClassDecl::user("Point")).unwrap();
    runtime.define_constant("NAME", Value::str("say \"hi\""), Origin::User);
    runtime.define_constant("RATIO", Value::Float(2.0), Origin::User);
    let nested = runtime.alloc(Node::list([Value::Int(2), Value::Null])).unwrap();
    let list = runtime.alloc(Node::list([Value::Int(1), nested])).unwrap();
    runtime.define_constant("LIST", list, Origin::User);
    let map = runtime.alloc(Node::array([("on", Value::Bool(true))])).unwrap();
    runtime.define_constant("MAP", map, Origin::User);
    let point = runtime.alloc(Node::object("Point", [("x", Value::Int(1))])).unwrap();
    runtime.define_constant("ORIGIN", point, Origin::User);
    runtime.set_setting("precision", Setting::new("14", SettingScope::All));
    runtime.set_setting(
        "open_dir",
        Setting {
            value: None,
            scope: SettingScope::System,
        },
    );

    let snapshot = Snapshot::capture(open_policy(), &runtime, SnapshotOptions::all());
    let exporter = CodeExporter::new();
    let constants = exporter.export_constants(&snapshot).unwrap();
    let lines: Vec<&str> = constants.lines().collect();
    assert_eq!(lines[0], r#"const NAME = "say \"hi\"";"#);
    assert_eq!(lines[1], "const RATIO = 2.0;");
    assert_eq!(lines[2], "const LIST = [1, [2, null]];");
    assert_eq!(lines[3], r#"const MAP = ["on" => true];"#);
    assert!(lines[4].starts_with("const ORIGIN = decode(\""));

    let encoded = &lines[4]["const ORIGIN = decode(".len()..lines[4].len() - 2];
    let json: String = serde_json::from_str(encoded).unwrap();
    let graph: Graph = serde_json::from_str(&json).unwrap();
    assert_eq!(graph, snapshot.constants()["ORIGIN"].graph().clone());

    assert_eq!(
        exporter.export_settings(&snapshot),
        "set \"precision\" = \"14\";\nset \"open_dir\" = null;\n"
    );
}

#[test]
fn exporter_renders_globals_after_a_clear_all() {
    let mut runtime = InMemoryRuntime::new();
    runtime.set_global("foo", Value::str("bar"));
    let list = runtime.alloc(Node::list([Value::Int(1)])).unwrap();
    runtime.set_global("items", list);
    runtime.set_container("_GET", [("page", Value::Int(1))]).unwrap();
    let snapshot = Snapshot::capture(open_policy(), &runtime, SnapshotOptions::variables());

    let exporter = CodeExporter::new();
    let globals = exporter.export_globals(&snapshot).unwrap();
    assert_eq!(
        globals,
        "clear globals;\nset global \"foo\" = \"bar\";\nset global \"items\" = [1];\n"
    );
    assert_eq!(exporter.export(&snapshot).unwrap(), globals);

    let bare = Snapshot::capture(open_policy(), &runtime, SnapshotOptions::none());
    let err = exporter.export_globals(&bare).unwrap_err();
    assert!(matches!(err.kind(), SnapErrKind::NotCaptured(_)));
    assert_eq!(exporter.export(&bare).unwrap(), "");
}

#[test]
fn repeated_restores_keep_the_heap_flat() {
    let mut runtime = InMemoryRuntime::new();
    let shared = runtime.alloc(Node::list([Value::Int(1)])).unwrap();
    let outer = runtime
        .alloc(Node::array([("a", shared.clone()), ("b", shared)]))
        .unwrap();
    runtime.set_global("outer", outer);
    runtime.set_container("_GET", [("page", Value::Int(1))]).unwrap();
    let snapshot = Snapshot::capture(open_policy(), &runtime, SnapshotOptions::all());
    assert_eq!(runtime.heap().len(), 3);

    let restorer = Restorer::new();
    for _ in 0..100 {
        let report = restorer.restore_all(&mut runtime, &snapshot).unwrap();
        assert_eq!(report.collected, 2);
        assert_eq!(runtime.heap().len(), 3);
    }

    let outer = runtime.global("outer").cloned().unwrap();
    let members = entries(&runtime, &outer);
    assert_eq!(members[0].1, members[1].1);
    assert!(runtime
        .heap()
        .equals_graph(&outer, snapshot.global_variables()["outer"].graph()));
    assert_eq!(
        container(&runtime, "_GET"),
        vec![("page".to_string(), Value::Int(1))]
    );
}

#[test]
fn runtime_failures_map_onto_error_kinds() {
    let err = SnapError::from(StateError::DanglingReference(NodeId(3)));
    assert!(matches!(err.kind(), SnapErrKind::Internal(_)));
    let err = SnapError::from(StateError::Unsupported("remove function f".into()));
    assert!(matches!(err.kind(), SnapErrKind::Unsupported(_)));

    let mut runtime = InMemoryRuntime::new();
    let stray = CapturedValue::new(Graph::scalar(Value::Ref(NodeId(0))));
    assert_eq!(
        stray.attach(runtime.heap_mut()),
        Err(StateError::DanglingReference(NodeId(0)))
    );
    assert!(runtime.heap().is_empty());
}
