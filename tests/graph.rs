use std::cell::Cell;
use std::rc::Rc;

use epimap::EngineError;
use epimap::graph::GraphBuilder;

#[test]
fn reads_are_deterministic() {
    let mut builder = GraphBuilder::new();
    builder.input("a", Rc::new(2u64));
    builder.input("b", Rc::new(3u64));
    builder.computed("sum", &["a", "b"], |args| {
        Ok(Rc::new(*args.get::<u64>(0) + *args.get::<u64>(1)))
    });
    let mut graph = builder.build().expect("acyclic graph");

    assert_eq!(*graph.read::<u64>("sum").unwrap(), 5);
    assert_eq!(*graph.read::<u64>("sum").unwrap(), 5);

    graph.write("a", 10u64).unwrap();
    assert_eq!(*graph.read::<u64>("sum").unwrap(), 13);
    assert_eq!(*graph.read::<u64>("sum").unwrap(), 13);
}

#[test]
fn unread_nodes_are_never_invoked() {
    let calls = Rc::new(Cell::new(0usize));
    let mut builder = GraphBuilder::new();
    builder.input("a", Rc::new(1u64));
    builder.computed("used", &["a"], |args| Ok(Rc::new(*args.get::<u64>(0) + 1)));
    builder.computed("unused", &["a"], {
        let calls = calls.clone();
        move |args| {
            calls.set(calls.get() + 1);
            Ok(Rc::new(*args.get::<u64>(0) * 100))
        }
    });
    let mut graph = builder.build().expect("acyclic graph");

    graph.write("a", 5u64).unwrap();
    assert_eq!(*graph.read::<u64>("used").unwrap(), 6);
    graph.write("a", 7u64).unwrap();
    assert_eq!(*graph.read::<u64>("used").unwrap(), 8);

    assert_eq!(calls.get(), 0);
}

#[test]
fn diamond_dependency_computes_shared_node_once_per_batch() {
    let calls = Rc::new(Cell::new(0usize));
    let mut builder = GraphBuilder::new();
    builder.input("base", Rc::new(1u64));
    builder.computed("mid", &["base"], {
        let calls = calls.clone();
        move |args| {
            calls.set(calls.get() + 1);
            Ok(Rc::new(*args.get::<u64>(0) * 2))
        }
    });
    builder.computed("left", &["mid"], |args| Ok(Rc::new(*args.get::<u64>(0) + 1)));
    builder.computed("right", &["mid"], |args| Ok(Rc::new(*args.get::<u64>(0) + 2)));
    builder.computed("top", &["left", "right"], |args| {
        Ok(Rc::new(*args.get::<u64>(0) + *args.get::<u64>(1)))
    });
    let mut graph = builder.build().expect("acyclic graph");

    assert_eq!(*graph.read::<u64>("top").unwrap(), 7);
    assert_eq!(calls.get(), 1);

    graph.write("base", 3u64).unwrap();
    assert_eq!(*graph.read::<u64>("top").unwrap(), 15);
    assert_eq!(calls.get(), 2);
}

#[test]
fn batched_writes_observe_final_values_only() {
    let calls = Rc::new(Cell::new(0usize));
    let mut builder = GraphBuilder::new();
    builder.input("a", Rc::new(0u64));
    builder.input("b", Rc::new(0u64));
    builder.computed("sum", &["a", "b"], {
        let calls = calls.clone();
        move |args| {
            calls.set(calls.get() + 1);
            Ok(Rc::new(*args.get::<u64>(0) + *args.get::<u64>(1)))
        }
    });
    let mut graph = builder.build().expect("acyclic graph");

    graph.write("a", 1u64).unwrap();
    graph.write("a", 4u64).unwrap();
    graph.write("b", 6u64).unwrap();
    assert_eq!(*graph.read::<u64>("sum").unwrap(), 10);
    assert_eq!(calls.get(), 1);
}

#[test]
fn cycle_is_rejected_at_build_time() {
    let mut builder = GraphBuilder::new();
    builder.computed("a", &["b"], |args| Ok(args.get::<u64>(0)));
    builder.computed("b", &["a"], |args| Ok(args.get::<u64>(0)));
    let error = builder.build().err().expect("cycle must be rejected");

    match error {
        EngineError::CyclicDependency(names) => {
            assert!(names.contains(&"a".to_string()));
            assert!(names.contains(&"b".to_string()));
            assert_eq!(names.first(), names.last());
        }
        other => panic!("expected CyclicDependency, got {other:?}"),
    }
}

#[test]
fn unknown_dependency_is_rejected_at_build_time() {
    let mut builder = GraphBuilder::new();
    builder.computed("a", &["missing"], |args| Ok(args.get::<u64>(0)));
    assert!(matches!(
        builder.build().err(),
        Some(EngineError::UnknownNode(name)) if name == "missing"
    ));
}

#[test]
fn duplicate_name_is_rejected_at_build_time() {
    let mut builder = GraphBuilder::new();
    builder.input("a", Rc::new(1u64));
    builder.input("a", Rc::new(2u64));
    assert!(matches!(
        builder.build().err(),
        Some(EngineError::DuplicateNode(name)) if name == "a"
    ));
}

#[test]
fn reading_unregistered_name_fails() {
    let mut builder = GraphBuilder::new();
    builder.input("a", Rc::new(1u64));
    let mut graph = builder.build().unwrap();
    assert!(matches!(
        graph.read::<u64>("nope").err(),
        Some(EngineError::UnknownNode(name)) if name == "nope"
    ));
}

#[test]
fn writing_a_computed_node_fails() {
    let mut builder = GraphBuilder::new();
    builder.input("a", Rc::new(1u64));
    builder.computed("double", &["a"], |args| Ok(Rc::new(*args.get::<u64>(0) * 2)));
    let mut graph = builder.build().unwrap();
    assert!(matches!(
        graph.write("double", 4u64).err(),
        Some(EngineError::NotWritable(name)) if name == "double"
    ));
}

#[test]
fn failed_computation_leaves_node_dirty_for_retry() {
    let calls = Rc::new(Cell::new(0usize));
    let mut builder = GraphBuilder::new();
    builder.input("a", Rc::new(0u64));
    builder.computed("checked", &["a"], {
        let calls = calls.clone();
        move |args| {
            calls.set(calls.get() + 1);
            let value = *args.get::<u64>(0);
            if value == 0 {
                return Err(EngineError::UnknownMetric("zero input".to_string()));
            }
            Ok(Rc::new(value * 2))
        }
    });
    let mut graph = builder.build().unwrap();

    assert!(graph.read::<u64>("checked").is_err());
    assert_eq!(calls.get(), 1);

    // Still dirty: the failed attempt cached nothing.
    assert!(graph.read::<u64>("checked").is_err());
    assert_eq!(calls.get(), 2);

    graph.write("a", 3u64).unwrap();
    assert_eq!(*graph.read::<u64>("checked").unwrap(), 6);
    assert_eq!(calls.get(), 3);
}

#[test]
fn subscription_fires_once_per_batch_and_only_on_change() {
    let fired = Rc::new(Cell::new(0usize));
    let mut builder = GraphBuilder::new();
    builder.input("a", Rc::new(2u64));
    builder.computed("parity", &["a"], |args| Ok(Rc::new(*args.get::<u64>(0) % 2)));
    let mut graph = builder.build().unwrap();

    graph
        .subscribe::<u64, _>("parity", {
            let fired = fired.clone();
            move |_value| fired.set(fired.get() + 1)
        })
        .unwrap();

    // First computation always notifies.
    assert_eq!(*graph.read::<u64>("parity").unwrap(), 0);
    assert_eq!(fired.get(), 1);

    // Recomputed to an equal value: no notification.
    graph.write("a", 4u64).unwrap();
    assert_eq!(*graph.read::<u64>("parity").unwrap(), 0);
    assert_eq!(fired.get(), 1);

    // Changed value notifies exactly once, repeated reads do not.
    graph.write("a", 5u64).unwrap();
    assert_eq!(*graph.read::<u64>("parity").unwrap(), 1);
    assert_eq!(*graph.read::<u64>("parity").unwrap(), 1);
    assert_eq!(fired.get(), 2);
}
