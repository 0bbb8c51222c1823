mod common;

use common::{
    collect, path, strings, Catalog, Document, FixedProvider, Person, Plain,
    SpyProvider,
};
use parking_lot::Mutex;
use reactive_paths::{
    path::{decompose, PathExpr},
    prelude::*,
};
use std::{sync::Arc, thread};

fn observe_names(
    runtime: &PathRuntime,
    root: &Arc<Person>,
    text: &str,
) -> (Arc<Mutex<Vec<Value>>>, Subscription) {
    let values = runtime
        .observe_value(Arc::clone(root) as ObjectRef, &path(text))
        .unwrap();
    collect(&values)
}

#[test]
fn decomposition_is_deterministic() {
    let expr = PathExpr::parse("(child as Person).Items[2, \"x\"].name").unwrap();
    let first = decompose(&expr).unwrap();
    let second = decompose(&expr).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.to_string(), "child.Items[2, \"x\"].name");
}

#[test]
fn equal_values_are_reported_once() {
    let runtime = PathRuntime::default();
    let root = Person::named("");
    let (seen, _sub) = observe_names(&runtime, &root, "name");

    *root.name.write() = "x".into();
    root.notifier.raise_property_changed("name");
    root.notifier.raise_property_changed("name");
    assert_eq!(*seen.lock(), strings(&["", "x"]));
}

#[test]
fn follows_the_chain_when_an_intermediate_object_is_replaced() {
    let runtime = PathRuntime::default();
    let root = Person::named("root");
    let first = Person::named("Foo");
    root.set_child(Some(Arc::clone(&first)));

    let (seen, _sub) = observe_names(&runtime, &root, "child.name");
    first.set_name("Bar");

    let second = Person::named("Foo");
    root.set_child(Some(Arc::clone(&second)));
    assert_eq!(*seen.lock(), strings(&["Foo", "Bar", "Foo"]));

    // the first child is fully detached
    first.set_name("Baz");
    assert_eq!(*seen.lock(), strings(&["Foo", "Bar", "Foo"]));
    assert_eq!(first.notifier.handler_count(), 0);

    second.set_name("Qux");
    assert_eq!(seen.lock().last(), Some(&Value::from("Qux")));
}

#[test]
fn structured_streams_outrank_conventional_events() {
    let runtime = PathRuntime::default();
    let registry = runtime.registry();
    let name = Link::member("name");
    let winner = |ty: TypeInfo, direction| {
        registry
            .resolve(ty, &name, direction)
            .map(|provider| provider.name())
    };

    assert_eq!(
        winner(TypeInfo::of::<Person>(), Direction::After),
        Some("ReactiveObjectProvider")
    );
    assert_eq!(
        winner(TypeInfo::of::<Document>(), Direction::Before),
        Some("PropertyChangedProvider")
    );
    assert_eq!(
        winner(TypeInfo::of::<Plain>(), Direction::After),
        Some("SnapshotProvider")
    );
}

#[test]
fn conventional_notifiers_are_observed() {
    let runtime = PathRuntime::default();
    let document = Arc::new(Document::default());
    let (seen, _sub) = collect(
        &runtime
            .observe_value(Arc::clone(&document) as ObjectRef, &path("title"))
            .unwrap(),
    );
    document.set_title("Draft");
    assert_eq!(*seen.lock(), strings(&["", "Draft"]));
}

#[test]
fn plain_objects_are_reported_once() {
    let runtime = PathRuntime::default();
    let plain = Arc::new(Plain::default());
    *plain.title.write() = "first".into();
    let (seen, _sub) = collect(
        &runtime
            .observe_value(Arc::clone(&plain) as ObjectRef, &path("title"))
            .unwrap(),
    );

    runtime
        .accessors()
        .try_set_value(
            &Value::object(Arc::clone(&plain)),
            &path("title"),
            "second".into(),
        )
        .unwrap();
    assert_eq!(*plain.title.read(), "second");
    assert_eq!(*seen.lock(), strings(&["first"]));
}

#[test]
fn null_intermediate_values_are_tolerated() {
    let runtime = PathRuntime::default();
    let root = Person::named("root");

    let (events, _chain) = collect(&runtime.observe_chain(
        Arc::clone(&root) as ObjectRef,
        &path("child.name"),
        Direction::After,
    ));
    {
        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert!(events[0].sender.is_none());
        assert!(events[0].value.is_none());
    }

    let (seen, _sub) = observe_names(&runtime, &root, "child.name");
    assert!(seen.lock().is_empty());

    root.set_child(Some(Person::named("late")));
    assert_eq!(*seen.lock(), strings(&["late"]));
    assert!(events.lock().last().is_some_and(ChangeEvent::is_complete));
}

#[test]
fn cancellation_detaches_every_provider() {
    let runtime = PathRuntime::default();
    let spy = Arc::new(SpyProvider::default());
    runtime.register_provider(Arc::clone(&spy) as Arc<dyn ChangeSourceProvider>);

    let root = Person::named("root");
    let first = Person::named("first");
    root.set_child(Some(Arc::clone(&first)));

    let (seen, sub) = observe_names(&runtime, &root, "child.name");
    assert_eq!(spy.attached(), 2);

    let second = Person::named("second");
    root.set_child(Some(Arc::clone(&second)));
    assert_eq!(spy.attached(), 3);
    assert_eq!(spy.detached(), 1);

    drop(sub);
    assert_eq!(spy.attached(), spy.detached());
    for person in [&root, &first, &second] {
        assert_eq!(person.notifier.handler_count(), 0);
    }
    second.set_name("ignored");
    assert_eq!(*seen.lock(), strings(&["first", "second"]));
}

#[test]
fn members_and_indexers_are_distinct() {
    let runtime = PathRuntime::default();
    let catalog = Catalog::with_items(&[1, 2]);
    let root = Arc::clone(&catalog) as ObjectRef;

    let (member, _member_sub) = collect(&runtime.observe_chain(
        Arc::clone(&root),
        &path("Items"),
        Direction::After,
    ));
    let (indexer, _indexer_sub) = collect(&runtime.observe_chain(
        root,
        &path("Items[0]"),
        Direction::After,
    ));
    assert_eq!(member.lock().len(), 1);
    assert_eq!(indexer.lock().len(), 1);

    catalog.set_item(0, 5);
    assert_eq!(member.lock().len(), 1);
    assert_eq!(indexer.lock().len(), 2);
    assert_eq!(indexer.lock()[1].value, Some(Value::from(5)));

    catalog.replace_items(&[7]);
    assert_eq!(member.lock().len(), 2);
    assert_eq!(indexer.lock().len(), 2);
    assert_eq!(
        member.lock()[1].value,
        Some(Value::from(vec![Value::from(7)]))
    );
}

#[test]
fn first_registered_provider_wins_ties() {
    let runtime = PathRuntime::empty(Default::default());
    runtime.register_provider(Arc::new(FixedProvider(50, "first")));
    runtime.register_provider(Arc::new(FixedProvider(50, "second")));
    let provider = runtime
        .registry()
        .resolve(TypeInfo::of::<Person>(), &Link::member("name"), Direction::After)
        .unwrap();
    assert_eq!(provider.name(), "first");
}

#[test]
fn missing_provider_is_reported_synchronously() {
    let runtime = PathRuntime::empty(Default::default());
    let result = runtime.observe_property(
        Person::named("root") as ObjectRef,
        &path("name"),
        Direction::After,
        false,
    );
    assert!(matches!(
        result,
        Err(Error::ProviderNotFound { type_name: "Person", .. })
    ));
}

#[test]
fn accessor_faults_terminate_the_stream() {
    let runtime = PathRuntime::default();
    let catalog = Catalog::with_items(&[1, 2]);
    let values = Arc::new(Mutex::new(Vec::new()));
    let errors = Arc::new(Mutex::new(Vec::new()));
    let _sub = runtime
        .observe_value(Arc::clone(&catalog) as ObjectRef, &path("Items[1]"))
        .unwrap()
        .subscribe_with(
            {
                let values = Arc::clone(&values);
                move |value| values.lock().push(value)
            },
            {
                let errors = Arc::clone(&errors);
                move |err| errors.lock().push(err)
            },
        );
    assert_eq!(catalog.notifier.handler_count(), 1);

    catalog.items.write().pop();
    catalog.notifier.raise_property_changed("Items[]");
    assert_eq!(*values.lock(), vec![Value::from(2)]);
    assert_eq!(
        *errors.lock(),
        vec![Error::Accessor {
            type_name: "Catalog",
            member: "Items".into(),
            message: "index 1 is out of range".into(),
        }]
    );
    assert_eq!(catalog.notifier.handler_count(), 0);
}

#[test]
fn before_change_reports_the_previous_value() {
    let runtime = PathRuntime::default();
    let person = Person::named("a");
    let (seen, _sub) = collect(
        &runtime
            .observe_property(
                Arc::clone(&person) as ObjectRef,
                &path("name"),
                Direction::Before,
                false,
            )
            .unwrap()
            .map(|change| change.value),
    );
    // "a" is announced again before the first write, and suppressed
    person.set_name("b");
    person.set_name("c");
    assert_eq!(*seen.lock(), strings(&["a", "b"]));
}

#[test]
fn skip_initial_drops_the_current_value() {
    let runtime = PathRuntime::default();
    let root = Person::named("root");
    root.set_child(Some(Person::named("child")));
    let (seen, _sub) = collect(
        &runtime
            .observe_property(
                Arc::clone(&root) as ObjectRef,
                &path("child.name"),
                Direction::After,
                true,
            )
            .unwrap(),
    );
    assert!(seen.lock().is_empty());

    root.set_child(Some(Person::named("next")));
    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].value, Value::from("next"));
    assert!(seen[0].is_from(&(Arc::clone(&root) as ObjectRef)));
    assert_eq!(seen[0].path.to_string(), "child.name");
}

#[test]
fn suppressed_notifications_are_not_observed() {
    let runtime = PathRuntime::default();
    let person = Person::named("a");
    let (seen, _sub) = observe_names(&runtime, &person, "name");
    {
        let _quiet = person.notifier.suppress_change_notifications();
        person.set_name("b");
    }
    person.set_name("c");
    assert_eq!(*seen.lock(), strings(&["a", "c"]));
}

#[test]
fn skip_initial_still_reports_plain_objects_once() {
    let runtime = PathRuntime::default();
    let plain = Arc::new(Plain::default());
    *plain.title.write() = "first".into();
    let (seen, _sub) = collect(
        &runtime
            .observe_property(
                Arc::clone(&plain) as ObjectRef,
                &path("title"),
                Direction::After,
                true,
            )
            .unwrap()
            .map(|change| change.value),
    );
    *plain.title.write() = "second".into();
    assert_eq!(*seen.lock(), strings(&["first"]));
}

#[test]
fn changes_raised_on_other_threads_are_delivered() {
    let runtime = PathRuntime::default();
    let root = Person::named("root");
    root.set_child(Some(Person::named("first")));
    let (seen, sub) = observe_names(&runtime, &root, "child.name");

    thread::scope(|scope| {
        scope.spawn(|| {
            let child = root.child.read().clone().unwrap();
            child.set_name("renamed");
        });
    });
    let replacement = Person::named("second");
    thread::scope(|scope| {
        scope.spawn(|| root.set_child(Some(Arc::clone(&replacement))));
    });
    thread::scope(|scope| {
        scope.spawn(|| replacement.set_name("third"));
    });

    assert_eq!(*seen.lock(), strings(&["first", "renamed", "second", "third"]));
    drop(sub);
    assert_eq!(root.notifier.handler_count(), 0);
    assert_eq!(replacement.notifier.handler_count(), 0);
}

#[test]
fn observations_on_many_threads_stay_independent() {
    let runtime = PathRuntime::default();
    thread::scope(|scope| {
        for worker in 0..4 {
            let runtime = runtime.clone();
            scope.spawn(move || {
                let person = Person::named("start");
                let (seen, _sub) = observe_names(&runtime, &person, "name");
                let names: Vec<String> =
                    (0..50).map(|step| format!("{worker}-{step}")).collect();
                for name in &names {
                    person.set_name(name);
                }
                let expected: Vec<Value> = std::iter::once(Value::from("start"))
                    .chain(names.iter().map(|name| Value::from(name.as_str())))
                    .collect();
                assert_eq!(*seen.lock(), expected);
            });
        }
        scope.spawn(|| {
            for _ in 0..20 {
                runtime.register_provider(Arc::new(FixedProvider(2, "idle")));
            }
        });
    });
}
