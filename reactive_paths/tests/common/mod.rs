#![allow(dead_code)]

use parking_lot::{Mutex, RwLock};
use reactive_paths::{
    prelude::*,
    providers::ReactiveObjectProvider,
    observable::Observer,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

/// A reactive object with a name and an optional child.
#[derive(Default)]
pub struct Person {
    pub name: RwLock<String>,
    pub child: RwLock<Option<Arc<Person>>>,
    pub notifier: PropertyNotifier,
}

impl Person {
    pub fn named(name: &str) -> Arc<Self> {
        let person = Self::default();
        *person.name.write() = name.to_string();
        Arc::new(person)
    }

    pub fn set_name(&self, name: &str) {
        self.notifier.set_if_changed(&self.name, "name", name.to_string());
    }

    pub fn set_child(&self, child: Option<Arc<Person>>) {
        self.notifier.raise_property_changing("child");
        *self.child.write() = child;
        self.notifier.raise_property_changed("child");
    }
}

impl ObjectType for Person {
    fn type_name() -> &'static str {
        "Person"
    }

    fn capabilities() -> Capabilities {
        Capabilities::REACTIVE
    }

    fn describe(members: &mut MemberTable<Self>) {
        members
            .field(
                "name",
                |p| Value::from(p.name.read().clone()),
                |p, value| {
                    p.set_name(&value.get::<String>()?);
                    Ok(())
                },
            )
            .readonly_field("child", |p| Value::from(p.child.read().clone()));
    }

    fn as_reactive(&self) -> Option<&dyn ReactiveObject> {
        Some(&self.notifier)
    }

    fn as_property_changed(&self) -> Option<&dyn NotifyPropertyChanged> {
        Some(&self.notifier)
    }

    fn as_property_changing(&self) -> Option<&dyn NotifyPropertyChanging> {
        Some(&self.notifier)
    }
}

/// Only raises the conventional events.
#[derive(Default)]
pub struct Document {
    pub title: RwLock<String>,
    pub notifier: PropertyNotifier,
}

impl Document {
    pub fn set_title(&self, title: &str) {
        self.notifier
            .set_if_changed(&self.title, "title", title.to_string());
    }
}

impl ObjectType for Document {
    fn type_name() -> &'static str {
        "Document"
    }

    fn capabilities() -> Capabilities {
        Capabilities::PROPERTY_CHANGED.union(Capabilities::PROPERTY_CHANGING)
    }

    fn describe(members: &mut MemberTable<Self>) {
        members.readonly_field("title", |d| Value::from(d.title.read().clone()));
    }

    fn as_property_changed(&self) -> Option<&dyn NotifyPropertyChanged> {
        Some(&self.notifier)
    }

    fn as_property_changing(&self) -> Option<&dyn NotifyPropertyChanging> {
        Some(&self.notifier)
    }
}

/// Raises no notification at all.
#[derive(Default)]
pub struct Plain {
    pub title: RwLock<String>,
}

impl ObjectType for Plain {
    fn type_name() -> &'static str {
        "Plain"
    }

    fn describe(members: &mut MemberTable<Self>) {
        members.field(
            "title",
            |p| Value::from(p.title.read().clone()),
            |p, value| {
                *p.title.write() = value.get()?;
                Ok(())
            },
        );
    }
}

/// Exposes its items both as a list member and as an indexer, both named
/// `Items`.
#[derive(Default)]
pub struct Catalog {
    pub items: RwLock<Vec<i64>>,
    pub notifier: PropertyNotifier,
}

impl Catalog {
    pub fn with_items(items: &[i64]) -> Arc<Self> {
        let catalog = Self::default();
        *catalog.items.write() = items.to_vec();
        Arc::new(catalog)
    }

    /// Replaces one item and announces it through the indexer.
    pub fn set_item(&self, index: usize, item: i64) {
        self.items.write()[index] = item;
        self.notifier.raise_property_changed("Items[]");
    }

    /// Replaces every item and announces it through the member.
    pub fn replace_items(&self, items: &[i64]) {
        *self.items.write() = items.to_vec();
        self.notifier.raise_property_changed("Items");
    }
}

impl ObjectType for Catalog {
    fn type_name() -> &'static str {
        "Catalog"
    }

    fn capabilities() -> Capabilities {
        Capabilities::REACTIVE
    }

    fn describe(members: &mut MemberTable<Self>) {
        members
            .readonly_field("Items", |c| {
                Value::from(
                    c.items.read().iter().copied().map(Value::from).collect::<Vec<_>>(),
                )
            })
            .readonly_indexer("Items", |c, args| {
                let index = args
                    .first()
                    .and_then(Value::as_int)
                    .ok_or_else(|| Error::fault("expected an integer index"))?;
                c.items
                    .read()
                    .get(index as usize)
                    .copied()
                    .map(Value::from)
                    .ok_or_else(|| {
                        Error::fault(format!("index {index} is out of range"))
                    })
            });
    }

    fn as_reactive(&self) -> Option<&dyn ReactiveObject> {
        Some(&self.notifier)
    }
}

/// Claims every link and forwards the structured streams, counting how
/// often it is attached and detached.
#[derive(Default)]
pub struct SpyProvider {
    pub attached: Arc<AtomicUsize>,
    pub detached: Arc<AtomicUsize>,
}

impl SpyProvider {
    pub fn attached(&self) -> usize {
        self.attached.load(Ordering::SeqCst)
    }

    pub fn detached(&self) -> usize {
        self.detached.load(Ordering::SeqCst)
    }
}

impl ChangeSourceProvider for SpyProvider {
    fn affinity(&self, _: TypeInfo, _: &Link, _: Direction) -> i32 {
        100
    }

    fn observe(
        &self,
        sender: &ObjectRef,
        link: &Link,
        direction: Direction,
    ) -> Observable<ChangeEvent> {
        let forwarded = ReactiveObjectProvider.observe(sender, link, direction);
        let attached = Arc::clone(&self.attached);
        let detached = Arc::clone(&self.detached);
        Observable::create(move |observer: Observer<ChangeEvent>| {
            attached.fetch_add(1, Ordering::SeqCst);
            let inner = forwarded.subscribe_observer(observer);
            let detached = Arc::clone(&detached);
            Subscription::new(move || {
                drop(inner);
                detached.fetch_add(1, Ordering::SeqCst);
            })
        })
    }

    fn name(&self) -> &'static str {
        "SpyProvider"
    }
}

/// A provider with a fixed score that never emits.
pub struct FixedProvider(pub i32, pub &'static str);

impl ChangeSourceProvider for FixedProvider {
    fn affinity(&self, _: TypeInfo, _: &Link, _: Direction) -> i32 {
        self.0
    }

    fn observe(&self, _: &ObjectRef, _: &Link, _: Direction) -> Observable<ChangeEvent> {
        Observable::never()
    }

    fn name(&self) -> &'static str {
        self.1
    }
}

/// Collects every value of `observable`.
pub fn collect<T>(observable: &Observable<T>) -> (Arc<Mutex<Vec<T>>>, Subscription)
where
    T: Clone + Send + Sync + 'static,
{
    let seen = Arc::new(Mutex::new(Vec::new()));
    let subscription = observable.subscribe({
        let seen = Arc::clone(&seen);
        move |value| seen.lock().push(value)
    });
    (seen, subscription)
}

pub fn path(text: &str) -> Path {
    Path::parse(text).unwrap()
}

pub fn strings(values: &[&str]) -> Vec<Value> {
    values.iter().map(|value| Value::from(*value)).collect()
}
