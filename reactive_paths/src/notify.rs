//! Change-notification capabilities that objects can expose, and
//! [`PropertyNotifier`], a ready-made implementation of all of them.

use crate::observable::{EventSource, Observable};
use parking_lot::RwLock;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

/// The payload of every change notification: which member changed.
///
/// Indexers are reported with the `[]` suffix, e.g. `Items[]`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PropertyChangeArgs {
    /// The name of the member that changed.
    pub property_name: Arc<str>,
}

impl PropertyChangeArgs {
    /// Creates the payload for `property_name`.
    pub fn new(property_name: impl Into<Arc<str>>) -> Self {
        Self {
            property_name: property_name.into(),
        }
    }
}

/// The conventional "after change" event.
pub trait NotifyPropertyChanged: Send + Sync {
    /// Raised after a member has changed.
    fn property_changed(&self) -> &EventSource<PropertyChangeArgs>;
}

/// The conventional "before change" event.
pub trait NotifyPropertyChanging: Send + Sync {
    /// Raised just before a member changes.
    fn property_changing(&self) -> &EventSource<PropertyChangeArgs>;
}

/// Structured change streams.
pub trait ReactiveObject: Send + Sync {
    /// Emits just before a member changes.
    fn changing(&self) -> Observable<PropertyChangeArgs>;

    /// Emits after a member has changed.
    fn changed(&self) -> Observable<PropertyChangeArgs>;
}

/// Raises change notifications for an object, in every supported convention.
///
/// Embed one in a type and delegate the notification traits to it:
///
/// ```rust
/// use parking_lot::RwLock;
/// use reactive_paths::{
///     notify::{
///         NotifyPropertyChanged, NotifyPropertyChanging, PropertyNotifier,
///         ReactiveObject,
///     },
///     object::{Capabilities, ObjectType},
///     reflection::MemberTable,
///     value::Value,
/// };
///
/// #[derive(Default)]
/// struct Person {
///     name: RwLock<String>,
///     notifier: PropertyNotifier,
/// }
///
/// impl Person {
///     fn set_name(&self, name: &str) {
///         self.notifier.set_if_changed(&self.name, "name", name.to_string());
///     }
/// }
///
/// impl ObjectType for Person {
///     fn capabilities() -> Capabilities {
///         Capabilities::REACTIVE
///     }
///
///     fn describe(members: &mut MemberTable<Self>) {
///         members.readonly_field("name", |p| Value::from(p.name.read().clone()));
///     }
///
///     fn as_reactive(&self) -> Option<&dyn ReactiveObject> {
///         Some(&self.notifier)
///     }
///
///     fn as_property_changed(&self) -> Option<&dyn NotifyPropertyChanged> {
///         Some(&self.notifier)
///     }
///
///     fn as_property_changing(&self) -> Option<&dyn NotifyPropertyChanging> {
///         Some(&self.notifier)
///     }
/// }
///
/// let person = Person::default();
/// person.set_name("Ada");
/// assert_eq!(*person.name.read(), "Ada");
/// ```
#[derive(Debug, Default)]
pub struct PropertyNotifier {
    changing: EventSource<PropertyChangeArgs>,
    changed: EventSource<PropertyChangeArgs>,
    property_changing: EventSource<PropertyChangeArgs>,
    property_changed: EventSource<PropertyChangeArgs>,
    suppressed: Arc<AtomicUsize>,
}

impl PropertyNotifier {
    /// A notifier with no listener.
    pub fn new() -> Self {
        Self::default()
    }

    /// Announces that `name` is about to change.
    pub fn raise_property_changing(&self, name: &str) {
        if !self.are_change_notifications_enabled() {
            return;
        }
        let args = PropertyChangeArgs::new(name);
        self.changing.emit(&args);
        self.property_changing.emit(&args);
    }

    /// Announces that `name` has changed.
    pub fn raise_property_changed(&self, name: &str) {
        if !self.are_change_notifications_enabled() {
            return;
        }
        let args = PropertyChangeArgs::new(name);
        self.changed.emit(&args);
        self.property_changed.emit(&args);
    }

    /// Stores `value` in `slot` if it differs from the current value,
    /// raising the "changing" notification before the write and the
    /// "changed" notification after it. Returns whether anything changed.
    ///
    /// The lock on `slot` is released before any notification is raised.
    pub fn set_if_changed<V: PartialEq>(
        &self,
        slot: &RwLock<V>,
        name: &str,
        value: V,
    ) -> bool {
        if *slot.read() == value {
            return false;
        }
        self.raise_property_changing(name);
        *slot.write() = value;
        self.raise_property_changed(name);
        true
    }

    /// Silences every notification until the returned guard is dropped.
    /// Guards nest.
    pub fn suppress_change_notifications(&self) -> SuppressionGuard {
        self.suppressed.fetch_add(1, Ordering::AcqRel);
        SuppressionGuard {
            counter: Arc::clone(&self.suppressed),
        }
    }

    /// Whether notifications are currently raised.
    pub fn are_change_notifications_enabled(&self) -> bool {
        self.suppressed.load(Ordering::Acquire) == 0
    }

    /// The number of handlers attached to any of the notifications.
    pub fn handler_count(&self) -> usize {
        self.changing.handler_count()
            + self.changed.handler_count()
            + self.property_changing.handler_count()
            + self.property_changed.handler_count()
    }
}

impl ReactiveObject for PropertyNotifier {
    fn changing(&self) -> Observable<PropertyChangeArgs> {
        self.changing.observe()
    }

    fn changed(&self) -> Observable<PropertyChangeArgs> {
        self.changed.observe()
    }
}

impl NotifyPropertyChanged for PropertyNotifier {
    fn property_changed(&self) -> &EventSource<PropertyChangeArgs> {
        &self.property_changed
    }
}

impl NotifyPropertyChanging for PropertyNotifier {
    fn property_changing(&self) -> &EventSource<PropertyChangeArgs> {
        &self.property_changing
    }
}

/// Re-enables notifications when dropped. See
/// [`PropertyNotifier::suppress_change_notifications`].
#[must_use = "notifications are re-enabled as soon as the guard is dropped"]
#[derive(Debug)]
pub struct SuppressionGuard {
    counter: Arc<AtomicUsize>,
}

impl Drop for SuppressionGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::AcqRel);
    }
}
