//! The built-in change source providers.
//!
//! | provider                   | affinity | claims                          |
//! |----------------------------|----------|---------------------------------|
//! | [`ReactiveObjectProvider`] | 10       | types with structured streams   |
//! | [`PropertyChangedProvider`]| 5        | conventional notifiers          |
//! | [`SnapshotProvider`]       | 1        | everything                      |

mod property_changed;
mod reactive;
mod snapshot;

pub use property_changed::PropertyChangedProvider;
pub use reactive::ReactiveObjectProvider;
pub use snapshot::SnapshotProvider;

use crate::{
    change::ChangeEvent,
    config::ObserveConfig,
    notify::PropertyChangeArgs,
    object::ObjectRef,
    observable::Observable,
    path::Link,
    registry::ProviderRegistry,
};
use std::sync::Arc;

/// Registers the built-in providers on `registry`.
pub fn register_defaults(registry: &ProviderRegistry, config: &ObserveConfig) {
    registry.register(Arc::new(ReactiveObjectProvider));
    registry.register(Arc::new(PropertyChangedProvider));
    registry.register(Arc::new(SnapshotProvider::new(config.warn_on_snapshot)));
}

/// Keeps the notifications about `link` and turns them into change events
/// sent by `sender`.
fn changes_of(
    notifications: Observable<PropertyChangeArgs>,
    sender: &ObjectRef,
    link: &Link,
) -> Observable<ChangeEvent> {
    let name = link.notification_name();
    let sender = Arc::clone(sender);
    let link = link.clone();
    notifications
        .filter(move |args| args.property_name == name)
        .map(move |_| ChangeEvent::new(Arc::clone(&sender), link.clone()))
}
